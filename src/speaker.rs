// WHY: Speaker attribution as a closed enum instead of magic strings
// Sentinel values (Ambiguous, Unknown, Needs Review, Unexpected) mark text a reviewer must resolve

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Three-letter SIL book code such as `MRK` or `GEN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn new(code: impl Into<String>) -> Self {
        BookId(code.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(code: &str) -> Self {
        BookId::new(code)
    }
}

const NARRATOR_PREFIX: &str = "narrator-";
const BOOK_OR_CHAPTER_PREFIX: &str = "BC-";
const EXTRA_BIBLICAL_PREFIX: &str = "extra-";

pub const AMBIGUOUS: &str = "Ambiguous";
pub const UNKNOWN: &str = "Unknown";
pub const NEEDS_REVIEW: &str = "Needs Review";
pub const UNEXPECTED: &str = "Unexpected";

/// Who speaks a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SpeakerId {
    /// A character from the reference data (may be a composite id like `Peter/John`)
    Known(String),
    Narrator(BookId),
    /// Book titles and chapter numbers
    BookOrChapter(BookId),
    /// Section headings and other non-scripture text
    ExtraBiblical(BookId),
    Ambiguous,
    #[default]
    Unknown,
    NeedsReview,
    Unexpected,
}

impl SpeakerId {
    pub fn narrator(book: &BookId) -> Self {
        SpeakerId::Narrator(book.clone())
    }

    /// Map a reference-data character id onto a speaker, recognizing standard ids
    pub fn from_character_id(id: &str) -> Self {
        // Parsing never fails: anything unrecognized is a named character
        id.parse().unwrap_or_else(|_| SpeakerId::Known(id.to_string()))
    }

    /// True for placeholder values that signal unresolved attribution
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            SpeakerId::Ambiguous
                | SpeakerId::Unknown
                | SpeakerId::NeedsReview
                | SpeakerId::Unexpected
        )
    }

    pub fn is_narrator(&self) -> bool {
        matches!(self, SpeakerId::Narrator(_))
    }

    pub fn character_id(&self) -> Option<&str> {
        match self {
            SpeakerId::Known(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerId::Known(id) => f.write_str(id),
            SpeakerId::Narrator(book) => write!(f, "{NARRATOR_PREFIX}{book}"),
            SpeakerId::BookOrChapter(book) => write!(f, "{BOOK_OR_CHAPTER_PREFIX}{book}"),
            SpeakerId::ExtraBiblical(book) => write!(f, "{EXTRA_BIBLICAL_PREFIX}{book}"),
            SpeakerId::Ambiguous => f.write_str(AMBIGUOUS),
            SpeakerId::Unknown => f.write_str(UNKNOWN),
            SpeakerId::NeedsReview => f.write_str(NEEDS_REVIEW),
            SpeakerId::Unexpected => f.write_str(UNEXPECTED),
        }
    }
}

impl FromStr for SpeakerId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let speaker = match s {
            AMBIGUOUS => SpeakerId::Ambiguous,
            "" | UNKNOWN => SpeakerId::Unknown,
            NEEDS_REVIEW => SpeakerId::NeedsReview,
            UNEXPECTED => SpeakerId::Unexpected,
            _ => {
                if let Some(book) = standard_book(s, NARRATOR_PREFIX) {
                    SpeakerId::Narrator(book)
                } else if let Some(book) = standard_book(s, BOOK_OR_CHAPTER_PREFIX) {
                    SpeakerId::BookOrChapter(book)
                } else if let Some(book) = standard_book(s, EXTRA_BIBLICAL_PREFIX) {
                    SpeakerId::ExtraBiblical(book)
                } else {
                    SpeakerId::Known(s.to_string())
                }
            }
        };
        Ok(speaker)
    }
}

fn standard_book(id: &str, prefix: &str) -> Option<BookId> {
    let code = id.strip_prefix(prefix)?;
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(BookId::new(code))
    } else {
        None
    }
}

impl Serialize for SpeakerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpeakerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SpeakerId::from_character_id(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ids_round_trip_through_strings() {
        let mrk = BookId::new("mrk");
        let cases = [
            (SpeakerId::narrator(&mrk), "narrator-MRK"),
            (SpeakerId::BookOrChapter(mrk.clone()), "BC-MRK"),
            (SpeakerId::ExtraBiblical(mrk.clone()), "extra-MRK"),
            (SpeakerId::NeedsReview, "Needs Review"),
            (SpeakerId::Known("Jesus".to_string()), "Jesus"),
        ];
        for (speaker, text) in cases {
            assert_eq!(speaker.to_string(), text);
            assert_eq!(SpeakerId::from_character_id(text), speaker, "Failed for: {text}");
        }
    }

    #[test]
    fn test_character_named_like_a_prefix_stays_known() {
        // Not a three-letter book code, so this is just a character name
        let speaker = SpeakerId::from_character_id("narrator-of-the-parable");
        assert_eq!(speaker, SpeakerId::Known("narrator-of-the-parable".to_string()));
        assert!(!speaker.is_sentinel());
    }

    #[test]
    fn test_sentinels() {
        assert!(SpeakerId::Ambiguous.is_sentinel());
        assert!(SpeakerId::Unexpected.is_sentinel());
        assert!(!SpeakerId::narrator(&BookId::new("GEN")).is_sentinel());
        assert_eq!(SpeakerId::default(), SpeakerId::Unknown);
    }

    #[test]
    fn test_serde_uses_display_form() {
        let json = serde_json::to_string(&SpeakerId::narrator(&BookId::new("LUK"))).unwrap();
        assert_eq!(json, "\"narrator-LUK\"");
        let back: SpeakerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SpeakerId::narrator(&BookId::new("LUK")));
    }
}
