// WHY: In-memory character-verse table loaded once from the tab-delimited control file
// Populated before parsing and only read afterwards, so plain shared references are enough

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{CharacterSpeakingMode, CharacterVerseRepository, QuoteType, Versification};
use crate::block::{Verse, VerseRange};
use crate::error::CharacterVerseError;
use crate::speaker::BookId;

type VerseKey = (BookId, u32, u32);

#[derive(Debug, Clone, Default)]
pub struct CharacterVerseData {
    entries: HashMap<VerseKey, Vec<CharacterSpeakingMode>>,
    /// (versification, book, chapter, verse) -> reference (chapter, verse)
    mappings: HashMap<(Versification, BookId, u32, u32), (u32, u32)>,
}

impl CharacterVerseData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the control file format
    ///
    /// `Book Chapter Verse Character Delivery Alias QuoteType DefaultCharacter [ParallelPassage]`,
    /// tab separated, `#` starts a comment line. Verse may be a range such as `4-6`.
    pub fn from_tab_delimited(text: &str) -> Result<Self, CharacterVerseError> {
        let mut data = Self::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
            if columns.len() < 4 {
                return Err(CharacterVerseError::MalformedLine {
                    line: line_number,
                    reason: format!(
                        "expected at least 4 tab-separated columns, found {}",
                        columns.len()
                    ),
                });
            }

            let book = BookId::new(columns[0]);
            let chapter: u32 = columns[1].parse().map_err(|_| CharacterVerseError::MalformedLine {
                line: line_number,
                reason: format!("chapter {:?} is not a number", columns[1]),
            })?;
            let verses = Verse::new(columns[2]).range();
            if verses.start == 0 {
                return Err(CharacterVerseError::MalformedLine {
                    line: line_number,
                    reason: format!("verse {:?} is not a verse number", columns[2]),
                });
            }

            let character = columns[3];
            if character.is_empty() {
                return Err(CharacterVerseError::MalformedLine {
                    line: line_number,
                    reason: "character column is empty".to_string(),
                });
            }

            let column =
                |index: usize| columns.get(index).copied().filter(|value| !value.is_empty());
            let quote_type = match column(6) {
                Some(value) => value
                    .parse::<QuoteType>()
                    .map_err(|value| CharacterVerseError::UnknownQuoteType {
                        line: line_number,
                        value,
                    })?,
                None => QuoteType::Normal,
            };

            let mut mode = CharacterSpeakingMode::new(character, column(4), quote_type);
            mode.alias = column(5).map(str::to_string);
            mode.default_character = column(7).map(str::to_string);

            data.add_entry(&book, chapter, verses, mode);
        }

        debug!(entries = data.len(), "Loaded character-verse data");
        Ok(data)
    }

    /// Register a mode for every verse of `verses`; duplicates are ignored
    pub fn add_entry(
        &mut self,
        book: &BookId,
        chapter: u32,
        verses: VerseRange,
        mode: CharacterSpeakingMode,
    ) {
        for verse in verses.verses() {
            let modes = self.entries.entry((book.clone(), chapter, verse)).or_default();
            if !modes.contains(&mode) {
                modes.push(mode.clone());
            }
        }
    }

    /// Layer project-specific entries on top of the reference data (union)
    pub fn with_overrides(mut self, overrides: CharacterVerseData) -> Self {
        let mut added = 0usize;
        for ((book, chapter, verse), modes) in overrides.entries {
            let existing = self.entries.entry((book, chapter, verse)).or_default();
            for mode in modes {
                if !existing.contains(&mode) {
                    existing.push(mode);
                    added += 1;
                }
            }
        }
        self.mappings.extend(overrides.mappings);
        debug!(added, "Applied character-verse overrides");
        self
    }

    /// Map a verse of another versification onto the reference numbering
    pub fn add_verse_mapping(
        &mut self,
        versification: &Versification,
        book: &BookId,
        from: (u32, u32),
        to: (u32, u32),
    ) {
        self.mappings.insert((versification.clone(), book.clone(), from.0, from.1), to);
    }

    /// Number of (verse, mode) entries
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_reference(
        &self,
        versification: &Versification,
        book: &BookId,
        chapter: u32,
        verse: u32,
    ) -> (u32, u32) {
        self.mappings
            .get(&(versification.clone(), book.clone(), chapter, verse))
            .copied()
            .unwrap_or((chapter, verse))
    }

    fn modes_at(
        &self,
        book: &BookId,
        chapter: u32,
        verse: u32,
        versification: &Versification,
    ) -> &[CharacterSpeakingMode] {
        let (chapter, verse) = self.to_reference(versification, book, chapter, verse);
        self.entries
            .get(&(book.clone(), chapter, verse))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl CharacterVerseRepository for CharacterVerseData {
    fn get_candidates(
        &self,
        book: &BookId,
        chapter: u32,
        verses: VerseRange,
        versification: &Versification,
        include_alternates: bool,
    ) -> HashSet<CharacterSpeakingMode> {
        verses
            .verses()
            .flat_map(|verse| self.modes_at(book, chapter, verse, versification))
            .filter(|mode| include_alternates || !mode.quote_type.requires_alternates())
            .cloned()
            .collect()
    }

    fn get_implicit_character(
        &self,
        book: &BookId,
        chapter: u32,
        start_verse: u32,
        end_verse: u32,
        versification: &Versification,
    ) -> Option<CharacterSpeakingMode> {
        let mut implicit: Option<&CharacterSpeakingMode> = None;

        for verse in VerseRange::new(start_verse, end_verse).verses() {
            let mut in_verse = self
                .modes_at(book, chapter, verse, versification)
                .iter()
                .filter(|mode| mode.quote_type.is_implicit());
            let found = in_verse.next()?;
            if in_verse.next().is_some() {
                warn!(%book, chapter, verse, "More than one implicit character for a verse");
                return None;
            }
            match implicit {
                Some(previous) if previous != found => return None,
                _ => implicit = Some(found),
            }
        }

        implicit.cloned()
    }
}
