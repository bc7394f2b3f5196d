// WHY: Block model shared by the parser, the multi-block resolver and the implicit pass
// A block is one run of text with a single paragraph style, chapter and starting verse

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::speaker::SpeakerId;

/// USFM paragraph styles that never carry scripture text
pub const NON_SCRIPTURE_STYLES: &[&str] = &[
    "c", "cd", "cl", "cp", "h", "ide", "imt", "imt1", "imt2", "ip", "is", "is1", "is2", "mr", "ms",
    "ms1", "ms2", "ms3", "mt", "mt1", "mt2", "mt3", "mt4", "r", "s", "s1", "s2", "s3", "s4", "sp",
    "sr", "toc1", "toc2", "toc3",
];

/// Paragraph styles that continue the preceding paragraph (poetry lines, margin continuation)
pub const DEFAULT_FOLLOW_ON_STYLES: &[&str] =
    &["m", "q", "q1", "q2", "q3", "q4", "qm", "qm1", "qm2"];

pub fn is_scripture_style(style_tag: &str) -> bool {
    !NON_SCRIPTURE_STYLES.contains(&style_tag)
}

/// Inclusive verse range; a single verse has `start == end`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRange {
    pub start: u32,
    pub end: u32,
}

impl VerseRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn single(verse: u32) -> Self {
        Self::new(verse, verse)
    }

    pub fn contains(&self, verse: u32) -> bool {
        (self.start..=self.end).contains(&verse)
    }

    pub fn verses(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Inline verse marker; the number may be a bridge (`4-5`) or carry a segment letter (`4a`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verse {
    number: String,
}

impl Verse {
    pub fn new(number: impl Into<String>) -> Self {
        Self { number: number.into() }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn range(&self) -> VerseRange {
        let mut parts = self.number.splitn(2, ['-', '\u{2013}']);
        let start = parts.next().map(leading_number).unwrap_or(0);
        let end = parts.next().map(leading_number).unwrap_or(start);
        VerseRange::new(start, end)
    }
}

fn leading_number(text: &str) -> u32 {
    let digits: String = text.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockElement {
    Text(String),
    Verse(Verse),
}

impl BlockElement {
    pub fn is_text(&self) -> bool {
        matches!(self, BlockElement::Text(_))
    }
}

/// Role of a block inside a quotation that spans several blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultiBlockQuote {
    #[default]
    None,
    Start,
    Continuation,
    ChangeOfDelivery,
}

/// Run of elements starting at `element_start` that belongs to one verse (or bridge)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseSegment {
    pub element_start: usize,
    pub verses: VerseRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub style_tag: String,
    pub chapter_number: u32,
    pub initial_start_verse: u32,
    /// Last verse of a bridge the block starts in; 0 when the block does not start in a bridge
    #[serde(default)]
    pub initial_end_verse: u32,
    #[serde(default)]
    pub is_paragraph_start: bool,
    pub elements: Vec<BlockElement>,
    #[serde(default)]
    pub character: SpeakerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    /// Concrete character used in the script when `character` is a composite id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id_in_script: Option<String>,
    #[serde(default)]
    pub multi_block_quote: MultiBlockQuote,
    /// Set once a human has confirmed the attribution; such blocks must not be re-parsed
    #[serde(default)]
    pub user_confirmed: bool,
}

impl Block {
    pub fn new(
        style_tag: impl Into<String>,
        chapter_number: u32,
        initial_start_verse: u32,
    ) -> Self {
        Self {
            style_tag: style_tag.into(),
            chapter_number,
            initial_start_verse,
            initial_end_verse: 0,
            is_paragraph_start: false,
            elements: Vec::new(),
            character: SpeakerId::Unknown,
            delivery: None,
            character_id_in_script: None,
            multi_block_quote: MultiBlockQuote::None,
            user_confirmed: false,
        }
    }

    /// Start a new paragraph block
    pub fn paragraph(
        style_tag: impl Into<String>,
        chapter_number: u32,
        initial_start_verse: u32,
    ) -> Self {
        let mut block = Self::new(style_tag, chapter_number, initial_start_verse);
        block.is_paragraph_start = true;
        block
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.add_text(text);
        self
    }

    pub fn with_verse(mut self, number: &str) -> Self {
        self.add_verse(number);
        self
    }

    /// Append text, merging with a trailing text element
    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.elements.last_mut() {
            Some(BlockElement::Text(existing)) => existing.push_str(text),
            _ => self.elements.push(BlockElement::Text(text.to_string())),
        }
    }

    pub fn add_verse(&mut self, number: &str) {
        self.elements.push(BlockElement::Verse(Verse::new(number)));
    }

    pub fn is_scripture(&self) -> bool {
        is_scripture_style(&self.style_tag)
    }

    pub fn initial_verses(&self) -> VerseRange {
        VerseRange::new(self.initial_start_verse, self.initial_end_verse)
    }

    /// Verse (or bridge) in effect at the end of the block
    pub fn last_verses(&self) -> VerseRange {
        self.elements
            .iter()
            .rev()
            .find_map(|element| match element {
                BlockElement::Verse(verse) => Some(verse.range()),
                BlockElement::Text(_) => None,
            })
            .unwrap_or_else(|| self.initial_verses())
    }

    pub fn starts_with_verse_marker(&self) -> bool {
        matches!(self.elements.first(), Some(BlockElement::Verse(_)))
    }

    pub fn ends_with_verse_marker(&self) -> bool {
        matches!(self.elements.last(), Some(BlockElement::Verse(_)))
    }

    /// Plain text without verse numbers
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|element| match element {
                BlockElement::Text(text) => Some(text.as_str()),
                BlockElement::Verse(_) => None,
            })
            .collect()
    }

    /// Text with verse numbers rendered inline as `{4}`
    pub fn text_with_verses(&self) -> String {
        let mut rendered = String::new();
        for element in &self.elements {
            match element {
                BlockElement::Text(text) => rendered.push_str(text),
                BlockElement::Verse(verse) => {
                    rendered.push('{');
                    rendered.push_str(verse.number());
                    rendered.push('}');
                }
            }
        }
        rendered
    }

    pub fn word_count(&self) -> usize {
        self.text().split_whitespace().count()
    }

    pub fn set_speaker(&mut self, character: SpeakerId, delivery: Option<String>) {
        self.character = character;
        self.delivery = delivery;
    }

    /// Elements grouped by the verse they belong to, in order
    pub fn verse_segments(&self) -> Vec<VerseSegment> {
        let mut segments = Vec::new();
        if self.elements.first().is_some_and(BlockElement::is_text) {
            segments.push(VerseSegment { element_start: 0, verses: self.initial_verses() });
        }
        for (index, element) in self.elements.iter().enumerate() {
            if let BlockElement::Verse(verse) = element {
                segments.push(VerseSegment { element_start: index, verses: verse.range() });
            }
        }
        segments
    }

    /// Split before the element at `index`; the second half starts at the verse in effect there
    pub fn split_at_element(mut self, index: usize) -> (Block, Block) {
        let tail_elements = self.elements.split_off(index.min(self.elements.len()));
        let starting_verses = match tail_elements.first() {
            Some(BlockElement::Verse(verse)) => verse.range(),
            _ => self.last_verses(),
        };
        let mut tail = self.clone();
        tail.elements = tail_elements;
        tail.is_paragraph_start = false;
        tail.initial_start_verse = starting_verses.start;
        tail.initial_end_verse = if starting_verses.end > starting_verses.start {
            starting_verses.end
        } else {
            0
        };
        (self, tail)
    }
}
