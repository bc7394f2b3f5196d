// WHY: Reference lookup of who may speak at a given book/chapter/verse
// The parser only sees the trait; the in-memory table is one implementation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::block::VerseRange;
use crate::speaker::BookId;

pub mod repository;

pub use repository::CharacterVerseData;

/// How a character is expected to speak in a verse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuoteType {
    Normal,
    Potential,
    Quotation,
    Dialogue,
    Alternate,
    Hypothetical,
    Implicit,
    ImplicitWithPotentialSelfQuote,
    Indirect,
    Interruption,
    Rare,
}

impl QuoteType {
    /// Types that expect the character to be speaking in the verse (as opposed to merely possible)
    pub fn is_expected(self) -> bool {
        matches!(
            self,
            QuoteType::Normal
                | QuoteType::Dialogue
                | QuoteType::Quotation
                | QuoteType::Implicit
                | QuoteType::ImplicitWithPotentialSelfQuote
        )
    }

    pub fn is_implicit(self) -> bool {
        matches!(self, QuoteType::Implicit | QuoteType::ImplicitWithPotentialSelfQuote)
    }

    /// Alternates and rare speakers are only returned when explicitly requested
    pub fn requires_alternates(self) -> bool {
        matches!(self, QuoteType::Alternate | QuoteType::Rare)
    }
}

impl fmt::Display for QuoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for QuoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let quote_type = match s.trim() {
            "" | "Normal" => QuoteType::Normal,
            "Potential" => QuoteType::Potential,
            "Quotation" => QuoteType::Quotation,
            "Dialogue" => QuoteType::Dialogue,
            "Alternate" => QuoteType::Alternate,
            "Hypothetical" => QuoteType::Hypothetical,
            "Implicit" => QuoteType::Implicit,
            "ImplicitWithPotentialSelfQuote" => QuoteType::ImplicitWithPotentialSelfQuote,
            "Indirect" => QuoteType::Indirect,
            "Interruption" => QuoteType::Interruption,
            "Rare" => QuoteType::Rare,
            other => return Err(other.to_string()),
        };
        Ok(quote_type)
    }
}

/// One admissible `(character, delivery, quote type)` entry for a verse
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterSpeakingMode {
    pub character: String,
    pub delivery: Option<String>,
    pub quote_type: QuoteType,
    pub default_character: Option<String>,
    pub alias: Option<String>,
}

impl CharacterSpeakingMode {
    pub fn new(character: &str, delivery: Option<&str>, quote_type: QuoteType) -> Self {
        Self {
            character: character.to_string(),
            delivery: delivery.filter(|d| !d.is_empty()).map(str::to_string),
            quote_type,
            default_character: None,
            alias: None,
        }
    }

    pub fn with_default_character(mut self, default_character: &str) -> Self {
        self.default_character = Some(default_character.to_string());
        self
    }

    /// Individual ids of a composite character such as `Peter (Simon)/John`
    pub fn character_ids(&self) -> impl Iterator<Item = &str> {
        self.character.split('/').map(str::trim)
    }

    pub fn is_composite(&self) -> bool {
        self.character.contains('/')
    }

    /// Character to use in the script when the id is composite
    pub fn character_in_script(&self) -> Option<String> {
        if !self.is_composite() {
            return None;
        }
        self.default_character
            .clone()
            .or_else(|| self.character_ids().next().map(str::to_string))
    }
}

/// Verse-numbering scheme name; mapping between schemes is the repository's business
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Versification(String);

impl Versification {
    pub const ENGLISH: &'static str = "English";

    pub fn new(name: impl Into<String>) -> Self {
        Versification(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Versification {
    fn default() -> Self {
        Versification::new(Self::ENGLISH)
    }
}

/// Read-only reference data consulted by the parser
///
/// Implementations must be pure functions of their arguments and safe to share
/// across threads; an unknown location yields an empty set, never an error.
pub trait CharacterVerseRepository: Send + Sync {
    fn get_candidates(
        &self,
        book: &BookId,
        chapter: u32,
        verses: VerseRange,
        versification: &Versification,
        include_alternates: bool,
    ) -> HashSet<CharacterSpeakingMode>;

    /// The single character known to speak every verse of the range without explicit quotes
    fn get_implicit_character(
        &self,
        book: &BookId,
        chapter: u32,
        start_verse: u32,
        end_verse: u32,
        versification: &Versification,
    ) -> Option<CharacterSpeakingMode>;
}
