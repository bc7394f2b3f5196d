// WHY: Immutable description of a language's quotation conventions
// Validated once, then shared read-only by every per-book parser

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QuoteSystemError;
use crate::quote_parser::tokenizer::QuoteTokenizer;

/// Whether a level is closed by a paired mark or opened by a dialogue dash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotationMarkKind {
    Normal,
    Narrative,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationMark {
    pub open: String,
    pub close: String,
    /// Marker expected at the start of a paragraph that continues a quote at this level
    pub continuation: String,
    /// 1-based nesting level
    pub level: usize,
    pub kind: QuotationMarkKind,
}

impl QuotationMark {
    pub fn normal(open: &str, close: &str, continuation: &str, level: usize) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
            continuation: continuation.to_string(),
            level,
            kind: QuotationMarkKind::Normal,
        }
    }

    /// Level-1 dialogue dash; an empty `end` means the quote runs to the end of the paragraph
    pub fn dialogue_dash(start: &str, end: Option<&str>) -> Self {
        Self {
            open: start.to_string(),
            close: end.unwrap_or_default().to_string(),
            continuation: String::new(),
            level: 1,
            kind: QuotationMarkKind::Narrative,
        }
    }
}

/// One `[[levels]]` entry of a quote system file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub open: String,
    pub close: String,
    #[serde(default, rename = "continue")]
    pub continuation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// Serializable form of a quote system, as written in TOML
///
/// ```toml
/// [[levels]]
/// open = "“"
/// close = "”"
/// continue = "“"
///
/// [dialogue]
/// start = "—"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSystemConfig {
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
    #[serde(default)]
    pub dialogue: Option<DialogueConfig>,
}

#[derive(Debug, Clone)]
pub struct QuoteSystem {
    levels: Vec<QuotationMark>,
    dialogue: Option<QuotationMark>,
    tokenizer: QuoteTokenizer,
}

impl QuoteSystem {
    /// Validate the marks and compile the per-depth token matchers
    pub fn new(
        levels: Vec<QuotationMark>,
        dialogue: Option<QuotationMark>,
    ) -> Result<Self, QuoteSystemError> {
        for (position, mark) in levels.iter().enumerate() {
            if mark.level != position + 1 {
                return Err(QuoteSystemError::LevelOutOfOrder { position, found: mark.level });
            }
            if mark.open.is_empty() {
                return Err(QuoteSystemError::EmptyMarker { level: mark.level, which: "open" });
            }
            if mark.close.is_empty() {
                return Err(QuoteSystemError::EmptyMarker { level: mark.level, which: "close" });
            }
        }

        let dialogue = match dialogue {
            Some(mark) if mark.open.is_empty() && !mark.close.is_empty() => {
                return Err(QuoteSystemError::DialogueEndWithoutStart { end: mark.close });
            }
            Some(mark) if mark.open.is_empty() => None,
            other => other,
        };

        let tokenizer = QuoteTokenizer::build(&levels, dialogue.as_ref())?;
        debug!(levels = levels.len(), has_dialogue = dialogue.is_some(), "Compiled quote system");

        Ok(Self { levels, dialogue, tokenizer })
    }

    pub fn from_config(config: &QuoteSystemConfig) -> Result<Self, QuoteSystemError> {
        let levels = config
            .levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                QuotationMark::normal(&level.open, &level.close, &level.continuation, index + 1)
            })
            .collect();
        let dialogue = config
            .dialogue
            .as_ref()
            .map(|dialogue| QuotationMark::dialogue_dash(&dialogue.start, dialogue.end.as_deref()));
        Self::new(levels, dialogue)
    }

    pub fn from_toml(text: &str) -> Result<Self, QuoteSystemError> {
        let config: QuoteSystemConfig = toml::from_str(text)?;
        Self::from_config(&config)
    }

    pub fn levels(&self) -> &[QuotationMark] {
        &self.levels
    }

    /// Normal quotation mark for a 1-based level
    pub fn level(&self, level: usize) -> Option<&QuotationMark> {
        level.checked_sub(1).and_then(|index| self.levels.get(index))
    }

    pub fn dialogue_start(&self) -> Option<&str> {
        self.dialogue.as_ref().map(|mark| mark.open.as_str())
    }

    /// Explicit dialogue end marker, if the dialogue quote has one
    pub fn dialogue_end(&self) -> Option<&str> {
        self.dialogue.as_ref().map(|mark| mark.close.as_str()).filter(|close| !close.is_empty())
    }

    /// A dash with no distinct end marker doubles as ordinary punctuation
    pub fn has_contextual_dialogue_dash(&self) -> bool {
        match &self.dialogue {
            Some(mark) => mark.close.is_empty() || mark.close == mark.open,
            None => false,
        }
    }

    /// Continuation marker for a 1-based level, if one is defined
    pub fn continuer(&self, level: usize) -> Option<&str> {
        self.level(level).map(|mark| mark.continuation.as_str()).filter(|marker| !marker.is_empty())
    }

    pub fn tokenizer(&self) -> &QuoteTokenizer {
        &self.tokenizer
    }
}
