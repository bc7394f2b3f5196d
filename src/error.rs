//! Typed errors for programmer-contract violations
//!
//! Attribution ambiguity is never an error; it is carried by `SpeakerId` sentinels.

use thiserror::Error;

use crate::speaker::BookId;

/// Errors raised while building a quote system
#[derive(Error, Debug)]
pub enum QuoteSystemError {
    /// An opening or closing marker is empty
    #[error("quotation level {level} has an empty {which} marker")]
    EmptyMarker {
        /// 1-based nesting level
        level: usize,
        /// Which marker was missing ("open" or "close")
        which: &'static str,
    },

    /// Levels are not numbered 1, 2, 3... in order
    #[error(
        "quotation level {found} found at position {position}; levels must be consecutive from 1"
    )]
    LevelOutOfOrder {
        /// 0-based position in the level list
        position: usize,
        /// Level number declared at that position
        found: usize,
    },

    /// A dialogue end marker was configured without a start marker
    #[error("dialogue end marker {end:?} configured without a dialogue start marker")]
    DialogueEndWithoutStart {
        /// The orphaned end marker
        end: String,
    },

    /// The token pattern for a nesting depth failed to compile
    #[error("failed to compile quote pattern for depth {depth}: {message}")]
    Pattern {
        /// Nesting depth the pattern was built for
        depth: usize,
        /// Compiler message
        message: String,
    },

    /// The configuration file could not be parsed
    #[error("invalid quote system configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Contract violations detected while parsing a book
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input already carries a human decision and must not be re-parsed
    #[error(
        "block {index} of {book} (chapter {chapter}, verse {verse}) is user-confirmed \
         and cannot be re-parsed"
    )]
    UserConfirmedBlock {
        /// Book being parsed
        book: BookId,
        /// Position of the offending block in the input
        index: usize,
        /// Chapter of the offending block
        chapter: u32,
        /// Starting verse of the offending block
        verse: u32,
    },
}

/// Errors raised while loading character-verse reference data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CharacterVerseError {
    /// A data line does not have the required columns
    #[error("line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// The quote type column holds an unrecognized value
    #[error("line {line}: unknown quote type {value:?}")]
    UnknownQuoteType {
        /// 1-based line number
        line: usize,
        /// The unrecognized value
        value: String,
    },
}
