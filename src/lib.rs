pub mod block;
pub mod character_verse;
pub mod discovery;
pub mod error;
pub mod incremental;
pub mod parallel_processing;
pub mod quote_parser;
pub mod quote_system;
pub mod reader;
pub mod speaker;

// Re-export main types for convenient access
pub use block::{Block, BlockElement, MultiBlockQuote, Verse, VerseRange};
pub use character_verse::{
    CharacterSpeakingMode, CharacterVerseData, CharacterVerseRepository, QuoteType, Versification,
};
pub use error::{CharacterVerseError, ParseError, QuoteSystemError};
pub use quote_parser::{parse_book, ParserSettings, QuoteParser};
pub use quote_system::{QuotationMark, QuotationMarkKind, QuoteSystem, QuoteSystemConfig};
pub use speaker::{BookId, SpeakerId};

// Re-export host-side helpers used by the CLI and benchmarks
pub use incremental::{generate_output_path, output_exists, write_output};
pub use parallel_processing::{
    parse_books_parallel, BookInput, BookResult, BookStats, ProgressCounter, SentinelCounts,
};
pub use reader::{BookFile, ProjectConfig};
