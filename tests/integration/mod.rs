// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests
#![allow(dead_code)]

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

use versecast::{Block, BookId, CharacterVerseData, QuoteSystem, SpeakerId, Versification};

/// Test fixture helper for creating temporary project directories with book files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self { temp_dir, root_path }
    }

    /// Write a `*.blocks.json` book file
    pub fn create_book_file<P: AsRef<Path>>(
        &self,
        relative_path: P,
        book: &str,
        blocks: &[Block],
    ) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let json = serde_json::json!({ "book": book, "blocks": blocks });
        let content = serde_json::to_string_pretty(&json).unwrap();
        fs::write(&file_path, content).expect("Failed to write book file");
        file_path
    }

    /// Write any other file (configs, reference data)
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }
}

pub fn reference_data() -> &'static CharacterVerseData {
    static DATA: OnceLock<CharacterVerseData> = OnceLock::new();
    DATA.get_or_init(|| {
        CharacterVerseData::from_tab_delimited(fixtures::CHARACTER_VERSE_DATA)
            .expect("Fixture data must parse")
    })
}

fn compiled(cell: &'static OnceLock<QuoteSystem>, toml: &str) -> &'static QuoteSystem {
    cell.get_or_init(|| QuoteSystem::from_toml(toml).expect("Fixture quote system must compile"))
}

pub fn english() -> &'static QuoteSystem {
    static SYSTEM: OnceLock<QuoteSystem> = OnceLock::new();
    compiled(&SYSTEM, fixtures::ENGLISH_QUOTE_SYSTEM)
}

pub fn british() -> &'static QuoteSystem {
    static SYSTEM: OnceLock<QuoteSystem> = OnceLock::new();
    compiled(&SYSTEM, fixtures::BRITISH_QUOTE_SYSTEM)
}

pub fn spanish() -> &'static QuoteSystem {
    static SYSTEM: OnceLock<QuoteSystem> = OnceLock::new();
    compiled(&SYSTEM, fixtures::SPANISH_QUOTE_SYSTEM)
}

pub fn guillemet_dialogue() -> &'static QuoteSystem {
    static SYSTEM: OnceLock<QuoteSystem> = OnceLock::new();
    compiled(&SYSTEM, fixtures::GUILLEMET_DIALOGUE_QUOTE_SYSTEM)
}

/// Paragraph block opening with a verse marker
pub fn verse_paragraph(chapter: u32, verse: u32, text: &str) -> Block {
    Block::paragraph("p", chapter, verse).with_verse(&verse.to_string()).with_text(text)
}

/// Parse with the shared reference data and default versification
pub fn cast(book: &str, quote_system: &QuoteSystem, blocks: &[Block]) -> Vec<Block> {
    let versification = Versification::default();
    versecast::parse_book(&BookId::new(book), blocks, quote_system, reference_data(), &versification)
        .expect("Parsing must succeed")
}

pub fn known(name: &str) -> SpeakerId {
    SpeakerId::Known(name.to_string())
}

pub fn narrator(book: &str) -> SpeakerId {
    SpeakerId::narrator(&BookId::new(book))
}

/// (speaker, text with inline verse numbers) for compact assertions
pub fn summarize(blocks: &[Block]) -> Vec<(SpeakerId, String)> {
    blocks
        .iter()
        .map(|block| (block.character.clone(), block.text_with_verses()))
        .collect()
}
