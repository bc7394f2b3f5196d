// WHY: Async loading of everything a run needs (book files, project config, reference data)
// Parsing itself never touches the filesystem; this module hands it resident values

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::character_verse::{CharacterVerseData, Versification};
use crate::quote_parser::ParserSettings;
use crate::quote_system::{QuoteSystem, QuoteSystemConfig};
use crate::speaker::BookId;

/// One book as stored on disk: `{ "book": "MRK", "blocks": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFile {
    pub book: BookId,
    pub blocks: Vec<Block>,
}

/// Project configuration file: the quote system plus optional parser tuning
///
/// ```toml
/// versification = "English"
///
/// [[levels]]
/// open = "“"
/// close = "”"
/// continue = "“"
///
/// [parser]
/// colon_label_max_words = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub versification: Option<Versification>,
    #[serde(flatten)]
    pub quote_system: QuoteSystemConfig,
    #[serde(default)]
    pub parser: ParserSettings,
}

impl ProjectConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid project configuration")
    }

    /// Validate and compile the quote system
    pub fn build_quote_system(&self) -> Result<QuoteSystem> {
        Ok(QuoteSystem::from_config(&self.quote_system)?)
    }
}

/// Configuration for file reading behavior
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            buffer_size: 8192,
        }
    }
}

/// Statistics for one book read
#[derive(Debug, Clone)]
pub struct ReadStats {
    pub file_path: String,
    pub blocks_read: u64,
    pub bytes_read: u64,
    pub duration_ms: u64,
    pub read_error: Option<String>,
}

/// Async reader for book block files
pub struct AsyncFileReader {
    config: ReaderConfig,
}

impl AsyncFileReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read and deserialize one book; without fail_fast a bad file yields `None`
    /// and an error in the stats
    pub async fn read_book<P: AsRef<Path>>(
        &self,
        file_path: P,
    ) -> Result<(Option<BookFile>, ReadStats)> {
        let path = file_path.as_ref();
        let start_time = std::time::Instant::now();
        debug!("Starting async read of book: {}", path.display());

        let outcome = self.load_book(path).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match outcome {
            Ok((book, bytes_read)) => {
                let stats = ReadStats {
                    file_path: path.display().to_string(),
                    blocks_read: book.blocks.len() as u64,
                    bytes_read,
                    duration_ms,
                    read_error: None,
                };
                info!(
                    "Read {} ({}): {} blocks, {} bytes in {}ms",
                    path.display(),
                    book.book,
                    stats.blocks_read,
                    bytes_read,
                    duration_ms
                );
                Ok((Some(book), stats))
            }
            Err(e) => {
                let error_msg = format!("Failed to read book {}: {:#}", path.display(), e);
                warn!("{}", error_msg);
                if self.config.fail_fast {
                    return Err(anyhow::anyhow!(error_msg));
                }
                let stats = ReadStats {
                    file_path: path.display().to_string(),
                    blocks_read: 0,
                    bytes_read: 0,
                    duration_ms,
                    read_error: Some(error_msg),
                };
                Ok((None, stats))
            }
        }
    }

    async fn load_book(&self, path: &Path) -> Result<(BookFile, u64)> {
        let file = File::open(path).await.context("open")?;
        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut content = String::new();
        let bytes_read = reader.read_to_string(&mut content).await.context("UTF-8 read")? as u64;
        let book: BookFile = serde_json::from_str(&content).context("block JSON")?;
        Ok((book, bytes_read))
    }
}

/// Load the project configuration TOML
pub async fn read_project_config<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read project config {}", path.display()))?;
    ProjectConfig::from_toml(&text).with_context(|| format!("In {}", path.display()))
}

/// Load tab-delimited character-verse data
pub async fn read_character_verse<P: AsRef<Path>>(path: P) -> Result<CharacterVerseData> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read character-verse data {}", path.display()))?;
    let data = CharacterVerseData::from_tab_delimited(&text)
        .with_context(|| format!("In {}", path.display()))?;
    info!("Loaded {} character-verse entries from {}", data.len(), path.display());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    async fn create_test_file(dir: &Path, name: &str, content: &str) -> Result<std::path::PathBuf> {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, content).await?;
        Ok(file_path)
    }

    const MARK_JSON: &str = r#"{
        "book": "MRK",
        "blocks": [
            {
                "style_tag": "p",
                "chapter_number": 1,
                "initial_start_verse": 1,
                "is_paragraph_start": true,
                "elements": [{ "verse": "1" }, { "text": "The beginning of the gospel." }]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_read_valid_book() {
        let temp_dir = TempDir::new().unwrap();
        let reader = AsyncFileReader::new(ReaderConfig::default());
        let file_path = create_test_file(temp_dir.path(), "MRK.blocks.json", MARK_JSON)
            .await
            .unwrap();

        let (book, stats) = reader.read_book(&file_path).await.unwrap();
        let book = book.unwrap();

        assert_eq!(book.book, BookId::new("MRK"));
        assert_eq!(book.blocks.len(), 1);
        assert_eq!(book.blocks[0].text_with_verses(), "{1}The beginning of the gospel.");
        assert_eq!(stats.blocks_read, 1);
        assert!(stats.read_error.is_none());
    }

    #[tokio::test]
    async fn test_read_malformed_book() {
        let temp_dir = TempDir::new().unwrap();
        let reader = AsyncFileReader::new(ReaderConfig::default());
        let file_path = create_test_file(temp_dir.path(), "BAD.blocks.json", "{ not json")
            .await
            .unwrap();

        let (book, stats) = reader.read_book(&file_path).await.unwrap();
        assert!(book.is_none());
        assert!(stats.read_error.is_some());
    }

    #[tokio::test]
    async fn test_read_nonexistent_book_fail_fast() {
        let temp_dir = TempDir::new().unwrap();
        let reader = AsyncFileReader::new(ReaderConfig { fail_fast: true, ..Default::default() });

        let result = reader.read_book(temp_dir.path().join("missing.blocks.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_project_config_with_parser_table() {
        let temp_dir = TempDir::new().unwrap();
        let content = r#"
versification = "Original"

[[levels]]
open = "«"
close = "»"
continue = "«"

[dialogue]
start = "—"
end = "—"

[parser]
colon_label_max_words = 5
"#;
        let path = create_test_file(temp_dir.path(), "project.toml", content).await.unwrap();

        let config = read_project_config(&path).await.unwrap();
        assert_eq!(config.versification, Some(Versification::new("Original")));
        assert_eq!(config.parser.colon_label_max_words, 5);
        assert_eq!(config.parser.lead_in_max_words, 4);

        let system = config.build_quote_system().unwrap();
        assert_eq!(system.levels().len(), 1);
        assert_eq!(system.dialogue_end(), Some("—"));
    }

    #[tokio::test]
    async fn test_read_character_verse_reports_line() {
        let temp_dir = TempDir::new().unwrap();
        let content = "MRK\t1\t4\tJohn the Baptist\n\nMRK\tx\t5\tJesus\n";
        let path = create_test_file(temp_dir.path(), "cv.txt", content).await.unwrap();

        let error = read_character_verse(&path).await.unwrap_err();
        assert!(format!("{error:#}").contains("line 3"));
    }
}
