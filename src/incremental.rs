// WHY: Naming and writing of cast outputs, so a rerun can skip books that are already done
// `MRK.blocks.json` is cast into `MRK.cast.json` next to it

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::discovery::BOOK_FILE_SUFFIX;
use crate::reader::BookFile;

/// Suffix of cast output files
pub const CAST_FILE_SUFFIX: &str = ".cast.json";

fn book_stem(source_path: &Path) -> &str {
    let file_name = source_path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown");
    file_name
        .strip_suffix(BOOK_FILE_SUFFIX)
        .or_else(|| file_name.strip_suffix(".json"))
        .unwrap_or(file_name)
}

/// Output path for a book input file
pub fn generate_output_path(source_path: &Path) -> PathBuf {
    let stem = book_stem(source_path);
    source_path.with_file_name(format!("{stem}{CAST_FILE_SUFFIX}"))
}

/// Book code implied by a file name, e.g. `MRK` for `nt/MRK.blocks.json`
pub fn book_id_from_path(source_path: &Path) -> Option<String> {
    let stem = book_stem(source_path);
    (!stem.is_empty() && stem != "unknown").then(|| stem.to_string())
}

/// Whether the book has already been cast
pub fn output_exists<P: AsRef<Path>>(source_path: P) -> bool {
    generate_output_path(source_path.as_ref()).exists()
}

/// Write the cast blocks of a book as pretty JSON, returning the output path
pub async fn write_output(source_path: &Path, book: &BookFile) -> Result<PathBuf> {
    let output_path = generate_output_path(source_path);
    let json = serde_json::to_vec_pretty(book).context("Failed to serialize cast blocks")?;

    let file = tokio::fs::File::create(&output_path)
        .await
        .with_context(|| format!("Cannot create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&json).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::speaker::{BookId, SpeakerId};
    use tempfile::TempDir;

    #[test]
    fn test_generate_output_path() {
        assert_eq!(
            generate_output_path(Path::new("/proj/nt/MRK.blocks.json")),
            PathBuf::from("/proj/nt/MRK.cast.json")
        );
        assert_eq!(generate_output_path(Path::new("GEN.json")), PathBuf::from("GEN.cast.json"));
    }

    #[test]
    fn test_book_id_from_path() {
        assert_eq!(book_id_from_path(Path::new("a/b/LUK.blocks.json")).as_deref(), Some("LUK"));
        assert_eq!(book_id_from_path(Path::new(".blocks.json")), None);
    }

    #[tokio::test]
    async fn test_write_output_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("MRK.blocks.json");
        assert!(!output_exists(&source));

        let mut block = Block::paragraph("p", 1, 1).with_verse("1").with_text("The beginning.");
        block.set_speaker(SpeakerId::narrator(&BookId::new("MRK")), None);
        let book = BookFile { book: BookId::new("MRK"), blocks: vec![block] };

        let written = write_output(&source, &book).await.unwrap();
        assert!(output_exists(&source));

        let text = tokio::fs::read_to_string(&written).await.unwrap();
        assert!(text.contains("narrator-MRK"));
        let back: BookFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, book);
    }
}
