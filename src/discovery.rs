// WHY: Finds the per-book block files a run should cast
// Streams matches lazily so a large project tree is never listed up front

use anyhow::Result;
use futures::stream::{Stream, StreamExt};
use glob::glob;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Suffix of book input files
pub const BOOK_FILE_SUFFIX: &str = ".blocks.json";

/// Configuration for file discovery behavior
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
}

/// Result of file discovery validation
#[derive(Debug, Clone)]
pub struct FileValidation {
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Discovers all files matching `**/*.blocks.json` recursively under the given root directory.
///
/// # Arguments
/// * `root_dir` - Root directory to search recursively
/// * `config` - Discovery configuration (fail_fast behavior)
///
/// # Returns
/// Stream of `FileValidation` results containing file paths and validation status
pub fn discover_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> impl Stream<Item = Result<FileValidation>> {
    let root_path = root_dir.as_ref().to_path_buf();

    futures::stream::unfold(DiscoveryState::new(root_path, config), |mut state| async move {
        state.next_file().await.map(|result| (result, state))
    })
}

/// Internal state for file discovery iteration
struct DiscoveryState {
    root_dir: PathBuf,
    config: DiscoveryConfig,
    glob_iter: Option<glob::Paths>,
}

impl DiscoveryState {
    fn new(root_dir: PathBuf, config: DiscoveryConfig) -> Self {
        Self {
            root_dir,
            config,
            glob_iter: None,
        }
    }

    async fn next_file(&mut self) -> Option<Result<FileValidation>> {
        if self.glob_iter.is_none() {
            let root = glob::Pattern::escape(&self.root_dir.to_string_lossy());
            let pattern = format!("{root}/**/*{BOOK_FILE_SUFFIX}");
            debug!("Starting book discovery with pattern: {}", pattern);

            match glob(&pattern) {
                Ok(paths) => {
                    self.glob_iter = Some(paths);
                    info!("Book discovery initialized for root: {}", self.root_dir.display());
                }
                Err(e) => {
                    return Some(Err(anyhow::anyhow!("Failed to create glob pattern: {}", e)));
                }
            }
        }

        loop {
            let glob_iter = self.glob_iter.as_mut()?;
            match glob_iter.next() {
                Some(Ok(path)) => {
                    debug!("Found book file: {}", path.display());
                    return Some(self.validate_file(path).await);
                }
                Some(Err(e)) => {
                    let error_msg = format!("Glob iteration error: {e}");
                    warn!("{}", error_msg);
                    if self.config.fail_fast {
                        return Some(Err(anyhow::anyhow!(error_msg)));
                    }
                }
                None => {
                    info!("Book discovery completed");
                    return None;
                }
            }
        }
    }

    async fn validate_file(&self, path: PathBuf) -> Result<FileValidation> {
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(FileValidation { path, error: None }),
            Ok(_) => {
                let error = format!("Path is not a file: {}", path.display());
                warn!("{}", error);
                Ok(FileValidation { path, error: Some(error) })
            }
            Err(e) => {
                let error = format!("Cannot access file {}: {}", path.display(), e);
                warn!("{}", error);
                if self.config.fail_fast {
                    return Err(anyhow::anyhow!(error));
                }
                Ok(FileValidation { path, error: Some(error) })
            }
        }
    }
}

/// Collect all discovered files into a Vec for easier processing
pub async fn collect_discovered_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<FileValidation>> {
    let mut files = Vec::new();
    let mut stream = Box::pin(discover_files(root_dir, config));

    while let Some(result) = stream.next().await {
        files.push(result?);
    }

    let valid_count = files.iter().filter(|f| f.error.is_none()).count();
    let invalid_count = files.len() - valid_count;
    if invalid_count > 0 {
        warn!("Found {} book files with validation issues", invalid_count);
    }
    info!("Book discovery summary: {} valid, {} invalid", valid_count, invalid_count);

    Ok(files)
}

/// Paths of all readable book files under `root_dir`, sorted
pub async fn find_book_files<P: AsRef<Path>>(root_dir: P) -> Result<Vec<PathBuf>> {
    let validations = collect_discovered_files(root_dir, DiscoveryConfig::default()).await?;

    let mut paths: Vec<PathBuf> = validations
        .into_iter()
        .filter(|v| v.error.is_none())
        .map(|v| v.path)
        .collect();
    paths.sort();

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;
        Ok(file_path)
    }

    #[tokio::test]
    async fn test_discover_files_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 0);
    }

    #[tokio::test]
    async fn test_discover_files_matching_pattern() {
        let temp_dir = TempDir::new().unwrap();

        create_test_file(temp_dir.path(), "MRK.blocks.json", "[]").await.unwrap();
        create_test_file(temp_dir.path(), "nt/LUK.blocks.json", "[]").await.unwrap();
        create_test_file(temp_dir.path(), "MRK.cast.json", "[]").await.unwrap();
        create_test_file(temp_dir.path(), "notes.json", "{}").await.unwrap();

        let files = collect_discovered_files(temp_dir.path(), DiscoveryConfig::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 2);

        let file_names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(file_names.contains(&"MRK.blocks.json".to_string()));
        assert!(file_names.contains(&"LUK.blocks.json".to_string()));
    }

    #[tokio::test]
    async fn test_find_book_files_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), "b/MRK.blocks.json", "[]").await.unwrap();
        create_test_file(temp_dir.path(), "a/GEN.blocks.json", "[]").await.unwrap();

        let paths = find_book_files(temp_dir.path()).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a/GEN.blocks.json"));
    }
}
