// WHY: Casting is strictly sequential within a book, so books are the unit of parallelism
// Each worker builds its own parser over the shared read-only quote system and reference data

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::character_verse::{CharacterVerseRepository, Versification};
use crate::error::ParseError;
use crate::quote_parser::{ParserSettings, QuoteParser};
use crate::quote_system::QuoteSystem;
use crate::speaker::{BookId, SpeakerId};

/// One book queued for casting
#[derive(Debug, Clone)]
pub struct BookInput {
    pub book_id: BookId,
    pub blocks: Vec<Block>,
}

impl BookInput {
    pub fn new(book_id: BookId, blocks: Vec<Block>) -> Self {
        Self { book_id, blocks }
    }
}

/// Blocks per sentinel value in a cast book
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelCounts {
    pub ambiguous: u64,
    pub unknown: u64,
    pub needs_review: u64,
    pub unexpected: u64,
}

impl SentinelCounts {
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut counts = Self::default();
        for block in blocks {
            match block.character {
                SpeakerId::Ambiguous => counts.ambiguous += 1,
                SpeakerId::Unknown => counts.unknown += 1,
                SpeakerId::NeedsReview => counts.needs_review += 1,
                SpeakerId::Unexpected => counts.unexpected += 1,
                _ => {}
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.ambiguous + self.unknown + self.needs_review + self.unexpected
    }
}

/// Per-book casting statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BookStats {
    /// Book code
    pub book: String,
    /// Source file, when the book came from disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub input_blocks: u64,
    pub output_blocks: u64,
    /// Blocks left for a reviewer
    pub sentinels: SentinelCounts,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Processing status (success, skipped, failed)
    pub status: String,
    /// Error message if processing failed
    pub error: Option<String>,
}

impl BookStats {
    /// Stats for a book that was not cast because its output already exists
    pub fn skipped(book: &BookId, path: &Path) -> Self {
        Self {
            book: book.to_string(),
            path: Some(path.display().to_string()),
            input_blocks: 0,
            output_blocks: 0,
            sentinels: SentinelCounts::default(),
            processing_time_ms: 0,
            status: "skipped".to_string(),
            error: None,
        }
    }
}

/// Outcome of casting one book
#[derive(Debug, Clone)]
pub struct BookResult {
    pub book_id: BookId,
    pub blocks: Result<Vec<Block>, ParseError>,
    pub stats: BookStats,
}

/// Receives whole percentages, 0 to 100
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Thread-safe block counter shared by all workers of a run
///
/// The callback sees strictly increasing percentages and sees 100 exactly once,
/// from [`ProgressCounter::finish`].
pub struct ProgressCounter {
    total: usize,
    done: AtomicUsize,
    reported: Mutex<Option<u8>>,
    callback: ProgressCallback,
}

impl ProgressCounter {
    pub fn new(total: usize, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            reported: Mutex::new(None),
            callback: Box::new(callback),
        }
    }

    /// Record `n` more processed blocks
    pub fn advance(&self, n: usize) {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        if self.total == 0 {
            return;
        }
        // 100 is reserved for finish
        let percent = (done.saturating_mul(100) / self.total).min(99) as u8;
        self.report(percent);
    }

    /// Report completion; later calls are no-ops
    pub fn finish(&self) {
        self.report(100);
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    fn report(&self, percent: u8) {
        let mut reported = match self.reported.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if reported.map_or(true, |last| percent > last) {
            *reported = Some(percent);
            (self.callback)(percent);
        }
    }
}

impl std::fmt::Debug for ProgressCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCounter")
            .field("total", &self.total)
            .field("done", &self.completed())
            .finish()
    }
}

/// Total block count of a run, for sizing a [`ProgressCounter`]
pub fn total_blocks(books: &[BookInput]) -> usize {
    books.iter().map(|book| book.blocks.len()).sum()
}

/// Cast one book synchronously and collect its stats
pub fn cast_book(
    input: &BookInput,
    quote_system: &QuoteSystem,
    repository: &dyn CharacterVerseRepository,
    versification: &Versification,
    settings: &ParserSettings,
    progress: Option<&ProgressCounter>,
) -> BookResult {
    let start_time = Instant::now();
    let mut parser =
        QuoteParser::new(input.book_id.clone(), quote_system, repository, versification)
            .with_settings(settings.clone());
    if let Some(progress) = progress {
        parser = parser.with_progress(progress);
    }

    let blocks = parser.parse(&input.blocks);
    let processing_time_ms = start_time.elapsed().as_millis() as u64;

    let mut stats = BookStats {
        book: input.book_id.to_string(),
        path: None,
        input_blocks: input.blocks.len() as u64,
        output_blocks: 0,
        sentinels: SentinelCounts::default(),
        processing_time_ms,
        status: "success".to_string(),
        error: None,
    };

    match &blocks {
        Ok(output) => {
            stats.output_blocks = output.len() as u64;
            stats.sentinels = SentinelCounts::from_blocks(output);
            info!(
                book = %input.book_id,
                input_blocks = stats.input_blocks,
                output_blocks = stats.output_blocks,
                sentinels = stats.sentinels.total(),
                processing_time_ms,
                "Cast book"
            );
        }
        Err(e) => {
            // Rejected before any block was counted
            if let Some(progress) = progress {
                progress.advance(input.blocks.len());
            }
            warn!(book = %input.book_id, "Book rejected: {}", e);
            stats.status = "failed".to_string();
            stats.error = Some(e.to_string());
        }
    }

    BookResult { book_id: input.book_id.clone(), blocks, stats }
}

/// Cast many books concurrently, one blocking worker per book
///
/// Results come back in input order. The progress counter, when given, is
/// finished once every book is done.
pub async fn parse_books_parallel(
    books: Vec<BookInput>,
    quote_system: Arc<QuoteSystem>,
    repository: Arc<dyn CharacterVerseRepository>,
    versification: Versification,
    settings: ParserSettings,
    progress: Option<Arc<ProgressCounter>>,
) -> Result<Vec<BookResult>> {
    let worker_count = num_cpus::get().max(1);
    let permits = Arc::new(Semaphore::new(worker_count));
    let versification = Arc::new(versification);
    let settings = Arc::new(settings);
    let book_count = books.len();
    info!("Casting {} books with up to {} workers", book_count, worker_count);

    let mut tasks = JoinSet::new();
    for (position, input) in books.into_iter().enumerate() {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("Worker pool closed")?;
        let quote_system = Arc::clone(&quote_system);
        let repository = Arc::clone(&repository);
        let versification = Arc::clone(&versification);
        let settings = Arc::clone(&settings);
        let progress = progress.clone();

        debug!(book = %input.book_id, position, "Spawning book worker");
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = cast_book(
                &input,
                &quote_system,
                repository.as_ref(),
                &versification,
                &settings,
                progress.as_deref(),
            );
            (position, result)
        });
    }

    let mut results = Vec::with_capacity(book_count);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("Book worker panicked")?);
    }
    results.sort_by_key(|(position, _)| *position);

    if let Some(progress) = &progress {
        progress.finish();
    }

    let failed = results.iter().filter(|(_, result)| result.blocks.is_err()).count();
    info!("Cast {} books, {} failed", book_count, failed);

    Ok(results.into_iter().map(|(_, result)| result).collect())
}

/// Write run statistics as a JSON array
pub async fn write_stats_file(stats_path: &Path, stats: &[BookStats]) -> Result<()> {
    let json = serde_json::to_vec_pretty(stats).context("Failed to serialize run stats")?;
    let file = tokio::fs::File::create(stats_path)
        .await
        .with_context(|| format!("Cannot create stats file {}", stats_path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}
