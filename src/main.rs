use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use versecast::character_verse::{CharacterVerseRepository, Versification};
use versecast::discovery::{self, DiscoveryConfig};
use versecast::incremental;
use versecast::parallel_processing::{self, BookInput, BookStats, ProgressCounter};
use versecast::reader::{self, AsyncFileReader, BookFile, ReaderConfig};
use versecast::speaker::BookId;

#[derive(Parser, Debug)]
#[command(name = "versecast")]
#[command(about = "Splits translated Scripture into narrator and character blocks")]
#[command(version)]
struct Args {
    /// Root directory to scan for *.blocks.json books
    root_dir: PathBuf,

    /// Project configuration: quote system levels, dialogue marks and [parser] settings (TOML)
    #[arg(long)]
    quote_system: PathBuf,

    /// Tab-delimited character-verse reference data
    #[arg(long)]
    character_verse: PathBuf,

    /// Project-specific character-verse entries layered over the reference data
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Versification of the project text (overrides the config file)
    #[arg(long)]
    versification: Option<String>,

    /// Cast books even when their output already exists
    #[arg(long)]
    overwrite_all: bool,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,

    /// Suppress console progress bar
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging, one object per event
    tracing_subscriber::fmt().with_target(false).json().init();

    let args = Args::parse();

    info!("Starting versecast");
    info!(?args, "Parsed CLI arguments");

    if !args.root_dir.exists() {
        anyhow::bail!("Root directory does not exist: {}", args.root_dir.display());
    }
    if !args.root_dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", args.root_dir.display());
    }

    let config = reader::read_project_config(&args.quote_system).await?;
    let quote_system = Arc::new(config.build_quote_system()?);
    let versification = args
        .versification
        .as_deref()
        .map(Versification::new)
        .or_else(|| config.versification.clone())
        .unwrap_or_default();

    let mut character_verse = reader::read_character_verse(&args.character_verse).await?;
    if let Some(overrides) = &args.overrides {
        let overrides = reader::read_character_verse(overrides).await?;
        character_verse = character_verse.with_overrides(overrides);
    }
    let repository: Arc<dyn CharacterVerseRepository> = Arc::new(character_verse);
    info!(versification = versification.name(), "Reference data ready");

    let discovery_config = DiscoveryConfig { fail_fast: args.fail_fast };
    let discovered = discovery::collect_discovered_files(&args.root_dir, discovery_config).await?;
    let mut book_paths: Vec<PathBuf> = discovered
        .into_iter()
        .filter(|file| file.error.is_none())
        .map(|file| file.path)
        .collect();
    book_paths.sort();
    info!("Book discovery completed: {} books found", book_paths.len());

    let file_reader = AsyncFileReader::new(ReaderConfig {
        fail_fast: args.fail_fast,
        ..Default::default()
    });
    let mut all_stats: Vec<BookStats> = Vec::new();
    let mut inputs: Vec<BookInput> = Vec::new();
    let mut input_paths: Vec<PathBuf> = Vec::new();

    for path in book_paths {
        if !args.overwrite_all && incremental::output_exists(&path) {
            let book = incremental::book_id_from_path(&path).unwrap_or_default();
            info!("Skipping {}: already cast", path.display());
            all_stats.push(BookStats::skipped(&BookId::new(book), &path));
            continue;
        }

        let (book, read_stats) = file_reader.read_book(&path).await?;
        let Some(book) = book else {
            all_stats.push(BookStats {
                book: incremental::book_id_from_path(&path).unwrap_or_default(),
                path: Some(read_stats.file_path),
                input_blocks: 0,
                output_blocks: 0,
                sentinels: Default::default(),
                processing_time_ms: read_stats.duration_ms,
                status: "failed".to_string(),
                error: read_stats.read_error,
            });
            continue;
        };

        if incremental::book_id_from_path(&path).as_deref() != Some(book.book.as_str()) {
            warn!("File {} holds book {}", path.display(), book.book);
        }
        inputs.push(BookInput::new(book.book, book.blocks));
        input_paths.push(path);
    }

    let progress_bar = if args.no_progress || inputs.is_empty() {
        None
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")?
                .progress_chars("##-"),
        );
        Some(bar)
    };
    let progress = progress_bar.clone().map(|bar| {
        Arc::new(ProgressCounter::new(parallel_processing::total_blocks(&inputs), move |percent| {
            bar.set_position(u64::from(percent))
        }))
    });

    let results = parallel_processing::parse_books_parallel(
        inputs,
        quote_system,
        repository,
        versification,
        config.parser.clone(),
        progress,
    )
    .await?;

    if let Some(bar) = &progress_bar {
        bar.finish_with_message("Complete");
    }

    let mut cast_count = 0;
    for (result, path) in results.into_iter().zip(input_paths) {
        let mut stats = result.stats;
        stats.path = Some(path.display().to_string());

        match result.blocks {
            Ok(blocks) => {
                let output = BookFile { book: result.book_id, blocks };
                let output_path = incremental::write_output(&path, &output).await?;
                info!("Wrote {}", output_path.display());
                cast_count += 1;
            }
            Err(e) => {
                if args.fail_fast {
                    anyhow::bail!("Casting {} failed: {}", path.display(), e);
                }
            }
        }
        all_stats.push(stats);
    }

    parallel_processing::write_stats_file(&args.stats_out, &all_stats).await?;

    let failed_count = all_stats.iter().filter(|stats| stats.status == "failed").count();
    let skipped_count = all_stats.iter().filter(|stats| stats.status == "skipped").count();
    let review_count: u64 = all_stats.iter().map(|stats| stats.sentinels.total()).sum();
    println!("versecast v{}", env!("CARGO_PKG_VERSION"));
    println!("  Books cast: {cast_count}");
    println!("  Books skipped: {skipped_count}");
    if failed_count > 0 {
        println!("  Books failed: {failed_count}");
    }
    println!("  Blocks needing review: {review_count}");
    println!("  Stats written to {}", args.stats_out.display());

    info!("Run completed: {} cast, {} skipped, {} failed", cast_count, skipped_count, failed_count);
    Ok(())
}
