//! Batch processing command for multiple receipt files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::{StreamExt, stream};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use recibo_core::{ProcessedDocument, ReceiptEngine};

use super::process::{OutputFormat, RECORD_COLUMNS, format_processed, method_label, record_values};
use super::{build_engine, is_supported, load_config, load_document};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching receipt files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of files processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    processed: Option<ProcessedDocument>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let engine = Arc::new(build_engine(load_config(config_path)?)?);

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )?
            .progress_chars("=>-"),
    );

    let mut results: Vec<FileResult> = stream::iter(files)
        .map(|path| {
            let engine = Arc::clone(&engine);
            async move { process_file(&engine, path).await }
        })
        .buffer_unordered(args.jobs.max(1))
        .inspect(|_| progress.inc(1))
        .collect()
        .await;
    results.sort_by(|a, b| a.path.cmp(&b.path));

    progress.finish_with_message("Complete");

    let failed: Vec<&FileResult> = results.iter().filter(|r| r.error.is_some()).collect();
    if !args.continue_on_error {
        if let Some(first) = failed.first() {
            anyhow::bail!(
                "Processing failed for {}: {}",
                first.path.display(),
                first.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            let Some(processed) = &result.processed else {
                continue;
            };
            let stem = result.path.file_stem().and_then(|s| s.to_str()).unwrap_or("receipt");
            let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));

            fs::write(&output_path, format_processed(processed, args.format)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let accepted = results
        .iter()
        .filter(|r| r.processed.as_ref().is_some_and(|p| p.outcome.accepted))
        .count();
    let rejected = results.len() - accepted - failed.len();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} accepted, {} rejected, {} failed",
        style(accepted).green(),
        style(rejected).yellow(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_file(engine: &ReceiptEngine, path: PathBuf) -> FileResult {
    match load_document(&path, None, None) {
        Ok(input) => FileResult {
            processed: Some(engine.process(&input).await),
            error: None,
            path,
        },
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            FileResult {
                processed: None,
                error: Some(e.to_string()),
                path,
            }
        }
    }
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status", "extraction_id", "method", "confidence"];
    header.extend(RECORD_COLUMNS);
    header.extend(["processing_time_ms", "error"]);
    wtr.write_record(&header)?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let row: Vec<String> = match &result.processed {
            Some(processed) => {
                let status = if processed.outcome.accepted { "accepted" } else { "rejected" };
                let mut row = vec![
                    filename,
                    status.to_string(),
                    processed.extraction_id.map(|id| id.to_string()).unwrap_or_default(),
                    method_label(processed.outcome.method).to_string(),
                    processed.outcome.overall_confidence.to_string(),
                ];
                row.extend(record_values(processed));
                row.extend([processed.processing_time_ms.to_string(), String::new()]);
                row
            }
            None => {
                let mut row = vec![filename, "error".to_string()];
                row.resize(header.len() - 1, String::new());
                row.push(result.error.clone().unwrap_or_default());
                row
            }
        };
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
