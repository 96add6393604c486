//! Batch processing command for multiple W-2 documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use wagescan_core::{ContentKind, IngestionResult, W2Field, W2Pipeline};

use super::load_config;
use super::process::{field_value, format_result, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input files
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

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    result: Option<IngestionResult>,
    error: Option<String>,
    processing_time_ms: u64,
    finished_at: DateTime<Local>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && ContentKind::from_path(p).is_some())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let pipeline = Arc::new(W2Pipeline::from_config(&config));
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        let pb = overall_pb.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let result = tokio::task::spawn_blocking(move || process_single_file(&pipeline, path))
                .await?;
            pb.inc(1);
            anyhow::Ok(result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for i in 0..handles.len() {
        let result = match (&mut handles[i]).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                cancel_pending(&semaphore, &handles[i + 1..]);
                return Err(e);
            }
            Err(e) => {
                cancel_pending(&semaphore, &handles[i + 1..]);
                return Err(e.into());
            }
        };
        if let Some(error_msg) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), error_msg);
            } else {
                overall_pb.abandon();
                let cancelled = cancel_pending(&semaphore, &handles[i + 1..]);
                debug!("Cancelled {} pending files", cancelled);
                error!("Failed to process {}: {}", result.path.display(), error_msg);
                anyhow::bail!(
                    "Processing failed for {}: {}",
                    result.path.display(),
                    error_msg
                );
            }
        }
        results.push(result);
    }

    overall_pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.result.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for processed in &successful {
            if let Some(result) = &processed.result {
                let output_name = processed
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("w2");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                let mut result = result.clone();
                result.raw_text.clear();
                fs::write(&output_path, format_result(&result, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
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

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
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

/// Stop queued work: no further permits are handed out and every pending
/// task is aborted. Files already on the blocking pool run to completion.
fn cancel_pending<T>(semaphore: &Semaphore, pending: &[JoinHandle<T>]) -> usize {
    semaphore.close();
    for handle in pending {
        handle.abort();
    }
    pending.len()
}

fn process_single_file(pipeline: &W2Pipeline, path: PathBuf) -> ProcessResult {
    let file_start = Instant::now();
    let outcome = pipeline.ingest_path(&path, None);
    let processing_time_ms = file_start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => ProcessResult {
            path,
            result: Some(result),
            error: None,
            processing_time_ms,
            finished_at: Local::now(),
        },
        Err(e) => ProcessResult {
            path,
            result: None,
            error: Some(format!("{} [{}]", e, e.kind())),
            processing_time_ms,
            finished_at: Local::now(),
        },
    }
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status", "modality", "dialect"];
    header.extend(W2Field::ALL.iter().map(|f| f.name()));
    header.extend(["warnings", "processing_time_ms", "processed_at", "error"]);
    wtr.write_record(&header)?;

    for processed in results {
        let filename = processed
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let mut row = vec![filename];
        match &processed.result {
            Some(result) => {
                row.push("success".to_string());
                row.push(result.modality.as_str().to_string());
                row.push(result.dialect.as_str().to_string());
                row.extend(W2Field::ALL.iter().map(|f| field_value(result, *f)));
                row.push(result.warnings.len().to_string());
            }
            None => {
                row.push("error".to_string());
                row.extend(std::iter::repeat_n(String::new(), 2 + W2Field::ALL.len() + 1));
            }
        }
        row.push(processed.processing_time_ms.to_string());
        row.push(processed.finished_at.to_rfc3339());
        row.push(processed.error.clone().unwrap_or_default());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_pending_stops_waiting_tasks() {
        let semaphore = Arc::new(Semaphore::new(0));
        let handles: Vec<JoinHandle<bool>> = (0..3)
            .map(|_| {
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move { semaphore.acquire_owned().await.is_ok() })
            })
            .collect();

        assert_eq!(cancel_pending(&semaphore, &handles), 3);
        assert!(semaphore.is_closed());

        for handle in handles {
            // Either aborted outright or woken by the closed semaphore
            assert!(!matches!(handle.await, Ok(true)));
        }
    }
}
