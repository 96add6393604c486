//! Process command - extract data from a single W-2 document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use wagescan_core::models::config::OcrBackend;
use wagescan_core::w2::rules::format_amount;
use wagescan_core::{IngestionResult, W2Field, W2Pipeline};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, PNG or JPEG)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Declared MIME type (default: sniffed from the file)
    #[arg(long)]
    content_type: Option<String>,

    /// OCR backend override (tesseract, onnx, none)
    #[arg(long)]
    ocr: Option<OcrBackend>,

    /// Include the normalized document text in the output
    #[arg(long)]
    show_text: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(backend) = args.ocr {
        config.ocr.backend = backend;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Extracting {}", args.input.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let input = args.input.clone();
    let content_type = args.content_type.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let pipeline = W2Pipeline::from_config(&config);
        pipeline.ingest_path(&input, content_type.as_deref())
    })
    .await?;

    pb.finish_and_clear();

    let mut result = outcome.map_err(|e| {
        anyhow::anyhow!(
            "Failed to process {}: {} [{}]",
            args.input.display(),
            e,
            e.kind()
        )
    })?;

    if !args.show_text {
        result.raw_text.clear();
    }

    if !result.warnings.is_empty() {
        eprintln!("{}", style("Warnings:").yellow());
        for warning in &result.warnings {
            eprintln!("  - {}", warning);
        }
    }

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_result(result: &IngestionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

/// Plain value of a field for tabular output; empty when absent.
pub fn field_value(result: &IngestionResult, field: W2Field) -> String {
    let record = &result.field_values;
    if !record.is_present(field) {
        return String::new();
    }
    match record.get_amount(field) {
        Some(amount) => amount.to_string(),
        None => record.get_text(field).unwrap_or_default().to_string(),
    }
}

fn format_csv(result: &IngestionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = W2Field::ALL.iter().map(|f| f.name()).collect();
    header.extend(["modality", "dialect"]);
    wtr.write_record(&header)?;

    let mut row: Vec<String> = W2Field::ALL
        .iter()
        .map(|f| field_value(result, *f))
        .collect();
    row.push(result.modality.as_str().to_string());
    row.push(result.dialect.as_str().to_string());
    wtr.write_record(&row)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &IngestionResult) -> String {
    let record = &result.field_values;
    let mut output = String::new();

    output.push_str(&format!(
        "W-2 ({} layout, {})\n\n",
        result.dialect,
        result.modality.as_str()
    ));

    for field in W2Field::ALL {
        let value = if !record.is_present(field) {
            "-".to_string()
        } else if let Some(amount) = record.get_amount(field) {
            format!("${}", format_amount(amount))
        } else {
            record.get_text(field).unwrap_or_default().to_string()
        };
        output.push_str(&format!("  {:<24} {}\n", field.name(), value));
    }

    if !result.raw_text.is_empty() {
        output.push_str("\nText:\n");
        output.push_str(&result.raw_text);
        output.push('\n');
    }

    output
}
