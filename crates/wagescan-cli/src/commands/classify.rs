//! Classify command - show which layout dialect a document is read as.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use wagescan_core::{classify, normalize_whitespace, ContentKind, W2Pipeline};

use super::load_config;

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// PDF, image, or plain text file with already-extracted text
    #[arg(required = true)]
    input: PathBuf,

    /// Print only the dialect
    #[arg(short, long)]
    quiet: bool,
}

pub async fn run(args: ClassifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let data = fs::read(&args.input)?;

    let (dialect, text) = match ContentKind::sniff(&data).or_else(|| ContentKind::from_path(&args.input)) {
        Some(kind) => {
            let config = load_config(config_path)?;
            let pipeline = W2Pipeline::from_config(&config);
            let result = pipeline
                .ingest_bytes(&data, kind)
                .map_err(|e| anyhow::anyhow!("{} [{}]", e, e.kind()))?;
            (result.dialect, result.raw_text)
        }
        None => {
            let text = normalize_whitespace(&String::from_utf8_lossy(&data));
            if text.is_empty() {
                anyhow::bail!("No text to classify in {}", args.input.display());
            }
            (classify(&text), text)
        }
    };

    if args.quiet {
        println!("{}", dialect);
        return Ok(());
    }

    println!("{} {}", style("Dialect:").bold(), dialect);
    println!();
    println!("{}", text);

    Ok(())
}
