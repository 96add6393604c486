//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use wagescan_core::WagescanConfig;

use super::default_config_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "pdf.min_text_length")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value (JSON, or a bare string)
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

/// Runs against the file given with `--config`, else the user config file.
pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, &path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

fn read_or_default(path: &Path) -> anyhow::Result<WagescanConfig> {
    if path.exists() {
        Ok(WagescanConfig::from_file(path)?)
    } else {
        Ok(WagescanConfig::default())
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let config = read_or_default(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init_config(args: InitArgs, path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    WagescanConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

/// Walk a dotted key through the serialized configuration.
fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.').try_fold(json, |current, part| {
        current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(read_or_default(path)?)?;
    println!("{}", serde_json::to_string_pretty(lookup(&json, key)?)?);
    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let config = read_or_default(path)?;

    let parsed_value: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let mut json = serde_json::to_value(&config)?;

    // Only existing leaves can be set; unknown keys would be dropped on load.
    let (parent_key, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };
    let parent = match parent_key {
        Some(parent_key) => {
            let mut current = &mut json;
            for part in parent_key.split('.') {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;
            }
            current
        }
        None => &mut json,
    };
    let slot = parent
        .as_object_mut()
        .and_then(|obj| obj.get_mut(leaf))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    if slot.is_object() {
        anyhow::bail!("{} is a section; set one of its keys instead", key);
    }
    *slot = parsed_value.clone();

    let updated: WagescanConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    updated.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'wagescan config init' to create a configuration file.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested_key() {
        let json = serde_json::to_value(WagescanConfig::default()).unwrap();
        assert_eq!(lookup(&json, "pdf.min_text_length").unwrap(), &Value::from(50));
        assert_eq!(lookup(&json, "ocr.backend").unwrap(), &Value::from("tesseract"));
        assert!(lookup(&json, "pdf.nope").is_err());
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        set_config(&path, "normalization.deskew", "false").unwrap();
        set_config(&path, "ocr.backend", "none").unwrap();

        let config = WagescanConfig::from_file(&path).unwrap();
        assert!(!config.normalization.deskew);
        assert_eq!(
            config.ocr.backend,
            wagescan_core::models::config::OcrBackend::None
        );
    }

    #[test]
    fn test_set_rejects_unknown_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(set_config(&path, "ocr.colour", "red").is_err());
        assert!(set_config(&path, "pdf", "1").is_err());
        assert!(set_config(&path, "pdf.render_dpi", "high").is_err());
        assert!(!path.exists());
    }
}
