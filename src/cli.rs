//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// pkgwarden - LLM-powered malware triage for Python source distributions
///
/// Points a local model at an unpacked sdist and lets it inspect the
/// metadata, setup.py, __init__.py and file layout before deciding
/// whether the package is malware. The package is only ever read.
///
/// Examples:
///   pkgwarden ./requests-2.32.3
///   pkgwarden ./suspicious-0.1 --model qwen2.5:14b --max-iterations 6
///   pkgwarden ./suspicious-0.1 --format json --output verdict.json
///   pkgwarden ./suspicious-0.1 --dry-run
///   pkgwarden --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory of the unpacked package to analyze
    #[arg(value_name = "PACKAGE_DIR", required_unless_present = "init_config")]
    pub package: Option<PathBuf>,

    /// Ollama model to use for analysis
    ///
    /// Can also be set via PKGWARDEN_MODEL env var or .pkgwarden.toml config.
    #[arg(short, long, env = "PKGWARDEN_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Maximum reasoning iterations before giving up (default: 10)
    #[arg(long, value_name = "COUNT")]
    pub max_iterations: Option<usize>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pkgwarden.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: run every inspection tool locally without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .pkgwarden.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.package {
            None => return Err("A package directory is required".to_string()),
            Some(ref path) if !path.exists() => {
                return Err(format!(
                    "Package directory does not exist: {}",
                    path.display()
                ));
            }
            Some(ref path) if !path.is_dir() => {
                return Err(format!(
                    "Package path is not a directory: {}",
                    path.display()
                ));
            }
            Some(_) => {}
        }

        if let Some(ref url) = self.ollama_url {
            if !self.dry_run && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_iterations == Some(0) {
            return Err("Max iterations must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
