//! pkgwarden - LLM-powered malware triage for Python source distributions
//!
//! A CLI tool that lets an Ollama model inspect an unpacked package
//! through a fixed set of read-only tools and decide whether it is malware.
//!
//! Exit codes:
//!   0 - Not malware
//!   1 - Runtime error (invalid arguments, config, unreachable backend, etc.)
//!   2 - Malware
//!   3 - Indeterminate (no usable answer, iteration cap reached, cancelled)

mod agent;
mod analysis;
mod cli;
mod config;
mod inspector;
mod models;
mod report;

use agent::{AgentConfig, OllamaBackend, OllamaConfig, PackageAnalysisAgent};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use inspector::{PackageInspector, ToolSet};
use models::{AnalysisReport, ReportMetadata, VerdictLabel};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("pkgwarden v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pkgwarden.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, endpoint and iteration limit.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns the process exit code.
async fn run_analysis(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let package_path = args
        .package
        .clone()
        .context("A package directory is required")?;

    // Handle --dry-run: run every tool locally and exit
    if args.dry_run {
        return handle_dry_run(&package_path);
    }

    println!("📦 Package: {}", package_path.display());
    println!("🤖 Initializing AI agent...");
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    println!("   Max iterations: {}", config.agent.max_iterations);
    println!("   Timeout: {}s", config.model.timeout_seconds);

    let backend = OllamaBackend::new(OllamaConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
    })?;
    let model_used = backend.model_name().to_string();

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let agent = PackageAnalysisAgent::new(
        AgentConfig {
            max_iterations: config.agent.max_iterations,
        },
        backend,
        package_path.clone(),
    )
    .with_cancel_token(cancel);

    println!("\n🔬 Running package analysis...");
    let spinner = start_spinner(args.quiet);
    let run = agent.run().await;
    spinner.finish_and_clear();

    let duration = start_time.elapsed().as_secs_f64();
    let tool_invocations = run.trace.len();

    let metadata = ReportMetadata {
        package_path: package_path.display().to_string(),
        analysis_date: Utc::now(),
        model_used,
        max_iterations: config.agent.max_iterations,
        tool_invocations,
        duration_seconds: duration,
    };
    let report = AnalysisReport::new(
        metadata,
        run.outcome,
        run.trace.into_steps(),
        run.final_answer,
    );

    if let Some(ref output) = config.general.output {
        let output = PathBuf::from(output);
        report::write_report(&report, config.general.format, &output)?;
        println!("\n📝 Report saved to: {}", output.display());
    }

    // Print summary
    let icon = match report.outcome.label() {
        VerdictLabel::Malware => "🔴",
        VerdictLabel::NotMalware => "🟢",
        VerdictLabel::Indeterminate => "🟡",
    };
    println!("\n📊 Analysis Summary:");
    println!("   Tool invocations: {}", tool_invocations);
    println!("   Duration: {:.1}s", duration);
    println!("\n{} Analysis result: {}", icon, report.result);

    Ok(report.outcome.exit_code())
}

/// Handle --dry-run: print every tool's observation without calling the LLM.
fn handle_dry_run(package_path: &Path) -> Result<i32> {
    println!("\n🔍 Dry run: running inspection tools (no LLM call)...\n");

    let tools = ToolSet::new(PackageInspector::new(package_path));
    info!(
        "Inspecting {} locally",
        tools.inspector().package_path().display()
    );

    for tool in tools.descriptors() {
        println!("=== {} ===", tool.name);
        println!("{}\n", tools.invoke(tool.name));
    }

    println!("✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Cancel the analysis on Ctrl-C; a second Ctrl-C exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, cancelling analysis");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n❌ Interrupted");
            std::process::exit(1);
        }
    });
}

fn start_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message("Waiting for the agent...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Load configuration from file or use defaults.
///
/// Runs before the tracing subscriber exists, so problems go to stderr directly.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
