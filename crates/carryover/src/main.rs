//! carryover CLI
//!
//! Resumable transfer of categorized items between mail systems.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use carryover::checkpoint::read_checkpoint;
use carryover::orchestrator::{TransferPlan, TransferReport};
use carryover::{Orchestrator, ProgressReporter, TransferConfig, TransferOutcome};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "carryover")]
#[command(version)]
#[command(
    about = "Resumable, checkpointed transfer of labelled items between mail systems",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer every pending item, resuming from the checkpoint
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Only count what would be transferred
        #[arg(long)]
        dry_run: bool,

        /// Page size override
        #[arg(long)]
        page_size: Option<usize>,

        /// Checkpoint file override
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,
    },

    /// Count pending items without transferring anything
    Plan {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Checkpoint file override
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,
    },

    /// Show the category to container mapping
    Mapping {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Checkpoint file override
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,
    },

    /// Summarize the checkpoint without contacting the source
    Status {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Checkpoint file override
        #[arg(long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "carryover.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run {
            config,
            dry_run,
            page_size,
            checkpoint,
        } => {
            let config = load_config(&config, page_size, checkpoint)?;
            if dry_run {
                plan(&config).await
            } else {
                run_transfer(&config).await
            }
        }
        Commands::Plan { config, checkpoint } => {
            let config = load_config(&config, None, checkpoint)?;
            plan(&config).await
        }
        Commands::Mapping { config, checkpoint } => {
            let config = load_config(&config, None, checkpoint)?;
            show_mapping(&config).await
        }
        Commands::Status { config, checkpoint } => {
            let config = load_config(&config, None, checkpoint)?;
            show_status(&config.settings.checkpoint_path)
        }
        Commands::Validate { config } => validate_config(&config),
        Commands::Init { output, force } => generate_config(&output, force),
    }
}

fn load_config(
    path: &Path,
    page_size: Option<usize>,
    checkpoint: Option<PathBuf>,
) -> anyhow::Result<TransferConfig> {
    info!("Loading configuration from {:?}", path);
    let mut config = TransferConfig::from_file(path)?;

    if let Some(size) = page_size {
        config.settings.page_size = size;
    }
    if let Some(path) = checkpoint {
        config.settings.checkpoint_path = path;
    }

    config.validate()?;
    Ok(config)
}

async fn run_transfer(config: &TransferConfig) -> anyhow::Result<ExitCode> {
    let cancel_token = setup_signal_handler();
    let progress = ProgressReporter::new();

    let mut orchestrator = Orchestrator::from_config(config)?
        .with_cancellation(cancel_token)
        .with_observer(progress.clone());

    match orchestrator.run().await {
        Ok(report) => {
            progress.finish(report_headline(report.outcome));
            print_report(&report);
            Ok(ExitCode::from(report.outcome.exit_code() as u8))
        }
        Err(e) => {
            progress.finish("Transfer aborted");
            print_report(orchestrator.report());
            eprintln!("\nError: {}", e);
            eprintln!(
                "   The checkpoint at {} is intact; rerun to resume.",
                config.settings.checkpoint_path.display()
            );
            Ok(ExitCode::from(TransferOutcome::Aborted.exit_code() as u8))
        }
    }
}

fn report_headline(outcome: TransferOutcome) -> &'static str {
    match outcome {
        TransferOutcome::Complete => "Transfer complete",
        TransferOutcome::Incomplete => "Transfer incomplete",
        TransferOutcome::Interrupted => "Transfer interrupted",
        TransferOutcome::Aborted => "Transfer aborted",
    }
}

fn print_report(report: &TransferReport) {
    println!("\n{}", report_headline(report.outcome));
    println!("   Session:     {}", report.session_id);
    println!("   Transferred: {}", report.transferred);
    println!("   Skipped:     {}", report.duplicates_skipped);
    println!("   Failed:      {}", report.failed.len());
    println!("   Duration:    {:.2}s", report.duration_secs);
    println!("   Throughput:  {:.1} items/sec", report.throughput());

    for failed in &report.failed {
        println!("   - {} in '{}': {}", failed.item_id, failed.category, failed.reason);
    }
    for (category, reason) in &report.categories_aborted {
        println!("   '{}' left incomplete: {}", category, reason);
    }
    for category in &report.vanished_categories {
        println!("   '{}' no longer exists in the source", category);
    }
    for category in &report.excluded_categories {
        println!("   '{}' is excluded by configuration", category);
    }
    match report.outcome {
        TransferOutcome::Interrupted | TransferOutcome::Incomplete => {
            println!("   Rerun the same command to resume.");
        }
        TransferOutcome::Complete | TransferOutcome::Aborted => {}
    }
}

async fn plan(config: &TransferConfig) -> anyhow::Result<ExitCode> {
    info!("Dry run - nothing will be written");
    let orchestrator = Orchestrator::from_config(config)?;
    let plan = orchestrator.plan().await?;
    print_plan(&plan);
    Ok(ExitCode::SUCCESS)
}

fn print_plan(plan: &TransferPlan) {
    println!("\nTransfer plan");
    match &plan.session_id {
        Some(id) => println!("   Resuming session {}", id),
        None => println!("   New session"),
    }
    for category in &plan.categories {
        let status = if category.complete { " (complete)" } else { "" };
        println!(
            "   {} -> {}: {} items, {} already transferred, {} pending{}",
            category.category,
            category.container,
            category.total_items,
            category.already_transferred,
            category.pending(),
            status
        );
    }
    if !plan.excluded.is_empty() {
        println!("   Excluded: {}", plan.excluded.join(", "));
    }
    if !plan.vanished.is_empty() {
        println!("   No longer in source: {}", plan.vanished.join(", "));
    }
    println!(
        "   Total: {} items, {} pending",
        plan.total_items(),
        plan.pending_items()
    );
}

async fn show_mapping(config: &TransferConfig) -> anyhow::Result<ExitCode> {
    let orchestrator = Orchestrator::from_config(config)?;
    let preview = orchestrator.preview_mapping().await?;

    println!("\nCategory mapping");
    for entry in &preview.entries {
        println!(
            "   {} -> {} [{}]",
            entry.category, entry.container, entry.origin
        );
    }
    if !preview.excluded.is_empty() {
        println!("   Excluded: {}", preview.excluded.join(", "));
    }
    println!(
        "   {} categories mapped, {} excluded",
        preview.entries.len(),
        preview.excluded.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn show_status(checkpoint_path: &Path) -> anyhow::Result<ExitCode> {
    if !checkpoint_path.exists() {
        println!("No checkpoint at {}", checkpoint_path.display());
        return Ok(ExitCode::SUCCESS);
    }
    let file = read_checkpoint(checkpoint_path)?;
    let session = &file.session;

    println!("\nSession {}", session.session_id);
    println!(
        "   Categories:  {}/{} complete",
        session.completed_categories, session.total_categories
    );
    if let Some(current) = &session.current_category {
        println!("   In progress: {}", current);
    }
    let transferred: usize = file.transferred_items.values().map(|ids| ids.len()).sum();
    println!("   Transferred: {}", transferred);
    for (category, ids) in &file.transferred_items {
        let marker = if session.is_category_complete(category) {
            "done"
        } else {
            "open"
        };
        println!("     {} [{}]: {}", category, marker, ids.len());
    }
    let failed: usize = file.failed_items.values().map(|ids| ids.len()).sum();
    if failed > 0 {
        println!("   Failed:      {}", failed);
        for (category, items) in &file.failed_items {
            for (id, reason) in items {
                println!("     {} in '{}': {}", id, category, reason);
            }
        }
    }
    println!("   Updated:     {}", file.updated_at.to_rfc3339());
    Ok(ExitCode::SUCCESS)
}

fn validate_config(config_path: &Path) -> anyhow::Result<ExitCode> {
    info!("Validating configuration from {:?}", config_path);

    let config = TransferConfig::from_file(config_path)?;
    config.validate()?;

    println!("Configuration is valid");
    println!("   Page size:   {}", config.settings.page_size);
    println!(
        "   Checkpoint:  {} (every {} items)",
        config.settings.checkpoint_path.display(),
        config.settings.checkpoint_interval
    );
    println!("   Overrides:   {}", config.settings.mapping.overrides.len());
    Ok(ExitCode::SUCCESS)
}

fn generate_config(output: &Path, force: bool) -> anyhow::Result<ExitCode> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, use --force to overwrite",
            output.display()
        );
    }
    std::fs::write(output, CONFIG_TEMPLATE)?;
    println!("Generated configuration: {}", output.display());
    println!(
        "   Edit the file and run: carryover run --config {}",
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Cancels the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nStopping after the current item...");
                    token.cancel();
                });
            }
            Err(e) => warn!("Failed to install signal handler: {}", e),
        }
    }

    cancel_token
}

/// Cancels the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current item...");
            token.cancel();
        }
    });

    cancel_token
}

const CONFIG_TEMPLATE: &str = r#"# carryover configuration
source:
  type: json_file
  path: ./export.json

destination:
  type: directory
  path: ./mail

settings:
  page_size: 50
  checkpoint_path: progress.json
  checkpoint_interval: 1  # save after every N committed items
  retry:
    max_attempts: 3
    base_delay_ms: 1000
    max_delay_ms: 60000
    jitter: false
  mapping:
    overrides:
      "[Gmail]/Sent Mail": Sent
    # exclude: [CHAT, CATEGORY_FORUMS, CATEGORY_UPDATES, CATEGORY_PROMOTIONS, CATEGORY_SOCIAL]
    strip_prefixes: ["[Gmail]/"]
    substitute: "_"
    case_insensitive: true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid_config() {
        let config: TransferConfig = serde_yaml::from_str(CONFIG_TEMPLATE).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.settings.mapping.overrides["[Gmail]/Sent Mail"], "Sent");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "carryover",
            "run",
            "--config",
            "t.yaml",
            "--page-size",
            "10",
            "--dry-run",
            "-v",
        ]);

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Run {
                dry_run: true,
                page_size: Some(10),
                ..
            }
        ));
    }
}
