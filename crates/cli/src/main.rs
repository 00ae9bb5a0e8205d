use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use roas_core::DEFAULT_THRESHOLD;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "roas-sync")]
#[command(about = "Push weekly campaign ROAS from performance emails into the tracking sheet")]
#[command(version)]
struct Cli {
    /// Config file (TOML, or JSON by extension)
    #[arg(long, global = true, env = "ROAS_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a report email and print it as JSON
    Parse {
        /// Email body (plain text or HTML)
        email: PathBuf,
    },

    /// Match a report against a local label list and print the plan
    #[command(after_help = "\
The label file holds one sheet label per line; the line number is the row.

Example:
  roas-sync match wk37.eml --labels labels.txt")]
    Match {
        email: PathBuf,

        /// Newline-separated sheet labels
        #[arg(long)]
        labels: PathBuf,

        /// Minimum overlap for a fuzzy match, in (0, 1]
        #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
        threshold: f64,
    },

    /// Reconcile a report and write it to the configured sheet
    Push {
        email: PathBuf,

        /// Plan the writes without touching the sheet
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify credentials, spreadsheet access and the read range
    #[command(after_help = "\
Tries the app credentials against both Lark and Feishu, then checks the
configured spreadsheet, tab and read range. Nothing is written.

Example:
  roas-sync check --config roas.toml")]
    Check,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let t: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    config::validate_threshold(t).map_err(|e| e.to_string())
}

fn load_config(path: Option<PathBuf>) -> Result<config::Config> {
    let path = match path {
        Some(path) => path,
        None => config::default_path()?,
    };
    tracing::info!("Using config {}", path.display());
    Ok(config::Config::load(&path)?)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { email } => commands::parse(&email),
        Commands::Match {
            email,
            labels,
            threshold,
        } => commands::match_labels(&email, &labels, threshold),
        Commands::Push { email, dry_run } => {
            let config = load_config(cli.config)?;
            commands::push(&email, &config, dry_run).await
        }
        Commands::Check => {
            let config = load_config(cli.config)?;
            commands::check(&config).await
        }
    }
}
