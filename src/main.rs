//! timeout-guard command line.
//!
//! Runs connection checks against backend-data endpoints through the
//! backend-data guard and prints one report per endpoint.
//!
//! ```text
//! timeout-guard --config guard.toml check https://api.example.com/listings --operation "listing query"
//! timeout-guard config
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use timeout_guard::config::load_or_default;
use timeout_guard::health::{EndpointProbe, ProbeReport};
use timeout_guard::observability::logging;
use timeout_guard::{GuardConfig, TimeoutGuard};

#[derive(Parser)]
#[command(name = "timeout-guard")]
#[command(about = "Deadline-guarded connection checks for backend-data endpoints", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check endpoints through the backend-data guard
    Check {
        /// Endpoints to check
        #[arg(required = true)]
        urls: Vec<String>,

        /// Operation name used in the timeout message
        #[arg(short, long, default_value = "operation")]
        operation: String,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability)?;

    match cli.command {
        Commands::Check { urls, operation, json } => {
            let guard = TimeoutGuard::new(&config.timeouts);

            tracing::info!(
                endpoints = urls.len(),
                backend_deadline_ms = config.timeouts.backend_ms,
                retries_enabled = config.retries.enabled,
                "Running connection checks"
            );

            let probe = EndpointProbe::new(guard).with_retries(config.retries.clone());
            let reports = probe.probe_all(&urls, &operation).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!("{}", report);
                }
            }

            let code = exit_code(&reports);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Config => {
            print!("{}", render_config(&config)?);
        }
    }

    Ok(())
}

/// Non-zero when any endpoint failed its check.
fn exit_code(reports: &[ProbeReport]) -> i32 {
    if reports.iter().all(ProbeReport::is_healthy) {
        0
    } else {
        1
    }
}

fn render_config(config: &GuardConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
