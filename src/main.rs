mod commands;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use pipewright::config::DEFAULT_CONFIG_FILE;

// ============================================================================
// CLI Types
// ============================================================================

/// Pipewright - runs generated collection and processing scripts against a
/// page and submits the derived answer
#[derive(Parser, Debug)]
#[command(version = pipewright::build_info::VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the pipeline once against a page and print the result as JSON
    Run {
        /// Page to solve
        #[arg(long)]
        url: String,

        /// Identity sent with the submission
        #[arg(long)]
        email: String,

        /// Secret sent with the submission (defaults to server.secret)
        #[arg(long)]
        secret: Option<String>,

        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },

    /// Screen a script against the denylist without running it
    CheckScript {
        /// Script file to check
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            commands::serve::run(&config, host, port).await?;
        }
        Commands::Run {
            url,
            email,
            secret,
            config,
        } => {
            commands::run::run(&config, &url, &email, secret).await?;
        }
        Commands::CheckScript { path } => {
            if !commands::check_script::run(&path).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
