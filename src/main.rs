//! SearchOnion: a URL crawl frontier
//!
//! Command line entry point.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use searchonion::config::{Config, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "searchonion")]
#[command(about = "URL crawl frontier with per-domain politeness and bounded crawl history")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawler until Ctrl+C
    Run {
        /// URLs to admit before starting
        seeds: Vec<String>,
    },

    /// Add a URL to the crawl queue
    Add {
        /// URL to add
        url: String,
    },

    /// Show the crawl queue size
    Queue,

    /// Show crawl history totals
    History,

    /// Write a default configuration file
    Init {
        /// Directory to write config.toml into
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.with_verbosity(verbose);

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load or create config
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    init_logging(&config.logging, cli.verbose)?;

    // Override data dir if specified
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = data_dir;
    }

    match cli.command {
        Commands::Run { seeds } => {
            std::fs::create_dir_all(&config.node.data_dir)?;
            commands::run_crawler(config, seeds).await
        }
        Commands::Add { url } => commands::add_url(config, url).await,
        Commands::Queue => commands::show_queue(config).await,
        Commands::History => commands::show_history(config).await,
        Commands::Init { path } => commands::init_config(path).await,
    }
}
