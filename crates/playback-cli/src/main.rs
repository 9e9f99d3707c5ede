//! Playback CLI - headless client for the Playback SDK
//!
//! Features:
//! - API key and player license check
//! - Entry resolution (single and batch)
//! - Headless playlist sessions with navigation commands

use clap::{Parser, Subcommand};
use playback_core::SdkConfig;

mod commands;
mod output;

use commands::NavCommand;

/// Playback CLI - drive the Playback SDK without a UI
#[derive(Parser)]
#[command(name = "playback-cli")]
#[command(version)]
#[command(about = "Resolve entries and run headless playback sessions", long_about = None)]
struct Cli {
    /// API key for the metadata service
    #[arg(long, env = "PLAYBACK_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Metadata service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the player license and show what it enables
    Info,

    /// Resolve one or more entries to playable details
    Resolve {
        /// Entry IDs
        #[arg(required = true)]
        entries: Vec<String>,

        /// Bearer token for protected entries
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Load entries into a headless session and navigate it
    Playlist {
        /// Entry IDs, in playlist order
        #[arg(required = true)]
        entries: Vec<String>,

        /// Entry to start on
        #[arg(short, long)]
        play: Option<String>,

        /// Bearer token for protected entries
        #[arg(short, long)]
        token: Option<String>,

        /// Commands to apply in order: next, prev, first, last, play, pause,
        /// background, foreground, seek:<entry>
        #[arg(short, long, value_delimiter = ',')]
        nav: Vec<NavCommand>,

        /// Start paused
        #[arg(long)]
        no_autoplay: bool,

        /// Disable background playback
        #[arg(long)]
        no_background: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    playback_core::init();

    let mut config = SdkConfig::new(cli.api_key.unwrap_or_default());
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }

    match cli.command {
        Commands::Info => {
            commands::info(config, &cli.format).await?;
        }
        Commands::Resolve { entries, token } => {
            commands::resolve(config, &entries, token.as_deref(), &cli.format).await?;
        }
        Commands::Playlist { entries, play, token, nav, no_autoplay, no_background } => {
            let options = commands::PlaylistArgs {
                entries,
                play,
                token,
                nav,
                autoplay: !no_autoplay,
                background: !no_background,
            };
            commands::playlist(config, options, &cli.format).await?;
        }
    }

    Ok(())
}
