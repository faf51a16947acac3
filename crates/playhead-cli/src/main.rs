//! Playhead CLI - Headless driver for the playback engine
//!
//! Features:
//! - SRT parsing and WebVTT conversion
//! - Active cue lookup and playback clock simulation
//! - Subtitle fetching through the media server API
//! - Quality level listing for HLS master playlists
//! - Streaming backend event replay

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Playhead CLI - Playback session toolkit
#[derive(Parser)]
#[command(name = "playhead")]
#[command(version)]
#[command(about = "Subtitle sync, track selection and streaming session toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Media server base URL, overrides the configuration file
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an SRT file and list its chunks
    Parse {
        /// Path to the SRT file
        input: PathBuf,

        /// Print the payload converted to WebVTT instead
        #[arg(long)]
        vtt: bool,

        /// Strip inline markup from chunk text
        #[arg(long)]
        strip_tags: bool,
    },

    /// Show the subtitle active at a playback time
    Cue {
        /// Path to the SRT file
        input: PathBuf,

        /// Playback time, in milliseconds or HH:MM:SS,mmm
        time: String,
    },

    /// Walk a simulated playback clock over an SRT file
    Simulate {
        /// Path to the SRT file
        input: PathBuf,

        /// Clock step in milliseconds
        #[arg(short, long, default_value = "250")]
        step: u64,

        /// Start time, in milliseconds or HH:MM:SS,mmm
        #[arg(long, default_value = "0")]
        from: String,

        /// End time (default: end of the last chunk)
        #[arg(long)]
        to: Option<String>,
    },

    /// Fetch a subtitle payload from the media server
    Fetch {
        /// Media item id, for container subtitles
        #[arg(long, requires = "track", conflicts_with = "external")]
        media: Option<String>,

        /// Subtitle track index within the media item
        #[arg(long, requires = "media")]
        track: Option<usize>,

        /// External subtitle id
        #[arg(long)]
        external: Option<String>,

        /// Print the chunk active at this time instead of the chunk list
        #[arg(long)]
        at: Option<String>,
    },

    /// List the quality levels of an HLS master playlist
    Levels {
        /// URL or path to the master playlist
        manifest: String,
    },

    /// Replay streaming backend events through a session controller
    Replay {
        /// JSON file holding an array of backend events
        events: PathBuf,

        /// Terminate after this many fatal recoveries
        #[arg(long)]
        max_recoveries: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    playhead_core::init();

    match cli.command {
        Commands::Parse { input, vtt, strip_tags } => {
            commands::parse(&input, vtt, strip_tags, &cli.format)?;
        }
        Commands::Cue { input, time } => {
            commands::cue(&input, &time, &cli.format)?;
        }
        Commands::Simulate { input, step, from, to } => {
            commands::simulate(&input, step, &from, to.as_deref(), &cli.format)?;
        }
        Commands::Fetch { media, track, external, at } => {
            let config = commands::load_config(cli.config.as_deref(), cli.server.as_deref())?;
            let source = match (media, track, external) {
                (Some(media), Some(track), None) => commands::FetchSource::Container { media, track },
                (None, None, Some(id)) => commands::FetchSource::External(id),
                _ => anyhow::bail!("pass either --media and --track, or --external"),
            };
            commands::fetch(config, source, at.as_deref(), &cli.format).await?;
        }
        Commands::Levels { manifest } => {
            let config = commands::load_config(cli.config.as_deref(), cli.server.as_deref())?;
            commands::levels(&config, &manifest, &cli.format).await?;
        }
        Commands::Replay { events, max_recoveries } => {
            let config = commands::load_config(cli.config.as_deref(), cli.server.as_deref())?;
            commands::replay(&config, &events, max_recoveries, &cli.format)?;
        }
    }

    Ok(())
}
