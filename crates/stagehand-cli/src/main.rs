//! Stagehand CLI - Playback Session Toolkit
//!
//! Features:
//! - Content type resolution for URLs and paths
//! - Renderer order planning per extension mode
//! - Scripted playback sessions against the simulated engine
//! - Effective configuration dump

use clap::{Parser, Subcommand};
use stagehand_core::{ExtensionMode, SessionConfig, StreamRoute};
use std::path::PathBuf;

mod commands;
mod output;

/// Stagehand CLI - Playback session toolkit
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version)]
#[command(about = "Playback session coordination toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Session configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve content types and DRM hints for locators
    Resolve {
        /// URLs or file paths
        #[arg(required = true)]
        locators: Vec<String>,
    },

    /// Show the renderer order for a content type
    Renderers {
        /// Content type name (dash, ss, hls, mp4, mp3, ts, aac, webm)
        #[arg(default_value = "dash")]
        content_type: String,

        /// Extension mode (off, on, prefer)
        #[arg(short, long, default_value = "off")]
        mode: ExtensionMode,

        /// Available extension families (vp9, opus, flac, ffmpeg)
        #[arg(short, long, value_delimiter = ',')]
        extensions: Vec<String>,
    },

    /// Drive a playback session against the simulated engine
    Play {
        /// URL or file path
        locator: String,

        /// Extension families linked into the session
        #[arg(short, long, value_delimiter = ',')]
        extensions: Vec<String>,

        /// Override the configured extension mode
        #[arg(short, long)]
        mode: Option<ExtensionMode>,

        /// Absolute seeks to issue, in order (ms)
        #[arg(long = "seek", value_delimiter = ',', allow_hyphen_values = true)]
        seeks: Vec<i64>,

        /// Relative seek applied after the absolute seeks (ms)
        #[arg(long, allow_hyphen_values = true)]
        seek_by: Option<i64>,

        /// Output volume (0-1)
        #[arg(long)]
        volume: Option<f32>,

        /// Audio stream route
        #[arg(long)]
        route: Option<StreamRoute>,

        /// Number of output surfaces to hand the video over between
        #[arg(short, long, default_value = "1")]
        surfaces: usize,

        /// Simulated media duration (ms)
        #[arg(short, long, default_value = "60000")]
        duration: i64,

        /// How far to play before stopping (ms, 0 = to the end)
        #[arg(long, default_value = "0")]
        play_for: i64,
    },

    /// Print the effective session configuration
    Config,
}

fn log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    stagehand_core::init();

    let config = match &cli.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading session config");
            SessionConfig::load(path)?
        }
        None => SessionConfig::default(),
    };

    match cli.command {
        Commands::Resolve { locators } => {
            commands::resolve(&locators, &cli.format)?;
        }
        Commands::Renderers { content_type, mode, extensions } => {
            commands::renderers(&content_type, mode, &extensions, &cli.format)?;
        }
        Commands::Play {
            locator,
            extensions,
            mode,
            seeks,
            seek_by,
            volume,
            route,
            surfaces,
            duration,
            play_for,
        } => {
            let script = commands::PlayScript {
                extensions,
                mode,
                seeks,
                seek_by,
                volume,
                route,
                surfaces,
                duration_ms: duration,
                play_for_ms: play_for,
            };
            commands::play(&locator, script, config, &cli.format).await?;
        }
        Commands::Config => {
            commands::show_config(&config, &cli.format)?;
        }
    }

    Ok(())
}
