//! Shaderloop CLI — render a looping shader page to video or stills.
//!
//! Usage:
//!   shaderloop render [-r WxH|PRESET]... [--all-presets]   Render and encode every frame
//!   shaderloop still --frame N [--format F] [-r ...]       Save one frame as an image
//!   shaderloop presets                                     List built-in resolutions
//!   shaderloop check                                       Check required tools
//!   shaderloop config [--write]                            Show or save configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shaderloop_job_model::ImageFormat;

mod commands;

use commands::{Overrides, Selection};

#[derive(Parser)]
#[command(
    name = "shaderloop",
    about = "Capture deterministic shader loops from a headless browser",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/shaderloop/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of frames in one loop
    #[arg(long, global = true)]
    frames: Option<u32>,

    /// Output frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Content page: local HTML file or http(s) URL
    #[arg(long, global = true)]
    content: Option<String>,

    /// Output root directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Keep captured frame directories after encoding
    #[arg(long, global = true)]
    keep_frames: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every frame at each resolution and encode a video
    Render {
        #[command(flatten)]
        selection: Selection,
    },

    /// Save a single frame at each resolution
    Still {
        /// Frame index in [0, frame count)
        #[arg(long)]
        frame: u32,

        /// Image format: png, jpeg or webp
        #[arg(long, default_value = "png")]
        format: ImageFormat,

        #[command(flatten)]
        selection: Selection,
    },

    /// List built-in resolution presets
    Presets,

    /// Check that ffmpeg, chromedriver and the content page are available
    Check,

    /// Print the effective configuration
    Config {
        /// Save it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = Overrides {
        frames: cli.frames,
        fps: cli.fps,
        content: cli.content.clone(),
        output: cli.output.clone(),
        keep_frames: cli.keep_frames,
        verbose: cli.verbose,
        json_logs: cli.json_logs,
    };
    let loaded = commands::load_config(cli.config.as_deref(), &overrides);

    // Initialize logging
    match &loaded {
        Ok(config) => shaderloop_common::logging::init_logging(&config.logging),
        Err(_) => shaderloop_common::logging::init_default_logging(),
    }

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Render { selection } => commands::render::run(&config, &selection).await,
        Commands::Still {
            frame,
            format,
            selection,
        } => commands::still::run(&config, &selection, frame, format).await,
        Commands::Presets => commands::presets::run(),
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, cli.config.as_deref(), write),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
