use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "overlayforge")]
#[command(author, version, about = "Composite a looping overlay onto images, GIFs and videos")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Overlay the configured animation onto one or more files or URLs
    Compose {
        /// Local paths or http(s) URLs, processed in order
        #[arg(required = true)]
        sources: Vec<String>,

        /// Overlay playback speed (0.1 to 3.0)
        #[arg(long)]
        speed: Option<f64>,

        /// Directory for finished artifacts (overrides config)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Probe and plan only, printing the ffmpeg arguments
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe a media file and display normalized metadata
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
