use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audioforge")]
#[command(author, version, about = "Audio format conversion built on ffmpeg")]
pub struct Cli {
    /// Path to config file (JSON)
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
    /// Start the HTTP conversion service
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Convert a single file, printing progress
    Convert {
        /// Input audio file
        #[arg(required = true)]
        input: PathBuf,

        /// Target format (mp3, wav, ogg, flac, m4a, aac, wma)
        #[arg(short, long)]
        format: Option<String>,

        /// Output path (defaults to the input name with the target extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
