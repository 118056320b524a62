use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mp4press")]
#[command(author, version, about = "Batch MP4 compressor with thumbnail extraction")]
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
    /// Compress MP4 files and extract a thumbnail from each
    Compress {
        /// Input files; files that are not MP4 are skipped
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory to write compressed videos and thumbnails into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Also bundle every output into one ZIP archive
        #[arg(long)]
        archive: bool,

        /// Print the batch result as JSON
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
