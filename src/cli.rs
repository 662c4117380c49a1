use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file from one MIME type to another
    Convert {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// MIME type of the input (guessed from the extension when omitted)
        #[arg(short, long)]
        from: Option<String>,

        /// Requested MIME type
        #[arg(short, long)]
        to: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Grab a still image from a URL the engine can open
    Snapshot {
        /// Stream or file URL
        #[arg(short, long)]
        url: String,

        /// Output JPEG file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the conversion chain between two MIME types
    Plan {
        /// Source MIME type
        #[arg(short, long)]
        from: String,

        /// Destination MIME type
        #[arg(short, long)]
        to: String,
    },

    /// List the active converters in resolution order
    Converters,

    /// Show the resolved transcoding engine and its version
    Engine,
}
