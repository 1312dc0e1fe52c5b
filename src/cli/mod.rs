//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "memeseek",
    version,
    author = "neur0map",
    about = "Conversational meme search with hybrid lexical and vector retrieval",
    long_about = "Memeseek finds memes by topic. Keyword search over names, descriptions and tags \
                  comes first; semantic search over stored embeddings fills the gaps. The chat \
                  command runs the same dialog a messenger bot would: topic, count, then more, \
                  new topic or end."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/memeseek/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation on the console
    Chat {
        /// Conversation id to use for this console session
        #[arg(long, default_value = "1")]
        conversation: i64,
    },

    /// Run a single hybrid search
    Search {
        /// Search query text (words or emoji)
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compute embeddings for catalog items that do not have one yet
    Embed {
        /// Maximum number of items to process
        #[arg(short, long, default_value = "1000")]
        limit: usize,

        /// Items per model call
        #[arg(short, long, default_value = "32")]
        batch_size: usize,
    },

    /// Show catalog and index statistics
    Stats,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
