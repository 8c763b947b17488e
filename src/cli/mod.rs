//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "skywise",
    version,
    author = "Flow State",
    about = "Embedding-based course recommendations for the SkyWise learning platform",
    long_about = "SkyWise embeds the public course catalog into a persisted vector index and \
                  ranks courses by semantic similarity for search, similar-course lookups and \
                  personalized recommendations."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/skywise/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or rebuild the course embedding index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Find courses matching a free-text query
    Search {
        /// Search query text
        query: String,

        /// Leave this course out of the results
        #[arg(short, long, value_name = "COURSE_ID")]
        exclude: Option<i64>,

        /// Number of results to return
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Find courses similar to an indexed course
    Similar {
        course_id: i64,

        /// Number of results to return
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Recommend courses from a user's enrollments
    Recommend {
        user_id: i64,

        /// Number of results to return
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Show index health
    Status {
        /// Show status in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Rebuild only if the index is out of sync with the catalog
    Sync,

    /// Re-embed every public course
    Rebuild,

    /// Embed specific courses that are not indexed yet
    Embed {
        #[arg(required = true, value_name = "COURSE_ID")]
        course_ids: Vec<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
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
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
