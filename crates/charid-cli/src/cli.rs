use charid_core::InferenceMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "charid")]
#[command(author, version, about = "Identify the video-game character in an image")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "charid.yaml")]
    pub config: String,

    /// Model URL (https://, hf://, file:// or a local path)
    #[arg(short, long, global = true, env = "CHARID_MODEL_URL")]
    pub model_url: Option<String>,

    /// JSON label file overriding the packaged character table
    #[arg(short, long, global = true)]
    pub labels: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify one or more images
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Forward-pass strategy: blocking or offloaded
        #[arg(long)]
        mode: Option<InferenceMode>,

        /// Print the k most likely characters instead of just the best one
        #[arg(short = 'k', long, default_value = "1")]
        top_k: usize,
    },

    /// Download the configured model into the cache and print its path
    Fetch,

    /// Print the class label table
    Labels,
}
