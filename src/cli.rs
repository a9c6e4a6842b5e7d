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
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Caption a video, reusing the cached caption unless asked to regenerate
    Caption {
        /// Video filename inside the videos directory
        video: String,

        /// Model key (defaults to the configured default model)
        #[arg(short, long)]
        model: Option<String>,

        /// Custom prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Ignore the cached caption and generate a new one
        #[arg(short, long)]
        regenerate: bool,
    },

    /// Print every cached caption of a video
    Captions {
        /// Video filename inside the videos directory
        video: String,
    },

    /// Delete a cached caption
    Delete {
        /// Video filename inside the videos directory
        video: String,

        /// Model key (defaults to the configured default model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List registered models
    Models,

    /// Check whether a model backend is reachable
    Health {
        /// Model key (defaults to the configured default model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "vidcap.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
