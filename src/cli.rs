use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::DEFAULT_BIND_ADDR;

/// Command-line arguments for the warehouse relay.
///
/// Every subcommand runs one of the pipeline entry points; configuration
/// comes from an optional YAML file, secrets from the environment and the
/// secret store.
#[derive(Parser, Debug)]
#[clap(name = "warehouse-relay", about = "Export a warehouse table to CSV and relay it downstream")]
pub struct Args {
    /// Path to configuration YAML file (defaults to $RELAY_CONFIG, then built-in values)
    #[clap(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the query, write the CSV and post it to the relay endpoint once
    Export,

    /// Send a local file to the SFTP server named in the secret store
    Transfer {
        /// File to upload
        path: PathBuf,

        /// Remote filename (default: the local file name)
        #[clap(long)]
        filename: Option<String>,

        /// Project holding the SFTP secrets (default: from config)
        #[clap(long)]
        project: Option<String>,
    },

    /// Serve the HTTP trigger and the upload receiver
    Serve {
        /// Address to listen on
        #[clap(long, default_value = DEFAULT_BIND_ADDR)]
        bind: String,
    },

    /// Create a configuration file with the built-in defaults
    InitConfig {
        /// Path to save the configuration file
        #[clap(default_value = "relay_config.yaml")]
        path: PathBuf,
    },
}
