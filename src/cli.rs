//! Command-line interface definition for Rentaldesk
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the chat backend and to inspect the tool set.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rentaldesk - DVD rental assistant backend
///
/// Serves a chat API that forwards customer messages to an LLM agent which
/// answers by calling parameterized database tools.
#[derive(Parser, Debug, Clone)]
#[command(name = "rentaldesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "RENTALDESK_CONFIG", default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Rentaldesk
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP chat backend
    Serve {
        /// Override the bind address from config
        #[arg(long)]
        host: Option<String>,

        /// Override the port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the tools the assistant can call
    Tools {
        /// Read descriptors from this manifest instead of the tool server
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Print the descriptors as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
