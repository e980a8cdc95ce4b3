use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line surface of the lockbox server and client.
#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    about = "Encrypted file vault served over HTTP",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Read configuration from this file instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server.
    Serve,
    /// Check the cipher, metadata database and data directory.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Upload a local file to a running server.
    Push {
        path: PathBuf,
        /// Store under this name instead of the file's own name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Download a file from a running server.
    Pull {
        name: String,
        /// Where to write the plaintext; defaults to `./<name>`.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
