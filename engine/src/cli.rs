//! CLI interface for EDBP
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for managing installed plugins.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EDBP Plugin Manager
///
/// Installs, discovers, and runs block editor plugins.
#[derive(Parser, Debug)]
#[command(name = "edbp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List installed plugins
    List,

    /// Install a plugin from a local zip file
    Install {
        /// Path to the plugin archive
        path: PathBuf,
    },

    /// Download and install a plugin archive
    InstallUrl {
        /// Archive URL (direct or relay-wrapped)
        url: String,

        /// Expected plugin id
        #[arg(long)]
        id: Option<String>,

        /// Leave a pending install for the next session instead of installing now
        #[arg(long, requires = "id")]
        defer: bool,
    },

    /// Uninstall a plugin
    Uninstall {
        /// Plugin id
        id: String,
    },

    /// Enable a plugin and load it
    Enable {
        /// Plugin id
        id: String,
    },

    /// Disable a plugin
    Disable {
        /// Plugin id
        id: String,
    },

    /// Load every enabled plugin and report the results
    LoadAll,

    /// Browse plugins published to the plugin shop
    Shop {
        /// Filter by name, author, or description
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Install a pending plugin left by another session, if any
    Pending,
}
