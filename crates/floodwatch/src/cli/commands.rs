//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::status::Override;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Force the reported status (overrides `override`)
    #[arg(long = "override", value_enum, value_name = "STATE")]
    pub override_status: Option<OverrideArg>,
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Force the reported status (overrides `override`)
    #[arg(long = "override", value_enum, value_name = "STATE")]
    pub override_status: Option<OverrideArg>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Override argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverrideArg {
    /// Use the feed and camera analysis
    None,
    /// Always report open
    Open,
    /// Always report closed
    Closed,
}

impl From<OverrideArg> for Override {
    fn from(arg: OverrideArg) -> Self {
        match arg {
            OverrideArg::None => Self::None,
            OverrideArg::Open => Self::ForceOpen,
            OverrideArg::Closed => Self::ForceClosed,
        }
    }
}
