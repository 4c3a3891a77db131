use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// provscope - build-provenance validation for .NET packages
#[derive(Debug, Parser)]
#[command(name = "provscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate source link, deterministic build, and compiler flags for every
    /// managed binary in a package.
    Check {
        /// Path to the package file.
        #[arg(value_name = "PACKAGE")]
        path: PathBuf,

        /// Binary extension to consider (repeatable; default: dll, exe, winmd).
        #[arg(long = "extension", value_name = "EXT")]
        extensions: Vec<String>,

        /// Fail candidates whose headers do not parse instead of excluding them.
        #[arg(long)]
        strict_headers: bool,
    },
}
