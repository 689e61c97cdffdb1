// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cloudstep`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cloudstep",
    version,
    about = "Provision a single-node n8n stack: cloud resources first, then remote setup steps.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// Default: `Cloudstep.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Directory containing the script payloads (overrides `[stack].scripts_dir`).
    #[arg(long, value_name = "DIR")]
    pub scripts_dir: Option<PathBuf>,

    /// Upper bound on nodes running at once (overrides `[engine].max_parallel`).
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CLOUDSTEP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load settings and scripts, validate the graph and print it, but don't
    /// call the provider or any remote host.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
