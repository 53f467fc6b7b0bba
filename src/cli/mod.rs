//! CLI for driving a tool server through the bridge.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Model in the Middle
#[derive(Parser, Debug)]
#[command(name = "mitm", version, about = "Model in the Middle: a smart front for MCP tool servers")]
pub struct Cli {
    /// Config file (default: ~/.mitm/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the server's tools
    Discover(DiscoverArgs),
    /// Show usage guidance for a tool
    Usage(UsageArgs),
    /// Run a tool
    Execute(ExecuteArgs),
    /// Rank tools against a query
    Search(SearchArgs),
}

/// Arguments for `mitm discover`.
#[derive(Parser, Debug)]
pub struct DiscoverArgs {
    /// Only tools whose name or description contains this text
    #[arg(short, long)]
    pub query: Option<String>,

    /// Only tools in this category (e.g. "File System")
    #[arg(long)]
    pub category: Option<String>,

    #[arg(short, long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

/// Arguments for `mitm usage`.
#[derive(Parser, Debug)]
pub struct UsageArgs {
    pub tool: String,
}

/// Arguments for `mitm execute`.
#[derive(Parser, Debug)]
pub struct ExecuteArgs {
    pub tool: String,

    /// Parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub params: String,

    /// What the call is meant to achieve; guides parameter optimization
    #[arg(short, long)]
    pub intent: Option<String>,
}

/// Arguments for `mitm search`.
#[derive(Parser, Debug)]
pub struct SearchArgs {
    pub query: String,

    #[arg(short, long, default_value_t = 5)]
    pub limit: usize,

    /// Drop results scoring below this (0.0 to 1.0)
    #[arg(long, default_value_t = crate::bridge::DEFAULT_MIN_CONFIDENCE)]
    pub min_confidence: f64,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
