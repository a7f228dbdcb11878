//! Command-line interface definitions.
//!
//! Defines all CLI arguments using clap. Positional inputs are source paths
//! until the first token starting with `-`; that token and everything after
//! it is passed to the converter verbatim.

use clap::Parser;
use std::path::PathBuf;

/// Build documents through a templated converter with cascading YAML config
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Converter program (default: pandoc)
    #[arg(long)]
    pub converter: Option<String>,

    /// Serve rendered documents for live preview
    #[arg(long)]
    pub serve: bool,

    /// Interface to bind the preview server on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Port for the preview server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Rebuild source documents when they change
    #[arg(short, long)]
    pub watch: bool,

    /// Directory to watch (relative to the working directory)
    #[arg(long)]
    pub watch_path: Option<PathBuf>,

    /// Milliseconds without new events before a change batch is processed
    #[arg(long)]
    pub latency: Option<u64>,

    /// Milliseconds to wait after a batch closes before rebuilding
    #[arg(long)]
    pub settle: Option<u64>,

    /// Build subdirectories of directory sources too
    #[arg(short, long)]
    pub recursive: bool,

    /// Resolve and log converter calls without running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Assemble the syndication feed after building
    #[arg(long)]
    pub feed: bool,

    /// Tool config file name (default: docbuild.toml)
    #[arg(short = 'C', long, default_value = "docbuild.toml")]
    pub config: PathBuf,

    /// Source files or directories, followed by converter flags
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub inputs: Vec<String>,
}

impl Cli {
    /// Source paths given on the command line.
    pub fn sources(&self) -> Vec<PathBuf> {
        split_inputs(&self.inputs).0
    }

    /// Converter flags given after the sources.
    pub fn passthrough(&self) -> Vec<String> {
        split_inputs(&self.inputs).1
    }
}

/// Split positional inputs at the first `-`-prefixed token.
fn split_inputs(inputs: &[String]) -> (Vec<PathBuf>, Vec<String>) {
    let at = inputs
        .iter()
        .position(|arg| arg.starts_with('-'))
        .unwrap_or(inputs.len());
    let (sources, rest) = inputs.split_at(at);
    (
        sources.iter().map(PathBuf::from).collect(),
        rest.to_vec(),
    )
}
