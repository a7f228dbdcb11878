//! Tool configuration (`docbuild.toml`) and per-run build options.
//!
//! Document settings live in the YAML cascade (see [`crate::cascade`]); this
//! module only covers how the tool itself runs.
//!
//! # Sections
//!
//! | Section       | Purpose                                  |
//! |---------------|------------------------------------------|
//! | `[converter]` | Converter program                        |
//! | `[serve]`     | Preview server (interface, port)         |
//! | `[watch]`     | Watched path and batching timings        |
//!
//! # Example
//!
//! ```toml
//! [converter]
//! program = "pandoc"
//!
//! [serve]
//! port = 8000
//!
//! [watch]
//! latency_ms = 500
//! ```
//!
//! Command-line values override file values. The result is frozen into
//! [`BuildOptions`] before anything is built.

pub mod defaults;
mod error;
mod serve;
mod watch;

pub use error::{ConfigError, InputError};

use serve::ServeConfig;
use watch::WatchConfig;

use crate::cli::Cli;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// `[converter]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    /// Converter executable, looked up on `PATH`.
    #[serde(default = "defaults::converter::program")]
    #[educe(Default = defaults::converter::program())]
    pub program: String,
}

/// Root structure of `docbuild.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl ToolConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: ToolConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Read-only options for one run.
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct BuildOptions {
    /// Converter program name
    #[educe(Default = defaults::converter::program())]
    pub program: String,

    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    #[educe(Default = defaults::watch::path())]
    pub watch_path: PathBuf,

    #[educe(Default = Duration::from_millis(defaults::watch::latency_ms()))]
    pub latency: Duration,

    #[educe(Default = Duration::from_millis(defaults::watch::settle_ms()))]
    pub settle: Duration,

    /// Recurse into subdirectories of directory sources
    pub recursive: bool,

    /// Preview mode: outputs go to the cache instead of target files
    pub serve: bool,

    pub watch: bool,

    /// Log converter calls without running them
    pub dry: bool,

    /// Feed mode: outputs go to the cache, templates are suppressed
    pub feed: bool,

    /// Raw converter parameters appended to every document build
    pub extra: Vec<String>,
}

impl BuildOptions {
    /// Combine file configuration with command-line overrides.
    pub fn new(config: ToolConfig, cli: &Cli) -> Self {
        let ToolConfig {
            converter,
            serve,
            watch,
        } = config;

        Self {
            program: cli.converter.clone().unwrap_or(converter.program),
            interface: cli.interface.clone().unwrap_or(serve.interface),
            port: cli.port.unwrap_or(serve.port),
            watch_path: cli.watch_path.clone().unwrap_or(watch.path),
            latency: Duration::from_millis(cli.latency.unwrap_or(watch.latency_ms)),
            settle: Duration::from_millis(cli.settle.unwrap_or(watch.settle_ms)),
            recursive: cli.recursive,
            serve: cli.serve,
            watch: cli.watch,
            dry: cli.dry_run,
            feed: cli.feed,
            extra: cli.passthrough(),
        }
    }

    /// Output is captured into the cache rather than written to targets.
    pub const fn captures_output(&self) -> bool {
        self.serve || self.feed
    }

    /// Validate options that would otherwise fail on the first build.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            bail!(ConfigError::Validation(
                "[converter.program] must not be empty".into()
            ));
        }
        if !self.dry {
            which::which(&self.program).with_context(|| {
                format!("`{}` not found. Please install it first.", self.program)
            })?;
        }
        Ok(())
    }
}

/// Check explicit source arguments against the working root.
///
/// Absolute paths and paths that do not exist are rejected.
pub fn validate_sources(root: &Path, sources: &[PathBuf]) -> Result<(), InputError> {
    for source in sources {
        if source.is_absolute() {
            return Err(InputError::Absolute(source.clone()));
        }
        if !root.join(source).exists() {
            return Err(InputError::Missing(source.clone()));
        }
    }
    Ok(())
}
