//! `[watch]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[watch]` section in docbuild.toml - filesystem watch timing.
///
/// # Example
/// ```toml
/// [watch]
/// path = "posts"
/// latency_ms = 500
/// settle_ms = 100
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Directory watched for source changes, relative to the working root.
    #[serde(default = "defaults::watch::path")]
    #[educe(Default = defaults::watch::path())]
    pub path: PathBuf,

    /// Milliseconds without new events before a batch is processed.
    #[serde(default = "defaults::watch::latency_ms")]
    #[educe(Default = defaults::watch::latency_ms())]
    pub latency_ms: u64,

    /// Milliseconds to wait after a batch closes before rebuilding.
    #[serde(default = "defaults::watch::settle_ms")]
    #[educe(Default = defaults::watch::settle_ms())]
    pub settle_ms: u64,
}
