//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [converter] Section Defaults
// ============================================================================

pub mod converter {
    pub fn program() -> String {
        "pandoc".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }
}

// ============================================================================
// [watch] Section Defaults
// ============================================================================

pub mod watch {
    use std::path::PathBuf;

    pub fn path() -> PathBuf {
        ".".into()
    }

    /// Quiet period that closes an event batch.
    pub fn latency_ms() -> u64 {
        300
    }

    /// Pause between closing a batch and rebuilding, so editors finish writing.
    pub fn settle_ms() -> u64 {
        50
    }
}
