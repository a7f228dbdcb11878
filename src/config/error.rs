//! Configuration and input error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating `docbuild.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Invalid source arguments. Always fatal, raised before any build starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("source `{0}` must be relative to the working directory")]
    Absolute(PathBuf),

    #[error("source `{0}` does not exist")]
    Missing(PathBuf),

    #[error("`{0}` is outside the working root")]
    OutsideRoot(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("docbuild.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("docbuild.toml"));

        let validation_err = ConfigError::Validation("Test validation error".to_string());
        assert!(format!("{validation_err}").contains("Test validation error"));
    }

    #[test]
    fn test_input_error_display() {
        let err = InputError::Absolute(PathBuf::from("/etc/post.md"));
        assert!(err.to_string().contains("/etc/post.md"));
        let err = InputError::Missing(PathBuf::from("posts/nope.md"));
        assert!(err.to_string().contains("does not exist"));
    }
}
