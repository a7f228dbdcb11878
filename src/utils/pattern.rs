//! Basename classification.
//!
//! | Pattern      | Matches                                  |
//! |--------------|------------------------------------------|
//! | config       | names starting with `_` (hidden from builds) |
//! | metadata     | `*.yaml`, `*.yml`                        |
//! | source       | `*.markdown`, `*.md`, `*.md.txt`         |
//! | bibliography | `*.bib`                                  |
//!
//! All predicates take a basename, not a full path.

use regex::Regex;
use std::{path::Path, sync::LazyLock};

/// Names reserved for configuration/support trees (`_templates`, `_site`, ...).
static CONFIG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^_").unwrap());
static METADATA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.ya?ml$").unwrap());
static SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(markdown|md|md\.txt)$").unwrap());
static BIBLIOGRAPHY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.bib$").unwrap());

/// What a basename looks like to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Metadata,
    Source,
    Bibliography,
    Other,
}

impl FileKind {
    pub fn of(name: &str) -> Self {
        if is_metadata(name) {
            Self::Metadata
        } else if is_source(name) {
            Self::Source
        } else if is_bibliography(name) {
            Self::Bibliography
        } else {
            Self::Other
        }
    }
}

pub fn is_config(name: &str) -> bool {
    CONFIG.is_match(name)
}

pub fn is_metadata(name: &str) -> bool {
    METADATA.is_match(name)
}

pub fn is_source(name: &str) -> bool {
    SOURCE.is_match(name)
}

pub fn is_bibliography(name: &str) -> bool {
    BIBLIOGRAPHY.is_match(name)
}

/// Basename of a path as UTF-8, empty when it has none.
pub fn basename(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Whether the basename of `path` is a source document.
pub fn is_source_path(path: &Path) -> bool {
    is_source(basename(path))
}
