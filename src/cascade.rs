//! Configuration cascade.
//!
//! Effective metadata for a document is folded from YAML files in two phases:
//!
//! ```text
//! resolve_ancestors(posts/a/index.md)
//!     │
//!     ├── resolve_local(posts/a)       subdirectories first, then *.yaml
//!     ├── resolve_local(posts)         (posts/a is folded again, no-op)
//!     ├── resolve_local(<root>)
//!     └── seed merged on top
//! ```
//!
//! Every step merges with [`Metadata::merge_from`] semantics: values already
//! in the accumulator are never replaced, so the seed and the nearest scope
//! win over anything inherited.

use crate::{
    metadata::Metadata,
    site::{Site, normalize_path},
    utils::{pattern, tree},
};
use std::path::{Path, PathBuf};

/// Fold the configuration found in `path` and, depth-first, in all of its
/// non-config subdirectories.
///
/// Subdirectories are folded before the directory's own files. Files that do
/// not parse to a non-empty mapping are skipped.
pub fn resolve_local(path: &Path, seed: &Metadata) -> Metadata {
    let listing = tree::list(path, false, pattern::is_config);

    let mut meta = listing
        .directories
        .iter()
        .fold(seed.clone(), |acc, dir| resolve_local(dir, &acc));

    for file in listing
        .files
        .iter()
        .filter(|f| pattern::is_metadata(pattern::basename(f)))
    {
        if let Some(values) = Metadata::load(file) {
            meta.absorb(values, normalize_path(file));
        }
    }

    meta
}

/// Fold configuration from the directory of `path` up to the working root.
///
/// The walk stops once the current directory's path is no longer than the
/// root's. This is a length comparison, not a containment check.
pub fn resolve_ancestors(site: &Site, path: &Path, seed: &Metadata) -> Metadata {
    let root_len = site.root().as_os_str().len();
    let mut current = start_dir(&site.absolute(path));
    let mut meta = seed.clone();

    loop {
        meta = resolve_local(&current, &meta);
        if current.as_os_str().len() <= root_len {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let mut resolved = seed.clone();
    resolved.merge_from(&meta);
    resolved
}

fn start_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map_or_else(|| path.to_path_buf(), Path::to_path_buf)
    }
}
