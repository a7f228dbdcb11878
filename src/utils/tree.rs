//! Directory listing for the cascade resolver and the directory builder.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::pattern::basename;

/// Contents of a listed path, partitioned into files and directories.
///
/// Order follows filesystem enumeration, callers must not rely on it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

/// List `path`.
///
/// - missing path: empty listing
/// - file: that file alone
/// - directory: immediate children, skipping basenames for which `exclude`
///   returns true.
///   Subdirectories are descended into when `recursive` (their files fold into
///   `files`), otherwise reported in `directories`.
///
/// Excluded directories are never descended into.
pub fn list(path: &Path, recursive: bool, exclude: impl Fn(&str) -> bool) -> Listing {
    let mut listing = Listing::default();

    if !path.exists() {
        return listing;
    }
    if !path.is_dir() {
        listing.files.push(path.to_path_buf());
        return listing;
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let keep = |entry: &DirEntry| {
        entry.depth() == 0 || !exclude(basename(entry.path()))
    };

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_entry(keep)
        .filter_map(Result::ok)
    {
        if entry.file_type().is_dir() {
            if !recursive {
                listing.directories.push(entry.into_path());
            }
        } else {
            listing.files.push(entry.into_path());
        }
    }

    listing
}
