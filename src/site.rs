//! Process-wide build context.
//!
//! A [`Site`] is created once at startup and shared by reference (or `Arc`)
//! with every component. The working root it captures never changes; the
//! build cache is its only mutable part.

use crate::{
    cache::BuildCache,
    config::{BuildOptions, InputError},
    utils::exec::{ProcessRunner, Runner},
};
use std::{
    env,
    path::{Component, Path, PathBuf},
};

pub struct Site {
    root: PathBuf,
    options: BuildOptions,
    cache: BuildCache,
    runner: Box<dyn Runner>,
}

impl Site {
    /// Create a site rooted at `root`, spawning real converter processes.
    pub fn new(root: &Path, options: BuildOptions) -> Self {
        Self::with_runner(root, options, Box::new(ProcessRunner))
    }

    pub fn with_runner(root: &Path, options: BuildOptions, runner: Box<dyn Runner>) -> Self {
        Self {
            root: normalize_path(root),
            options,
            cache: BuildCache::new(),
            runner,
        }
    }

    /// Absolute, normalized working root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }

    /// Absolute form of `path`; relative paths are taken from the root.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    /// Path relative to the working root, with `/` separators.
    ///
    /// The root itself maps to the empty string.
    pub fn document_id(&self, path: &Path) -> Result<String, InputError> {
        let absolute = self.absolute(path);
        let relative = absolute
            .strip_prefix(&self.root)
            .map_err(|_| InputError::OutsideRoot(path.to_path_buf()))?;

        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    /// Identifier of the directory containing `path`.
    pub fn directory_id(&self, path: &Path) -> Result<String, InputError> {
        let absolute = self.absolute(path);
        let dir = absolute.parent().unwrap_or(&absolute);
        self.document_id(dir)
    }
}

/// Normalize a path to absolute form for reliable comparison.
///
/// Existing paths are canonicalized (symlinks resolved); missing paths, such
/// as files reported removed by the watcher, are made absolute lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        };
        lexical_normalize(&absolute)
    })
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
