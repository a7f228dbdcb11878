//! Shared test utilities.
//!
//! Provides a converter stand-in that records every invocation and small
//! helpers for laying out site fixtures in a temp directory.

use crate::{
    config::BuildOptions,
    site::Site,
    utils::{
        exec::{Captured, Runner},
        pattern::{basename, is_source_path},
    },
};
use anyhow::Result;
use parking_lot::Mutex;
use std::{fs, path::Path, sync::Arc};
use tempfile::TempDir;

/// One recorded converter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
}

/// Records invocations and answers with a fixed result.
///
/// Stdout is `<p>{source file name}</p>` so tests can tell cached bodies
/// apart.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<Call>>>,
    code: i32,
    stderr: String,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl Runner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Captured> {
        self.calls.lock().push(Call {
            program: program.into(),
            args: args.to_vec(),
        });

        let input = args
            .iter()
            .rev()
            .find(|a| is_source_path(Path::new(a)))
            .map(|a| basename(Path::new(a)).to_owned())
            .unwrap_or_default();

        Ok(Captured {
            code: self.code,
            stdout: format!("<p>{input}</p>"),
            stderr: self.stderr.clone(),
        })
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Site over `dir` whose converter calls go to `runner`.
pub fn site_with(dir: &TempDir, options: BuildOptions, runner: &RecordingRunner) -> Site {
    Site::with_runner(dir.path(), options, Box::new(runner.clone()))
}
