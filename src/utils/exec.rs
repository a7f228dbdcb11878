//! External converter execution.
//!
//! Converter runs are synchronous: the child is spawned, both output streams
//! are captured in full, and the caller gets the exit code back. A non-zero
//! exit is data, not an error; only failing to spawn is.
//!
//! The [`Runner`] trait is the seam between the build and the operating
//! system so tests can record invocations instead of spawning processes.

use anyhow::{Context, Result};
use regex::Regex;
use std::{
    borrow::Cow,
    process::{Command, Output, Stdio},
    sync::LazyLock,
};

/// Captured result of one converter run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub const fn success(&self) -> bool {
        self.code == 0
    }

    /// Stderr without terminal color codes or surrounding whitespace.
    pub fn diagnostics(&self) -> Cow<'_, str> {
        strip_ansi(self.stderr.trim())
    }
}

impl From<Output> for Captured {
    fn from(output: Output) -> Self {
        Self {
            // Killed by a signal: no code, report a generic failure
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs an external program to completion.
pub trait Runner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<Captured>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Captured> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute `{program}`"))?;

        Ok(output.into())
    }
}

/// Render a command line for logs.
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{arg}'")
            } else {
                arg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    RE.replace_all(s, "")
}
