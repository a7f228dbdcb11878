//! YAML front matter of source documents.
//!
//! A document's metadata block opens with `---` on the first line and closes
//! with `---` or `...` on a line of its own.

use crate::metadata::parse_mapping;
use serde_yaml::Mapping;
use std::{fs, path::Path};

/// Extract the raw YAML text of the leading metadata block.
pub fn extract(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if matches!(line.trim_end(), "---" | "...") {
            return Some(&content[start..offset]);
        }
        offset += line.len();
    }
    None
}

/// Read and parse a document's front matter. Missing or malformed blocks
/// yield `None`.
pub fn read(path: &Path) -> Option<Mapping> {
    let content = fs::read_to_string(path).ok()?;
    parse_mapping(extract(&content)?)
}

/// Wrap a YAML body as a front-matter-only document.
pub fn wrap(yaml: &str) -> String {
    let yaml = yaml.strip_prefix("---\n").unwrap_or(yaml);
    format!("---\n{}---\n", ensure_newline(yaml))
}

fn ensure_newline(s: &str) -> String {
    if s.ends_with('\n') {
        s.to_owned()
    } else {
        format!("{s}\n")
    }
}
