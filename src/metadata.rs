//! Effective metadata for a document or directory scope.
//!
//! A [`Metadata`] is an insertion-ordered YAML mapping plus the list of
//! configuration files that contributed to it. Merging is "local wins": keys
//! already present are never overwritten by a broader scope.

use serde_yaml::{Mapping, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: Mapping,
    files: Vec<PathBuf>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(values: Mapping) -> Self {
        Self {
            values,
            files: Vec::new(),
        }
    }

    /// Parse a configuration document.
    ///
    /// Returns `None` when the file is unreadable, malformed, or does not
    /// hold a non-empty mapping. Such documents contribute nothing.
    pub fn load(path: &Path) -> Option<Mapping> {
        let content = fs::read_to_string(path).ok()?;
        parse_mapping(&content)
    }

    /// Merge `source` underneath `self`.
    ///
    /// Keys of `source` are copied only when absent here. The contributing
    /// file list is extended with the source's files not seen yet.
    pub fn merge_from(&mut self, source: &Metadata) {
        for (key, value) in &source.values {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
        for file in &source.files {
            self.record_file(file);
        }
    }

    /// Merge a freshly parsed configuration document underneath `self` and
    /// record where it came from.
    pub fn absorb(&mut self, values: Mapping, origin: PathBuf) {
        for (key, value) in values {
            if !self.values.contains_key(&key) {
                self.values.insert(key, value);
            }
        }
        self.record_file(&origin);
    }

    fn record_file(&mut self, path: &Path) {
        if !self.files.iter().any(|f| f == path) {
            self.files.push(path.to_path_buf());
        }
    }

    /// Configuration files that contributed, in discovery order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[cfg(test)]
    pub fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Scalar value rendered as a string (numbers and bools included).
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_string)
    }

    /// Follow a chain of nested mapping keys, e.g. `["feed", "file"]`.
    pub fn get_nested(&self, keys: &[&str]) -> Option<&Value> {
        let (first, rest) = keys.split_first()?;
        rest.iter()
            .try_fold(self.get(first)?, |value, key| value.as_mapping()?.get(*key))
    }

    /// Values of the first present key among `keys`, each a string or a
    /// sequence of strings. Used for `filter`/`filters`-style pairs.
    pub fn get_list(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .find_map(|key| self.get(key))
            .map(string_list)
            .unwrap_or_default()
    }
}

/// Parse text into a non-empty mapping.
pub fn parse_mapping(content: &str) -> Option<Mapping> {
    match serde_yaml::from_str::<Value>(content).ok()? {
        Value::Mapping(map) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Render a scalar YAML value as text.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}

/// A string, or a sequence whose scalar elements become strings.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(yaml: &str) -> Metadata {
        Metadata::from_mapping(parse_mapping(yaml).unwrap())
    }

    #[test]
    fn test_merge_keeps_local_values() {
        let mut local = meta("template: post.html\ntarget: index.html");
        let inherited = meta("template: page.html\ncanonical: https://example.org");
        local.merge_from(&inherited);

        assert_eq!(local.get_str("template").as_deref(), Some("post.html"));
        assert_eq!(local.get_str("canonical").as_deref(), Some("https://example.org"));
        assert_eq!(local.get_str("target").as_deref(), Some("index.html"));
    }

    #[test]
    fn test_merge_preserves_insertion_order() {
        let mut local = meta("b: 1\na: 2");
        local.merge_from(&meta("z: 3\nb: 4"));
        let keys: Vec<_> = local.values().keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "z"]);
    }

    #[test]
    fn test_file_list_is_deduplicated() {
        let mut m = Metadata::new();
        m.absorb(parse_mapping("a: 1").unwrap(), PathBuf::from("/site/a.yaml"));
        m.absorb(parse_mapping("b: 1").unwrap(), PathBuf::from("/site/b.yaml"));
        m.absorb(parse_mapping("a: 2").unwrap(), PathBuf::from("/site/a.yaml"));

        let mut other = Metadata::new();
        other.absorb(parse_mapping("c: 1").unwrap(), PathBuf::from("/site/b.yaml"));
        other.absorb(parse_mapping("d: 1").unwrap(), PathBuf::from("/c.yaml"));
        m.merge_from(&other);

        assert_eq!(
            m.files(),
            &[
                PathBuf::from("/site/a.yaml"),
                PathBuf::from("/site/b.yaml"),
                PathBuf::from("/c.yaml"),
            ]
        );
        assert_eq!(m.get_str("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_parse_mapping_rejects_empty_and_scalars() {
        assert!(parse_mapping("").is_none());
        assert!(parse_mapping("{}").is_none());
        assert!(parse_mapping("- a\n- b").is_none());
        assert!(parse_mapping("just text").is_none());
        assert!(parse_mapping("key: [unclosed").is_none());
        assert!(parse_mapping("key: value").is_some());
    }

    #[test]
    fn test_get_list_accepts_string_or_sequence() {
        let m = meta("filter: pandoc-citeproc");
        assert_eq!(m.get_list(&["filter", "filters"]), vec!["pandoc-citeproc"]);

        let m = meta("filters:\n  - a.lua\n  - b.lua");
        assert_eq!(m.get_list(&["filter", "filters"]), vec!["a.lua", "b.lua"]);

        assert!(Metadata::new().get_list(&["filter", "filters"]).is_empty());
    }

    #[test]
    fn test_get_nested() {
        let m = meta("feed:\n  file: feed.xml\n  title: News");
        assert_eq!(
            m.get_nested(&["feed", "file"]).and_then(Value::as_str),
            Some("feed.xml")
        );
        assert!(m.get_nested(&["feed", "missing"]).is_none());
        assert!(m.get_nested(&["nope", "file"]).is_none());
    }

    #[test]
    fn test_scalar_string_renders_numbers() {
        let m = meta("port: 8000\ndraft: false");
        assert_eq!(m.get_str("port").as_deref(), Some("8000"));
        assert_eq!(m.get_str("draft").as_deref(), Some("false"));
    }
}
