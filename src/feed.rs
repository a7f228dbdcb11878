//! Syndication feed assembly.
//!
//! The feed is built from the Build Cache, not from disk: only documents
//! rendered in this process can appear in it.
//!
//! # Pipeline
//!
//! ```text
//! assemble()
//!     │
//!     ├── resolve_ancestors(site_dir) ── canonical, feed.file, feed-template, feed-cache
//!     ├── per cache entry ── front matter → FeedEntry (dated, not archived)
//!     └── sort by published, newest first
//!
//! build_feed()
//!     ├── write feed-cache (YAML front matter document)
//!     ├── converter: --template -t html --output <feed.file> <feed-cache>
//!     └── swap body placeholders for cached bodies in <feed.file>
//! ```
//!
//! `feed.updated` is the newest entry's publication date. An empty feed keeps
//! whatever `updated` its configuration carries.
//!
//! Bodies travel through the converter as placeholder tokens. Rendered HTML
//! passed through YAML metadata would otherwise be re-read as markup, which
//! mangles literal backslashes in math.

use crate::{
    cache::{BuildCache, CacheEntry},
    cascade::resolve_ancestors,
    log,
    metadata::{Metadata, scalar_string},
    site::Site,
    utils::{date, exec::display_command, front_matter},
};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use regex::{Captures, Regex};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use thiserror::Error;

/// Marker file that keeps every document in its directory out of the feed.
pub const ARCHIVE_MARKER: &str = ".archived";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"FEEDBODY[0-9]+TOKEN").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed configuration is missing `{0}`")]
    MissingKey(&'static str),
}

/// One entry of the assembled feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub published: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    pub link: String,
    pub id: String,
    /// Placeholder token, replaced after conversion
    pub body: String,
    #[serde(skip)]
    published_at: DateTime<FixedOffset>,
}

/// Feed ready to be rendered.
#[derive(Debug, Clone)]
pub struct Feed {
    pub canonical: String,
    /// The `feed` mapping from configuration, plus `updated`
    pub feed: Mapping,
    /// Newest first
    pub entries: Vec<FeedEntry>,
    /// Placeholder token → cache key
    pub placeholders: BTreeMap<String, String>,
    pub template: String,
    pub output: PathBuf,
    pub cache_file: PathBuf,
}

#[derive(Serialize)]
struct FeedDocument<'a> {
    canonical: &'a str,
    feed: &'a Mapping,
    entry: &'a [FeedEntry],
}

impl Feed {
    /// Render the intermediate document handed to the converter.
    pub fn to_document(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&FeedDocument {
            canonical: &self.canonical,
            feed: &self.feed,
            entry: &self.entries,
        })?;
        Ok(front_matter::wrap(&yaml))
    }

    /// Replace every known placeholder in `rendered` with the cached body of
    /// its document. Unknown tokens are left untouched.
    pub fn substitute(&self, rendered: &str, cache: &BuildCache) -> String {
        PLACEHOLDER
            .replace_all(rendered, |caps: &Captures| {
                let token = &caps[0];
                self.placeholders
                    .get(token)
                    .and_then(|key| cache.body(key))
                    .unwrap_or_else(|| token.to_owned())
            })
            .into_owned()
    }
}

/// Collect cached documents into a feed using the configuration visible
/// from `site_dir`.
pub fn assemble(site: &Site, site_dir: &Path) -> Result<Feed> {
    let meta = resolve_ancestors(site, site_dir, &Metadata::new());

    let canonical = required_str(&meta, &["canonical"], "canonical")?;
    let mut feed = meta
        .get("feed")
        .and_then(Value::as_mapping)
        .cloned()
        .ok_or(FeedError::MissingKey("feed"))?;
    let file = required_str(&meta, &["feed", "file"], "feed.file")?;
    let template = required_str(&meta, &["feed-template"], "feed-template")?;
    let cache_file = required_str(&meta, &["feed-cache"], "feed-cache")?;

    let mut entries = Vec::new();
    let mut placeholders = BTreeMap::new();
    for (key, cached) in site.cache().snapshot() {
        let token = format!("FEEDBODY{}TOKEN", placeholders.len());
        if let Some(entry) = feed_entry(site, &canonical, &cached, &token) {
            placeholders.insert(token, key);
            entries.push(entry);
        }
    }

    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    if let Some(latest) = entries.first() {
        feed.insert("updated".into(), latest.published.clone().into());
    }

    Ok(Feed {
        canonical,
        feed,
        entries,
        placeholders,
        template,
        output: site.absolute(Path::new(&file)),
        cache_file: site.absolute(Path::new(&cache_file)),
    })
}

/// Assemble the feed and render it through the converter.
///
/// Missing feed configuration is fatal. A converter failure is logged and
/// its exit code returned.
pub fn build_feed(site: &Site, site_dir: &Path) -> Result<i32> {
    if site.cache().is_empty() {
        log!("warn"; "feed: no documents were built in this run");
    }
    let feed = assemble(site, site_dir)?;
    let options = site.options();
    log!("feed"; "{} entries", feed.entries.len());

    let args = vec![
        format!("--template={}", feed.template),
        "-t".to_owned(),
        "html".to_owned(),
        format!("--output={}", feed.output.display()),
        feed.cache_file.display().to_string(),
    ];

    if options.dry {
        log!("dry-run"; "{}", display_command(&options.program, &args));
        return Ok(0);
    }

    if let Some(parent) = feed.cache_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&feed.cache_file, feed.to_document()?)
        .with_context(|| format!("Failed to write {}", feed.cache_file.display()))?;

    let captured = site.runner().run(&options.program, &args)?;
    if !captured.success() {
        log!("error"; "feed: `{}` exited with {}\n{}", options.program, captured.code, captured.diagnostics());
        return Ok(captured.code);
    }

    let diagnostics = captured.diagnostics();
    if !diagnostics.is_empty() {
        log!("warn"; "feed: {diagnostics}");
    }

    let rendered = fs::read_to_string(&feed.output)
        .with_context(|| format!("Failed to read rendered feed {}", feed.output.display()))?;
    fs::write(&feed.output, feed.substitute(&rendered, site.cache()))?;

    log!("feed"; "{}", feed.output.display());
    Ok(0)
}

fn required_str(meta: &Metadata, keys: &[&str], name: &'static str) -> Result<String, FeedError> {
    meta.get_nested(keys)
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
        .ok_or(FeedError::MissingKey(name))
}

/// Build the entry for one cached document, or `None` when it is excluded.
fn feed_entry(site: &Site, canonical: &str, cached: &CacheEntry, token: &str) -> Option<FeedEntry> {
    let dir = cached.source.parent()?;
    if dir.join(ARCHIVE_MARKER).exists() {
        return None;
    }

    let doc = document_metadata(cached);
    let published_at = doc.get_str("date").and_then(|d| date::parse(&d))?;
    let updated_at = doc
        .get_str("date-updated")
        .and_then(|d| date::parse(&d))
        .unwrap_or(published_at);
    let id = site.directory_id(&cached.source).ok()?;

    Some(FeedEntry {
        title: doc.get_str("title"),
        author_name: doc.get("author").and_then(author_name),
        published: date::format(&published_at),
        updated: date::format(&updated_at),
        category: doc.get_list(&["category", "categories"]),
        link: doc
            .get_str("link")
            .unwrap_or_else(|| default_link(canonical, &id)),
        id,
        body: token.to_owned(),
        published_at,
    })
}

/// Front matter of the document, over its sibling metadata document.
fn document_metadata(cached: &CacheEntry) -> Metadata {
    let mut doc = front_matter::read(&cached.source)
        .map(Metadata::from_mapping)
        .unwrap_or_default();
    if let Some(values) = cached.metadata_file.as_deref().and_then(Metadata::load) {
        doc.merge_from(&Metadata::from_mapping(values));
    }
    doc
}

/// `author` may be a name, a mapping with `name`, or a list of either.
fn author_name(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(items) => items.first().and_then(author_name),
        Value::Mapping(map) => map.get("name").and_then(scalar_string),
        other => scalar_string(other),
    }
}

fn default_link(canonical: &str, id: &str) -> String {
    let base = canonical.trim_end_matches('/');
    if id.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{id}/")
    }
}
