//! Document building.
//!
//! Turns effective metadata into a converter command line and runs it.
//!
//! # Architecture
//!
//! ```text
//! build(source)
//!     │
//!     ├── directory ── resolve_ancestors() (preload)
//!     │                 ├── build_file() per matching source document
//!     │                 └── build() per subdirectory (recursive only)
//!     │
//!     └── file ─────── resolve_ancestors() (preload)
//!                       ├── converter_args()
//!                       ├── Runner::run()
//!                       └── BuildCache::insert() (preview / feed mode)
//! ```
//!
//! A failing document never stops its siblings, whether the converter
//! rejects it or it cannot be built at all. The status returned for a
//! directory is the status of the last document built in it.

use crate::{
    cache::CacheEntry,
    cascade::resolve_ancestors,
    log,
    metadata::Metadata,
    site::Site,
    utils::{
        exec::display_command,
        pattern::{self, FileKind},
        tree,
    },
};
use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Status recorded for a document that could not be built at all.
const FAILED: i32 = 1;

/// Build a source file or every source document in a directory.
///
/// With `preload`, the cascade is resolved for `source` first and `seed`
/// only contributes values the cascade cannot override. Without it, `seed`
/// is taken as the already resolved metadata.
///
/// Returns the converter exit status (0 when nothing ran).
pub fn build(site: &Site, source: &Path, seed: &Metadata, preload: bool) -> Result<i32> {
    let path = site.absolute(source);
    if path.is_dir() {
        Ok(build_directory(site, &path, seed, preload)?.unwrap_or(0))
    } else {
        build_file(site, &path, seed, preload)
    }
}

fn build_directory(
    site: &Site,
    dir: &Path,
    seed: &Metadata,
    preload: bool,
) -> Result<Option<i32>> {
    let meta = if preload {
        resolve_ancestors(site, dir, seed)
    } else {
        seed.clone()
    };
    let listing = tree::list(dir, false, pattern::is_config);
    let filter = SourceFilter::from_metadata(&meta);

    let mut last = None;
    for file in &listing.files {
        let name = pattern::basename(file);
        match FileKind::of(name) {
            FileKind::Source if filter.matches(name) => {
                last = Some(build_file(site, file, &meta, false).unwrap_or_else(|e| {
                    log!("error"; "{}: {e:#}", file.display());
                    FAILED
                }));
            }
            _ => {}
        }
    }

    if site.options().recursive {
        for subdir in &listing.directories {
            if let Some(status) = build_directory(site, subdir, seed, true)? {
                last = Some(status);
            }
        }
    }

    Ok(last)
}

fn build_file(site: &Site, path: &Path, seed: &Metadata, preload: bool) -> Result<i32> {
    let meta = if preload {
        resolve_ancestors(site, path, seed)
    } else {
        seed.clone()
    };
    let options = site.options();
    let id = site.document_id(path)?;

    if !pattern::is_source_path(path) {
        log!("warn"; "{id} is not a source document, building anyway");
    }

    let ConverterArgs {
        args,
        metadata_file,
    } = converter_args(site, path, &meta)?;

    if options.dry {
        log!("dry-run"; "{}", display_command(&options.program, &args));
        return Ok(0);
    }

    log!("build"; "{id}");
    let captured = site.runner().run(&options.program, &args)?;

    if !captured.success() {
        log!("error"; "{id}: `{}` exited with {}\n{}", options.program, captured.code, captured.diagnostics());
        return Ok(captured.code);
    }

    let diagnostics = captured.diagnostics();
    if !diagnostics.is_empty() {
        log!("warn"; "{id}: {diagnostics}");
    }

    if options.captures_output() {
        site.cache().insert(
            id,
            CacheEntry {
                body: captured.stdout,
                source: path.to_path_buf(),
                metadata_file,
            },
        );
    }

    Ok(0)
}

/// Converter arguments for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterArgs {
    pub args: Vec<String>,
    /// Sibling metadata document, when configured and present
    pub metadata_file: Option<PathBuf>,
}

/// Derive the converter command line for `path` from its effective metadata.
///
/// Argument order is significant and fixed:
/// formats, template, filters, bibliography, output, id, raw options,
/// caller extras, the source, the sibling metadata document, and finally
/// every configuration file of the cascade.
pub fn converter_args(site: &Site, path: &Path, meta: &Metadata) -> Result<ConverterArgs> {
    let options = site.options();
    let dir = path.parent().unwrap_or(path);
    let mut args = Vec::new();

    if let Some(format) = meta.get_str("input-format") {
        args.extend(["-f".to_owned(), format]);
    }
    if let Some(format) = meta.get_str("output-format") {
        args.extend(["-t".to_owned(), format]);
    }

    if !options.feed
        && let Some(template) = meta.get_str("template")
    {
        args.push(format!("--template={template}"));
    }

    for filter in meta.get_list(&["filter", "filters"]) {
        args.push(format!("--filter={filter}"));
    }

    if let Some(bibliography) = meta.get_str("source-bibliography") {
        let bib_path = site.absolute(Path::new(&bibliography));
        if bib_path.is_file() {
            if !pattern::is_bibliography(pattern::basename(&bib_path)) {
                log!("warn"; "{} does not look like a bibliography", bib_path.display());
            }
            args.push(format!("--bibliography={}", bib_path.display()));
        }
    }

    if !options.captures_output()
        && let Some(target) = meta.get_str("target")
    {
        args.push(format!("--output={}", dir.join(target).display()));
    }

    let dir_id = site.directory_id(path)?;
    if dir_id.is_empty() {
        log!("build"; "{} is a top-level document", pattern::basename(path));
    }
    args.extend(["-M".to_owned(), format!("id={dir_id}")]);

    args.extend(meta.get_list(&["raw-option", "raw-options"]));
    args.extend(options.extra.iter().cloned());

    args.push(path.display().to_string());

    let metadata_file = meta
        .get_str("source-metadata")
        .map(|name| dir.join(name))
        .filter(|p| p.is_file());
    if let Some(file) = &metadata_file {
        args.push(file.display().to_string());
    }

    args.extend(meta.files().iter().map(|f| f.display().to_string()));

    Ok(ConverterArgs {
        args,
        metadata_file,
    })
}

/// Optional `source` key: restricts which documents of a directory build.
enum SourceFilter {
    Any,
    Pattern(Regex),
    Exact(String),
}

impl SourceFilter {
    fn from_metadata(meta: &Metadata) -> Self {
        let Some(source) = meta.get_str("source") else {
            return Self::Any;
        };
        match Regex::new(&format!("^(?:{source})$")) {
            Ok(re) => Self::Pattern(re),
            Err(_) => {
                log!("warn"; "`source: {source}` is not a valid pattern, matching it literally");
                Self::Exact(source)
            }
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(re) => re.is_match(name),
            Self::Exact(exact) => exact == name,
        }
    }
}
