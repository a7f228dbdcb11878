//! File system watcher for incremental rebuilds.
//!
//! Watches the configured path recursively and rebuilds source documents as
//! they change.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Event Loop                             │
//! │                                                               │
//! │  ┌──────────┐    ┌───────────┐    ┌────────┐    ┌──────────┐  │
//! │  │ notify   │───▶│ Debouncer │───▶│ settle │───▶│ handle_  │  │
//! │  │ events   │    │ (latency) │    │ delay  │    │ batch()  │  │
//! │  └──────────┘    └───────────┘    └────────┘    └──────────┘  │
//! │                                                               │
//! │  Changed / Added ── build(path, {}, preload)                  │
//! │  Removed         ── logged only                               │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    build::build,
    log,
    metadata::Metadata,
    site::Site,
    utils::pattern::is_source_path,
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use rustc_hash::FxHashSet;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Changed,
    Added,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Changed => "changed",
            Self::Added => "added",
            Self::Removed => "removed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

// =============================================================================
// Event Mapping
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Added),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Added),
        EventKind::Modify(_) => Some(ChangeKind::Changed),
        _ => None,
    }
}

/// Map a raw notify event to watch events for source documents.
///
/// A rename reported with both paths becomes a removal of the old path and
/// an addition of the new one.
pub fn events_from(event: &Event) -> Vec<WatchEvent> {
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![ChangeKind::Removed, ChangeKind::Added]
        }
        ref kind => match classify(kind) {
            Some(kind) => vec![kind; event.paths.len()],
            None => return Vec::new(),
        },
    };

    event
        .paths
        .iter()
        .zip(kinds)
        .filter(|(path, _)| is_source_path(path) && !is_temp_file(path))
        .map(|(path, kind)| WatchEvent::new(kind, path.clone()))
        .collect()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events until `latency` passes without new ones.
///
/// Arrival order is kept; an event identical to one already pending is
/// dropped.
struct Debouncer {
    latency: Duration,
    pending: Vec<WatchEvent>,
    seen: FxHashSet<WatchEvent>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            pending: Vec::new(),
            seen: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, events: Vec<WatchEvent>) {
        if events.is_empty() {
            return;
        }
        for event in events {
            if self.seen.insert(event.clone()) {
                self.pending.push(event);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.latency)
    }

    fn take(&mut self) -> Vec<WatchEvent> {
        self.last_event = None;
        self.seen.clear();
        std::mem::take(&mut self.pending)
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_TIMEOUT
        } else {
            self.latency
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Rebuild every changed or added document in `batch`.
///
/// Returns the number of builds attempted. Failures are logged and do not
/// stop the rest of the batch.
pub fn handle_batch(site: &Site, batch: &[WatchEvent]) -> usize {
    let mut built = 0;

    for event in batch {
        let display = site
            .document_id(&event.path)
            .unwrap_or_else(|_| event.path.display().to_string());

        match event.kind {
            ChangeKind::Removed => log!("watch"; "removed {display}"),
            ChangeKind::Changed | ChangeKind::Added if !event.path.is_file() => {
                log!("watch"; "{} {display}, but it is gone", event.kind);
            }
            ChangeKind::Changed | ChangeKind::Added => {
                log!("watch"; "{} {display}", event.kind);
                built += 1;
                match build(site, &event.path, &Metadata::new(), true) {
                    Ok(0) => {}
                    Ok(code) => log!("watch"; "{display} failed with {code}"),
                    Err(e) => log!("error"; "{display}: {e:#}"),
                }
            }
        }
    }

    built
}

// =============================================================================
// Public API
// =============================================================================

/// Start the blocking watch loop. Returns when the event channel closes.
pub fn watch_for_changes_blocking(site: &Site) -> Result<()> {
    let options = site.options();
    let path = site.absolute(&options.watch_path);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(&path, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", path.display()))?;

    let shown = site.document_id(&path).unwrap_or_default();
    log!("watch"; "watching {}/", if shown.is_empty() { "." } else { &shown });

    let mut debouncer = Debouncer::new(options.latency);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) => debouncer.add(events_from(&event)),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                thread::sleep(options.settle);
                handle_batch(site, &debouncer.take());
            }
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BuildOptions,
        test_helpers::{RecordingRunner, site_with, write},
    };
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("/a/post.md~")));
        assert!(is_temp_file(Path::new("/a/.post.md.swp")));
        assert!(is_temp_file(Path::new("/a/post.bak")));
        assert!(!is_temp_file(Path::new("/a/post.md")));
    }

    #[test]
    fn test_events_map_kinds() {
        let created = event(EventKind::Create(CreateKind::File), &["/s/a.md"]);
        let modified = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/s/a.md"]);
        let removed = event(EventKind::Remove(RemoveKind::File), &["/s/a.md"]);

        assert_eq!(events_from(&created), vec![WatchEvent::new(ChangeKind::Added, "/s/a.md")]);
        assert_eq!(events_from(&modified), vec![WatchEvent::new(ChangeKind::Changed, "/s/a.md")]);
        assert_eq!(events_from(&removed), vec![WatchEvent::new(ChangeKind::Removed, "/s/a.md")]);
        assert!(events_from(&event(EventKind::Any, &["/s/a.md"])).is_empty());
    }

    #[test]
    fn test_rename_both_splits() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/s/old.md", "/s/new.md"],
        );
        assert_eq!(
            events_from(&renamed),
            vec![
                WatchEvent::new(ChangeKind::Removed, "/s/old.md"),
                WatchEvent::new(ChangeKind::Added, "/s/new.md"),
            ]
        );
    }

    #[test]
    fn test_events_keep_source_documents_only() {
        let modified = event(
            EventKind::Modify(ModifyKind::Any),
            &["/s/site.yaml", "/s/a.md", "/s/.a.md.swp", "/s/b.markdown", "/s/style.css"],
        );
        let paths: Vec<_> = events_from(&modified).into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec![PathBuf::from("/s/a.md"), PathBuf::from("/s/b.markdown")]);
    }

    #[test]
    fn test_debouncer_orders_and_coalesces() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), IDLE_TIMEOUT);

        debouncer.add(vec![
            WatchEvent::new(ChangeKind::Changed, "/s/b.md"),
            WatchEvent::new(ChangeKind::Changed, "/s/a.md"),
        ]);
        debouncer.add(vec![
            WatchEvent::new(ChangeKind::Changed, "/s/b.md"),
            WatchEvent::new(ChangeKind::Removed, "/s/b.md"),
        ]);
        assert!(debouncer.ready());

        assert_eq!(
            debouncer.take(),
            vec![
                WatchEvent::new(ChangeKind::Changed, "/s/b.md"),
                WatchEvent::new(ChangeKind::Changed, "/s/a.md"),
                WatchEvent::new(ChangeKind::Removed, "/s/b.md"),
            ]
        );
        assert!(!debouncer.ready());

        // A fresh batch may repeat events from the previous one
        debouncer.add(vec![WatchEvent::new(ChangeKind::Changed, "/s/b.md")]);
        assert_eq!(debouncer.take().len(), 1);
    }

    #[test]
    fn test_debouncer_waits_for_latency() {
        let mut debouncer = Debouncer::new(Duration::from_secs(60));
        debouncer.add(vec![WatchEvent::new(ChangeKind::Added, "/s/a.md")]);
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), Duration::from_secs(60));

        debouncer.add(Vec::new());
        assert_eq!(debouncer.take().len(), 1);
    }

    #[test]
    fn test_batch_builds_changed_documents_with_cascade() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "site.yaml", "template: page.html");
        write(dir.path(), "posts/a.md", "# A");
        write(dir.path(), "posts/b.md", "# B");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, BuildOptions::default(), &runner);
        let root = site.root().to_path_buf();

        let built = handle_batch(
            &site,
            &[
                WatchEvent::new(ChangeKind::Changed, root.join("posts/a.md")),
                WatchEvent::new(ChangeKind::Removed, root.join("posts/gone.md")),
                WatchEvent::new(ChangeKind::Added, root.join("posts/b.md")),
            ],
        );

        assert_eq!(built, 2);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].args.contains(&"--template=page.html".to_string()));
        assert!(calls[0].args.iter().any(|a| a.ends_with("posts/a.md")));
        assert!(calls[1].args.iter().any(|a| a.ends_with("posts/b.md")));
    }

    #[test]
    fn test_batch_skips_vanished_files_and_survives_failures() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "# A");
        write(dir.path(), "b.md", "# B");
        let runner = RecordingRunner::failing(1, "boom");
        let site = site_with(&dir, BuildOptions::default(), &runner);
        let root = site.root().to_path_buf();

        let built = handle_batch(
            &site,
            &[
                WatchEvent::new(ChangeKind::Changed, root.join("a.md")),
                WatchEvent::new(ChangeKind::Changed, root.join("never.md")),
                WatchEvent::new(ChangeKind::Changed, root.join("b.md")),
            ],
        );

        assert_eq!(built, 2);
        assert_eq!(runner.calls().len(), 2);
    }
}
