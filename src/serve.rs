//! Preview server.
//!
//! Serves rendered document bodies straight from the build cache, built on
//! `tiny_http`:
//!
//! - `/` lists every document built so far
//! - `/<document id>` serves the cached body, building it on first request
//! - File watching and rebuild on a background thread (via `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!     Serve bodies          Detect changes
//!     Build on miss         Rebuild documents
//! └─────────────────────────────────────────────┘
//!                    │
//!                    ▼
//!             Arc<Site>.cache()
//! ```

use crate::{
    build::build,
    log,
    metadata::Metadata,
    site::Site,
    utils::pattern::is_source_path,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Index page HTML template (embedded at compile time)
const INDEX_TEMPLATE: &str = include_str!("embed/serve/index.html");

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the preview server, with the watch loop if enabled.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(site: Arc<Site>) -> Result<()> {
    let options = site.options();
    let interface: IpAddr = options
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", options.interface))?;

    let (server, addr) = try_bind_port(interface, options.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if options.watch {
        let site = Arc::clone(&site);
        thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(&site) {
                log!("watch"; "{err:#}");
            }
        });
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &site) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Resolution
// ============================================================================

/// What a request resolves to, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// HTML index of built documents
    Index(String),
    /// Rendered document body
    Body(String),
    /// Build produced no output
    Failed(String),
    NotFound,
}

/// Resolve a request URL against the site.
///
/// A document missing from the cache is built synchronously (with its full
/// cascade) before answering.
pub fn resolve(site: &Site, url: &str) -> Reply {
    let without_query = url.split('?').next().unwrap_or_default();
    let decoded = urlencoding::decode(without_query).unwrap_or(Cow::Borrowed(without_query));
    let request_path = decoded.trim_matches('/');

    if request_path.is_empty() {
        return Reply::Index(render_index(&site.cache().keys()));
    }

    let path = site.root().join(request_path);
    let Ok(id) = site.document_id(&path) else {
        return Reply::NotFound;
    };
    if !path.is_file() || !is_source_path(&path) {
        return Reply::NotFound;
    }

    if let Some(body) = site.cache().body(&id) {
        return Reply::Body(body);
    }

    log!("serve"; "building {id}");
    if let Err(e) = build(site, &path, &Metadata::new(), true) {
        log!("error"; "{id}: {e:#}");
    }

    match site.cache().body(&id) {
        Some(body) => Reply::Body(body),
        None => Reply::Failed(format!("Failed to build {id}")),
    }
}

fn render_index(keys: &[String]) -> String {
    let entries = if keys.is_empty() {
        r#"<li class="empty">Nothing built yet</li>"#.to_owned()
    } else {
        keys.iter()
            .map(|key| {
                let href: Vec<_> = key.split('/').map(urlencoding::encode).collect();
                format!(r#"<li><a href="/{}">{}</a></li>"#, href.join("/"), escape_html(key))
            })
            .collect::<Vec<_>>()
            .join("\n        ")
    };

    #[allow(clippy::literal_string_with_formatting_args)]
    // These are template placeholders, not format args
    INDEX_TEMPLATE
        .replace("{count}", &keys.len().to_string())
        .replace("{entries}", &entries)
}

fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;"),
    )
}

// ============================================================================
// Response Helpers
// ============================================================================

fn handle_request(request: Request, site: &Site) -> Result<()> {
    match resolve(site, request.url()) {
        Reply::Index(html) | Reply::Body(html) => serve_html(request, html),
        Reply::Failed(message) => serve_plain(request, 500, message),
        Reply::NotFound => serve_plain(request, 404, "404 Not Found".to_owned()),
    }
}

fn serve_html(request: Request, content: String) -> Result<()> {
    let response = Response::from_string(content).with_header(header("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_plain(request: Request, status: u16, body: String) -> Result<()> {
    let len = body.len();
    let response = Response::new(
        StatusCode(status),
        vec![header("text/plain; charset=utf-8")?],
        Cursor::new(body),
        Some(len),
        None,
    );
    request.respond(response)?;
    Ok(())
}

fn header(content_type: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", content_type).map_err(|()| anyhow!("Invalid header value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BuildOptions,
        test_helpers::{RecordingRunner, site_with, write},
    };
    use tempfile::TempDir;

    fn preview() -> BuildOptions {
        BuildOptions {
            serve: true,
            ..BuildOptions::default()
        }
    }

    #[test]
    fn test_cache_miss_builds_once() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "site.yaml", "template: page.html");
        write(dir.path(), "posts/a.md", "# A");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);

        assert_eq!(resolve(&site, "/posts/a.md"), Reply::Body("<p>a.md</p>".into()));
        assert_eq!(resolve(&site, "/posts/a.md/"), Reply::Body("<p>a.md</p>".into()));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "pandoc");
        // Preview builds render to stdout
        assert!(calls[0].args.contains(&"--template=page.html".to_string()));
        assert!(!calls[0].args.iter().any(|a| a.starts_with("--output")));
    }

    #[test]
    fn test_cached_body_served_without_building() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "# A");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);
        site.cache().insert(
            "a.md",
            crate::cache::CacheEntry {
                body: "<h1>cached</h1>".into(),
                source: site.root().join("a.md"),
                metadata_file: None,
            },
        );

        assert_eq!(resolve(&site, "/a.md?v=2"), Reply::Body("<h1>cached</h1>".into()));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_url_decoding() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "my post.md", "# A");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);

        assert_eq!(resolve(&site, "/my%20post.md"), Reply::Body("<p>my post.md</p>".into()));
        assert!(site.cache().contains("my post.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_encoded_question_mark_is_part_of_the_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a?b.md", "# Q");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);

        assert_eq!(resolve(&site, "/a%3Fb.md"), Reply::Body("<p>a?b.md</p>".into()));
        assert_eq!(resolve(&site, "/a%3Fb.md?v=1"), Reply::Body("<p>a?b.md</p>".into()));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_not_found() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "style.css", "body {}");
        write(dir.path(), "posts/a.md", "# A");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);

        assert_eq!(resolve(&site, "/missing.md"), Reply::NotFound);
        assert_eq!(resolve(&site, "/style.css"), Reply::NotFound);
        assert_eq!(resolve(&site, "/posts"), Reply::NotFound);
        assert_eq!(resolve(&site, "/../outside.md"), Reply::NotFound);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failed_build_is_server_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "# A");
        let runner = RecordingRunner::failing(64, "bad input");
        let site = site_with(&dir, preview(), &runner);

        assert_eq!(resolve(&site, "/a.md"), Reply::Failed("Failed to build a.md".into()));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_index_lists_built_documents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "posts/b.md", "# B");
        write(dir.path(), "a & b.md", "# AB");
        let runner = RecordingRunner::new();
        let site = site_with(&dir, preview(), &runner);

        let Reply::Index(empty) = resolve(&site, "/") else {
            panic!("expected index");
        };
        assert!(empty.contains("Nothing built yet"));

        resolve(&site, "/posts/b.md");
        resolve(&site, "/a%20%26%20b.md");

        let Reply::Index(html) = resolve(&site, "") else {
            panic!("expected index");
        };
        assert!(html.contains("Built documents (2)"));
        assert!(html.contains(r#"<a href="/posts/b.md">posts/b.md</a>"#));
        assert!(html.contains(r#"<a href="/a%20%26%20b.md">a &amp; b.md</a>"#));
    }
}
