//! docbuild - Incremental document builds through a templated converter.

mod build;
mod cache;
mod cascade;
mod cli;
mod config;
mod feed;
mod metadata;
mod serve;
mod site;
mod utils;
mod watch;

#[cfg(test)]
mod test_helpers;

use anyhow::{Context, Result};
use build::build;
use clap::Parser;
use cli::Cli;
use config::{BuildOptions, ToolConfig, validate_sources};
use feed::build_feed;
use metadata::Metadata;
use serve::serve_site;
use site::Site;
use std::{env, path::PathBuf, process, sync::Arc};
use watch::watch_for_changes_blocking;

fn main() {
    let cli = Cli::parse();

    let code = run(&cli).unwrap_or_else(|err| {
        log!("fatal"; "{err:#}");
        1
    });
    process::exit(code);
}

/// Build every requested source, then hand over to the feed, preview, or
/// watch stage. Returns the status of the last build that ran.
fn run(cli: &Cli) -> Result<i32> {
    let root = env::current_dir().context("Failed to read the working directory")?;
    let site = Arc::new(load_site(cli, root)?);

    let mut sources = cli.sources();
    if sources.is_empty() {
        sources.push(PathBuf::from("."));
    }

    let mut status = 0;
    for source in &sources {
        status = build(&site, source, &Metadata::new(), true)?;
    }

    let options = site.options();
    if options.feed {
        status = build_feed(&site, site.root())?;
    }

    if options.serve {
        serve_site(Arc::clone(&site))?;
    } else if options.watch {
        watch_for_changes_blocking(&site)?;
    }

    Ok(status)
}

/// Load tool configuration, apply CLI overrides, and validate inputs.
fn load_site(cli: &Cli, root: PathBuf) -> Result<Site> {
    let config = ToolConfig::load_or_default(&root.join(&cli.config))?;
    let options = BuildOptions::new(config, cli);

    validate_sources(&root, &cli.sources())?;
    options.validate()?;

    Ok(Site::new(&root, options))
}
