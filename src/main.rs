//! Regen - an incremental static site build pipeline.
//!
//! Watches a content tree, keeps an in-memory page registry, renders each
//! page through an HTML shell, and republishes the sitemap and feed on
//! every change. Parsing and rendering engines are collaborators behind
//! traits; this binary wires in the front-matter parser and the body
//! renderer.

mod build;
mod cli;
mod config;
mod content;
mod generator;
mod logger;
mod registry;
mod render;
mod schedule;
mod template;
mod utils;
mod watch;
mod writer;

use anyhow::{Result, bail};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use content::FrontMatterParser;
use render::BodyRenderer;
use std::path::Path;
use watch::watch_for_changes_blocking;
use writer::FsWriter;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(cli)?));

    let parser = Box::new(FrontMatterParser::new(config));
    let renderer = Box::new(BodyRenderer::new(config));
    let writer = Box::new(FsWriter);

    match &cli.command {
        Commands::Build { .. } => build_site(config, parser, renderer, writer),
        Commands::Watch { .. } => {
            ctrlc::set_handler(|| {
                logger::log("watch", "stopped");
                std::process::exit(0);
            })?;
            watch_for_changes_blocking(config, parser, renderer, writer)
        }
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("Config file not found: {}", config_path.display());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
