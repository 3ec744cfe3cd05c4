//! One-shot site building.
//!
//! `regen build` parses the whole content tree and renders every page plus
//! both aggregates once. Unlike watch mode, a missing template or bundle
//! artifact is a hard error here: there is no watcher around to wait for
//! them to appear.

use crate::{
    config::SiteConfig,
    content::ContentParser,
    log,
    registry::Registry,
    render::{RenderDispatcher, Renderer},
    template::CompiledTemplate,
    writer::ArtifactWriter,
};
use crate::watch::is_temp_file;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse every content file under `content_root` into the registry.
///
/// Individual parse failures are logged and skipped; a single bad file
/// must not keep the rest of the site from building.
pub fn scan_content(parser: &dyn ContentParser, content_root: &Path, registry: &mut Registry) {
    for entry in walkdir::WalkDir::new(content_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if is_temp_file(path) {
            continue;
        }
        match parser.parse(path) {
            Ok(record) => {
                registry.upsert(record);
            }
            Err(e) => log!("error"; "{}: {:#}", path.display(), e),
        }
    }
}

/// Build the entire site once.
pub fn build_site(
    config: &'static SiteConfig,
    parser: Box<dyn ContentParser>,
    mut renderer: Box<dyn Renderer>,
    writer: Box<dyn ArtifactWriter>,
) -> Result<()> {
    let template = CompiledTemplate::from_path(&config.build.template)?;
    renderer.compile(&config.bundle_path()).with_context(|| {
        format!(
            "renderer bundle missing or broken at {} (run the renderer build first)",
            config.bundle_path().display()
        )
    })?;

    let mut registry = Registry::new();
    scan_content(parser.as_ref(), &config.build.content, &mut registry);
    log!("build"; "found {} pages", registry.len());

    let dispatcher = RenderDispatcher::new(config, renderer, writer, template);
    let written = dispatcher.render_all(registry.records());

    if written == 0 {
        log!("warn"; "output is empty, check if {} has content files",
             config.build.content.display());
    } else {
        log!("build"; "done ({written} pages)");
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
