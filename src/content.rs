//! Content parsing seam.
//!
//! The pipeline never interprets markup. [`ContentParser`] is the
//! collaborator boundary: it turns one source file into a [`PageRecord`].
//! The in-tree default, [`FrontMatterParser`], splits a TOML front-matter
//! block off the file and passes the body through untouched; whatever
//! format the body is in belongs to the renderer.

use crate::{config::SiteConfig, registry::PageRecord, utils::date::DateTimeUtc};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    time::SystemTime,
};

/// Front-matter fence line.
const FENCE: &str = "+++";

/// Produces page records from content source files.
pub trait ContentParser {
    fn parse(&self, source: &Path) -> Result<PageRecord>;
}

// ============================================================================
// Front Matter
// ============================================================================

/// Recognized front-matter fields. Everything else lands in `extra` and is
/// carried to the renderer uninterpreted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    /// Custom route override.
    url: Option<String>,
    author: Option<String>,
    /// Publish date, "YYYY-MM-DD" or "YYYY-MM-DDTHH:MM:SSZ".
    date: Option<String>,
    /// Last-modified override, same formats as `date`.
    updated: Option<String>,
    excerpt: Option<String>,
    draft: bool,
    #[serde(flatten)]
    extra: BTreeMap<String, toml::Value>,
}

/// Split a leading `+++` fenced block from the body.
///
/// Returns `(front_matter, body)`. Files without a fence are all body.
fn split_front_matter(input: &str) -> (Option<&str>, &str) {
    let Some(rest) = input.strip_prefix(FENCE) else {
        return (None, input);
    };
    let Some(rest) = rest.strip_prefix('\n') else {
        return (None, input);
    };

    match rest.split_once("\n+++") {
        // The closing fence must sit on its own line
        Some((front, tail)) if tail.is_empty() || tail.starts_with('\n') => {
            (Some(front), tail.strip_prefix('\n').unwrap_or(tail))
        }
        _ => (None, input),
    }
}

// ============================================================================
// Default Parser
// ============================================================================

/// Default [`ContentParser`]: TOML front matter plus a pass-through body.
pub struct FrontMatterParser {
    config: &'static SiteConfig,
}

impl FrontMatterParser {
    pub const fn new(config: &'static SiteConfig) -> Self {
        Self { config }
    }

    /// Derive the route from the source path: strip the content root and the
    /// extension, root `index` maps to `/`.
    fn derive_route(&self, source: &Path) -> Result<String> {
        let relative = source
            .strip_prefix(&self.config.build.content)
            .map_err(|_| anyhow!("File is not in content directory: {}", source.display()))?
            .with_extension("");

        let route = relative
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path encoding: {}", source.display()))?
            .replace('\\', "/");

        if route == "index" {
            Ok("/".to_string())
        } else {
            Ok(format!("/{route}"))
        }
    }

    fn parse_timestamp(field: &str, value: &str) -> Result<SystemTime> {
        DateTimeUtc::parse(value)
            .map(DateTimeUtc::to_system_time)
            .ok_or_else(|| anyhow!("invalid `{field}` date: {value}"))
    }
}

impl ContentParser for FrontMatterParser {
    fn parse(&self, source: &Path) -> Result<PageRecord> {
        let raw = fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;

        let (front, body) = split_front_matter(&raw);
        let meta: FrontMatter = match front {
            Some(front) => toml::from_str(front)
                .with_context(|| format!("Invalid front matter in {}", source.display()))?,
            None => FrontMatter::default(),
        };

        let url = match meta.url {
            Some(url) if url.starts_with('/') => url,
            Some(url) => format!("/{url}"),
            None => self.derive_route(source)?,
        };

        let title = match meta.title {
            Some(title) => title,
            None => source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        };

        // Filesystem stamps back any date the front matter does not carry
        let fs_modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let created = match meta.date.as_deref() {
            Some(date) => Self::parse_timestamp("date", date)?,
            None => fs_modified,
        };
        let updated = match meta.updated.as_deref() {
            Some(date) => Self::parse_timestamp("updated", date)?,
            None => fs_modified,
        };

        Ok(PageRecord {
            source: source.to_path_buf(),
            url,
            title,
            author: meta.author,
            created,
            updated,
            excerpt: meta.excerpt,
            draft: meta.draft,
            body: body.to_string(),
            extra: meta.extra,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
