//! Aggregate document generation.
//!
//! Aggregates are derived documents summarizing the whole registry: the
//! sitemap and the feed. Generation is a pure function of a registry
//! snapshot and the site configuration — no wall clock, no filesystem —
//! so the same registry always produces byte-identical documents.

pub mod feed;
pub mod sitemap;

use crate::{config::SiteConfig, registry::PageRecord};
use anyhow::Result;

/// Generate both aggregate documents from a registry snapshot.
///
/// The sitemap and the feed apply different exclusion lists: the feed's is
/// deliberately narrower, so a route the sitemap omits by policy can still
/// be syndicated.
pub fn generate_aggregates(
    files: &[PageRecord],
    config: &SiteConfig,
) -> Result<(String, String)> {
    let sitemap = sitemap::generate_sitemap(files, config);
    let feed = feed::generate_feed(files, config)?;
    Ok((sitemap, feed))
}

/// Check whether a route contains any of the configured excluded fragments.
pub(crate) fn is_excluded(url: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|fragment| url.contains(fragment.as_str()))
}
