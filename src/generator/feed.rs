//! Feed generation.
//!
//! Builds the RSS 2.0 feed document from a registry snapshot. The feed
//! applies its own exclusion list, narrower than the sitemap's: pages the
//! sitemap omits by policy still get syndicated.

use super::is_excluded;
use crate::{config::SiteConfig, registry::PageRecord, utils::date::DateTimeUtc};
use anyhow::{Result, anyhow};
use regex::Regex;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};
use std::sync::LazyLock;

// ============================================================================
// Public API
// ============================================================================

/// Build the feed document from a registry snapshot.
///
/// Pure: publish dates come from the records, never the wall clock. The
/// channel is validated before the document is returned.
pub fn generate_feed(files: &[PageRecord], config: &SiteConfig) -> Result<String> {
    let exclude = &config.build.feed.exclude;
    let items: Vec<_> = files
        .iter()
        .filter(|record| !is_excluded(&record.url, exclude))
        .map(|record| record_to_item(record, config))
        .collect();

    let channel = ChannelBuilder::default()
        .title(&config.base.title)
        .link(config.base_url())
        .description(&config.base.description)
        .language(config.base.language.clone())
        .generator("regen".to_string())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("feed validation failed: {e}"))?;
    Ok(channel.to_string())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert a [`PageRecord`] to a feed item.
///
/// The absolute URL doubles as the link and the permalink guid, making it
/// the entry's immutable identifier.
fn record_to_item(record: &PageRecord, config: &SiteConfig) -> rss::Item {
    let link = format!("{}{}", config.base_url(), record.url);
    let description = record
        .excerpt
        .clone()
        .unwrap_or_else(|| config.base.description.clone());
    let pub_date = DateTimeUtc::from_system_time(record.created).to_rfc2822();

    ItemBuilder::default()
        .title(record.title.clone())
        .link(Some(link.clone()))
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .description(description)
        .pub_date(pub_date)
        .author(normalize_feed_author(record.author.as_deref(), config))
        .build()
}

/// Normalize the author field to feed format: "email@example.com (Name)"
///
/// The record author wins over the site author; whichever is chosen gets
/// wrapped with the site email when it is a bare name.
fn normalize_feed_author(author: Option<&str>, config: &SiteConfig) -> String {
    static RE_VALID_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}[ \t]*\([^)]+\)$").unwrap()
    });

    let author = author.unwrap_or(&config.base.author);

    if RE_VALID_AUTHOR.is_match(author) {
        author.to_string()
    } else {
        format!("{} ({author})", config.base.email)
    }
}

// ============================================================================
// Tests
// ============================================================================
