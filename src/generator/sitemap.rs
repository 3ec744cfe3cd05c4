//! Sitemap generation.
//!
//! Generates a sitemap.xml document listing all published routes for search
//! engine indexing, minus the configured exclusions (error pages, analytics
//! routes).
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/posts/hello</loc>
//!     <priority>1.0</priority>
//!     <lastmod>2025-01-01T00:00:00Z</lastmod>
//!   </url>
//! </urlset>
//! ```

use super::is_excluded;
use crate::{config::SiteConfig, registry::PageRecord, utils::date::DateTimeUtc};

// ============================================================================
// Constants
// ============================================================================

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

// ============================================================================
// Public API
// ============================================================================

/// Build the sitemap document from a registry snapshot.
///
/// Pure: timestamps come from the records, never the wall clock.
pub fn generate_sitemap(files: &[PageRecord], config: &SiteConfig) -> String {
    Sitemap::from_records(files, config).into_xml()
}

// ============================================================================
// Sitemap Implementation
// ============================================================================

/// Sitemap data structure
struct Sitemap {
    /// List of URL entries
    urls: Vec<UrlEntry>,
}

/// Single URL entry in the sitemap
struct UrlEntry {
    /// Full URL location
    loc: String,
    /// Last modification timestamp, ISO-8601
    lastmod: String,
}

impl Sitemap {
    /// Collect entries for every record not matching the exclusion list.
    fn from_records(files: &[PageRecord], config: &SiteConfig) -> Self {
        let base_url = config.base_url();
        let exclude = &config.build.sitemap.exclude;

        let urls = files
            .iter()
            .filter(|record| !is_excluded(&record.url, exclude))
            .map(|record| UrlEntry {
                loc: format!("{base_url}{}", record.url),
                lastmod: DateTimeUtc::from_system_time(record.updated).to_rfc3339(),
            })
            .collect();

        Self { urls }
    }

    /// Generate sitemap XML string.
    fn into_xml(self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
        xml.push('\n');

        for entry in self.urls {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
            xml.push_str("    <priority>1.0</priority>\n");
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", entry.lastmod));
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ============================================================================
// Tests
// ============================================================================
