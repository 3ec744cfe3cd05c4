//! `[build]` section configuration.
//!
//! Contains the pipeline paths (content root, output root, template shell,
//! renderer bundle artifact) and the aggregate generation settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in site.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"          # Source directory
/// output = "public"            # Output directory
/// template = "theme/shell.html"
///
/// [build.sitemap]
/// exclude = ["404", "/analytics"]
///
/// [build.feed]
/// exclude = ["404"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// HTML shell template with the body and head insertion points.
    #[serde(default = "defaults::build::template")]
    #[educe(Default = defaults::build::template())]
    pub template: PathBuf,

    /// Renderer bundle artifact produced by the external renderer build.
    /// Resolved relative to the output directory.
    #[serde(default = "defaults::build::bundle")]
    #[educe(Default = defaults::build::bundle())]
    pub bundle: PathBuf,

    /// Sitemap generation settings.
    #[serde(default)]
    pub sitemap: SitemapConfig,

    /// Feed generation settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

// ============================================================================
// Aggregate Sections
// ============================================================================

/// `[build.sitemap]` - sitemap.xml generation.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Output path, resolved relative to the output directory.
    #[serde(default = "defaults::build::sitemap::path")]
    #[educe(Default = defaults::build::sitemap::path())]
    pub path: PathBuf,

    /// URL fragments whose routes stay out of the sitemap.
    #[serde(default = "defaults::build::sitemap::exclude")]
    #[educe(Default = defaults::build::sitemap::exclude())]
    pub exclude: Vec<String>,
}

/// `[build.feed]` - feed.xml (RSS 2.0) generation.
///
/// The exclusion list is deliberately narrower than the sitemap's: pages
/// the sitemap omits by policy (analytics) still belong in the feed.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Output path, resolved relative to the output directory.
    #[serde(default = "defaults::build::feed::path")]
    #[educe(Default = defaults::build::feed::path())]
    pub path: PathBuf,

    /// URL fragments whose routes stay out of the feed.
    #[serde(default = "defaults::build::feed::exclude")]
    #[educe(Default = defaults::build::feed::exclude())]
    pub exclude: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_defaults() {
        let config = r#"
            [base]
            title = "Test"
            description = "Test"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.content, PathBuf::from("content"));
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.template, PathBuf::from("theme/shell.html"));
        assert_eq!(config.build.bundle, PathBuf::from("render-bundle.json"));
        assert!(config.build.sitemap.enable);
        assert!(config.build.feed.enable);
    }

    #[test]
    fn test_exclusion_defaults_are_asymmetric() {
        let config: SiteConfig = toml::from_str(
            r#"
            [base]
            title = "Test"
            description = "Test"
        "#,
        )
        .unwrap();

        assert_eq!(config.build.sitemap.exclude, vec!["404", "/analytics"]);
        assert_eq!(config.build.feed.exclude, vec!["404"]);
    }

    #[test]
    fn test_build_config_overrides() {
        let config = r#"
            [base]
            title = "Test"
            description = "Test"

            [build]
            content = "posts"
            output = "dist"
            template = "shell/index.html"

            [build.sitemap]
            enable = false
            exclude = ["drafts"]

            [build.feed]
            path = "rss.xml"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.content, PathBuf::from("posts"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert!(!config.build.sitemap.enable);
        assert_eq!(config.build.sitemap.exclude, vec!["drafts"]);
        assert_eq!(config.build.feed.path, PathBuf::from("rss.xml"));
    }
}
