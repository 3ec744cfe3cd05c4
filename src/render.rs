//! Render dispatch.
//!
//! The dispatcher turns registry snapshots into written artifacts: one HTML
//! document per record plus the two aggregates. The rendering engine itself
//! is a collaborator behind [`Renderer`]; the dispatcher owns the compiled
//! shell template and the output-path policy.
//!
//! A failing record never aborts a batch: the error is logged and the rest
//! of the site still publishes.

use crate::{
    config::SiteConfig,
    generator,
    log,
    registry::PageRecord,
    template::CompiledTemplate,
    writer::ArtifactWriter,
};
use anyhow::{Context, Result, bail};
use arc_swap::ArcSwap;
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

// ============================================================================
// Renderer Seam
// ============================================================================

/// Per-render input: the record being rendered plus the full registry
/// snapshot (for cross-page data like navigation). Never persisted.
pub struct RenderContext<'a> {
    pub file: &'a PageRecord,
    pub files: &'a [PageRecord],
}

/// Renderer output: body markup and head metadata, both destined for the
/// shell template's insertion points.
pub struct RenderedPage {
    pub html: String,
    pub head: String,
}

/// The page rendering collaborator.
///
/// `compile` rebuilds internal state from the bundle artifact produced by
/// the external renderer build; `render` produces one page.
pub trait Renderer {
    fn compile(&mut self, bundle: &Path) -> Result<()>;
    fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedPage>;
}

// ============================================================================
// Output Path Policy
// ============================================================================

/// Map a route to its on-disk artifact path.
///
/// The root route maps to `index`; a route without an extension is an HTML
/// page and gets `.html`; a route with an explicit extension is written
/// verbatim.
pub fn output_path(output_root: &Path, url: &str) -> PathBuf {
    let route = if url == "/" { "index" } else { url.trim_start_matches('/') };
    let mut path = output_root.join(route);

    if path.extension().is_none() {
        path.set_extension("html");
    }
    path
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Renders one page or the whole site and republishes the aggregates.
pub struct RenderDispatcher {
    config: &'static SiteConfig,
    renderer: Box<dyn Renderer>,
    writer: Box<dyn ArtifactWriter>,
    /// Replaced by reference on recompile; in-flight renders keep the
    /// instance they loaded.
    template: ArcSwap<CompiledTemplate>,
}

impl RenderDispatcher {
    pub fn new(
        config: &'static SiteConfig,
        renderer: Box<dyn Renderer>,
        writer: Box<dyn ArtifactWriter>,
        template: CompiledTemplate,
    ) -> Self {
        Self {
            config,
            renderer,
            writer,
            template: ArcSwap::from_pointee(template),
        }
    }

    /// Swap in a freshly compiled shell template.
    pub fn set_template(&self, template: CompiledTemplate) {
        self.template.store(Arc::new(template));
    }

    /// Rebuild the renderer from the bundle artifact.
    pub fn compile_renderer(&mut self, bundle: &Path) -> Result<()> {
        self.renderer.compile(bundle)
    }

    pub fn writer(&self) -> &dyn ArtifactWriter {
        &*self.writer
    }

    /// Render every record and republish both aggregates.
    ///
    /// Returns the number of pages written; failures are logged and the
    /// batch keeps going.
    pub fn render_all(&self, files: &[PageRecord]) -> usize {
        let mut written = 0;
        for file in files {
            match self.render_page(files, file) {
                Ok(()) => written += 1,
                Err(e) => log!("error"; "{}: {:#}", file.url, e),
            }
        }

        self.publish_aggregates(files);
        written
    }

    /// Render only `files[index]`, then still republish both aggregates so
    /// they stay consistent with every registry mutation.
    pub fn render_one(&self, files: &[PageRecord], index: usize) -> usize {
        let written = match files.get(index) {
            Some(file) => match self.render_page(files, file) {
                Ok(()) => 1,
                Err(e) => {
                    log!("error"; "{}: {:#}", file.url, e);
                    0
                }
            },
            None => {
                // Stale index from a superseded schedule; the registry moved on
                log!("render"; "skipping stale page index {index}");
                0
            }
        };

        self.publish_aggregates(files);
        written
    }

    /// Render one record through the shell template and write the artifact.
    fn render_page(&self, files: &[PageRecord], file: &PageRecord) -> Result<()> {
        let template = self.template.load();
        let ctx = RenderContext { file, files };
        let page = self.renderer.render(&ctx).context("render failed")?;

        let html = template.fill(&page.html, &page.head);
        let path = output_path(&self.config.build.output, &file.url);
        self.writer.write(&path, html.as_bytes())?;

        log!("render"; "{}", display_rel(&path, &self.config.build.output));
        Ok(())
    }

    /// Regenerate and rewrite sitemap and feed. Failures are logged, never
    /// propagated: aggregates must not take down a render batch.
    fn publish_aggregates(&self, files: &[PageRecord]) {
        let config = self.config;

        let (sitemap, feed) = match (config.build.sitemap.enable, config.build.feed.enable) {
            (true, true) => match generator::generate_aggregates(files, config) {
                Ok((sitemap, feed)) => (Some(sitemap), Some(feed)),
                Err(e) => {
                    // Only the feed can fail; the sitemap still publishes
                    log!("error"; "feed: {e:#}");
                    (
                        Some(generator::sitemap::generate_sitemap(files, config)),
                        None,
                    )
                }
            },
            (true, false) => (
                Some(generator::sitemap::generate_sitemap(files, config)),
                None,
            ),
            (false, true) => match generator::feed::generate_feed(files, config) {
                Ok(feed) => (None, Some(feed)),
                Err(e) => {
                    log!("error"; "feed: {e:#}");
                    (None, None)
                }
            },
            (false, false) => (None, None),
        };

        if let Some(sitemap) = sitemap {
            let path = config.sitemap_path();
            match self.writer.write(&path, sitemap.as_bytes()) {
                Ok(()) => log!("sitemap"; "{}", display_rel(&path, &config.build.output)),
                Err(e) => log!("error"; "sitemap: {e:#}"),
            }
        }

        if let Some(feed) = feed {
            let path = config.feed_path();
            match self.writer.write(&path, feed.as_bytes()) {
                Ok(()) => log!("feed"; "{}", display_rel(&path, &config.build.output)),
                Err(e) => log!("error"; "feed: {e:#}"),
            }
        }
    }
}

/// Format a path relative to the output root for log display.
fn display_rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// ============================================================================
// Default Renderer
// ============================================================================

/// Default [`Renderer`]: passes the record's prepared body through the
/// shell, prefixed with site navigation derived from every page's title,
/// and synthesizes head metadata from the record. The real rendering
/// engine is a collaborator; this one only does what the pipeline owns.
///
/// The navigation is the cross-page reference that makes the slow
/// reconciliation channel matter: a title change on one page leaves every
/// other page's nav stale until the full pass runs.
pub struct BodyRenderer {
    config: &'static SiteConfig,
}

impl BodyRenderer {
    pub const fn new(config: &'static SiteConfig) -> Self {
        Self { config }
    }
}

impl Renderer for BodyRenderer {
    fn compile(&mut self, bundle: &Path) -> Result<()> {
        // Nothing to precompile, but a vanished or unreadable bundle must
        // surface before any render is attempted against it
        if !bundle.is_file() {
            bail!("bundle artifact not found: {}", bundle.display());
        }
        Ok(())
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedPage> {
        let file = ctx.file;
        let description = file
            .excerpt
            .as_deref()
            .unwrap_or(&self.config.base.description);

        let nav: String = ctx
            .files
            .iter()
            .map(|f| {
                format!(
                    "<li><a href=\"{}\">{}</a></li>",
                    f.url,
                    html_escape(&f.title)
                )
            })
            .collect();

        let head = format!(
            "<title>{}</title>\n<meta name=\"description\" content=\"{}\">",
            html_escape(&file.title),
            html_escape(description),
        );

        Ok(RenderedPage {
            html: format!("<nav><ul>{nav}</ul></nav>\n{}", file.body),
            head,
        })
    }
}

/// Escape HTML special characters.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
fn html_escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '"']) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PageRecord;
    use std::{
        cell::RefCell,
        collections::BTreeMap,
        rc::Rc,
        time::UNIX_EPOCH,
    };

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct MemWriter {
        files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
        writes: RefCell<Vec<PathBuf>>,
        deletes: RefCell<Vec<PathBuf>>,
    }

    impl ArtifactWriter for Rc<MemWriter> {
        fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
            self.files
                .borrow_mut()
                .insert(path.to_path_buf(), bytes.to_vec());
            self.writes.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn delete(&self, path: &Path) -> Result<()> {
            self.files.borrow_mut().remove(path);
            self.deletes.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    struct StubRenderer {
        fail_url: Option<String>,
    }

    impl Renderer for StubRenderer {
        fn compile(&mut self, _bundle: &Path) -> Result<()> {
            Ok(())
        }

        fn render(&self, ctx: &RenderContext<'_>) -> Result<RenderedPage> {
            if self.fail_url.as_deref() == Some(ctx.file.url.as_str()) {
                bail!("stub render failure");
            }
            Ok(RenderedPage {
                html: format!("<p>{}</p>", ctx.file.title),
                head: format!("<title>{}</title>", ctx.file.title),
            })
        }
    }

    fn make_record(url: &str, title: &str) -> PageRecord {
        PageRecord {
            source: PathBuf::from(format!("/content{url}.md")),
            url: url.to_string(),
            title: title.to_string(),
            author: None,
            created: UNIX_EPOCH,
            updated: UNIX_EPOCH,
            excerpt: None,
            draft: false,
            body: format!("body of {title}"),
            extra: BTreeMap::new(),
        }
    }

    fn make_config() -> &'static SiteConfig {
        let mut config = SiteConfig::default();
        config.base.title = "Test Site".to_string();
        config.base.description = "A site under test".to_string();
        config.base.url = Some("https://example.com".to_string());
        config.build.output = PathBuf::from("/out");
        Box::leak(Box::new(config))
    }

    fn make_dispatcher(
        fail_url: Option<&str>,
    ) -> (RenderDispatcher, Rc<MemWriter>) {
        let writer = Rc::new(MemWriter::default());
        let template = CompiledTemplate::compile(
            "<html><head><!-- regen:head --></head><body><!-- regen:body --></body></html>",
        )
        .unwrap();
        let dispatcher = RenderDispatcher::new(
            make_config(),
            Box::new(StubRenderer {
                fail_url: fail_url.map(String::from),
            }),
            Box::new(Rc::clone(&writer)),
            template,
        );
        (dispatcher, writer)
    }

    // ------------------------------------------------------------------------
    // output_path tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_output_path_root_maps_to_index() {
        assert_eq!(
            output_path(Path::new("/out"), "/"),
            PathBuf::from("/out/index.html")
        );
    }

    #[test]
    fn test_output_path_appends_html() {
        assert_eq!(
            output_path(Path::new("/out"), "/a"),
            PathBuf::from("/out/a.html")
        );
        assert_eq!(
            output_path(Path::new("/out"), "/posts/hello"),
            PathBuf::from("/out/posts/hello.html")
        );
    }

    #[test]
    fn test_output_path_explicit_extension_verbatim() {
        assert_eq!(
            output_path(Path::new("/out"), "/robots.txt"),
            PathBuf::from("/out/robots.txt")
        );
    }

    // ------------------------------------------------------------------------
    // Dispatcher tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_render_all_writes_pages_and_aggregates() {
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/", "Home"), make_record("/a", "A")];

        let written = dispatcher.render_all(&files);

        assert_eq!(written, 2);
        let map = writer.files.borrow();
        assert!(map.contains_key(Path::new("/out/index.html")));
        assert!(map.contains_key(Path::new("/out/a.html")));
        assert!(map.contains_key(Path::new("/out/sitemap.xml")));
        assert!(map.contains_key(Path::new("/out/feed.xml")));
    }

    #[test]
    fn test_rendered_page_goes_through_template() {
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/a", "A")];

        dispatcher.render_all(&files);

        let html = writer.files.borrow()[Path::new("/out/a.html")].clone();
        let html = String::from_utf8(html).unwrap();
        assert_eq!(
            html,
            "<html><head><title>A</title></head><body><p>A</p></body></html>"
        );
    }

    #[test]
    fn test_render_failure_does_not_abort_batch() {
        let (dispatcher, writer) = make_dispatcher(Some("/bad"));
        let files = vec![
            make_record("/bad", "Bad"),
            make_record("/good", "Good"),
        ];

        let written = dispatcher.render_all(&files);

        assert_eq!(written, 1);
        let map = writer.files.borrow();
        assert!(!map.contains_key(Path::new("/out/bad.html")));
        assert!(map.contains_key(Path::new("/out/good.html")));
        // Aggregates still published, and still list the failed page
        assert!(map.contains_key(Path::new("/out/sitemap.xml")));
        let sitemap = String::from_utf8(map[Path::new("/out/sitemap.xml")].clone()).unwrap();
        assert!(sitemap.contains("/bad"));
    }

    #[test]
    fn test_render_one_rewrites_single_page_plus_aggregates() {
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/a", "A"), make_record("/b", "B")];

        dispatcher.render_one(&files, 0);

        let writes = writer.writes.borrow();
        assert_eq!(
            writes.as_slice(),
            &[
                PathBuf::from("/out/a.html"),
                PathBuf::from("/out/sitemap.xml"),
                PathBuf::from("/out/feed.xml"),
            ]
        );
    }

    #[test]
    fn test_render_one_stale_index_still_publishes_aggregates() {
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/a", "A")];

        let written = dispatcher.render_one(&files, 7);

        assert_eq!(written, 0);
        let writes = writer.writes.borrow();
        assert_eq!(
            writes.as_slice(),
            &[
                PathBuf::from("/out/sitemap.xml"),
                PathBuf::from("/out/feed.xml"),
            ]
        );
    }

    #[test]
    fn test_fast_and_slow_passes_produce_identical_pages() {
        // The slow reconciliation pass over an unchanged registry must not
        // produce different bytes than the fast pass did
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/a", "A"), make_record("/b", "B")];

        dispatcher.render_one(&files, 0);
        let fast = writer.files.borrow()[Path::new("/out/a.html")].clone();

        dispatcher.render_all(&files);
        let slow = writer.files.borrow()[Path::new("/out/a.html")].clone();

        assert_eq!(fast, slow);
    }

    #[test]
    fn test_set_template_swaps_for_next_render() {
        let (dispatcher, writer) = make_dispatcher(None);
        let files = vec![make_record("/a", "A")];

        dispatcher.render_all(&files);
        dispatcher.set_template(
            CompiledTemplate::compile(
                "<!doctype html><html><head><!-- regen:head --></head>\
                 <body class=\"v2\"><!-- regen:body --></body></html>",
            )
            .unwrap(),
        );
        dispatcher.render_all(&files);

        let html = writer.files.borrow()[Path::new("/out/a.html")].clone();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains("class=\"v2\""));
    }

    #[test]
    fn test_disabled_aggregates_are_not_written() {
        let writer = Rc::new(MemWriter::default());
        let mut config = SiteConfig::default();
        config.build.output = PathBuf::from("/out");
        config.build.sitemap.enable = false;
        config.build.feed.enable = false;
        let config: &'static SiteConfig = Box::leak(Box::new(config));

        let dispatcher = RenderDispatcher::new(
            config,
            Box::new(StubRenderer { fail_url: None }),
            Box::new(Rc::clone(&writer)),
            CompiledTemplate::compile("<!-- regen:head --><!-- regen:body -->").unwrap(),
        );
        dispatcher.render_all(&[make_record("/a", "A")]);

        let map = writer.files.borrow();
        assert!(map.contains_key(Path::new("/out/a.html")));
        assert!(!map.contains_key(Path::new("/out/sitemap.xml")));
        assert!(!map.contains_key(Path::new("/out/feed.xml")));
    }

    // ------------------------------------------------------------------------
    // BodyRenderer tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_body_renderer_head_metadata() {
        let config = make_config();
        let renderer = BodyRenderer::new(config);
        let mut record = make_record("/a", "Ties & Tails");
        record.excerpt = Some("a \"quoted\" excerpt".to_string());
        let files = vec![record.clone()];

        let page = renderer
            .render(&RenderContext {
                file: &record,
                files: &files,
            })
            .unwrap();

        assert!(page.html.ends_with("body of Ties & Tails"));
        assert!(page.head.contains("<title>Ties &amp; Tails</title>"));
        assert!(page.head.contains("content=\"a &quot;quoted&quot; excerpt\""));
    }

    #[test]
    fn test_body_renderer_nav_lists_every_page() {
        let config = make_config();
        let renderer = BodyRenderer::new(config);
        let files = vec![make_record("/", "Home"), make_record("/a", "A")];

        let page = renderer
            .render(&RenderContext {
                file: &files[1],
                files: &files,
            })
            .unwrap();

        assert!(page.html.contains("<li><a href=\"/\">Home</a></li>"));
        assert!(page.html.contains("<li><a href=\"/a\">A</a></li>"));
    }

    #[test]
    fn test_body_renderer_description_fallback() {
        let config = make_config();
        let renderer = BodyRenderer::new(config);
        let record = make_record("/a", "A");
        let files = vec![record.clone()];

        let page = renderer
            .render(&RenderContext {
                file: &record,
                files: &files,
            })
            .unwrap();

        assert!(page.head.contains("A site under test"));
    }

    #[test]
    fn test_body_renderer_compile_requires_bundle() {
        let config = make_config();
        let mut renderer = BodyRenderer::new(config);
        let dir = tempfile::tempdir().unwrap();

        assert!(renderer.compile(&dir.path().join("missing.json")).is_err());

        let bundle = dir.path().join("render-bundle.json");
        std::fs::write(&bundle, "{}").unwrap();
        assert!(renderer.compile(&bundle).is_ok());
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("plain"), "plain");
        assert_eq!(html_escape("<b> & \"q\""), "&lt;b&gt; &amp; &quot;q&quot;");
    }
}
