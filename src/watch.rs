//! Watch coordination for incremental rebuilds.
//!
//! Owns the registry, the debounce scheduler, and the render dispatcher,
//! and drives all three from file-system events on one blocking loop.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         Event Loop                             │
//! │                                                                │
//! │  ┌──────────┐   ┌──────────────────┐   ┌────────────────────┐  │
//! │  │ notify   │──▶│ WatchCoordinator │──▶│ RebuildScheduler   │  │
//! │  │ events   │   │ (state machine)  │   │ (fast/slow fire)   │  │
//! │  └──────────┘   └────────┬─────────┘   └─────────┬──────────┘  │
//! │                          │ registry mutations    │             │
//! │                          ▼                       ▼             │
//! │                      Registry  ───snapshot──▶ RenderDispatcher │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # States
//!
//! - **Idle**: no bundle artifact on disk, waiting for the external
//!   renderer build to produce one.
//! - **Priming**: bundle detected; a settle delay runs down so a
//!   partially-written bundle is never compiled.
//! - **Active**: template compiled, content and template watches live.
//! - **Degraded**: template removed while active; rendering suspended
//!   until it reappears.
//! - **Stopped**: bundle removed while active. Terminal; the external
//!   build owns the bundle, so recovery needs a restart.
//!
//! All registry and dispatch work happens on the loop thread; concurrency
//! exists only as interleaved events and timer expiries.

use crate::{
    config::SiteConfig,
    content::ContentParser,
    log,
    registry::Registry,
    render::{RenderDispatcher, Renderer, output_path},
    schedule::{Rebuild, RebuildScheduler},
    template::CompiledTemplate,
    writer::ArtifactWriter,
};
use anyhow::{Context, Result, bail};
use notify::{Event, EventKind, RecursiveMode, Watcher, event::ModifyKind};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

/// Loop timeout while no deadline is scheduled.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
pub(crate) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Format path as relative to the project root for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Wait for a file to stop being written to.
///
/// Polls the size until it holds still between two polls. A zero window
/// disables the wait entirely.
fn wait_until_stable(path: &Path, max_wait: Duration) -> Result<()> {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    let retries = (max_wait.as_millis() / POLL_INTERVAL.as_millis()) as usize;
    if retries == 0 {
        return Ok(());
    }

    let mut last_size = fs::metadata(path)?.len();
    for _ in 0..retries {
        thread::sleep(POLL_INTERVAL);
        let current_size = fs::metadata(path)?.len();
        if current_size == last_size {
            return Ok(());
        }
        last_size = current_size;
    }

    bail!("file did not stabilize within {max_wait:?}")
}

// =============================================================================
// Watch Registration Seam
// =============================================================================

/// Watch registration surface, implemented by the notify watcher in
/// production and by a recorder in tests.
pub(crate) trait WatchPaths {
    fn watch_path(&mut self, path: &Path, recursive: bool) -> Result<()>;
    fn unwatch_path(&mut self, path: &Path);
}

impl WatchPaths for notify::RecommendedWatcher {
    fn watch_path(&mut self, path: &Path, recursive: bool) -> Result<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))
    }

    fn unwatch_path(&mut self, path: &Path) {
        // Unwatching a path the backend already dropped is not an error
        self.unwatch(path).ok();
    }
}

// =============================================================================
// Event Simplification
// =============================================================================

/// A notify event reduced to what the state machine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FsChange {
    Added(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl FsChange {
    fn path(&self) -> &Path {
        match self {
            Self::Added(path) | Self::Modified(path) | Self::Removed(path) => path,
        }
    }
}

/// Flatten a notify event into per-path changes, dropping editor temp
/// files and metadata-only noise (mtime/chmod churn would loop rebuilds).
pub(crate) fn simplify_event(event: &Event) -> Vec<FsChange> {
    let make: fn(PathBuf) -> FsChange = match event.kind {
        EventKind::Create(_) => FsChange::Added,
        EventKind::Remove(_) => FsChange::Removed,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        // Renames arrive as Modify(Name); the vanished side is a removal
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .filter(|p| !is_temp_file(p))
                .map(|p| {
                    if p.exists() {
                        FsChange::Modified(p.clone())
                    } else {
                        FsChange::Removed(p.clone())
                    }
                })
                .collect();
        }
        EventKind::Modify(_) => FsChange::Modified,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|p| !is_temp_file(p))
        .map(|p| make(p.clone()))
        .collect()
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchState {
    Idle,
    Priming { ready_at: Instant },
    Active,
    Degraded,
    Stopped,
}

/// Which watched surface a path belongs to.
enum Watched {
    Bundle,
    Template,
    Content,
    Other,
}

/// The watch-mode state machine. Owns every mutable piece of the pipeline.
pub(crate) struct WatchCoordinator {
    config: &'static SiteConfig,
    parser: Box<dyn ContentParser>,
    /// Held until first activation, then moved into the dispatcher.
    renderer: Option<Box<dyn Renderer>>,
    writer: Option<Box<dyn ArtifactWriter>>,
    dispatcher: Option<RenderDispatcher>,
    registry: Registry,
    scheduler: RebuildScheduler,
    state: WatchState,
    /// Activation failed after the settle delay (missing template or
    /// unreadable bundle); retry on events instead of spinning.
    priming_blocked: bool,
}

impl WatchCoordinator {
    pub(crate) fn new(
        config: &'static SiteConfig,
        parser: Box<dyn ContentParser>,
        renderer: Box<dyn Renderer>,
        writer: Box<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            config,
            parser,
            renderer: Some(renderer),
            writer: Some(writer),
            dispatcher: None,
            registry: Registry::new(),
            scheduler: RebuildScheduler::new(&config.watch),
            state: WatchState::Idle,
            priming_blocked: false,
        }
    }

    pub(crate) const fn state(&self) -> WatchState {
        self.state
    }

    pub(crate) const fn is_stopped(&self) -> bool {
        matches!(self.state, WatchState::Stopped)
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Begin watching for the bundle artifact. A bundle already on disk
    /// primes immediately.
    pub(crate) fn start(&mut self, watcher: &mut impl WatchPaths, now: Instant) -> Result<()> {
        let output = &self.config.build.output;
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        watcher.watch_path(output, false)?;

        if self.config.bundle_path().exists() {
            self.enter_priming(now);
        } else {
            log!("watch"; "waiting for bundle artifact {}",
                 rel_path(&self.config.bundle_path(), self.config.get_root()));
        }
        Ok(())
    }

    /// Loop timeout until the next scheduled piece of work.
    pub(crate) fn timeout(&self, now: Instant) -> Duration {
        match self.state {
            WatchState::Priming { ready_at } if !self.priming_blocked => ready_at
                .saturating_duration_since(now)
                .max(Duration::from_millis(1)),
            WatchState::Active => self.scheduler.timeout(now),
            _ => IDLE_TIMEOUT,
        }
    }

    /// Run any work whose deadline has passed.
    pub(crate) fn on_tick(&mut self, watcher: &mut impl WatchPaths, now: Instant) {
        match self.state {
            WatchState::Priming { ready_at } if now >= ready_at => {
                self.try_activate(watcher, now);
            }
            WatchState::Active => {
                if let Some(rebuild) = self.scheduler.fast.fire(now) {
                    self.run_rebuild(rebuild);
                }
                if let Some(rebuild) = self.scheduler.slow.fire(now) {
                    self.run_rebuild(rebuild);
                }
            }
            _ => {}
        }
    }

    /// Apply one file-system change to the state machine.
    pub(crate) fn handle_change(
        &mut self,
        watcher: &mut impl WatchPaths,
        change: FsChange,
        now: Instant,
    ) {
        if self.is_stopped() {
            return;
        }

        match self.classify(change.path()) {
            Watched::Bundle => self.on_bundle_change(watcher, &change, now),
            Watched::Template => self.on_template_change(&change),
            Watched::Content => self.on_content_change(&change, now),
            Watched::Other => {}
        }
    }

    fn classify(&self, path: &Path) -> Watched {
        if path == self.config.bundle_path() {
            Watched::Bundle
        } else if path == self.config.build.template {
            Watched::Template
        } else if path.starts_with(&self.config.build.content) {
            Watched::Content
        } else {
            Watched::Other
        }
    }

    // -------------------------------------------------------------------------
    // Bundle artifact
    // -------------------------------------------------------------------------

    fn on_bundle_change(
        &mut self,
        watcher: &mut impl WatchPaths,
        change: &FsChange,
        now: Instant,
    ) {
        match (self.state, change) {
            (WatchState::Idle, FsChange::Added(_) | FsChange::Modified(_)) => {
                self.enter_priming(now);
            }
            // Still being written: push the settle deadline out again
            (WatchState::Priming { .. }, FsChange::Added(_) | FsChange::Modified(_)) => {
                self.state = WatchState::Priming {
                    ready_at: now + self.config.watch.settle(),
                };
            }
            (WatchState::Priming { .. }, FsChange::Removed(_)) => {
                log!("watch"; "bundle artifact vanished before settling");
                self.state = WatchState::Idle;
                self.priming_blocked = false;
            }
            (
                WatchState::Active | WatchState::Degraded,
                FsChange::Added(path) | FsChange::Modified(path),
            ) => {
                // The external build rewrote the renderer input
                wait_until_stable(path, self.stabilize_window()).ok();
                match self.dispatcher.as_mut().unwrap().compile_renderer(path) {
                    Ok(()) => {
                        log!("watch"; "bundle recompiled");
                        if self.state == WatchState::Active {
                            self.run_rebuild(Rebuild::Site);
                        }
                    }
                    Err(e) => log!("error"; "bundle recompile failed: {e:#}"),
                }
            }
            (WatchState::Active | WatchState::Degraded, FsChange::Removed(_)) => {
                self.stop_watches(watcher);
            }
            (WatchState::Idle, FsChange::Removed(_)) | (WatchState::Stopped, _) => {}
        }
    }

    fn enter_priming(&mut self, now: Instant) {
        log!("watch"; "bundle artifact detected, settling");
        self.state = WatchState::Priming {
            ready_at: now + self.config.watch.settle(),
        };
    }

    /// Priming → Active: compile template and renderer, scan content,
    /// render everything once, then go live on content/template watches.
    fn try_activate(&mut self, watcher: &mut impl WatchPaths, _now: Instant) {
        let config = self.config;
        let template_path = &config.build.template;

        let template = match CompiledTemplate::from_path(template_path) {
            Ok(template) => template,
            Err(e) => {
                self.block_priming(watcher, &format!("{e:#}"));
                return;
            }
        };

        let bundle = config.bundle_path();
        match &mut self.dispatcher {
            // Re-entry after a degraded stretch: refresh both inputs
            Some(dispatcher) => {
                dispatcher.set_template(template);
                if let Err(e) = dispatcher.compile_renderer(&bundle) {
                    self.block_priming(watcher, &format!("{e:#}"));
                    return;
                }
            }
            None => {
                let mut renderer = self.renderer.take().expect("renderer consumed once");
                if let Err(e) = renderer.compile(&bundle) {
                    self.renderer = Some(renderer);
                    self.block_priming(watcher, &format!("{e:#}"));
                    return;
                }
                let writer = self.writer.take().expect("writer consumed once");
                self.dispatcher = Some(RenderDispatcher::new(config, renderer, writer, template));
            }
        }

        if let Err(e) = fs::create_dir_all(&config.build.content) {
            log!("error"; "cannot create content directory: {e}");
            return;
        }

        self.scan_content();

        let dispatcher = self.dispatcher.as_ref().unwrap();
        let written = dispatcher.render_all(self.registry.records());
        log!("watch"; "initial render: {written} pages");

        let template_parent = template_path.parent().unwrap_or(Path::new("/"));
        let watched = watcher
            .watch_path(&config.build.content, true)
            .and_then(|()| watcher.watch_path(template_parent, false));
        if let Err(e) = watched {
            log!("error"; "{e:#}");
            return;
        }

        let root = config.get_root();
        log!("watch"; "watching {}/ and {}",
             rel_path(&config.build.content, root), rel_path(template_path, root));

        self.state = WatchState::Active;
        self.priming_blocked = false;
    }

    /// Activation cannot proceed; report once and wait for events.
    fn block_priming(&mut self, watcher: &mut impl WatchPaths, reason: &str) {
        if !self.priming_blocked {
            log!("warn"; "cannot enter watch mode: {reason}");
            // Watch the template's directory so its appearance retries
            // activation without polling
            if let Some(parent) = self.config.build.template.parent() {
                watcher.watch_path(parent, false).ok();
            }
            self.priming_blocked = true;
        }
    }

    /// Parse every content file into the registry.
    fn scan_content(&mut self) {
        crate::build::scan_content(
            self.parser.as_ref(),
            &self.config.build.content,
            &mut self.registry,
        );
        log!("watch"; "found {} pages", self.registry.len());
    }

    // -------------------------------------------------------------------------
    // Template
    // -------------------------------------------------------------------------

    fn on_template_change(&mut self, change: &FsChange) {
        match (self.state, change) {
            (
                WatchState::Active | WatchState::Degraded,
                FsChange::Added(path) | FsChange::Modified(path),
            ) => {
                wait_until_stable(path, self.stabilize_window()).ok();
                match CompiledTemplate::from_path(path) {
                    Ok(template) => {
                        let dispatcher = self.dispatcher.as_ref().unwrap();
                        dispatcher.set_template(template);
                        if self.state == WatchState::Degraded {
                            log!("watch"; "template restored");
                        } else {
                            log!("watch"; "template recompiled");
                        }
                        self.state = WatchState::Active;
                        self.run_rebuild(Rebuild::Site);
                    }
                    // Keep serving output from the last good template
                    Err(e) => log!("error"; "{e:#}"),
                }
            }
            (WatchState::Active, FsChange::Removed(path)) => {
                log!("warn"; "{} was removed; rendering is suspended until it returns",
                     rel_path(path, self.config.get_root()));
                self.scheduler.cancel_all();
                self.state = WatchState::Degraded;
            }
            // Priming retries on the next tick once the template shows up
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    fn on_content_change(&mut self, change: &FsChange, now: Instant) {
        // Registry mutations also apply while Degraded so the full render
        // after template recovery starts from a current content set; only
        // scheduling is suspended there.
        if !matches!(self.state, WatchState::Active | WatchState::Degraded) {
            return;
        }
        let active = self.state == WatchState::Active;
        let root = self.config.get_root();

        match change {
            FsChange::Added(path) => {
                if path.is_dir() {
                    return;
                }
                wait_until_stable(path, self.stabilize_window()).ok();
                match self.parser.parse(path) {
                    Ok(record) => {
                        self.registry.upsert(record);
                        log!("watch"; "added {}", rel_path(path, root));
                        if active {
                            // A new page can affect navigation everywhere
                            self.scheduler.fast.trigger(Rebuild::Site, now);
                            self.scheduler.slow.trigger(Rebuild::Site, now);
                        }
                    }
                    Err(e) => log!("error"; "{}: {:#}", rel_path(path, root), e),
                }
            }
            FsChange::Modified(path) => {
                if path.is_dir() {
                    return;
                }
                wait_until_stable(path, self.stabilize_window()).ok();
                match self.parser.parse(path) {
                    Ok(record) => {
                        let index = self.registry.upsert(record);
                        log!("watch"; "changed {}", rel_path(path, root));
                        if active {
                            self.scheduler.fast.trigger(Rebuild::Page(index), now);
                            self.scheduler.slow.trigger(Rebuild::Site, now);
                        }
                    }
                    Err(e) => log!("error"; "{}: {:#}", rel_path(path, root), e),
                }
            }
            FsChange::Removed(path) => {
                // May race ahead of an add that never finished parsing
                let Some(record) = self.registry.remove_by_source(path) else {
                    return;
                };

                let artifact = output_path(&self.config.build.output, &record.url);
                if let Some(dispatcher) = &self.dispatcher
                    && let Err(e) = dispatcher.writer().delete(&artifact)
                {
                    log!("error"; "cleanup of {}: {:#}", artifact.display(), e);
                }

                log!("watch"; "removed {}", rel_path(path, root));
                if active {
                    self.scheduler.fast.trigger(Rebuild::Site, now);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Rebuild execution
    // -------------------------------------------------------------------------

    /// Execute a fired rebuild over the registry state as of right now.
    fn run_rebuild(&self, rebuild: Rebuild) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        match rebuild {
            Rebuild::Page(index) => {
                dispatcher.render_one(self.registry.records(), index);
            }
            Rebuild::Site => {
                dispatcher.render_all(self.registry.records());
            }
        }
    }

    /// Terminal shutdown after bundle removal. The bundle belongs to the
    /// external renderer build, so there is nothing to auto-recover from.
    fn stop_watches(&mut self, watcher: &mut impl WatchPaths) {
        log!("warn"; "bundle artifact was erased; content is no longer watched");
        log!("warn"; "rerun the renderer build, then restart `regen watch`");

        watcher.unwatch_path(&self.config.build.content);
        if let Some(parent) = self.config.build.template.parent() {
            watcher.unwatch_path(parent);
        }
        watcher.unwatch_path(&self.config.build.output);

        self.scheduler.cancel_all();
        self.state = WatchState::Stopped;
    }

    fn stabilize_window(&self) -> Duration {
        Duration::from_millis(self.config.watch.stabilize_ms)
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Start the blocking watch loop.
///
/// Returns cleanly when the bundle artifact is removed (terminal state) or
/// the watch backend shuts down; no error ever crosses this boundary from
/// individual parse, render, or write failures.
pub fn watch_for_changes_blocking(
    config: &'static SiteConfig,
    parser: Box<dyn ContentParser>,
    renderer: Box<dyn Renderer>,
    writer: Box<dyn ArtifactWriter>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;

    let mut coordinator = WatchCoordinator::new(config, parser, renderer, writer);
    coordinator.start(&mut watcher, Instant::now())?;

    loop {
        match rx.recv_timeout(coordinator.timeout(Instant::now())) {
            Ok(Ok(event)) => {
                for change in simplify_event(&event) {
                    coordinator.handle_change(&mut watcher, change, Instant::now());
                }
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        coordinator.on_tick(&mut watcher, Instant::now());

        if coordinator.is_stopped() {
            break;
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
