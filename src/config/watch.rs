//! `[watch]` section configuration.
//!
//! Timing knobs for the incremental-rebuild engine: the two debounce
//! windows, the priming settle delay, and the write-stabilization window.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[watch]` section in site.toml - rebuild scheduling windows.
///
/// # Example
/// ```toml
/// [watch]
/// fast_debounce_ms = 200
/// slow_debounce_ms = 2000
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet window before a single-page (fast channel) rebuild fires.
    #[serde(default = "defaults::watch::fast_debounce_ms")]
    #[educe(Default = defaults::watch::fast_debounce_ms())]
    pub fast_debounce_ms: u64,

    /// Quiet window before the full-site reconciliation (slow channel) fires.
    #[serde(default = "defaults::watch::slow_debounce_ms")]
    #[educe(Default = defaults::watch::slow_debounce_ms())]
    pub slow_debounce_ms: u64,

    /// Settle delay between bundle detection and the first template compile,
    /// so a partially-written bundle is never read.
    #[serde(default = "defaults::watch::settle_ms")]
    #[educe(Default = defaults::watch::settle_ms())]
    pub settle_ms: u64,

    /// Maximum time to wait for a changed file to stop being written to.
    #[serde(default = "defaults::watch::stabilize_ms")]
    #[educe(Default = defaults::watch::stabilize_ms())]
    pub stabilize_ms: u64,
}

impl WatchConfig {
    pub const fn fast_window(&self) -> Duration {
        Duration::from_millis(self.fast_debounce_ms)
    }

    pub const fn slow_window(&self) -> Duration {
        Duration::from_millis(self.slow_debounce_ms)
    }

    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
