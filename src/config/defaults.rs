//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn url() -> Option<String> {
        None
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn email() -> String {
        "user@noreply.regen".into()
    }

    pub fn language() -> String {
        "en-US".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }

    pub fn template() -> PathBuf {
        "theme/shell.html".into()
    }

    /// Renderer bundle artifact, resolved relative to the output directory.
    pub fn bundle() -> PathBuf {
        "render-bundle.json".into()
    }

    pub mod sitemap {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "sitemap.xml".into()
        }

        /// Routes containing any of these fragments stay out of the sitemap.
        pub fn exclude() -> Vec<String> {
            vec!["404".into(), "/analytics".into()]
        }
    }

    pub mod feed {
        use std::path::PathBuf;

        pub fn path() -> PathBuf {
            "feed.xml".into()
        }

        /// Narrower than the sitemap exclusion: only error pages stay out.
        pub fn exclude() -> Vec<String> {
            vec!["404".into()]
        }
    }
}

// ============================================================================
// [watch] Section Defaults
// ============================================================================

pub mod watch {
    /// Quiet window for the single-page rebuild channel.
    pub fn fast_debounce_ms() -> u64 {
        200
    }

    /// Quiet window for the full-site reconciliation channel.
    pub fn slow_debounce_ms() -> u64 {
        2000
    }

    /// Delay between bundle detection and first template compile.
    pub fn settle_ms() -> u64 {
        500
    }

    /// Maximum time to wait for a changed file to stop growing.
    pub fn stabilize_ms() -> u64 {
        2000
    }
}
