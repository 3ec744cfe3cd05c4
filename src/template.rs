//! Compiled HTML shell template.
//!
//! The shell carries two named insertion points: one for the rendered page
//! body and one for head metadata. Compilation validates that both slots
//! are present, so a broken shell is rejected before any page is rendered
//! against it.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Insertion point for the rendered page body.
pub const BODY_SLOT: &str = "<!-- regen:body -->";
/// Insertion point for head metadata (title, meta tags).
pub const HEAD_SLOT: &str = "<!-- regen:head -->";

/// HTML shell with validated body and head insertion points.
///
/// Replaced by reference: the dispatcher holds it behind an
/// [`arc_swap::ArcSwap`], so a recompile swaps in a fresh instance while
/// in-flight renders keep the one they loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    source: String,
}

impl CompiledTemplate {
    /// Validate the shell source and compile it.
    pub fn compile(source: &str) -> Result<Self> {
        if !source.contains(BODY_SLOT) {
            bail!("template is missing the body slot `{BODY_SLOT}`");
        }
        if !source.contains(HEAD_SLOT) {
            bail!("template is missing the head slot `{HEAD_SLOT}`");
        }
        Ok(Self {
            source: source.to_owned(),
        })
    }

    /// Read and compile the shell from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Self::compile(&source).with_context(|| format!("Invalid template {}", path.display()))
    }

    /// Produce a full HTML document with both slots filled.
    pub fn fill(&self, body: &str, head: &str) -> String {
        self.source
            .replacen(HEAD_SLOT, head, 1)
            .replacen(BODY_SLOT, body, 1)
    }
}
