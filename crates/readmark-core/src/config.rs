use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable thresholds for line assembly, matching and heading detection.
/// Any field missing from a config file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max vertical distance (page units) for two runs to share a line.
    pub line_tolerance: f32,
    /// The punctuation-stripped fallback only runs for queries longer than this.
    pub min_fallback_query_chars: usize,
    pub heading_min_chars: usize,
    pub heading_max_chars: usize,
    /// Bottom fraction of the page where headings are never detected.
    pub footer_zone: f32,
    /// Top fraction of the page scanned for running headers.
    pub header_zone: f32,
    /// Line height relative to the document median that marks a heading.
    pub heading_size_ratio: f32,
    pub running_header_page_ratio: f32,
    pub running_header_min_pages: usize,
    /// How far below a query (page fraction) a same-page heading may start
    /// and still own it.
    pub same_line_tolerance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            line_tolerance: 2.0,
            min_fallback_query_chars: 2,
            heading_min_chars: 4,
            heading_max_chars: 120,
            footer_zone: 0.08,
            header_zone: 0.10,
            heading_size_ratio: 1.25,
            running_header_page_ratio: 0.4,
            running_header_min_pages: 3,
            same_line_tolerance: 0.03,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config")
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid config in {}", path.display()))
    }
}
