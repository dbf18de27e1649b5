use std::path::Path;

use anyhow::Result;
use lopdf::Document;
use rayon::prelude::*;
use tracing::info;

use crate::bookmarks::LopdfOutline;
use crate::chapter::{find_chapter_for_position_with, flatten_outline};
use crate::config::EngineConfig;
use crate::logging::INDEX;
use crate::matcher::{anchor_all_with, anchor_evidence_with, match_across_pages_with, Evidence, MatchResult};
use crate::outline::{extract_outline, OutlineNode, OutlineSource};
use crate::page_index::{build_page_index_with_tolerance, PageIndex};
use crate::parse::{extract_page_runs, load_pdf, PageContent};

/// Everything the engine knows about one loaded document.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    pub pages: Vec<PageIndex>,
    pub contents: Vec<PageContent>,
    pub outline: Vec<OutlineNode>,
    pub flat_outline: Vec<OutlineNode>,
    pub config: EngineConfig,
}

impl DocumentIndex {
    /// Index every page in parallel, then run the outline pass over the
    /// assembled pages.
    pub fn build<S: OutlineSource + ?Sized>(
        contents: Vec<PageContent>,
        source: &S,
        config: EngineConfig,
    ) -> Self {
        let pages: Vec<PageIndex> = contents
            .par_iter()
            .map(|page| {
                build_page_index_with_tolerance(
                    page.page_index,
                    &page.runs,
                    page.viewport,
                    config.line_tolerance,
                )
            })
            .collect();

        let outline = extract_outline(source, &contents, &config);
        let flat_outline = flatten_outline(&outline);
        info!(
            target: INDEX,
            pages = pages.len(),
            chapters = flat_outline.len().saturating_sub(1),
            "Document indexed"
        );

        DocumentIndex {
            pages,
            contents,
            outline,
            flat_outline,
            config,
        }
    }

    pub fn from_document(doc: &Document, config: EngineConfig) -> Self {
        let contents: Vec<PageContent> = extract_page_runs(doc).into_values().collect();
        DocumentIndex::build(contents, &LopdfOutline::new(doc), config)
    }

    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let doc = load_pdf(path)?;
        Ok(DocumentIndex::from_document(&doc, config))
    }

    pub fn find(&self, query: &str) -> MatchResult {
        match_across_pages_with(&self.pages, query, self.config.min_fallback_query_chars)
    }

    pub fn anchor(&self, evidence: &Evidence) -> Evidence {
        anchor_evidence_with(&self.pages, evidence, self.config.min_fallback_query_chars)
    }

    pub fn anchor_all(&self, evidence: &[Evidence]) -> Vec<Evidence> {
        anchor_all_with(&self.pages, evidence, self.config.min_fallback_query_chars)
    }

    pub fn chapter_at(&self, page_index: usize, top_ratio: f32) -> Option<&OutlineNode> {
        find_chapter_for_position_with(
            &self.flat_outline,
            page_index,
            top_ratio,
            self.config.same_line_tolerance,
        )
    }

    /// Chapter owning the first rectangle of a match.
    pub fn chapter_of(&self, result: &MatchResult) -> Option<&OutlineNode> {
        let rect = result.rects.first()?;
        self.chapter_at(rect.page_index, rect.y)
    }

    /// Replace the outline, e.g. after merging custom chapters.
    pub fn set_outline(&mut self, outline: Vec<OutlineNode>) {
        self.flat_outline = flatten_outline(&outline);
        self.outline = outline;
    }
}
