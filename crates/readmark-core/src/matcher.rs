use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::geo::HighlightRect;
use crate::logging::MATCHER;
use crate::normalize::{normalize_full, normalize_no_punct};
use crate::page_index::{NormalizedStream, PageIndex};

/// Queries whose punctuation-stripped form is this short never use the
/// punctuation-tolerant fallback.
pub const MIN_FALLBACK_QUERY_CHARS: usize = 2;

/// A hit inside a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMatch {
    pub rects: Vec<HighlightRect>,
    pub matched_text: String,
}

/// Result of a document-wide lookup. `page_index == None` means not found.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub rects: Vec<HighlightRect>,
    pub matched_text: String,
    pub page_index: Option<usize>,
}

impl MatchResult {
    pub fn not_found() -> Self {
        MatchResult::default()
    }

    pub fn is_found(&self) -> bool {
        self.page_index.is_some()
    }
}

/// Text a caller wants re-anchored onto the page geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub text: String,
    #[serde(default)]
    pub page_index: Option<usize>,
    #[serde(default)]
    pub rects: Vec<HighlightRect>,
}

impl Evidence {
    pub fn new(text: impl Into<String>) -> Self {
        Evidence {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Locate `query` in one page: exact normalised search first, then the
/// punctuation-stripped stream. Not finding anything is a normal outcome.
pub fn match_in_page(index: &PageIndex, query: &str) -> Option<PageMatch> {
    match_in_page_with(index, query, MIN_FALLBACK_QUERY_CHARS)
}

pub fn match_in_page_with(
    index: &PageIndex,
    query: &str,
    min_fallback_chars: usize,
) -> Option<PageMatch> {
    let needle = normalize_full(query);
    if needle.is_empty() {
        return None;
    }

    if let Some(start) = index.full.find(&needle) {
        trace!(target: MATCHER, page = index.page_index, start, "Exact normalised hit");
        let len = needle.chars().count();
        return Some(reconstruct(index, &index.full, start, len));
    }

    let stripped = normalize_no_punct(query);
    let stripped_len = stripped.chars().count();
    if stripped_len > min_fallback_chars {
        if let Some(start) = index.no_punct.find(&stripped) {
            trace!(target: MATCHER, page = index.page_index, start, "Punctuation-tolerant hit");
            return Some(reconstruct(index, &index.no_punct, start, stripped_len));
        }
    }

    None
}

/// Map the normalised range `[start, start + len)` back onto run rectangles.
fn reconstruct(index: &PageIndex, stream: &NormalizedStream, start: usize, len: usize) -> PageMatch {
    let end = (start + len).min(stream.len());

    let mut contributing: SmallVec<[usize; 8]> = SmallVec::new();
    for &run in &stream.char_to_run[start..end] {
        if contributing.last() != Some(&run) {
            contributing.push(run);
        }
    }

    let first = contributing.first().copied();
    let last = contributing.last().copied();
    let mut rects = Vec::with_capacity(contributing.len());

    for &run in &contributing {
        let Some(full_rect) = index.run_rects.get(run) else {
            continue;
        };
        let run_len = stream.run_char_count.get(run).copied().unwrap_or(0);

        let rect = if (Some(run) == first || Some(run) == last) && run_len > 0 {
            // Covered offsets of this run within the match.
            let covered = (start..end).filter(|&i| stream.char_to_run[i] == run);
            let (mut lo, mut hi) = (usize::MAX, 0);
            for i in covered {
                let off = stream.char_to_offset[i];
                lo = lo.min(off);
                hi = hi.max(off);
            }
            if lo == 0 && hi + 1 >= run_len {
                *full_rect
            } else {
                let sliced =
                    full_rect.horizontal_slice(lo as f32 / run_len as f32, (hi + 1) as f32 / run_len as f32);
                if sliced.width() <= 0.0 {
                    *full_rect
                } else {
                    sliced
                }
            }
        } else {
            *full_rect
        };

        let highlight = HighlightRect::from_viewport_rect(index.page_index, &rect, &index.viewport);
        if !highlight.is_degenerate() {
            rects.push(highlight);
        }
    }

    let matched_text = contributing
        .iter()
        .filter_map(|&run| index.runs.get(run))
        .map(|run| run.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    PageMatch {
        rects,
        matched_text,
    }
}

/// Try every page in document order and return the earliest hit. Pages are
/// evaluated in parallel but the lowest page index always wins.
pub fn match_across_pages(indices: &[PageIndex], query: &str) -> MatchResult {
    match_across_pages_with(indices, query, MIN_FALLBACK_QUERY_CHARS)
}

pub fn match_across_pages_with(
    indices: &[PageIndex],
    query: &str,
    min_fallback_chars: usize,
) -> MatchResult {
    let hit = indices.par_iter().find_map_first(|index| {
        match_in_page_with(index, query, min_fallback_chars).map(|m| (index.page_index, m))
    });

    match hit {
        Some((page_index, m)) => {
            debug!(target: MATCHER, page = page_index, rects = m.rects.len(), "Query located");
            MatchResult {
                rects: m.rects,
                matched_text: m.matched_text,
                page_index: Some(page_index),
            }
        }
        None => {
            debug!(target: MATCHER, query_len = query.len(), "Query not found in document");
            MatchResult::not_found()
        }
    }
}

/// Re-anchor evidence onto the document. Evidence that already carries
/// rectangles is returned as-is; otherwise the first match across pages
/// decides its page and rectangles.
pub fn anchor_evidence(indices: &[PageIndex], evidence: &Evidence) -> Evidence {
    anchor_evidence_with(indices, evidence, MIN_FALLBACK_QUERY_CHARS)
}

pub fn anchor_evidence_with(
    indices: &[PageIndex],
    evidence: &Evidence,
    min_fallback_chars: usize,
) -> Evidence {
    if !evidence.rects.is_empty() {
        return evidence.clone();
    }
    let result = match_across_pages_with(indices, &evidence.text, min_fallback_chars);
    Evidence {
        text: evidence.text.clone(),
        page_index: result.page_index,
        rects: result.rects,
    }
}

/// Anchor a batch of evidence in parallel, preserving input order.
pub fn anchor_all(indices: &[PageIndex], evidence: &[Evidence]) -> Vec<Evidence> {
    anchor_all_with(indices, evidence, MIN_FALLBACK_QUERY_CHARS)
}

pub fn anchor_all_with(
    indices: &[PageIndex],
    evidence: &[Evidence],
    min_fallback_chars: usize,
) -> Vec<Evidence> {
    evidence
        .par_iter()
        .map(|e| anchor_evidence_with(indices, e, min_fallback_chars))
        .collect()
}
