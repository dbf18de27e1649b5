//! Visual heading detection for documents without a usable outline.
//!
//! Needs whole-document statistics (median line height, running header
//! counts), so it runs only after every page has been assembled into lines.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::layout::{assemble_lines, TextLine};
use crate::logging::OUTLINE;
use crate::normalize::header_key;
use crate::outline::{build_tree, OutlineNode};
use crate::parse::PageContent;

static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}(?:\.\d{1,3})*)\.?\s+\S").expect("valid regex"));

static CJK_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^第[0-9０-９一二三四五六七八九十百千零〇两]+([章节])").expect("valid regex")
});

/// How a line qualified as a heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    /// `1.2.3 Title`, carrying the number of components.
    Numbered(usize),
    /// `第X章` / `第X节`.
    Chapter,
    Section,
    /// Only the line height set it apart.
    Large,
}

impl HeadingKind {
    pub fn depth(&self) -> usize {
        match *self {
            HeadingKind::Numbered(components) => components.max(1),
            HeadingKind::Section => 2,
            HeadingKind::Chapter | HeadingKind::Large => 1,
        }
    }
}

/// Classify a line's text by its numbering pattern, if any.
pub fn numbering_kind(text: &str) -> Option<HeadingKind> {
    if let Some(caps) = NUMBERED_HEADING.captures(text) {
        let components = caps.get(1).map_or(1, |m| m.as_str().split('.').count());
        return Some(HeadingKind::Numbered(components));
    }
    if let Some(caps) = CJK_HEADING.captures(text) {
        return Some(match caps.get(1).map(|m| m.as_str()) {
            Some("节") => HeadingKind::Section,
            _ => HeadingKind::Chapter,
        });
    }
    None
}

struct PageLines<'a> {
    page: &'a PageContent,
    lines: Vec<TextLine>,
}

fn median(values: &mut [OrderedFloat<f32>]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1].0 + values[mid].0) / 2.0
    } else {
        values[mid].0
    })
}

/// Header-zone keys that recur on enough pages to be running headers.
fn running_headers(pages: &[PageLines<'_>], config: &EngineConfig) -> HashSet<String> {
    let mut seen_on: HashMap<String, HashSet<usize>> = HashMap::new();
    for pl in pages {
        for line in &pl.lines {
            if pl.page.viewport.top_ratio(line.bbox.y1) > config.header_zone {
                continue;
            }
            let key = header_key(&line.text);
            if !key.is_empty() {
                seen_on.entry(key).or_default().insert(pl.page.page_index);
            }
        }
    }

    let threshold = ((pages.len() as f32 * config.running_header_page_ratio).ceil() as usize)
        .max(config.running_header_min_pages);

    seen_on
        .into_iter()
        .filter(|(_, on)| on.len() >= threshold)
        .map(|(key, _)| key)
        .collect()
}

/// Detect headings across the whole document and nest them into a tree.
pub fn detect_headings(pages: &[PageContent], config: &EngineConfig) -> Vec<OutlineNode> {
    let page_lines: Vec<PageLines<'_>> = pages
        .iter()
        .map(|page| PageLines {
            page,
            lines: assemble_lines(&page.runs, config.line_tolerance),
        })
        .collect();

    let mut heights: Vec<OrderedFloat<f32>> = page_lines
        .iter()
        .flat_map(|pl| pl.lines.iter())
        .filter(|l| !l.text.is_empty())
        .map(|l| OrderedFloat(l.max_font_size))
        .collect();
    let Some(median_height) = median(&mut heights) else {
        return Vec::new();
    };

    let running = running_headers(&page_lines, config);
    debug!(
        target: OUTLINE,
        median_height,
        running_headers = running.len(),
        "Heading statistics"
    );

    let mut flat: Vec<(usize, OutlineNode)> = Vec::new();
    let mut last_key: Option<(usize, String)> = None;

    for pl in &page_lines {
        let viewport = &pl.page.viewport;
        for line in &pl.lines {
            let title = line.text.trim();
            let len = title.chars().count();
            if len < config.heading_min_chars || len > config.heading_max_chars {
                continue;
            }
            if viewport.top_ratio(line.y) > 1.0 - config.footer_zone {
                continue;
            }
            let top_ratio = viewport.top_ratio(line.bbox.y1);
            if top_ratio <= config.header_zone && running.contains(&header_key(title)) {
                continue;
            }

            let kind = match numbering_kind(title) {
                Some(kind) => kind,
                None if line.max_font_size >= median_height * config.heading_size_ratio => {
                    HeadingKind::Large
                }
                None => continue,
            };

            let key = (pl.page.page_index, title.to_string());
            if last_key.as_ref() == Some(&key) {
                continue;
            }
            last_key = Some(key);

            trace!(target: OUTLINE, page = pl.page.page_index, title, ?kind, "Heading candidate");
            let id = format!("heading-{}", flat.len());
            flat.push((
                kind.depth(),
                OutlineNode::new(id, title, Some(pl.page.page_index), Some(top_ratio)),
            ));
        }
    }

    build_tree(flat)
}
