pub mod bookmarks;
pub mod cache;
pub mod chapter;
pub mod config;
pub mod document;
pub mod geo;
pub mod headings;
pub mod layout;
pub mod logging;
pub mod matcher;
pub mod normalize;
pub mod outline;
pub mod page_index;
pub mod parse;
pub mod tree;

pub use crate::chapter::{
    apply_parent_overrides, chapter_for_highlight, find_chapter_for_position, flatten_outline,
    merge_outline_with_custom,
};
pub use crate::config::EngineConfig;
pub use crate::document::DocumentIndex;
pub use crate::geo::{HighlightRect, PageViewport, RectShape};
pub use crate::matcher::{match_across_pages, match_in_page, Evidence, MatchResult, PageMatch};
pub use crate::outline::{extract_outline, OutlineNode, OutlineSource};
pub use crate::page_index::{build_page_index, PageIndex};
pub use crate::parse::{PageContent, TextRun};

use anyhow::Result;

/// Load a PDF from memory and build its full index.
///
/// # Arguments
/// * `pdf_bytes` - The PDF file contents
/// * `config` - Engine thresholds
pub fn index_pdf(pdf_bytes: &[u8], config: EngineConfig) -> Result<DocumentIndex> {
    let doc = parse::load_pdf_mem(pdf_bytes)?;
    Ok(DocumentIndex::from_document(&doc, config))
}
