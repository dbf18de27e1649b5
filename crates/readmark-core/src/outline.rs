use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bookmarks::{outline_from_bookmarks, Bookmark};
use crate::config::EngineConfig;
use crate::headings::detect_headings;
use crate::logging::OUTLINE;
use crate::parse::PageContent;

pub const ROOT_ID: &str = "root";
pub const DEFAULT_ROOT_TITLE: &str = "Document";

/// A chapter/heading entry. The tree has exactly one synthetic root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub page_index: Option<usize>,
    #[serde(default)]
    pub top_ratio: Option<f32>,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl OutlineNode {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        page_index: Option<usize>,
        top_ratio: Option<f32>,
    ) -> Self {
        OutlineNode {
            id: id.into(),
            title: title.into(),
            page_index,
            top_ratio,
            children: Vec::new(),
            is_root: false,
            is_custom: false,
            parent_id: None,
            order: None,
        }
    }

    pub fn root(title: impl Into<String>, children: Vec<OutlineNode>) -> Self {
        OutlineNode {
            is_root: true,
            children,
            ..OutlineNode::new(ROOT_ID, title, Some(0), Some(0.0))
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }

    /// Pre-order traversal of this node and all descendants.
    pub fn walk(&self) -> Vec<&OutlineNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn find(&self, id: &str) -> Option<&OutlineNode> {
        self.walk().into_iter().find(|n| n.id == id)
    }
}

/// Where the extractor gets the document-level pieces it needs.
pub trait OutlineSource {
    /// Document title for the synthetic root, if the document declares one.
    fn title(&self) -> Option<String>;
    /// Embedded bookmark tree, empty when the document has none.
    fn bookmarks(&self) -> Vec<Bookmark>;
}

/// In-memory source, handy for callers that already parsed the outline.
#[derive(Debug, Clone, Default)]
pub struct StaticOutline {
    pub title: Option<String>,
    pub bookmarks: Vec<Bookmark>,
}

impl OutlineSource for StaticOutline {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.clone()
    }
}

/// Build the chapter tree: bookmarks when they resolve to anything, the
/// visual heading heuristic otherwise. Always returns a single root node.
pub fn extract_outline<S: OutlineSource + ?Sized>(
    source: &S,
    pages: &[PageContent],
    config: &EngineConfig,
) -> Vec<OutlineNode> {
    let bookmarks = source.bookmarks();
    let mut children = outline_from_bookmarks(&bookmarks, pages);

    if children.is_empty() {
        debug!(target: OUTLINE, "No usable bookmarks, detecting headings");
        children = detect_headings(pages, config);
        info!(target: OUTLINE, headings = children.len(), "Outline from heading heuristic");
    } else {
        info!(target: OUTLINE, entries = children.len(), "Outline from bookmarks");
    }

    let title = source
        .title()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOT_TITLE.to_string());

    vec![OutlineNode::root(title, children)]
}

/// Turn a flat, depth-tagged heading list into a tree: each heading becomes a
/// child of the nearest preceding heading with a strictly smaller depth.
pub fn build_tree(headings: Vec<(usize, OutlineNode)>) -> Vec<OutlineNode> {
    fn attach(stack: &mut [(usize, OutlineNode)], roots: &mut Vec<OutlineNode>, node: OutlineNode) {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<(usize, OutlineNode)> = Vec::new();

    for (depth, node) in headings {
        while stack.last().is_some_and(|(d, _)| *d >= depth) {
            if let Some((_, done)) = stack.pop() {
                attach(&mut stack, &mut roots, done);
            }
        }
        stack.push((depth, node));
    }

    while let Some((_, done)) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }

    roots
}
