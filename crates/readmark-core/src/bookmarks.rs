use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::logging::OUTLINE;
use crate::outline::{OutlineNode, OutlineSource};
use crate::parse::PageContent;

/// Title given to bookmark entries with an empty title, so the outline keeps
/// one node per bookmark.
pub const UNTITLED_SECTION: &str = "Untitled section";

/// Name trees and outline chains deeper than this are treated as malformed.
const MAX_DEPTH: usize = 64;

/// The explicit-position part of a jump target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DestKind {
    /// `/XYZ left top zoom`
    Xyz { left: Option<f32>, top: Option<f32> },
    /// `/FitH top` and `/FitBH top`
    FitH { top: Option<f32> },
    /// Any kind that names no vertical coordinate.
    Other,
}

impl DestKind {
    pub fn top(&self) -> Option<f32> {
        match *self {
            DestKind::Xyz { top, .. } | DestKind::FitH { top } => top,
            DestKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Zero-based target page; `None` when the page reference is dangling.
    pub page_index: Option<usize>,
    pub kind: DestKind,
}

/// One entry of the embedded outline, before position resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bookmark {
    pub title: String,
    pub target: Option<Destination>,
    pub children: Vec<Bookmark>,
}

impl Bookmark {
    pub fn new(title: impl Into<String>, target: Option<Destination>) -> Self {
        Bookmark {
            title: title.into(),
            target,
            children: Vec::new(),
        }
    }
}

/// Resolve bookmark targets to `(page_index, top_ratio)` with each target
/// page's viewport. The resulting tree mirrors the bookmark nesting; ids are
/// derived from the position in that nesting.
pub fn outline_from_bookmarks(bookmarks: &[Bookmark], pages: &[PageContent]) -> Vec<OutlineNode> {
    resolve_level(bookmarks, pages, "outline")
}

fn resolve_level(bookmarks: &[Bookmark], pages: &[PageContent], prefix: &str) -> Vec<OutlineNode> {
    let mut nodes = Vec::with_capacity(bookmarks.len());

    for (i, bookmark) in bookmarks.iter().enumerate() {
        let id = format!("{}-{}", prefix, i);
        let children = resolve_level(&bookmark.children, pages, &id);

        let title = match bookmark.title.trim() {
            "" => UNTITLED_SECTION.to_string(),
            title => title.to_string(),
        };

        let (page_index, top_ratio) = resolve_target(bookmark.target.as_ref(), pages);
        nodes.push(OutlineNode::new(id, title, page_index, top_ratio).with_children(children));
    }

    nodes
}

fn resolve_target(target: Option<&Destination>, pages: &[PageContent]) -> (Option<usize>, Option<f32>) {
    let Some(dest) = target else {
        return (None, None);
    };
    let Some(page) = dest.page_index.and_then(|p| pages.get(p)) else {
        return (None, None);
    };
    let top_ratio = dest.kind.top().map(|top| page.viewport.top_ratio(top));
    (Some(page.page_index), top_ratio)
}

/// Reads the outline straight out of a lopdf document.
pub struct LopdfOutline<'a> {
    doc: &'a Document,
    page_lookup: HashMap<ObjectId, usize>,
}

impl<'a> LopdfOutline<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let page_lookup = doc
            .get_pages()
            .into_iter()
            .map(|(num, id)| (id, num.saturating_sub(1) as usize))
            .collect();
        LopdfOutline { doc, page_lookup }
    }

    fn deref<'o>(&'o self, obj: &'o Object) -> &'o Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    fn dict<'o>(&'o self, obj: &'o Object) -> Option<&'o Dictionary> {
        self.deref(obj).as_dict().ok()
    }

    fn walk_siblings(&self, first: Option<&Object>, depth: usize, seen: &mut HashSet<ObjectId>) -> Vec<Bookmark> {
        let mut out = Vec::new();
        if depth > MAX_DEPTH {
            warn!(target: OUTLINE, "Outline nesting too deep, truncating");
            return out;
        }

        let mut next = first.and_then(|o| o.as_reference().ok());
        while let Some(id) = next {
            if !seen.insert(id) {
                warn!(target: OUTLINE, ?id, "Cycle in outline chain");
                break;
            }
            let Ok(item) = self.doc.get_dictionary(id) else {
                break;
            };

            let title = item
                .get(b"Title")
                .ok()
                .map(|o| self.deref(o))
                .and_then(|o| o.as_str().ok())
                .map(decode_pdf_string)
                .unwrap_or_default();

            let target = self.item_target(item);
            let children = self.walk_siblings(item.get(b"First").ok(), depth + 1, seen);

            out.push(Bookmark {
                title,
                target,
                children,
            });
            next = item.get(b"Next").ok().and_then(|o| o.as_reference().ok());
        }

        out
    }

    fn item_target(&self, item: &Dictionary) -> Option<Destination> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.resolve_dest(dest, 0);
        }
        let action = item.get(b"A").ok().and_then(|a| self.dict(a))?;
        let is_goto = action
            .get(b"S")
            .and_then(Object::as_name)
            .map(|s| s == b"GoTo")
            .unwrap_or(false);
        if !is_goto {
            return None;
        }
        self.resolve_dest(action.get(b"D").ok()?, 0)
    }

    fn resolve_dest(&self, dest: &Object, depth: usize) -> Option<Destination> {
        if depth > 4 {
            return None;
        }
        match self.deref(dest) {
            Object::Array(arr) => Some(self.explicit_dest(arr)),
            Object::Name(name) | Object::String(name, _) => {
                let named = self.named_dest(name)?;
                self.resolve_dest(named, depth + 1)
            }
            Object::Dictionary(d) => self.resolve_dest(d.get(b"D").ok()?, depth + 1),
            _ => None,
        }
    }

    fn explicit_dest(&self, arr: &[Object]) -> Destination {
        let page_index = match arr.first() {
            Some(Object::Reference(id)) => self.page_lookup.get(id).copied(),
            Some(Object::Integer(i)) if *i >= 0 => Some(*i as usize),
            _ => None,
        };
        let num = |i: usize| match arr.get(i).map(|o| self.deref(o)) {
            Some(Object::Integer(v)) => Some(*v as f32),
            Some(Object::Real(v)) => Some(*v),
            _ => None,
        };
        let kind = match arr.get(1).and_then(|o| o.as_name().ok()) {
            Some(b"XYZ") => DestKind::Xyz {
                left: num(2),
                top: num(3),
            },
            Some(b"FitH") | Some(b"FitBH") => DestKind::FitH { top: num(2) },
            _ => DestKind::Other,
        };
        Destination { page_index, kind }
    }

    /// Look a named destination up in `/Dests` or the `/Names /Dests` tree.
    fn named_dest(&self, name: &[u8]) -> Option<&Object> {
        let catalog = self.doc.catalog().ok()?;

        if let Some(dests) = catalog.get(b"Dests").ok().and_then(|d| self.dict(d)) {
            if let Ok(found) = dests.get(name) {
                return Some(found);
            }
        }

        let tree = catalog
            .get(b"Names")
            .ok()
            .and_then(|n| self.dict(n))
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|d| self.dict(d))?;
        self.search_name_tree(tree, name, 0)
    }

    fn search_name_tree<'o>(&'o self, node: &'o Dictionary, name: &[u8], depth: usize) -> Option<&'o Object> {
        if depth > MAX_DEPTH {
            return None;
        }
        if let Some(Object::Array(pairs)) = node.get(b"Names").ok().map(|o| self.deref(o)) {
            for pair in pairs.chunks(2) {
                if let [Object::String(key, _), value] = pair {
                    if key.as_slice() == name {
                        return Some(value);
                    }
                }
            }
        }
        if let Some(Object::Array(kids)) = node.get(b"Kids").ok().map(|o| self.deref(o)) {
            for kid in kids {
                let Some(kid) = self.dict(kid) else {
                    continue;
                };
                if let Some(found) = self.search_name_tree(kid, name, depth + 1) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl OutlineSource for LopdfOutline<'_> {
    fn title(&self) -> Option<String> {
        let info = self.doc.trailer.get(b"Info").ok().and_then(|i| self.dict(i))?;
        let title = info.get(b"Title").ok().map(|t| self.deref(t))?;
        title.as_str().ok().map(decode_pdf_string)
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        let Some(outlines) = self
            .doc
            .catalog()
            .ok()
            .and_then(|c| c.get(b"Outlines").ok())
            .and_then(|o| self.dict(o))
        else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let bookmarks = self.walk_siblings(outlines.get(b"First").ok(), 0, &mut seen);
        debug!(target: OUTLINE, top_level = bookmarks.len(), "Read document outline");
        bookmarks
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8, else PDFDocEncoding
/// approximated as Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
