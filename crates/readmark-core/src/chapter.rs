//! Chapter attribution and outline editing.
//!
//! The resolver answers "which chapter owns this point?" against a flat,
//! position-sorted outline. Merging custom chapters and applying parent
//! overrides go through [`OutlineArena`] and always produce a new tree.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::geo::HighlightRect;
use crate::logging::OUTLINE;
use crate::outline::{OutlineNode, DEFAULT_ROOT_TITLE};
use crate::tree::{position_key, OutlineArena};

/// Same-page distance, as a fraction of page height, within which a heading
/// just below the query still claims it instead of the root.
pub const SAME_LINE_TOLERANCE: f32 = 0.03;

impl OutlineNode {
    /// A user-authored chapter anchored at a document position.
    pub fn custom(title: impl Into<String>, page_index: usize, top_ratio: f32) -> Self {
        OutlineNode {
            is_custom: true,
            ..OutlineNode::new(Uuid::new_v4().to_string(), title, Some(page_index), Some(top_ratio))
        }
    }

    /// A user-authored chapter placed under an explicit parent.
    pub fn custom_under(title: impl Into<String>, parent_id: impl Into<String>) -> Self {
        OutlineNode {
            is_custom: true,
            parent_id: Some(parent_id.into()),
            ..OutlineNode::new(Uuid::new_v4().to_string(), title, None, None)
        }
    }
}

/// Flatten the tree into a list sorted by document position, root first.
/// Children are stripped; nodes without a page are left out.
pub fn flatten_outline(outline: &[OutlineNode]) -> Vec<OutlineNode> {
    let mut flat: Vec<(usize, OutlineNode)> = outline
        .iter()
        .flat_map(|root| root.walk())
        .filter(|node| node.is_root || node.page_index.is_some())
        .enumerate()
        .map(|(seq, node)| {
            let mut own = node.clone();
            own.children = Vec::new();
            (seq, own)
        })
        .collect();

    flat.sort_by(|(sa, a), (sb, b)| {
        b.is_root
            .cmp(&a.is_root)
            .then_with(|| position_key(a).cmp(&position_key(b)))
            .then(sa.cmp(sb))
    });
    flat.into_iter().map(|(_, node)| node).collect()
}

/// The chapter owning `(page_index, top_ratio)`.
pub fn find_chapter_for_position(
    flat: &[OutlineNode],
    page_index: usize,
    top_ratio: f32,
) -> Option<&OutlineNode> {
    find_chapter_for_position_with(flat, page_index, top_ratio, SAME_LINE_TOLERANCE)
}

pub fn find_chapter_for_position_with(
    flat: &[OutlineNode],
    page_index: usize,
    top_ratio: f32,
    same_line_tolerance: f32,
) -> Option<&OutlineNode> {
    let query = (page_index, OrderedFloat(top_ratio));
    let mut owner: Option<&OutlineNode> = None;

    for node in flat {
        if node.is_root {
            owner = owner.or(Some(node));
            continue;
        }
        let Some(page) = node.page_index else {
            continue;
        };
        if (page, OrderedFloat(node.top_ratio.unwrap_or(0.0))) <= query {
            owner = Some(node);
        }
    }

    if owner.map_or(true, |n| n.is_root) {
        // A heading rendered a hair below the query point still owns it.
        let nearby = flat.iter().find(|node| {
            !node.is_root
                && node.page_index == Some(page_index)
                && node.top_ratio.is_some_and(|r| r > top_ratio && r - top_ratio <= same_line_tolerance)
        });
        if nearby.is_some() {
            return nearby;
        }
    }

    owner
}

/// Attribute a highlight to a chapter by its top edge.
pub fn chapter_for_highlight<'a>(flat: &'a [OutlineNode], rect: &HighlightRect) -> Option<&'a OutlineNode> {
    find_chapter_for_position(flat, rect.page_index, rect.y)
}

/// Insert custom chapters into a copy of `base`.
///
/// A custom node with a resolvable `parent_id` goes under that parent, even
/// when the parent is itself a custom node merged in the same call. The rest
/// are placed by position against `base_flat`, falling back to `root_id`.
/// Ids that already exist in the tree are skipped.
pub fn merge_outline_with_custom(
    base: &[OutlineNode],
    custom: &[OutlineNode],
    base_flat: &[OutlineNode],
    root_id: &str,
) -> Vec<OutlineNode> {
    let mut arena = if base.is_empty() {
        let mut root = OutlineNode::root(DEFAULT_ROOT_TITLE, Vec::new());
        root.id = root_id.to_string();
        OutlineArena::from_tree(&[root])
    } else {
        OutlineArena::from_tree(base)
    };
    let Some(root) = arena.index_of(root_id).or_else(|| arena.first_root()) else {
        return base.to_vec();
    };

    let mut pending: Vec<OutlineNode> = Vec::new();
    for node in custom {
        if arena.contains(&node.id) || pending.iter().any(|p| p.id == node.id) {
            debug!(target: OUTLINE, id = %node.id, "Skipping duplicate custom chapter");
            continue;
        }
        let mut node = node.clone();
        node.is_custom = true;
        node.is_root = false;
        pending.push(node);
    }

    let place_by_position = |arena: &mut OutlineArena, node: &OutlineNode| {
        let parent = node
            .page_index
            .and_then(|page| find_chapter_for_position(base_flat, page, node.top_ratio.unwrap_or(0.0)))
            .and_then(|owner| arena.index_of(&owner.id))
            .unwrap_or(root);
        arena.append_child(parent, node);
    };

    while !pending.is_empty() {
        let before = pending.len();

        // Explicit parents, repeated so chains of custom parents settle.
        loop {
            let count = pending.len();
            pending.retain(|node| {
                match node.parent_id.as_deref().and_then(|pid| arena.index_of(pid)) {
                    Some(parent) => {
                        trace!(target: OUTLINE, id = %node.id, "Custom chapter under explicit parent");
                        arena.append_child(parent, node);
                        false
                    }
                    None => true,
                }
            });
            if pending.len() == count {
                break;
            }
        }

        // Nodes still waiting on another pending node stay for the next round.
        let waiting_on: Vec<String> = pending.iter().map(|n| n.id.clone()).collect();
        pending.retain(|node| {
            let waits = node
                .parent_id
                .as_ref()
                .is_some_and(|pid| pid != &node.id && waiting_on.contains(pid));
            if !waits {
                place_by_position(&mut arena, node);
            }
            waits
        });

        if pending.len() == before {
            // Custom parents referencing each other in a loop.
            for node in std::mem::take(&mut pending) {
                place_by_position(&mut arena, &node);
            }
        }
    }

    arena.sort_children();
    arena.into_tree()
}

/// Move nodes to new parents. Overrides apply in insertion order; unknown
/// ids, moves of a root, and moves that would create a cycle are ignored.
pub fn apply_parent_overrides(
    outline: &[OutlineNode],
    overrides: &IndexMap<String, String>,
) -> Vec<OutlineNode> {
    let mut arena = OutlineArena::from_tree(outline);

    for (node_id, parent_id) in overrides {
        let (Some(node), Some(parent)) = (arena.index_of(node_id), arena.index_of(parent_id)) else {
            debug!(target: OUTLINE, node = %node_id, parent = %parent_id, "Override names unknown node");
            continue;
        };
        if !arena.reparent(node, parent) {
            debug!(target: OUTLINE, node = %node_id, parent = %parent_id, "Override rejected");
        }
    }

    arena.sort_children();
    arena.into_tree()
}

/// Merge custom chapters, then apply overrides.
pub fn rebuild_outline(
    base: &[OutlineNode],
    custom: &[OutlineNode],
    overrides: &IndexMap<String, String>,
    root_id: &str,
) -> Vec<OutlineNode> {
    let base_flat = flatten_outline(base);
    let merged = merge_outline_with_custom(base, custom, &base_flat, root_id);
    apply_parent_overrides(&merged, overrides)
}

/// Stamp each node's current sibling position into `order`.
pub fn assign_sibling_order(outline: &[OutlineNode]) -> Vec<OutlineNode> {
    fn stamp(nodes: &mut [OutlineNode]) {
        for (i, node) in nodes.iter_mut().enumerate() {
            node.order = Some(i as u32);
            stamp(&mut node.children);
        }
    }

    let mut tree = outline.to_vec();
    stamp(&mut tree);
    tree
}

/// Move a node to `position` among its siblings, making the arrangement
/// explicit for every sibling.
pub fn reorder_node(outline: &[OutlineNode], node_id: &str, position: usize) -> Vec<OutlineNode> {
    let mut arena = OutlineArena::from_tree(outline);
    match arena.index_of(node_id) {
        Some(node) if arena.move_within_siblings(node, position) => {
            arena.sort_children();
            arena.into_tree()
        }
        _ => outline.to_vec(),
    }
}
