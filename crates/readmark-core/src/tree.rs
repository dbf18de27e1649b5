use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::outline::OutlineNode;

#[derive(Debug, Clone)]
struct ArenaNode {
    node: OutlineNode,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Outline tree flattened into an arena with parent links, so structural
/// edits never alias the caller's tree. Rebuild with [`OutlineArena::into_tree`].
#[derive(Debug, Clone, Default)]
pub struct OutlineArena {
    nodes: Vec<ArenaNode>,
    by_id: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl OutlineArena {
    pub fn from_tree(roots: &[OutlineNode]) -> Self {
        let mut arena = OutlineArena::default();
        for root in roots {
            let idx = arena.insert(None, root);
            arena.roots.push(idx);
        }
        arena
    }

    fn insert(&mut self, parent: Option<usize>, node: &OutlineNode) -> usize {
        let idx = self.nodes.len();
        let mut own = node.clone();
        own.children = Vec::new();
        self.by_id.entry(own.id.clone()).or_insert(idx);
        self.nodes.push(ArenaNode {
            node: own,
            parent,
            children: Vec::new(),
        });
        for child in &node.children {
            let child_idx = self.insert(Some(idx), child);
            self.nodes[idx].children.push(child_idx);
        }
        idx
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn first_root(&self) -> Option<usize> {
        self.roots.first().copied()
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.nodes.get(idx).and_then(|n| n.parent)
    }

    /// Append `node` (and its subtree) as the last child of `parent`.
    pub fn append_child(&mut self, parent: usize, node: &OutlineNode) -> usize {
        let idx = self.insert(Some(parent), node);
        self.nodes[parent].children.push(idx);
        idx
    }

    /// Whether `ancestor` is `node` itself or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent_of(idx);
        }
        false
    }

    /// Move `node` under `new_parent`. Refused for roots and for moves that
    /// would put a node beneath itself.
    pub fn reparent(&mut self, node: usize, new_parent: usize) -> bool {
        if node >= self.nodes.len() || new_parent >= self.nodes.len() {
            return false;
        }
        let Some(old_parent) = self.nodes[node].parent else {
            return false;
        };
        if self.is_ancestor(node, new_parent) {
            return false;
        }
        self.nodes[old_parent].children.retain(|&c| c != node);
        self.nodes[new_parent].children.push(node);
        self.nodes[node].parent = Some(new_parent);
        true
    }

    /// Move `node` to `position` among its siblings and stamp an explicit
    /// order on every sibling so the arrangement survives re-sorting.
    pub fn move_within_siblings(&mut self, node: usize, position: usize) -> bool {
        let Some(parent) = self.parent_of(node) else {
            return false;
        };
        let siblings = &mut self.nodes[parent].children;
        siblings.retain(|&c| c != node);
        let position = position.min(siblings.len());
        siblings.insert(position, node);
        let siblings = siblings.clone();
        for (i, sibling) in siblings.into_iter().enumerate() {
            self.nodes[sibling].node.order = Some(i as u32);
        }
        true
    }

    /// Sort every child list by document position, explicit `order` first.
    pub fn sort_children(&mut self) {
        for idx in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[idx].children);
            children.sort_by(|&a, &b| position_cmp(&self.nodes[a].node, &self.nodes[b].node));
            // Unordered nodes compete with their positional rank.
            let mut ranked: Vec<(usize, usize, f64)> = children
                .iter()
                .enumerate()
                .map(|(rank, &c)| {
                    let key = self.nodes[c].node.order.map_or(rank as f64, f64::from);
                    (c, rank, key)
                })
                .collect();
            ranked.sort_by(|a, b| {
                OrderedFloat(a.2)
                    .cmp(&OrderedFloat(b.2))
                    .then(a.1.cmp(&b.1))
            });
            self.nodes[idx].children = ranked.into_iter().map(|(c, _, _)| c).collect();
        }
    }

    pub fn into_tree(self) -> Vec<OutlineNode> {
        let mut slots: Vec<Option<ArenaNode>> = self.nodes.into_iter().map(Some).collect();
        self.roots
            .iter()
            .filter_map(|&r| build(&mut slots, r))
            .collect()
    }
}

fn build(slots: &mut [Option<ArenaNode>], idx: usize) -> Option<OutlineNode> {
    let entry = slots.get_mut(idx)?.take()?;
    let mut node = entry.node;
    node.children = entry
        .children
        .iter()
        .filter_map(|&c| build(slots, c))
        .collect();
    Some(node)
}

/// Document position of a node: page first (unplaced nodes last), then the
/// vertical ratio (missing counts as the page top).
pub fn position_key(node: &OutlineNode) -> (usize, OrderedFloat<f32>) {
    (
        node.page_index.unwrap_or(usize::MAX),
        OrderedFloat(node.top_ratio.unwrap_or(0.0)),
    )
}

/// `(page_index, top_ratio, title)` ordering used for sibling lists.
pub fn position_cmp(a: &OutlineNode, b: &OutlineNode) -> Ordering {
    position_key(a)
        .cmp(&position_key(b))
        .then_with(|| a.title.cmp(&b.title))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, page: usize, top: f32) -> OutlineNode {
        OutlineNode::new(id, id, Some(page), Some(top))
    }

    fn sample() -> Vec<OutlineNode> {
        vec![OutlineNode::root(
            "Doc",
            vec![
                node("a", 0, 0.1).with_children(vec![node("a1", 0, 0.5)]),
                node("b", 2, 0.1),
            ],
        )]
    }

    #[test]
    fn round_trips_structure() {
        let tree = sample();
        assert_eq!(OutlineArena::from_tree(&tree).into_tree(), tree);
    }

    #[test]
    fn refuses_to_move_node_under_its_descendant() {
        let mut arena = OutlineArena::from_tree(&sample());
        let a = arena.index_of("a").unwrap();
        let a1 = arena.index_of("a1").unwrap();
        assert!(!arena.reparent(a, a1));
        assert!(!arena.reparent(a, a));
        assert_eq!(arena.parent_of(a), arena.index_of("root"));
    }

    #[test]
    fn explicit_order_beats_position() {
        let mut arena = OutlineArena::from_tree(&sample());
        let b = arena.index_of("b").unwrap();
        assert!(arena.move_within_siblings(b, 0));
        arena.sort_children();
        let tree = arena.into_tree();
        let ids: Vec<_> = tree[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
