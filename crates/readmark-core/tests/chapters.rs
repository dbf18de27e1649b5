use std::collections::HashSet;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use readmark_core::chapter::{
    apply_parent_overrides, assign_sibling_order, find_chapter_for_position, flatten_outline,
    merge_outline_with_custom, rebuild_outline,
};
use readmark_core::geo::{HighlightRect, LegacyRect, RectShape};
use readmark_core::outline::{OutlineNode, ROOT_ID};
use readmark_core::chapter_for_highlight;

fn node(id: &str, page: usize, top: f32) -> OutlineNode {
    OutlineNode::new(id, id, Some(page), Some(top))
}

fn book() -> Vec<OutlineNode> {
    vec![OutlineNode::root(
        "Book",
        vec![
            node("ch1", 0, 0.1).with_children(vec![node("ch1.1", 1, 0.3), node("ch1.2", 2, 0.6)]),
            node("ch2", 4, 0.0).with_children(vec![node("ch2.1", 5, 0.5)]),
            node("ch3", 8, 0.2),
        ],
    )]
}

fn ids_of(outline: &[OutlineNode]) -> Vec<String> {
    outline
        .iter()
        .flat_map(|root| root.walk())
        .map(|n| n.id.clone())
        .collect()
}

fn position_of(flat: &[OutlineNode], id: &str) -> usize {
    flat.iter().position(|n| n.id == id).unwrap()
}

proptest! {
    #[test]
    fn resolver_is_monotonic(
        a in (0usize..10, 0.0f32..1.0),
        b in (0usize..10, 0.0f32..1.0),
    ) {
        let flat = flatten_outline(&book());
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let resolve = |(page, ratio): (usize, f32)| {
            find_chapter_for_position(&flat, page, ratio).map(|n| position_of(&flat, &n.id))
        };
        let (p1, p2) = (resolve(first), resolve(second));
        prop_assert!(p1.is_some() && p2.is_some());
        prop_assert!(p1 <= p2, "{:?} -> {:?}, {:?} -> {:?}", first, p1, second, p2);
    }

    #[test]
    fn overrides_never_lose_or_duplicate_nodes(
        moves in proptest::collection::vec((0usize..7, 0usize..7), 0..12),
    ) {
        let base = book();
        let ids = ids_of(&base);
        let mut overrides = IndexMap::new();
        for (from, to) in moves {
            overrides.insert(ids[from].clone(), ids[to].clone());
        }

        let edited = apply_parent_overrides(&base, &overrides);
        prop_assert_eq!(edited.len(), 1);
        prop_assert!(edited[0].is_root);

        let mut after = ids_of(&edited);
        let unique: HashSet<_> = after.iter().cloned().collect();
        prop_assert_eq!(unique.len(), after.len());
        after.sort();
        let mut before = ids;
        before.sort();
        prop_assert_eq!(after, before);
    }
}

#[test]
fn test_root_owns_text_before_first_chapter() {
    let flat = flatten_outline(&book());
    let owner = find_chapter_for_position(&flat, 0, 0.01).unwrap();
    assert!(owner.is_root);
}

#[test]
fn test_highlight_attribution_accepts_both_rect_forms() {
    let flat = flatten_outline(&book());
    let relative: RectShape = serde_json::from_str(
        r#"{"pageIndex": 5, "x": 0.1, "y": 0.6, "w": 0.2, "h": 0.02}"#,
    )
    .unwrap();
    let legacy: RectShape = serde_json::from_str(
        r#"{"pageIndex": 5, "left": 90, "top": 712.8, "width": 180, "height": 20}"#,
    )
    .unwrap();
    assert!(matches!(relative, RectShape::Relative(_)));
    assert!(matches!(legacy, RectShape::Legacy(LegacyRect { .. })));

    for shape in [relative, legacy] {
        let rect: HighlightRect = shape.to_canonical(612.0, 792.0);
        assert_eq!(chapter_for_highlight(&flat, &rect).map(|n| n.id.as_str()), Some("ch2.1"));
    }
}

#[test]
fn test_custom_chapters_merge_by_parent_and_position() {
    let base = book();
    let flat = flatten_outline(&base);

    let mut by_position = OutlineNode::custom("My notes", 1, 0.9);
    by_position.id = "notes".to_string();
    let mut by_parent = OutlineNode::custom_under("Aside", "ch3");
    by_parent.id = "aside".to_string();
    let mut orphan = OutlineNode::custom_under("Lost", "no-such-node");
    orphan.id = "lost".to_string();

    let merged = merge_outline_with_custom(&base, &[by_position, by_parent, orphan], &flat, ROOT_ID);
    let root = &merged[0];

    let ch11 = root.find("ch1.1").unwrap();
    assert_eq!(ch11.children.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["notes"]);
    assert!(ch11.children[0].is_custom);
    assert_eq!(root.find("ch3").unwrap().children[0].id, "aside");
    // No parent and no position: falls back to the root, after positioned siblings.
    assert_eq!(root.children.last().map(|c| c.id.as_str()), Some("lost"));
    assert_eq!(ids_of(&base), ids_of(&book()));
}

#[test]
fn test_custom_ids_are_unique() {
    let a = OutlineNode::custom("Same", 0, 0.5);
    let b = OutlineNode::custom("Same", 0, 0.5);
    assert_ne!(a.id, b.id);
}

#[test]
fn test_overrides_apply_after_merge() {
    let mut extra = OutlineNode::custom("Appendix", 9, 0.0);
    extra.id = "appendix".to_string();
    let mut overrides = IndexMap::new();
    overrides.insert("appendix".to_string(), ROOT_ID.to_string());
    overrides.insert("ch2.1".to_string(), "ch1".to_string());

    let outline = rebuild_outline(&book(), &[extra], &overrides, ROOT_ID);
    let top: Vec<_> = outline[0].children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(top, vec!["ch1", "ch2", "ch3", "appendix"]);
    let ch1: Vec<_> = outline[0].children[0].children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ch1, vec!["ch1.1", "ch1.2", "ch2.1"]);
}

#[test]
fn test_explicit_order_wins_over_position() {
    let mut ordered = assign_sibling_order(&book());
    // Swap the first two chapters by order alone.
    ordered[0].children[0].order = Some(1);
    ordered[0].children[1].order = Some(0);

    let outline = apply_parent_overrides(&ordered, &IndexMap::new());
    let top: Vec<_> = outline[0].children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(top, vec!["ch2", "ch1", "ch3"]);
}

#[test]
fn test_outline_json_shape() {
    let json = serde_json::to_value(&book()[0]).unwrap();
    assert_eq!(json["isRoot"], true);
    assert_eq!(json["children"][0]["pageIndex"], 0);
    assert!(json["children"][0].get("parentId").is_none());
}
