
use pretty_assertions::assert_eq;
use readmark_core::matcher::{anchor_all, Evidence};
use readmark_core::{index_pdf, DocumentIndex, EngineConfig};

use crate::setup::{create_test_pdf_with_config, line, Line, PdfConfig};

/// Words laid out left to right on one baseline, one show operator each, the
/// way many producers emit them.
fn words(text: &str, size: f32, y: f32) -> Vec<Line> {
    let mut x = 72.0;
    text.split_whitespace()
        .map(|w| {
            let l = line(w, size, x, y);
            x += (w.chars().count() as f32 + 1.0) * size * 0.5 + 4.0;
            l
        })
        .collect()
}

fn index_pages(pages: Vec<Vec<Line>>) -> DocumentIndex {
    let bytes = create_test_pdf_with_config(PdfConfig {
        pages,
        ..Default::default()
    });
    index_pdf(&bytes, EngineConfig::default()).unwrap()
}

#[test]
fn test_verbatim_sentence_across_runs() {
    let mut page = words("Neural networks generalize well", 12.0, 700.0);
    page.extend(words("in practice, if not in theory.", 12.0, 680.0));
    let index = index_pages(vec![page]);

    let result = index.find("Neural networks generalize well");
    assert_eq!(result.page_index, Some(0));
    assert_eq!(result.matched_text, "Neural networks generalize well");
    assert_eq!(result.rects.len(), 4);
    for rect in &result.rects {
        assert_eq!(rect.page_index, 0);
        assert!(rect.w > 0.0 && rect.h > 0.0, "degenerate rect {:?}", rect);
        assert!(rect.x >= 0.0 && rect.x + rect.w <= 1.0);
        assert!(rect.y >= 0.0 && rect.y + rect.h <= 1.0);
    }
    // Same baseline, so every rect sits at the same height.
    assert!(result.rects.windows(2).all(|w| (w[0].y - w[1].y).abs() < 1e-6));
    assert!(result.rects.windows(2).all(|w| w[0].x < w[1].x));
}

#[test]
fn test_case_and_spacing_are_ignored() {
    let index = index_pages(vec![words("Neural networks generalize well", 12.0, 700.0)]);
    let result = index.find("neural   NETWORKS\ngeneralize");
    assert_eq!(result.page_index, Some(0));
    assert_eq!(result.rects.len(), 3);
}

#[test]
fn test_first_page_wins() {
    let index = index_pages(vec![
        words("Nothing to see on the cover page", 12.0, 700.0),
        words("The repeated phrase shows up here", 12.0, 600.0),
        words("The repeated phrase shows up again", 12.0, 600.0),
    ]);

    let result = index.find("repeated phrase");
    assert_eq!(result.page_index, Some(1));
    assert!(result.rects.iter().all(|r| r.page_index == 1));
}

#[test]
fn test_hallucinated_evidence_is_not_found() {
    let index = index_pages(vec![words("Neural networks generalize well", 12.0, 700.0)]);

    let result = index.find("Quantum entanglement enables teleportation");
    assert!(!result.is_found());
    assert!(result.rects.is_empty());
    assert_eq!(result.matched_text, "");
}

#[test]
fn test_punctuation_tolerant_fallback() {
    let index = index_pages(vec![words("We report state-of-the-art results, again.", 12.0, 700.0)]);

    let result = index.find("state of the art results");
    assert_eq!(result.page_index, Some(0));
    assert_eq!(result.matched_text, "state-of-the-art results,");
    assert_eq!(result.rects.len(), 2);
}

#[test]
fn test_anchor_batch_keeps_order() {
    let index = index_pages(vec![
        words("alpha beta gamma", 12.0, 700.0),
        words("delta epsilon zeta", 12.0, 700.0),
    ]);

    let anchored = anchor_all(
        &index.pages,
        &[
            Evidence::new("epsilon zeta"),
            Evidence::new("not in this document"),
            Evidence::new("alpha"),
        ],
    );
    let pages: Vec<_> = anchored.iter().map(|e| e.page_index).collect();
    assert_eq!(pages, vec![Some(1), None, Some(0)]);
    assert!(anchored[1].rects.is_empty());
}

#[test]
fn test_match_is_attributed_to_chapter() {
    let mut first = vec![line("1 Introduction", 18.0, 72.0, 720.0)];
    first.extend(words("Some opening remarks about the topic.", 10.0, 690.0));
    first.extend(words("More remarks follow on this line.", 10.0, 675.0));
    let mut second = vec![line("2 Evaluation", 18.0, 72.0, 720.0)];
    second.extend(words("The benchmark numbers are reported here.", 10.0, 690.0));
    second.extend(words("And discussed at some length.", 10.0, 675.0));
    let index = index_pages(vec![first, second]);

    let result = index.find("benchmark numbers");
    assert_eq!(result.page_index, Some(1));
    let chapter = index.chapter_of(&result).map(|n| n.title.as_str());
    assert_eq!(chapter, Some("2 Evaluation"));
}
