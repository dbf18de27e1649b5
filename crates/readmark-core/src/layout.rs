use serde::Serialize;
use std::cmp::Ordering;

use crate::geo::Rect;
use crate::parse::TextRun;

/// A single line of text on the page after grouping runs by baseline.
#[derive(Debug, Clone, Serialize)]
pub struct TextLine {
    pub text: String,
    /// Baseline of the first run, the anchor other runs are compared against.
    pub y: f32,
    pub max_font_size: f32,
    pub runs: Vec<TextRun>,
    /// Page-space bounding box of the whole line.
    pub bbox: Rect,
}

impl TextLine {
    pub fn from_runs(y: f32, mut runs: Vec<TextRun>) -> Self {
        runs.sort_by(|a, b| a.origin.0.partial_cmp(&b.origin.0).unwrap_or(Ordering::Equal));

        let mut bbox: Option<Rect> = None;
        let mut max_font_size = 0.0f32;
        for run in &runs {
            max_font_size = max_font_size.max(run.font_size);
            let b = run.bbox();
            bbox = Some(bbox.map_or(b, |acc| acc.union(&b)));
        }

        let text = runs
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        TextLine {
            text,
            y,
            max_font_size,
            runs,
            bbox: bbox.unwrap_or_default(),
        }
    }
}

fn reading_cmp(a: &TextRun, b: &TextRun) -> Ordering {
    b.origin
        .1
        .partial_cmp(&a.origin.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.origin.0.partial_cmp(&b.origin.0).unwrap_or(Ordering::Equal))
}

/// Group runs into lines: top-to-bottom by baseline, a run joining the open
/// line when its baseline is within `tolerance` of the line's anchor.
pub fn assemble_lines(runs: &[TextRun], tolerance: f32) -> Vec<TextLine> {
    let mut sorted = runs.to_vec();
    sorted.sort_by(reading_cmp);

    let mut lines = Vec::new();
    let mut current: Vec<TextRun> = Vec::new();
    let mut anchor_y = f32::MAX;

    for run in sorted {
        if current.is_empty() {
            anchor_y = run.origin.1;
            current.push(run);
        } else if (anchor_y - run.origin.1).abs() <= tolerance {
            current.push(run);
        } else {
            lines.push(TextLine::from_runs(anchor_y, std::mem::take(&mut current)));
            anchor_y = run.origin.1;
            current.push(run);
        }
    }

    if !current.is_empty() {
        lines.push(TextLine::from_runs(anchor_y, current));
    }

    lines
}

/// Runs flattened in line order, left to right within each line.
pub fn reading_order(runs: &[TextRun], tolerance: f32) -> Vec<TextRun> {
    assemble_lines(runs, tolerance)
        .into_iter()
        .flat_map(|line| line.runs)
        .collect()
}
