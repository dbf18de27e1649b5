use serde::Serialize;
use tracing::debug;

use crate::geo::{PageViewport, Rect};
use crate::layout::reading_order;
use crate::logging::INDEX;
use crate::normalize::{normalize_full, normalize_no_punct};
use crate::parse::TextRun;

/// Default baseline tolerance used when ordering runs for indexing.
pub const DEFAULT_LINE_TOLERANCE: f32 = 2.0;

/// One normalised character stream with its back-maps to the source runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedStream {
    pub text: String,
    pub chars: Vec<char>,
    /// Run that produced each char.
    pub char_to_run: Vec<usize>,
    /// Offset of each char within its run's own normalised text.
    pub char_to_offset: Vec<usize>,
    /// Normalised length contributed by each run.
    pub run_char_count: Vec<usize>,
}

impl NormalizedStream {
    fn build<F>(runs: &[TextRun], normalize: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        let mut stream = NormalizedStream {
            run_char_count: Vec::with_capacity(runs.len()),
            ..Default::default()
        };

        for (run_idx, run) in runs.iter().enumerate() {
            let normalized = normalize(&run.text);
            let mut count = 0;
            for (offset, ch) in normalized.chars().enumerate() {
                stream.chars.push(ch);
                stream.char_to_run.push(run_idx);
                stream.char_to_offset.push(offset);
                count += 1;
            }
            stream.text.push_str(&normalized);
            stream.run_char_count.push(count);
        }

        stream
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Char index of the first occurrence of an already-normalised needle.
    pub fn find(&self, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        self.text
            .find(needle)
            .map(|byte_idx| self.text[..byte_idx].chars().count())
    }
}

/// Searchable, immutable text index of a single page.
#[derive(Debug, Clone, Serialize)]
pub struct PageIndex {
    pub page_index: usize,
    pub viewport: PageViewport,
    /// Runs in reading order.
    pub runs: Vec<TextRun>,
    /// Viewport-space rectangle of each run.
    pub run_rects: Vec<Rect>,
    pub full: NormalizedStream,
    pub no_punct: NormalizedStream,
}

impl PageIndex {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Build the index for one page with the default line tolerance.
pub fn build_page_index(page_index: usize, runs: &[TextRun], viewport: PageViewport) -> PageIndex {
    build_page_index_with_tolerance(page_index, runs, viewport, DEFAULT_LINE_TOLERANCE)
}

pub fn build_page_index_with_tolerance(
    page_index: usize,
    runs: &[TextRun],
    viewport: PageViewport,
    line_tolerance: f32,
) -> PageIndex {
    let runs = reading_order(runs, line_tolerance);
    let run_rects = runs
        .iter()
        .map(|run| viewport.page_rect_to_viewport(&run.bbox()))
        .collect();
    let full = NormalizedStream::build(&runs, normalize_full);
    let no_punct = NormalizedStream::build(&runs, normalize_no_punct);

    debug!(
        target: INDEX,
        page = page_index,
        runs = runs.len(),
        chars = full.len(),
        "Built page index"
    );

    PageIndex {
        page_index,
        viewport,
        runs,
        run_rects,
        full,
        no_punct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> PageIndex {
        let runs = vec![
            TextRun::new("Neural", 50.0, 700.0, 10.0, 30.0),
            TextRun::new("networks,", 85.0, 700.0, 10.0, 45.0),
            TextRun::new("Second line", 50.0, 680.0, 10.0, 55.0),
        ];
        build_page_index(0, &runs, PageViewport::default())
    }

    #[test]
    fn every_char_maps_back_to_a_run() {
        let index = sample_index();
        for stream in [&index.full, &index.no_punct] {
            assert_eq!(stream.char_to_run.len(), stream.len());
            assert_eq!(stream.char_to_offset.len(), stream.len());
            assert_eq!(stream.run_char_count.iter().sum::<usize>(), stream.len());
        }
        assert_eq!(index.full.text, "neuralnetworks,secondline");
        assert_eq!(index.no_punct.text, "neuralnetworkssecondline");
    }

    #[test]
    fn runs_contribute_contiguous_ranges() {
        let index = sample_index();
        let map = &index.full.char_to_run;
        for pair in map.windows(2) {
            assert!(pair[1] == pair[0] || pair[1] == pair[0] + 1);
        }
        assert_eq!(index.full.run_char_count, vec![6, 9, 10]);
        assert_eq!(index.no_punct.run_char_count, vec![6, 8, 10]);
    }

    #[test]
    fn find_returns_char_index_not_byte_index() {
        let runs = vec![TextRun::new("Über größe", 50.0, 700.0, 10.0, 50.0)];
        let index = build_page_index(0, &runs, PageViewport::default());
        assert_eq!(index.full.find("größe"), Some(4));
    }

    #[test]
    fn run_rects_are_in_viewport_space() {
        let index = sample_index();
        let rect = index.run_rects[0];
        assert!(rect.y0 < rect.y1);
        assert!((rect.y0 - (792.0 - 708.0)).abs() < 1e-3);
    }
}
