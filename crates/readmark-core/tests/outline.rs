
use pretty_assertions::assert_eq;
use readmark_core::bookmarks::{Bookmark, DestKind, Destination, UNTITLED_SECTION};
use readmark_core::geo::PageViewport;
use readmark_core::outline::{extract_outline, OutlineNode, StaticOutline, DEFAULT_ROOT_TITLE, ROOT_ID};
use readmark_core::parse::{extract_page_runs, load_pdf_mem};
use readmark_core::{index_pdf, EngineConfig, PageContent, TextRun};

use crate::setup::{create_test_pdf_with_config, line, mark, PdfConfig};

/// Titles with nesting, ignoring ids and positions.
#[derive(Debug, PartialEq)]
struct Shape(String, Vec<Shape>);

fn shape(node: &OutlineNode) -> Shape {
    Shape(node.title.clone(), node.children.iter().map(shape).collect())
}

fn leaf(title: &str) -> Shape {
    Shape(title.to_string(), vec![])
}

#[test]
fn test_numbered_headings_nest() {
    let bytes = create_test_pdf_with_config(PdfConfig {
        pages: vec![
            vec![
                line("3 Method", 16.0, 72.0, 700.0),
                line("We describe the approach in detail.", 10.0, 72.0, 680.0),
                line("It has several moving parts.", 10.0, 72.0, 665.0),
                line("3.2 Related Work", 14.0, 72.0, 630.0),
                line("Prior art is summarised below.", 10.0, 72.0, 610.0),
                line("Most of it predates this work.", 10.0, 72.0, 595.0),
            ],
            vec![
                line("4 Results", 16.0, 72.0, 700.0),
                line("The numbers speak for themselves.", 10.0, 72.0, 680.0),
                line("Tables follow on later pages.", 10.0, 72.0, 665.0),
            ],
        ],
        ..Default::default()
    });
    let index = index_pdf(&bytes, EngineConfig::default()).unwrap();

    assert_eq!(index.outline.len(), 1);
    let root = &index.outline[0];
    assert!(root.is_root);
    assert_eq!(root.id, ROOT_ID);
    assert_eq!(
        shape(root),
        Shape(
            DEFAULT_ROOT_TITLE.to_string(),
            vec![
                Shape("3 Method".to_string(), vec![leaf("3.2 Related Work")]),
                leaf("4 Results"),
            ]
        )
    );

    let results = root.find("heading-2").unwrap();
    assert_eq!(results.title, "4 Results");
    assert_eq!(results.page_index, Some(1));
}

#[test]
fn test_running_header_is_not_a_heading() {
    let pages = (0..4)
        .map(|p| {
            let mut lines = vec![line(&format!("Journal of Testing {}", 2024 + p), 18.0, 72.0, 770.0)];
            if p == 0 {
                lines.push(line("1 Introduction", 18.0, 72.0, 700.0));
            }
            lines.extend([
                line("Body text that goes on for a while.", 10.0, 72.0, 650.0),
                line("More body text on the next line.", 10.0, 72.0, 635.0),
                line("And a third line to anchor the median.", 10.0, 72.0, 620.0),
            ]);
            lines
        })
        .collect();
    let bytes = create_test_pdf_with_config(PdfConfig {
        pages,
        ..Default::default()
    });
    let index = index_pdf(&bytes, EngineConfig::default()).unwrap();

    assert_eq!(
        shape(&index.outline[0]),
        Shape(DEFAULT_ROOT_TITLE.to_string(), vec![leaf("1 Introduction")])
    );
}

#[test]
fn test_footer_lines_are_skipped() {
    let bytes = create_test_pdf_with_config(PdfConfig {
        pages: vec![vec![
            line("2 Background", 16.0, 72.0, 700.0),
            line("Ordinary paragraph text here.", 10.0, 72.0, 680.0),
            line("Another ordinary line of text.", 10.0, 72.0, 665.0),
            line("12 Page footer", 10.0, 72.0, 30.0),
        ]],
        ..Default::default()
    });
    let index = index_pdf(&bytes, EngineConfig::default()).unwrap();
    assert_eq!(
        shape(&index.outline[0]),
        Shape(DEFAULT_ROOT_TITLE.to_string(), vec![leaf("2 Background")])
    );
}

#[test]
fn test_bookmarks_take_precedence() {
    let bytes = create_test_pdf_with_config(PdfConfig {
        title: Some("Test Book".to_string()),
        pages: vec![
            vec![line("1 Numbered line", 16.0, 72.0, 700.0)],
            vec![line("Second page", 10.0, 72.0, 700.0)],
            vec![line("Third page", 10.0, 72.0, 700.0)],
        ],
        outline: vec![
            mark("Chapter 1", 0, 720.0, vec![mark("Section 1.1", 1, 396.0, vec![])]),
            mark("Chapter 2", 2, 792.0, vec![]),
        ],
        ..Default::default()
    });
    let index = index_pdf(&bytes, EngineConfig::default()).unwrap();

    let root = &index.outline[0];
    assert_eq!(
        shape(root),
        Shape(
            "Test Book".to_string(),
            vec![
                Shape("Chapter 1".to_string(), vec![leaf("Section 1.1")]),
                leaf("Chapter 2"),
            ]
        )
    );

    let section = root.find("outline-0-0").unwrap();
    assert_eq!(section.page_index, Some(1));
    assert!((section.top_ratio.unwrap() - 0.5).abs() < 1e-4);
    let chapter2 = root.find("outline-1").unwrap();
    assert_eq!(chapter2.top_ratio, Some(0.0));

    assert_eq!(index.chapter_at(1, 0.7).map(|n| n.id.as_str()), Some("outline-0-0"));
    assert_eq!(index.chapter_at(1, 0.2).map(|n| n.id.as_str()), Some("outline-0"));
}

#[test]
fn test_untitled_and_dangling_bookmarks() {
    let viewport = PageViewport::default();
    let pages = vec![PageContent {
        page_index: 0,
        viewport,
        runs: vec![TextRun::new("Body", 72.0, 700.0, 10.0, 20.0)],
    }];
    let target = |page| {
        Some(Destination {
            page_index: Some(page),
            kind: DestKind::FitH { top: Some(792.0) },
        })
    };
    let mut group = Bookmark::new("  ", target(0));
    group.children.push(Bookmark::new("Inside", target(0)));
    let source = StaticOutline {
        title: None,
        bookmarks: vec![
            group,
            Bookmark::new("", target(0)),
            Bookmark::new("Out of range", target(9)),
        ],
    };

    let outline = extract_outline(&source, &pages, &EngineConfig::default());
    assert_eq!(
        shape(&outline[0]),
        Shape(
            DEFAULT_ROOT_TITLE.to_string(),
            vec![
                Shape(UNTITLED_SECTION.to_string(), vec![leaf("Inside")]),
                leaf(UNTITLED_SECTION),
                leaf("Out of range"),
            ]
        )
    );
    let dangling = outline[0].find("outline-2").unwrap();
    assert_eq!(dangling.page_index, None);
    assert_eq!(dangling.top_ratio, None);
}

#[test]
fn test_runs_extracted_from_content_stream() {
    let bytes = create_test_pdf_with_config(PdfConfig::default());
    let doc = load_pdf_mem(&bytes).unwrap();
    let pages = extract_page_runs(&doc);

    assert_eq!(pages.len(), 1);
    let page = &pages[&1];
    assert_eq!(page.page_index, 0);
    let texts: Vec<_> = page.runs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello World!", "This is the first section text."]);
    assert_eq!(page.runs[0].font_size, 24.0);
    assert_eq!(page.runs[0].origin, (72.0, 720.0));
    assert!(page.runs.iter().all(|r| r.width > 0.0));
}
