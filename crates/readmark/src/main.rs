use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use readmark_core::chapter::{chapter_for_highlight, rebuild_outline};
use readmark_core::layout::assemble_lines;
use readmark_core::logging::init_logging;
use readmark_core::outline::{OutlineNode, ROOT_ID};
use readmark_core::{DocumentIndex, EngineConfig, MatchResult, RectShape};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Locate text in PDFs and attribute it to chapters.",
    arg_required_else_help = true
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// JSON file with engine thresholds
    #[clap(long, global = true)]
    pub config: Option<String>,

    /// Debug-level logging for engine targets
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Directory for a trace-level log file
    #[clap(long, global = true)]
    pub log_dir: Option<String>,

    /// Pretty-print JSON output
    #[clap(short, long, global = true)]
    pub pretty: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the chapter tree
    Outline {
        pdf: String,
        /// JSON file with custom chapters and parent overrides
        #[clap(long)]
        edits: Option<String>,
    },
    /// Locate each query and report its rectangles and chapter
    Find {
        pdf: String,
        #[clap(required = true)]
        queries: Vec<String>,
    },
    /// Print the chapter owning a position or a highlight rectangle
    Chapter {
        pdf: String,
        #[clap(long, required_unless_present = "rect")]
        page: Option<usize>,
        #[clap(long, default_value_t = 0.0)]
        ratio: f32,
        /// Highlight rectangle as JSON, relative or legacy pixel form
        #[clap(long, conflicts_with = "page")]
        rect: Option<String>,
    },
    /// Print assembled text lines
    Lines {
        pdf: String,
        #[clap(long)]
        page: Option<usize>,
    },
}

/// Saved user edits to an outline.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OutlineEdits {
    custom_chapters: Vec<OutlineNode>,
    parent_overrides: IndexMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindReport<'a> {
    query: &'a str,
    #[serde(flatten)]
    result: MatchResult,
    chapter: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineReport {
    page_index: usize,
    top_ratio: f32,
    font_size: f32,
    text: String,
}

fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand path {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn open(pdf: &str, config: &EngineConfig) -> Result<DocumentIndex> {
    let path = expand(pdf)?;
    DocumentIndex::open(&path, config.clone())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_dir = args.log_dir.as_deref().map(expand).transpose()?;
    let _guard = init_logging(args.verbose, log_dir)?;

    let config = match args.config.as_deref() {
        Some(path) => EngineConfig::from_path(expand(path)?)?,
        None => EngineConfig::default(),
    };
    debug!(?config, "Engine config");

    match &args.command {
        Command::Outline { pdf, edits } => {
            let index = open(pdf, &config)?;
            let outline = match edits {
                Some(path) => {
                    let edits: OutlineEdits = read_json(&expand(path)?)?;
                    rebuild_outline(&index.outline, &edits.custom_chapters, &edits.parent_overrides, ROOT_ID)
                }
                None => index.outline,
            };
            emit(&outline, args.pretty)
        }
        Command::Find { pdf, queries } => {
            let index = open(pdf, &config)?;
            let reports: Vec<FindReport<'_>> = queries
                .iter()
                .map(|query| {
                    let result = index.find(query);
                    let chapter = index.chapter_of(&result).map(|n| n.title.as_str());
                    FindReport {
                        query,
                        result,
                        chapter,
                    }
                })
                .collect();
            emit(&reports, args.pretty)
        }
        Command::Chapter {
            pdf,
            page,
            ratio,
            rect,
        } => {
            let index = open(pdf, &config)?;
            let chapter = match (rect, page) {
                (Some(raw), _) => {
                    let shape: RectShape = serde_json::from_str(raw).context("Invalid --rect JSON")?;
                    let Some(content) = index.contents.get(shape.page_index()) else {
                        bail!("Page {} is out of range", shape.page_index());
                    };
                    let rect = shape.to_canonical(content.viewport.page_width(), content.viewport.page_height());
                    chapter_for_highlight(&index.flat_outline, &rect)
                }
                (None, Some(page)) => index.chapter_at(*page, *ratio),
                (None, None) => bail!("Either --page or --rect is required"),
            };
            emit(&chapter, args.pretty)
        }
        Command::Lines { pdf, page } => {
            let index = open(pdf, &config)?;
            let lines: Vec<LineReport> = index
                .contents
                .iter()
                .filter(|content| page.map_or(true, |p| p == content.page_index))
                .flat_map(|content| {
                    assemble_lines(&content.runs, config.line_tolerance)
                        .into_iter()
                        .map(move |line| LineReport {
                            page_index: content.page_index,
                            top_ratio: content.viewport.top_ratio(line.bbox.y1),
                            font_size: line.max_font_size,
                            text: line.text,
                        })
                })
                .collect();
            emit(&lines, args.pretty)
        }
    }
}
