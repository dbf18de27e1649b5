use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use lopdf::{content::Operation, Dictionary, Document, Encoding, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::geo::{PageViewport, Rect, DEFAULT_MEDIA_BOX};
use crate::logging::PARSE;

/// Share of the font size that sits below the baseline.
const DESCENT_RATIO: f32 = 0.2;

/// Advance used for glyphs whose font has no `/Widths`, in em.
const FALLBACK_GLYPH_WIDTH: f32 = 0.5;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// One drawn text fragment, in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Baseline origin (x, y), y growing upwards.
    pub origin: (f32, f32),
    pub font_size: f32,
    /// Advance width in page units.
    pub width: f32,
    pub font_name: Option<String>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32, width: f32) -> Self {
        TextRun {
            text: text.into(),
            origin: (x, y),
            font_size,
            width,
            font_name: None,
        }
    }

    /// Page-space box: baseline minus descent up to the font's ascent.
    pub fn bbox(&self) -> Rect {
        let (x, y) = self.origin;
        let descent = self.font_size * DESCENT_RATIO;
        Rect::new(x, y - descent, x + self.width, y - descent + self.font_size)
    }
}

impl fmt::Display for TextRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" ({:.1}, {:.1}) w={:.1} {}pt{}",
            self.text,
            self.origin.0,
            self.origin.1,
            self.width,
            self.font_size,
            self.font_name
                .as_ref()
                .map(|n| format!(" {}", n))
                .unwrap_or_default()
        )
    }
}

/// Raw text runs of one page plus its viewport, as handed to the indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    /// Zero-based page index.
    pub page_index: usize,
    pub viewport: PageViewport,
    pub runs: Vec<TextRun>,
}

pub fn load_pdf<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    Document::load(path).with_context(|| format!("Failed to load PDF {}", path.display()))
}

pub fn load_pdf_mem(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).context("Failed to parse PDF bytes")
}

#[derive(Clone, Debug)]
struct GraphicsState {
    ctm: [f32; 6],
    text_state: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: IDENTITY,
            text_state: TextState::default(),
        }
    }
}

#[derive(Clone, Debug)]
struct TextState {
    text_matrix: [f32; 6],      // Tm
    text_line_matrix: [f32; 6], // Tlm
    font_resource: Option<Vec<u8>>,
    font_size: f32,
    character_spacing: f32,  // Tc
    word_spacing: f32,       // Tw
    horizontal_scaling: f32, // Tz as a fraction
    leading: f32,            // TL
    rise: f32,               // Ts
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
            font_resource: None,
            font_size: 0.0,
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn begin(&mut self) {
        self.text_matrix = IDENTITY;
        self.text_line_matrix = IDENTITY;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text_matrix = multiply_matrices(&translate_matrix(tx, ty), &self.text_line_matrix);
        self.text_line_matrix = self.text_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }
}

/// Per-font data needed to turn shown strings into text and advances.
struct FontInfo<'a> {
    base_font: Option<String>,
    encoding: Option<Encoding<'a>>,
    first_char: i64,
    widths: Vec<f32>,
}

impl FontInfo<'_> {
    fn glyph_width(&self, code: u8) -> f32 {
        let idx = code as i64 - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                return w / 1000.0;
            }
        }
        FALLBACK_GLYPH_WIDTH
    }
}

fn load_fonts<'a>(
    doc: &'a Document,
    fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
) -> BTreeMap<Vec<u8>, FontInfo<'a>> {
    fonts
        .iter()
        .map(|(name, dict)| {
            let base_font = dict
                .get(b"BaseFont")
                .and_then(Object::as_name)
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .ok();
            let encoding = match dict.get_font_encoding(doc) {
                Ok(enc) => Some(enc),
                Err(e) => {
                    warn!(target: PARSE, font = ?base_font, error = %e, "Unsupported font encoding");
                    None
                }
            };
            let first_char = dict
                .get(b"FirstChar")
                .and_then(Object::as_i64)
                .unwrap_or(0);
            let widths = dict
                .get(b"Widths")
                .and_then(|obj| match obj {
                    Object::Reference(id) => doc.get_object(*id),
                    other => Ok(other),
                })
                .and_then(Object::as_array)
                .map(|arr| arr.iter().map(operand_as_float).collect())
                .unwrap_or_default();
            (
                name.clone(),
                FontInfo {
                    base_font,
                    encoding,
                    first_char,
                    widths,
                },
            )
        })
        .collect()
}

/// Extract text runs for every page, keyed by 1-based page number. Pages
/// whose content stream cannot be decoded are logged and left empty.
pub fn extract_page_runs(doc: &Document) -> BTreeMap<u32, PageContent> {
    doc.get_pages()
        .into_iter()
        .map(|(page_num, page_id)| {
            let page_index = page_num.saturating_sub(1) as usize;
            let viewport = page_viewport(doc, page_id);
            let runs = match get_page_text_runs(doc, page_num, page_id) {
                Ok(runs) => runs,
                Err(e) => {
                    warn!(target: PARSE, page = page_num, error = %e, "Failed to extract page text");
                    Vec::new()
                }
            };
            debug!(target: PARSE, page = page_num, runs = runs.len(), "Extracted page runs");
            (
                page_num,
                PageContent {
                    page_index,
                    viewport,
                    runs,
                },
            )
        })
        .collect()
}

/// Viewport at scale 1 from the page's (possibly inherited) `/MediaBox`.
pub fn page_viewport(doc: &Document, page_id: ObjectId) -> PageViewport {
    PageViewport::from_media_box(media_box(doc, page_id).unwrap_or(DEFAULT_MEDIA_BOX), 1.0)
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = Some(page_id);
    // Walk up /Parent links; the depth bound guards against malformed cycles.
    for _ in 0..32 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(arr) = dict.get(b"MediaBox").and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).and_then(Object::as_array),
            other => other.as_array(),
        }) {
            if arr.len() >= 4 {
                let mut media_box = [0.0; 4];
                for (i, obj) in arr.iter().take(4).enumerate() {
                    media_box[i] = operand_as_float(obj);
                }
                return Some(media_box);
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn get_page_text_runs(doc: &Document, page_number: u32, page_id: ObjectId) -> Result<Vec<TextRun>> {
    let content = doc
        .get_and_decode_page_content(page_id)
        .with_context(|| format!("Failed to decode content for page {}", page_number))?;
    let fonts = doc
        .get_page_fonts(page_id)
        .with_context(|| format!("Failed to get fonts for page {}", page_number))?;
    let fonts = load_fonts(doc, &fonts);

    let mut gs_stack = vec![GraphicsState::default()];
    let mut runs = Vec::new();

    for op in &content.operations {
        handle_operator(&mut gs_stack, op, &fonts, &mut runs);
    }

    Ok(runs)
}

fn handle_operator(
    gs_stack: &mut Vec<GraphicsState>,
    op: &Operation,
    fonts: &BTreeMap<Vec<u8>, FontInfo<'_>>,
    runs: &mut Vec<TextRun>,
) {
    match op.operator.as_ref() {
        "q" => {
            if let Some(current) = gs_stack.last().cloned() {
                gs_stack.push(current);
            }
            return;
        }
        "Q" => {
            if gs_stack.len() > 1 {
                gs_stack.pop();
            }
            return;
        }
        _ => {}
    }

    let Some(gs) = gs_stack.last_mut() else {
        return;
    };
    let ts = &mut gs.text_state;

    match op.operator.as_ref() {
        "cm" => {
            let m = matrix_from_operands(op);
            gs.ctm = multiply_matrices(&m, &gs.ctm);
        }
        "BT" => ts.begin(),
        "ET" => {}
        "Tf" => {
            if let (Some(Object::Name(font_name)), Some(size)) =
                (op.operands.first(), op.operands.get(1))
            {
                ts.font_resource = Some(font_name.clone());
                ts.font_size = operand_as_float(size);
            }
        }
        "Tc" => {
            if let Some(v) = op.operands.first() {
                ts.character_spacing = operand_as_float(v);
            }
        }
        "Tw" => {
            if let Some(v) = op.operands.first() {
                ts.word_spacing = operand_as_float(v);
            }
        }
        "Tz" => {
            if let Some(v) = op.operands.first() {
                ts.horizontal_scaling = operand_as_float(v) / 100.0;
            }
        }
        "TL" => {
            if let Some(v) = op.operands.first() {
                ts.leading = operand_as_float(v);
            }
        }
        "Ts" => {
            if let Some(v) = op.operands.first() {
                ts.rise = operand_as_float(v);
            }
        }
        "Tm" => {
            let m = matrix_from_operands(op);
            ts.text_matrix = m;
            ts.text_line_matrix = m;
        }
        "Td" => {
            if let (Some(tx), Some(ty)) = (op.operands.first(), op.operands.get(1)) {
                ts.move_line(operand_as_float(tx), operand_as_float(ty));
            }
        }
        "TD" => {
            if let (Some(tx), Some(ty)) = (op.operands.first(), op.operands.get(1)) {
                let ty = operand_as_float(ty);
                ts.leading = -ty;
                ts.move_line(operand_as_float(tx), ty);
            }
        }
        "T*" => ts.next_line(),
        "Tj" | "TJ" => show_text(gs, &op.operands, fonts, runs),
        "'" => {
            gs.text_state.next_line();
            show_text(gs, &op.operands, fonts, runs);
        }
        "\"" => {
            if let (Some(aw), Some(ac)) = (op.operands.first(), op.operands.get(1)) {
                gs.text_state.word_spacing = operand_as_float(aw);
                gs.text_state.character_spacing = operand_as_float(ac);
            }
            gs.text_state.next_line();
            let shown = op.operands.get(2..).unwrap_or_default();
            show_text(gs, shown, fonts, runs);
        }
        _ => {}
    }
}

/// Emit one run for a show operator and advance the text matrix past it.
fn show_text(
    gs: &mut GraphicsState,
    operands: &[Object],
    fonts: &BTreeMap<Vec<u8>, FontInfo<'_>>,
    runs: &mut Vec<TextRun>,
) {
    let ts = &gs.text_state;
    let font = ts.font_resource.as_ref().and_then(|name| fonts.get(name));
    let Some(font) = font else {
        trace!(target: PARSE, "Text shown without a usable font");
        return;
    };

    let mut text = String::new();
    let mut advance = 0.0f32; // text space, unscaled by Th
    collect_shown(ts, font, operands, &mut text, &mut advance);

    let th = ts.horizontal_scaling;
    let trm = multiply_matrices(
        &[1.0, 0.0, 0.0, 1.0, 0.0, ts.rise],
        &multiply_matrices(&ts.text_matrix, &gs.ctm),
    );
    let x_scale = (trm[0] * trm[0] + trm[1] * trm[1]).sqrt();
    let y_scale = (trm[2] * trm[2] + trm[3] * trm[3]).sqrt();

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        runs.push(TextRun {
            text: collapsed,
            origin: (trm[4], trm[5]),
            font_size: ts.font_size * y_scale,
            width: advance * th * x_scale,
            font_name: font.base_font.clone(),
        });
    }

    let tx = advance * th;
    gs.text_state.text_matrix = multiply_matrices(&translate_matrix(tx, 0.0), &gs.text_state.text_matrix);
}

fn collect_shown(
    ts: &TextState,
    font: &FontInfo<'_>,
    operands: &[Object],
    text: &mut String,
    advance: &mut f32,
) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => {
                let decoded = font
                    .encoding
                    .as_ref()
                    .and_then(|enc| Document::decode_text(enc, bytes).ok())
                    .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned());
                if font.widths.is_empty() {
                    for ch in decoded.chars() {
                        *advance += FALLBACK_GLYPH_WIDTH * ts.font_size + ts.character_spacing;
                        if ch == ' ' {
                            *advance += ts.word_spacing;
                        }
                    }
                } else {
                    for &code in bytes.iter() {
                        *advance += font.glyph_width(code) * ts.font_size + ts.character_spacing;
                        if code == b' ' {
                            *advance += ts.word_spacing;
                        }
                    }
                }
                text.push_str(&decoded);
            }
            Object::Integer(_) | Object::Real(_) => {
                let adjust = operand_as_float(operand);
                *advance -= adjust / 1000.0 * ts.font_size;
                // Large negative kerning is how many producers encode a word gap.
                if adjust < -200.0 && !text.ends_with(' ') && !text.is_empty() {
                    text.push(' ');
                }
            }
            Object::Array(arr) => collect_shown(ts, font, arr, text, advance),
            _ => {}
        }
    }
}

fn matrix_from_operands(op: &Operation) -> [f32; 6] {
    op.operands
        .iter()
        .map(operand_as_float)
        .collect::<Vec<f32>>()
        .try_into()
        .unwrap_or(IDENTITY)
}

fn operand_as_float(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

pub fn multiply_matrices(a: &[f32; 6], b: &[f32; 6]) -> [f32; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub fn translate_matrix(x: f32, y: f32) -> [f32; 6] {
    [1.0, 0.0, 0.0, 1.0, x, y]
}
