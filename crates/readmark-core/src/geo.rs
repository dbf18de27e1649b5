use serde::{Deserialize, Serialize};

/// Scale at which legacy absolute-pixel highlight rectangles were recorded.
pub const LEGACY_RENDER_SCALE: f32 = 1.5;

/// US Letter, used when a page carries no usable `/MediaBox`.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Axis-aligned rectangle (x0, y0) top-left to (x1, y1) bottom-right in
/// viewport space, or bottom-left to top-right in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Keep the vertical extent, narrow the horizontal one to the
    /// `[start, end)` fraction of the current width.
    pub fn horizontal_slice(&self, start: f32, end: f32) -> Rect {
        let w = self.width();
        Rect {
            x0: self.x0 + w * start,
            y0: self.y0,
            x1: self.x0 + w * end,
            y1: self.y1,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Mapping from page space (PDF units, y up) to viewport space (y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageViewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub transform: [f32; 6],
}

impl PageViewport {
    pub fn from_media_box(media_box: [f32; 4], scale: f32) -> Self {
        let [x0, y0, x1, y1] = media_box;
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (bottom, top) = (y0.min(y1), y0.max(y1));
        PageViewport {
            width: (right - left) * scale,
            height: (top - bottom) * scale,
            scale,
            transform: [scale, 0.0, 0.0, -scale, -left * scale, top * scale],
        }
    }

    pub fn convert_to_viewport_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.transform;
        (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
    }

    /// Page height in page units.
    pub fn page_height(&self) -> f32 {
        self.height / self.scale
    }

    pub fn page_width(&self) -> f32 {
        self.width / self.scale
    }

    /// Vertical position of a page-space y as a fraction of the page height,
    /// 0 at the top edge.
    pub fn top_ratio(&self, y: f32) -> f32 {
        if self.height <= 0.0 {
            return 0.0;
        }
        let (_, vy) = self.convert_to_viewport_point(0.0, y);
        (vy / self.height).clamp(0.0, 1.0)
    }

    /// Convert a page-space box (y up) into a viewport rectangle (y down).
    pub fn page_rect_to_viewport(&self, rect: &Rect) -> Rect {
        let (ax, ay) = self.convert_to_viewport_point(rect.x0, rect.y0);
        let (bx, by) = self.convert_to_viewport_point(rect.x1, rect.y1);
        Rect {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }
}

impl Default for PageViewport {
    fn default() -> Self {
        PageViewport::from_media_box(DEFAULT_MEDIA_BOX, 1.0)
    }
}

/// Highlight rectangle as page fractions, independent of zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRect {
    pub page_index: usize,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl HighlightRect {
    /// Express a viewport rectangle as page fractions. The rectangle is
    /// clipped to the page first; a box lying entirely off the page comes
    /// out degenerate.
    pub fn from_viewport_rect(page_index: usize, rect: &Rect, viewport: &PageViewport) -> Self {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return HighlightRect {
                page_index,
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 0.0,
            };
        }
        let clipped = Rect::new(
            rect.x0.clamp(0.0, viewport.width),
            rect.y0.clamp(0.0, viewport.height),
            rect.x1.clamp(0.0, viewport.width),
            rect.y1.clamp(0.0, viewport.height),
        );
        HighlightRect {
            page_index,
            x: clipped.x0 / viewport.width,
            y: clipped.y0 / viewport.height,
            w: clipped.width().max(0.0) / viewport.width,
            h: clipped.height().max(0.0) / viewport.height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }
}

/// Absolute-pixel rectangle recorded at [`LEGACY_RENDER_SCALE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRect {
    #[serde(default)]
    pub page_index: usize,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Either rectangle convention as it arrives from persisted state. The two
/// forms are told apart by their field names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RectShape {
    Relative(HighlightRect),
    Legacy(LegacyRect),
}

impl RectShape {
    pub fn page_index(&self) -> usize {
        match self {
            RectShape::Relative(r) => r.page_index,
            RectShape::Legacy(r) => r.page_index,
        }
    }

    /// Normalise to page fractions. `page_width`/`page_height` are in page
    /// units and are only consulted for the legacy form.
    pub fn to_canonical(&self, page_width: f32, page_height: f32) -> HighlightRect {
        match *self {
            RectShape::Relative(r) => r,
            RectShape::Legacy(r) => {
                let pw = page_width * LEGACY_RENDER_SCALE;
                let ph = page_height * LEGACY_RENDER_SCALE;
                if pw <= 0.0 || ph <= 0.0 {
                    return HighlightRect {
                        page_index: r.page_index,
                        x: 0.0,
                        y: 0.0,
                        w: 0.0,
                        h: 0.0,
                    };
                }
                HighlightRect {
                    page_index: r.page_index,
                    x: r.left / pw,
                    y: r.top / ph,
                    w: r.width / pw,
                    h: r.height / ph,
                }
            }
        }
    }
}

impl From<HighlightRect> for RectShape {
    fn from(rect: HighlightRect) -> Self {
        RectShape::Relative(rect)
    }
}
