mod engine;
mod font;
mod render;

pub use engine::{
    FitArea, FitPolicy, FontSizeAssignment, FontStyle, HeuristicMeasurer, LayoutConfig,
    LengthTier, MaskShape, OverlayEngine, OverlayFrame, ScaleSync, SizeEntry, TextBox,
    TextLayout, TextMeasurer, available_area, compose_text_layer, fit_independent, padding_for,
    plan_mask, render_mask, resolve_size, shared_base_size, solve_font_sizes, solve_independent,
    solve_shared,
};
pub use font::{FontMetrics, ResolvedOverlayFont, load_font_metrics, resolve_overlay_font};
pub use render::{encode_image, image_format_from_mime, render_overlay, text_layer_svg};

use serde::Serialize;

/// Shape family of a text region; decides both the mask shape and the padding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Bubble,
    Outside,
}

impl RegionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionKind::Bubble => "bubble",
            RegionKind::Outside => "outside",
        }
    }
}

/// Region box in native image pixels. Always satisfies `x2 > x1` and `y2 > y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl RegionBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        let finite = [x1, y1, x2, y2].iter().all(|value| value.is_finite());
        if !finite || x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn scaled(&self, scale: f32) -> ScaledRect {
        ScaledRect {
            x: self.x1 * scale,
            y: self.y1 * scale,
            w: self.width() * scale,
            h: self.height() * scale,
        }
    }
}

/// Region box in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaledRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ScaledRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0) || !self.x.is_finite() || !self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub kind: RegionKind,
    pub bbox: RegionBox,
    pub text: String,
}

impl Region {
    pub fn bubble(bbox: RegionBox, text: impl Into<String>) -> Self {
        Self {
            kind: RegionKind::Bubble,
            bbox,
            text: text.into(),
        }
    }

    pub fn outside(bbox: RegionBox, text: impl Into<String>) -> Self {
        Self {
            kind: RegionKind::Outside,
            bbox,
            text: text.into(),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// One comic panel in reading order. Bubble and outside-text regions are
/// indexed separately so keys stay stable when one list changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    pub bubbles: Vec<Region>,
    pub outside: Vec<Region>,
}

/// Identity of a region within a page: panel index, kind, index within that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionKey {
    pub panel: usize,
    pub kind: RegionKind,
    pub index: usize,
}

impl RegionKey {
    pub fn label(&self) -> String {
        format!("{}-{}-{}", self.kind.as_str(), self.panel, self.index)
    }
}

/// Every region on the page in rendering order: per panel, bubbles first.
pub fn iter_regions(panels: &[Panel]) -> impl Iterator<Item = (RegionKey, &Region)> {
    panels.iter().enumerate().flat_map(|(panel, p)| {
        let bubbles = p.bubbles.iter().enumerate().map(move |(index, region)| {
            (
                RegionKey {
                    panel,
                    kind: RegionKind::Bubble,
                    index,
                },
                region,
            )
        });
        let outside = p.outside.iter().enumerate().map(move |(index, region)| {
            (
                RegionKey {
                    panel,
                    kind: RegionKind::Outside,
                    index,
                },
                region,
            )
        });
        bubbles.chain(outside)
    })
}

/// Presentation settings for the composed text layer.
#[derive(Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub bubble_outline_color: String,
    pub outside_outline_color: String,
    pub font: FontStyle,
    pub font_metrics: Option<FontMetrics>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            bubble_outline_color: "#00c853".to_string(),
            outside_outline_color: "#ff6d00".to_string(),
            font: FontStyle::default(),
            font_metrics: None,
        }
    }
}
