use serde::Serialize;
use tracing::{debug, warn};

use super::config::LayoutConfig;
use super::fit::{FontSizeAssignment, available_area, padding_for};
use super::measure::{FontStyle, TextMeasurer};
use crate::overlay::{Panel, RegionKey, RegionKind, ScaledRect, iter_regions};

/// Fraction of the font size between the top of a line box's glyph area and
/// its baseline.
const ASCENT_RATIO: f32 = 0.8;

/// A positioned text block for one region, display px.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBox {
    pub key: RegionKey,
    pub rect: ScaledRect,
    pub padding_x: f32,
    pub padding_y: f32,
    pub font_size: f32,
    pub line_height: f32,
    pub lines: Vec<String>,
}

impl TextBox {
    pub fn kind(&self) -> RegionKind {
        self.key.kind
    }

    pub fn center_x(&self) -> f32 {
        self.rect.x + self.rect.w / 2.0
    }

    pub fn block_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    /// Baselines of every line, block centered vertically in the box.
    pub fn baselines(&self) -> Vec<f32> {
        let top = self.rect.y + (self.rect.h - self.block_height()) / 2.0;
        let leading = (self.line_height - self.font_size) / 2.0;
        (0..self.lines.len())
            .map(|idx| top + idx as f32 * self.line_height + leading + self.font_size * ASCENT_RATIO)
            .collect()
    }
}

/// Lay out one box per sized region. Regions missing from `sizes` (degenerate
/// boxes, or a not-ready scale) are left out.
pub fn compose_text_layer(
    measurer: &dyn TextMeasurer,
    panels: &[Panel],
    scale: f32,
    sizes: &FontSizeAssignment,
    style: &FontStyle,
    config: &LayoutConfig,
) -> Vec<TextBox> {
    if !(scale > 0.0) {
        return Vec::new();
    }
    let mut boxes = Vec::new();
    for (key, region) in iter_regions(panels) {
        let Some(font_size) = sizes.get(&key) else {
            debug!(region = %key.label(), "no font size assigned");
            continue;
        };
        let rect = region.bbox.scaled(scale);
        let (padding_x, padding_y) = padding_for(region.kind, &rect, config);
        let area = available_area(region.kind, &rect, config);
        let (lines, line_height) =
            match measurer.layout(&region.text, area.width.max(0.0), font_size, style) {
                Ok(layout) => (layout.lines, layout.line_height),
                Err(err) => {
                    warn!(region = %key.label(), "text layout failed, drawing unwrapped: {}", err);
                    let lines = if region.has_text() {
                        vec![region.text.trim().to_string()]
                    } else {
                        Vec::new()
                    };
                    (lines, font_size * style.line_height)
                }
            };
        boxes.push(TextBox {
            key,
            rect,
            padding_x,
            padding_y,
            font_size,
            line_height,
            lines,
        });
    }
    boxes
}
