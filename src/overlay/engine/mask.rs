use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};
use tracing::debug;

use super::config::LayoutConfig;
use crate::overlay::{Panel, RegionKind, ScaledRect, iter_regions};

/// One occluding shape in display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskShape {
    /// Opaque white ellipse, radii already inset.
    Ellipse { cx: f32, cy: f32, rx: f32, ry: f32 },
    /// Translucent white rectangle over the exact box.
    Rect(ScaledRect),
}

/// Mask geometry for every drawable region, in rendering order.
pub fn plan_mask(panels: &[Panel], scale: f32, config: &LayoutConfig) -> Vec<MaskShape> {
    if !(scale > 0.0) {
        return Vec::new();
    }
    let mut shapes = Vec::new();
    for (key, region) in iter_regions(panels) {
        let rect = region.bbox.scaled(scale);
        if rect.is_degenerate() {
            debug!(region = %key.label(), "skipping degenerate mask box");
            continue;
        }
        let shape = match region.kind {
            RegionKind::Bubble => {
                let (cx, cy) = rect.center();
                MaskShape::Ellipse {
                    cx,
                    cy,
                    rx: rect.w / 2.0 * config.bubble_inset,
                    ry: rect.h / 2.0 * config.bubble_inset,
                }
            }
            RegionKind::Outside => MaskShape::Rect(rect),
        };
        shapes.push(shape);
    }
    shapes
}

/// Paint a fresh mask surface of `size` pixels. Returns `None` when the scale
/// is not ready or the surface would be empty.
pub fn render_mask(
    panels: &[Panel],
    scale: f32,
    size: (u32, u32),
    config: &LayoutConfig,
) -> Option<Pixmap> {
    if !(scale > 0.0) {
        return None;
    }
    let mut pixmap = Pixmap::new(size.0, size.1)?;

    let mut bubble_paint = Paint::default();
    bubble_paint.set_color_rgba8(255, 255, 255, 255);
    bubble_paint.anti_alias = true;

    let mut outside_paint = Paint::default();
    outside_paint.set_color(
        Color::from_rgba(1.0, 1.0, 1.0, config.outside_mask_alpha.clamp(0.0, 1.0))
            .unwrap_or(Color::WHITE),
    );
    outside_paint.anti_alias = true;

    for shape in plan_mask(panels, scale, config) {
        match shape {
            MaskShape::Ellipse { cx, cy, rx, ry } => {
                let Some(path) = Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0)
                    .and_then(PathBuilder::from_oval)
                else {
                    continue;
                };
                pixmap.fill_path(
                    &path,
                    &bubble_paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            MaskShape::Rect(rect) => {
                if let Some(rect) = Rect::from_xywh(rect.x, rect.y, rect.w, rect.h) {
                    pixmap.fill_rect(rect, &outside_paint, Transform::identity(), None);
                }
            }
        }
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{Region, RegionBox};

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> RegionBox {
        RegionBox::new(x1, y1, x2, y2).expect("bbox")
    }

    fn page() -> Vec<Panel> {
        vec![Panel {
            bubbles: vec![Region::bubble(
                bbox(0.0, 0.0, 200.0, 100.0),
                "Hello there, this is a test bubble",
            )],
            outside: vec![Region::outside(bbox(120.0, 150.0, 180.0, 190.0), "BANG")],
        }]
    }

    #[test]
    fn bubble_becomes_inset_ellipse() {
        let shapes = plan_mask(&page(), 1.0, &LayoutConfig::default());
        let MaskShape::Ellipse { cx, cy, rx, ry } = shapes[0] else {
            panic!("expected ellipse, got {:?}", shapes[0]);
        };
        assert_eq!((cx, cy), (100.0, 50.0));
        assert!((rx - 94.0).abs() < 1e-4);
        assert!((ry - 47.0).abs() < 1e-4);
    }

    #[test]
    fn outside_becomes_exact_scaled_rect() {
        let shapes = plan_mask(&page(), 0.5, &LayoutConfig::default());
        assert_eq!(
            shapes[1],
            MaskShape::Rect(ScaledRect {
                x: 60.0,
                y: 75.0,
                w: 30.0,
                h: 20.0
            })
        );
    }

    #[test]
    fn paints_opaque_bubbles_and_translucent_outside() {
        let pixmap = render_mask(&page(), 1.0, (200, 200), &LayoutConfig::default())
            .expect("mask");
        let center = pixmap.pixel(100, 50).expect("pixel");
        assert_eq!(center.alpha(), 255);
        assert_eq!(center.red(), 255);

        // Corners of the bubble box lie outside the ellipse.
        assert_eq!(pixmap.pixel(2, 2).expect("pixel").alpha(), 0);
        assert_eq!(pixmap.pixel(100, 1).expect("pixel").alpha(), 0);
        assert_eq!(pixmap.pixel(100, 6).expect("pixel").alpha(), 255);

        let outside = pixmap.pixel(150, 170).expect("pixel");
        assert!(outside.alpha() > 230 && outside.alpha() < 255);

        assert_eq!(pixmap.pixel(50, 170).expect("pixel").alpha(), 0);
    }

    #[test]
    fn not_ready_scale_paints_nothing() {
        let config = LayoutConfig::default();
        assert!(plan_mask(&page(), 0.0, &config).is_empty());
        assert!(render_mask(&page(), 0.0, (200, 200), &config).is_none());
        assert!(render_mask(&page(), -1.0, (200, 200), &config).is_none());
    }

    #[test]
    fn tiny_scaled_boxes_do_not_panic() {
        let panels = vec![Panel {
            bubbles: vec![Region::bubble(bbox(0.0, 0.0, 1.0, 1.0), "x")],
            outside: vec![Region::outside(bbox(5.0, 5.0, 6.0, 6.0), "y")],
        }];
        let pixmap = render_mask(&panels, 1e-6, (1, 1), &LayoutConfig::default());
        assert!(pixmap.is_some());
    }

    #[test]
    fn repaint_is_identical() {
        let config = LayoutConfig::default();
        let first = render_mask(&page(), 0.75, (150, 150), &config).expect("mask");
        let second = render_mask(&page(), 0.75, (150, 150), &config).expect("mask");
        assert_eq!(first.data(), second.data());
    }
}
