mod compose;
mod config;
mod fit;
mod mask;
mod measure;
mod scale;

use tiny_skia::Pixmap;
use tracing::{debug, info};

use crate::overlay::Panel;

pub use compose::{TextBox, compose_text_layer};
pub use config::{LayoutConfig, LengthTier};
pub use fit::{
    FitArea, FitPolicy, FontSizeAssignment, SizeEntry, available_area, fit_independent,
    padding_for, resolve_size, shared_base_size, solve_font_sizes, solve_independent,
    solve_shared,
};
pub use mask::{MaskShape, plan_mask, render_mask};
pub use measure::{FontStyle, HeuristicMeasurer, TextLayout, TextMeasurer};
pub use scale::ScaleSync;
pub(crate) use measure::wrap_text;

/// Everything derived from one (scale, panels, policy) state.
#[derive(Debug, Clone)]
pub struct OverlayFrame {
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub mask: Pixmap,
    pub sizes: FontSizeAssignment,
    pub boxes: Vec<TextBox>,
}

/// Event-driven owner of the layout state for one page image.
///
/// Every event invalidates the memoized frame as a whole; the next call to
/// [`OverlayEngine::frame`] recomputes mask, sizes and boxes together.
pub struct OverlayEngine {
    sync: ScaleSync,
    panels: Vec<Panel>,
    policy: FitPolicy,
    config: LayoutConfig,
    style: FontStyle,
    frame: Option<OverlayFrame>,
}

impl OverlayEngine {
    pub fn new(config: LayoutConfig, style: FontStyle, policy: FitPolicy) -> Self {
        Self {
            sync: ScaleSync::with_max_pixels(config.max_surface_pixels),
            panels: Vec::new(),
            policy,
            config,
            style,
            frame: None,
        }
    }

    /// A new image replaces the old one; its regions go with it.
    pub fn load_image(&mut self, width: u32, height: u32) {
        self.sync.reset();
        self.sync.observe_natural_size(width, height);
        self.panels.clear();
        self.frame = None;
        debug!(width, height, "image loaded");
    }

    pub fn resize_display(&mut self, width: f32) {
        if self.sync.observe_display_width(width) {
            self.frame = None;
        }
    }

    pub fn set_panels(&mut self, panels: Vec<Panel>) {
        self.panels = panels;
        self.frame = None;
    }

    pub fn set_policy(&mut self, policy: FitPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.frame = None;
        }
    }

    pub fn scale(&self) -> f32 {
        self.sync.scale()
    }

    pub fn policy(&self) -> FitPolicy {
        self.policy
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn style(&self) -> &FontStyle {
        &self.style
    }

    /// Current frame, recomputed if any input changed. `None` while the scale
    /// is not ready.
    pub fn frame(&mut self, measurer: &dyn TextMeasurer) -> Option<&OverlayFrame> {
        if self.frame.is_none() {
            self.frame = self.compute(measurer);
        }
        self.frame.as_ref()
    }

    /// Build a frame from the current inputs without touching the memo.
    pub fn compute(&self, measurer: &dyn TextMeasurer) -> Option<OverlayFrame> {
        let scale = self.sync.scale();
        let Some((width, height)) = self.sync.surface_size() else {
            debug!("scale not ready, skipping recompute");
            return None;
        };
        let mask = render_mask(&self.panels, scale, (width, height), &self.config)?;
        let sizes = solve_font_sizes(
            self.policy,
            measurer,
            &self.panels,
            scale,
            &self.style,
            &self.config,
        );
        let boxes = compose_text_layer(
            measurer,
            &self.panels,
            scale,
            &sizes,
            &self.style,
            &self.config,
        );
        info!(
            scale,
            width,
            height,
            regions = sizes.len(),
            policy = ?self.policy,
            "overlay frame computed"
        );
        Some(OverlayFrame {
            scale,
            width,
            height,
            mask,
            sizes,
            boxes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{Region, RegionBox, RegionKey, RegionKind};
    use crate::test_util::CountingMeasurer;

    fn bubble_page() -> Vec<Panel> {
        vec![Panel {
            bubbles: vec![Region::bubble(
                RegionBox::new(0.0, 0.0, 200.0, 100.0).expect("bbox"),
                "Hello there, this is a test bubble",
            )],
            outside: Vec::new(),
        }]
    }

    fn engine() -> OverlayEngine {
        OverlayEngine::new(
            LayoutConfig::default(),
            FontStyle::default(),
            FitPolicy::Independent,
        )
    }

    #[test]
    fn no_frame_before_image_loads() {
        let mut engine = engine();
        engine.set_panels(bubble_page());
        let measurer = CountingMeasurer::new(HeuristicMeasurer);
        assert!(engine.frame(&measurer).is_none());
        assert_eq!(measurer.calls(), 0);
    }

    #[test]
    fn frame_matches_end_to_end_scenario() {
        let mut engine = engine();
        engine.load_image(400, 300);
        engine.resize_display(400.0);
        engine.set_panels(bubble_page());
        let frame = engine.frame(&HeuristicMeasurer).expect("frame");
        assert_eq!(frame.scale, 1.0);
        assert_eq!((frame.width, frame.height), (400, 300));
        assert_eq!(frame.mask.pixel(100, 50).expect("pixel").alpha(), 255);
        let key = RegionKey {
            panel: 0,
            kind: RegionKind::Bubble,
            index: 0,
        };
        let size = frame.sizes.get(&key).expect("size");
        assert!((5.0..=22.0).contains(&size));
        assert_eq!(frame.boxes.len(), 1);
    }

    #[test]
    fn frame_is_memoized_until_an_event() {
        let mut engine = engine();
        engine.load_image(400, 300);
        engine.set_panels(bubble_page());
        let measurer = CountingMeasurer::new(HeuristicMeasurer);
        engine.frame(&measurer).expect("frame");
        let calls = measurer.calls();
        assert!(calls > 0);
        engine.frame(&measurer).expect("frame");
        assert_eq!(measurer.calls(), calls);

        engine.resize_display(200.0);
        let frame = engine.frame(&measurer).expect("frame");
        assert_eq!(frame.scale, 0.5);
        assert_eq!((frame.width, frame.height), (200, 150));
        assert!(measurer.calls() > calls);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut engine = engine();
        engine.load_image(400, 300);
        engine.resize_display(333.0);
        engine.set_panels(bubble_page());
        let first = engine.compute(&HeuristicMeasurer).expect("frame");
        let second = engine.compute(&HeuristicMeasurer).expect("frame");
        assert_eq!(first.sizes, second.sizes);
        assert_eq!(first.boxes, second.boxes);
        assert_eq!(first.mask.data(), second.mask.data());
    }

    #[test]
    fn new_image_drops_regions_and_frame() {
        let mut engine = engine();
        engine.load_image(400, 300);
        engine.set_panels(bubble_page());
        engine.frame(&HeuristicMeasurer).expect("frame");

        engine.load_image(800, 600);
        assert!(engine.panels().is_empty());
        let frame = engine.frame(&HeuristicMeasurer).expect("frame");
        assert!(frame.sizes.is_empty());
        assert!(frame.mask.data().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn oversized_display_yields_no_frame() {
        let mut engine = OverlayEngine::new(
            LayoutConfig {
                max_surface_pixels: 1_000_000,
                ..LayoutConfig::default()
            },
            FontStyle::default(),
            FitPolicy::Independent,
        );
        engine.load_image(400, 300);
        engine.set_panels(bubble_page());
        engine.resize_display(1.0e6);
        let measurer = CountingMeasurer::new(HeuristicMeasurer);
        assert!(engine.frame(&measurer).is_none());
        assert_eq!(measurer.calls(), 0);

        engine.resize_display(800.0);
        let frame = engine.frame(&measurer).expect("frame");
        assert_eq!((frame.width, frame.height), (800, 600));
    }

    #[test]
    fn policy_switch_invalidates_frame() {
        let mut engine = engine();
        engine.load_image(400, 300);
        engine.set_panels(bubble_page());
        let independent = engine.frame(&HeuristicMeasurer).expect("frame").sizes.clone();
        engine.set_policy(FitPolicy::Shared);
        let shared = engine.frame(&HeuristicMeasurer).expect("frame").sizes.clone();
        let key = RegionKey {
            panel: 0,
            kind: RegionKind::Bubble,
            index: 0,
        };
        assert_eq!(shared.get(&key), Some(16.0));
        assert_eq!(independent.len(), shared.len());
    }
}
