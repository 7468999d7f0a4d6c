use serde::Deserialize;

use crate::overlay::RegionKind;

/// Step in the shared-fit length heuristic: texts longer than
/// `longer_than` characters use `size`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LengthTier {
    pub longer_than: usize,
    pub size: f32,
}

/// Tuning constants for masks and font fitting. Defaults are the values the
/// overlay has always shipped with; they are empirical, not derived.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Ellipse radii multiplier for bubble masks.
    pub bubble_inset: f32,
    /// Fill alpha for outside-text masks.
    pub outside_mask_alpha: f32,
    /// Fixed padding on each side of a bubble, display px.
    pub bubble_padding: f32,
    /// Fraction of an outside box usable for text.
    pub outside_padding_factor: f32,
    /// Below this available width or height no search is attempted.
    pub min_available: f32,
    pub search_min: u32,
    pub search_max: u32,
    /// Absolute floor for any returned size.
    pub min_font_size: f32,
    /// Ceiling applied when a group is unified.
    pub unify_max: f32,
    pub unify_bubbles: bool,
    pub unify_outside: bool,
    pub shared_default_size: f32,
    pub shared_tiers: Vec<LengthTier>,
    pub shrink_factor: f32,
    pub shrink_attempts: u32,
    /// Largest scaled surface, in pixels, the engine will allocate.
    pub max_surface_pixels: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            bubble_inset: 0.94,
            outside_mask_alpha: 0.95,
            bubble_padding: 4.0,
            outside_padding_factor: 0.85,
            min_available: 10.0,
            search_min: 6,
            search_max: 30,
            min_font_size: 5.0,
            unify_max: 22.0,
            unify_bubbles: true,
            unify_outside: false,
            shared_default_size: 16.0,
            shared_tiers: vec![
                LengthTier {
                    longer_than: 50,
                    size: 12.0,
                },
                LengthTier {
                    longer_than: 80,
                    size: 10.0,
                },
                LengthTier {
                    longer_than: 120,
                    size: 8.0,
                },
            ],
            shrink_factor: 0.9,
            shrink_attempts: 10,
            max_surface_pixels: 64_000_000,
        }
    }
}

impl LayoutConfig {
    pub fn max_font_size(&self) -> f32 {
        self.search_max as f32
    }

    pub fn unifies(&self, kind: RegionKind) -> bool {
        match kind {
            RegionKind::Bubble => self.unify_bubbles,
            RegionKind::Outside => self.unify_outside,
        }
    }

    pub fn clamp_size(&self, size: f32) -> f32 {
        size.clamp(self.min_font_size, self.max_font_size().max(self.min_font_size))
    }
}
