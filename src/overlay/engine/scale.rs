use tracing::{debug, warn};

/// Tracks the ratio between the native image width and its display width.
///
/// `scale()` is `0.0` until a natural size has been observed; every consumer
/// treats a non-positive scale as "not ready" and skips its work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleSync {
    natural: Option<(u32, u32)>,
    display_width: Option<f32>,
    scale: f32,
    max_pixels: Option<u64>,
}

impl ScaleSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`ScaleSync::new`], but `surface_size` refuses surfaces larger
    /// than `max_pixels`.
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self {
            max_pixels: Some(max_pixels),
            ..Self::default()
        }
    }

    /// Image finished loading. Returns true when the scale changed.
    pub fn observe_natural_size(&mut self, width: u32, height: u32) -> bool {
        self.natural = if width > 0 && height > 0 {
            Some((width, height))
        } else {
            None
        };
        self.recompute()
    }

    /// Host container was resized. Returns true when the scale changed.
    pub fn observe_display_width(&mut self, width: f32) -> bool {
        if !width.is_finite() || width <= 0.0 {
            debug!("ignoring display width {}", width);
            return false;
        }
        self.display_width = Some(width);
        self.recompute()
    }

    /// Forget the current image; the display width is kept.
    pub fn reset(&mut self) {
        self.natural = None;
        self.scale = 0.0;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_ready(&self) -> bool {
        self.scale > 0.0
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.natural
    }

    /// Pixel size of the scaled image, or `None` when not ready or over the
    /// pixel cap.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        let (width, height) = self.natural?;
        if !self.is_ready() {
            return None;
        }
        let w = (width as f32 * self.scale).round() as u32;
        let h = (height as f32 * self.scale).round() as u32;
        if w == 0 || h == 0 {
            return None;
        }
        if let Some(max_pixels) = self.max_pixels {
            if (w as u64) * (h as u64) > max_pixels {
                warn!(width = w, height = h, max_pixels, "scaled surface too large, skipping");
                return None;
            }
        }
        Some((w, h))
    }

    fn recompute(&mut self) -> bool {
        let next = match self.natural {
            Some((width, _)) => self.display_width.unwrap_or(width as f32) / width as f32,
            None => 0.0,
        };
        let changed = next != self.scale;
        self.scale = next;
        if changed {
            debug!(scale = next, "scale updated");
        }
        changed
    }
}
