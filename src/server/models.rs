use serde::{Deserialize, Serialize};

use crate::overlay::{FitPolicy, SizeEntry};

/// Body of `POST /overlay`, as sent by the capture extension.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct OverlayRequest {
    /// `data:` URL or bare base64 of the captured region.
    pub(crate) screenshot: Option<String>,
    /// Recognition payload: `{"panels": [...]}` or a bare panel array.
    pub(crate) panels: Option<serde_json::Value>,
    pub(crate) display_width: Option<f32>,
    pub(crate) policy: Option<FitPolicy>,
    pub(crate) debug: Option<bool>,
    /// Viewport rectangle the capture came from, echoed back unchanged.
    pub(crate) bbox: Option<AnchorRect>,
    pub(crate) output_mime: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnchorRect {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct OverlayResponse {
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<OverlayResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OverlayResult {
    /// `data:` URL of the composed overlay.
    pub(crate) image: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bbox: Option<AnchorRect>,
    pub(crate) font_sizes: Vec<SizeEntry>,
    pub(crate) skipped_regions: usize,
}
