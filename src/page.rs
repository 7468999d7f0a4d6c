use anyhow::{Context, Result, anyhow};
use image::GenericImageView;
use std::path::Path;
use tracing::{info, warn};

use crate::overlay::{
    self, FitPolicy, FontMetrics, HeuristicMeasurer, OverlayEngine, Panel, SizeEntry,
    TextMeasurer,
};
use crate::settings::Settings;

pub struct PageRequest<'a> {
    pub image_bytes: &'a [u8],
    pub panels: Vec<Panel>,
    /// Display width in px; the native width when absent.
    pub display_width: Option<f32>,
    /// Overrides the policy from settings.
    pub policy: Option<FitPolicy>,
    pub debug: bool,
    pub output_mime: &'a str,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub sizes: Vec<SizeEntry>,
}

#[cfg(target_os = "macos")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Anime Ace", "Comic Neue", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Anime Ace", "Comic Neue", "Comic Sans MS", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["Anime Ace", "Comic Neue", "NotoSans", "sans-serif"]
}

/// Decode the captured page, lay out every region and return the encoded
/// composite.
pub fn render_page(request: PageRequest<'_>, settings: &Settings) -> Result<RenderedPage> {
    if !infer::is_image(request.image_bytes) {
        return Err(anyhow!("input is not a supported image"));
    }
    let image = image::load_from_memory(request.image_bytes)
        .with_context(|| "failed to decode page image")?;
    let (width, height) = image.dimensions();

    let style = settings.overlay_style(resolve_page_font(settings));
    let measurer: &dyn TextMeasurer = match style.font_metrics.as_ref() {
        Some(metrics) => metrics as &dyn TextMeasurer,
        None => &HeuristicMeasurer,
    };

    let policy = request.policy.unwrap_or(settings.policy);
    let mut engine = OverlayEngine::new(settings.layout.clone(), style.font.clone(), policy);
    engine.load_image(width, height);
    if let Some(display_width) = request.display_width {
        engine.resize_display(display_width);
    }
    engine.set_panels(request.panels);
    let frame = engine
        .frame(measurer)
        .ok_or_else(|| {
            anyhow!(
                "no overlay surface for a {}x{} image (not ready or over max_surface_pixels)",
                width,
                height
            )
        })?;

    let composite = overlay::render_overlay(&image, frame, &style, request.debug)?;
    let bytes = overlay::encode_image(&composite, request.output_mime)?;
    info!(
        width = frame.width,
        height = frame.height,
        regions = frame.sizes.len(),
        "page rendered"
    );
    Ok(RenderedPage {
        bytes,
        mime: request.output_mime.to_string(),
        width: frame.width,
        height: frame.height,
        scale: frame.scale,
        sizes: frame.sizes.entries(),
    })
}

fn resolve_page_font(settings: &Settings) -> Option<FontMetrics> {
    let font_path = settings.font_path.as_deref().map(Path::new);
    let font_family = settings.font_family.as_deref();
    match overlay::resolve_overlay_font(font_path, font_family, overlay_fallback_fonts()) {
        Ok(resolved) => Some(resolved.metrics),
        Err(err) => {
            warn!("no overlay font available, estimating text metrics: {:#}", err);
            None
        }
    }
}
