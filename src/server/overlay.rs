use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::models::{OverlayRequest, OverlayResult};
use super::state::ServerState;
use crate::page::{PageRequest, render_page};
use crate::panels::parse_panels;

pub(crate) fn render_request(state: &ServerState, request: OverlayRequest) -> Result<OverlayResult> {
    let screenshot = request
        .screenshot
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("screenshot is required"))?;
    let image_bytes = decode_data_url(screenshot)?;
    let document = request
        .panels
        .as_ref()
        .map(parse_panels)
        .unwrap_or_default();
    let output_mime = request
        .output_mime
        .unwrap_or_else(|| state.settings.output_mime.clone());

    let page = render_page(
        PageRequest {
            image_bytes: &image_bytes,
            panels: document.panels,
            display_width: request.display_width,
            policy: request.policy,
            debug: request.debug.unwrap_or(false),
            output_mime: &output_mime,
        },
        &state.settings,
    )?;

    Ok(OverlayResult {
        image: format!("data:{};base64,{}", page.mime, BASE64.encode(&page.bytes)),
        width: page.width,
        height: page.height,
        scale: page.scale,
        bbox: request.bbox,
        font_sizes: page.sizes,
        skipped_regions: document.skipped,
    })
}

/// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
pub(crate) fn decode_data_url(value: &str) -> Result<Vec<u8>> {
    let payload = match value.trim().split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => payload,
        Some(_) => return Err(anyhow!("screenshot is not a data URL")),
        None => value.trim(),
    };
    BASE64
        .decode(payload.trim())
        .with_context(|| "failed to decode screenshot base64")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::encode_image;
    use crate::server::models::AnchorRect;
    use crate::settings::Settings;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn state() -> ServerState {
        ServerState {
            settings: Settings::default(),
        }
    }

    fn screenshot(width: u32, height: u32) -> String {
        let page = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let bytes = encode_image(&page, "image/png").expect("png");
        format!("data:image/png;base64,{}", BASE64.encode(bytes))
    }

    #[test]
    fn decodes_data_urls_and_bare_base64() {
        assert_eq!(decode_data_url("data:image/png;base64,aGk=").expect("url"), b"hi");
        assert_eq!(decode_data_url(" aGk= ").expect("bare"), b"hi");
        assert!(decode_data_url("http://x,aGk=").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn renders_overlay_and_echoes_anchor() {
        let anchor = AnchorRect {
            x: 12.0,
            y: 40.0,
            width: 60.0,
            height: 30.0,
        };
        let request = OverlayRequest {
            screenshot: Some(screenshot(120, 60)),
            panels: Some(json!({
                "panels": [{
                    "bubbles": [{"bbox": [0, 0, 60, 60], "en": ""}, {"en": "no box"}],
                    "outside_text": [{"bbox": [80, 10, 110, 30], "en": ""}]
                }]
            })),
            display_width: Some(60.0),
            bbox: Some(anchor),
            ..OverlayRequest::default()
        };
        let result = render_request(&state(), request).expect("result");
        assert!(result.image.starts_with("data:image/png;base64,"));
        assert_eq!((result.width, result.height), (60, 30));
        assert_eq!(result.scale, 0.5);
        assert_eq!(result.bbox, Some(anchor));
        assert_eq!(result.font_sizes.len(), 2);
        assert_eq!(result.skipped_regions, 1);
    }

    #[test]
    fn huge_display_width_is_rejected() {
        let request = OverlayRequest {
            screenshot: Some(screenshot(64, 64)),
            panels: Some(json!({"panels": []})),
            display_width: Some(1.0e6),
            ..OverlayRequest::default()
        };
        let err = render_request(&state(), request).expect_err("must fail");
        assert!(err.to_string().contains("max_surface_pixels"));
    }

    #[test]
    fn missing_screenshot_is_an_error() {
        let err = render_request(&state(), OverlayRequest::default()).expect_err("must fail");
        assert!(err.to_string().contains("screenshot is required"));
    }
}
