//! Reader for the recognition/translation payload.
//!
//! The payload is `{"panels": [{"bubbles": [...], "outside_text": [...]}]}`
//! where every region carries `bbox: [x1, y1, x2, y2]` in native image pixels
//! and its translation under `en`. Anything malformed is skipped, never fatal.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::overlay::{Panel, Region, RegionBox, RegionKind};

const TEXT_KEYS: &[&str] = &["en", "translated_text", "translatedText", "text"];

#[derive(Debug, Clone, Default)]
pub struct PanelDocument {
    pub panels: Vec<Panel>,
    pub image_filename: Option<String>,
    /// Regions dropped because their box was missing or malformed.
    pub skipped: usize,
}

impl PanelDocument {
    pub fn region_count(&self) -> usize {
        self.panels
            .iter()
            .map(|panel| panel.bubbles.len() + panel.outside.len())
            .sum()
    }
}

pub fn parse_panels_str(input: &str) -> Result<PanelDocument> {
    let value: Value =
        serde_json::from_str(input).with_context(|| "failed to parse panels JSON")?;
    Ok(parse_panels(&value))
}

/// Accepts the bare document, the service envelope `{"result": {...}}`, or a
/// top-level array of panels.
pub fn parse_panels(value: &Value) -> PanelDocument {
    let root = value.get("result").filter(|v| v.is_object()).unwrap_or(value);
    let image_filename = root
        .get("image_filename")
        .and_then(Value::as_str)
        .map(|name| name.to_string());
    let panel_values = match root {
        Value::Array(items) => items.as_slice(),
        _ => root
            .get("panels")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    };

    let mut document = PanelDocument {
        image_filename,
        ..PanelDocument::default()
    };
    for (p_idx, panel_value) in panel_values.iter().enumerate() {
        let bubbles = parse_regions(
            panel_value.get("bubbles"),
            RegionKind::Bubble,
            p_idx,
            &mut document.skipped,
        );
        let outside = parse_regions(
            panel_value.get("outside_text"),
            RegionKind::Outside,
            p_idx,
            &mut document.skipped,
        );
        document.panels.push(Panel { bubbles, outside });
    }
    debug!(
        panels = document.panels.len(),
        regions = document.region_count(),
        skipped = document.skipped,
        "panels parsed"
    );
    document
}

fn parse_regions(
    value: Option<&Value>,
    kind: RegionKind,
    panel: usize,
    skipped: &mut usize,
) -> Vec<Region> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut regions = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Some(bbox) = item.get("bbox").and_then(parse_bbox) else {
            debug!(panel, index = idx, kind = kind.as_str(), "skipping region without usable bbox");
            *skipped += 1;
            continue;
        };
        let text = TEXT_KEYS
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        regions.push(Region { kind, bbox, text });
    }
    regions
}

fn parse_bbox(value: &Value) -> Option<RegionBox> {
    let coords = value.as_array()?;
    if coords.len() != 4 {
        return None;
    }
    let mut parsed = [0.0f32; 4];
    for (slot, coord) in parsed.iter_mut().zip(coords) {
        *slot = coord.as_f64()? as f32;
    }
    RegionBox::new(parsed[0], parsed[1], parsed[2], parsed[3])
}
