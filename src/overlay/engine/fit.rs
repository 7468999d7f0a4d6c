use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::config::LayoutConfig;
use super::measure::{FontStyle, TextMeasurer};
use crate::overlay::{Panel, RegionKey, RegionKind, ScaledRect, iter_regions};

/// How font sizes are chosen for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Binary search per region, bubbles unified to the tightest fit.
    #[default]
    Independent,
    /// One length-based size for the page, shrunk per region on overflow.
    Shared,
}

/// Space left for text inside a region, display px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitArea {
    pub width: f32,
    pub height: f32,
}

/// Horizontal and vertical padding for a region. The composer pads with the
/// same values the solver fits against.
pub fn padding_for(kind: RegionKind, rect: &ScaledRect, config: &LayoutConfig) -> (f32, f32) {
    match kind {
        RegionKind::Bubble => (config.bubble_padding, config.bubble_padding),
        RegionKind::Outside => {
            let share = (1.0 - config.outside_padding_factor) / 2.0;
            (rect.w * share, rect.h * share)
        }
    }
}

pub fn available_area(kind: RegionKind, rect: &ScaledRect, config: &LayoutConfig) -> FitArea {
    let (pad_x, pad_y) = padding_for(kind, rect, config);
    FitArea {
        width: rect.w - pad_x * 2.0,
        height: rect.h - pad_y * 2.0,
    }
}

/// Largest integer size in `[search_min, search_max]` whose wrapped height fits
/// `area`. Boxes below `min_available` short-circuit to the floor without
/// measuring; when nothing fits the range floor is returned.
pub fn fit_independent(
    measurer: &dyn TextMeasurer,
    text: &str,
    area: FitArea,
    style: &FontStyle,
    config: &LayoutConfig,
) -> Result<f32> {
    if area.width < config.min_available || area.height < config.min_available {
        return Ok(config.min_font_size);
    }
    let mut low = config.search_min as i64;
    let mut high = config.search_max as i64;
    let mut best = config.search_min as f32;
    while low <= high {
        let mid = (low + high) / 2;
        let height = measurer.measure(text, area.width, mid as f32, style)?;
        if height <= area.height {
            best = mid as f32;
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }
    Ok(config.clamp_size(best))
}

/// Shrink `start` by `shrink_factor` while the text overflows `area`, for at
/// most `shrink_attempts` steps and never below the floor.
pub fn resolve_size(
    measurer: &dyn TextMeasurer,
    text: &str,
    area: FitArea,
    start: f32,
    style: &FontStyle,
    config: &LayoutConfig,
) -> f32 {
    let floor = config.min_font_size;
    if area.width < config.min_available || area.height < config.min_available {
        return floor;
    }
    let mut size = config.clamp_size(start);
    for _ in 0..config.shrink_attempts {
        match measurer.measure(text, area.width, size, style) {
            Ok(height) if height <= area.height => break,
            Ok(_) => {}
            Err(err) => {
                warn!("text measurement failed, using floor size: {}", err);
                return floor;
            }
        }
        if size <= floor {
            break;
        }
        size = (size * config.shrink_factor).max(floor);
    }
    size
}

/// Page-wide base size from the longest translated text.
pub fn shared_base_size(panels: &[Panel], config: &LayoutConfig) -> f32 {
    let longest = iter_regions(panels)
        .map(|(_, region)| region.text.chars().count())
        .max()
        .unwrap_or(0);
    let mut tiers = config.shared_tiers.clone();
    tiers.sort_by_key(|tier| tier.longer_than);
    tiers
        .iter()
        .rev()
        .find(|tier| longest > tier.longer_than)
        .map(|tier| tier.size)
        .unwrap_or(config.shared_default_size)
}

/// Resolved font size per region, display px. Recomputed from scratch on
/// every change; never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSizeAssignment {
    sizes: BTreeMap<RegionKey, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeEntry {
    pub panel: usize,
    pub kind: RegionKind,
    pub index: usize,
    pub font_size: f32,
}

impl FontSizeAssignment {
    pub fn get(&self, key: &RegionKey) -> Option<f32> {
        self.sizes.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionKey, &f32)> {
        self.sizes.iter()
    }

    pub fn entries(&self) -> Vec<SizeEntry> {
        self.sizes
            .iter()
            .map(|(key, size)| SizeEntry {
                panel: key.panel,
                kind: key.kind,
                index: key.index,
                font_size: *size,
            })
            .collect()
    }

    fn insert(&mut self, key: RegionKey, size: f32) {
        self.sizes.insert(key, size);
    }
}

pub fn solve_font_sizes(
    policy: FitPolicy,
    measurer: &dyn TextMeasurer,
    panels: &[Panel],
    scale: f32,
    style: &FontStyle,
    config: &LayoutConfig,
) -> FontSizeAssignment {
    match policy {
        FitPolicy::Independent => solve_independent(measurer, panels, scale, style, config),
        FitPolicy::Shared => solve_shared(measurer, panels, scale, style, config),
    }
}

/// Binary-search every region, then unify per kind where configured.
///
/// Regions with empty text are not measured and never lower the unified size:
/// they take the group's size, or the search ceiling when their kind is not
/// unified. An empty bubble does not pull its siblings down to a placeholder
/// size.
pub fn solve_independent(
    measurer: &dyn TextMeasurer,
    panels: &[Panel],
    scale: f32,
    style: &FontStyle,
    config: &LayoutConfig,
) -> FontSizeAssignment {
    let mut assignment = FontSizeAssignment::default();
    if !(scale > 0.0) {
        return assignment;
    }

    let mut fitted: Vec<(RegionKey, Option<f32>)> = Vec::new();
    for (key, region) in iter_regions(panels) {
        let rect = region.bbox.scaled(scale);
        if rect.is_degenerate() {
            debug!(region = %key.label(), "skipping degenerate box");
            continue;
        }
        if !region.has_text() {
            fitted.push((key, None));
            continue;
        }
        let area = available_area(region.kind, &rect, config);
        let size = match fit_independent(measurer, &region.text, area, style, config) {
            Ok(size) => size,
            Err(err) => {
                warn!(region = %key.label(), "text measurement failed, using floor size: {}", err);
                config.min_font_size
            }
        };
        fitted.push((key, Some(size)));
    }

    for kind in [RegionKind::Bubble, RegionKind::Outside] {
        let group = fitted.iter().filter(|(key, _)| key.kind == kind);
        if config.unifies(kind) {
            let tightest = group
                .clone()
                .filter_map(|(_, size)| *size)
                .fold(f32::INFINITY, f32::min);
            let ceiling = config.unify_max.max(config.min_font_size);
            let unified = tightest.clamp(config.min_font_size, ceiling);
            for (key, _) in group {
                assignment.insert(*key, unified);
            }
        } else {
            for (key, size) in group {
                assignment.insert(*key, size.unwrap_or_else(|| config.max_font_size()));
            }
        }
    }
    assignment
}

pub fn solve_shared(
    measurer: &dyn TextMeasurer,
    panels: &[Panel],
    scale: f32,
    style: &FontStyle,
    config: &LayoutConfig,
) -> FontSizeAssignment {
    let mut assignment = FontSizeAssignment::default();
    if !(scale > 0.0) {
        return assignment;
    }
    let start = shared_base_size(panels, config) * scale;
    for (key, region) in iter_regions(panels) {
        let rect = region.bbox.scaled(scale);
        if rect.is_degenerate() {
            debug!(region = %key.label(), "skipping degenerate box");
            continue;
        }
        let area = available_area(region.kind, &rect, config);
        let size = if region.has_text() {
            resolve_size(measurer, &region.text, area, start, style, config)
        } else {
            config.clamp_size(start)
        };
        assignment.insert(key, size);
    }
    assignment
}
