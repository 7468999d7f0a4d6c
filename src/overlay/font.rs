use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::engine::{FontStyle, TextLayout, TextMeasurer, wrap_text};

/// A loaded font face used for glyph-advance measurement and handed to the
/// SVG renderer so both see the same glyphs.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn parse_face(&self) -> Result<ParsedFace<'_>> {
        let face = Face::parse(&self.data, self.face_index)
            .map_err(|err| anyhow!("failed to parse font face: {}", err))?;
        Ok(ParsedFace {
            face,
            units_per_em: self.units_per_em,
            space_advance: self.space_advance,
        })
    }

    /// Metrics carrying only a family name, for tests that never measure.
    #[cfg(test)]
    pub(crate) fn named(family: &str) -> Self {
        Self {
            data: Arc::new(Vec::new()),
            units_per_em: 1000,
            space_advance: 250,
            family: Some(family.to_string()),
            face_index: 0,
        }
    }
}

/// A face parsed for the duration of one layout, so wrapping measures every
/// candidate line through the same borrow of the font data.
struct ParsedFace<'a> {
    face: Face<'a>,
    units_per_em: u16,
    space_advance: u16,
}

impl TextMeasurer for ParsedFace<'_> {
    fn advance_em(&self, text: &str) -> Result<f32> {
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = self
                .face
                .glyph_index(ch)
                .and_then(|glyph| self.face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        Ok(advance as f32 / self.units_per_em.max(1) as f32)
    }
}

impl TextMeasurer for FontMetrics {
    fn advance_em(&self, text: &str) -> Result<f32> {
        self.parse_face()?.advance_em(text)
    }

    fn layout(
        &self,
        text: &str,
        max_width: f32,
        font_size: f32,
        style: &FontStyle,
    ) -> Result<TextLayout> {
        let face = self.parse_face()?;
        wrap_text(&face, text, max_width, font_size, style)
    }
}

/// Load a font file. For collections the face named `preferred_family` wins,
/// otherwise the first parsable face.
pub fn load_font_metrics(path: &Path, preferred_family: Option<&str>) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, preferred_family)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

#[derive(Debug)]
pub struct ResolvedOverlayFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Explicit font file first, then the requested family, then each fallback.
pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedOverlayFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path, font_family)?;
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedOverlayFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        if let Ok(resolved) = load_font_metrics_from_family(&db, family) {
            return Ok(resolved);
        }
        tracing::warn!("font family not found, trying fallbacks: {}", family);
    }

    for candidate in fallback {
        if let Ok(resolved) = load_font_metrics_from_family(&db, candidate) {
            return Ok(resolved);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

fn metrics_for_face(data: &[u8], index: u32) -> Option<FontMetrics> {
    let face = Face::parse(data, index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(FontMetrics {
        data: Arc::new(data.to_vec()),
        units_per_em,
        space_advance,
        family: extract_family_name(&face),
        face_index: index,
    })
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        let Some(metrics) = metrics_for_face(data, index) else {
            continue;
        };
        if let (Some(preferred), Some(found)) = (preferred_family, metrics.family()) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(metrics);
            }
        }
        if fallback.is_none() {
            fallback = Some(metrics);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
) -> Result<ResolvedOverlayFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        weight: fontdb::Weight::SEMIBOLD,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let metrics = db
        .with_face_data(id, |data, index| metrics_for_face(data, index))
        .flatten()
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedOverlayFont {
        metrics,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
