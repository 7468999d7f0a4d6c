use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{FitPolicy, FontMetrics, FontStyle, LayoutConfig, LengthTier, OverlayStyle};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub layout: LayoutConfig,
    pub policy: FitPolicy,
    pub text_color: String,
    pub bubble_outline_color: String,
    pub outside_outline_color: String,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
    pub font_weight: u16,
    pub line_height: f32,
    pub letter_spacing_em: f32,
    pub output_mime: String,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            layout: LayoutConfig::default(),
            policy: FitPolicy::default(),
            text_color: style.text_color,
            bubble_outline_color: style.bubble_outline_color,
            outside_outline_color: style.outside_outline_color,
            font_family: None,
            font_path: None,
            font_weight: style.font.weight,
            line_height: style.font.line_height,
            letter_spacing_em: style.font.letter_spacing_em,
            output_mime: "image/png".to_string(),
            server_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    layout: Option<LayoutSettings>,
    style: Option<StyleSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    policy: Option<FitPolicy>,
    bubble_inset: Option<f32>,
    outside_mask_alpha: Option<f32>,
    bubble_padding: Option<f32>,
    outside_padding_factor: Option<f32>,
    min_available: Option<f32>,
    search_min: Option<u32>,
    search_max: Option<u32>,
    min_font_size: Option<f32>,
    unify_max: Option<f32>,
    unify_bubbles: Option<bool>,
    unify_outside: Option<bool>,
    shared_default_size: Option<f32>,
    shared_tiers: Option<Vec<LengthTier>>,
    shrink_factor: Option<f32>,
    shrink_attempts: Option<u32>,
    max_surface_pixels: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    text_color: Option<String>,
    bubble_outline_color: Option<String>,
    outside_outline_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
    font_weight: Option<u16>,
    line_height: Option<f32>,
    letter_spacing_em: Option<f32>,
    output_mime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn font_style(&self) -> FontStyle {
        FontStyle {
            family: self.font_family.clone(),
            weight: self.font_weight,
            line_height: self.line_height,
            letter_spacing_em: self.letter_spacing_em,
        }
    }

    /// The measured face decides the rendered family, so text is drawn with
    /// the glyphs it was sized with even when the configured family was
    /// replaced by a fallback.
    pub fn overlay_style(&self, font_metrics: Option<FontMetrics>) -> OverlayStyle {
        let mut font = self.font_style();
        if let Some(family) = font_metrics.as_ref().and_then(|metrics| metrics.family()) {
            font.family = Some(family.to_string());
        }
        OverlayStyle {
            text_color: self.text_color.clone(),
            bubble_outline_color: self.bubble_outline_color.clone(),
            outside_outline_color: self.outside_outline_color.clone(),
            font,
            font_metrics,
        }
    }

    fn validate(&self) -> Result<()> {
        let layout = &self.layout;
        if layout.search_min > layout.search_max {
            return Err(anyhow!(
                "layout.search_min ({}) must not exceed layout.search_max ({})",
                layout.search_min,
                layout.search_max
            ));
        }
        if layout.min_font_size > layout.search_max as f32 {
            return Err(anyhow!(
                "layout.min_font_size ({}) must not exceed layout.search_max ({})",
                layout.min_font_size,
                layout.search_max
            ));
        }
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(layout) = incoming.layout {
            self.merge_layout(layout);
        }
        if let Some(style) = incoming.style {
            merge_string(&mut self.text_color, style.text_color);
            merge_string(&mut self.bubble_outline_color, style.bubble_outline_color);
            merge_string(&mut self.outside_outline_color, style.outside_outline_color);
            merge_string(&mut self.output_mime, style.output_mime);
            if let Some(family) = style.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
            if let Some(path) = style.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(weight) = style.font_weight {
                if weight > 0 {
                    self.font_weight = weight;
                }
            }
            merge_positive(&mut self.line_height, style.line_height);
            if let Some(spacing) = style.letter_spacing_em {
                if spacing.is_finite() {
                    self.letter_spacing_em = spacing;
                }
            }
        }
        if let Some(server) = incoming.server {
            merge_string(&mut self.server_addr, server.addr);
        }
    }

    fn merge_layout(&mut self, incoming: LayoutSettings) {
        if let Some(policy) = incoming.policy {
            self.policy = policy;
        }
        let layout = &mut self.layout;
        merge_positive(&mut layout.bubble_inset, incoming.bubble_inset);
        merge_positive(&mut layout.outside_mask_alpha, incoming.outside_mask_alpha);
        merge_non_negative(&mut layout.bubble_padding, incoming.bubble_padding);
        merge_positive(
            &mut layout.outside_padding_factor,
            incoming.outside_padding_factor,
        );
        merge_non_negative(&mut layout.min_available, incoming.min_available);
        if let Some(value) = incoming.search_min.filter(|value| *value > 0) {
            layout.search_min = value;
        }
        if let Some(value) = incoming.search_max.filter(|value| *value > 0) {
            layout.search_max = value;
        }
        merge_positive(&mut layout.min_font_size, incoming.min_font_size);
        merge_positive(&mut layout.unify_max, incoming.unify_max);
        if let Some(value) = incoming.unify_bubbles {
            layout.unify_bubbles = value;
        }
        if let Some(value) = incoming.unify_outside {
            layout.unify_outside = value;
        }
        merge_positive(&mut layout.shared_default_size, incoming.shared_default_size);
        if let Some(tiers) = incoming.shared_tiers {
            layout.shared_tiers = tiers.into_iter().filter(|tier| tier.size > 0.0).collect();
        }
        if let Some(factor) = incoming.shrink_factor {
            if factor > 0.0 && factor < 1.0 {
                layout.shrink_factor = factor;
            }
        }
        if let Some(attempts) = incoming.shrink_attempts {
            layout.shrink_attempts = attempts;
        }
        if let Some(value) = incoming.max_surface_pixels.filter(|value| *value > 0) {
            layout.max_surface_pixels = value;
        }
    }
}

fn merge_string(target: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}

fn merge_positive(target: &mut f32, incoming: Option<f32>) {
    if let Some(value) = incoming {
        if value.is_finite() && value > 0.0 {
            *target = value;
        }
    }
}

fn merge_non_negative(target: &mut f32, incoming: Option<f32>) {
    if let Some(value) = incoming {
        if value.is_finite() && value >= 0.0 {
            *target = value;
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".manga-overlay"))
        }
    })
}
