use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod logging;
pub mod overlay;
pub mod page;
pub mod panels;
mod server;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use overlay::{FitPolicy, OverlayEngine, SizeEntry};
pub use page::{PageRequest, RenderedPage, render_page};
pub use server::run_server;

#[derive(Debug, Clone)]
pub struct Config {
    pub image: PathBuf,
    pub panels: PathBuf,
    pub width: Option<f32>,
    pub policy: Option<FitPolicy>,
    pub debug: bool,
    pub output: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub page: RenderedPage,
    /// Set when the image was written to `Config::output`.
    pub written_to: Option<PathBuf>,
    pub skipped_regions: usize,
}

impl RunOutput {
    pub fn sizes_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.page.sizes)
            .with_context(|| "failed to serialize font sizes")
    }
}

pub fn run(config: Config) -> Result<RunOutput> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;

    let image_bytes = fs::read(&config.image)
        .with_context(|| format!("failed to read image: {}", config.image.display()))?;
    let panels_json = fs::read_to_string(&config.panels)
        .with_context(|| format!("failed to read panels: {}", config.panels.display()))?;
    let document = panels::parse_panels_str(&panels_json)
        .with_context(|| format!("failed to parse panels: {}", config.panels.display()))?;
    if document.skipped > 0 {
        info!("skipped {} malformed regions", document.skipped);
    }

    let output_mime = match config.output.as_deref() {
        Some(path) => mime_for_output_path(path)?,
        None => settings.output_mime.clone(),
    };

    let page = render_page(
        PageRequest {
            image_bytes: &image_bytes,
            panels: document.panels,
            display_width: config.width,
            policy: config.policy,
            debug: config.debug,
            output_mime: &output_mime,
        },
        &settings,
    )?;

    if let Some(path) = config.output.as_deref() {
        fs::write(path, &page.bytes)
            .with_context(|| format!("failed to write overlay: {}", path.display()))?;
        info!("overlay written to {}", path.display());
    }

    Ok(RunOutput {
        page,
        written_to: config.output,
        skipped_regions: document.skipped,
    })
}

pub async fn serve(settings_path: Option<&Path>, addr: Option<String>) -> Result<()> {
    let settings = settings::load_settings(settings_path)?;
    let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
    run_server(settings, addr).await
}

fn mime_for_output_path(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => {
            return Err(anyhow!(
                "unsupported output extension for {}",
                path.display()
            ));
        }
    };
    Ok(mime.to_string())
}
