//! Raster finalization: (possibly stylized) SVG → PNG/JPG file.
//!
//! Strategies are tried in the configured order and the first success
//! wins. Each failure is logged and the next strategy gets a go.
//!
//! | Strategy | How | Loses |
//! |----------|-----|-------|
//! | [`RasterStrategy::HeadlessBrowser`] | Chromium screenshot of an HTML shell | nothing |
//! | [`RasterStrategy::VectorLibrary`] | `resvg` into a `tiny_skia` pixmap | `foreignObject` HTML labels |
//!
//! ## Why spawn_blocking?
//!
//! `resvg` rendering and JPEG encoding are CPU-bound and can take hundreds
//! of milliseconds on large diagrams. They run on the blocking pool so the
//! runtime's worker threads stay free.

use crate::config::{ImageFormat, RasterStrategy, RenderConfig};
use crate::error::RasterError;
use crate::pipeline::local::find_on_path;
use image::ImageEncoder;
use roxmltree::{Document, ParsingOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 800;
const MAX_EDGE: u32 = 16_384;
const JPEG_QUALITY: u8 = 90;

const BROWSER_CANDIDATES: [&str; 5] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// What the finalizer needs from [`RenderConfig`].
#[derive(Debug, Clone)]
pub struct RasterSettings {
    /// Explicit browser executable; `None` searches `PATH`.
    pub browser_command: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl From<&RenderConfig> for RasterSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            browser_command: config.browser_command.clone(),
            timeout_secs: config.render_timeout_secs,
        }
    }
}

/// Pixel size from the root `viewBox`, rounded and clamped to
/// `[1, 16384]`. 1200×800 when absent or unparseable.
pub fn svg_dimensions(svg: &str) -> (u32, u32) {
    let opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let view_box = Document::parse_with_options(svg, opts).ok().and_then(|doc| {
        let vb = doc.root_element().attribute("viewBox")?;
        let nums: Vec<f64> = vb
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match nums[..] {
            [_, _, w, h] if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 => Some((w, h)),
            _ => None,
        }
    });
    match view_box {
        Some((w, h)) => (clamp_edge(w), clamp_edge(h)),
        None => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    }
}

fn clamp_edge(v: f64) -> u32 {
    (v.round() as u32).clamp(1, MAX_EDGE)
}

/// Rasterise `svg` into `output`, returning the strategy that succeeded.
///
/// Callers should treat [`RasterStrategy::VectorLibrary`] as a degraded
/// result: HTML labels inside `foreignObject` are missing from the image.
pub async fn finalize_raster(
    svg: &str,
    output: &Path,
    format: ImageFormat,
    strategies: &[RasterStrategy],
    settings: &RasterSettings,
) -> Result<RasterStrategy, RasterError> {
    let dims = svg_dimensions(svg);
    debug!("Rasterising {}x{} → {}", dims.0, dims.1, output.display());

    let mut failures = Vec::new();
    for &strategy in strategies {
        let attempt = match strategy {
            RasterStrategy::HeadlessBrowser => {
                render_with_browser(svg, output, format, settings, dims).await
            }
            RasterStrategy::VectorLibrary => render_with_vector_library(svg, output, format, dims).await,
        };
        match attempt {
            Ok(()) => {
                if strategy == RasterStrategy::VectorLibrary {
                    warn!(
                        "Rasterised {} with the vector library; text inside foreignObject labels is not rendered",
                        output.display()
                    );
                } else {
                    info!("Rasterised {} with headless browser", output.display());
                }
                return Ok(strategy);
            }
            Err(e) => {
                warn!("Raster strategy {strategy:?} failed: {e}");
                failures.push(format!("{strategy:?}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        return Err(RasterError::Exhausted("no raster strategies configured".into()));
    }
    Err(RasterError::Exhausted(failures.join("; ")))
}

// ── Headless browser ─────────────────────────────────────────────────────

fn html_shell(svg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><style>\
         body{{margin:0;padding:0;background:white;}} svg{{display:block;}}\
         </style></head><body>{svg}</body></html>\n"
    )
}

fn locate_browser(settings: &RasterSettings) -> Result<PathBuf, RasterError> {
    if let Some(cmd) = &settings.browser_command {
        return Ok(cmd.clone());
    }
    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| find_on_path(name))
        .ok_or_else(|| RasterError::BrowserUnavailable {
            tried: BROWSER_CANDIDATES.join(", "),
        })
}

async fn render_with_browser(
    svg: &str,
    output: &Path,
    format: ImageFormat,
    settings: &RasterSettings,
    (width, height): (u32, u32),
) -> Result<(), RasterError> {
    let browser = locate_browser(settings)?;
    let io = |e: std::io::Error| RasterError::Io(e.to_string());

    let work = tempfile::tempdir().map_err(io)?;
    let html = work.path().join("diagram.html");
    let shot = work.path().join("screenshot.png");
    tokio::fs::write(&html, html_shell(svg)).await.map_err(io)?;
    let url = reqwest::Url::from_file_path(&html)
        .map_err(|_| RasterError::BrowserFailed(format!("cannot form file URL for {}", html.display())))?;

    let status = tokio::process::Command::new(&browser)
        .arg("--headless")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--hide-scrollbars")
        .arg(format!("--window-size={width},{height}"))
        .arg(format!("--screenshot={}", shot.display()))
        .arg(url.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(Duration::from_secs(settings.timeout_secs), status).await {
        Err(_) => {
            return Err(RasterError::Timeout {
                secs: settings.timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(RasterError::BrowserFailed(format!("{}: {e}", browser.display())))
        }
        Ok(Ok(s)) if !s.success() => return Err(RasterError::BrowserFailed(s.to_string())),
        Ok(Ok(_)) => {}
    }

    let png = tokio::fs::read(&shot)
        .await
        .map_err(|e| RasterError::BrowserFailed(format!("no screenshot written: {e}")))?;
    if png.is_empty() {
        return Err(RasterError::BrowserFailed("empty screenshot".into()));
    }

    let bytes = match format {
        ImageFormat::Png => png,
        ImageFormat::Jpg => tokio::task::spawn_blocking(move || png_to_jpeg(&png))
            .await
            .map_err(|e| RasterError::Encode(format!("encode task panicked: {e}")))??,
    };
    tokio::fs::write(output, bytes).await.map_err(io)
}

// ── Vector library ───────────────────────────────────────────────────────

async fn render_with_vector_library(
    svg: &str,
    output: &Path,
    format: ImageFormat,
    dims: (u32, u32),
) -> Result<(), RasterError> {
    let svg = svg.to_string();
    let bytes = tokio::task::spawn_blocking(move || rasterize_blocking(&svg, format, dims))
        .await
        .map_err(|e| RasterError::Encode(format!("raster task panicked: {e}")))??;
    tokio::fs::write(output, bytes)
        .await
        .map_err(|e| RasterError::Io(e.to_string()))
}

/// Render into a white `width`×`height` pixmap, scaled to fit and centred.
fn rasterize_blocking(
    svg: &str,
    format: ImageFormat,
    (width, height): (u32, u32),
) -> Result<Vec<u8>, RasterError> {
    let mut opt = resvg::usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = resvg::usvg::Tree::from_str(svg, &opt).map_err(|e| RasterError::SvgParse(e.to_string()))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or(RasterError::PixmapAlloc { width, height })?;
    pixmap.fill(resvg::tiny_skia::Color::from_rgba8(255, 255, 255, 255));

    let size = tree.size();
    let (tw, th) = (size.width().max(1.0), size.height().max(1.0));
    let scale = (width as f32 / tw).min(height as f32 / th);
    let tx = (width as f32 - tw * scale) / 2.0;
    let ty = (height as f32 - th * scale) / 2.0;
    let transform = resvg::tiny_skia::Transform::from_row(scale, 0.0, 0.0, scale, tx, ty);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    match format {
        ImageFormat::Png => pixmap
            .encode_png()
            .map_err(|e| RasterError::Encode(e.to_string())),
        // The background is opaque, so premultiplied and straight RGBA agree.
        ImageFormat::Jpg => encode_jpeg(&rgba_to_rgb(pixmap.data()), width, height),
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Drop alpha after compositing onto white.
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        for &c in &px[..3] {
            rgb.push(((c as u32 * a + 255 * (255 - a)) / 255) as u8);
        }
    }
    rgb
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RasterError> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .write_image(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(out)
}

/// Transcode PNG bytes to JPEG, flattening transparency onto white.
pub fn png_to_jpeg(png: &[u8]) -> Result<Vec<u8>, RasterError> {
    let img = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .map_err(|e| RasterError::Encode(e.to_string()))?
        .to_rgba8();
    encode_jpeg(&rgba_to_rgb(img.as_raw()), img.width(), img.height())
}
