//! Render dispatcher: one diagram block → one image file.
//!
//! ## Two paths
//!
//! ```text
//! plain:    source ──▶ engine (png) ──────────────────────────────▶ image
//! sketched: source ──▶ local (svg) ──▶ stylize_svg ──▶ finalize_raster ──▶ image
//!                                           └──▶ {image}.hand-drawn.svg
//! ```
//!
//! The sketched path is taken only when stylization is enabled, the local
//! engine is in use (the remote service is raster-only) and the diagram
//! kind supports it. Gantt and pie charts always take the plain path: their
//! value is precise quantitative layout, and a wobbly bar is a wrong bar.

use crate::config::{ImageFormat, RasterStrategy, RenderConfig, RenderEngine};
use crate::error::BlockError;
use crate::output::DiagramBlock;
use crate::paths::debug_svg_path;
use crate::pipeline::local::{render_local, LocalFormat};
use crate::pipeline::raster::{finalize_raster, png_to_jpeg, RasterSettings};
use crate::pipeline::remote::render_remote;
use crate::sketch::{stylize_svg, RoughGenerator};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Diagram type, read from the first non-blank line of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    /// Schedule chart.
    Gantt,
    /// Proportion chart.
    Pie,
    Flowchart,
    Sequence,
    Class,
    State,
    Other,
}

impl DiagramKind {
    pub fn detect(source: &str) -> Self {
        let first = source
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_ascii_lowercase();
        const PREFIXES: [(&str, DiagramKind); 7] = [
            ("gantt", DiagramKind::Gantt),
            ("pie", DiagramKind::Pie),
            ("graph", DiagramKind::Flowchart),
            ("flowchart", DiagramKind::Flowchart),
            ("sequencediagram", DiagramKind::Sequence),
            ("classdiagram", DiagramKind::Class),
            ("statediagram", DiagramKind::State),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| first.starts_with(prefix))
            .map_or(DiagramKind::Other, |(_, kind)| *kind)
    }

    /// Whether the hand-drawn transform may be applied.
    pub fn supports_sketch(self) -> bool {
        !matches!(self, DiagramKind::Gantt | DiagramKind::Pie)
    }
}

/// A block that rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRender {
    pub path: PathBuf,
    /// Went through the hand-drawn transform.
    pub stylized: bool,
    /// Rasterised by the vector library, so `foreignObject` text is missing.
    pub degraded: bool,
}

/// Render one block to `image_path`.
pub async fn render_block<R: Rng + ?Sized>(
    block: &DiagramBlock,
    image_path: &Path,
    config: &RenderConfig,
    rng: &mut R,
) -> Result<BlockRender, BlockError> {
    let index = block.index;
    let kind = DiagramKind::detect(&block.source_code);

    if config.hand_drawn.enabled && config.engine == RenderEngine::Remote {
        warn!("Block {index}: remote engine is raster-only; rendering without hand-drawn style");
    }

    if config.wants_sketch() {
        if kind.supports_sketch() {
            return render_sketched(block, image_path, config, rng).await;
        }
        debug!("Block {index}: {kind:?} diagrams are never stylized");
    }

    render_plain(&block.source_code, image_path, config, index).await?;
    Ok(BlockRender {
        path: image_path.to_path_buf(),
        stylized: false,
        degraded: false,
    })
}

async fn render_plain(
    source: &str,
    image_path: &Path,
    config: &RenderConfig,
    index: usize,
) -> Result<(), BlockError> {
    // Both engines produce PNG; JPG goes through a temp PNG.
    let work;
    let png_path = match config.image_format {
        ImageFormat::Png => image_path.to_path_buf(),
        ImageFormat::Jpg => {
            work = tempfile::tempdir().map_err(|e| BlockError::EngineFailed {
                index,
                detail: format!("temp dir: {e}"),
            })?;
            work.path().join("render.png")
        }
    };

    match config.engine {
        RenderEngine::Local => render_local(source, &png_path, LocalFormat::Png, config, index).await?,
        RenderEngine::Remote => render_remote(source, &png_path, config, index).await?,
    }

    if config.image_format == ImageFormat::Jpg {
        transcode_to_jpeg(&png_path, image_path, index).await?;
    }
    Ok(())
}

async fn transcode_to_jpeg(png_path: &Path, out: &Path, index: usize) -> Result<(), BlockError> {
    let failed = |detail: String| BlockError::RasterFailed { index, detail };
    let png = tokio::fs::read(png_path)
        .await
        .map_err(|e| failed(e.to_string()))?;
    let jpeg = tokio::task::spawn_blocking(move || png_to_jpeg(&png))
        .await
        .map_err(|e| failed(format!("transcode task panicked: {e}")))?
        .map_err(|e| failed(e.to_string()))?;
    tokio::fs::write(out, jpeg)
        .await
        .map_err(|e| failed(e.to_string()))
}

async fn render_sketched<R: Rng + ?Sized>(
    block: &DiagramBlock,
    image_path: &Path,
    config: &RenderConfig,
    rng: &mut R,
) -> Result<BlockRender, BlockError> {
    let index = block.index;
    let work = tempfile::tempdir().map_err(|e| BlockError::EngineFailed {
        index,
        detail: format!("temp dir: {e}"),
    })?;
    let svg_path = work.path().join("render.svg");
    render_local(&block.source_code, &svg_path, LocalFormat::Svg, config, index).await?;

    let svg = tokio::fs::read_to_string(&svg_path)
        .await
        .map_err(|e| BlockError::EngineFailed {
            index,
            detail: format!("reading SVG output: {e}"),
        })?;

    let report = stylize_svg(&svg, &config.hand_drawn, rng, &RoughGenerator).map_err(|e| {
        BlockError::StylizeFailed {
            index,
            detail: e.to_string(),
        }
    })?;
    info!(
        "Block {index}: sketched {} elements in {} groups ({} left as-is)",
        report.rewritten,
        report.groups.len(),
        report.skipped
    );

    let debug_path = debug_svg_path(image_path);
    if let Err(e) = tokio::fs::write(&debug_path, &report.svg).await {
        warn!("Block {index}: could not write {}: {e}", debug_path.display());
    }

    let used = finalize_raster(
        &report.svg,
        image_path,
        config.image_format,
        &config.raster_strategies,
        &RasterSettings::from(config),
    )
    .await
    .map_err(|e| BlockError::RasterFailed {
        index,
        detail: e.to_string(),
    })?;

    Ok(BlockRender {
        path: image_path.to_path_buf(),
        stylized: true,
        degraded: used == RasterStrategy::VectorLibrary,
    })
}
