//! Diagram conversion entry points.
//!
//! One pass over one document: extract every mermaid block, render each in
//! sequence order, then replace the rendered blocks' spans with image links
//! and write `name.converted.md`. The original is never written.
//!
//! ## Why sequential?
//!
//! Image names embed the sequence index and the stylization RNG is shared
//! across blocks, so rendering in index order is what makes a seeded run
//! reproducible. Diagram renders are also heavy (a Chromium per block when
//! the local CLI is used), so running them in parallel buys little.

use crate::config::RenderConfig;
use crate::error::MdSketchError;
use crate::output::{ConversionOutput, RenderedImage};
use crate::paths::{assets_dir, derive_converted_path, document_stem, image_file_name, link_target};
use crate::pipeline::extract::extract_blocks;
use crate::pipeline::frontmatter::split_front_matter;
use crate::pipeline::input::load_document;
use crate::pipeline::render::render_block;
use crate::pipeline::splice::{splice, Replacement};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEGRADED_MESSAGE: &str =
    "rasterised without a headless browser; HTML label text inside the diagram is missing";

/// Render every diagram block in `path` and write the derived document.
///
/// # Returns
/// `Ok(ConversionOutput)` even when some blocks failed (see
/// [`ConversionOutput::errors`]). When no block rendered, nothing is written
/// and `document_path` is `path` unchanged.
///
/// # Errors
/// Only fatal conditions: the document is missing, unreadable or not UTF-8,
/// or the assets directory / derived document cannot be written.
pub async fn convert_diagrams(
    path: impl AsRef<Path>,
    config: &RenderConfig,
) -> Result<ConversionOutput, MdSketchError> {
    let started = Instant::now();
    let path = path.as_ref();
    info!("Converting diagrams in {}", path.display());

    // ── Step 1: Read and extract ─────────────────────────────────────────
    let content = load_document(path).await?;
    let (front_matter, body) = split_front_matter(&content);
    let blocks = extract_blocks(body);
    let total = blocks.len();

    if total == 0 {
        info!("No mermaid blocks in {}; nothing to do", path.display());
        return Ok(ConversionOutput {
            images: Vec::new(),
            document_path: path.to_path_buf(),
            total_blocks: 0,
            errors: Vec::new(),
        });
    }
    debug!("Found {total} mermaid blocks");

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    // ── Step 2: Render blocks in order ───────────────────────────────────
    let assets = assets_dir(path, config);
    tokio::fs::create_dir_all(&assets)
        .await
        .map_err(|e| MdSketchError::OutputWriteFailed {
            path: assets.clone(),
            source: e,
        })?;

    let stem = document_stem(path);
    let doc_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut images = Vec::new();
    let mut errors = Vec::new();
    let mut replacements = Vec::new();

    for block in &blocks {
        let index = block.index;
        if let Some(ref cb) = config.progress_callback {
            cb.on_block_start(index, total);
        }

        let image_path = assets.join(image_file_name(&stem, index, config.image_format));
        match render_block(block, &image_path, config, &mut rng).await {
            Ok(rendered) => {
                if rendered.degraded {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_degraded(index, DEGRADED_MESSAGE);
                    }
                }
                info!(
                    "Block {index}: wrote {}{}",
                    rendered.path.display(),
                    if rendered.stylized { " (hand-drawn)" } else { "" }
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_complete(index, total, &rendered.path);
                }

                let alt = block
                    .alt_text
                    .clone()
                    .unwrap_or_else(|| format!("mermaid-{}", index + 1));
                replacements.push(Replacement::new(
                    block.start_offset,
                    block.end_offset,
                    format!("![{alt}]({})\n\n", link_target(doc_dir, &rendered.path)),
                ));
                images.push(RenderedImage {
                    index,
                    alt_text: block.alt_text.clone(),
                    local_path: rendered.path,
                });
            }
            Err(e) => {
                warn!("{e}");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_block_error(index, total, &e.to_string());
                }
                errors.push(e);
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total, images.len());
    }

    if images.is_empty() {
        warn!("No diagram in {} rendered; leaving the document as is", path.display());
        return Ok(ConversionOutput {
            images,
            document_path: path.to_path_buf(),
            total_blocks: total,
            errors,
        });
    }

    // ── Step 3: Write the derived document ───────────────────────────────
    let mut derived = String::with_capacity(content.len());
    derived.push_str(front_matter.unwrap_or_default());
    derived.push_str(&splice(body, replacements));

    let document_path = derive_converted_path(path);
    write_atomic(&document_path, &derived).await?;

    info!(
        "Converted {}/{} diagrams in {}ms → {}",
        images.len(),
        total,
        started.elapsed().as_millis(),
        document_path.display()
    );

    Ok(ConversionOutput {
        images,
        document_path,
        total_blocks: total,
        errors,
    })
}

/// Synchronous wrapper around [`convert_diagrams`].
///
/// Creates a temporary tokio runtime. Do not call from inside an async
/// context; use [`convert_diagrams`] there.
pub fn convert_diagrams_sync(
    path: impl AsRef<Path>,
    config: &RenderConfig,
) -> Result<ConversionOutput, MdSketchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MdSketchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_diagrams(path, config))
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), MdSketchError> {
    let failed = |e| MdSketchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}
