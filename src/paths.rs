//! File-chain naming.
//!
//! Downstream tooling relies on these names being exact:
//!
//! ```text
//! article.md ──▶ article.converted.md ──▶ article.cos.md
//!     └─ .assets/article__mmd_0.png
//!                article__mmd_0.hand-drawn.svg   (stylized runs only)
//! ```
//!
//! Derived names are computed from the *base* stem, with any existing
//! `.converted` / `.cos` suffix stripped first, so re-running the pipeline on
//! its own output never produces `article.converted.converted.md`.

use crate::config::{ImageFormat, RenderConfig};
use std::path::{Component, Path, PathBuf};

const CONVERTED_SUFFIX: &str = ".converted";
const COS_SUFFIX: &str = ".cos";

/// File stem of a document (`article` for `docs/article.md`).
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Stem with every trailing chain suffix removed.
fn chain_base(path: &Path) -> String {
    let mut stem = document_stem(path);
    loop {
        if let Some(s) = stem.strip_suffix(CONVERTED_SUFFIX) {
            stem = s.to_string();
        } else if let Some(s) = stem.strip_suffix(COS_SUFFIX) {
            stem = s.to_string();
        } else {
            break;
        }
    }
    stem
}

fn sibling(path: &Path, name: String) -> PathBuf {
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// `name.md` → `name.converted.md`.
pub fn derive_converted_path(path: &Path) -> PathBuf {
    sibling(path, format!("{}{CONVERTED_SUFFIX}.md", chain_base(path)))
}

/// `name.md` or `name.converted.md` → `name.cos.md`.
pub fn derive_cos_path(path: &Path) -> PathBuf {
    sibling(path, format!("{}{COS_SUFFIX}.md", chain_base(path)))
}

/// `{base}__mmd_{index}.{ext}`
pub fn image_file_name(doc_stem: &str, index: usize, format: ImageFormat) -> String {
    format!("{doc_stem}__mmd_{index}.{}", format.extension())
}

/// Debug artifact written before raster finalization: the raster extension
/// replaced with `.hand-drawn.svg`.
pub fn debug_svg_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sibling(image_path, format!("{stem}.hand-drawn.svg"))
}

/// Directory generated images go to for `doc_path`.
pub fn assets_dir(doc_path: &Path, config: &RenderConfig) -> PathBuf {
    match &config.output_dir {
        Some(dir) => dir.clone(),
        None => sibling(doc_path, config.assets_dir_name.clone()),
    }
}

/// Link target for an image as written into the document.
///
/// Relative to `doc_dir` when the image lives beneath it, absolute otherwise.
/// Always uses forward slashes.
pub fn link_target(doc_dir: &Path, image_path: &Path) -> String {
    let rel = image_path.strip_prefix(doc_dir).ok().filter(|r| {
        r.components()
            .all(|c| matches!(c, Component::Normal(_)))
    });
    match rel {
        Some(r) => to_forward_slashes(r),
        None => to_forward_slashes(image_path),
    }
}

fn to_forward_slashes(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}
