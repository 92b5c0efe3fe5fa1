//! Error types for the mdsketch library.
//!
//! Failures come in three weights:
//!
//! * [`MdSketchError`]: **Fatal**: the document cannot be processed at all
//!   (missing file, unreadable bytes, invalid configuration). Returned as
//!   `Err(MdSketchError)` from the top-level entry points before any
//!   rendering happens.
//!
//! * [`BlockError`]: **Non-fatal, per block**: one diagram failed to render
//!   (engine missing, non-zero exit, timeout, network error). Stored in
//!   [`crate::output::ConversionOutput::errors`]; the other blocks still
//!   render and the derived document is still written.
//!
//! * [`StageError`]: **Non-fatal, per pipeline stage**: recorded in
//!   [`crate::output::PipelineContext::errors`] so dependent stages can be
//!   skipped while independent ones still run.
//!
//! [`SketchError`] and [`RasterError`] are internal to the stylization and
//! raster steps. A sketch error only ever leaves one SVG element unstyled; a
//! raster error is turned into [`BlockError::RasterFailed`] once every
//! strategy has been tried.

use crate::output::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdsketch library.
///
/// Block-level failures use [`BlockError`] and never surface here.
#[derive(Debug, Error)]
pub enum MdSketchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but is not valid UTF-8 text.
    #[error("Document '{path}' is not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a derived document or the assets directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single diagram block.
///
/// Every variant carries the block's zero-based sequence index so callers can
/// line failures up against [`crate::output::DiagramBlock::index`].
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// No usable local renderer command could be started.
    #[error("Block {index}: rendering engine unavailable: {detail}")]
    EngineUnavailable { index: usize, detail: String },

    /// The local renderer exited unsuccessfully or produced no output.
    #[error("Block {index}: rendering engine failed: {detail}")]
    EngineFailed { index: usize, detail: String },

    /// The local renderer ran past the configured wall-clock limit.
    #[error("Block {index}: rendering engine timed out after {secs}s")]
    EngineTimeout { index: usize, secs: u64 },

    /// The local renderer wrote more diagnostic output than allowed.
    #[error("Block {index}: rendering engine output exceeded {limit} bytes")]
    OutputTooLarge { index: usize, limit: usize },

    /// The remote rendering service returned an error or an empty body.
    #[error("Block {index}: remote rendering failed: {detail}")]
    RemoteFailed { index: usize, detail: String },

    /// The SVG could not be parsed for stylization at all.
    #[error("Block {index}: hand-drawn stylization failed: {detail}")]
    StylizeFailed { index: usize, detail: String },

    /// Every raster strategy failed for this block.
    #[error("Block {index}: raster conversion failed: {detail}")]
    RasterFailed { index: usize, detail: String },
}

impl BlockError {
    /// Sequence index of the block that failed.
    pub fn index(&self) -> usize {
        match self {
            BlockError::EngineUnavailable { index, .. }
            | BlockError::EngineFailed { index, .. }
            | BlockError::EngineTimeout { index, .. }
            | BlockError::OutputTooLarge { index, .. }
            | BlockError::RemoteFailed { index, .. }
            | BlockError::StylizeFailed { index, .. }
            | BlockError::RasterFailed { index, .. } => *index,
        }
    }
}

/// A failure recorded against one pipeline stage.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[error("[{stage}] {message}")]
pub struct StageError {
    pub stage: PipelineStage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Why one SVG element was left unstyled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    /// A required geometry attribute is missing or not a number.
    #[error("<{tag}> has invalid geometry: {detail}")]
    InvalidGeometry { tag: String, detail: String },

    /// The sketch generator panicked or refused the options.
    #[error("sketch generator failed for <{tag}>: {detail}")]
    GeneratorFailed { tag: String, detail: String },

    /// The generator returned no usable path data.
    #[error("sketch generator produced no path data for <{tag}>")]
    EmptyPath { tag: String },

    /// The SVG itself could not be parsed; nothing was rewritten.
    #[error("SVG is not well-formed: {0}")]
    InvalidSvg(String),
}

/// Failure of one raster strategy, or of all of them.
#[derive(Debug, Error)]
pub enum RasterError {
    /// No headless browser executable was found.
    #[error("no headless browser found (tried: {tried})")]
    BrowserUnavailable { tried: String },

    /// The browser ran but did not produce a screenshot.
    #[error("headless browser failed: {0}")]
    BrowserFailed(String),

    /// The browser ran past the configured wall-clock limit.
    #[error("headless browser timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The vector library could not parse the SVG.
    #[error("failed to parse SVG: {0}")]
    SvgParse(String),

    /// A pixmap of the requested size could not be allocated.
    #[error("failed to allocate {width}x{height} pixmap")]
    PixmapAlloc { width: u32, height: u32 },

    /// PNG/JPG encoding or transcoding failed.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// Reading or writing an intermediate file failed.
    #[error("raster I/O failed: {0}")]
    Io(String),

    /// The strategy list was empty or every strategy failed.
    #[error("all raster strategies failed: {0}")]
    Exhausted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = MdSketchError::FileNotFound {
            path: PathBuf::from("/tmp/missing.md"),
        };
        assert!(e.to_string().contains("missing.md"));
    }

    #[test]
    fn engine_timeout_display() {
        let e = BlockError::EngineTimeout { index: 2, secs: 30 };
        let msg = e.to_string();
        assert!(msg.contains("Block 2"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
    }

    #[test]
    fn block_error_index() {
        let e = BlockError::RemoteFailed {
            index: 4,
            detail: "HTTP 500".into(),
        };
        assert_eq!(e.index(), 4);
        assert!(e.to_string().contains("HTTP 500"));
    }

    #[test]
    fn block_error_serialises() {
        let e = BlockError::EngineFailed {
            index: 1,
            detail: "exit status 1".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: BlockError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn stage_error_display_carries_stage_name() {
        let e = StageError::new(PipelineStage::UploadImages, "bucket unreachable");
        assert_eq!(e.to_string(), "[upload-images] bucket unreachable");
    }

    #[test]
    fn raster_exhausted_display() {
        let e = RasterError::Exhausted("browser: not found; vector: parse".into());
        assert!(e.to_string().contains("browser: not found"));
    }
}
