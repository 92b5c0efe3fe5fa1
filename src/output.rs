//! Result types produced by extraction, conversion and the pipeline.

use crate::error::{BlockError, StageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A fenced diagram block found in the document body.
///
/// Offsets are byte positions into the body text (front matter excluded)
/// and cover the whole fenced construct, fence markers included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramBlock {
    /// Zero-based position among the document's diagram blocks.
    pub index: usize,
    /// Diagram source between the fences, trimmed.
    pub source_code: String,
    /// Label given after `mermaid:` on the opening fence, if any.
    pub alt_text: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl DiagramBlock {
    /// The exact text this block spans in `body`.
    pub fn full_match<'a>(&self, body: &'a str) -> &'a str {
        &body[self.start_offset..self.end_offset]
    }
}

/// One successfully rendered block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub index: usize,
    pub alt_text: Option<String>,
    pub local_path: PathBuf,
}

/// Result of [`crate::convert::convert_diagrams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Rendered images in sequence order. Failed blocks are absent, not padded.
    pub images: Vec<RenderedImage>,
    /// Derived `.converted.md` document, or the original path if nothing was rendered.
    pub document_path: PathBuf,
    /// Number of diagram blocks found.
    pub total_blocks: usize,
    /// Per-block failures, in sequence order.
    pub errors: Vec<BlockError>,
}

impl ConversionOutput {
    /// True when a derived document was written.
    pub fn wrote_document(&self) -> bool {
        !self.images.is_empty()
    }

    /// True when every block rendered.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The four stages of [`crate::chain::run_pipeline`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    ConvertDiagrams,
    CollectImages,
    UploadImages,
    RewriteLinks,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::ConvertDiagrams => "convert-diagrams",
            PipelineStage::CollectImages => "collect-images",
            PipelineStage::UploadImages => "upload-images",
            PipelineStage::RewriteLinks => "rewrite-links",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from one uploaded local file to its remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Canonical local path, as handed to the uploader.
    pub local_path: PathBuf,
    pub url: String,
}

/// State threaded through one pipeline run.
///
/// `original_path` never changes; `current_path` advances each time a stage
/// writes a new derived file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    pub original_path: PathBuf,
    pub current_path: PathBuf,
    pub rendered_images: Vec<RenderedImage>,
    pub block_errors: Vec<BlockError>,
    pub collected_images: Vec<PathBuf>,
    pub upload_results: Vec<UploadResult>,
    pub errors: Vec<StageError>,
}

impl PipelineContext {
    pub fn new(path: PathBuf) -> Self {
        Self {
            original_path: path.clone(),
            current_path: path,
            rendered_images: Vec::new(),
            block_errors: Vec::new(),
            collected_images: Vec::new(),
            upload_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// True if the given stage recorded an error.
    pub fn stage_failed(&self, stage: PipelineStage) -> bool {
        self.errors.iter().any(|e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_match_slices_body() {
        let body = "intro\n```mermaid\ngraph TD\n```\nouter";
        let block = DiagramBlock {
            index: 0,
            source_code: "graph TD".into(),
            alt_text: None,
            start_offset: 6,
            end_offset: 29,
        };
        assert_eq!(block.full_match(body), "```mermaid\ngraph TD\n```");
    }

    #[test]
    fn stage_names_are_kebab_case() {
        assert_eq!(PipelineStage::ConvertDiagrams.to_string(), "convert-diagrams");
        assert_eq!(
            serde_json::to_string(&PipelineStage::RewriteLinks).unwrap(),
            "\"rewrite-links\""
        );
    }

    #[test]
    fn fresh_context_points_at_original() {
        let ctx = PipelineContext::new(PathBuf::from("/docs/a.md"));
        assert_eq!(ctx.current_path, ctx.original_path);
        assert!(!ctx.stage_failed(PipelineStage::UploadImages));
    }
}
