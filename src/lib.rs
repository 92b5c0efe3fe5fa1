//! # mdsketch
//!
//! Render the Mermaid diagrams embedded in a Markdown document to images,
//! optionally restyled to look hand-drawn, and write a derived copy of the
//! document that links to the images instead.
//!
//! ## Why this crate?
//!
//! Markdown renderers that do not understand Mermaid (most publishing
//! platforms, PDF exporters, chat apps) show diagram blocks as raw code.
//! Turning each block into an image once, at publish time, makes the
//! document portable. The original document is never modified; every step
//! writes a new file in a fixed naming chain.
//!
//! ## Pipeline Overview
//!
//! ```text
//! article.md
//!  │
//!  ├─ 1. Extract   fenced ```mermaid blocks with exact byte spans
//!  ├─ 2. Render    local mmdc (SVG/PNG) or a hosted Kroki service (PNG)
//!  ├─ 3. Sketch    optional hand-drawn rewrite of every SVG primitive
//!  ├─ 4. Raster    headless browser, else resvg (spawn_blocking)
//!  ├─ 5. Splice    blocks → image links, written to article.converted.md
//!  └─ 6. Chain     collect / upload / rewrite links → article.cos.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdsketch::{convert_diagrams, HandDrawnOptions, RenderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenderConfig::builder()
//!         .hand_drawn(HandDrawnOptions { enabled: true, ..Default::default() })
//!         .seed(7)
//!         .build()?;
//!     let output = convert_diagrams("article.md", &config).await?;
//!     println!("{}", output.document_path.display());
//!     for failure in &output.errors {
//!         eprintln!("{failure}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdsketch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdsketch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chain;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod sketch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chain::run_pipeline;
pub use config::{
    FillTexture, HandDrawnOptions, ImageFormat, PipelineOptions, RasterStrategy, RenderConfig,
    RenderConfigBuilder, RenderEngine,
};
pub use convert::{convert_diagrams, convert_diagrams_sync};
pub use error::{BlockError, MdSketchError, RasterError, SketchError, StageError};
pub use output::{
    ConversionOutput, DiagramBlock, PipelineContext, PipelineStage, RenderedImage, UploadResult,
};
pub use pipeline::extract::extract_blocks;
pub use pipeline::images::ImageUploader;
pub use pipeline::raster::{finalize_raster, RasterSettings};
pub use pipeline::render::DiagramKind;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sketch::{stylize_svg, RoughGenerator, SketchGenerator, SketchReport, StyleGroup};
