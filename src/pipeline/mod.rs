//! Pipeline stages for diagram conversion.
//!
//! Each submodule implements exactly one step. Keeping them separate makes
//! each independently testable and lets an engine or raster backend change
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ frontmatter ──▶ extract ──▶ render ──────────────▶ splice
//! (read)    (split)         (blocks)    ├─ local / remote      (replace
//!                                       └─ sketch ─▶ raster      spans)
//! ```
//!
//! 1. [`input`]      : read the document as UTF-8
//! 2. [`frontmatter`]: split off YAML front matter so offsets are body-relative
//! 3. [`extract`]    : find fenced mermaid blocks with exact byte spans
//! 4. [`render`]     : dispatch one block to an engine, optionally stylize
//!    * [`local`] : command-line renderer under timeout and output cap
//!    * [`remote`]: hosted renderer over HTTP ([`encode`] builds the URL)
//!    * [`raster`]: SVG → PNG/JPG with strategy fallback
//! 5. [`splice`]     : descending-offset replacement of spans
//! 6. [`images`]     : local image collection and link rewriting for the
//!    upload stages of [`crate::chain`]

pub mod encode;
pub mod extract;
pub mod frontmatter;
pub mod images;
pub mod input;
pub mod local;
pub mod raster;
pub mod remote;
pub mod render;
pub mod splice;
