//! Hand-drawn stylization of rendered diagram SVGs.
//!
//! ```text
//! SVG ──▶ style (cascade) ──▶ group (palette) ──▶ generator ──▶ transform
//! ```
//!
//! 1. [`style`]    : resolve stroke/fill per element from attributes,
//!    inline styles and the embedded stylesheet
//! 2. [`group`]    : structural group keys and per-group colour/texture
//! 3. [`color`]    : HSL parsing, perturbation and palette sampling
//! 4. [`generator`]: the sketch-path generator seam and its `roughr` backend
//! 5. [`transform`]: the in-place rewrite that ties the above together

pub mod color;
pub mod generator;
pub mod group;
pub mod style;
pub mod transform;

pub use generator::{RoughGenerator, SketchGenerator, SketchGroup, SketchPath, SketchShape, SketchStyle};
pub use group::StyleGroup;
pub use transform::{stylize_svg, SketchReport};
