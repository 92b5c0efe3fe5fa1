//! Procedural sketch-path generation.
//!
//! [`SketchGenerator`] is the seam between the SVG rewrite and whatever
//! produces the wobbly geometry. [`RoughGenerator`] drives `roughr` (a
//! Rust port of Rough.js) for both outlines and fill textures.
//!
//! The generator returns a [`SketchGroup`]: a wrapper with zero or more
//! child paths plus optional path data of its own. The transform takes the
//! first child with data, else the wrapper's own data, else skips the
//! element. Pattern fills (hachure, cross-hatch, zigzag, dots) are open
//! strokes and travel separately in [`SketchGroup::fill_strokes`] so they
//! can be drawn in the fill colour.

use crate::config::FillTexture;
use crate::error::SketchError;
use roughr::core::{FillStyle, Op, OpType, Options, OptionsBuilder};
use std::fmt::Write as _;

/// Points sampled round an ellipse for its fill polygon.
const ELLIPSE_SAMPLES: usize = 36;

/// Geometry of one drawable element, in absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum SketchShape {
    Path { d: String },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Circle { cx: f64, cy: f64, r: f64 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Polygon { points: Vec<(f64, f64)> },
    Polyline { points: Vec<(f64, f64)> },
}

impl SketchShape {
    pub fn tag(&self) -> &'static str {
        match self {
            SketchShape::Path { .. } => "path",
            SketchShape::Rect { .. } => "rect",
            SketchShape::Circle { .. } => "circle",
            SketchShape::Ellipse { .. } => "ellipse",
            SketchShape::Line { .. } => "line",
            SketchShape::Polygon { .. } => "polygon",
            SketchShape::Polyline { .. } => "polyline",
        }
    }

    /// Lines and polylines have no interior and are never filled.
    pub fn is_open(&self) -> bool {
        matches!(self, SketchShape::Line { .. } | SketchShape::Polyline { .. })
    }
}

/// Per-element sketch parameters.
///
/// Colour is not part of the style: a solid fill is merged into the outline
/// path and painted by the caller's `fill`, while pattern strokes come back
/// on their own and the caller strokes them with the fill colour.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchStyle {
    pub roughness: f32,
    pub stroke_width: f64,
    /// Draw a fill layer with `texture`.
    pub filled: bool,
    pub texture: FillTexture,
    /// Non-zero seed; zero makes `roughr` fall back to thread randomness.
    pub seed: u64,
}

/// One generated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchPath {
    pub d: String,
}

/// Generator output: child paths plus the wrapper's own data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SketchGroup {
    pub paths: Vec<SketchPath>,
    pub d: Option<String>,
    /// Pattern-fill strokes, kept apart from the outline.
    pub fill_strokes: Option<String>,
}

impl SketchGroup {
    /// First child with path data, else the wrapper's own data.
    pub fn primary_path(&self) -> Option<&str> {
        self.paths
            .iter()
            .map(|p| p.d.trim())
            .find(|d| !d.is_empty())
            .or_else(|| self.d.as_deref().map(str::trim).filter(|d| !d.is_empty()))
    }
}

/// Turns precise geometry into sketched path data.
pub trait SketchGenerator: Send + Sync {
    fn generate(&self, shape: &SketchShape, style: &SketchStyle) -> Result<SketchGroup, SketchError>;
}

/// `roughr`-backed generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoughGenerator;

impl SketchGenerator for RoughGenerator {
    fn generate(&self, shape: &SketchShape, style: &SketchStyle) -> Result<SketchGroup, SketchError> {
        let mut opts: Options = OptionsBuilder::default()
            .seed(style.seed)
            .roughness(style.roughness)
            .stroke_width(style.stroke_width as f32)
            .fill_style(FillStyle::Hachure)
            .disable_multi_stroke(false)
            .build()
            .map_err(|e| SketchError::GeneratorFailed {
                tag: shape.tag().to_string(),
                detail: e.to_string(),
            })?;

        let outline = outline_ops(shape, &mut opts);

        let mut d = String::new();
        let mut fill_strokes = None;
        if style.filled && !shape.is_open() {
            let polys = fill_polygons(shape, style.roughness);
            let mut fill_opts = opts.clone();
            fill_opts.disable_multi_stroke = Some(true);
            fill_opts.disable_multi_stroke_fill = Some(true);
            let fill = fill_ops(&polys, style.texture, &mut fill_opts);
            if style.texture == FillTexture::Solid {
                push_ops(&mut d, &fill);
            } else if !fill.is_empty() {
                let mut strokes = String::new();
                push_ops(&mut strokes, &fill);
                fill_strokes = Some(strokes.trim_end().to_string());
            }
        }
        push_ops(&mut d, &outline);

        Ok(SketchGroup {
            paths: vec![SketchPath {
                d: d.trim_end().to_string(),
            }],
            d: None,
            fill_strokes,
        })
    }
}

// ── Outline ──────────────────────────────────────────────────────────────

fn outline_ops(shape: &SketchShape, o: &mut Options) -> Vec<Op<f64>> {
    match shape {
        SketchShape::Path { d } => roughr::renderer::svg_path::<f64>(d.clone(), o).ops,
        SketchShape::Rect {
            x,
            y,
            width,
            height,
        } => roughr::renderer::rectangle::<f64>(*x, *y, *width, *height, o).ops,
        SketchShape::Circle { cx, cy, r } => {
            roughr::renderer::ellipse::<f64>(*cx, *cy, r * 2.0, r * 2.0, o).ops
        }
        SketchShape::Ellipse { cx, cy, rx, ry } => {
            roughr::renderer::ellipse::<f64>(*cx, *cy, rx * 2.0, ry * 2.0, o).ops
        }
        SketchShape::Line { x1, y1, x2, y2 } => {
            roughr::renderer::line::<f64>(*x1, *y1, *x2, *y2, o).ops
        }
        SketchShape::Polygon { points } => {
            let pts: Vec<_> = points
                .iter()
                .map(|&(x, y)| roughr::Point2D::new(x, y))
                .collect();
            roughr::renderer::polygon::<f64>(&pts, o).ops
        }
        SketchShape::Polyline { points } => points
            .windows(2)
            .flat_map(|w| roughr::renderer::line::<f64>(w[0].0, w[0].1, w[1].0, w[1].1, o).ops)
            .collect(),
    }
}

// ── Fill ─────────────────────────────────────────────────────────────────

type Polygon = Vec<(f64, f64)>;

/// Closed outlines that bound the fill area.
fn fill_polygons(shape: &SketchShape, roughness: f32) -> Vec<Polygon> {
    match shape {
        SketchShape::Path { d } => {
            let distance = (1.0 + roughness as f64) / 2.0;
            roughr::points_on_path::points_on_path::<f64>(d.clone(), Some(1.0), Some(distance))
                .into_iter()
                .map(|set| set.into_iter().map(|p| (p.x, p.y)).collect())
                .collect()
        }
        SketchShape::Rect {
            x,
            y,
            width,
            height,
        } => vec![vec![
            (*x, *y),
            (x + width, *y),
            (x + width, y + height),
            (*x, y + height),
        ]],
        SketchShape::Circle { cx, cy, r } => vec![ellipse_polygon(*cx, *cy, *r, *r)],
        SketchShape::Ellipse { cx, cy, rx, ry } => vec![ellipse_polygon(*cx, *cy, *rx, *ry)],
        SketchShape::Polygon { points } => vec![points.clone()],
        SketchShape::Line { .. } | SketchShape::Polyline { .. } => Vec::new(),
    }
}

fn ellipse_polygon(cx: f64, cy: f64, rx: f64, ry: f64) -> Polygon {
    (0..ELLIPSE_SAMPLES)
        .map(|i| {
            let t = i as f64 / ELLIPSE_SAMPLES as f64 * std::f64::consts::TAU;
            (cx + rx * t.cos(), cy + ry * t.sin())
        })
        .collect()
}

fn fill_style(texture: FillTexture) -> FillStyle {
    match texture {
        FillTexture::Solid => FillStyle::Solid,
        FillTexture::Hachure => FillStyle::Hachure,
        FillTexture::CrossHatch => FillStyle::CrossHatch,
        FillTexture::ZigZag => FillStyle::ZigZag,
        FillTexture::Dots => FillStyle::Dots,
    }
}

/// Fill ops for `polys`. Solid fills are one closed area; every other
/// texture comes from the matching `roughr` filler as open strokes.
fn fill_ops(polys: &[Polygon], texture: FillTexture, o: &mut Options) -> Vec<Op<f64>> {
    let sets: Vec<Vec<_>> = polys
        .iter()
        .filter(|p| p.len() >= 3)
        .map(|p| p.iter().map(|&(x, y)| roughr::Point2D::new(x, y)).collect())
        .collect();
    if sets.is_empty() {
        return Vec::new();
    }
    o.fill_style = Some(fill_style(texture));
    match texture {
        FillTexture::Solid => roughr::renderer::solid_fill_polygon(&sets, o).ops,
        _ => roughr::renderer::pattern_fill_polygons::<f64, _>(sets, o).ops,
    }
}

// ── Path data ────────────────────────────────────────────────────────────

fn push_ops(out: &mut String, ops: &[Op<f64>]) {
    for op in ops {
        match op.op {
            OpType::Move => {
                let _ = write!(out, "M{} {} ", op.data[0], op.data[1]);
            }
            OpType::BCurveTo => {
                let _ = write!(
                    out,
                    "C{} {}, {} {}, {} {} ",
                    op.data[0], op.data[1], op.data[2], op.data[3], op.data[4], op.data[5]
                );
            }
            OpType::LineTo => {
                let _ = write!(out, "L{} {} ", op.data[0], op.data[1]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(filled: bool, texture: FillTexture) -> SketchStyle {
        SketchStyle {
            roughness: 1.5,
            stroke_width: 3.0,
            filled,
            texture,
            seed: 42,
        }
    }

    fn d_of(group: &SketchGroup) -> String {
        group.primary_path().unwrap().to_string()
    }

    #[test]
    fn primary_path_prefers_first_child_with_data() {
        let g = SketchGroup {
            paths: vec![
                SketchPath { d: "  ".into() },
                SketchPath { d: "M1 1".into() },
            ],
            d: Some("M9 9".into()),
            ..Default::default()
        };
        assert_eq!(g.primary_path(), Some("M1 1"));

        let wrapper_only = SketchGroup {
            paths: vec![],
            d: Some("M9 9".into()),
            ..Default::default()
        };
        assert_eq!(wrapper_only.primary_path(), Some("M9 9"));
        assert_eq!(SketchGroup::default().primary_path(), None);
    }

    #[test]
    fn rect_outline_is_path_data() {
        let shape = SketchShape::Rect {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 40.0,
        };
        let g = RoughGenerator.generate(&shape, &style(false, FillTexture::Hachure)).unwrap();
        let d = d_of(&g);
        assert!(d.starts_with('M'), "{d}");
        assert!(d.contains('C') || d.contains('L'), "{d}");
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let shape = SketchShape::Circle {
            cx: 50.0,
            cy: 50.0,
            r: 20.0,
        };
        let s = style(true, FillTexture::CrossHatch);
        let a = RoughGenerator.generate(&shape, &s).unwrap();
        let b = RoughGenerator.generate(&shape, &s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pattern_fills_come_back_as_separate_strokes() {
        let shape = SketchShape::Polygon {
            points: vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
        };
        let plain = RoughGenerator.generate(&shape, &style(false, FillTexture::Hachure)).unwrap();
        assert_eq!(plain.fill_strokes, None);

        for texture in [
            FillTexture::Hachure,
            FillTexture::CrossHatch,
            FillTexture::ZigZag,
            FillTexture::Dots,
        ] {
            let g = RoughGenerator.generate(&shape, &style(true, texture)).unwrap();
            let strokes = g.fill_strokes.as_deref().unwrap_or_default();
            assert!(strokes.starts_with('M'), "{texture:?}: {strokes}");
            assert!(strokes.matches('M').count() > 1, "{texture:?}");
            // The outline is the same shape with or without a pattern.
            assert_eq!(d_of(&g).matches('M').count(), d_of(&plain).matches('M').count());
        }
    }

    #[test]
    fn cross_hatch_draws_more_than_hachure() {
        let shape = SketchShape::Rect {
            x: 0.0,
            y: 0.0,
            width: 120.0,
            height: 80.0,
        };
        let count = |texture| {
            let g = RoughGenerator.generate(&shape, &style(true, texture)).unwrap();
            g.fill_strokes.unwrap_or_default().matches('M').count()
        };
        assert!(count(FillTexture::CrossHatch) > count(FillTexture::Hachure));
    }

    #[test]
    fn solid_fill_is_merged_into_the_outline() {
        let shape = SketchShape::Circle {
            cx: 50.0,
            cy: 50.0,
            r: 20.0,
        };
        let plain = d_of(&RoughGenerator.generate(&shape, &style(false, FillTexture::Solid)).unwrap());
        let solid = RoughGenerator.generate(&shape, &style(true, FillTexture::Solid)).unwrap();
        assert_eq!(solid.fill_strokes, None);
        assert!(d_of(&solid).matches('M').count() > plain.matches('M').count());
    }

    #[test]
    fn lines_are_never_filled() {
        let shape = SketchShape::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 0.0,
        };
        let a = RoughGenerator.generate(&shape, &style(true, FillTexture::Solid)).unwrap();
        let b = RoughGenerator.generate(&shape, &style(false, FillTexture::Solid)).unwrap();
        assert_eq!(a, b);
    }
}
