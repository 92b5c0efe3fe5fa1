//! The hand-drawn rewrite of one SVG.
//!
//! Every drawable primitive outside of `defs`/`marker`/`clipPath`/`mask`/
//! `pattern`/`symbol`/`foreignObject` is replaced in place by a `<path>`
//! with sketched geometry. A pattern-filled shape gets a second, unstyled
//! `<path>` of texture strokes in its fill colour just before the outline.
//! Replacement works on byte spans of the
//! source text rather than re-serialising the tree, so everything the pass
//! does not touch (text, `foreignObject` labels, styles, markers) survives
//! byte-for-byte.
//!
//! ## Per element
//!
//! ```text
//! resolve style ──▶ pick colour ──▶ pick texture ──▶ generate ──▶ <path>
//! (cascade)        (group → perturb → as-is)     (catch_unwind)
//! ```
//!
//! Any failure on one element is logged and that element is left as it was.

use crate::config::{FillTexture, HandDrawnOptions};
use crate::error::SketchError;
use crate::pipeline::splice::{splice, Replacement};
use crate::sketch::color::perturb_color;
use crate::sketch::generator::{SketchGenerator, SketchShape, SketchStyle};
use crate::sketch::group::{group_key, GroupPalette, StyleGroup};
use crate::sketch::style::{resolve_style, Stylesheet};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Elements whose content is reference geometry, not drawn output.
const OPAQUE_CONTAINERS: [&str; 7] = [
    "defs",
    "marker",
    "clipPath",
    "mask",
    "pattern",
    "symbol",
    "foreignObject",
];

const DRAWABLE_TAGS: [&str; 7] = ["path", "rect", "circle", "ellipse", "line", "polygon", "polyline"];

const MARKER_ATTRS: [&str; 3] = ["marker-start", "marker-mid", "marker-end"];

const MIN_STROKE_WIDTH: f64 = 3.0;
const STROKE_WIDTH_FACTOR: f64 = 1.5;

static TRANSLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*translate\(\s*(-?[\d.eE+-]+)(?:\s*[,\s]\s*(-?[\d.eE+-]+))?\s*\)\s*$")
        .expect("valid regex")
});

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("valid regex"));

/// Result of one stylization pass.
#[derive(Debug, Clone)]
pub struct SketchReport {
    /// The rewritten SVG.
    pub svg: String,
    /// Elements replaced by sketched paths.
    pub rewritten: usize,
    /// Drawable elements left untouched after a per-element failure.
    pub skipped: usize,
    /// Group styles in first-seen order. Empty when grouping did not run.
    pub groups: Vec<StyleGroup>,
}

/// Rewrite every drawable element of `svg` into a hand-drawn equivalent.
///
/// Fails only when the SVG cannot be parsed at all. All randomness (group
/// colours, perturbation, texture picks, generator seeds) is drawn from
/// `rng`, so a seeded RNG gives a reproducible result.
pub fn stylize_svg<R: Rng + ?Sized>(
    svg: &str,
    options: &HandDrawnOptions,
    rng: &mut R,
    generator: &dyn SketchGenerator,
) -> Result<SketchReport, SketchError> {
    let parse_opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(svg, parse_opts)
        .map_err(|e| SketchError::InvalidSvg(e.to_string()))?;

    let sheet = Stylesheet::from_document(&doc);
    let targets: Vec<Node<'_, '_>> = doc.descendants().filter(is_target).collect();

    // Keys are computed once over every shape tag. Without block colouring
    // there is no group lookup, so textures are picked per element instead.
    let keys: Vec<String> = targets.iter().map(group_key).collect();
    let palette = if options.group_colors_by_block {
        GroupPalette::build(keys.iter().map(String::as_str), options, rng)
    } else {
        GroupPalette::default()
    };
    debug!(
        elements = targets.len(),
        groups = palette.len(),
        rules = sheet.rules().len(),
        "stylizing SVG"
    );

    let mut replacements = Vec::with_capacity(targets.len());
    let mut skipped = 0;
    for (node, key) in targets.iter().zip(&keys) {
        let group = if options.group_colors_by_block {
            palette.get(key)
        } else {
            None
        };
        match sketch_element(node, group, &sheet, options, rng, generator) {
            Ok(r) => replacements.push(r),
            Err(e) => {
                warn!("Leaving element unstyled: {e}");
                skipped += 1;
            }
        }
    }

    let rewritten = replacements.len();
    Ok(SketchReport {
        svg: splice(svg, replacements),
        rewritten,
        skipped,
        groups: palette.into_groups(),
    })
}

fn is_target(node: &Node<'_, '_>) -> bool {
    node.is_element()
        && DRAWABLE_TAGS.contains(&node.tag_name().name())
        && !node
            .ancestors()
            .skip(1)
            .any(|a| a.is_element() && OPAQUE_CONTAINERS.contains(&a.tag_name().name()))
}

fn sketch_element<R: Rng + ?Sized>(
    node: &Node<'_, '_>,
    group: Option<&StyleGroup>,
    sheet: &Stylesheet,
    options: &HandDrawnOptions,
    rng: &mut R,
    generator: &dyn SketchGenerator,
) -> Result<Replacement, SketchError> {
    let (shape, baked_translate) = read_shape(node)?;
    let resolved = resolve_style(node, sheet);

    let colorize = |value: &str, rng: &mut R| -> String {
        match group.and_then(|g| g.color.clone()) {
            Some(c) => c,
            None if options.randomize_colors => perturb_color(value, rng),
            None => value.to_string(),
        }
    };
    let stroke = colorize(&resolved.stroke, rng);
    let fill = match &resolved.fill {
        Some(f) if !shape.is_open() => Some(colorize(f, rng)),
        _ => None,
    };

    let texture = match group.and_then(|g| g.fill_texture) {
        Some(t) => t,
        None if options.randomize_textures => FillTexture::SAMPLED
            .choose(rng)
            .copied()
            .unwrap_or(options.fill_texture),
        None => options.fill_texture,
    };

    let style = SketchStyle {
        roughness: options.roughness,
        stroke_width: (resolved.stroke_width * STROKE_WIDTH_FACTOR).max(MIN_STROKE_WIDTH),
        filled: fill.is_some(),
        texture,
        seed: rng.gen_range(1..=u32::MAX as u64),
    };

    let tag = shape.tag().to_string();
    let generated = catch_unwind(AssertUnwindSafe(|| generator.generate(&shape, &style)))
        .map_err(|_| SketchError::GeneratorFailed {
            tag: tag.clone(),
            detail: "generator panicked".into(),
        })??;
    let d = generated
        .primary_path()
        .ok_or_else(|| SketchError::EmptyPath { tag: tag.clone() })?;

    let transform = node.attribute("transform").filter(|_| !baked_translate);
    let opacity = (fill.is_some() && (resolved.fill_opacity - 1.0).abs() > f64::EPSILON)
        .then(|| resolved.fill_opacity.to_string());

    let mut out = String::new();
    // Pattern textures are strokes laid under the outline in the fill colour.
    if let (Some(color), Some(strokes)) = (&fill, generated.fill_strokes.as_deref()) {
        if texture != FillTexture::Solid && !strokes.trim().is_empty() {
            out.push_str("<path");
            push_attr(&mut out, "d", strokes.trim());
            push_attr(&mut out, "stroke", color);
            push_attr(&mut out, "stroke-width", &(style.stroke_width / 2.0).to_string());
            push_attr(&mut out, "fill", "none");
            if let Some(o) = &opacity {
                push_attr(&mut out, "stroke-opacity", o);
            }
            if let Some(t) = transform {
                push_attr(&mut out, "transform", t);
            }
            out.push_str("/>");
        }
    }

    out.push_str("<path");
    push_attr(&mut out, "d", d);
    push_attr(&mut out, "stroke", &stroke);
    push_attr(&mut out, "stroke-width", &style.stroke_width.to_string());
    match &fill {
        Some(color) if texture == FillTexture::Solid => push_attr(&mut out, "fill", color),
        _ => push_attr(&mut out, "fill", "none"),
    }
    if let Some(o) = &opacity {
        push_attr(&mut out, "fill-opacity", o);
    }
    for name in MARKER_ATTRS {
        if let Some(v) = node.attribute(name) {
            push_attr(&mut out, name, v);
        }
    }
    for name in ["class", "id"] {
        if let Some(v) = node.attribute(name) {
            push_attr(&mut out, name, v);
        }
    }
    if let Some(t) = transform {
        push_attr(&mut out, "transform", t);
    }
    out.push_str("/>");

    let range = node.range();
    Ok(Replacement::new(range.start, range.end, out))
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Read the element's geometry. The flag is true when a pure `translate`
/// was folded into polygon/polyline points.
fn read_shape(node: &Node<'_, '_>) -> Result<(SketchShape, bool), SketchError> {
    let tag = node.tag_name().name();
    let shape = match tag {
        "path" => {
            let d = node.attribute("d").map(str::trim).unwrap_or_default();
            if d.is_empty() {
                return Err(invalid(tag, "missing d"));
            }
            SketchShape::Path { d: d.to_string() }
        }
        "rect" => SketchShape::Rect {
            x: num_or_zero(node, "x")?,
            y: num_or_zero(node, "y")?,
            width: positive(node, "width")?,
            height: positive(node, "height")?,
        },
        "circle" => SketchShape::Circle {
            cx: num_or_zero(node, "cx")?,
            cy: num_or_zero(node, "cy")?,
            r: positive(node, "r")?,
        },
        "ellipse" => SketchShape::Ellipse {
            cx: num_or_zero(node, "cx")?,
            cy: num_or_zero(node, "cy")?,
            rx: positive(node, "rx")?,
            ry: positive(node, "ry")?,
        },
        "line" => SketchShape::Line {
            x1: num_or_zero(node, "x1")?,
            y1: num_or_zero(node, "y1")?,
            x2: num_or_zero(node, "x2")?,
            y2: num_or_zero(node, "y2")?,
        },
        "polygon" | "polyline" => {
            let mut points = parse_points(node.attribute("points").unwrap_or_default());
            if points.len() < 2 {
                return Err(invalid(tag, "fewer than two points"));
            }
            let offset = node.attribute("transform").and_then(parse_translate);
            if let Some((tx, ty)) = offset {
                for p in &mut points {
                    p.0 += tx;
                    p.1 += ty;
                }
            }
            let shape = if tag == "polygon" {
                SketchShape::Polygon { points }
            } else {
                SketchShape::Polyline { points }
            };
            return Ok((shape, offset.is_some()));
        }
        other => return Err(invalid(other, "not a drawable element")),
    };
    Ok((shape, false))
}

fn invalid(tag: &str, detail: &str) -> SketchError {
    SketchError::InvalidGeometry {
        tag: tag.to_string(),
        detail: detail.to_string(),
    }
}

fn num_or_zero(node: &Node<'_, '_>, name: &str) -> Result<f64, SketchError> {
    match node.attribute(name) {
        None => Ok(0.0),
        Some(v) => parse_number(v).ok_or_else(|| {
            invalid(node.tag_name().name(), &format!("{name}={v:?} is not a number"))
        }),
    }
}

fn positive(node: &Node<'_, '_>, name: &str) -> Result<f64, SketchError> {
    node.attribute(name)
        .and_then(parse_number)
        .filter(|v| *v > 0.0)
        .ok_or_else(|| invalid(node.tag_name().name(), &format!("{name} must be a positive number")))
}

fn parse_number(v: &str) -> Option<f64> {
    let v = v.trim();
    v.strip_suffix("px")
        .unwrap_or(v)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// `"0,0 10,0 10 10"` → `[(0,0), (10,0), (10,10)]`. A trailing odd number is dropped.
fn parse_points(points: &str) -> Vec<(f64, f64)> {
    let nums: Vec<f64> = NUMBER_RE
        .find_iter(points)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    nums.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Offset of a transform that is exactly one `translate(x[, y])`.
fn parse_translate(transform: &str) -> Option<(f64, f64)> {
    let c = TRANSLATE_RE.captures(transform)?;
    let tx = c.get(1)?.as_str().parse().ok()?;
    let ty = match c.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    Some((tx, ty))
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
}

fn escape_attr(value: &str) -> String {
    let mut s = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            _ => s.push(c),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::generator::{RoughGenerator, SketchGroup};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const FLOWCHART: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 100">
<style>#m .basic{fill:#ECECFF;stroke:#9370DB;stroke-width:1px;}</style>
<defs><marker id="arrow"><path d="M0 0L10 5L0 10z"/></marker></defs>
<g class="node" id="flowchart-A-0"><rect class="basic label-container" x="0" y="0" width="80" height="40"/></g>
<g class="node" id="flowchart-B-1"><rect class="basic label-container" x="100" y="0" width="80" height="40"/></g>
<path class="flowchart-link" d="M80 20L100 20" marker-end="url(#arrow)" id="L-A-B"/>
<foreignObject><div xmlns="http://www.w3.org/1999/xhtml">Start</div></foreignObject>
</svg>"##;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    fn enabled() -> HandDrawnOptions {
        HandDrawnOptions {
            enabled: true,
            ..Default::default()
        }
    }

    fn paths(svg: &str) -> Vec<(Option<String>, Option<String>)> {
        let doc = Document::parse(svg).unwrap();
        doc.descendants()
            .filter(is_target)
            .map(|n| {
                (
                    n.attribute("class").map(String::from),
                    n.attribute("stroke").map(String::from),
                )
            })
            .collect()
    }

    #[test]
    fn rewrites_drawables_and_keeps_the_rest() {
        let report = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        assert_eq!(report.rewritten, 3);
        assert_eq!(report.skipped, 0);
        assert!(!report.svg.contains("<rect"));
        // Marker geometry and foreignObject text are untouched.
        assert!(report.svg.contains(r#"<path d="M0 0L10 5L0 10z"/>"#));
        assert!(report.svg.contains("Start"));
        assert!(report.svg.contains(r#"marker-end="url(#arrow)""#));
        assert!(report.svg.contains(r#"id="L-A-B""#));
        Document::parse(&report.svg).unwrap();
    }

    #[test]
    fn elements_sharing_a_key_share_colour_and_texture() {
        let report = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        let styled = paths(&report.svg);
        let basics: Vec<_> = styled
            .iter()
            .filter(|(c, _)| c.as_deref() == Some("basic label-container"))
            .collect();
        assert_eq!(basics.len(), 2);
        assert_eq!(basics[0].1, basics[1].1);
        // `basic` and `flowchart-link` are two keys with two colours.
        assert_eq!(report.groups.len(), 2);
        assert_ne!(report.groups[0].color, report.groups[1].color);
    }

    #[test]
    fn stroke_width_has_a_floor() {
        let report = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        let doc = Document::parse(&report.svg).unwrap();
        let widths: Vec<_> = doc
            .descendants()
            .filter(|n| n.attribute("class").is_some_and(|c| c.contains("basic")))
            .map(|n| n.attribute("stroke-width"))
            .collect();
        assert_eq!(widths, vec![Some("3"), Some("3")]);
    }

    #[test]
    fn plain_options_keep_resolved_colours() {
        let opts = HandDrawnOptions {
            enabled: true,
            randomize_colors: false,
            randomize_textures: false,
            group_colors_by_block: false,
            fill_texture: FillTexture::Solid,
            ..Default::default()
        };
        let report = stylize_svg(FLOWCHART, &opts, &mut rng(), &RoughGenerator).unwrap();
        assert!(report.groups.is_empty());
        assert!(report.svg.contains(r##"stroke="#9370DB""##));
        assert!(report.svg.contains(r##"fill="#ECECFF""##));
    }

    #[test]
    fn unfilled_shapes_stay_unfilled() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10" fill="none" stroke="red"/></svg>"#;
        let report = stylize_svg(svg, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        assert!(report.svg.contains(r#"fill="none""#));
        assert!(!report.svg.contains("fill-opacity"));
    }

    #[test]
    fn explicit_fill_none_beats_class_fill() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg">
<style>.box{fill:#ECECFF;stroke:#333333}</style>
<rect class="box" fill="none" x="0" y="0" width="40" height="20"/>
</svg>"##;
        let opts = HandDrawnOptions {
            enabled: true,
            randomize_colors: false,
            randomize_textures: false,
            group_colors_by_block: false,
            fill_texture: FillTexture::Solid,
            ..Default::default()
        };
        let report = stylize_svg(svg, &opts, &mut rng(), &RoughGenerator).unwrap();
        assert_eq!(report.rewritten, 1);
        assert!(!report.svg.contains(r##"fill="#ECECFF""##), "{}", report.svg);
        assert!(report.svg.contains(r#"fill="none""#));
        assert!(report.svg.contains(r##"stroke="#333333""##));
    }

    #[test]
    fn pattern_fill_is_stroked_in_the_fill_colour() {
        let opts = HandDrawnOptions {
            enabled: true,
            randomize_colors: false,
            randomize_textures: false,
            group_colors_by_block: false,
            fill_texture: FillTexture::Hachure,
            ..Default::default()
        };
        let report = stylize_svg(FLOWCHART, &opts, &mut rng(), &RoughGenerator).unwrap();
        let doc = Document::parse(&report.svg).unwrap();
        let hatch: Vec<_> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "path" && n.attribute("stroke") == Some("#ECECFF"))
            .collect();
        // One hatch layer per node rect; the link has no fill.
        assert_eq!(hatch.len(), 2);
        for h in &hatch {
            assert_eq!(h.attribute("fill"), Some("none"));
            assert_eq!(h.attribute("class"), None);
        }
        // Outlines keep the stroke colour and stay unfilled.
        assert_eq!(
            doc.descendants()
                .filter(|n| n.attribute("class") == Some("basic label-container"))
                .filter(|n| n.attribute("stroke") == Some("#9370DB")
                    && n.attribute("fill") == Some("none"))
                .count(),
            2
        );
    }

    #[test]
    fn texture_randomization_alone_builds_no_groups() {
        let opts = HandDrawnOptions {
            enabled: true,
            randomize_textures: true,
            group_colors_by_block: false,
            ..Default::default()
        };
        let report = stylize_svg(FLOWCHART, &opts, &mut rng(), &RoughGenerator).unwrap();
        assert!(report.groups.is_empty());
        assert_eq!(report.rewritten, 3);
    }

    #[test]
    fn polygon_translate_is_baked_into_points() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><polygon points="0,0 10,0 10,10" transform="translate(100, 50)"/><polyline points="0,0 5,5" transform="rotate(45)"/></svg>"#;
        let report = stylize_svg(svg, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        assert_eq!(report.rewritten, 2);
        assert_eq!(report.svg.matches("transform=").count(), 1);
        assert!(report.svg.contains(r#"transform="rotate(45)""#));
    }

    #[test]
    fn bad_geometry_is_skipped_not_fatal() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="oops" height="1"/><circle r="4"/></svg>"#;
        let report = stylize_svg(svg, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.svg.contains(r#"<rect width="oops" height="1"/>"#));
    }

    struct Panicking;
    impl SketchGenerator for Panicking {
        fn generate(&self, _: &SketchShape, _: &SketchStyle) -> Result<SketchGroup, SketchError> {
            panic!("boom")
        }
    }

    struct WrapperOnly;
    impl SketchGenerator for WrapperOnly {
        fn generate(&self, _: &SketchShape, _: &SketchStyle) -> Result<SketchGroup, SketchError> {
            Ok(SketchGroup {
                paths: vec![],
                d: Some("M1 2L3 4".into()),
                ..Default::default()
            })
        }
    }

    #[test]
    fn generator_panic_leaves_svg_unchanged() {
        let report = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &Panicking).unwrap();
        assert_eq!(report.rewritten, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.svg, FLOWCHART);
    }

    #[test]
    fn wrapper_path_is_used_when_no_children() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><line x2="5" y2="5"/></svg>"#;
        let report = stylize_svg(svg, &enabled(), &mut rng(), &WrapperOnly).unwrap();
        assert!(report.svg.contains(r#"d="M1 2L3 4""#));
    }

    #[test]
    fn same_seed_same_output() {
        let a = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        let b = stylize_svg(FLOWCHART, &enabled(), &mut rng(), &RoughGenerator).unwrap();
        assert_eq!(a.svg, b.svg);
    }

    #[test]
    fn malformed_svg_is_an_error() {
        let err = stylize_svg("<svg><rect></svg>", &enabled(), &mut rng(), &RoughGenerator).unwrap_err();
        assert!(matches!(err, SketchError::InvalidSvg(_)));
    }

    #[test]
    fn translate_parsing() {
        assert_eq!(parse_translate("translate(3, -4)"), Some((3.0, -4.0)));
        assert_eq!(parse_translate("translate(7)"), Some((7.0, 0.0)));
        assert_eq!(parse_translate("translate(1,2) scale(2)"), None);
    }
}
