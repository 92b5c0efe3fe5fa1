//! Cascading style resolution for SVG elements.
//!
//! Diagram renderers rarely put colours on the elements themselves; most
//! of it lives in an embedded `<style>` block keyed by class. Each property
//! is resolved by trying a fixed list of pure strategies in order:
//!
//! ```text
//! attribute ──▶ inline style="" ──▶ <style> class rule ──▶ default
//! ```
//!
//! The first strategy yielding an *acceptable* value wins. What counts as
//! acceptable is per property (a `stroke="none"` is not a usable stroke).

use crate::sketch::color::is_unpainted;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static RULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").expect("valid regex"));

pub const DEFAULT_STROKE: &str = "#333333";
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// One `selector { declarations }` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<(String, String)>,
}

impl StyleRule {
    fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the selector names `.class` as a whole token.
    fn names_class(&self, class: &str) -> bool {
        let needle = format!(".{class}");
        let sel = self.selector.as_str();
        let mut from = 0;
        while let Some(pos) = sel[from..].find(&needle) {
            let end = from + pos + needle.len();
            let boundary = sel[end..]
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '-' || c == '_'));
            if boundary {
                return true;
            }
            from = end;
        }
        false
    }
}

/// Rules from every `<style>` element of one SVG, in document order.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let css = COMMENT_RE.replace_all(css, "");
        let rules = RULE_RE
            .captures_iter(&css)
            .map(|c| StyleRule {
                selector: c[1].trim().to_string(),
                declarations: parse_declarations(&c[2]),
            })
            .filter(|r| !r.selector.starts_with('@'))
            .collect();
        Self { rules }
    }

    pub fn from_document(doc: &Document<'_>) -> Self {
        let mut css = String::new();
        for style in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "style")
        {
            for text in style
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
            {
                css.push_str(text);
                css.push('\n');
            }
        }
        Self::parse(&css)
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// First rule naming one of `classes` that declares an acceptable `property`.
    pub fn lookup(&self, classes: &[&str], property: &str, accept: fn(&str) -> bool) -> Option<&str> {
        self.rules.iter().find_map(|rule| {
            if !classes.iter().any(|c| rule.names_class(c)) {
                return None;
            }
            rule.get(property).filter(|v| accept(v))
        })
    }
}

/// `a: b; c: d !important` → `[("a","b"), ("c","d")]`.
pub fn parse_declarations(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let value = value.trim().trim_end_matches("!important").trim();
            let prop = prop.trim().to_ascii_lowercase();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

// ── Resolution strategies ────────────────────────────────────────────────

/// A pure lookup of one property on one element.
pub type StyleStrategy = fn(&Node<'_, '_>, &Stylesheet, &str, fn(&str) -> bool) -> Option<String>;

fn from_attribute(node: &Node<'_, '_>, _: &Stylesheet, prop: &str, accept: fn(&str) -> bool) -> Option<String> {
    node.attribute(prop)
        .map(str::trim)
        .filter(|v| accept(v))
        .map(str::to_string)
}

fn from_inline_style(
    node: &Node<'_, '_>,
    _: &Stylesheet,
    prop: &str,
    accept: fn(&str) -> bool,
) -> Option<String> {
    let style = node.attribute("style")?;
    parse_declarations(style)
        .into_iter()
        .find(|(p, v)| p == prop && accept(v))
        .map(|(_, v)| v)
}

fn from_stylesheet(
    node: &Node<'_, '_>,
    sheet: &Stylesheet,
    prop: &str,
    accept: fn(&str) -> bool,
) -> Option<String> {
    let classes: Vec<&str> = node.attribute("class")?.split_whitespace().collect();
    sheet.lookup(&classes, prop, accept).map(str::to_string)
}

/// Strategies in priority order. The default is applied by the caller.
pub const RESOLUTION_ORDER: [StyleStrategy; 3] = [from_attribute, from_inline_style, from_stylesheet];

/// Resolve one property through [`RESOLUTION_ORDER`].
pub fn resolve_property(
    node: &Node<'_, '_>,
    sheet: &Stylesheet,
    prop: &str,
    accept: fn(&str) -> bool,
) -> Option<String> {
    RESOLUTION_ORDER
        .iter()
        .find_map(|strategy| strategy(node, sheet, prop, accept))
}

fn is_paint(v: &str) -> bool {
    !is_unpainted(v)
}

/// Fill stops at the first declaration, so an explicit `none` wins over a class rule.
fn is_declared(v: &str) -> bool {
    !v.trim().is_empty()
}

fn is_positive_length(v: &str) -> bool {
    parse_length(v).is_some_and(|n| n > 0.0)
}

fn is_opacity(v: &str) -> bool {
    v.trim().parse::<f64>().is_ok_and(|n| (0.0..=1.0).contains(&n))
}

/// Parse a unitless or `px` length.
pub fn parse_length(v: &str) -> Option<f64> {
    let v = v.trim();
    v.strip_suffix("px")
        .unwrap_or(v)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Effective paint of one element before colour randomization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub stroke: String,
    pub stroke_width: f64,
    /// `None` when the element is unfilled.
    pub fill: Option<String>,
    pub fill_opacity: f64,
}

/// Resolve stroke, stroke width, fill and fill opacity for `node`.
pub fn resolve_style(node: &Node<'_, '_>, sheet: &Stylesheet) -> ResolvedStyle {
    ResolvedStyle {
        stroke: resolve_property(node, sheet, "stroke", is_paint)
            .unwrap_or_else(|| DEFAULT_STROKE.to_string()),
        stroke_width: resolve_property(node, sheet, "stroke-width", is_positive_length)
            .and_then(|v| parse_length(&v))
            .unwrap_or(DEFAULT_STROKE_WIDTH),
        fill: resolve_property(node, sheet, "fill", is_declared).filter(|v| is_paint(v)),
        fill_opacity: resolve_property(node, sheet, "fill-opacity", is_opacity)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a, 'i>(doc: &'a Document<'i>, tag: &str) -> Node<'a, 'i> {
        doc.descendants()
            .find(|n| n.tag_name().name() == tag)
            .unwrap()
    }

    #[test]
    fn parses_rules_and_strips_important() {
        let sheet = Stylesheet::parse(
            "/* c */ #m .node rect{fill:#ECECFF;stroke:#9370DB !important;stroke-width:1px;} @keyframes d{to{x:1}}",
        );
        let rule = &sheet.rules()[0];
        assert_eq!(rule.selector, "#m .node rect");
        assert_eq!(rule.get("stroke"), Some("#9370DB"));
        assert_eq!(rule.get("stroke-width"), Some("1px"));
    }

    #[test]
    fn class_token_match_is_whole_word() {
        let rule = StyleRule {
            selector: "#m .flowchart-link".into(),
            declarations: vec![],
        };
        assert!(rule.names_class("flowchart-link"));
        assert!(!rule.names_class("flowchart"));
    }

    #[test]
    fn attribute_beats_style_beats_sheet() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg">
            <style>.a{stroke:#00ff00;fill:#0000ff;stroke-width:4}</style>
            <rect class="a" stroke="#ff0000" style="stroke:#111111;fill:#222222" width="1" height="1"/>
        </svg>"##;
        let doc = Document::parse(svg).unwrap();
        let sheet = Stylesheet::from_document(&doc);
        let s = resolve_style(&first(&doc, "rect"), &sheet);
        assert_eq!(s.stroke, "#ff0000");
        assert_eq!(s.fill.as_deref(), Some("#222222"));
        assert_eq!(s.stroke_width, 4.0);
    }

    #[test]
    fn none_stroke_falls_through_to_sheet_then_default() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
            <style>.edge{stroke:#444}</style>
            <path class="edge" stroke="none" d="M0 0L1 1"/>
            <path d="M0 0L1 1"/>
        </svg>"#;
        let doc = Document::parse(svg).unwrap();
        let sheet = Stylesheet::from_document(&doc);
        let paths: Vec<_> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "path")
            .collect();
        assert_eq!(resolve_style(&paths[0], &sheet).stroke, "#444");
        let bare = resolve_style(&paths[1], &sheet);
        assert_eq!(bare.stroke, DEFAULT_STROKE);
        assert_eq!(bare.stroke_width, DEFAULT_STROKE_WIDTH);
        assert_eq!(bare.fill, None);
        assert_eq!(bare.fill_opacity, 1.0);
    }

    #[test]
    fn explicit_none_fill_stops_the_cascade() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
            <style>.box{fill:#ECECFF}</style>
            <rect class="box" fill="none" width="1" height="1"/>
            <rect class="box" style="fill:transparent" width="1" height="1"/>
            <rect class="box" width="1" height="1"/>
        </svg>"#;
        let doc = Document::parse(svg).unwrap();
        let sheet = Stylesheet::from_document(&doc);
        let fills: Vec<_> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "rect")
            .map(|n| resolve_style(&n, &sheet).fill)
            .collect();
        assert_eq!(fills, vec![None, None, Some("#ECECFF".to_string())]);
    }

    #[test]
    fn fill_opacity_resolves() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="2" fill="red" style="fill-opacity:0.5"/></svg>"#;
        let doc = Document::parse(svg).unwrap();
        let s = resolve_style(&first(&doc, "circle"), &Stylesheet::default());
        assert_eq!(s.fill.as_deref(), Some("red"));
        assert_eq!(s.fill_opacity, 0.5);
    }

    #[test]
    fn lengths() {
        assert_eq!(parse_length("2px"), Some(2.0));
        assert_eq!(parse_length(" 1.5 "), Some(1.5));
        assert_eq!(parse_length("50%"), None);
    }
}
