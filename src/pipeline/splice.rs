//! Offset-based text replacement.
//!
//! Both the document rewrite (diagram block → image link) and the SVG
//! rewrite (element → sketched path) record byte spans against the
//! *unmodified* text and apply them here. Applying in descending start
//! order keeps every not-yet-applied span valid, since edits only ever
//! shift text that lies after them.

use tracing::warn;

/// One pending replacement of `source[start..end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Replacement {
    pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Apply `replacements` to `source`, last span first.
///
/// Spans that overlap an already-applied span, fall outside `source`, or do
/// not sit on char boundaries are dropped with a warning.
pub fn splice(source: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = source.to_string();
    let mut floor = source.len();
    for r in replacements {
        let valid = r.start <= r.end
            && r.end <= floor
            && source.is_char_boundary(r.start)
            && source.is_char_boundary(r.end);
        if !valid {
            warn!("Dropping replacement {}..{}: overlaps or out of range", r.start, r.end);
            continue;
        }
        out.replace_range(r.start..r.end, &r.text);
        floor = r.start;
    }
    out
}
