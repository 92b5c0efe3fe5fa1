//! Structural grouping of SVG elements and per-group style assignment.
//!
//! Elements that look alike structurally (same CSS class, same id stem,
//! same parent group) should look alike after sketching too. Each drawable
//! element gets a key, in this precedence:
//!
//! 1. `class:<token>` for the first class token that is not auxiliary
//!    (`edge*`, `message*`, `text`)
//! 2. `id:<prefix>` for the alphabetic prefix of the id (`actor0` → `actor`)
//! 3. `parent:<id or class>` when the parent is a `<g>`
//! 4. `type:<tag>`
//!
//! Keys are computed once per SVG across every shape tag, so a class keeps
//! one colour whether its members are `rect`s or `path`s.

use crate::config::{FillTexture, HandDrawnOptions};
use crate::sketch::color::group_color;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static ID_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z]+)\d*").expect("valid regex"));

/// Style shared by every element with the same group key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleGroup {
    pub key: String,
    /// `hsl(...)` colour, set when grouping by block.
    pub color: Option<String>,
    /// Texture, set when textures are randomized.
    pub fill_texture: Option<FillTexture>,
}

fn is_auxiliary_class(token: &str) -> bool {
    token.starts_with("edge") || token.starts_with("message") || token == "text"
}

/// Structural group key of one element.
pub fn group_key(node: &Node<'_, '_>) -> String {
    if let Some(token) = node
        .attribute("class")
        .and_then(|c| c.split_whitespace().find(|t| !is_auxiliary_class(t)))
    {
        return format!("class:{token}");
    }

    if let Some(id) = node.attribute("id").filter(|id| !id.is_empty()) {
        return match ID_PREFIX_RE.captures(id) {
            Some(c) => format!("id:{}", &c[1]),
            None => format!("id:{id}"),
        };
    }

    if let Some(parent) = node
        .parent_element()
        .filter(|p| p.tag_name().name() == "g")
    {
        if let Some(pid) = parent.attribute("id").filter(|v| !v.is_empty()) {
            return format!("parent:{pid}");
        }
        if let Some(pclass) = parent.attribute("class").filter(|v| !v.is_empty()) {
            return format!("parent:{pclass}");
        }
    }

    format!("type:{}", node.tag_name().name())
}

/// Group styles for one SVG, in first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct GroupPalette {
    groups: IndexMap<String, StyleGroup>,
}

impl GroupPalette {
    /// Assign a colour and/or texture to every distinct key.
    ///
    /// Colours are only drawn when `group_colors_by_block` is set and
    /// textures only when `randomize_textures` is set. A colour that equals
    /// an earlier group's is rotated one hue degree at a time until unique.
    pub fn build<'k, R, I>(keys: I, options: &HandDrawnOptions, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = &'k str>,
    {
        let mut groups: IndexMap<String, StyleGroup> = IndexMap::new();
        let mut used: HashSet<String> = HashSet::new();

        for key in keys {
            if groups.contains_key(key) {
                continue;
            }
            let index = groups.len();

            let color = options.group_colors_by_block.then(|| {
                let mut hsl = group_color(index, rng);
                let mut css = hsl.to_css();
                for _ in 0..360 {
                    if !used.contains(&css) {
                        break;
                    }
                    hsl.h = (hsl.h + 1.0).rem_euclid(360.0);
                    css = hsl.to_css();
                }
                used.insert(css.clone());
                css
            });

            let fill_texture = if options.randomize_textures {
                FillTexture::SAMPLED.choose(rng).copied()
            } else {
                None
            };

            groups.insert(
                key.to_string(),
                StyleGroup {
                    key: key.to_string(),
                    color,
                    fill_texture,
                },
            );
        }

        Self { groups }
    }

    pub fn get(&self, key: &str) -> Option<&StyleGroup> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_groups(self) -> Vec<StyleGroup> {
        self.groups.into_values().collect()
    }
}
