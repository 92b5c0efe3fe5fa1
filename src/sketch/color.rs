//! Colour parsing, perturbation and group-palette sampling.
//!
//! Everything is done in HSL because both operations the sketch pass needs
//! (nudge a colour a little, space colours evenly round the wheel) are
//! one-liners there. Output is always `hsl(h, s%, l%)` with integer parts.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static RGB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*([\d.]+)\s*,\s*([\d.]+)\s*,\s*([\d.]+)\s*(?:,\s*[\d.]+%?\s*)?\)$")
        .expect("valid regex")
});

static HSL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^hsla?\(\s*(-?[\d.]+)(?:deg)?\s*,\s*([\d.]+)%\s*,\s*([\d.]+)%\s*(?:,\s*[\d.]+%?\s*)?\)$",
    )
    .expect("valid regex")
});

/// Saturation/lightness bounds for perturbed colours.
const SL_MIN: f64 = 25.0;
const SL_MAX: f64 = 85.0;

/// A colour in HSL space: hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub fn to_css(&self) -> String {
        format!(
            "hsl({}, {}%, {}%)",
            (self.h.round() as i64).rem_euclid(360),
            self.s.round() as i64,
            self.l.round() as i64
        )
    }
}

/// True for values that mean "paint nothing".
pub fn is_unpainted(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("transparent")
}

/// Parse `#rgb`, `#rrggbb`, `rgb()`/`rgba()` or `hsl()`/`hsla()`.
pub fn parse_color(value: &str) -> Option<Hsl> {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex).map(|(r, g, b)| rgb_to_hsl(r, g, b));
    }
    if let Some(c) = RGB_RE.captures(v) {
        let channel = |i: usize| -> Option<u8> {
            let n: f64 = c.get(i)?.as_str().parse().ok()?;
            Some(n.clamp(0.0, 255.0).round() as u8)
        };
        return Some(rgb_to_hsl(channel(1)?, channel(2)?, channel(3)?));
    }
    if let Some(c) = HSL_RE.captures(v) {
        let num = |i: usize| -> Option<f64> { c.get(i)?.as_str().parse().ok() };
        return Some(Hsl {
            h: num(1)?.rem_euclid(360.0),
            s: num(2)?.clamp(0.0, 100.0),
            l: num(3)?.clamp(0.0, 100.0),
        });
    }
    None
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let d = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some((d(0)?, d(1)?, d(2)?))
        }
        6 => {
            let d = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some((d(0)?, d(2)?, d(4)?))
        }
        _ => None,
    }
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if (max - min).abs() < f64::EPSILON {
        return Hsl { h: 0.0, s: 0.0, l: l * 100.0 };
    }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    Hsl {
        h: h * 60.0,
        s: s * 100.0,
        l: l * 100.0,
    }
}

/// Nudge a colour: hue ±15°, saturation ±10, lightness ±7.5, with
/// saturation and lightness kept inside [25, 85].
///
/// Unparseable colours are returned unchanged.
pub fn perturb_color<R: Rng + ?Sized>(value: &str, rng: &mut R) -> String {
    let Some(base) = parse_color(value) else {
        return value.to_string();
    };
    Hsl {
        h: (base.h + rng.gen_range(-15.0..=15.0)).rem_euclid(360.0),
        s: (base.s + rng.gen_range(-10.0..=10.0)).clamp(SL_MIN, SL_MAX),
        l: (base.l + rng.gen_range(-7.5..=7.5)).clamp(SL_MIN, SL_MAX),
    }
    .to_css()
}

/// Colour for the `index`-th group: 12 evenly spaced hues plus ±10° jitter,
/// saturation 50–80%, lightness 45–70%.
pub fn group_color<R: Rng + ?Sized>(index: usize, rng: &mut R) -> Hsl {
    let base = (index % 12) as f64 * 30.0;
    Hsl {
        h: (base + rng.gen_range(-10.0..=10.0)).round().rem_euclid(360.0),
        s: rng.gen_range(50..80) as f64,
        l: rng.gen_range(45..70) as f64,
    }
}
