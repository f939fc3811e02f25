use serde::{Deserialize, Serialize};

// Largest hue value in the 180-step quantization.
pub const HUE_MAX: u8 = 179;

/// A color in the 8-bit HSV convention: hue in `0..=179` (half degrees),
/// saturation and value in `0..=255`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

impl From<[u8; 3]> for Hsv {
    fn from([h, s, v]: [u8; 3]) -> Self {
        Self { h, s, v }
    }
}

impl From<Hsv> for [u8; 3] {
    fn from(hsv: Hsv) -> Self {
        [hsv.h, hsv.s, hsv.v]
    }
}

/// Inclusive HSV window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub fn in_range(&self, hsv: Hsv) -> bool {
        hsv.h >= self.lower.h
            && hsv.h <= self.upper.h
            && hsv.s >= self.lower.s
            && hsv.s <= self.upper.s
            && hsv.v >= self.lower.v
            && hsv.v <= self.upper.v
    }
}

// Converts a user-picked RGB color. Goes through device (BGR) order so the
// result matches what `bgr_to_hsv` yields for the same color in a frame.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let [b, g, r] = rgb_to_bgr([r, g, b]);
    bgr_to_hsv([b, g, r])
}

pub fn rgb_to_bgr([r, g, b]: [u8; 3]) -> [u8; 3] {
    [b, g, r]
}

// Converts one BGR pixel to HSV components scaled to bytes.
pub fn bgr_to_hsv([b, g, r]: [u8; 3]) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f32::from(max - min);

    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / f32::from(max)).round() as u8
    };

    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let h = if delta == 0.0 {
        0.0
    } else if max as f32 == r {
        60.0 * (g - b) / delta
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };

    let h = if h < 0.0 { h + 360.0 } else { h };
    let mut h_half = (h / 2.0).round() as u16;
    if h_half > u16::from(HUE_MAX) {
        h_half -= u16::from(HUE_MAX) + 1;
    }

    Hsv {
        h: h_half as u8,
        s,
        v: max,
    }
}
