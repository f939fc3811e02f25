use crate::color::{bgr_to_hsv, ColorRange, Hsv, HUE_MAX};
use ndarray::{Array2, ArrayView2};

/// Per-pixel selector, `true` where the frame matches the target color.
pub type Mask = Array2<bool>;

// Saturation and value never match below this, whatever the tolerance.
pub const SV_FLOOR: u8 = 10;

// Hues at or below RED_LOW_MAX, or at or above RED_HIGH_MIN, are red.
pub const RED_LOW_MAX: u8 = 10;
pub const RED_HIGH_MIN: u8 = 170;

pub fn is_red_hue(h: u8) -> bool {
    h <= RED_LOW_MAX || h >= RED_HIGH_MIN
}

/// The HSV windows a target color selects.
///
/// Red sits at both ends of the hue circle, so a red target selects the
/// union of two fixed hue bands instead of one window around its own hue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskWindow {
    Single(ColorRange),
    Wrapped(ColorRange, ColorRange),
}

impl MaskWindow {
    pub fn for_target(target: Hsv, tolerance: u32) -> Self {
        let s_low = lower_bound(target.s, tolerance, SV_FLOOR);
        let s_high = upper_bound(target.s, tolerance, u8::MAX);
        let v_low = lower_bound(target.v, tolerance, SV_FLOOR);
        let v_high = upper_bound(target.v, tolerance, u8::MAX);

        if is_red_hue(target.h) {
            let low_band = ColorRange {
                lower: Hsv::new(0, s_low, v_low),
                upper: Hsv::new(RED_LOW_MAX, s_high, v_high),
            };
            let high_band = ColorRange {
                lower: Hsv::new(RED_HIGH_MIN, s_low, v_low),
                upper: Hsv::new(HUE_MAX, s_high, v_high),
            };
            MaskWindow::Wrapped(low_band, high_band)
        } else {
            MaskWindow::Single(ColorRange {
                lower: Hsv::new(lower_bound(target.h, tolerance, 0), s_low, v_low),
                upper: Hsv::new(upper_bound(target.h, tolerance, HUE_MAX), s_high, v_high),
            })
        }
    }

    pub fn matches(&self, hsv: Hsv) -> bool {
        match self {
            MaskWindow::Single(range) => range.in_range(hsv),
            MaskWindow::Wrapped(low, high) => low.in_range(hsv) || high.in_range(hsv),
        }
    }
}

fn lower_bound(center: u8, tolerance: u32, floor: u8) -> u8 {
    let low = i64::from(center) - i64::from(tolerance);
    low.max(i64::from(floor)) as u8
}

fn upper_bound(center: u8, tolerance: u32, ceiling: u8) -> u8 {
    let high = u64::from(center) + u64::from(tolerance);
    high.min(u64::from(ceiling)) as u8
}

// Builds the mask for a BGR frame.
pub fn build_mask(frame: ArrayView2<[u8; 3]>, target: Hsv, tolerance: u32) -> Mask {
    let window = MaskWindow::for_target(target, tolerance);
    frame.map(|&pixel| window.matches(bgr_to_hsv(pixel)))
}

/// Builds masks with a fixed tolerance and periodically logs what it sees.
#[derive(Debug)]
pub struct MaskBuilder {
    tolerance: u32,
    log_interval: u64,
    frames_seen: u64,
}

impl MaskBuilder {
    // `log_interval` of 0 disables the periodic diagnostics.
    pub fn new(tolerance: u32, log_interval: u64) -> Self {
        Self {
            tolerance,
            log_interval,
            frames_seen: 0,
        }
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn build(&mut self, frame: ArrayView2<[u8; 3]>, target: Hsv) -> Mask {
        let mask = build_mask(frame, target, self.tolerance);

        self.frames_seen += 1;
        if self.log_interval > 0 && self.frames_seen % self.log_interval == 0 {
            self.log_diagnostics(frame, target, &mask);
        }

        mask
    }

    pub fn reset(&mut self) {
        self.frames_seen = 0;
    }

    fn log_diagnostics(&self, frame: ArrayView2<[u8; 3]>, target: Hsv, mask: &Mask) {
        let (height, width) = frame.dim();
        if height == 0 || width == 0 {
            return;
        }
        let center = bgr_to_hsv(frame[(height / 2, width / 2)]);
        let matched = mask.iter().filter(|&&hit| hit).count();
        let total = mask.len();

        tracing::debug!(
            frame = self.frames_seen,
            center_hsv = ?center,
            target_hsv = ?target,
            tolerance = self.tolerance,
            window = ?MaskWindow::for_target(target, self.tolerance),
            matched,
            total,
            coverage_pct = format_args!("{:.1}", matched as f64 * 100.0 / total as f64),
            "mask diagnostics"
        );
    }
}
