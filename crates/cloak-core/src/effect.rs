use crate::config::EffectConfig;
use crate::frame::Frame;
use cloak_detection::composite::{combine, CompositeError};
use cloak_detection::{rgb_to_hsv, Hsv, MaskBuilder};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("background does not fit the live frame: {0}")]
    Composite(#[from] CompositeError),
}

/// Background plate and target color for the cloak effect.
///
/// The effect runs only once both are present and no background capture is
/// in progress; otherwise frames pass through untouched.
#[derive(Debug)]
pub struct EffectState {
    background: Option<Frame>,
    target: Option<Hsv>,
    captures_in_progress: u32,
    masks: MaskBuilder,
    announced: bool,
}

impl EffectState {
    pub fn new(tolerance: u32, log_interval: u64) -> Self {
        Self {
            background: None,
            target: None,
            captures_in_progress: 0,
            masks: MaskBuilder::new(tolerance, log_interval),
            announced: false,
        }
    }

    pub fn from_config(cfg: &EffectConfig) -> Self {
        Self::new(cfg.color_tolerance, cfg.debug_log_interval)
    }

    // Stores a copy of `frame`. Returns false, keeping any earlier
    // background, when there is no frame.
    pub fn capture_background(&mut self, frame: Option<&Frame>) -> bool {
        match frame {
            Some(frame) => {
                self.background = Some(frame.clone());
                tracing::info!(
                    width = frame.width(),
                    height = frame.height(),
                    "background captured"
                );
                true
            }
            None => {
                tracing::warn!("background capture failed: no frame available");
                false
            }
        }
    }

    pub fn set_target_color(&mut self, rgb: [u8; 3]) -> bool {
        let [r, g, b] = rgb;
        let hsv = rgb_to_hsv(r, g, b);
        tracing::info!(rgb = ?rgb, hsv = ?hsv, "target color set");
        self.target = Some(hsv);
        true
    }

    pub fn target_color(&self) -> Option<Hsv> {
        self.target
    }

    pub fn is_ready(&self) -> bool {
        self.background.is_some() && self.target.is_some()
    }

    pub fn is_capturing(&self) -> bool {
        self.captures_in_progress > 0
    }

    pub fn apply(&mut self, frame: Frame) -> Result<Frame, EffectError> {
        if self.is_capturing() {
            return Ok(frame);
        }
        let (Some(background), Some(target)) = (&self.background, self.target) else {
            return Ok(frame);
        };

        let mask = self.masks.build(frame.view(), target);
        let cloaked = combine(frame.view(), background.view(), mask.view())?;

        if !self.announced {
            tracing::info!("invisibility effect active");
            self.announced = true;
        }
        Ok(Frame::from_composite(cloaked))
    }

    pub fn reset(&mut self) {
        self.background = None;
        self.target = None;
        self.masks.reset();
        self.announced = false;
        tracing::info!("effect state reset");
    }

    fn begin_capture(&mut self) {
        self.captures_in_progress += 1;
    }

    fn end_capture(&mut self) {
        self.captures_in_progress = self.captures_in_progress.saturating_sub(1);
    }
}

/// Cloneable handle that puts the whole [`EffectState`] behind one lock, so
/// readers never see half of an update.
///
/// [`SharedEffect::apply`] holds the lock while it masks and composites a
/// frame, so control calls such as `set_target_color` or `reset` wait for the
/// frame in progress to finish.
#[derive(Clone, Debug)]
pub struct SharedEffect {
    inner: Arc<Mutex<EffectState>>,
}

impl SharedEffect {
    pub fn new(state: EffectState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    // A panic mid-update cannot leave the state torn (every write is a
    // single assignment), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, EffectState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capture_background(&self, frame: Option<&Frame>) -> bool {
        self.lock().capture_background(frame)
    }

    // Returns the stored HSV target on success.
    pub fn set_target_color(&self, rgb: [u8; 3]) -> Option<Hsv> {
        let mut state = self.lock();
        if state.set_target_color(rgb) {
            state.target_color()
        } else {
            None
        }
    }

    pub fn target_color(&self) -> Option<Hsv> {
        self.lock().target_color()
    }

    pub fn apply(&self, frame: Frame) -> Result<Frame, EffectError> {
        self.lock().apply(frame)
    }

    pub fn reset(&self) {
        self.lock().reset()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().is_capturing()
    }

    // Pauses the effect until the returned guard is dropped.
    pub fn begin_capture(&self) -> CaptureGuard {
        self.lock().begin_capture();
        CaptureGuard {
            effect: self.clone(),
        }
    }
}

#[must_use = "the effect resumes as soon as the guard is dropped"]
pub struct CaptureGuard {
    effect: SharedEffect,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.effect.lock().end_capture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [0, 0, 255];
    const GREEN: [u8; 3] = [0, 255, 0];
    const WALL: [u8; 3] = [90, 90, 90];

    fn state() -> EffectState {
        EffectState::new(100, 0)
    }

    // Two columns: a red "cloak" on the left and a green shirt on the right.
    fn scene() -> Frame {
        Frame::from_bgr(2, 1, &[RED, GREEN].concat()).unwrap()
    }

    fn wall() -> Frame {
        Frame::filled(2, 1, WALL)
    }

    #[test]
    fn passes_through_until_ready() {
        let mut fx = state();
        assert_eq!(fx.apply(scene()).unwrap(), scene());

        fx.set_target_color([255, 0, 0]);
        assert!(!fx.is_ready());
        assert_eq!(fx.apply(scene()).unwrap(), scene());

        fx.reset();
        fx.capture_background(Some(&wall()));
        assert!(!fx.is_ready());
        assert_eq!(fx.apply(scene()).unwrap(), scene());
    }

    #[test]
    fn cloaks_target_color_once_ready() {
        let mut fx = state();
        assert!(fx.capture_background(Some(&wall())));
        assert!(fx.set_target_color([255, 0, 0]));
        assert!(fx.is_ready());

        let out = fx.apply(scene()).unwrap();
        assert_eq!(out.get_pixel(0, 0), Some(WALL));
        assert_eq!(out.get_pixel(1, 0), Some(GREEN));
    }

    #[test]
    fn order_of_setup_does_not_matter() {
        let mut fx = state();
        fx.set_target_color([255, 0, 0]);
        fx.capture_background(Some(&wall()));
        assert_eq!(fx.apply(scene()).unwrap().get_pixel(0, 0), Some(WALL));
    }

    #[test]
    fn missing_frame_keeps_previous_background() {
        let mut fx = state();
        fx.capture_background(Some(&wall()));
        assert!(!fx.capture_background(None));
        fx.set_target_color([255, 0, 0]);
        assert_eq!(fx.apply(scene()).unwrap().get_pixel(0, 0), Some(WALL));
    }

    #[test]
    fn later_capture_replaces_background() {
        let mut fx = state();
        fx.capture_background(Some(&wall()));
        let white = Frame::filled(2, 1, [255, 255, 255]);
        fx.capture_background(Some(&white));
        fx.set_target_color([255, 0, 0]);
        assert_eq!(
            fx.apply(scene()).unwrap().get_pixel(0, 0),
            Some([255, 255, 255])
        );
    }

    #[test]
    fn last_target_color_wins() {
        // Narrow hue window so the green target leaves red pixels alone.
        let mut fx = EffectState::new(20, 0);
        fx.capture_background(Some(&wall()));
        fx.set_target_color([0, 0, 255]);
        fx.set_target_color([0, 255, 0]);
        assert_eq!(fx.target_color(), Some(Hsv::new(60, 255, 255)));

        let out = fx.apply(scene()).unwrap();
        assert_eq!(out.get_pixel(0, 0), Some(RED));
        assert_eq!(out.get_pixel(1, 0), Some(WALL));
    }

    #[test]
    fn reset_clears_everything() {
        let mut fx = state();
        fx.capture_background(Some(&wall()));
        fx.set_target_color([255, 0, 0]);
        fx.reset();
        assert!(!fx.is_ready());
        assert_eq!(fx.target_color(), None);
        assert_eq!(fx.apply(scene()).unwrap(), scene());

        fx.reset();
        assert!(!fx.is_ready());
    }

    #[test]
    fn background_size_mismatch_is_reported() {
        let mut fx = state();
        fx.capture_background(Some(&Frame::filled(4, 4, WALL)));
        fx.set_target_color([255, 0, 0]);
        let err = fx.apply(scene()).unwrap_err();
        assert!(matches!(
            err,
            EffectError::Composite(CompositeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn capture_guard_pauses_effect() {
        let fx = SharedEffect::new(state());
        fx.capture_background(Some(&wall()));
        fx.set_target_color([255, 0, 0]);

        let guard = fx.begin_capture();
        assert!(fx.is_capturing());
        assert!(fx.is_ready());
        assert_eq!(fx.apply(scene()).unwrap(), scene());

        drop(guard);
        assert!(!fx.is_capturing());
        assert_eq!(fx.apply(scene()).unwrap().get_pixel(0, 0), Some(WALL));
    }

    #[test]
    fn overlapping_captures_stay_paused_until_last_guard() {
        let fx = SharedEffect::new(state());
        let first = fx.begin_capture();
        let second = fx.begin_capture();
        drop(first);
        assert!(fx.is_capturing());
        drop(second);
        assert!(!fx.is_capturing());
    }

    #[test]
    fn shared_set_color_returns_hsv() {
        let fx = SharedEffect::new(state());
        assert_eq!(fx.set_target_color([255, 0, 0]), Some(Hsv::new(0, 255, 255)));
        assert_eq!(fx.target_color(), Some(Hsv::new(0, 255, 255)));
    }

    #[test]
    fn shared_handle_is_usable_across_threads() {
        let fx = SharedEffect::new(state());
        let writer = {
            let fx = fx.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    fx.capture_background(Some(&wall()));
                    fx.set_target_color([255, 0, 0]);
                    fx.reset();
                }
            })
        };
        for _ in 0..100 {
            let out = fx.apply(scene()).unwrap();
            let left = out.get_pixel(0, 0);
            assert!(left == Some(RED) || left == Some(WALL));
        }
        writer.join().unwrap();
    }
}
