//! Scene fade transitions
//!
//! [`TransitionSignaler`] is the thin façade the scene timeline driver talks
//! to. The animation itself lives behind [`FadeAnimator`]; [`OpacityFader`] is
//! the reference animator, driving a shared opacity value where 1.0 is a fully
//! opaque cover and 0.0 shows the video.
//!
//! The signaler does not guard against repeated triggers. Fade-out
//! idempotence per scene activation belongs to the driver.

use gvp_common::config::FaderConfig;
use gvp_common::FadeCurve;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// External fade effect
pub trait FadeAnimator: Send {
    /// Clear the cover to reveal the scene
    fn start_fade_in(&mut self);

    /// Bring the cover back to opaque
    fn start_fade_out(&mut self);

    /// Length of one fade in seconds
    fn fade_duration(&self) -> f64;

    /// Advance the animation by one frame
    fn tick(&mut self, _dt: f64) {}
}

/// Façade over the fade effect
pub struct TransitionSignaler {
    animator: Box<dyn FadeAnimator>,
}

impl TransitionSignaler {
    pub fn new(animator: Box<dyn FadeAnimator>) -> Self {
        Self { animator }
    }

    pub fn trigger_fade_in(&mut self) {
        debug!("Fade in triggered");
        self.animator.start_fade_in();
    }

    pub fn trigger_fade_out(&mut self) {
        debug!("Fade out triggered");
        self.animator.start_fade_out();
    }

    pub fn fade_duration_seconds(&self) -> f64 {
        self.animator.fade_duration()
    }

    pub fn tick(&mut self, dt: f64) {
        self.animator.tick(dt);
    }
}

impl std::fmt::Debug for TransitionSignaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionSignaler")
            .field("fade_duration", &self.fade_duration_seconds())
            .finish()
    }
}

/// Read side of an [`OpacityFader`]'s cover opacity
#[derive(Debug, Clone)]
pub struct OpacityHandle(Arc<Mutex<f64>>);

impl OpacityHandle {
    fn new(value: f64) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn get(&self) -> f64 {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    Idle,
    /// Fade-in waiting out its start delay
    Delayed { remaining: f64 },
    In { elapsed: f64 },
    Out { elapsed: f64, from: f64 },
}

/// Reference fade animator over a shared opacity value
///
/// Starts fully opaque. Fade-in restarts from opaque every time it is
/// triggered; fade-out ramps from whatever opacity is current and ignores
/// triggers while it is already running.
#[derive(Debug)]
pub struct OpacityFader {
    duration: f64,
    delay: f64,
    curve: FadeCurve,
    fade: Fade,
    opacity: OpacityHandle,
}

impl OpacityFader {
    pub fn new(config: &FaderConfig) -> Self {
        Self {
            duration: config.duration_seconds.max(0.0),
            delay: config.delay_seconds.max(0.0),
            curve: config.curve,
            fade: Fade::Idle,
            opacity: OpacityHandle::new(1.0),
        }
    }

    pub fn opacity(&self) -> f64 {
        self.opacity.get()
    }

    /// Shared handle for whatever draws the cover
    pub fn handle(&self) -> OpacityHandle {
        self.opacity.clone()
    }

    pub fn is_fading(&self) -> bool {
        !matches!(self.fade, Fade::Idle)
    }

    fn progress(&self, elapsed: f64) -> f64 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.duration).min(1.0)
        }
    }
}

impl FadeAnimator for OpacityFader {
    fn start_fade_in(&mut self) {
        self.opacity.set(1.0);
        self.fade = if self.delay > 0.0 {
            Fade::Delayed {
                remaining: self.delay,
            }
        } else {
            Fade::In { elapsed: 0.0 }
        };
    }

    fn start_fade_out(&mut self) {
        if matches!(self.fade, Fade::Out { .. }) {
            return;
        }
        self.fade = Fade::Out {
            elapsed: 0.0,
            from: self.opacity.get(),
        };
    }

    fn fade_duration(&self) -> f64 {
        self.duration
    }

    fn tick(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        match self.fade {
            Fade::Idle => {}
            Fade::Delayed { remaining } => {
                let remaining = remaining - dt;
                self.fade = if remaining > 0.0 {
                    Fade::Delayed { remaining }
                } else {
                    // Carry the overshoot into the fade itself
                    Fade::In { elapsed: -remaining }
                };
                if let Fade::In { .. } = self.fade {
                    self.tick(0.0);
                }
            }
            Fade::In { elapsed } => {
                let elapsed = elapsed + dt;
                let t = self.progress(elapsed);
                self.opacity.set(self.curve.ramp_down(t));
                self.fade = if t >= 1.0 {
                    Fade::Idle
                } else {
                    Fade::In { elapsed }
                };
            }
            Fade::Out { elapsed, from } => {
                let elapsed = elapsed + dt;
                let t = self.progress(elapsed);
                self.opacity.set(from + (1.0 - from) * self.curve.ramp_up(t));
                self.fade = if t >= 1.0 {
                    Fade::Idle
                } else {
                    Fade::Out { elapsed, from }
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fader(duration: f64, delay: f64) -> OpacityFader {
        OpacityFader::new(&FaderConfig {
            duration_seconds: duration,
            delay_seconds: delay,
            curve: FadeCurve::Linear,
        })
    }

    #[test]
    fn test_fade_in_clears_cover() {
        let mut f = fader(1.0, 0.0);
        assert_eq!(f.opacity(), 1.0);

        f.start_fade_in();
        f.tick(0.5);
        assert!((f.opacity() - 0.5).abs() < 1e-9);
        f.tick(0.5);
        assert_eq!(f.opacity(), 0.0);
        assert!(!f.is_fading());
    }

    #[test]
    fn test_fade_in_waits_for_delay() {
        let mut f = fader(1.0, 2.0);
        f.start_fade_in();
        f.tick(1.5);
        assert_eq!(f.opacity(), 1.0);
        f.tick(1.0);
        assert!((f.opacity() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fade_out_is_not_reentrant() {
        let mut f = fader(2.0, 0.0);
        f.start_fade_in();
        f.tick(2.0);
        assert_eq!(f.opacity(), 0.0);

        f.start_fade_out();
        f.tick(1.0);
        let halfway = f.opacity();
        assert!((halfway - 0.5).abs() < 1e-9);

        // A second trigger neither restarts nor jumps
        f.start_fade_out();
        assert_eq!(f.opacity(), halfway);
        f.tick(1.0);
        assert_eq!(f.opacity(), 1.0);
    }

    #[test]
    fn test_fade_out_starts_from_current_opacity() {
        let mut f = fader(1.0, 0.0);
        f.start_fade_in();
        f.tick(0.5);
        f.start_fade_out();
        f.tick(0.5);
        assert!((f.opacity() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_snaps() {
        let mut f = fader(0.0, 0.0);
        f.start_fade_in();
        f.tick(0.016);
        assert_eq!(f.opacity(), 0.0);
    }

    #[test]
    fn test_signaler_forwards_to_animator() {
        let f = fader(1.5, 0.0);
        let handle = f.handle();
        let mut signaler = TransitionSignaler::new(Box::new(f));
        assert_eq!(signaler.fade_duration_seconds(), 1.5);

        signaler.trigger_fade_in();
        signaler.tick(1.5);
        assert_eq!(handle.get(), 0.0);

        signaler.trigger_fade_out();
        signaler.tick(1.5);
        assert_eq!(handle.get(), 1.0);
    }
}
