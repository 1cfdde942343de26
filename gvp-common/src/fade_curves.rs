//! Fade curve shapes for opacity transitions
//!
//! A curve maps normalized progress through a fade (0.0 at the start, 1.0 at
//! the end) to a normalized level. `ramp_up` rises from 0.0 to 1.0 and is
//! used when fading to opaque; `ramp_down` falls from 1.0 to 0.0 and is used
//! when fading back in from black.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

/// Fade curve types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = t², slow start, fast finish
    Exponential,

    /// v(t) = 1 - (1-t)², fast start, slow finish
    Logarithmic,

    /// v(t) = 0.5 × (1 - cos(π × t)), eased at both ends
    #[serde(alias = "cosine", alias = "s-curve")]
    SCurve,

    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Rising level at `position` (0.0 → 1.0)
    pub fn ramp_up(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                1.0 - inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Falling level at `position` (1.0 → 0.0)
    ///
    /// Mirror of [`ramp_up`](Self::ramp_up) so a fade-out followed by a
    /// fade-in with the same curve retraces the same shape.
    pub fn ramp_down(&self, position: f64) -> f64 {
        1.0 - self.ramp_up(position)
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[
            FadeCurve::Linear,
            FadeCurve::Exponential,
            FadeCurve::Logarithmic,
            FadeCurve::SCurve,
            FadeCurve::EqualPower,
        ]
    }
}

impl FromStr for FadeCurve {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "exponential" => Ok(FadeCurve::Exponential),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "s_curve" | "scurve" | "s-curve" | "cosine" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Ok(FadeCurve::EqualPower),
            other => {
                let known: Vec<&str> = FadeCurve::all_variants()
                    .iter()
                    .map(FadeCurve::as_str)
                    .collect();
                Err(crate::Error::InvalidInput(format!(
                    "Unknown fade curve: {} (expected one of {})",
                    other,
                    known.join(", ")
                )))
            }
        }
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
