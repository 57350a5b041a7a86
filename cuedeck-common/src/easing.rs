//! Easing curves for volume automation
//!
//! Two curves drive every volume change the player makes:
//! - **Smoothstep**: `e = 3p² − 2p³`, used to lift ducked music back to the
//!   baseline under an announcement
//! - **LinearStep**: a fixed number of equal decrements, used for the
//!   fade-out-and-stop of a cue

use serde::{Deserialize, Serialize};

/// Default number of discrete steps in a step fade
pub const DEFAULT_FADE_STEPS: u32 = 20;

/// Easing kind for a volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Easing {
    /// Smoothstep S-curve: slow start and finish, sampled continuously
    Smoothstep,

    /// Linear descent in `steps` equal increments
    LinearStep { steps: u32 },
}

impl Easing {
    /// Eased progress for a normalized position
    ///
    /// `progress` is clamped to 0.0-1.0. For `LinearStep` the position is
    /// quantized down to the last completed step.
    pub fn ease(&self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);

        match self {
            Easing::Smoothstep => smoothstep(p),
            Easing::LinearStep { steps } => {
                let steps = (*steps).max(1);
                let completed = (p * steps as f32).floor() as u32;
                completed.min(steps) as f32 / steps as f32
            }
        }
    }
}

/// Smoothstep easing: `3p² − 2p³`
pub fn smoothstep(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    p * p * (3.0 - 2.0 * p)
}

/// Remaining volume fraction after `step` of `steps` linear decrements
///
/// Returns `1 − step/steps`, clamped to 0.0-1.0.
pub fn step_fraction(step: u32, steps: u32) -> f32 {
    let steps = steps.max(1);
    1.0 - (step.min(steps) as f32 / steps as f32)
}

/// Interpolate between two levels using an eased progress value
pub fn lerp(start: f32, end: f32, eased: f32) -> f32 {
    start + (end - start) * eased
}

impl std::fmt::Display for Easing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Easing::Smoothstep => write!(f, "Smoothstep"),
            Easing::LinearStep { steps } => write!(f, "LinearStep({})", steps),
        }
    }
}
