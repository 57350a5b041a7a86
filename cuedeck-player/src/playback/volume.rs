//! Volume automation engine
//!
//! Sole writer of the process-wide output level. Runs at most one ramp at a
//! time: starting a ramp cancels the previous one, and frames addressed to a
//! cancelled ramp id are ignored.
//!
//! The engine is driven from outside: the orchestrator schedules frame and
//! step ticks and feeds them back through [`VolumeAutomation::apply_frame`]
//! and [`VolumeAutomation::apply_step`], so every write happens on the
//! orchestrator's control timeline.

use cuedeck_common::easing::{lerp, step_fraction, Easing};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Port over the process-wide output level (normalized 0-1)
pub trait VolumeControl: Send + Sync {
    fn level(&self) -> f32;
    fn set_level(&self, level: f32);
}

/// Output level shared with the audio output path
#[derive(Clone)]
pub struct SharedVolume {
    level: Arc<Mutex<f32>>,
}

impl SharedVolume {
    pub fn new(initial: f32) -> Self {
        Self {
            level: Arc::new(Mutex::new(initial.clamp(0.0, 1.0))),
        }
    }

    /// The underlying cell, for the output path to read from
    pub fn arc(&self) -> Arc<Mutex<f32>> {
        self.level.clone()
    }
}

impl VolumeControl for SharedVolume {
    fn level(&self) -> f32 {
        *self.level.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_level(&self, level: f32) {
        *self.level.lock().unwrap_or_else(|e| e.into_inner()) = level.clamp(0.0, 1.0);
    }
}

pub type RampId = u64;

/// Time-based interpolation between two levels
#[derive(Debug, Clone)]
pub struct VolumeRamp {
    pub id: RampId,
    pub start: f32,
    pub end: f32,
    pub duration: Duration,
    pub started_at: Instant,
    pub easing: Easing,
}

impl VolumeRamp {
    /// Linear progress 0-1 at `now`
    pub fn progress_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }

    /// Output level at `now`
    pub fn value_at(&self, now: Instant) -> f32 {
        lerp(self.start, self.end, self.easing.ease(self.progress_at(now)))
    }

    fn steps(&self) -> u32 {
        match self.easing {
            Easing::LinearStep { steps } => steps.max(1),
            Easing::Smoothstep => 1,
        }
    }
}

/// Result of applying one smooth-ramp frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampFrame {
    pub level: f32,
    pub complete: bool,
}

/// Result of applying one fade step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    pub step: u32,
    pub level: f32,
    pub finished: bool,
}

pub struct VolumeAutomation {
    control: Arc<dyn VolumeControl>,
    active: Option<VolumeRamp>,
    next_id: RampId,
    /// Baseline captured by the current session
    baseline: Option<f32>,
    /// Baseline waiting for the post-session settle delay
    pending_restore: Option<f32>,
}

impl VolumeAutomation {
    pub fn new(control: Arc<dyn VolumeControl>) -> Self {
        Self {
            control,
            active: None,
            next_id: 0,
            baseline: None,
            pending_restore: None,
        }
    }

    pub fn level(&self) -> f32 {
        self.control.level()
    }

    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }

    pub fn active_ramp(&self) -> Option<&VolumeRamp> {
        self.active.as_ref()
    }

    /// Capture the output level as the new session's baseline
    ///
    /// A restore still waiting out the settle delay is applied first, so the
    /// captured value is the previous session's baseline, never a faded level.
    pub fn capture_baseline(&mut self) -> f32 {
        if let Some(level) = self.pending_restore.take() {
            debug!("Applying pending baseline restore {:.3} early", level);
            self.control.set_level(level);
        }
        let level = self.control.level();
        self.baseline = Some(level);
        level
    }

    /// Set the level directly, cancelling any ramp
    pub fn set_level(&mut self, level: f32) {
        self.cancel();
        self.control.set_level(level);
    }

    /// Start a smoothstep ramp, writing its start level immediately
    pub fn start_smooth(&mut self, start: f32, end: f32, duration: Duration) -> RampId {
        self.start(start, end, duration, Easing::Smoothstep)
    }

    /// Start a step fade from the current level down to silence
    pub fn start_step_fade(&mut self, steps: u32, duration: Duration) -> RampId {
        let start = self.control.level();
        self.start(start, 0.0, duration, Easing::LinearStep { steps: steps.max(1) })
    }

    fn start(&mut self, start: f32, end: f32, duration: Duration, easing: Easing) -> RampId {
        if let Some(prev) = self.active.take() {
            debug!("Ramp {} superseded", prev.id);
        }
        self.next_id += 1;
        let ramp = VolumeRamp {
            id: self.next_id,
            start,
            end,
            duration,
            started_at: Instant::now(),
            easing,
        };
        debug!(
            "Ramp {} started: {} {:.3} -> {:.3} over {:?}",
            ramp.id, ramp.easing, start, end, duration
        );
        self.control.set_level(start);
        self.active = Some(ramp);
        self.next_id
    }

    /// Apply a smooth-ramp frame; `None` when `id` is no longer active
    pub fn apply_frame(&mut self, id: RampId, now: Instant) -> Option<RampFrame> {
        let ramp = self.active.as_ref().filter(|r| r.id == id)?;
        let level = ramp.value_at(now);
        let complete = ramp.progress_at(now) >= 1.0;
        self.control.set_level(level);
        if complete {
            debug!("Ramp {} complete at {:.3}", id, level);
            self.active = None;
        }
        Some(RampFrame { level, complete })
    }

    /// Apply fade step `step` (1-based); `None` when `id` is no longer active
    pub fn apply_step(&mut self, id: RampId, step: u32) -> Option<FadeStep> {
        let ramp = self.active.as_ref().filter(|r| r.id == id)?;
        let steps = ramp.steps();
        let level = ramp.start * step_fraction(step, steps);
        let finished = step >= steps;
        self.control.set_level(level);
        if finished {
            debug!("Fade {} finished after {} steps", id, steps);
            self.active = None;
        }
        Some(FadeStep {
            step,
            level,
            finished,
        })
    }

    pub fn cancel(&mut self) {
        if let Some(ramp) = self.active.take() {
            debug!("Ramp {} cancelled", ramp.id);
        }
    }

    /// End the session's ownership of the output level
    ///
    /// Cancels any ramp and parks the baseline for [`complete_restore`].
    ///
    /// [`complete_restore`]: VolumeAutomation::complete_restore
    pub fn begin_restore(&mut self) -> Option<f32> {
        self.cancel();
        if let Some(baseline) = self.baseline.take() {
            self.pending_restore = Some(baseline);
        }
        self.pending_restore
    }

    /// Write the parked baseline back after the settle delay
    pub fn complete_restore(&mut self) -> Option<f32> {
        let level = self.pending_restore.take()?;
        self.control.set_level(level);
        debug!("Baseline {:.3} restored", level);
        Some(level)
    }
}
