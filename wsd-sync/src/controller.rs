//! Live-latency controller
//!
//! Pure proportional control, no integral term:
//! - `diff = measured_latency - target_latency`
//! - seek: only when `|diff| > dead_band`, `clamp(diff * seek_gain, ±max_seek)`
//!   subtracted from the play position
//! - rate: every tick, `clamp(1 - diff * rate_gain, min_rate, max_rate)`

use std::time::Instant;
use tracing::{debug, info};
use wsd_common::config::ControllerConfig;

use crate::clock::validate_target;
use crate::error::Result;
use crate::pipeline::MediaPipeline;

/// One latency reading taken at tick time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    /// `None` when the pipeline cannot report latency
    pub measured_latency_seconds: Option<f64>,
    pub timestamp: Instant,
}

/// Corrections computed for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlDecision {
    /// Within `[min_rate, max_rate]`
    pub rate_multiplier: f64,
    /// Within `[-max_seek, max_seek]`; zero inside the dead-band
    pub seek_adjustment_seconds: f64,
}

impl ControlDecision {
    /// Normal speed, no seek
    pub const NEUTRAL: ControlDecision = ControlDecision {
        rate_multiplier: 1.0,
        seek_adjustment_seconds: 0.0,
    };

    pub fn seeks(&self) -> bool {
        self.seek_adjustment_seconds != 0.0
    }
}

/// Compute the corrections for a latency error
pub fn decide(diff: f64, tuning: &ControllerConfig) -> ControlDecision {
    let seek_adjustment_seconds = if diff.abs() > tuning.dead_band_seconds {
        (diff * tuning.seek_gain).clamp(-tuning.max_seek_seconds, tuning.max_seek_seconds)
    } else {
        0.0
    };

    let rate_multiplier = (1.0 - diff * tuning.rate_gain).clamp(tuning.min_rate, tuning.max_rate);

    ControlDecision {
        rate_multiplier,
        seek_adjustment_seconds,
    }
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No stream attached yet
    Idle,
    /// Ticking against a pipeline
    Running,
    /// Stopped; a new `start` re-enters Running
    Stopped,
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Latency was measured and corrections applied
    Corrected {
        sample: LatencySample,
        decision: ControlDecision,
    },
    /// Pipeline cannot report latency; rate pinned to 1.0, no seek
    NoCorrection { sample: LatencySample },
    /// Controller is not running (or the tick belonged to a cancelled timer)
    Inactive,
}

impl TickOutcome {
    /// Decision that is in effect after this tick, if the tick ran
    pub fn decision(&self) -> Option<ControlDecision> {
        match self {
            TickOutcome::Corrected { decision, .. } => Some(*decision),
            TickOutcome::NoCorrection { .. } => Some(ControlDecision::NEUTRAL),
            TickOutcome::Inactive => None,
        }
    }
}

/// Periodic latency controller bound to one pipeline
///
/// The pipeline is owned by the controller while Running and handed back
/// on `stop`.
pub struct LatencyController<P> {
    tuning: ControllerConfig,
    state: ControllerState,
    pipeline: Option<P>,
    target_latency_seconds: f64,
    applied_rate: f64,
    ticks: u64,
}

impl<P: MediaPipeline> LatencyController<P> {
    pub fn new(tuning: ControllerConfig) -> Self {
        Self {
            tuning,
            state: ControllerState::Idle,
            pipeline: None,
            target_latency_seconds: wsd_common::config::DEFAULT_TARGET_LATENCY,
            applied_rate: 1.0,
            ticks: 0,
        }
    }

    pub fn tuning(&self) -> &ControllerConfig {
        &self.tuning
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ControllerState::Running
    }

    pub fn target_latency_seconds(&self) -> f64 {
        self.target_latency_seconds
    }

    /// Rate most recently written to the pipeline
    pub fn applied_rate(&self) -> f64 {
        self.applied_rate
    }

    /// Ticks executed since the last `start`
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn pipeline(&self) -> Option<&P> {
        self.pipeline.as_ref()
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut P> {
        self.pipeline.as_mut()
    }

    /// Bind to a pipeline and enter Running
    ///
    /// Any previously bound pipeline is released first. A non-positive target
    /// is rejected and leaves the controller untouched.
    pub fn start(&mut self, pipeline: P, target_latency_seconds: f64) -> Result<()> {
        validate_target(target_latency_seconds)?;

        if let Some(mut previous) = self.stop() {
            previous.release();
        }

        self.pipeline = Some(pipeline);
        self.target_latency_seconds = target_latency_seconds;
        self.applied_rate = 1.0;
        self.ticks = 0;
        self.state = ControllerState::Running;
        info!(
            "Latency controller running (target {}s, period {}ms)",
            target_latency_seconds, self.tuning.tick_period_ms
        );
        Ok(())
    }

    /// Leave Running and hand back the pipeline
    ///
    /// No-op (returns `None`) when not running.
    pub fn stop(&mut self) -> Option<P> {
        if self.state != ControllerState::Running {
            return None;
        }
        self.state = ControllerState::Stopped;
        info!("Latency controller stopped after {} ticks", self.ticks);
        self.pipeline.take()
    }

    /// Update the target; takes effect on the next tick
    pub fn set_target(&mut self, target_latency_seconds: f64) -> Result<()> {
        validate_target(target_latency_seconds)?;
        self.target_latency_seconds = target_latency_seconds;
        Ok(())
    }

    /// Read latency, decide, apply. Runs to completion.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state != ControllerState::Running {
            return TickOutcome::Inactive;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return TickOutcome::Inactive;
        };
        self.ticks += 1;

        let sample = LatencySample {
            measured_latency_seconds: pipeline
                .current_latency_seconds()
                .filter(|latency| latency.is_finite()),
            timestamp: now,
        };

        let Some(measured) = sample.measured_latency_seconds else {
            if self.applied_rate != 1.0 {
                pipeline.set_playback_rate(1.0);
                self.applied_rate = 1.0;
            }
            debug!("Latency unknown; correction skipped");
            return TickOutcome::NoCorrection { sample };
        };

        let diff = measured - self.target_latency_seconds;
        let decision = decide(diff, &self.tuning);

        if decision.seeks() {
            let position = pipeline.current_position_seconds();
            pipeline.set_position_seconds(position - decision.seek_adjustment_seconds);
            debug!(
                "Seek {:+.3}s (latency {:.3}s, diff {:+.3}s)",
                -decision.seek_adjustment_seconds, measured, diff
            );
        }

        pipeline.set_playback_rate(decision.rate_multiplier);
        self.applied_rate = decision.rate_multiplier;

        debug!(
            "Tick {}: latency {:.3}s target {:.3}s rate {:.3}",
            self.ticks, measured, self.target_latency_seconds, decision.rate_multiplier
        );

        TickOutcome::Corrected { sample, decision }
    }
}
