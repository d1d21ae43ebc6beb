//! Steady-state quality strategies
//!
//! A media type in steady state asks its decider for the next quality. The
//! decider is chosen once through [`crate::DeciderKind`] and owned by that
//! media type's state, so strategies with internal state (the optimizer's
//! weights and queue) never leak between audio and video.

mod buffer_occupancy;
mod drift_plus_penalty;

pub use buffer_occupancy::BufferOccupancyDecider;
pub use drift_plus_penalty::{DriftPlusPenaltyOptimizer, OptimizerState};

use std::fmt;

use crate::params::BufferModel;

/// Snapshot handed to a decider for one steady-state decision
#[derive(Debug, Clone, Copy)]
pub struct SteadyInputs<'a> {
    pub model: &'a BufferModel,
    /// Real buffer plus placeholder, in seconds
    pub effective_buffer_level: f64,
    /// Smoothed throughput estimate, bits per second
    pub throughput_bps: f64,
    /// Quality the conservative throughput estimate sustains
    pub throughput_quality: usize,
    pub last_quality: usize,
    /// Duration of the most recent segment, in seconds
    pub segment_duration_s: f64,
}

/// Strategy picking a quality index once the buffer is primed
pub trait QualityDecider: fmt::Debug + Send {
    /// Short identifier used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Choose the quality for the next segment
    ///
    /// Must return an index into `inputs.model.ladder()`.
    fn choose_quality(&mut self, inputs: &SteadyInputs<'_>) -> usize;
}
