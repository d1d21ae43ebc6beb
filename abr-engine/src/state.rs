//! Per-media-type decision state machine
//!
//! - `OneBitrate`: nothing to adapt between; every decision is a no-op and
//!   the state never changes again.
//! - `Startup`: not primed yet; quality follows the conservative throughput
//!   estimate and the placeholder buffer is seeded to match it.
//! - `Steady`: buffer primed; the configured decider runs.
//!
//! Startup moves to steady once a segment duration is known and the real
//! buffer holds at least one segment. A seek sends any adaptive state back to
//! startup.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::decider::QualityDecider;
use crate::params::BufferModel;
use crate::placeholder::PlaceholderBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbrState {
    OneBitrate,
    Startup,
    Steady,
}

/// Timing of the most recent segment and decision call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentTiming {
    /// Start time of the last loaded segment, until it has been accounted for
    pub last_segment_start: Option<f64>,
    pub last_segment_duration_s: Option<f64>,
    pub last_request: Option<Instant>,
    pub last_finish: Option<Instant>,
    /// Furthest segment start seen since the last seek
    pub most_advanced_segment_start: Option<f64>,
    pub last_segment_was_replacement: bool,
    pub last_call: Option<Instant>,
}

impl SegmentTiming {
    /// Record a loaded segment and classify it as a replacement when it did
    /// not advance past the furthest segment already loaded
    pub fn record_segment(&mut self, start: f64, duration_s: f64, replacement_hint: bool) {
        let advances = self
            .most_advanced_segment_start
            .map_or(true, |most| start > most);
        if advances {
            self.most_advanced_segment_start = Some(start);
        }
        self.last_segment_was_replacement = replacement_hint || !advances;
        self.last_segment_start = Some(start);
        self.last_segment_duration_s = Some(duration_s).filter(|d| d.is_finite() && *d > 0.0);
    }

    /// Time the last download took, when both ends are known
    pub fn download_time(&self) -> Option<Duration> {
        match (self.last_request, self.last_finish) {
            (Some(request), Some(finish)) => Some(finish.saturating_duration_since(request)),
            _ => None,
        }
    }
}

/// Retained state for a media type whose ladder has something to adapt
#[derive(Debug)]
pub(crate) struct AdaptiveState {
    pub(crate) phase: AbrState,
    pub(crate) model: BufferModel,
    pub(crate) placeholder: PlaceholderBuffer,
    pub(crate) last_quality: usize,
    pub(crate) timing: SegmentTiming,
    /// Quality most recently requested from outside, used when abandoning
    pub(crate) requested_quality: Option<usize>,
    pub(crate) decider: Box<dyn QualityDecider>,
}

impl AdaptiveState {
    pub(crate) fn new(model: BufferModel, decider: Box<dyn QualityDecider>) -> Self {
        Self {
            phase: AbrState::Startup,
            model,
            placeholder: PlaceholderBuffer::new(),
            last_quality: 0,
            timing: SegmentTiming::default(),
            requested_quality: None,
            decider,
        }
    }

    /// Return to startup, dropping timing and placeholder
    pub(crate) fn clear_on_seek(&mut self) {
        self.phase = AbrState::Startup;
        self.placeholder.reset();
        self.timing = SegmentTiming::default();
    }

    /// Move from startup to steady once the buffer holds a full segment
    pub(crate) fn try_enter_steady(&mut self, buffer_level: f64) -> bool {
        if self.phase != AbrState::Startup {
            return false;
        }
        match self.timing.last_segment_duration_s {
            Some(duration) if buffer_level >= duration => {
                self.phase = AbrState::Steady;
                true
            }
            _ => false,
        }
    }

    /// Fold a finished segment into the placeholder buffer
    ///
    /// A segment is complete once both its load notification and its request
    /// timing have arrived; whichever comes second triggers the update.
    pub(crate) fn check_new_segment(&mut self, buffer_level: f64, decay: f64) {
        if self.timing.last_segment_start.is_none() || self.timing.last_request.is_none() {
            return;
        }

        let download_time = self.timing.download_time();
        let replacement = if self.timing.last_segment_was_replacement {
            self.timing.last_segment_duration_s
        } else {
            None
        };
        self.placeholder.on_segment_completed(
            &self.model,
            decay,
            self.last_quality.min(self.model.ladder().top_index()),
            buffer_level,
            download_time,
            replacement,
        );

        self.timing.last_segment_start = None;
        self.timing.last_request = None;
    }

    /// Credit the gap since the last download finished, or since the last call
    /// when nothing was downloaded in between
    pub(crate) fn credit_idle_time(&mut self, now: Instant) {
        if let Some(finish) = self.timing.last_finish {
            self.placeholder.add_idle_time(now.saturating_duration_since(finish));
        } else if let Some(last_call) = self.timing.last_call {
            self.placeholder.add_idle_time(now.saturating_duration_since(last_call));
        }

        self.timing.last_call = Some(now);
        self.timing.last_segment_start = None;
        self.timing.last_request = None;
        self.timing.last_finish = None;
    }
}

/// Everything the engine retains for one media type
#[derive(Debug)]
pub(crate) enum DecisionState {
    /// Absorbing: a single usable rate
    OneBitrate,
    Adaptive(Box<AdaptiveState>),
}

impl DecisionState {
    pub fn state(&self) -> AbrState {
        match self {
            DecisionState::OneBitrate => AbrState::OneBitrate,
            DecisionState::Adaptive(state) => state.phase,
        }
    }

    pub(crate) fn adaptive_mut(&mut self) -> Option<&mut AdaptiveState> {
        match self {
            DecisionState::OneBitrate => None,
            DecisionState::Adaptive(state) => Some(&mut **state),
        }
    }

    pub(crate) fn adaptive(&self) -> Option<&AdaptiveState> {
        match self {
            DecisionState::OneBitrate => None,
            DecisionState::Adaptive(state) => Some(&**state),
        }
    }
}
