//! Drift-plus-penalty optimizer
//!
//! Keeps a fractional allocation `w` over the ladder on the probability
//! simplex and a virtual queue `q1` accumulating rate-deficit backlog. Each
//! decision takes one projected gradient step and rounds the allocated rate
//! to the nearest encoded rate. Experimental; the buffer-occupancy decider is
//! the default strategy.

use super::{QualityDecider, SteadyInputs};
use crate::params::OptimizerParameters;
use crate::simplex::{dot, project_onto_simplex};

const BPS_PER_MBPS: f64 = 1_000_000.0;

/// Allocation and queue carried between decisions
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState {
    pub w: Vec<f64>,
    pub prev_w: Vec<f64>,
    pub q1: f64,
}

impl OptimizerState {
    fn uniform(n: usize) -> Self {
        let share = 1.0 / n as f64;
        Self {
            w: vec![share; n],
            prev_w: vec![share; n],
            q1: 0.0,
        }
    }

    fn is_valid_for(&self, n: usize) -> bool {
        self.prev_w.len() == n
            && self.w.len() == n
            && self.prev_w.iter().all(|v| v.is_finite())
            && self.q1.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct DriftPlusPenaltyOptimizer {
    params: OptimizerParameters,
    state: Option<OptimizerState>,
}

impl DriftPlusPenaltyOptimizer {
    pub fn new(params: OptimizerParameters) -> Self {
        Self { params, state: None }
    }

    pub fn params(&self) -> OptimizerParameters {
        self.params
    }

    /// Current allocation and queue, once the first step has run
    pub fn state(&self) -> Option<&OptimizerState> {
        self.state.as_ref()
    }

    /// Run one update and return the chosen quality
    ///
    /// Returns `None` without touching retained state when the inputs cannot
    /// produce a finite update (no usable throughput or segment duration).
    pub fn step(
        &mut self,
        rates_bps: &[f64],
        throughput_bps: f64,
        segment_duration_s: f64,
    ) -> Option<usize> {
        let n = rates_bps.len();
        if n == 0 {
            return None;
        }

        let rates: Vec<f64> = rates_bps.iter().map(|r| r / BPS_PER_MBPS).collect();
        let c = throughput_bps / BPS_PER_MBPS;
        let denom = (2.0 * rates[n - 1]).min(c);
        let v = segment_duration_s;
        if !(denom.is_finite() && denom > 0.0 && v.is_finite() && v > 0.0) {
            return None;
        }

        if !self.state.as_ref().is_some_and(|s| s.is_valid_for(n)) {
            tracing::debug!("Initializing optimizer state for {} rates", n);
            self.state = Some(OptimizerState::uniform(n));
        }
        let state = self.state.get_or_insert_with(|| OptimizerState::uniform(n));
        let p = self.params;

        let drive = (p.vl - v * state.q1) / (2.0 * p.alpha);
        let raw: Vec<f64> = state
            .prev_w
            .iter()
            .zip(&rates)
            .map(|(prev, rate)| prev - (rate / denom) * drive)
            .collect();
        let w = project_onto_simplex(&raw);
        let diff: Vec<f64> = w.iter().zip(&state.prev_w).map(|(a, b)| a - b).collect();

        let allocated = dot(&rates, &state.prev_w);
        let q1 = if allocated < c {
            (state.q1 + v
                - v * allocated / denom
                - p.target_buffer_s / p.horizon
                - v * dot(&rates, &diff) / denom)
                .max(0.0)
        } else {
            // previous allocation already exceeded throughput
            0.0
        };

        if !q1.is_finite() || w.iter().any(|x| !x.is_finite()) {
            debug_assert!(false, "optimizer produced non-finite state: w={:?} q1={}", w, q1);
            tracing::warn!("Optimizer produced non-finite state, reinitializing");
            self.state = Some(OptimizerState::uniform(n));
            return None;
        }

        state.q1 = q1;
        state.prev_w.clone_from(&w);
        let target = dot(&w, &rates);
        state.w = w;

        let mut quality = 0;
        let mut best = f64::INFINITY;
        for (i, rate) in rates.iter().enumerate() {
            let distance = (rate - target).abs();
            if distance < best {
                best = distance;
                quality = i;
            }
        }

        tracing::debug!(
            "Optimizer step: c={:.3}Mbps q1={:.3} allocated={:.3}Mbps quality={}",
            c,
            q1,
            target,
            quality
        );
        Some(quality)
    }
}

impl QualityDecider for DriftPlusPenaltyOptimizer {
    fn name(&self) -> &'static str {
        "drift_plus_penalty"
    }

    fn choose_quality(&mut self, inputs: &SteadyInputs<'_>) -> usize {
        self.step(
            inputs.model.ladder().rates(),
            inputs.throughput_bps,
            inputs.segment_duration_s,
        )
        .unwrap_or(inputs.throughput_quality)
    }
}
