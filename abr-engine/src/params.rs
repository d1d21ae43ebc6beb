//! Control parameters derived from the bitrate ladder
//!
//! The buffer-occupancy score for quality `i` at buffer level `b` is
//! `(vp * (utility[i] + gp) - b) / rate[i]`. `gp` and `vp` are solved so the
//! lowest rate wins at `min_buffer_s` and the highest rate wins at the buffer
//! target.

use crate::config::AbrConfig;
use crate::ladder::BitrateLadder;

/// Log utilities shifted so the lowest rate scores 1
pub fn utilities_from_bitrates(rates: &[f64]) -> Vec<f64> {
    let Some(&lowest) = rates.first() else {
        return Vec::new();
    };
    let offset = lowest.ln();
    rates.iter().map(|r| r.ln() - offset + 1.0).collect()
}

/// Score-curve shape for the buffer-occupancy decider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    pub gp: f64,
    pub vp: f64,
}

impl ControlParameters {
    /// Solve `gp`/`vp` for a buffer target
    ///
    /// Returns `None` when the lowest rate already has the highest utility
    /// (including single-rate ladders), in which case there is nothing to
    /// adapt between.
    pub fn calculate(
        stable_buffer_time: f64,
        utilities: &[f64],
        min_buffer_s: f64,
        min_buffer_per_level_s: f64,
    ) -> Option<Self> {
        let highest = utilities
            .iter()
            .enumerate()
            .fold(0, |best, (i, &u)| if u > utilities[best] { i } else { best });
        if highest == 0 {
            return None;
        }

        let buffer_time =
            stable_buffer_time.max(min_buffer_s + min_buffer_per_level_s * utilities.len() as f64);
        let gp = (utilities[highest] - 1.0) / (buffer_time / min_buffer_s - 1.0);
        if !(gp.is_finite() && gp > 0.0) {
            return None;
        }
        let vp = min_buffer_s / gp;
        Some(Self { gp, vp })
    }
}

/// Step size and growth bound for the drift-plus-penalty optimizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerParameters {
    pub alpha: f64,
    pub vl: f64,
    pub horizon: f64,
    /// Buffer target feeding the virtual queue, in seconds
    pub target_buffer_s: f64,
}

impl OptimizerParameters {
    pub fn from_horizon(horizon: f64, target_buffer_s: f64) -> Self {
        let vl = horizon.sqrt();
        let alpha = horizon.max(vl * horizon.sqrt());
        Self {
            alpha,
            vl,
            horizon,
            target_buffer_s,
        }
    }
}

/// Ladder, utilities and score-curve parameters for one media type
///
/// Ladder and utilities are always co-indexed; the parameters are
/// recomputed together whenever the buffer target changes.
#[derive(Debug, Clone)]
pub struct BufferModel {
    ladder: BitrateLadder,
    utilities: Vec<f64>,
    params: ControlParameters,
    stable_buffer_time: f64,
    min_buffer_s: f64,
    min_buffer_per_level_s: f64,
}

impl BufferModel {
    /// Build the model, or `None` for a ladder with nothing to adapt between
    pub fn new(ladder: BitrateLadder, stable_buffer_time: f64, config: &AbrConfig) -> Option<Self> {
        let utilities = utilities_from_bitrates(ladder.rates());
        let params = ControlParameters::calculate(
            stable_buffer_time,
            &utilities,
            config.min_buffer_s,
            config.min_buffer_per_level_s,
        )?;
        Some(Self {
            ladder,
            utilities,
            params,
            stable_buffer_time,
            min_buffer_s: config.min_buffer_s,
            min_buffer_per_level_s: config.min_buffer_per_level_s,
        })
    }

    pub fn ladder(&self) -> &BitrateLadder {
        &self.ladder
    }

    pub fn utilities(&self) -> &[f64] {
        &self.utilities
    }

    pub fn params(&self) -> ControlParameters {
        self.params
    }

    pub fn min_buffer_s(&self) -> f64 {
        self.min_buffer_s
    }

    /// Recompute parameters for a new buffer target
    ///
    /// Returns the previous parameters when they changed, so callers can
    /// rescale anything expressed against the old curve.
    pub fn retarget(&mut self, stable_buffer_time: f64) -> Option<ControlParameters> {
        if stable_buffer_time == self.stable_buffer_time {
            return None;
        }
        let params = ControlParameters::calculate(
            stable_buffer_time,
            &self.utilities,
            self.min_buffer_s,
            self.min_buffer_per_level_s,
        )?;
        self.stable_buffer_time = stable_buffer_time;
        if params == self.params {
            return None;
        }
        tracing::info!(
            "Buffer target changed to {:.1}s: gp {:.4} -> {:.4}, vp {:.3} -> {:.3}",
            stable_buffer_time,
            self.params.gp,
            params.gp,
            self.params.vp,
            params.vp
        );
        Some(std::mem::replace(&mut self.params, params))
    }

    /// Quality with the best score at the given effective buffer level
    ///
    /// Ties go to the lower quality.
    pub fn quality_for_buffer_level(&self, buffer_level: f64) -> usize {
        let mut quality = 0;
        let mut best = f64::NEG_INFINITY;
        for (i, (&rate, &utility)) in self.ladder.rates().iter().zip(&self.utilities).enumerate() {
            let score = (self.params.vp * (utility + self.params.gp) - buffer_level) / rate;
            if score > best {
                best = score;
                quality = i;
            }
        }
        quality
    }

    /// Maximum buffer level at which downloading `quality` beats waiting
    pub fn max_buffer_level_for_quality(&self, quality: usize) -> f64 {
        self.params.vp * (self.utilities[quality] + self.params.gp)
    }

    /// Minimum buffer level at which `quality` beats every cheaper,
    /// strictly lower-utility rate
    pub fn min_buffer_level_for_quality(&self, quality: usize) -> f64 {
        let rates = self.ladder.rates();
        let q_rate = rates[quality];
        let q_utility = self.utilities[quality];

        let mut min = 0.0_f64;
        for i in (0..quality).rev() {
            let i_utility = self.utilities[i];
            if i_utility < q_utility {
                let i_rate = rates[i];
                let level = self.params.vp
                    * (self.params.gp + (q_rate * i_utility - i_rate * q_utility) / (q_rate - i_rate));
                min = min.max(level);
            }
        }
        min
    }
}
