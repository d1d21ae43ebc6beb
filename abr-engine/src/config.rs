//! Configuration types for the bitrate decision engine

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decider::{BufferOccupancyDecider, DriftPlusPenaltyOptimizer, QualityDecider};
use crate::error::AbrError;
use crate::params::OptimizerParameters;

/// Strategy used once a media type reaches steady state
///
/// Both strategies share the same state machine, buffer model and
/// placeholder buffer; only the final quality choice differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeciderKind {
    /// Buffer-occupancy score curve with the oscillation clamp
    #[default]
    BufferOccupancy,

    /// Experimental drift-plus-penalty optimizer over the probability simplex
    DriftPlusPenalty,
}

impl DeciderKind {
    /// Build a fresh decider instance for one media type
    pub fn build(self, optimizer: &OptimizerConfig) -> Box<dyn QualityDecider> {
        match self {
            DeciderKind::BufferOccupancy => Box::new(BufferOccupancyDecider::new()),
            DeciderKind::DriftPlusPenalty => {
                Box::new(DriftPlusPenaltyOptimizer::new(optimizer.parameters()))
            }
        }
    }
}

/// Tuning for the drift-plus-penalty optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Optimization horizon in segments (default: 5)
    #[serde(default = "default_horizon")]
    pub horizon: f64,

    /// Buffer target driving the virtual queue, in seconds (default: 0.5)
    #[serde(default = "default_optimizer_target_buffer")]
    pub target_buffer_s: f64,
}

fn default_horizon() -> f64 {
    5.0
}

fn default_optimizer_target_buffer() -> f64 {
    0.5
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            target_buffer_s: default_optimizer_target_buffer(),
        }
    }
}

impl OptimizerConfig {
    /// Derive step size and growth bound from the horizon
    pub fn parameters(&self) -> OptimizerParameters {
        OptimizerParameters::from_horizon(self.horizon, self.target_buffer_s)
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbrConfig {
    /// Enable buffer-based decisions; when off every call is a no-op
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Steady-state quality strategy
    #[serde(default)]
    pub decider: DeciderKind,

    /// Buffer level (seconds) at which the lowest rate is preferred (default: 10)
    #[serde(default = "default_min_buffer")]
    pub min_buffer_s: f64,

    /// Extra buffer target per ladder level, in seconds (default: 2)
    #[serde(default = "default_min_buffer_per_level")]
    pub min_buffer_per_level_s: f64,

    /// Multiplier applied to the placeholder buffer on each completed segment (default: 0.99)
    #[serde(default = "default_placeholder_decay")]
    pub placeholder_decay: f64,

    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_min_buffer() -> f64 {
    10.0
}

fn default_min_buffer_per_level() -> f64 {
    2.0
}

fn default_placeholder_decay() -> f64 {
    0.99
}

impl Default for AbrConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            decider: DeciderKind::default(),
            min_buffer_s: default_min_buffer(),
            min_buffer_per_level_s: default_min_buffer_per_level(),
            placeholder_decay: default_placeholder_decay(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl AbrConfig {
    /// Default config using the given steady-state strategy
    pub fn with_decider(decider: DeciderKind) -> Self {
        Self {
            decider,
            ..Self::default()
        }
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, AbrError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from(path: &Path) -> Result<Self, AbrError> {
        if !path.exists() {
            return Err(AbrError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would make the buffer model or optimizer degenerate
    pub fn validate(&self) -> Result<(), AbrError> {
        if !(self.min_buffer_s.is_finite() && self.min_buffer_s > 0.0) {
            return Err(AbrError::InvalidConfig(format!(
                "min_buffer_s must be positive, got {}",
                self.min_buffer_s
            )));
        }
        if !(self.min_buffer_per_level_s.is_finite() && self.min_buffer_per_level_s > 0.0) {
            return Err(AbrError::InvalidConfig(format!(
                "min_buffer_per_level_s must be positive, got {}",
                self.min_buffer_per_level_s
            )));
        }
        if !(self.placeholder_decay > 0.0 && self.placeholder_decay < 1.0) {
            return Err(AbrError::InvalidConfig(format!(
                "placeholder_decay must lie in (0, 1), got {}",
                self.placeholder_decay
            )));
        }
        if !(self.optimizer.horizon.is_finite() && self.optimizer.horizon > 0.0) {
            return Err(AbrError::InvalidConfig(format!(
                "optimizer.horizon must be positive, got {}",
                self.optimizer.horizon
            )));
        }
        if !(self.optimizer.target_buffer_s.is_finite() && self.optimizer.target_buffer_s >= 0.0) {
            return Err(AbrError::InvalidConfig(format!(
                "optimizer.target_buffer_s must be non-negative, got {}",
                self.optimizer.target_buffer_s
            )));
        }
        Ok(())
    }
}
