//! Buffer-based Bitrate Decision Engine for Segmented Streaming
//!
//! This crate decides which encoded quality a streaming client should fetch
//! next, per media type, from the buffer level and a throughput estimate. It
//! also tells the client when to hold off a request because the buffer is
//! already fuller than the chosen quality warrants.
//!
//! # Components
//!
//! - [`config`]: Engine configuration, loadable from TOML
//! - [`ladder`]: Bitrate ladder and the throughput-based quality rule
//! - [`params`]: Utilities and score-curve parameters derived from the ladder
//! - [`placeholder`]: Synthetic buffer credited for non-bandwidth delays
//! - [`decider`]: Steady-state strategies (buffer occupancy, drift-plus-penalty)
//! - [`simplex`]: Euclidean projection onto the probability simplex
//! - [`state`]: Per-media-type state machine
//! - [`engine`]: Decision entry point and player notifications

pub mod config;
pub mod decider;
pub mod engine;
pub mod error;
pub mod ladder;
pub mod params;
pub mod placeholder;
pub mod simplex;
pub mod state;

pub use config::{AbrConfig, DeciderKind, OptimizerConfig};
pub use decider::{
    BufferOccupancyDecider, DriftPlusPenaltyOptimizer, OptimizerState, QualityDecider,
    SteadyInputs,
};
pub use engine::{
    Decision, DecisionEngine, Diagnostics, MediaType, PlaybackContext, RequestKind,
    RequestMetric, SegmentLoaded, ThroughputEstimate,
};
pub use error::AbrError;
pub use ladder::BitrateLadder;
pub use params::{utilities_from_bitrates, BufferModel, ControlParameters, OptimizerParameters};
pub use placeholder::PlaceholderBuffer;
pub use simplex::project_onto_simplex;
pub use state::{AbrState, SegmentTiming};
