//! Decision engine
//!
//! The host calls [`DecisionEngine::decide`] before every segment request and
//! forwards player events through the `on_*` methods. All inputs come from a
//! single [`PlaybackContext`] supplied at construction; the engine owns every
//! piece of per-media-type state and takes `&mut self` for every call, so
//! decisions and notifications for a media type are always serialized.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::AbrConfig;
use crate::decider::SteadyInputs;
use crate::error::AbrError;
use crate::ladder::BitrateLadder;
use crate::params::BufferModel;
use crate::state::{AbrState, AdaptiveState, DecisionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Text,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Throughput snapshot for one media type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputEstimate {
    /// Smoothed average, bits per second
    pub average_bps: f64,
    /// Conservative estimate, bits per second
    pub safe_bps: f64,
    pub latency: Duration,
}

impl ThroughputEstimate {
    fn is_usable(&self) -> bool {
        self.average_bps.is_finite()
            && self.average_bps >= 0.0
            && self.safe_bps.is_finite()
            && self.safe_bps >= 0.0
    }
}

/// Everything the engine reads from the player
///
/// Implementations return pre-resolved values; none of these may block.
pub trait PlaybackContext {
    /// Ladder for a media type, or `None` if it is not known yet
    fn bitrate_ladder(&self, media_type: MediaType) -> Option<BitrateLadder>;

    /// Configured stable buffer target, in seconds
    fn stable_buffer_time(&self) -> f64;

    /// Real buffered media ahead of the playhead, in seconds
    fn buffer_level(&self, media_type: MediaType) -> f64;

    /// Throughput estimate, or `None` until enough samples exist
    fn throughput(&self, media_type: MediaType) -> Option<ThroughputEstimate>;

    /// Highest quality index the player currently allows
    fn top_quality_index(&self, media_type: MediaType) -> usize;

    fn now(&self) -> Instant;
}

/// A media segment finished loading
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLoaded {
    pub media_type: MediaType,
    /// Presentation start time, in seconds
    pub start: f64,
    pub duration_s: f64,
    pub quality: usize,
    /// Set when the host knows the segment replaced already-buffered media
    pub replacement: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    MediaSegment,
    InitSegment,
    Other,
}

/// Timing of a completed HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetric {
    pub media_type: MediaType,
    pub kind: RequestKind,
    pub request_time: Instant,
    pub finish_time: Instant,
}

/// Observability payload attached to every decision
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub state: Option<AbrState>,
    pub throughput_bps: Option<f64>,
    pub latency_s: Option<f64>,
    pub buffer_level_s: Option<f64>,
    pub placeholder_buffer_s: Option<f64>,
    pub delay_s: Option<f64>,
}

/// Result of one decision call
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Quality index to request, or `None` to keep the current one
    pub quality: Option<usize>,
    /// How long the host should hold off the next request
    pub delay: Duration,
    pub diagnostics: Diagnostics,
}

impl Decision {
    fn no_change(diagnostics: Diagnostics) -> Self {
        Self {
            quality: None,
            delay: Duration::ZERO,
            diagnostics,
        }
    }

    pub fn is_no_change(&self) -> bool {
        self.quality.is_none()
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis().try_into().unwrap_or(u64::MAX)
    }
}

/// Buffer-based bitrate decision engine
#[derive(Debug)]
pub struct DecisionEngine<C> {
    config: AbrConfig,
    context: C,
    states: HashMap<MediaType, DecisionState>,
}

impl<C: PlaybackContext> DecisionEngine<C> {
    /// Create an engine, rejecting an invalid config up front
    pub fn new(config: AbrConfig, context: C) -> Result<Self, AbrError> {
        config.validate()?;
        Ok(Self {
            config,
            context,
            states: HashMap::new(),
        })
    }

    pub fn config(&self) -> &AbrConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Current state for a media type, if a decision has been made for it
    pub fn state(&self, media_type: MediaType) -> Option<AbrState> {
        self.states.get(&media_type).map(DecisionState::state)
    }

    /// Current placeholder buffer for a media type, in seconds
    pub fn placeholder_buffer(&self, media_type: MediaType) -> Option<f64> {
        self.states
            .get(&media_type)
            .and_then(DecisionState::adaptive)
            .map(|s| s.placeholder.seconds())
    }

    /// Decide the quality for the next segment of `media_type`
    pub fn decide(&mut self, media_type: MediaType) -> Decision {
        let mut diagnostics = Diagnostics::default();
        if !self.config.enabled {
            return Decision::no_change(diagnostics);
        }

        let stable_buffer_time = self.context.stable_buffer_time();
        let buffer_level = sanitize_level(self.context.buffer_level(media_type));

        let state = match self.states.entry(media_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let Some(ladder) = self.context.bitrate_ladder(media_type) else {
                    tracing::warn!("No bitrate ladder for {}, keeping current quality", media_type);
                    return Decision::no_change(diagnostics);
                };
                entry.insert(initial_state(&self.config, ladder, stable_buffer_time, media_type))
            }
        };

        let Some(adaptive) = state.adaptive_mut() else {
            diagnostics.state = Some(AbrState::OneBitrate);
            return Decision::no_change(diagnostics);
        };

        if let Some(old) = adaptive.model.retarget(stable_buffer_time) {
            let new = adaptive.model.params();
            let min_buffer_s = adaptive.model.min_buffer_s();
            adaptive.placeholder.rescale(old, new, min_buffer_s, buffer_level);
        }

        diagnostics.state = Some(adaptive.phase);
        let Some(throughput) = self
            .context
            .throughput(media_type)
            .filter(ThroughputEstimate::is_usable)
        else {
            // still starting up
            return Decision::no_change(diagnostics);
        };
        diagnostics.throughput_bps = Some(throughput.average_bps);
        diagnostics.latency_s = Some(throughput.latency.as_secs_f64());

        match adaptive.phase {
            AbrState::Startup => {
                startup_decision(adaptive, media_type, &throughput, buffer_level, diagnostics)
            }
            AbrState::Steady => {
                let top_quality = self.context.top_quality_index(media_type);
                let now = self.context.now();
                steady_decision(
                    adaptive,
                    media_type,
                    &throughput,
                    buffer_level,
                    top_quality,
                    now,
                    diagnostics,
                )
            }
            AbrState::OneBitrate => {
                debug_assert!(false, "adaptive state for {} marked one-bitrate", media_type);
                tracing::warn!("Decision state for {} is inconsistent, restarting", media_type);
                let quality = adaptive.model.ladder().quality_for_bitrate(
                    throughput.safe_bps,
                    throughput.latency,
                    None,
                );
                adaptive.clear_on_seek();
                diagnostics.throughput_bps = Some(throughput.safe_bps);
                Decision {
                    quality: Some(quality),
                    delay: Duration::ZERO,
                    diagnostics,
                }
            }
        }
    }

    /// A segment finished loading
    pub fn on_segment_loaded(&mut self, event: &SegmentLoaded) {
        let buffer_level = sanitize_level(self.context.buffer_level(event.media_type));
        let decay = self.config.placeholder_decay;
        let Some(adaptive) = self
            .states
            .get_mut(&event.media_type)
            .and_then(DecisionState::adaptive_mut)
        else {
            return;
        };

        adaptive
            .timing
            .record_segment(event.start, event.duration_s, event.replacement);
        adaptive.last_quality = event.quality.min(adaptive.model.ladder().top_index());
        adaptive.check_new_segment(buffer_level, decay);
    }

    /// Request timing for a completed fetch; only media segments count
    pub fn on_metric_added(&mut self, metric: &RequestMetric) {
        if metric.kind != RequestKind::MediaSegment {
            return;
        }
        let buffer_level = sanitize_level(self.context.buffer_level(metric.media_type));
        let decay = self.config.placeholder_decay;
        let Some(adaptive) = self
            .states
            .get_mut(&metric.media_type)
            .and_then(DecisionState::adaptive_mut)
        else {
            return;
        };

        adaptive.timing.last_request = Some(metric.request_time);
        adaptive.timing.last_finish = Some(metric.finish_time);
        adaptive.check_new_segment(buffer_level, decay);
    }

    /// Remember a quality requested from outside, for use on abandonment
    pub fn on_quality_change_requested(&mut self, media_type: MediaType, quality: usize) {
        if let Some(adaptive) = self
            .states
            .get_mut(&media_type)
            .and_then(DecisionState::adaptive_mut)
        {
            adaptive.requested_quality = Some(quality);
        }
    }

    /// A segment download was abandoned; deflate the placeholder so the
    /// fallback quality is only just chosen
    pub fn on_abandoned(&mut self, media_type: MediaType) {
        let buffer_level = sanitize_level(self.context.buffer_level(media_type));
        if let Some(adaptive) = self
            .states
            .get_mut(&media_type)
            .and_then(DecisionState::adaptive_mut)
        {
            let fallback = adaptive.requested_quality;
            adaptive
                .placeholder
                .deflate_for_abandonment(&adaptive.model, fallback, buffer_level);
            tracing::debug!(
                "{} download abandoned, placeholder now {:.2}s",
                media_type,
                adaptive.placeholder.seconds()
            );
        }
    }

    /// Playback stalled; stop the placeholder from propping up quality
    pub fn on_buffer_empty(&mut self) {
        for adaptive in self.states.values_mut().filter_map(DecisionState::adaptive_mut) {
            if adaptive.phase == AbrState::Steady {
                adaptive.placeholder.reset();
            }
        }
    }

    /// Playback is seeking; every adaptive media type restarts
    pub fn on_seek(&mut self) {
        for (media_type, state) in self.states.iter_mut() {
            if let Some(adaptive) = state.adaptive_mut() {
                adaptive.clear_on_seek();
                tracing::info!("{} seeking, back to startup", media_type);
            }
        }
    }

    /// Drop all retained state, as at the end of a session
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

fn initial_state(
    config: &AbrConfig,
    ladder: BitrateLadder,
    stable_buffer_time: f64,
    media_type: MediaType,
) -> DecisionState {
    let rates = ladder.len();
    match BufferModel::new(ladder, stable_buffer_time, config) {
        Some(model) => {
            let decider = config.decider.build(&config.optimizer);
            tracing::info!(
                "{}: {} rates, {} decider, gp={:.4} vp={:.3}",
                media_type,
                rates,
                decider.name(),
                model.params().gp,
                model.params().vp
            );
            DecisionState::Adaptive(Box::new(AdaptiveState::new(model, decider)))
        }
        None => {
            tracing::info!("{}: single usable bitrate, adaptation disabled", media_type);
            DecisionState::OneBitrate
        }
    }
}

fn startup_decision(
    adaptive: &mut AdaptiveState,
    media_type: MediaType,
    throughput: &ThroughputEstimate,
    buffer_level: f64,
    mut diagnostics: Diagnostics,
) -> Decision {
    let quality = adaptive.model.ladder().quality_for_bitrate(
        throughput.safe_bps,
        throughput.latency,
        adaptive.timing.last_segment_duration_s,
    );

    let min_level = adaptive.model.min_buffer_level_for_quality(quality);
    adaptive.placeholder.fill_to(min_level, buffer_level);
    adaptive.last_quality = quality;

    if adaptive.try_enter_steady(buffer_level) {
        tracing::info!(
            "{} buffer primed at {:.1}s, entering steady state",
            media_type,
            buffer_level
        );
    }

    diagnostics.throughput_bps = Some(throughput.safe_bps);
    diagnostics.buffer_level_s = Some(buffer_level);
    diagnostics.placeholder_buffer_s = Some(adaptive.placeholder.seconds());
    Decision {
        quality: Some(quality),
        delay: Duration::ZERO,
        diagnostics,
    }
}

fn steady_decision(
    adaptive: &mut AdaptiveState,
    media_type: MediaType,
    throughput: &ThroughputEstimate,
    buffer_level: f64,
    top_quality: usize,
    now: Instant,
    mut diagnostics: Diagnostics,
) -> Decision {
    let segment_duration_s = adaptive.timing.last_segment_duration_s.unwrap_or(0.0);
    let throughput_quality = adaptive.model.ladder().quality_for_bitrate(
        throughput.safe_bps,
        throughput.latency,
        Some(segment_duration_s),
    );

    // the placeholder only props up the score; it cannot prevent a stall
    adaptive.credit_idle_time(now);

    let inputs = SteadyInputs {
        model: &adaptive.model,
        effective_buffer_level: buffer_level + adaptive.placeholder.seconds(),
        throughput_bps: throughput.average_bps,
        throughput_quality,
        last_quality: adaptive.last_quality,
        segment_duration_s,
    };
    let mut quality = adaptive.decider.choose_quality(&inputs);

    let ladder_len = adaptive.model.ladder().len();
    if quality >= ladder_len {
        debug_assert!(false, "{} returned quality {} for {} rates", adaptive.decider.name(), quality, ladder_len);
        tracing::warn!(
            "{} decider returned out-of-range quality {}, using throughput quality",
            media_type,
            quality
        );
        quality = throughput_quality;
    }

    let mut delay_s = adaptive
        .placeholder
        .take_excess(&adaptive.model, quality, buffer_level);
    if quality >= top_quality {
        // at top quality the scheduler decides how far to fill
        delay_s = 0.0;
    }
    adaptive.last_quality = quality;

    diagnostics.buffer_level_s = Some(buffer_level);
    diagnostics.placeholder_buffer_s = Some(adaptive.placeholder.seconds());
    diagnostics.delay_s = Some(delay_s);

    tracing::debug!(
        "{} steady: quality={} buffer={:.2}s placeholder={:.2}s delay={:.2}s",
        media_type,
        quality,
        buffer_level,
        adaptive.placeholder.seconds(),
        delay_s
    );

    Decision {
        quality: Some(quality),
        delay: Duration::try_from_secs_f64(delay_s).unwrap_or_default(),
        diagnostics,
    }
}

fn sanitize_level(level: f64) -> f64 {
    if level.is_finite() {
        level.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeciderKind;
    use crate::state::SegmentTiming;

    #[derive(Debug)]
    struct FakePlayer {
        ladder: Option<BitrateLadder>,
        stable_buffer_time: f64,
        buffer_level: f64,
        throughput: Option<ThroughputEstimate>,
        top_quality: usize,
        now: Instant,
    }

    impl FakePlayer {
        fn new(rates_mbps: &[f64], stable_buffer_time: f64) -> Self {
            let ladder =
                BitrateLadder::new(rates_mbps.iter().map(|r| r * 1_000_000.0).collect()).unwrap();
            Self {
                top_quality: ladder.top_index(),
                ladder: Some(ladder),
                stable_buffer_time,
                buffer_level: 0.0,
                throughput: Some(ThroughputEstimate {
                    average_bps: 3_000_000.0,
                    safe_bps: 2_500_000.0,
                    latency: Duration::from_millis(50),
                }),
                now: Instant::now(),
            }
        }
    }

    impl PlaybackContext for FakePlayer {
        fn bitrate_ladder(&self, _media_type: MediaType) -> Option<BitrateLadder> {
            self.ladder.clone()
        }

        fn stable_buffer_time(&self) -> f64 {
            self.stable_buffer_time
        }

        fn buffer_level(&self, _media_type: MediaType) -> f64 {
            self.buffer_level
        }

        fn throughput(&self, _media_type: MediaType) -> Option<ThroughputEstimate> {
            self.throughput
        }

        fn top_quality_index(&self, _media_type: MediaType) -> usize {
            self.top_quality
        }

        fn now(&self) -> Instant {
            self.now
        }
    }

    fn engine(player: FakePlayer) -> DecisionEngine<FakePlayer> {
        DecisionEngine::new(AbrConfig::default(), player).expect("default config is valid")
    }

    fn loaded(start: f64, quality: usize) -> SegmentLoaded {
        SegmentLoaded {
            media_type: MediaType::Video,
            start,
            duration_s: 2.0,
            quality,
            replacement: false,
        }
    }

    /// Drive a video engine from startup into steady state at quality 0
    fn primed(player: FakePlayer) -> DecisionEngine<FakePlayer> {
        let mut engine = engine(player);
        engine.decide(MediaType::Video);
        engine.on_segment_loaded(&loaded(0.0, 0));
        engine.decide(MediaType::Video);
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::Steady));
        engine
    }

    #[test]
    fn test_single_bitrate_is_always_no_change() {
        let mut engine = engine(FakePlayer::new(&[1.0], 20.0));
        for buffer in [0.0, 5.0, 50.0] {
            engine.context_mut().buffer_level = buffer;
            let decision = engine.decide(MediaType::Video);
            assert!(decision.is_no_change());
            assert_eq!(decision.delay, Duration::ZERO);
            assert_eq!(decision.diagnostics.state, Some(AbrState::OneBitrate));
        }
        engine.on_seek();
        engine.on_segment_loaded(&loaded(0.0, 0));
        assert!(engine.decide(MediaType::Video).is_no_change());
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::OneBitrate));
    }

    #[test]
    fn test_missing_ladder_is_no_change() {
        let mut player = FakePlayer::new(&[1.0, 2.0], 20.0);
        player.ladder = None;
        let mut engine = engine(player);
        assert!(engine.decide(MediaType::Video).is_no_change());
        assert_eq!(engine.state(MediaType::Video), None);
    }

    #[test]
    fn test_disabled_engine_is_no_change() {
        let config = AbrConfig {
            enabled: false,
            ..AbrConfig::default()
        };
        let mut engine = DecisionEngine::new(config, FakePlayer::new(&[1.0, 2.0], 20.0)).unwrap();
        assert!(engine.decide(MediaType::Video).is_no_change());
        assert_eq!(engine.state(MediaType::Video), None);
    }

    #[test]
    fn test_invalid_config_fails_at_construction() {
        let config = AbrConfig {
            min_buffer_s: 0.0,
            ..AbrConfig::default()
        };
        let result = DecisionEngine::new(config, FakePlayer::new(&[1.0, 2.0], 20.0));
        assert!(matches!(result, Err(AbrError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_throughput_stays_in_startup() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.throughput = None;
        let mut engine = engine(player);
        let decision = engine.decide(MediaType::Video);
        assert!(decision.is_no_change());
        assert_eq!(decision.diagnostics.state, Some(AbrState::Startup));
        assert_eq!(engine.placeholder_buffer(MediaType::Video), Some(0.0));

        engine.context_mut().throughput = Some(ThroughputEstimate {
            average_bps: f64::NAN,
            safe_bps: f64::NAN,
            latency: Duration::ZERO,
        });
        assert!(engine.decide(MediaType::Video).is_no_change());
        assert_eq!(engine.placeholder_buffer(MediaType::Video), Some(0.0));
    }

    #[test]
    fn test_startup_uses_safe_throughput_and_seeds_placeholder() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        let decision = engine.decide(MediaType::Video);
        assert_eq!(decision.quality, Some(1));
        assert_eq!(decision.diagnostics.throughput_bps, Some(2_500_000.0));
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::Startup));

        let state = engine.states.get(&MediaType::Video).and_then(DecisionState::adaptive).unwrap();
        let expected = state.model.min_buffer_level_for_quality(1);
        assert!((engine.placeholder_buffer(MediaType::Video).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_steady_never_climbs_past_sustainable_quality() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        let rates = [1_000_000.0, 2_000_000.0, 4_000_000.0];

        let first = engine.decide(MediaType::Video);
        assert_eq!(first.quality, Some(1));
        let mut last = 1;
        let mut steady_decisions = 0;

        for i in 0..40 {
            let request_time = engine.context().now;
            let download = Duration::from_secs_f64(2.0 * rates[last] / 3_000_000.0);
            engine.context_mut().now += download;
            let finish_time = engine.context().now;
            let buffer = engine.context().buffer_level;
            engine.context_mut().buffer_level = (buffer + 2.0).min(30.0);

            engine.on_segment_loaded(&loaded(2.0 * i as f64, last));
            engine.on_metric_added(&RequestMetric {
                media_type: MediaType::Video,
                kind: RequestKind::MediaSegment,
                request_time,
                finish_time,
            });
            engine.context_mut().now += Duration::from_millis(200);

            let decision = engine.decide(MediaType::Video);
            let quality = decision.quality.expect("throughput is known");
            if decision.diagnostics.state == Some(AbrState::Steady) {
                steady_decisions += 1;
                assert!(quality <= last.max(1), "step {}: {} after {}", i, quality, last);
            }
            assert!(engine.placeholder_buffer(MediaType::Video).unwrap() >= 0.0);
            last = quality;
        }
        assert!(steady_decisions > 30);
    }

    #[test]
    fn test_excess_buffer_becomes_pacing_delay() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 40.0;
        player.throughput = Some(ThroughputEstimate {
            average_bps: 600_000.0,
            safe_bps: 500_000.0,
            latency: Duration::ZERO,
        });
        let mut engine = primed(player);

        let decision = engine.decide(MediaType::Video);
        assert_eq!(decision.quality, Some(0));

        let state = engine.states.get(&MediaType::Video).and_then(DecisionState::adaptive).unwrap();
        let expected = 40.0 - state.model.max_buffer_level_for_quality(0);
        assert!((decision.delay.as_secs_f64() - expected).abs() < 1e-6);
        assert_eq!(decision.delay_ms(), decision.delay.as_millis() as u64);
        assert_eq!(decision.diagnostics.delay_s.map(|d| (d - expected).abs() < 1e-9), Some(true));
        assert_eq!(engine.placeholder_buffer(MediaType::Video), Some(0.0));
    }

    #[test]
    fn test_no_delay_at_top_quality() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 40.0;
        player.top_quality = 0;
        player.throughput = Some(ThroughputEstimate {
            average_bps: 600_000.0,
            safe_bps: 500_000.0,
            latency: Duration::ZERO,
        });
        let mut engine = primed(player);

        let decision = engine.decide(MediaType::Video);
        assert_eq!(decision.quality, Some(0));
        assert_eq!(decision.delay, Duration::ZERO);
    }

    #[test]
    fn test_seek_returns_to_startup_and_clears_timing() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 8.0;
        let mut engine = primed(player);
        engine.on_metric_added(&RequestMetric {
            media_type: MediaType::Video,
            kind: RequestKind::MediaSegment,
            request_time: engine.context().now,
            finish_time: engine.context().now + Duration::from_secs(1),
        });
        engine.context_mut().now += Duration::from_secs(2);
        engine.decide(MediaType::Video);

        engine.on_seek();
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::Startup));
        assert_eq!(engine.placeholder_buffer(MediaType::Video), Some(0.0));
        let state = engine.states.get(&MediaType::Video).and_then(DecisionState::adaptive).unwrap();
        assert_eq!(state.timing, SegmentTiming::default());
    }

    #[test]
    fn test_buffer_empty_only_clears_steady_placeholders() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 3.0;
        let mut engine = primed(player);
        engine.decide(MediaType::Audio);

        engine
            .states
            .get_mut(&MediaType::Video)
            .and_then(DecisionState::adaptive_mut)
            .unwrap()
            .placeholder
            .set(6.0);
        let audio_placeholder = engine.placeholder_buffer(MediaType::Audio).unwrap();
        assert!(audio_placeholder > 0.0);

        engine.on_buffer_empty();
        assert_eq!(engine.placeholder_buffer(MediaType::Video), Some(0.0));
        assert_eq!(engine.placeholder_buffer(MediaType::Audio), Some(audio_placeholder));
    }

    #[test]
    fn test_abandonment_deflates_to_requested_quality() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        engine.decide(MediaType::Video);

        let min_level = {
            let state = engine
                .states
                .get_mut(&MediaType::Video)
                .and_then(DecisionState::adaptive_mut)
                .unwrap();
            state.placeholder.set(30.0);
            state.model.min_buffer_level_for_quality(1)
        };
        let buffer_level = min_level - 5.0;
        engine.context_mut().buffer_level = buffer_level;

        engine.on_quality_change_requested(MediaType::Video, 1);
        engine.on_abandoned(MediaType::Video);

        let placeholder = engine.placeholder_buffer(MediaType::Video).unwrap();
        assert!(placeholder <= min_level - buffer_level + 1e-9);
        assert!(placeholder >= 0.0);
    }

    #[test]
    fn test_media_types_are_independent() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        engine.decide(MediaType::Video);
        engine.decide(MediaType::Audio);

        engine.on_segment_loaded(&SegmentLoaded {
            media_type: MediaType::Audio,
            ..loaded(0.0, 0)
        });
        engine.context_mut().buffer_level = 4.0;
        engine.decide(MediaType::Audio);

        assert_eq!(engine.state(MediaType::Audio), Some(AbrState::Steady));
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::Startup));
    }

    #[test]
    fn test_reset_drops_all_state() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        engine.decide(MediaType::Video);
        engine.decide(MediaType::Audio);
        engine.reset();
        assert_eq!(engine.state(MediaType::Video), None);
        assert_eq!(engine.placeholder_buffer(MediaType::Audio), None);

        // notifications for unknown media types are ignored
        engine.on_abandoned(MediaType::Video);
        engine.on_quality_change_requested(MediaType::Video, 1);
        assert_eq!(engine.state(MediaType::Video), None);
    }

    #[test]
    fn test_init_segment_metrics_are_ignored() {
        let mut engine = engine(FakePlayer::new(&[1.0, 2.0, 4.0], 20.0));
        engine.decide(MediaType::Video);
        engine.on_metric_added(&RequestMetric {
            media_type: MediaType::Video,
            kind: RequestKind::InitSegment,
            request_time: engine.context().now,
            finish_time: engine.context().now,
        });
        let state = engine.states.get(&MediaType::Video).and_then(DecisionState::adaptive).unwrap();
        assert!(state.timing.last_request.is_none());
    }

    #[test]
    fn test_optimizer_strategy_climbs_with_ample_throughput() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 10.0;
        player.throughput = Some(ThroughputEstimate {
            average_bps: 10_000_000.0,
            safe_bps: 9_000_000.0,
            latency: Duration::ZERO,
        });
        let config = AbrConfig::with_decider(DeciderKind::DriftPlusPenalty);
        let mut engine = DecisionEngine::new(config, player).unwrap();
        engine.decide(MediaType::Video);
        engine.on_segment_loaded(&loaded(0.0, 2));
        engine.decide(MediaType::Video);
        assert_eq!(engine.state(MediaType::Video), Some(AbrState::Steady));

        let mut quality = None;
        for _ in 0..50 {
            engine.context_mut().now += Duration::from_secs(2);
            quality = engine.decide(MediaType::Video).quality;
            assert!(quality.is_some_and(|q| q < 3));
        }
        assert_eq!(quality, Some(2));
    }

    #[test]
    fn test_buffer_target_change_rescales_placeholder() {
        let mut player = FakePlayer::new(&[1.0, 2.0, 4.0], 20.0);
        player.buffer_level = 6.0;
        let mut engine = engine(player);
        engine.decide(MediaType::Video);
        engine
            .states
            .get_mut(&MediaType::Video)
            .and_then(DecisionState::adaptive_mut)
            .unwrap()
            .placeholder
            .set(4.0);

        // effective buffer sits on the 10s anchor, so the rescale keeps it;
        // unknown throughput stops the startup reseed
        engine.context_mut().stable_buffer_time = 40.0;
        engine.context_mut().throughput = None;
        engine.decide(MediaType::Video);
        let placeholder = engine.placeholder_buffer(MediaType::Video).unwrap();
        assert!((placeholder - 4.0).abs() < 1e-9);
    }
}
