//! Placeholder buffer
//!
//! A synthetic buffer added to the real buffer level before scoring. It
//! absorbs delays that are not caused by bandwidth (live segment
//! availability, the scheduler declining to fetch) and segment downloads that
//! did not grow the real buffer, so neither pushes quality down.

use std::time::Duration;

use crate::params::{BufferModel, ControlParameters};

/// Synthetic buffer in seconds, never negative
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderBuffer {
    seconds: f64,
}

impl PlaceholderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Set the value, clamping to zero and discarding non-finite input
    pub fn set(&mut self, seconds: f64) {
        self.seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    pub fn reset(&mut self) {
        self.seconds = 0.0;
    }

    /// Credit time that passed without a bandwidth-bound download
    pub fn add_idle_time(&mut self, idle: Duration) {
        self.set(self.seconds + idle.as_secs_f64());
    }

    /// Seed the placeholder so the effective buffer reaches `target`
    pub fn fill_to(&mut self, target: f64, buffer_level: f64) {
        self.set(target - buffer_level);
    }

    /// Never let the effective buffer exceed `limit`
    pub fn cap(&mut self, limit: f64, buffer_level: f64) {
        let max = (limit - buffer_level).max(0.0);
        self.set(self.seconds.min(max));
    }

    /// Account for one completed segment download
    ///
    /// Decays the placeholder, then caps it against the highest buffer at which
    /// `quality` would still have been chosen, estimated at request time. A
    /// replacement segment that did not advance playback credits its duration.
    pub fn on_segment_completed(
        &mut self,
        model: &BufferModel,
        decay: f64,
        quality: usize,
        buffer_level: f64,
        download_time: Option<Duration>,
        replacement_duration: Option<f64>,
    ) {
        self.set(self.seconds * decay);

        if let Some(download_time) = download_time {
            let buffer_at_request = buffer_level + download_time.as_secs_f64();
            self.cap(model.max_buffer_level_for_quality(quality), buffer_at_request);
        }

        if let Some(duration) = replacement_duration {
            self.set(self.seconds + duration);
        }
    }

    /// Convert any effective buffer above what `quality` warrants into a delay
    ///
    /// The placeholder is drained first; the remainder, in seconds, is
    /// returned as the time the next request should wait.
    pub fn take_excess(&mut self, model: &BufferModel, quality: usize, buffer_level: f64) -> f64 {
        let excess = buffer_level + self.seconds - model.max_buffer_level_for_quality(quality);
        let excess = if excess.is_finite() { excess.max(0.0) } else { 0.0 };

        if excess <= self.seconds {
            self.set(self.seconds - excess);
            0.0
        } else {
            let delay = excess - self.seconds;
            self.reset();
            delay
        }
    }

    /// Shrink after an abandoned download, never growing
    ///
    /// Deflates to the point where the fallback quality is only just chosen,
    /// or to the minimum buffer when falling back to the lowest quality.
    pub fn deflate_for_abandonment(
        &mut self,
        model: &BufferModel,
        fallback_quality: Option<usize>,
        buffer_level: f64,
    ) {
        let want = match fallback_quality {
            Some(q) if q > 0 && q < model.ladder().len() => model.min_buffer_level_for_quality(q),
            _ => model.min_buffer_s(),
        };
        self.cap(want, buffer_level);
    }

    /// Keep the effective buffer fixed at the minimum-buffer anchor while
    /// the score curve is stretched from `old` to `new`
    pub fn rescale(
        &mut self,
        old: ControlParameters,
        new: ControlParameters,
        min_buffer_s: f64,
        buffer_level: f64,
    ) {
        let effective = buffer_level + self.seconds;
        let rescaled = (effective - min_buffer_s) * (new.vp / old.vp) + min_buffer_s;
        self.set(rescaled - buffer_level);
    }
}
