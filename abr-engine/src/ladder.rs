//! Bitrate ladder for one media type
//!
//! The ladder is the ordered list of encoded rates a media type offers, from
//! lowest to highest. Quality indices used everywhere else in the crate are
//! 0-based positions into this list.

use std::time::Duration;

use crate::error::AbrError;

/// Ascending list of encoded rates in bits per second
#[derive(Debug, Clone, PartialEq)]
pub struct BitrateLadder {
    rates: Vec<f64>,
}

impl BitrateLadder {
    /// Create a ladder from rates in bits per second
    ///
    /// Rates must be finite, positive and in non-decreasing order.
    pub fn new(rates: Vec<f64>) -> Result<Self, AbrError> {
        if rates.is_empty() {
            return Err(AbrError::InvalidLadder("ladder has no rates".into()));
        }
        if let Some(bad) = rates.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(AbrError::InvalidLadder(format!(
                "rate must be finite and positive, got {}",
                bad
            )));
        }
        if rates.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(AbrError::InvalidLadder(
                "rates must be in ascending order".into(),
            ));
        }
        Ok(Self { rates })
    }

    /// Create a ladder from rates in kbps
    pub fn from_kbps(rates: &[u32]) -> Result<Self, AbrError> {
        Self::new(rates.iter().map(|&r| r as f64 * 1000.0).collect())
    }

    /// Rates in bits per second, lowest first
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Rate for a quality index, in bits per second
    pub fn rate(&self, quality: usize) -> Option<f64> {
        self.rates.get(quality).copied()
    }

    /// Number of qualities in the ladder
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Always false; a ladder holds at least one rate
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Index of the highest quality
    pub fn top_index(&self) -> usize {
        self.rates.len() - 1
    }

    /// Highest quality sustainable at the given throughput
    ///
    /// Latency is charged against the segment duration when one is known: a
    /// request whose latency eats the whole segment gets the lowest quality,
    /// otherwise throughput is scaled down by the dead-time ratio.
    pub fn quality_for_bitrate(
        &self,
        throughput_bps: f64,
        latency: Duration,
        segment_duration_s: Option<f64>,
    ) -> usize {
        if !throughput_bps.is_finite() || throughput_bps <= 0.0 {
            return 0;
        }

        let mut throughput = throughput_bps;
        let latency_s = latency.as_secs_f64();
        if let Some(duration) = segment_duration_s.filter(|d| d.is_finite() && *d > 0.0) {
            if latency_s > 0.0 {
                if latency_s >= duration {
                    return 0;
                }
                throughput *= 1.0 - latency_s / duration;
            }
        }

        self.rates
            .iter()
            .rposition(|&rate| throughput >= rate)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mbps_ladder() -> BitrateLadder {
        BitrateLadder::new(vec![1_000_000.0, 2_000_000.0, 4_000_000.0]).unwrap()
    }

    #[test]
    fn test_rejects_empty_ladder() {
        assert!(matches!(
            BitrateLadder::new(Vec::new()),
            Err(AbrError::InvalidLadder(_))
        ));
    }

    #[test]
    fn test_rejects_descending_or_invalid_rates() {
        assert!(BitrateLadder::new(vec![2.0, 1.0]).is_err());
        assert!(BitrateLadder::new(vec![1.0, f64::NAN]).is_err());
        assert!(BitrateLadder::new(vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_from_kbps() {
        let ladder = BitrateLadder::from_kbps(&[500, 1000]).unwrap();
        assert_eq!(ladder.rates(), &[500_000.0, 1_000_000.0]);
        assert_eq!(ladder.top_index(), 1);
    }

    #[test]
    fn test_quality_for_bitrate_picks_highest_sustainable() {
        let ladder = mbps_ladder();
        assert_eq!(ladder.quality_for_bitrate(2_500_000.0, Duration::ZERO, None), 1);
        assert_eq!(ladder.quality_for_bitrate(4_000_000.0, Duration::ZERO, None), 2);
        assert_eq!(ladder.quality_for_bitrate(900_000.0, Duration::ZERO, None), 0);
        assert_eq!(ladder.quality_for_bitrate(f64::NAN, Duration::ZERO, None), 0);
    }

    #[test]
    fn test_latency_reduces_effective_throughput() {
        let ladder = mbps_ladder();
        // 4.5 Mbps with 1s latency on 4s segments leaves 3.375 Mbps
        let quality = ladder.quality_for_bitrate(4_500_000.0, Duration::from_secs(1), Some(4.0));
        assert_eq!(quality, 1);

        // latency longer than a segment always falls back to the lowest quality
        let quality = ladder.quality_for_bitrate(40_000_000.0, Duration::from_secs(5), Some(4.0));
        assert_eq!(quality, 0);

        // without a known segment duration latency is ignored
        let quality = ladder.quality_for_bitrate(4_500_000.0, Duration::from_secs(1), None);
        assert_eq!(quality, 2);
    }
}
