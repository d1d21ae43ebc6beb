use super::{QualityDecider, SteadyInputs};

/// Buffer-occupancy heuristic
///
/// Picks the quality with the best score at the effective buffer level, then
/// refuses to climb above what throughput sustains unless the previous
/// quality was already that high. When bandwidth sits between two rates this
/// keeps to the lower one instead of oscillating.
#[derive(Debug, Clone, Default)]
pub struct BufferOccupancyDecider;

impl BufferOccupancyDecider {
    pub fn new() -> Self {
        Self
    }
}

impl QualityDecider for BufferOccupancyDecider {
    fn name(&self) -> &'static str {
        "buffer_occupancy"
    }

    fn choose_quality(&mut self, inputs: &SteadyInputs<'_>) -> usize {
        let quality = inputs.model.quality_for_buffer_level(inputs.effective_buffer_level);

        // only intervene on an increase to an unsustainable level, and never
        // drop below the last quality
        if quality > inputs.last_quality && quality > inputs.throughput_quality {
            return inputs.throughput_quality.max(inputs.last_quality);
        }
        quality
    }
}
