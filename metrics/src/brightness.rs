use lumacheck_common::frame::Frame;
use serde::Serialize;
use tracing::trace;

use crate::error::MetricsError;
use crate::traits::FrameMetric;

/// ITU-R BT.601 luma weights for (R, G, B).
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Luma-weighted average over every pixel of a frame, in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BrightnessScore(pub f64);

impl BrightnessScore {
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Compute the mean BT.601 luma of a frame.
///
/// Channels are located through the frame's declared layout. Per-channel
/// totals are accumulated as integers and weighted once at the end, so the
/// score does not depend on the order pixels are visited in.
pub fn estimate_brightness(frame: &Frame) -> Result<BrightnessScore, MetricsError> {
    if frame.is_empty() {
        return Err(MetricsError::InvalidInput(format!(
            "cannot compute brightness of a {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let layout = frame.layout();
    let bpp = layout.bytes_per_pixel();
    let (ro, go, bo) = layout.rgb_offsets();

    let mut sums = [0u64; 3];
    for row in frame.rows() {
        for px in row.chunks_exact(bpp) {
            sums[0] += px[ro] as u64;
            sums[1] += px[go] as u64;
            sums[2] += px[bo] as u64;
        }
    }

    let weighted: f64 = sums
        .iter()
        .zip(LUMA_WEIGHTS)
        .map(|(&sum, w)| w * sum as f64)
        .sum();
    let score = weighted / frame.pixel_count() as f64;

    trace!(
        width = frame.width(),
        height = frame.height(),
        layout = layout.name(),
        score,
        "brightness"
    );
    Ok(BrightnessScore(score))
}

/// [`estimate_brightness`] as a [`FrameMetric`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BrightnessEstimator;

impl FrameMetric for BrightnessEstimator {
    type Output = BrightnessScore;

    fn measure(&self, frame: &Frame) -> Result<BrightnessScore, MetricsError> {
        estimate_brightness(frame)
    }

    fn name(&self) -> &str {
        "brightness"
    }
}
