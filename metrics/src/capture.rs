use lumacheck_common::frame::Frame;
use serde::Serialize;
use tracing::info;

use crate::error::MetricsError;
use crate::sharpness::{ComputeBackend, SharpnessEstimator, VarianceResult};

/// Outcome of the sharpness check on a captured still.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureDecision {
    Accept,
    Retake,
}

/// When to ask for a retake.
///
/// There is no built-in blur threshold: without `min_variance` every capture
/// is accepted and the variance is only reported.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CapturePolicy {
    pub min_variance: Option<f64>,
}

impl CapturePolicy {
    pub fn new(min_variance: Option<f64>) -> Self {
        Self { min_variance }
    }

    pub fn decide(&self, result: &VarianceResult) -> CaptureDecision {
        match self.min_variance {
            Some(min) if result.variance < min => CaptureDecision::Retake,
            _ => CaptureDecision::Accept,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureAssessment {
    pub sharpness: VarianceResult,
    pub decision: CaptureDecision,
}

/// Run the sharpness estimator on a captured still and apply `policy`.
pub fn assess_capture<B: ComputeBackend>(
    estimator: &SharpnessEstimator<B>,
    policy: &CapturePolicy,
    frame: &Frame,
) -> Result<CaptureAssessment, MetricsError> {
    let sharpness = estimator.estimate(frame)?;
    let decision = policy.decide(&sharpness);
    info!(
        seq = frame.seq,
        variance = format!("{:.2}", sharpness.variance),
        min_variance = ?policy.min_variance,
        ?decision,
        "capture assessed"
    );
    Ok(CaptureAssessment { sharpness, decision })
}
