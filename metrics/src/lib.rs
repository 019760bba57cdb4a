//! Per-frame image metrics for a camera capture loop.
//!
//! - [`brightness`]: BT.601 luma average, the input of the "too dark" indicator.
//! - [`sharpness`]: Laplacian variance through a compute backend, the input of
//!   the accept/retake decision for a captured still.

pub mod brightness;
pub mod capture;
pub mod error;
pub mod exposure;
pub mod sharpness;
pub mod traits;

pub use brightness::{estimate_brightness, BrightnessEstimator, BrightnessScore};
pub use capture::{assess_capture, CaptureAssessment, CaptureDecision, CapturePolicy};
pub use error::MetricsError;
pub use exposure::{BrightnessThreshold, Indicator};
pub use sharpness::{SharpnessEstimator, VarianceResult};
pub use traits::FrameMetric;
