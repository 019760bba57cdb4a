//! Blur detection by Laplacian variance.
//!
//! The frame is converted to luma, filtered with a Laplacian kernel and
//! reduced to the mean and variance of the response. Edges produce large
//! positive and negative responses; blur attenuates them, so a low variance
//! means a blurry frame.
//!
//! The kernels run on a [`ComputeBackend`]. [`cpu::CpuBackend`] is the
//! reference implementation.

pub mod backend;
pub mod cpu;

use lumacheck_common::config::KernelKind;
use lumacheck_common::frame::Frame;
use serde::Serialize;
use tracing::{debug, trace};

pub use backend::{BufferId, ComputeBackend, DeviceContext, TextureId};
pub use cpu::CpuBackend;

use crate::error::MetricsError;
use crate::traits::FrameMetric;

/// Discrete Laplacian variants. Borders are sampled clamp-to-edge, so a
/// constant image has a zero response everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaplacianKernel {
    /// `[[0, 1, 0], [1, -4, 1], [0, 1, 0]]`
    #[default]
    FourNeighbor,
    /// `[[1, 1, 1], [1, -8, 1], [1, 1, 1]]`
    EightNeighbor,
}

impl From<KernelKind> for LaplacianKernel {
    fn from(kind: KernelKind) -> Self {
        match kind {
            KernelKind::FourNeighbor => LaplacianKernel::FourNeighbor,
            KernelKind::EightNeighbor => LaplacianKernel::EightNeighbor,
        }
    }
}

/// Mean and population variance of the Laplacian response, in luma units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarianceResult {
    pub mean: f64,
    pub variance: f64,
}

impl VarianceResult {
    /// The variance rounded to an integer, saturating at the `i64` range.
    pub fn as_integer(&self) -> i64 {
        // Float-to-int `as` casts saturate.
        self.variance.round() as i64
    }
}

/// Runs the Laplacian + mean/variance pipeline for one frame at a time.
///
/// Each call opens its own device context; the estimator itself holds no
/// per-frame state.
#[derive(Debug, Clone)]
pub struct SharpnessEstimator<B> {
    backend: B,
    kernel: LaplacianKernel,
}

impl<B: ComputeBackend> SharpnessEstimator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            kernel: LaplacianKernel::default(),
        }
    }

    pub fn with_kernel(mut self, kernel: LaplacianKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn kernel(&self) -> LaplacianKernel {
        self.kernel
    }

    /// Compute the Laplacian variance of `frame`. Lower means blurrier.
    ///
    /// Blocks until the backend has finished. Any device or allocation
    /// failure aborts the whole computation.
    pub fn estimate(&self, frame: &Frame) -> Result<VarianceResult, MetricsError> {
        if frame.is_empty() {
            return Err(MetricsError::InvalidInput(format!(
                "cannot compute sharpness of a {}x{} frame",
                frame.width(),
                frame.height()
            )));
        }

        let mut ctx = self.backend.open()?;
        trace!(backend = self.backend.name(), "device context opened");

        let source = ctx.load_frame(frame)?;
        let filtered = ctx.create_texture(frame.width(), frame.height())?;
        let stats = ctx.create_stats_buffer()?;

        ctx.encode_laplacian(source, filtered, self.kernel)?;
        ctx.encode_mean_and_variance(filtered, stats)?;
        ctx.commit_and_wait()?;

        let [mean, variance] = ctx.read_stats(stats)?;
        debug!(
            backend = self.backend.name(),
            width = frame.width(),
            height = frame.height(),
            kernel = ?self.kernel,
            mean,
            variance,
            "laplacian variance"
        );
        Ok(VarianceResult { mean, variance })
    }
}

impl<B: ComputeBackend> FrameMetric for SharpnessEstimator<B> {
    type Output = VarianceResult;

    fn measure(&self, frame: &Frame) -> Result<VarianceResult, MetricsError> {
        self.estimate(frame)
    }

    fn name(&self) -> &str {
        "sharpness"
    }
}
