use lumacheck_common::frame::Frame;

use super::LaplacianKernel;
use crate::error::MetricsError;

/// Handle to a single-channel image owned by a [`DeviceContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Handle to a two-element `{mean, variance}` result buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) usize);

/// A compute device able to run the Laplacian and mean/variance kernels.
///
/// `open` is called once per estimator invocation; contexts are never shared
/// between invocations, so command ordering on a context is never contended.
pub trait ComputeBackend: Send + Sync {
    type Context: DeviceContext;

    /// Acquire the device and a command submission channel.
    ///
    /// Fails with [`MetricsError::Initialization`] when no usable device
    /// exists. Callers should treat that as a permanent capability absence.
    fn open(&self) -> Result<Self::Context, MetricsError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Device resources and the pending command list of one invocation.
///
/// Commands are only recorded by the `encode_*` methods; nothing runs until
/// [`DeviceContext::commit_and_wait`].
pub trait DeviceContext {
    /// Upload a frame as a luma texture with the frame's dimensions.
    fn load_frame(&mut self, frame: &Frame) -> Result<TextureId, MetricsError>;

    /// Allocate a writable texture.
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, MetricsError>;

    /// Allocate a two-element result buffer.
    fn create_stats_buffer(&mut self) -> Result<BufferId, MetricsError>;

    /// Record a Laplacian filter from `src` into `dst`. Both must have the same size.
    fn encode_laplacian(
        &mut self,
        src: TextureId,
        dst: TextureId,
        kernel: LaplacianKernel,
    ) -> Result<(), MetricsError>;

    /// Record a mean/variance reduction of `src` into `dst`.
    fn encode_mean_and_variance(&mut self, src: TextureId, dst: BufferId) -> Result<(), MetricsError>;

    /// Execute every recorded command in order and block until all finish.
    fn commit_and_wait(&mut self) -> Result<(), MetricsError>;

    /// Copy a result buffer back to host memory as `[mean, variance]`.
    fn read_stats(&self, buffer: BufferId) -> Result<[f64; 2], MetricsError>;
}
