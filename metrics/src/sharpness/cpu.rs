use lumacheck_common::frame::Frame;
use std::mem;
use tracing::{debug, trace};

use super::backend::{BufferId, ComputeBackend, DeviceContext, TextureId};
use super::LaplacianKernel;
use crate::brightness::LUMA_WEIGHTS;
use crate::error::MetricsError;

const TEXEL_BYTES: usize = mem::size_of::<f32>();
const STATS_BYTES: usize = 2 * mem::size_of::<f64>();

/// Reference backend running the kernels on the calling thread.
///
/// Device memory is host memory, optionally capped by a byte budget that
/// applies to each context separately.
#[derive(Debug, Clone, Default)]
pub struct CpuBackend {
    memory_limit: Option<usize>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the bytes a single invocation may allocate.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }
}

impl ComputeBackend for CpuBackend {
    type Context = CpuContext;

    fn open(&self) -> Result<CpuContext, MetricsError> {
        if self.memory_limit == Some(0) {
            return Err(MetricsError::Initialization(
                "cpu device has no usable memory".into(),
            ));
        }
        Ok(CpuContext {
            textures: Vec::new(),
            buffers: Vec::new(),
            commands: Vec::new(),
            allocated: 0,
            memory_limit: self.memory_limit,
        })
    }

    fn name(&self) -> &str {
        "cpu"
    }
}

#[derive(Debug)]
struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
    /// False until an upload or a filter pass has filled `data`.
    written: bool,
}

impl Plane {
    #[inline]
    fn at(&self, x: i64, y: i64) -> f64 {
        // Clamp-to-edge sampling.
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width as usize + x] as f64
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Laplacian {
        src: TextureId,
        dst: TextureId,
        kernel: LaplacianKernel,
    },
    MeanAndVariance {
        src: TextureId,
        dst: BufferId,
    },
}

/// Resources of one [`CpuBackend`] invocation.
#[derive(Debug)]
pub struct CpuContext {
    textures: Vec<Plane>,
    /// `None` until a reduction has written the buffer.
    buffers: Vec<Option<[f64; 2]>>,
    commands: Vec<Command>,
    allocated: usize,
    memory_limit: Option<usize>,
}

impl CpuContext {
    /// Bytes allocated so far by this context.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    fn reserve(&mut self, bytes: usize, what: &str) -> Result<(), MetricsError> {
        let total = self.allocated.checked_add(bytes).ok_or_else(|| {
            MetricsError::ResourceAllocation(format!("{what}: size overflows usize"))
        })?;
        if let Some(limit) = self.memory_limit {
            if total > limit {
                return Err(MetricsError::ResourceAllocation(format!(
                    "{what}: {bytes} bytes would exceed the {limit} byte budget ({} in use)",
                    self.allocated
                )));
            }
        }
        self.allocated = total;
        Ok(())
    }

    fn alloc_plane(&mut self, width: u32, height: u32, what: &str) -> Result<Vec<f32>, MetricsError> {
        let texels = width as usize * height as usize;
        let bytes = texels.checked_mul(TEXEL_BYTES).ok_or_else(|| {
            MetricsError::ResourceAllocation(format!("{what}: {width}x{height} is too large"))
        })?;
        self.reserve(bytes, what)?;

        let mut data = Vec::new();
        data.try_reserve_exact(texels)
            .map_err(|e| MetricsError::ResourceAllocation(format!("{what}: {e}")))?;
        Ok(data)
    }

    fn push_texture(&mut self, plane: Plane) -> TextureId {
        self.textures.push(plane);
        TextureId(self.textures.len() - 1)
    }

    fn texture(&self, id: TextureId) -> Result<&Plane, MetricsError> {
        self.textures
            .get(id.0)
            .ok_or_else(|| MetricsError::InvalidInput(format!("unknown texture handle {}", id.0)))
    }

    fn written_texture(&self, id: TextureId) -> Result<&Plane, MetricsError> {
        let plane = self.texture(id)?;
        if !plane.written {
            return Err(MetricsError::InvalidInput(format!(
                "texture {} was read before anything wrote it",
                id.0
            )));
        }
        Ok(plane)
    }

    fn check_buffer(&self, id: BufferId) -> Result<(), MetricsError> {
        if id.0 < self.buffers.len() {
            Ok(())
        } else {
            Err(MetricsError::InvalidInput(format!("unknown buffer handle {}", id.0)))
        }
    }

    fn record(&mut self, command: Command) -> Result<(), MetricsError> {
        self.commands
            .try_reserve(1)
            .map_err(|e| MetricsError::ResourceAllocation(format!("command list: {e}")))?;
        self.commands.push(command);
        Ok(())
    }

    fn run_laplacian(&mut self, src: TextureId, dst: TextureId, kernel: LaplacianKernel) -> Result<(), MetricsError> {
        self.written_texture(src)?;
        // Move the destination out so the source can be borrowed while writing.
        let mut out = mem::take(&mut self.textures[dst.0].data);
        out.clear();

        let plane = self.texture(src)?;
        let (w, h) = (plane.width as i64, plane.height as i64);
        for y in 0..h {
            for x in 0..w {
                let center = plane.at(x, y);
                let response = match kernel {
                    LaplacianKernel::FourNeighbor => {
                        plane.at(x, y - 1) + plane.at(x - 1, y) + plane.at(x + 1, y) + plane.at(x, y + 1)
                            - 4.0 * center
                    }
                    LaplacianKernel::EightNeighbor => {
                        let mut ring = 0.0;
                        for dy in -1..=1 {
                            for dx in -1..=1 {
                                if dx != 0 || dy != 0 {
                                    ring += plane.at(x + dx, y + dy);
                                }
                            }
                        }
                        ring - 8.0 * center
                    }
                };
                out.push(response as f32);
            }
        }

        let dst = &mut self.textures[dst.0];
        dst.data = out;
        dst.written = true;
        Ok(())
    }

    fn run_mean_and_variance(&mut self, src: TextureId, dst: BufferId) -> Result<(), MetricsError> {
        let plane = self.written_texture(src)?;
        let n = plane.data.len() as f64;

        let mean = plane.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = plane
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        self.buffers[dst.0] = Some([mean, variance]);
        Ok(())
    }
}

impl DeviceContext for CpuContext {
    fn load_frame(&mut self, frame: &Frame) -> Result<TextureId, MetricsError> {
        if frame.is_empty() {
            return Err(MetricsError::InvalidInput("cannot upload an empty frame".into()));
        }
        let (width, height) = (frame.width(), frame.height());
        let mut data = self.alloc_plane(width, height, "source texture")?;

        let layout = frame.layout();
        let bpp = layout.bytes_per_pixel();
        let (ro, go, bo) = layout.rgb_offsets();
        let [wr, wg, wb] = LUMA_WEIGHTS;
        for row in frame.rows() {
            for px in row.chunks_exact(bpp) {
                let luma = wr * px[ro] as f64 + wg * px[go] as f64 + wb * px[bo] as f64;
                data.push(luma as f32);
            }
        }

        trace!(width, height, layout = layout.name(), "uploaded source texture");
        Ok(self.push_texture(Plane {
            width,
            height,
            data,
            written: true,
        }))
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, MetricsError> {
        if width == 0 || height == 0 {
            return Err(MetricsError::ResourceAllocation(format!(
                "cannot create a {width}x{height} texture"
            )));
        }
        let data = self.alloc_plane(width, height, "texture")?;
        Ok(self.push_texture(Plane {
            width,
            height,
            data,
            written: false,
        }))
    }

    fn create_stats_buffer(&mut self) -> Result<BufferId, MetricsError> {
        self.reserve(STATS_BYTES, "stats buffer")?;
        self.buffers.push(None);
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn encode_laplacian(
        &mut self,
        src: TextureId,
        dst: TextureId,
        kernel: LaplacianKernel,
    ) -> Result<(), MetricsError> {
        if src == dst {
            return Err(MetricsError::InvalidInput(
                "laplacian cannot filter a texture in place".into(),
            ));
        }
        let (s, d) = (self.texture(src)?, self.texture(dst)?);
        if (s.width, s.height) != (d.width, d.height) {
            return Err(MetricsError::InvalidInput(format!(
                "laplacian size mismatch: source {}x{}, destination {}x{}",
                s.width, s.height, d.width, d.height
            )));
        }
        self.record(Command::Laplacian { src, dst, kernel })
    }

    fn encode_mean_and_variance(&mut self, src: TextureId, dst: BufferId) -> Result<(), MetricsError> {
        self.texture(src)?;
        self.check_buffer(dst)?;
        self.record(Command::MeanAndVariance { src, dst })
    }

    fn commit_and_wait(&mut self) -> Result<(), MetricsError> {
        let commands = mem::take(&mut self.commands);
        debug!(commands = commands.len(), "committing command list");
        for command in commands {
            match command {
                Command::Laplacian { src, dst, kernel } => self.run_laplacian(src, dst, kernel)?,
                Command::MeanAndVariance { src, dst } => self.run_mean_and_variance(src, dst)?,
            }
        }
        Ok(())
    }

    fn read_stats(&self, buffer: BufferId) -> Result<[f64; 2], MetricsError> {
        self.check_buffer(buffer)?;
        self.buffers[buffer.0].ok_or_else(|| {
            MetricsError::InvalidInput(format!(
                "stats buffer {} was read before any reduction wrote it",
                buffer.0
            ))
        })
    }
}
