use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Byte order of the channels inside one pixel.
///
/// Camera pipelines commonly hand out BGRA buffers while decoders produce
/// RGB(A), so a frame always declares its layout and readers locate the
/// R, G and B bytes through it instead of assuming fixed offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Argb8,
}

impl PixelLayout {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 | PixelLayout::Argb8 => 4,
        }
    }

    /// Byte offsets of the (red, green, blue) channels within a pixel.
    pub const fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => (0, 1, 2),
            PixelLayout::Bgr8 | PixelLayout::Bgra8 => (2, 1, 0),
            PixelLayout::Argb8 => (1, 2, 3),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelLayout::Rgb8 => "rgb8",
            PixelLayout::Bgr8 => "bgr8",
            PixelLayout::Rgba8 => "rgba8",
            PixelLayout::Bgra8 => "bgra8",
            PixelLayout::Argb8 => "argb8",
        }
    }
}

/// A decoded image frame with 8 bits per channel.
///
/// Rows may be padded: `bytes_per_row` is at least `width * bytes_per_pixel`
/// and the bytes past the last pixel of each row are never read.
///
/// Zero-area frames can be constructed; the estimators reject them.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    bytes_per_row: usize,
    data: Vec<u8>,
    /// Unix millis at capture time, if known.
    pub captured_at_ms: Option<i64>,
    /// Position of the frame in its stream.
    pub seq: u64,
}

impl Frame {
    /// Create a tightly packed frame.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, FrameError> {
        let bytes_per_row = row_bytes(width, layout).ok_or(FrameError::TooLarge {
            width,
            height,
            bytes_per_row: None,
        })?;
        Self::with_stride(width, height, layout, bytes_per_row, data)
    }

    /// Create a frame whose rows are `bytes_per_row` bytes apart.
    pub fn with_stride(
        width: u32,
        height: u32,
        layout: PixelLayout,
        bytes_per_row: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let too_large = FrameError::TooLarge {
            width,
            height,
            bytes_per_row: Some(bytes_per_row),
        };
        let min_row = row_bytes(width, layout).ok_or(too_large.clone())?;
        if bytes_per_row < min_row {
            return Err(FrameError::StrideTooSmall {
                stride: bytes_per_row,
                min: min_row,
            });
        }

        // The last row only needs to hold its pixels, not the padding.
        let needed = match height {
            0 => 0,
            h => bytes_per_row
                .checked_mul(h as usize - 1)
                .and_then(|n| n.checked_add(min_row))
                .ok_or(too_large)?,
        };
        if data.len() < needed {
            return Err(FrameError::BufferTooShort {
                got: data.len(),
                expected: needed,
            });
        }

        Ok(Self {
            width,
            height,
            layout,
            bytes_per_row,
            data,
            captured_at_ms: None,
            seq: 0,
        })
    }

    /// Fill a `width x height` frame with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            bytes_per_row: width as usize * 3,
            data,
            captured_at_ms: None,
            seq: 0,
        }
    }

    /// Convert a decoded image into an RGBA frame.
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            bytes_per_row: width as usize * 4,
            data: rgba.into_raw(),
            captured_at_ms: None,
            seq: 0,
        }
    }

    /// Decode an encoded image (JPEG, PNG, ...), guessing the format from its bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))?;
        Ok(Self::from_image(&img))
    }

    /// Attach stream metadata.
    pub fn with_meta(mut self, seq: u64, captured_at_ms: i64) -> Self {
        self.seq = seq;
        self.captured_at_ms = Some(captured_at_ms);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Number of pixels (`width * height`).
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// The pixel bytes of row `y`, without padding.
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.bytes_per_row;
        let len = self.width as usize * self.layout.bytes_per_pixel();
        &self.data[start..start + len]
    }

    /// Iterate over the rows of the frame, padding stripped.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }

    /// The (r, g, b) values of the pixel at `(x, y)`.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let (ro, go, bo) = self.layout.rgb_offsets();
        let px = &self.row(y)[x as usize * self.layout.bytes_per_pixel()..];
        [px[ro], px[go], px[bo]]
    }
}

/// Bytes in one row of pixels, `None` on overflow.
fn row_bytes(width: u32, layout: PixelLayout) -> Option<usize> {
    (width as usize).checked_mul(layout.bytes_per_pixel())
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    #[error("row stride {stride} is smaller than the {min} bytes one row of pixels needs")]
    StrideTooSmall { stride: usize, min: usize },
    #[error("frame buffer too short: got {got} bytes, expected at least {expected}")]
    BufferTooShort { got: usize, expected: usize },
    #[error("{width}x{height} frame (stride {bytes_per_row:?}) overflows the address space")]
    TooLarge {
        width: u32,
        height: u32,
        bytes_per_row: Option<usize>,
    },
    #[error("failed to decode image: {0}")]
    Decode(String),
}
