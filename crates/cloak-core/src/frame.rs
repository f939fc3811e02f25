use cloak_detection::color::rgb_to_bgr;
use image::RgbImage;
use ndarray::{Array2, ArrayView2, Axis};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
// A camera image in device (B, G, R) channel order, indexed (row, column).
pub struct Frame {
    pixels: Array2<[u8; 3]>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer size doesn't match: expected {expected} bytes, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("provided dimensions are zero")]
    ZeroDimensions,
}

impl Frame {
    // Validates buffer size against dimensions and builds a frame from
    // packed RGB bytes, reordering each pixel to BGR.
    pub fn from_rgb(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::from_packed(width, height, data, rgb_to_bgr)
    }

    // Same as `from_rgb` for bytes already in BGR order.
    pub fn from_bgr(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::from_packed(width, height, data, |px| px)
    }

    fn from_packed(
        width: u32,
        height: u32,
        data: &[u8],
        to_bgr: impl Fn([u8; 3]) -> [u8; 3],
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions);
        }

        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidDimensions {
                expected,
                actual: data.len(),
            });
        }

        let pixels: Vec<[u8; 3]> = data
            .chunks_exact(3)
            .map(|p| to_bgr([p[0], p[1], p[2]]))
            .collect();
        let pixels = Array2::from_shape_vec((height as usize, width as usize), pixels)
            .map_err(|_| FrameError::InvalidDimensions {
                expected,
                actual: data.len(),
            })?;
        Ok(Self { pixels })
    }

    // Output of the compositor always has the live frame's (non-zero) shape.
    pub(crate) fn from_composite(pixels: Array2<[u8; 3]>) -> Self {
        Self { pixels }
    }

    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        Self {
            pixels: Array2::from_elem((height.max(1) as usize, width.max(1) as usize), bgr),
        }
    }

    // Frame streamed while no camera is available: dark gray with a red
    // border and a red cross.
    pub fn placeholder(width: u32, height: u32) -> Self {
        const BACKDROP: [u8; 3] = [32, 32, 32];
        const ALERT: [u8; 3] = [40, 40, 220];

        let mut frame = Self::filled(width, height, BACKDROP);
        let (rows, cols) = frame.pixels.dim();
        let border = (rows.min(cols) / 40).max(1);
        for ((y, x), px) in frame.pixels.indexed_iter_mut() {
            let on_border =
                y < border || x < border || y >= rows - border || x >= cols - border;
            let dx = x * rows;
            let dy = y * cols;
            let on_cross = dx.abs_diff(dy) < border * cols
                || dx.abs_diff((rows - 1 - y) * cols) < border * cols;
            if on_border || on_cross {
                *px = ALERT;
            }
        }
        frame
    }

    pub fn width(&self) -> u32 {
        self.pixels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.nrows() as u32
    }

    pub fn view(&self) -> ArrayView2<'_, [u8; 3]> {
        self.pixels.view()
    }

    // Returns the BGR pixel at (x, y) if inside bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.pixels.get((y as usize, x as usize)).copied()
    }

    // Horizontal flip, used to undo front camera mirroring.
    pub fn mirrored(&self) -> Frame {
        let mut pixels = self.pixels.clone();
        pixels.invert_axis(Axis(1));
        Frame {
            pixels: pixels.as_standard_layout().into_owned(),
        }
    }

    // Converts the frame into an 8-bit RGB image for encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let [b, g, r] = self.pixels[(y as usize, x as usize)];
            image::Rgb([r, g, b])
        })
    }
}
