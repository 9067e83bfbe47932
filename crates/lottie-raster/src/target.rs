//! Destination buffers.
//!
//! Pixels are 4 bytes, premultiplied, in the byte order B, G, R, A (a
//! little-endian `u32` reads as `0xAARRGGBB`). Row `r` of the target
//! region starts at byte `r * bytes_per_line`; bytes between the end of a
//! row and the next row start are never touched.

use lottie_core::{LottieError, Result};

use crate::canvas::Canvas;
use crate::coverage::PixelRect;

pub const BYTES_PER_PIXEL: usize = 4;

/// A sub-rectangle of the full frame, in frame pixels. The buffer's first
/// pixel is the region's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// How rendered pixels meet what the buffer already holds. The engine
/// never clears on its own; `Replace` overwrites the region with the frame
/// (composited over transparent), `Over` draws the frame on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compose {
    #[default]
    Replace,
    Over,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTarget {
    /// Whole frame when `None`.
    pub region: Option<Region>,
    /// `region width * 4` when `None`.
    pub bytes_per_line: Option<usize>,
    pub compose: Compose,
}

/// A target checked against a frame size and a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub region: PixelRect,
    pub stride: usize,
    pub compose: Compose,
}

/// Smallest buffer that holds `height` rows of `width` pixels `stride` apart.
pub fn required_len(width: u32, height: u32, stride: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    stride * (height as usize - 1) + width as usize * BYTES_PER_PIXEL
}

impl RenderTarget {
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_bytes_per_line(mut self, bytes_per_line: usize) -> Self {
        self.bytes_per_line = Some(bytes_per_line);
        self
    }

    pub fn with_compose(mut self, compose: Compose) -> Self {
        self.compose = compose;
        self
    }

    /// Validate against a `frame_width` x `frame_height` frame and a buffer
    /// of `buffer_len` bytes. Nothing is written when this fails.
    pub(crate) fn layout(&self, frame_width: u32, frame_height: u32, buffer_len: usize) -> Result<Layout> {
        let region = self
            .region
            .unwrap_or(Region::new(0, 0, frame_width, frame_height));
        if region.width == 0 || region.height == 0 {
            return Err(LottieError::invalid_target(format!(
                "region {}x{} is empty",
                region.width, region.height
            )));
        }
        let fits = |start: u32, len: u32, limit: u32| {
            start.checked_add(len).is_some_and(|end| end <= limit)
        };
        if !fits(region.x, region.width, frame_width) || !fits(region.y, region.height, frame_height) {
            return Err(LottieError::invalid_target(format!(
                "region {}x{}+{}+{} is outside the {}x{} frame",
                region.width, region.height, region.x, region.y, frame_width, frame_height
            )));
        }

        let row = region.width as usize * BYTES_PER_PIXEL;
        let stride = self.bytes_per_line.unwrap_or(row);
        if stride < row {
            return Err(LottieError::invalid_target(format!(
                "{stride} bytes per line cannot hold {} pixels",
                region.width
            )));
        }
        let needed = required_len(region.width, region.height, stride);
        if buffer_len < needed {
            return Err(LottieError::invalid_target(format!(
                "buffer holds {buffer_len} bytes, {needed} needed"
            )));
        }

        Ok(Layout {
            region: PixelRect::new(
                region.x as i32,
                region.y as i32,
                (region.x + region.width) as i32,
                (region.y + region.height) as i32,
            ),
            stride,
            compose: self.compose,
        })
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Layout {
    /// Write `canvas` (which covers exactly `self.region`) into `buffer`.
    pub fn write(&self, canvas: &Canvas, buffer: &mut [u8]) {
        debug_assert_eq!(canvas.bounds(), self.region);
        let width = self.region.width();
        for (r, src_row) in canvas.pixels().chunks_exact(width).enumerate() {
            let start = r * self.stride;
            let dst_row = &mut buffer[start..start + width * BYTES_PER_PIXEL];
            for (px, dst) in src_row.iter().zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL)) {
                let [r, g, b, a] = match self.compose {
                    Compose::Replace => *px,
                    Compose::Over => {
                        let inv = 1.0 - px[3];
                        let under = |c: u8| c as f32 / 255.0 * inv;
                        [
                            px[0] + under(dst[2]),
                            px[1] + under(dst[1]),
                            px[2] + under(dst[0]),
                            px[3] + under(dst[3]),
                        ]
                    }
                };
                let a8 = quantize(a);
                dst[0] = quantize(b).min(a8);
                dst[1] = quantize(g).min(a8);
                dst[2] = quantize(r).min(a8);
                dst[3] = a8;
            }
        }
    }
}
