//! CPU rasterizer and compositor for Lottie render trees.
//!
//! # Pixel format
//!
//! Output pixels are 32-bit premultiplied BGRA: byte 0 is blue, then
//! green, red and alpha, so each pixel read as a little-endian `u32` is
//! `0xAARRGGBB`. Colour channels never exceed alpha. Channels are
//! quantized with `round(v * 255)`.
//!
//! The renderer never clears a buffer by itself. With [`Compose::Replace`]
//! every pixel of the target region is overwritten with the frame
//! composited over transparent black; with [`Compose::Over`] the frame is
//! drawn over what the region already holds. Rendering into a sub-region
//! is a clip plus an offset: the region's top-left frame pixel lands at
//! byte 0 and rows are `bytes_per_line` apart.
//!
//! Anti-aliasing uses exact horizontal coverage on five sample lines per
//! pixel row, with curves flattened to a quarter of a device pixel.

mod canvas;
mod composite;
mod coverage;
mod paint;
mod render;
mod stroke;
mod target;

pub use render::CpuRenderer;
pub use target::{required_len, Compose, Region, RenderTarget, BYTES_PER_PIXEL};

use lottie_core::{RenderTree, Result};

/// Rasterize `tree` into `buffer` with a fresh [`CpuRenderer`].
pub fn render(tree: &RenderTree, buffer: &mut [u8], target: &RenderTarget) -> Result<()> {
    CpuRenderer::new().draw(tree, buffer, target)
}
