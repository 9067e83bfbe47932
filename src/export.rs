//! Image adapter and animated-image encoders.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use lottie_core::LottieError;
use lottie_raster::BYTES_PER_PIXEL;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::animation::LottieAnimation;
use crate::error::{Error, Result};
use crate::options::{ExportOptions, RenderOptions};

/// Highest frame rate most GIF decoders play back faithfully.
const GIF_MAX_FPS: f32 = 50.0;

/// Convert a tightly packed premultiplied BGRA buffer into straight-alpha
/// RGBA.
pub fn to_rgba_image(buffer: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    let needed = width as usize * height as usize * BYTES_PER_PIXEL;
    let Some(src) = buffer.get(..needed) else {
        return Err(LottieError::invalid_target(format!(
            "buffer holds {} bytes, a {width}x{height} image needs {needed}",
            buffer.len()
        ))
        .into());
    };
    let mut rgba = Vec::with_capacity(needed);
    for px in src.chunks_exact(BYTES_PER_PIXEL) {
        let a = px[3] as u32;
        let straight = |c: u8| {
            if a == 0 {
                0
            } else {
                ((c as u32 * 255 + a / 2) / a).min(255) as u8
            }
        };
        rgba.extend_from_slice(&[straight(px[2]), straight(px[1]), straight(px[0]), px[3]]);
    }
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| LottieError::invalid_target("image buffer size mismatch").into())
}

enum Format {
    Gif,
    Apng,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "gif" => Ok(Format::Gif),
        "png" | "apng" => Ok(Format::Apng),
        _ => Err(Error::UnsupportedFormat(ext)),
    }
}

impl LottieAnimation {
    /// Render `frame` scaled to `width` x `height` as a straight-alpha image.
    pub fn render_image(&self, frame: usize, width: u32, height: u32) -> Result<RgbaImage> {
        let buffer = self.render_to_vec(frame, &RenderOptions::sized(width, height))?;
        to_rgba_image(&buffer, width, height)
    }

    /// Save one frame at the document size; the format follows the file
    /// extension.
    pub fn save_frame(&self, path: impl AsRef<Path>, frame: usize) -> Result<()> {
        let (w, h) = self.size();
        self.render_image(frame, w, h)?.save(path.as_ref())?;
        Ok(())
    }

    /// Write an animated GIF or PNG.
    ///
    /// WebP is rejected with [`Error::UnsupportedFormat`]: the `image`
    /// WebP encoder only writes single lossless frames. Single WebP frames
    /// go through [`LottieAnimation::save_frame`].
    ///
    /// The output holds `floor(duration * fps)` frames; output frame `k`
    /// shows [`LottieAnimation::frame_at_pos`] of `k / end`, where `end` is
    /// the end of the exported range.
    pub fn save_animation(&self, path: impl AsRef<Path>, options: &ExportOptions) -> Result<()> {
        let path = path.as_ref();
        let format = format_of(path)?;

        let fps = match (options.fps, &format) {
            (Some(fps), _) => fps,
            (None, Format::Gif) => self.frame_rate().min(GIF_MAX_FPS),
            (None, Format::Apng) => self.frame_rate(),
        };
        if !(fps.is_finite() && fps > 0.0) {
            return Err(LottieError::invalid_target(format!("export frame rate {fps}")).into());
        }

        let count = ((self.duration() * fps).floor() as usize).max(1);
        let (start, end) = options.frame_range.unwrap_or((0, count));
        if start >= end {
            return Err(LottieError::invalid_target(format!(
                "frame range {start}..{end} is empty"
            ))
            .into());
        }

        let (doc_w, doc_h) = self.size();
        let (w, h) = (options.width.unwrap_or(doc_w), options.height.unwrap_or(doc_h));
        debug!(?path, fps, start, end, w, h, "exporting animation");

        let frames = (start..end)
            .into_par_iter()
            .map(|k| self.render_image(self.frame_at_pos(k as f32 / end as f32), w, h))
            .collect::<Result<Vec<_>>>()?;

        let file = BufWriter::new(File::create(path)?);
        let loops = options.loop_count.unwrap_or(0);
        match format {
            Format::Gif => write_gif(file, frames, fps, loops)?,
            Format::Apng => write_apng(file, &frames, w, h, fps, loops)?,
        }

        info!(path = %path.display(), frames = end - start, fps, "exported animation");
        Ok(())
    }
}

fn write_gif<W: Write>(out: W, frames: Vec<RgbaImage>, fps: f32, loops: u16) -> Result<()> {
    let delay = Delay::from_saturating_duration(Duration::from_secs_f32(1.0 / fps));
    let mut encoder = GifEncoder::new(out);
    encoder.set_repeat(if loops == 0 {
        Repeat::Infinite
    } else {
        Repeat::Finite(loops)
    })?;
    encoder.encode_frames(frames.into_iter().map(|img| Frame::from_parts(img, 0, 0, delay)))?;
    Ok(())
}

fn write_apng<W: Write>(
    out: W,
    frames: &[RgbaImage],
    width: u32,
    height: u32,
    fps: f32,
    loops: u16,
) -> Result<()> {
    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_animated(frames.len() as u32, loops as u32)?;
    // delay is numerator / denominator seconds
    let denominator = (fps * 100.0).round().clamp(1.0, u16::MAX as f32) as u16;
    encoder.set_frame_delay(100, denominator)?;
    encoder.set_dispose_op(png::DisposeOp::Background)?;
    encoder.set_blend_op(png::BlendOp::Source)?;

    let mut writer = encoder.write_header()?;
    for frame in frames {
        writer.write_image_data(frame.as_raw())?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiplies_and_swizzles() {
        // half-transparent red, transparent, opaque blue
        let buf = [0, 0, 128, 128, 0, 0, 0, 0, 255, 0, 0, 255];
        let img = to_rgba_image(&buf, 3, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 128]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(2, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(to_rgba_image(&[0; 7], 2, 1).is_err());
    }

    #[test]
    fn formats_by_extension() {
        assert!(matches!(format_of(Path::new("a.GIF")), Ok(Format::Gif)));
        assert!(matches!(format_of(Path::new("a.apng")), Ok(Format::Apng)));
        assert!(matches!(
            format_of(Path::new("a.webm")),
            Err(Error::UnsupportedFormat(ext)) if ext == "webm"
        ));
        assert!(matches!(
            format_of(Path::new("a.webp")),
            Err(Error::UnsupportedFormat(ext)) if ext == "webp"
        ));
    }
}
