use lottie_raster::{required_len, Compose, Region, RenderTarget, BYTES_PER_PIXEL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Directory that external image assets are resolved against.
    pub resource_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_resource_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: Some(dir.into()),
        }
    }
}

/// Destination geometry for one render call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Viewport size; the document is scaled to fill it. Defaults to the
    /// document size.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes_per_line: Option<usize>,
    /// Part of the viewport to write; the whole viewport when `None`.
    pub region: Option<Region>,
    pub compose: Compose,
}

impl RenderOptions {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

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

    pub fn viewport(&self, document: (u32, u32)) -> (u32, u32) {
        (
            self.width.unwrap_or(document.0),
            self.height.unwrap_or(document.1),
        )
    }

    pub(crate) fn target(&self) -> RenderTarget {
        RenderTarget {
            region: self.region,
            bytes_per_line: self.bytes_per_line,
            compose: self.compose,
        }
    }

    /// Bytes a buffer needs to receive a render with these options.
    pub fn buffer_len(&self, document: (u32, u32)) -> usize {
        let (w, h) = match self.region {
            Some(r) => (r.width, r.height),
            None => self.viewport(document),
        };
        let stride = self
            .bytes_per_line
            .unwrap_or(w as usize * BYTES_PER_PIXEL);
        required_len(w, h, stride)
    }
}

/// Settings for [`crate::LottieAnimation::save_animation`]. Deserializes
/// from JSON with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Output frame rate. Defaults to the document's, capped at 50 for GIF.
    pub fps: Option<f32>,
    /// Half-open range of output frame numbers to write.
    pub frame_range: Option<(usize, usize)>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Number of times to play; `None` or `0` loops forever.
    pub loop_count: Option<u16>,
}

impl ExportOptions {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
