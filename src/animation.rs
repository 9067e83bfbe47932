use std::fs;
use std::path::Path;
use std::sync::Arc;

use lottie_core::{
    Document, ImageResolver, Marker, PropertyOverrides, PropertyValue, RenderTree,
    SceneGraphBuilder,
};
use tracing::debug;

use crate::error::Result;
use crate::options::{LoadOptions, RenderOptions};

/// Resolves external image assets against a directory, trying `u/p`
/// first and then `p` alone.
struct DirResolver<'a> {
    root: Option<&'a Path>,
}

impl ImageResolver for DirResolver<'_> {
    fn resolve(&self, dir: &str, file: &str) -> Option<Vec<u8>> {
        let root = self.root?;
        [root.join(dir).join(file), root.join(file)]
            .iter()
            .find_map(|path| fs::read(path).ok())
    }
}

/// A loaded animation.
///
/// The compiled document never changes after load and is shared, so
/// clones are cheap and any number of frames may be rendered at once
/// from different threads. Property overrides belong to each handle.
#[derive(Debug, Clone)]
pub struct LottieAnimation {
    document: Arc<Document>,
    overrides: Arc<PropertyOverrides>,
}

impl LottieAnimation {
    /// Load from JSON, or gzip-compressed JSON such as a `.tgs` sticker.
    pub fn from_data(data: &[u8]) -> Result<Self> {
        Self::from_data_with_options(data, &LoadOptions::default())
    }

    pub fn from_data_with_options(data: &[u8], options: &LoadOptions) -> Result<Self> {
        let resolver = DirResolver {
            root: options.resource_dir.as_deref(),
        };
        let document = Document::from_bytes(data, &resolver)?;
        debug!(
            width = document.width,
            height = document.height,
            frame_rate = document.frame_rate,
            total_frames = document.total_frames(),
            "loaded animation"
        );
        Ok(Self::from_document(document))
    }

    /// Load a file; external images are looked up next to it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let options = LoadOptions {
            resource_dir: path.parent().map(Path::to_path_buf),
        };
        Self::from_data_with_options(&data, &options)
    }

    /// Telegram stickers are gzip-wrapped Lottie; loading detects the
    /// compression by itself.
    pub fn from_tgs(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(path)
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            document: Arc::new(document),
            overrides: Arc::new(PropertyOverrides::new()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Declared composition size in pixels.
    pub fn size(&self) -> (u32, u32) {
        let px = |v: f32| v.round().max(0.0) as u32;
        (px(self.document.width), px(self.document.height))
    }

    /// Seconds.
    pub fn duration(&self) -> f32 {
        self.document.duration()
    }

    pub fn frame_rate(&self) -> f32 {
        self.document.frame_rate
    }

    pub fn total_frames(&self) -> usize {
        self.document.total_frames()
    }

    /// Frame shown at `pos` through the animation, `pos` clamped to `[0, 1]`.
    pub fn frame_at_pos(&self, pos: f32) -> usize {
        let pos = if pos.is_nan() { 0.0 } else { pos.clamp(0.0, 1.0) };
        (pos * (self.total_frames() - 1) as f32).round() as usize
    }

    pub fn markers(&self) -> &[Marker] {
        &self.document.markers
    }

    /// Replace a property on every item matching `keypath` for all later
    /// renders from this handle.
    pub fn set_property_override(&mut self, keypath: &str, value: PropertyValue) {
        Arc::make_mut(&mut self.overrides).set(keypath, value);
    }

    pub fn clear_property_overrides(&mut self) {
        Arc::make_mut(&mut self.overrides).clear();
    }

    /// Immutable snapshot of what `frame` draws, at the document size.
    pub fn render_tree(&self, frame: usize) -> Result<RenderTree> {
        let (w, h) = self.size();
        self.render_tree_sized(frame, w, h)
    }

    pub fn render_tree_sized(&self, frame: usize, width: u32, height: u32) -> Result<RenderTree> {
        build_tree(&self.document, &self.overrides, frame, width, height)
    }

    /// Render `frame` into `buffer` at the document size. See
    /// [`lottie_raster`] for the pixel format.
    pub fn render(&self, frame: usize, buffer: &mut [u8]) -> Result<()> {
        self.render_with(frame, buffer, &RenderOptions::default())
    }

    /// Render with an explicit viewport, stride or sub-region. On error
    /// the buffer is untouched.
    pub fn render_with(&self, frame: usize, buffer: &mut [u8], options: &RenderOptions) -> Result<()> {
        render_frame(&self.document, &self.overrides, frame, buffer, options)
    }

    /// Render into a freshly allocated, tightly packed buffer.
    pub fn render_to_vec(&self, frame: usize, options: &RenderOptions) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; options.buffer_len(self.size())];
        self.render_with(frame, &mut buffer, options)?;
        Ok(buffer)
    }

    pub(crate) fn shared(&self) -> (Arc<Document>, Arc<PropertyOverrides>) {
        (self.document.clone(), self.overrides.clone())
    }
}

fn build_tree(
    document: &Document,
    overrides: &PropertyOverrides,
    frame: usize,
    width: u32,
    height: u32,
) -> Result<RenderTree> {
    let tree = SceneGraphBuilder::new(document)
        .with_overrides(overrides)
        .build_sized(frame as f32, width as f32, height as f32)?;
    Ok(tree)
}

pub(crate) fn render_frame(
    document: &Document,
    overrides: &PropertyOverrides,
    frame: usize,
    buffer: &mut [u8],
    options: &RenderOptions,
) -> Result<()> {
    let size = (
        document.width.round().max(0.0) as u32,
        document.height.round().max(0.0) as u32,
    );
    let (width, height) = options.viewport(size);
    let tree = build_tree(document, overrides, frame, width, height)?;
    lottie_raster::render(&tree, buffer, &options.target())?;
    Ok(())
}
