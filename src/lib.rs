//! # lottie-engine
//!
//! Load Lottie animations (JSON or gzip-compressed `.tgs`) and render any
//! frame into a caller-owned pixel buffer on the CPU.
//!
//! ```no_run
//! use lottie_engine::{LottieAnimation, RenderOptions};
//!
//! let anim = LottieAnimation::from_file("loader.json")?;
//! let (w, h) = anim.size();
//! let mut buf = vec![0u8; (w * h * 4) as usize];
//! anim.render(anim.frame_at_pos(0.5), &mut buf)?;
//! anim.save_animation("loader.gif", &Default::default())?;
//! # let _ = RenderOptions::default();
//! # Ok::<(), lottie_engine::Error>(())
//! ```
//!
//! Buffers hold premultiplied BGRA pixels; see [`lottie_raster`] for the
//! exact layout and the clearing contract.

mod animation;
mod async_render;
mod error;
mod export;
mod options;
mod player;

pub use animation::LottieAnimation;
pub use async_render::PendingFrame;
pub use error::{Error, Result};
pub use export::to_rgba_image;
pub use options::{ExportOptions, LoadOptions, RenderOptions};
pub use player::LottiePlayer;

pub use lottie_core::{
    KeyPath, LottieError, Marker, ParseError, PropertyValue, RenderNode, RenderTree,
};
pub use lottie_raster::{Compose, Region, BYTES_PER_PIXEL};
