//! Document model, keyframe interpolation and scene building for Lottie
//! animations.
//!
//! A [`Document`] is compiled once from JSON and never changes. Each frame
//! is turned into an immutable [`RenderTree`] by [`SceneGraphBuilder`];
//! rasterizing the tree is left to another crate.

pub mod animatable;
pub mod document;
pub mod error;
pub mod geometry;
pub mod gradient;
pub mod keypath;
pub mod renderer;
pub mod scene;
pub mod trim;

pub use animatable::{Easing, Interpolatable, Keyframe, Track};
pub use document::{
    CompId, Composition, Document, EmbeddedOnly, ImageId, ImageResolver, LayerContent, LayerId,
    LayerRecord, Marker,
};
pub use error::{LottieError, Result};
pub use keypath::{KeyPath, PropertyKind, PropertyOverrides, PropertyValue};
pub use renderer::*;
pub use scene::{compose_transform, SceneGraphBuilder};
pub use trim::{TrimMode, TrimRange};

pub use lottie_data::ParseError;
