//! The compiled, immutable document.
//!
//! Loading turns the serde model into an arena: every layer of every
//! composition lives in [`Document::layers`] and refers to its parent,
//! matte source and precomposition by index. Properties become typed
//! [`Track`]s, and anything the renderer cannot draw faithfully is
//! rejected here rather than dropped at render time.

use crate::animatable::{color_from, vec2_from, Track};
use crate::error::{LottieError, Result};
use crate::geometry::{PathShape, StarKind};
use crate::renderer::{
    BlendMode, FillRule, ImageData, LineCap, LineJoin, MaskMode, MatteMode, MergeMode,
};
use crate::trim::TrimMode;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use glam::{Vec2, Vec4};
use lottie_data::model::{self as data, LottieJson};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

/// Supplies the bytes of image assets that are not embedded as data URIs.
pub trait ImageResolver {
    /// `dir` is the asset's `u` field, `file` its `p` field.
    fn resolve(&self, dir: &str, file: &str) -> Option<Vec<u8>>;
}

/// Resolver for documents that must be self-contained.
pub struct EmbeddedOnly;

impl ImageResolver for EmbeddedOnly {
    fn resolve(&self, _dir: &str, _file: &str) -> Option<Vec<u8>> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub name: Option<String>,
    pub version: Option<String>,
    pub width: f32,
    pub height: f32,
    pub frame_rate: f32,
    pub in_point: f32,
    pub out_point: f32,
    pub layers: Vec<LayerRecord>,
    /// Index 0 is the root composition.
    pub compositions: Vec<Composition>,
    pub images: Vec<Arc<ImageData>>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub start_frame: f32,
    pub end_frame: f32,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub id: String,
    /// Document order: the first entry is the topmost layer.
    pub layers: Vec<LayerId>,
    /// Frame span covered by the composition's layers.
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Clone)]
pub struct LayerRecord {
    pub name: Option<String>,
    pub index: Option<u32>,
    pub hidden: bool,
    pub parent: Option<LayerId>,
    pub in_point: f32,
    pub out_point: f32,
    pub start_time: f32,
    pub time_stretch: f32,
    pub transform: TransformTracks,
    pub auto_orient: bool,
    pub blend_mode: BlendMode,
    pub masks: Vec<MaskTrack>,
    /// Matte mode and the layer supplying it, when the source exists.
    pub matte: Option<(MatteMode, Option<LayerId>)>,
    /// Only drawn through the layer that uses it as a matte.
    pub is_matte_source: bool,
    pub content: LayerContent,
}

impl LayerRecord {
    pub fn is_visible_at(&self, frame: f32) -> bool {
        !self.hidden && frame >= self.in_point && frame < self.out_point
    }
}

#[derive(Debug, Clone)]
pub enum LayerContent {
    Null,
    Shape(Vec<ShapeItem>),
    Precomp {
        comp: CompId,
        time_remap: Option<Track<f32>>,
        width: f32,
        height: f32,
    },
    Solid {
        color: Vec4,
        width: f32,
        height: f32,
    },
    Image {
        image: ImageId,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone)]
pub enum PositionTrack {
    Unified(Track<Vec2>),
    Split(Track<f32>, Track<f32>),
}

impl PositionTrack {
    pub fn value_at(&self, frame: f32) -> Result<Vec2> {
        match self {
            PositionTrack::Unified(t) => t.value_at(frame),
            PositionTrack::Split(x, y) => Ok(Vec2::new(x.value_at(frame)?, y.value_at(frame)?)),
        }
    }

    pub fn is_animated(&self) -> bool {
        match self {
            PositionTrack::Unified(t) => t.is_animated(),
            PositionTrack::Split(x, y) => x.is_animated() || y.is_animated(),
        }
    }
}

/// Scale is a factor (1.0 = 100%), opacity 0..1, angles in degrees.
#[derive(Debug, Clone)]
pub struct TransformTracks {
    pub anchor: Track<Vec2>,
    pub position: PositionTrack,
    pub scale: Track<Vec2>,
    pub rotation: Track<f32>,
    pub skew: Track<f32>,
    pub skew_axis: Track<f32>,
    pub opacity: Track<f32>,
}

impl Default for TransformTracks {
    fn default() -> Self {
        Self {
            anchor: Track::constant(Vec2::ZERO),
            position: PositionTrack::Unified(Track::constant(Vec2::ZERO)),
            scale: Track::constant(Vec2::ONE),
            rotation: Track::constant(0.0),
            skew: Track::constant(0.0),
            skew_axis: Track::constant(0.0),
            opacity: Track::constant(1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaskTrack {
    pub name: Option<String>,
    pub mode: MaskMode,
    pub inverted: bool,
    pub path: Track<PathShape>,
    pub opacity: Track<f32>,
}

#[derive(Debug, Clone)]
pub enum ShapeItem {
    Group(GroupItem),
    Rect {
        name: Option<String>,
        position: Track<Vec2>,
        size: Track<Vec2>,
        radius: Track<f32>,
    },
    Ellipse {
        name: Option<String>,
        position: Track<Vec2>,
        size: Track<Vec2>,
    },
    Polystar(PolystarItem),
    Path {
        name: Option<String>,
        path: Track<PathShape>,
    },
    Fill(FillItem),
    Stroke(StrokeItem),
    GradientFill(GradientFillItem),
    GradientStroke(GradientStrokeItem),
    Trim {
        start: Track<f32>,
        end: Track<f32>,
        offset: Track<f32>,
        mode: TrimMode,
    },
    Repeater(RepeaterItem),
    RoundCorners {
        radius: Track<f32>,
    },
    Merge {
        mode: MergeMode,
    },
}

#[derive(Debug, Clone)]
pub struct GroupItem {
    pub name: Option<String>,
    pub items: Vec<ShapeItem>,
    pub transform: Option<TransformTracks>,
}

#[derive(Debug, Clone)]
pub struct PolystarItem {
    pub name: Option<String>,
    pub kind: StarKind,
    pub position: PositionTrack,
    pub points: Track<f32>,
    pub rotation: Track<f32>,
    pub outer_radius: Track<f32>,
    pub outer_roundness: Track<f32>,
    pub inner_radius: Track<f32>,
    pub inner_roundness: Track<f32>,
}

#[derive(Debug, Clone)]
pub struct FillItem {
    pub name: Option<String>,
    pub color: Track<Vec4>,
    pub opacity: Track<f32>,
    pub rule: FillRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashKind {
    Dash,
    Gap,
    Offset,
}

#[derive(Debug, Clone)]
pub struct DashTrack {
    pub kind: DashKind,
    pub length: Track<f32>,
}

#[derive(Debug, Clone)]
pub struct StrokeStyle {
    pub width: Track<f32>,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub dashes: Vec<DashTrack>,
}

#[derive(Debug, Clone)]
pub struct StrokeItem {
    pub name: Option<String>,
    pub color: Track<Vec4>,
    pub opacity: Track<f32>,
    pub style: StrokeStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientKind {
    Linear,
    Radial,
}

#[derive(Debug, Clone)]
pub struct GradientTracks {
    pub kind: GradientKind,
    pub start: Track<Vec2>,
    pub end: Track<Vec2>,
    /// Highlight length in percent of the radius, radial only.
    pub highlight_length: Track<f32>,
    pub highlight_angle: Track<f32>,
    pub color_count: usize,
    pub stops: Track<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct GradientFillItem {
    pub name: Option<String>,
    pub gradient: GradientTracks,
    pub opacity: Track<f32>,
    pub rule: FillRule,
}

#[derive(Debug, Clone)]
pub struct GradientStrokeItem {
    pub name: Option<String>,
    pub gradient: GradientTracks,
    pub opacity: Track<f32>,
    pub style: StrokeStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeaterOrder {
    Above,
    Below,
}

#[derive(Debug, Clone)]
pub struct RepeaterItem {
    pub name: Option<String>,
    pub copies: Track<f32>,
    pub offset: Track<f32>,
    pub order: RepeaterOrder,
    pub transform: TransformTracks,
    pub start_opacity: Track<f32>,
    pub end_opacity: Track<f32>,
}

impl Document {
    pub const ROOT: CompId = CompId(0);

    /// Parse and compile raw (or gzip-wrapped) JSON.
    pub fn from_bytes(bytes: &[u8], images: &dyn ImageResolver) -> Result<Self> {
        let model = lottie_data::parse(bytes)?;
        Self::compile(&model, images)
    }

    pub fn compile(model: &LottieJson, images: &dyn ImageResolver) -> Result<Self> {
        if model.ddd == Some(1) {
            return Err(LottieError::unsupported("3d composition", "document"));
        }

        let mut compiler = Compiler {
            resolver: images,
            assets: model.assets.iter().map(|a| (a.id.as_str(), a)).collect(),
            layers: Vec::new(),
            compositions: Vec::new(),
            comp_ids: HashMap::new(),
            visiting: Vec::new(),
            images: Vec::new(),
            image_ids: HashMap::new(),
            canvas: Vec2::new(model.w as f32, model.h as f32),
        };
        let root = compiler.composition("__root__", &model.layers, Some((model.ip, model.op)))?;
        debug_assert_eq!(root, Document::ROOT);

        let compositions = compiler
            .compositions
            .into_iter()
            .map(|c| c.ok_or_else(|| LottieError::parse("composition left unfinished")))
            .collect::<Result<Vec<_>>>()?;

        let markers = model
            .markers
            .iter()
            .map(|m| {
                let start = m.tm.unwrap_or(0.0);
                Marker {
                    name: m.cm.clone().unwrap_or_default(),
                    start_frame: start,
                    end_frame: start + m.dr.unwrap_or(0.0),
                }
            })
            .collect();

        debug!(
            layers = compiler.layers.len(),
            compositions = compositions.len(),
            images = compiler.images.len(),
            "compiled document {:?}",
            model.nm.as_deref().unwrap_or("")
        );

        Ok(Document {
            name: model.nm.clone(),
            version: model.v.clone(),
            width: model.w as f32,
            height: model.h as f32,
            frame_rate: model.fr,
            in_point: model.ip,
            out_point: model.op,
            layers: compiler.layers,
            compositions,
            images: compiler.images,
            markers,
        })
    }

    /// `round(op - ip)`, never less than one.
    pub fn total_frames(&self) -> usize {
        (self.out_point - self.in_point).round().max(1.0) as usize
    }

    /// Seconds.
    pub fn duration(&self) -> f32 {
        self.total_frames() as f32 / self.frame_rate
    }

    pub fn layer(&self, id: LayerId) -> &LayerRecord {
        &self.layers[id.0]
    }

    pub fn composition(&self, id: CompId) -> &Composition {
        &self.compositions[id.0]
    }

    pub fn image(&self, id: ImageId) -> &Arc<ImageData> {
        &self.images[id.0]
    }
}

struct Compiler<'a> {
    resolver: &'a dyn ImageResolver,
    assets: HashMap<&'a str, &'a data::Asset>,
    layers: Vec<LayerRecord>,
    compositions: Vec<Option<Composition>>,
    comp_ids: HashMap<String, CompId>,
    visiting: Vec<String>,
    images: Vec<Arc<ImageData>>,
    image_ids: HashMap<String, ImageId>,
    canvas: Vec2,
}

impl<'a> Compiler<'a> {
    fn composition(
        &mut self,
        id: &str,
        layers: &'a [data::Layer],
        span: Option<(f32, f32)>,
    ) -> Result<CompId> {
        let comp_id = CompId(self.compositions.len());
        self.compositions.push(None);
        self.comp_ids.insert(id.to_string(), comp_id);
        self.visiting.push(id.to_string());

        // Array position -> compiled layer; audio and data layers leave a gap.
        let mut slots: Vec<Option<LayerId>> = Vec::with_capacity(layers.len());
        for layer in layers {
            if matches!(layer.ty, 6 | 15) {
                debug!(
                    ty = layer.ty,
                    "skipping non-visual layer {:?}",
                    layer.nm.as_deref().unwrap_or("")
                );
                slots.push(None);
                continue;
            }
            let record = self.layer(layer)?;
            slots.push(Some(LayerId(self.layers.len())));
            self.layers.push(record);
        }

        let by_index: HashMap<u32, LayerId> = layers
            .iter()
            .zip(&slots)
            .filter_map(|(l, slot)| Some((l.ind?, (*slot)?)))
            .collect();

        for (pos, (layer, slot)) in layers.iter().zip(&slots).enumerate() {
            let Some(lid) = *slot else { continue };
            let location = layer_location(layer);

            if let Some(parent) = layer.parent {
                let pid = by_index.get(&parent).copied().ok_or_else(|| {
                    LottieError::parse(format!("{location}: unknown parent {parent}"))
                })?;
                self.layers[lid.0].parent = Some(pid);
            }

            if let Some(tt) = layer.tt {
                let Some(mode) = MatteMode::from_lottie(tt) else {
                    return Err(LottieError::unsupported(format!("track matte {tt}"), location));
                };
                let source = match layer.tp {
                    Some(tp) => Some(by_index.get(&tp).copied().ok_or_else(|| {
                        LottieError::parse(format!("{location}: unknown matte layer {tp}"))
                    })?),
                    None => pos.checked_sub(1).and_then(|p| slots[p]),
                };
                if let Some(src) = source {
                    self.layers[src.0].is_matte_source = true;
                }
                self.layers[lid.0].matte = Some((mode, source));
            }
        }

        // Parent and matte chains must terminate.
        for slot in slots.iter().flatten() {
            let mut cursor = *slot;
            let mut steps = 0;
            while let Some((_, Some(src))) = self.layers[cursor.0].matte {
                steps += 1;
                if steps > slots.len() {
                    return Err(LottieError::parse(format!(
                        "composition {id}: track matte of layer {:?} loops",
                        self.layers[slot.0].name.as_deref().unwrap_or("")
                    )));
                }
                cursor = src;
            }
        }
        for slot in slots.iter().flatten() {
            let mut cursor = self.layers[slot.0].parent;
            let mut steps = 0;
            while let Some(p) = cursor {
                steps += 1;
                if steps > slots.len() {
                    return Err(LottieError::parse(format!(
                        "composition {id}: parent chain of layer {:?} loops",
                        self.layers[slot.0].name.as_deref().unwrap_or("")
                    )));
                }
                cursor = self.layers[p.0].parent;
            }
        }

        let member_ids: Vec<LayerId> = slots.iter().flatten().copied().collect();
        let (start, end) = span.unwrap_or_else(|| {
            let start = layers.iter().map(|l| l.ip).fold(f32::INFINITY, f32::min);
            let end = layers.iter().map(|l| l.op).fold(f32::NEG_INFINITY, f32::max);
            if start.is_finite() && end.is_finite() {
                // Local time zero always belongs to the composition.
                (start.min(0.0), end)
            } else {
                (0.0, 0.0)
            }
        });

        self.visiting.pop();
        self.compositions[comp_id.0] = Some(Composition {
            id: id.to_string(),
            layers: member_ids,
            start,
            end,
        });
        Ok(comp_id)
    }

    fn precomp(&mut self, ref_id: &str, location: &str) -> Result<CompId> {
        if let Some(id) = self.comp_ids.get(ref_id) {
            if self.visiting.iter().any(|v| v == ref_id) {
                return Err(LottieError::parse(format!(
                    "{location}: precomposition {ref_id:?} contains itself"
                )));
            }
            return Ok(*id);
        }
        let asset = self.asset(ref_id, location)?;
        let Some(layers) = asset.layers.as_deref() else {
            return Err(LottieError::parse(format!(
                "{location}: asset {ref_id:?} is not a composition"
            )));
        };
        self.composition(ref_id, layers, None)
    }

    fn asset(&self, ref_id: &str, location: &str) -> Result<&'a data::Asset> {
        self.assets
            .get(ref_id)
            .copied()
            .ok_or_else(|| LottieError::parse(format!("{location}: unknown asset {ref_id:?}")))
    }

    fn image(&mut self, ref_id: &str, location: &str) -> Result<(ImageId, Vec2)> {
        let asset = self.asset(ref_id, location)?;
        let size = |img: &ImageData| {
            Vec2::new(
                asset.w.unwrap_or(img.width) as f32,
                asset.h.unwrap_or(img.height) as f32,
            )
        };
        if let Some(id) = self.image_ids.get(ref_id) {
            return Ok((*id, size(&self.images[id.0])));
        }

        let file = asset.p.as_deref().ok_or_else(|| {
            LottieError::parse(format!("{location}: image asset {ref_id:?} has no path"))
        })?;
        let bytes = match file.strip_prefix("data:") {
            Some(uri) => {
                let (_, payload) = uri.split_once(',').ok_or_else(|| {
                    LottieError::parse(format!("{location}: malformed data URI in {ref_id:?}"))
                })?;
                BASE64_STANDARD.decode(payload.trim()).map_err(|e| {
                    LottieError::parse(format!("{location}: image {ref_id:?}: {e}"))
                })?
            }
            None => self
                .resolver
                .resolve(asset.u.as_deref().unwrap_or(""), file)
                .ok_or_else(|| {
                    LottieError::parse(format!(
                        "{location}: external image {file:?} could not be resolved"
                    ))
                })?,
        };

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| LottieError::parse(format!("{location}: image {ref_id:?}: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        let mut pixels = decoded.into_raw();
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
        let data = ImageData {
            width,
            height,
            pixels,
        };
        let dims = size(&data);

        let id = ImageId(self.images.len());
        self.images.push(Arc::new(data));
        self.image_ids.insert(ref_id.to_string(), id);
        Ok((id, dims))
    }

    fn layer(&mut self, layer: &'a data::Layer) -> Result<LayerRecord> {
        let location = layer_location(layer);
        let hidden = layer.hd == Some(true);

        if layer.ddd == Some(1) {
            return Err(LottieError::unsupported("3d layer", location));
        }
        if let Some(effect) = layer
            .ef
            .iter()
            .flatten()
            .find(|e| e.en.unwrap_or(1) != 0)
        {
            let name = effect.nm.as_deref().unwrap_or("unnamed");
            return Err(LottieError::unsupported(format!("layer effect {name:?}"), location));
        }
        if layer.sy.as_ref().is_some_and(|s| !s.is_empty()) {
            return Err(LottieError::unsupported("layer style", location));
        }

        let blend_mode = match layer.bm {
            None => BlendMode::Normal,
            Some(bm) => BlendMode::from_lottie(bm)
                .ok_or_else(|| LottieError::unsupported(format!("blend mode {bm}"), &location))?,
        };

        let transform = transform_tracks(&layer.ks, &location)?;
        let masks = layer
            .masks_properties
            .iter()
            .flatten()
            .map(|m| mask_track(m, &location))
            .collect::<Result<Vec<_>>>()?;

        let content = if hidden {
            LayerContent::Null
        } else {
            match layer.ty {
                0 => {
                    let ref_id = layer.ref_id.as_deref().ok_or_else(|| {
                        LottieError::parse(format!("{location}: precomposition without refId"))
                    })?;
                    let comp = self.precomp(ref_id, &location)?;
                    let asset = self.asset(ref_id, &location)?;
                    let time_remap = layer
                        .tm
                        .as_ref()
                        .map(|tm| Track::from_property(tm, &format!("{location} time remap"), 0.0, |v| *v))
                        .transpose()?;
                    LayerContent::Precomp {
                        comp,
                        time_remap,
                        width: layer.w.or(asset.w).map_or(self.canvas.x, |w| w as f32),
                        height: layer.h.or(asset.h).map_or(self.canvas.y, |h| h as f32),
                    }
                }
                1 => LayerContent::Solid {
                    color: parse_hex_color(layer.color.as_deref().unwrap_or("#000000"))
                        .ok_or_else(|| {
                            LottieError::parse(format!("{location}: malformed solid color"))
                        })?,
                    width: layer.sw.unwrap_or(0) as f32,
                    height: layer.sh.unwrap_or(0) as f32,
                },
                2 => {
                    let ref_id = layer.ref_id.as_deref().ok_or_else(|| {
                        LottieError::parse(format!("{location}: image layer without refId"))
                    })?;
                    let (image, size) = self.image(ref_id, &location)?;
                    LayerContent::Image {
                        image,
                        width: size.x,
                        height: size.y,
                    }
                }
                3 => LayerContent::Null,
                4 => {
                    let (items, _) = shape_items(layer.shapes.as_deref().unwrap_or(&[]), &location)?;
                    LayerContent::Shape(items)
                }
                5 => return Err(LottieError::unsupported("text layer", location)),
                13 => return Err(LottieError::unsupported("camera layer", location)),
                ty => return Err(LottieError::unsupported(format!("layer type {ty}"), location)),
            }
        };

        Ok(LayerRecord {
            name: layer.nm.clone(),
            index: layer.ind,
            hidden,
            parent: None,
            in_point: layer.ip,
            out_point: layer.op,
            start_time: layer.st,
            time_stretch: layer.sr,
            transform,
            auto_orient: layer.ao == Some(1),
            blend_mode,
            masks,
            matte: None,
            is_matte_source: layer.td.unwrap_or(0) != 0,
            content,
        })
    }
}

fn layer_location(layer: &data::Layer) -> String {
    format!("layer {:?}", layer.nm.as_deref().unwrap_or(""))
}

fn item_location(parent: &str, name: Option<&str>, code: &str) -> String {
    format!("{parent} > {} ({code})", name.unwrap_or("unnamed"))
}

pub fn parse_hex_color(hex: &str) -> Option<Vec4> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some(Vec4::new(channel(0)?, channel(2)?, channel(4)?, 1.0))
}

fn scalar(prop: &data::Property<f32>, location: &str, default: f32) -> Result<Track<f32>> {
    Track::from_property(prop, location, default, |v| *v)
}

fn percent(prop: &data::Property<f32>, location: &str) -> Result<Track<f32>> {
    Track::from_property(prop, location, 1.0, |v| *v / 100.0)
}

fn point(prop: &data::Property<Vec<f32>>, location: &str, default: Vec2) -> Result<Track<Vec2>> {
    Track::from_property(prop, location, default, |v| vec2_from(v, default))
}

fn color(prop: &data::Property<Vec<f32>>, location: &str) -> Result<Track<Vec4>> {
    Track::from_property(prop, location, Vec4::new(0.0, 0.0, 0.0, 1.0), |v| color_from(v))
}

fn position(prop: &data::PositionProperty, location: &str) -> Result<PositionTrack> {
    Ok(match prop {
        data::PositionProperty::Unified(p) => PositionTrack::Unified(point(p, location, Vec2::ZERO)?),
        data::PositionProperty::Split { x, y } => {
            PositionTrack::Split(scalar(x, location, 0.0)?, scalar(y, location, 0.0)?)
        }
    })
}

pub(crate) fn transform_tracks(ks: &data::Transform, location: &str) -> Result<TransformTracks> {
    Ok(TransformTracks {
        anchor: point(&ks.a, &format!("{location} anchor"), Vec2::ZERO)?,
        position: position(&ks.p, &format!("{location} position"))?,
        scale: Track::from_property(&ks.s, &format!("{location} scale"), Vec2::ONE, |v| {
            vec2_from(v, Vec2::splat(100.0)) / 100.0
        })?,
        rotation: scalar(&ks.r, &format!("{location} rotation"), 0.0)?,
        skew: scalar(&ks.sk, &format!("{location} skew"), 0.0)?,
        skew_axis: scalar(&ks.sa, &format!("{location} skew axis"), 0.0)?,
        opacity: percent(&ks.o, &format!("{location} opacity"))?,
    })
}

fn mask_track(mask: &data::MaskProperties, layer: &str) -> Result<MaskTrack> {
    let location = format!("{layer} mask {:?}", mask.nm.as_deref().unwrap_or(""));

    let feathered = mask.feather.is_animated()
        || matches!(&mask.feather.k, data::Value::Static(f) if f.iter().any(|v| *v != 0.0));
    if feathered {
        return Err(LottieError::unsupported("mask feather", location));
    }
    let expanded = mask.x.is_animated() || matches!(mask.x.k, data::Value::Static(x) if x != 0.0);
    if expanded {
        return Err(LottieError::unsupported("mask expansion", location));
    }

    Ok(MaskTrack {
        name: mask.nm.clone(),
        mode: MaskMode::from_lottie(mask.mode.as_deref()),
        inverted: mask.inv,
        path: Track::from_property(&mask.pt, &location, PathShape::default(), PathShape::from_data)?,
        opacity: percent(&mask.o, &location)?,
    })
}

fn dashes(props: &[data::DashProperty], location: &str) -> Result<Vec<DashTrack>> {
    props
        .iter()
        .map(|d| {
            let kind = match d.n.as_deref() {
                Some("o") => DashKind::Offset,
                Some("g") => DashKind::Gap,
                _ => DashKind::Dash,
            };
            Ok(DashTrack {
                kind,
                length: scalar(&d.v, location, 0.0)?,
            })
        })
        .collect()
}

fn stroke_style(
    width: &data::Property<f32>,
    lc: u8,
    lj: u8,
    ml: Option<f32>,
    d: &[data::DashProperty],
    location: &str,
) -> Result<StrokeStyle> {
    Ok(StrokeStyle {
        width: scalar(width, location, 1.0)?,
        cap: LineCap::from_lottie(lc),
        join: LineJoin::from_lottie(lj),
        miter_limit: ml.unwrap_or(4.0),
        dashes: dashes(d, location)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn gradient(
    t: u8,
    s: &data::Property<Vec<f32>>,
    e: &data::Property<Vec<f32>>,
    h: &data::Property<f32>,
    a: &data::Property<f32>,
    g: &data::GradientColors,
    location: &str,
) -> Result<GradientTracks> {
    Ok(GradientTracks {
        kind: if t == 2 {
            GradientKind::Radial
        } else {
            GradientKind::Linear
        },
        start: point(s, location, Vec2::ZERO)?,
        end: point(e, location, Vec2::ZERO)?,
        highlight_length: scalar(h, location, 0.0)?,
        highlight_angle: scalar(a, location, 0.0)?,
        color_count: g.p as usize,
        stops: Track::from_property(&g.k, location, Vec::new(), |v| v.clone())?,
    })
}

fn fill_rule(r: Option<u8>) -> FillRule {
    if r == Some(2) {
        FillRule::EvenOdd
    } else {
        FillRule::NonZero
    }
}

/// Compile a shape list. A `tr` item becomes the container's transform.
pub(crate) fn shape_items(
    shapes: &[data::Shape],
    parent: &str,
) -> Result<(Vec<ShapeItem>, Option<TransformTracks>)> {
    let mut items = Vec::with_capacity(shapes.len());
    let mut transform = None;

    for shape in shapes {
        if shape.is_hidden() {
            continue;
        }
        let location = item_location(parent, shape.name(), shape.type_code());
        let item = match shape {
            data::Shape::Group(g) => {
                let (children, tr) = shape_items(&g.it, &location)?;
                ShapeItem::Group(GroupItem {
                    name: g.nm.clone(),
                    items: children,
                    transform: tr,
                })
            }
            data::Shape::Transform(tr) => {
                transform = Some(transform_tracks(&tr.t, &location)?);
                continue;
            }
            data::Shape::Rect(r) => ShapeItem::Rect {
                name: r.nm.clone(),
                position: point(&r.p, &location, Vec2::ZERO)?,
                size: point(&r.s, &location, Vec2::ZERO)?,
                radius: scalar(&r.r, &location, 0.0)?,
            },
            data::Shape::Ellipse(e) => ShapeItem::Ellipse {
                name: e.nm.clone(),
                position: point(&e.p, &location, Vec2::ZERO)?,
                size: point(&e.s, &location, Vec2::ZERO)?,
            },
            data::Shape::Polystar(sr) => {
                let optional = |p: &Option<data::Property<f32>>| match p {
                    Some(p) => scalar(p, &location, 0.0),
                    None => Ok(Track::constant(0.0)),
                };
                ShapeItem::Polystar(PolystarItem {
                    name: sr.nm.clone(),
                    kind: if sr.sy == 2 {
                        StarKind::Polygon
                    } else {
                        StarKind::Star
                    },
                    position: position(&sr.p, &location)?,
                    points: scalar(&sr.pt, &location, 5.0)?,
                    rotation: scalar(&sr.r, &location, 0.0)?,
                    outer_radius: scalar(&sr.or, &location, 0.0)?,
                    outer_roundness: scalar(&sr.os, &location, 0.0)?,
                    inner_radius: optional(&sr.ir)?,
                    inner_roundness: optional(&sr.is)?,
                })
            }
            data::Shape::Path(p) => ShapeItem::Path {
                name: p.nm.clone(),
                path: Track::from_property(&p.ks, &location, PathShape::default(), PathShape::from_data)?,
            },
            data::Shape::Fill(f) => ShapeItem::Fill(FillItem {
                name: f.nm.clone(),
                color: color(&f.c, &location)?,
                opacity: percent(&f.o, &location)?,
                rule: fill_rule(f.r),
            }),
            data::Shape::Stroke(s) => ShapeItem::Stroke(StrokeItem {
                name: s.nm.clone(),
                color: color(&s.c, &location)?,
                opacity: percent(&s.o, &location)?,
                style: stroke_style(&s.w, s.lc, s.lj, s.ml, &s.d, &location)?,
            }),
            data::Shape::GradientFill(g) => ShapeItem::GradientFill(GradientFillItem {
                name: g.nm.clone(),
                gradient: gradient(g.t, &g.s, &g.e, &g.h, &g.a, &g.g, &location)?,
                opacity: percent(&g.o, &location)?,
                rule: fill_rule(g.r),
            }),
            data::Shape::GradientStroke(g) => ShapeItem::GradientStroke(GradientStrokeItem {
                name: g.nm.clone(),
                gradient: gradient(g.t, &g.s, &g.e, &g.h, &g.a, &g.g, &location)?,
                opacity: percent(&g.o, &location)?,
                style: stroke_style(&g.w, g.lc, g.lj, g.ml, &g.d, &location)?,
            }),
            data::Shape::Trim(t) => ShapeItem::Trim {
                start: Track::from_property(&t.s, &location, 0.0, |v| *v / 100.0)?,
                end: Track::from_property(&t.e, &location, 1.0, |v| *v / 100.0)?,
                offset: Track::from_property(&t.o, &location, 0.0, |v| *v / 360.0)?,
                mode: TrimMode::from_lottie(t.m),
            },
            data::Shape::Repeater(rp) => ShapeItem::Repeater(RepeaterItem {
                name: rp.nm.clone(),
                copies: scalar(&rp.c, &location, 1.0)?,
                offset: scalar(&rp.o, &location, 0.0)?,
                order: if rp.m == 2 {
                    RepeaterOrder::Below
                } else {
                    RepeaterOrder::Above
                },
                transform: transform_tracks(&rp.tr.t, &location)?,
                start_opacity: percent(&rp.tr.so, &location)?,
                end_opacity: percent(&rp.tr.eo, &location)?,
            }),
            data::Shape::RoundCorners(rd) => ShapeItem::RoundCorners {
                radius: scalar(&rd.r, &location, 0.0)?,
            },
            data::Shape::MergePaths(mm) => ShapeItem::Merge {
                mode: MergeMode::from_lottie(mm.mm),
            },
            data::Shape::ZigZag(_) => return Err(LottieError::unsupported("zig-zag", location)),
            data::Shape::PuckerBloat(_) => {
                return Err(LottieError::unsupported("pucker/bloat", location))
            }
            data::Shape::Twist(_) => return Err(LottieError::unsupported("twist", location)),
            data::Shape::OffsetPath(_) => {
                return Err(LottieError::unsupported("offset path", location))
            }
            data::Shape::WigglePath(_) => {
                return Err(LottieError::unsupported("wiggle path", location))
            }
            data::Shape::Unknown => {
                return Err(LottieError::unsupported("unknown shape item", location))
            }
        };
        items.push(item);
    }

    Ok((items, transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(doc: serde_json::Value) -> Result<Document> {
        Document::from_bytes(&serde_json::to_vec(&doc).unwrap(), &EmbeddedOnly)
    }

    fn base(layers: serde_json::Value, assets: serde_json::Value) -> serde_json::Value {
        json!({
            "v": "5.7.0", "fr": 30, "ip": 0, "op": 60, "w": 100, "h": 100,
            "layers": layers,
            "assets": assets
        })
    }

    #[test]
    fn derived_timing() {
        let doc = compile(base(json!([]), json!([]))).unwrap();
        assert_eq!(doc.total_frames(), 60);
        assert!((doc.duration() - 2.0).abs() < 1e-6);
        assert_eq!(doc.composition(Document::ROOT).layers.len(), 0);
    }

    #[test]
    fn parents_and_mattes_are_resolved() {
        let doc = compile(base(
            json!([
                { "ty": 3, "ind": 1, "ip": 0, "op": 60, "nm": "rig" },
                { "ty": 4, "ind": 2, "ip": 0, "op": 60, "nm": "matte", "td": 1, "shapes": [] },
                { "ty": 4, "ind": 3, "ip": 0, "op": 60, "nm": "content", "tt": 1, "parent": 1, "shapes": [] }
            ]),
            json!([]),
        ))
        .unwrap();
        let content = doc.layer(LayerId(2));
        assert_eq!(content.parent, Some(LayerId(0)));
        assert_eq!(content.matte, Some((MatteMode::Alpha, Some(LayerId(1)))));
        assert!(doc.layer(LayerId(1)).is_matte_source);
    }

    #[test]
    fn unknown_parent_is_a_parse_error() {
        let err = compile(base(
            json!([{ "ty": 3, "ind": 1, "parent": 9, "ip": 0, "op": 60 }]),
            json!([]),
        ))
        .unwrap_err();
        assert!(matches!(err, LottieError::Parse(_)));
    }

    #[test]
    fn precomp_cycle_is_a_parse_error() {
        let err = compile(base(
            json!([{ "ty": 0, "refId": "a", "ip": 0, "op": 60 }]),
            json!([
                { "id": "a", "layers": [{ "ty": 0, "refId": "b", "ip": 0, "op": 60 }] },
                { "id": "b", "layers": [{ "ty": 0, "refId": "a", "ip": 0, "op": 60 }] }
            ]),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("contains itself"), "{err}");
    }

    #[test]
    fn shared_precomp_is_compiled_once() {
        let doc = compile(base(
            json!([
                { "ty": 0, "refId": "a", "ip": 0, "op": 60 },
                { "ty": 0, "refId": "a", "ip": 0, "op": 60, "st": 10 }
            ]),
            json!([{ "id": "a", "layers": [{ "ty": 3, "ip": 5, "op": 20 }] }]),
        ))
        .unwrap();
        assert_eq!(doc.compositions.len(), 2);
        let comp = doc.composition(CompId(1));
        assert_eq!((comp.start, comp.end), (0.0, 20.0));
    }

    #[test]
    fn unsupported_features_are_reported() {
        let cases = [
            json!([{ "ty": 5, "ip": 0, "op": 60, "t": {} }]),
            json!([{ "ty": 13, "ip": 0, "op": 60 }]),
            json!([{ "ty": 4, "ip": 0, "op": 60, "ddd": 1, "shapes": [] }]),
            json!([{ "ty": 4, "ip": 0, "op": 60, "shapes": [{ "ty": "zz", "nm": "z" }] }]),
            json!([{ "ty": 4, "ip": 0, "op": 60, "ef": [{ "ty": 5, "nm": "Blur" }], "shapes": [] }]),
            json!([{ "ty": 4, "ip": 0, "op": 60, "bm": 16, "shapes": [] }]),
            json!([{ "ty": 3, "ip": 0, "op": 60, "ks": { "r": { "a": 0, "k": 0, "x": "time * 10" } } }]),
        ];
        for layers in cases {
            let err = compile(base(layers.clone(), json!([]))).unwrap_err();
            assert!(
                matches!(err, LottieError::UnsupportedFeature { .. }),
                "{layers}: {err}"
            );
        }
    }

    #[test]
    fn disabled_effects_and_non_visual_layers_are_fine() {
        let doc = compile(base(
            json!([
                { "ty": 4, "ip": 0, "op": 60, "ef": [{ "ty": 5, "en": 0 }], "shapes": [] },
                { "ty": 6, "ip": 0, "op": 60 },
                { "ty": 4, "ip": 0, "op": 60, "shapes": [{ "ty": "zz", "hd": true }] }
            ]),
            json!([]),
        ))
        .unwrap();
        assert_eq!(doc.composition(Document::ROOT).layers.len(), 2);
    }

    #[test]
    fn group_transform_is_extracted() {
        let doc = compile(base(
            json!([{ "ty": 4, "ip": 0, "op": 60, "shapes": [{
                "ty": "gr", "nm": "g",
                "it": [
                    { "ty": "rc", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [0, 0] } },
                    { "ty": "fl", "c": { "a": 0, "k": [1, 0, 0, 1] }, "o": { "a": 0, "k": 100 } },
                    { "ty": "tr", "p": { "a": 0, "k": [5, 5] }, "o": { "a": 0, "k": 50 } }
                ]
            }] }]),
            json!([]),
        ))
        .unwrap();
        let LayerContent::Shape(items) = &doc.layer(LayerId(0)).content else {
            panic!("expected shape content");
        };
        let ShapeItem::Group(group) = &items[0] else {
            panic!("expected group");
        };
        assert_eq!(group.items.len(), 2);
        let tr = group.transform.as_ref().unwrap();
        assert_eq!(tr.opacity.value_at(0.0).unwrap(), 0.5);
        assert_eq!(tr.position.value_at(0.0).unwrap(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn embedded_image_is_premultiplied() {
        // 1x1 PNG, RGBA (255, 0, 0, 128)
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 128]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let uri = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(&png));
        let doc = compile(base(
            json!([{ "ty": 2, "refId": "img", "ip": 0, "op": 60 }]),
            json!([{ "id": "img", "w": 1, "h": 1, "p": uri, "e": 1 }]),
        ))
        .unwrap();
        assert_eq!(doc.images[0].pixels, vec![128, 0, 0, 128]);
    }

    #[test]
    fn external_image_needs_a_resolver() {
        let err = compile(base(
            json!([{ "ty": 2, "refId": "img", "ip": 0, "op": 60 }]),
            json!([{ "id": "img", "u": "images/", "p": "img_0.png" }]),
        ))
        .unwrap_err();
        assert!(matches!(err, LottieError::Parse(_)));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff0000"), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn markers_carry_end_frames() {
        let mut doc = base(json!([]), json!([]));
        doc["markers"] = json!([{ "cm": "intro", "tm": 0, "dr": 15 }]);
        let doc = compile(doc).unwrap();
        assert_eq!(
            doc.markers,
            vec![Marker {
                name: "intro".into(),
                start_frame: 0.0,
                end_frame: 15.0
            }]
        );
    }
}
