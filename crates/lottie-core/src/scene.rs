//! Builds the render tree for one frame.
//!
//! Layers are visited bottom-up in paint order. Inside a shape layer, a
//! style paints every outline declared before it in its group, nested
//! groups included, and earlier items are drawn on top of later ones.

use crate::document::{
    CompId, Document, GradientKind, GradientTracks, LayerContent, LayerId, LayerRecord,
    PositionTrack, RepeaterItem, RepeaterOrder, ShapeItem, StrokeStyle, TransformTracks,
    DashKind, DashTrack,
};
use crate::error::{LottieError, Result};
use crate::geometry::{
    ellipse_path, polystar_path, rect_path, round_corners, transform_path, PolystarParams,
};
use crate::gradient::parse_gradient_stops;
use crate::keypath::{PropertyKind, PropertyOverrides, PropertyValue};
use crate::renderer::{
    DashPattern, Fill, FillRule, Mask, MaskMode, Matte, MergeMode, NodeContent, Paint,
    RenderNode, RenderTree, Shape, ShapeGeometry, Stroke,
};
use crate::trim::TrimRange;
use glam::{Mat3, Vec2, Vec3};
use kurbo::{BezPath, Rect};
use tracing::trace;

static NO_OVERRIDES: PropertyOverrides = PropertyOverrides::new();

/// Largest skew angle honoured, in degrees; tan() diverges at 90.
const MAX_SKEW: f32 = 85.0;

/// `T(p) * R(r) * Skew(sk, sa) * S(s) * T(-a)`; angles in degrees,
/// positive rotation is clockwise on screen.
pub fn compose_transform(
    anchor: Vec2,
    position: Vec2,
    scale: Vec2,
    rotation: f32,
    skew: f32,
    skew_axis: f32,
) -> Mat3 {
    let mut m = Mat3::from_translation(position) * Mat3::from_rotation_z(rotation.to_radians());
    if skew != 0.0 {
        let axis = skew_axis.to_radians();
        let k = -skew.clamp(-MAX_SKEW, MAX_SKEW).to_radians().tan();
        let shear = Mat3::from_cols(Vec3::X, Vec3::new(k, 1.0, 0.0), Vec3::Z);
        m = m * Mat3::from_rotation_z(-axis) * shear * Mat3::from_rotation_z(axis);
    }
    m * Mat3::from_scale(scale) * Mat3::from_translation(-anchor)
}

/// Transform of repeater copy `k` (may be fractional with an offset).
fn repeater_matrix(anchor: Vec2, position: Vec2, scale: Vec2, rotation: f32, k: f32) -> Mat3 {
    let pow = |s: f32| s.signum() * s.abs().powf(k);
    Mat3::from_translation(position * k)
        * Mat3::from_translation(anchor)
        * Mat3::from_rotation_z((rotation * k).to_radians())
        * Mat3::from_scale(Vec2::new(pow(scale.x), pow(scale.y)))
        * Mat3::from_translation(-anchor)
}

fn transform_geometry(geom: &ShapeGeometry, m: Mat3) -> ShapeGeometry {
    match geom {
        ShapeGeometry::Path(p) => ShapeGeometry::Path(transform_path(p, m)),
        ShapeGeometry::Merged(parts) => ShapeGeometry::Merged(
            parts
                .iter()
                .map(|(mode, p)| (*mode, transform_path(p, m)))
                .collect(),
        ),
    }
}

fn apply_trim(geoms: &mut [ShapeGeometry], range: &TrimRange) {
    let mut paths: Vec<BezPath> = Vec::new();
    for g in geoms.iter() {
        match g {
            ShapeGeometry::Path(p) => paths.push(p.clone()),
            ShapeGeometry::Merged(parts) => paths.extend(parts.iter().map(|(_, p)| p.clone())),
        }
    }
    range.apply(&mut paths);

    let mut trimmed = paths.into_iter();
    for g in geoms.iter_mut() {
        match g {
            ShapeGeometry::Path(p) => {
                if let Some(t) = trimmed.next() {
                    *p = t;
                }
            }
            ShapeGeometry::Merged(parts) => {
                for (_, p) in parts.iter_mut() {
                    if let Some(t) = trimmed.next() {
                        *p = t;
                    }
                }
            }
        }
    }
}

/// Combine outlines into the single geometry a style paints.
fn combine(geoms: Vec<ShapeGeometry>) -> ShapeGeometry {
    if geoms.iter().all(|g| matches!(g, ShapeGeometry::Path(_))) {
        let mut out = BezPath::new();
        for g in &geoms {
            if let ShapeGeometry::Path(p) = g {
                out.extend(p.elements().iter().copied());
            }
        }
        return ShapeGeometry::Path(out);
    }
    let mut parts = Vec::new();
    for g in geoms {
        match g {
            ShapeGeometry::Path(p) => parts.push((MergeMode::Merge, p)),
            ShapeGeometry::Merged(inner) => parts.extend(inner),
        }
    }
    ShapeGeometry::Merged(parts)
}

fn merge(geoms: &mut Vec<ShapeGeometry>, mode: MergeMode) {
    if geoms.is_empty() {
        return;
    }
    let flat: Vec<BezPath> = geoms.drain(..).map(|g| g.flattened()).collect();
    if mode == MergeMode::Merge {
        let mut out = BezPath::new();
        for p in &flat {
            out.extend(p.elements().iter().copied());
        }
        geoms.push(ShapeGeometry::Path(out));
        return;
    }
    let parts = flat
        .into_iter()
        .enumerate()
        .map(|(i, p)| (if i == 0 { MergeMode::Merge } else { mode }, p))
        .collect();
    geoms.push(ShapeGeometry::Merged(parts));
}

/// Result of one shape list: nodes in declaration order (topmost first)
/// and the outlines it contributes to styles further out.
struct ScopeOutput {
    nodes: Vec<RenderNode>,
    geometry: Vec<ShapeGeometry>,
}

pub struct SceneGraphBuilder<'a> {
    doc: &'a Document,
    overrides: &'a PropertyOverrides,
}

impl<'a> SceneGraphBuilder<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            overrides: &NO_OVERRIDES,
        }
    }

    pub fn with_overrides(mut self, overrides: &'a PropertyOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Render tree at the document's own size.
    pub fn build(&self, frame: f32) -> Result<RenderTree> {
        self.build_sized(frame, self.doc.width, self.doc.height)
    }

    /// Render tree scaled to a `width` x `height` viewport. `frame` is an
    /// index in `[0, total_frames)`, counted from the document's in-point.
    pub fn build_sized(&self, frame: f32, width: f32, height: f32) -> Result<RenderTree> {
        let total = self.doc.total_frames();
        if !frame.is_finite() || frame < 0.0 || frame >= total as f32 {
            return Err(LottieError::FrameOutOfRange {
                frame,
                total_frames: total,
            });
        }
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(LottieError::invalid_target(format!(
                "viewport {width}x{height} is empty"
            )));
        }

        let comp_frame = self.doc.in_point + frame;
        let children = self.composition(Document::ROOT, comp_frame)?;
        let viewport = Mat3::from_scale(Vec2::new(
            width / self.doc.width,
            height / self.doc.height,
        ));

        let tree = RenderTree {
            width,
            height,
            frame,
            root: RenderNode::group(self.doc.name.clone(), viewport, children),
        };
        trace!(frame, nodes = tree.node_count(), "built render tree");
        Ok(tree)
    }

    /// Layer nodes of `comp` in paint order.
    ///
    /// The first layer in the document's array is the topmost one, so the
    /// array is walked back to front and the first layer is painted last.
    fn composition(&self, comp: CompId, frame: f32) -> Result<Vec<RenderNode>> {
        let mut nodes = Vec::new();
        for &id in self.doc.composition(comp).layers.iter().rev() {
            if self.doc.layer(id).is_matte_source {
                continue;
            }
            if let Some(node) = self.layer(id, frame)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn layer(&self, id: LayerId, frame: f32) -> Result<Option<RenderNode>> {
        let rec = self.doc.layer(id);
        if !rec.is_visible_at(frame) {
            return Ok(None);
        }
        let mut scope = vec![rec.name.clone().unwrap_or_default()];

        let content = match &rec.content {
            LayerContent::Null => return Ok(None),
            LayerContent::Shape(items) => {
                let out = self.shapes(items, frame, &mut scope, &[])?;
                NodeContent::Group(out.nodes.into_iter().rev().collect())
            }
            LayerContent::Precomp {
                comp, time_remap, ..
            } => {
                let local = self.precomp_time(rec, *comp, time_remap.as_ref(), frame)?;
                NodeContent::Group(self.composition(*comp, local)?)
            }
            LayerContent::Solid {
                color,
                width,
                height,
            } => {
                let size = Vec2::new(*width, *height);
                let shape = Shape {
                    geometry: ShapeGeometry::Path(rect_path(size / 2.0, size, 0.0)),
                    fill: Some(Fill {
                        paint: Paint::Solid(*color),
                        opacity: 1.0,
                        rule: FillRule::NonZero,
                    }),
                    stroke: None,
                };
                NodeContent::Group(vec![RenderNode::shape(None, shape)])
            }
            LayerContent::Image {
                image,
                width,
                height,
            } => {
                let data = self.doc.image(*image).clone();
                let fit = Mat3::from_scale(Vec2::new(
                    *width / data.width.max(1) as f32,
                    *height / data.height.max(1) as f32,
                ));
                let mut node = RenderNode::group(None, fit, Vec::new());
                node.content = NodeContent::Image(data);
                NodeContent::Group(vec![node])
            }
        };

        let clip = match rec.content {
            LayerContent::Precomp { width, height, .. } => {
                Some(Rect::new(0.0, 0.0, width as f64, height as f64))
            }
            _ => None,
        };

        let mut alpha = rec.transform.opacity.value_at(frame)?;
        if let Some(PropertyValue::TrOpacity(o)) = self.lookup(&scope, PropertyKind::TrOpacity) {
            alpha = o / 100.0;
        }

        let matte = match rec.matte {
            Some((mode, source)) => {
                let node = match source {
                    Some(src) => self.layer(src, frame)?,
                    None => None,
                };
                Some(Box::new(Matte {
                    mode,
                    node: node.unwrap_or_else(|| RenderNode::group(None, Mat3::IDENTITY, Vec::new())),
                }))
            }
            None => None,
        };

        Ok(Some(RenderNode {
            name: rec.name.clone(),
            transform: self.layer_matrix(id, frame)?,
            alpha: alpha.clamp(0.0, 1.0),
            blend_mode: rec.blend_mode,
            content,
            masks: self.masks(rec, frame)?,
            matte,
            clip,
        }))
    }

    /// Child time of a precomposition layer, clamped to the child's span.
    ///
    /// A time remap replaces the start offset but not the stretch; both
    /// paths divide by `sr`.
    fn precomp_time(
        &self,
        rec: &LayerRecord,
        comp: CompId,
        time_remap: Option<&crate::animatable::Track<f32>>,
        frame: f32,
    ) -> Result<f32> {
        let local = match time_remap {
            Some(tm) => tm.value_at(frame)? * self.doc.frame_rate,
            None => frame - rec.start_time,
        } / rec.time_stretch;
        let span = self.doc.composition(comp);
        let last = (span.end - 1.0).max(span.start);
        Ok(local.clamp(span.start, last))
    }

    /// Local-to-composition matrix through the parent chain. Parents lend
    /// their transform but not their opacity.
    fn layer_matrix(&self, id: LayerId, frame: f32) -> Result<Mat3> {
        let rec = self.doc.layer(id);
        let scope = [rec.name.clone().unwrap_or_default()];
        let local = self.transform_matrix(&rec.transform, frame, &scope, rec.auto_orient)?;
        match rec.parent {
            Some(parent) => Ok(self.layer_matrix(parent, frame)? * local),
            None => Ok(local),
        }
    }

    fn transform_matrix(
        &self,
        tr: &TransformTracks,
        frame: f32,
        scope: &[String],
        auto_orient: bool,
    ) -> Result<Mat3> {
        let mut anchor = tr.anchor.value_at(frame)?;
        let mut position = tr.position.value_at(frame)?;
        let mut scale = tr.scale.value_at(frame)?;
        let mut rotation = tr.rotation.value_at(frame)?;

        if !self.overrides.is_empty() {
            if let Some(PropertyValue::TrAnchor(v)) = self.lookup(scope, PropertyKind::TrAnchor) {
                anchor = v;
            }
            if let Some(PropertyValue::TrPosition(v)) = self.lookup(scope, PropertyKind::TrPosition)
            {
                position = v;
            }
            if let Some(PropertyValue::TrScale(v)) = self.lookup(scope, PropertyKind::TrScale) {
                scale = v / 100.0;
            }
            if let Some(PropertyValue::TrRotation(v)) = self.lookup(scope, PropertyKind::TrRotation)
            {
                rotation = v;
            }
        }

        if auto_orient {
            rotation += orientation(&tr.position, frame)?;
        }

        Ok(compose_transform(
            anchor,
            position,
            scale,
            rotation,
            tr.skew.value_at(frame)?,
            tr.skew_axis.value_at(frame)?,
        ))
    }

    fn masks(&self, rec: &LayerRecord, frame: f32) -> Result<Vec<Mask>> {
        let location = format!("layer {:?} mask", rec.name.as_deref().unwrap_or(""));
        rec.masks
            .iter()
            .filter(|m| m.mode != MaskMode::None)
            .map(|m| {
                Ok(Mask {
                    mode: m.mode,
                    path: m.path.value_at(frame).map_err(|e| e.at(&location))?.to_bez_path(),
                    opacity: m.opacity.value_at(frame)?.clamp(0.0, 1.0),
                    inverted: m.inverted,
                })
            })
            .collect()
    }

    fn lookup(&self, scope: &[String], kind: PropertyKind) -> Option<PropertyValue> {
        self.overrides.lookup(scope, kind)
    }

    fn item_lookup(
        &self,
        scope: &mut Vec<String>,
        name: &Option<String>,
        kind: PropertyKind,
    ) -> Option<PropertyValue> {
        if self.overrides.is_empty() {
            return None;
        }
        scope.push(name.clone().unwrap_or_default());
        let found = self.overrides.lookup(scope, kind);
        scope.pop();
        found
    }

    fn shapes(
        &self,
        items: &[ShapeItem],
        frame: f32,
        scope: &mut Vec<String>,
        inherited_trims: &[TrimRange],
    ) -> Result<ScopeOutput> {
        let mut nodes: Vec<RenderNode> = Vec::new();
        let mut pending: Vec<ShapeGeometry> = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            match item {
                ShapeItem::Group(group) => {
                    // Trims declared after the group in this list reach into it.
                    let mut trims = inherited_trims.to_vec();
                    for later in &items[idx + 1..] {
                        if let Some(range) = self.trim_range(later, frame)? {
                            trims.push(range);
                        }
                    }

                    scope.push(group.name.clone().unwrap_or_default());
                    let out = self.shapes(&group.items, frame, scope, &trims)?;
                    let (matrix, alpha) = match &group.transform {
                        Some(tr) => {
                            let mut alpha = tr.opacity.value_at(frame)?;
                            if let Some(PropertyValue::TrOpacity(o)) =
                                self.lookup(scope, PropertyKind::TrOpacity)
                            {
                                alpha = o / 100.0;
                            }
                            (self.transform_matrix(tr, frame, scope, false)?, alpha)
                        }
                        None => (Mat3::IDENTITY, 1.0),
                    };
                    scope.pop();

                    pending.extend(out.geometry.iter().map(|g| transform_geometry(g, matrix)));
                    let mut node = RenderNode::group(
                        group.name.clone(),
                        matrix,
                        out.nodes.into_iter().rev().collect(),
                    );
                    node.alpha = alpha.clamp(0.0, 1.0);
                    nodes.push(node);
                }
                ShapeItem::Rect {
                    position,
                    size,
                    radius,
                    ..
                } => pending.push(ShapeGeometry::Path(rect_path(
                    position.value_at(frame)?,
                    size.value_at(frame)?,
                    radius.value_at(frame)?,
                ))),
                ShapeItem::Ellipse { position, size, .. } => pending.push(ShapeGeometry::Path(
                    ellipse_path(position.value_at(frame)?, size.value_at(frame)?),
                )),
                ShapeItem::Polystar(star) => {
                    let params = PolystarParams {
                        kind: star.kind,
                        center: star.position.value_at(frame)?,
                        points: star.points.value_at(frame)?,
                        rotation: star.rotation.value_at(frame)?,
                        outer_radius: star.outer_radius.value_at(frame)?,
                        outer_roundness: star.outer_roundness.value_at(frame)?,
                        inner_radius: star.inner_radius.value_at(frame)?,
                        inner_roundness: star.inner_roundness.value_at(frame)?,
                    };
                    pending.push(ShapeGeometry::Path(polystar_path(&params)));
                }
                ShapeItem::Path { name, path } => {
                    let shape = path.value_at(frame).map_err(|e| {
                        let mut location = scope.join(" > ");
                        location.push_str(" > ");
                        location.push_str(name.as_deref().unwrap_or("path"));
                        e.at(&location)
                    })?;
                    pending.push(ShapeGeometry::Path(shape.to_bez_path()));
                }
                ShapeItem::Fill(fill) => {
                    let mut color = fill.color.value_at(frame)?;
                    let mut opacity = fill.opacity.value_at(frame)?;
                    if let Some(PropertyValue::FillColor(c)) =
                        self.item_lookup(scope, &fill.name, PropertyKind::FillColor)
                    {
                        color = c.extend(color.w);
                    }
                    if let Some(PropertyValue::FillOpacity(o)) =
                        self.item_lookup(scope, &fill.name, PropertyKind::FillOpacity)
                    {
                        opacity = o / 100.0;
                    }
                    let style = Fill {
                        paint: Paint::Solid(color),
                        opacity: opacity.clamp(0.0, 1.0),
                        rule: fill.rule,
                    };
                    self.emit(&mut nodes, &pending, inherited_trims, &fill.name, Some(style), None);
                }
                ShapeItem::GradientFill(fill) => {
                    let style = Fill {
                        paint: self.gradient_paint(&fill.gradient, frame)?,
                        opacity: fill.opacity.value_at(frame)?.clamp(0.0, 1.0),
                        rule: fill.rule,
                    };
                    self.emit(&mut nodes, &pending, inherited_trims, &fill.name, Some(style), None);
                }
                ShapeItem::Stroke(stroke) => {
                    let mut color = stroke.color.value_at(frame)?;
                    let mut opacity = stroke.opacity.value_at(frame)?;
                    if let Some(PropertyValue::StrokeColor(c)) =
                        self.item_lookup(scope, &stroke.name, PropertyKind::StrokeColor)
                    {
                        color = c.extend(color.w);
                    }
                    if let Some(PropertyValue::StrokeOpacity(o)) =
                        self.item_lookup(scope, &stroke.name, PropertyKind::StrokeOpacity)
                    {
                        opacity = o / 100.0;
                    }
                    let width = match self.item_lookup(scope, &stroke.name, PropertyKind::StrokeWidth)
                    {
                        Some(PropertyValue::StrokeWidth(w)) => w,
                        _ => stroke.style.width.value_at(frame)?,
                    };
                    let style =
                        self.stroke(&stroke.style, Paint::Solid(color), opacity, width, frame)?;
                    self.emit(&mut nodes, &pending, inherited_trims, &stroke.name, None, style);
                }
                ShapeItem::GradientStroke(stroke) => {
                    let width = stroke.style.width.value_at(frame)?;
                    let style = self.stroke(
                        &stroke.style,
                        self.gradient_paint(&stroke.gradient, frame)?,
                        stroke.opacity.value_at(frame)?,
                        width,
                        frame,
                    )?;
                    self.emit(&mut nodes, &pending, inherited_trims, &stroke.name, None, style);
                }
                ShapeItem::Trim { .. } => {
                    if let Some(range) = self.trim_range(item, frame)? {
                        apply_trim(&mut pending, &range);
                    }
                }
                ShapeItem::RoundCorners { radius } => {
                    let r = radius.value_at(frame)?;
                    for g in pending.iter_mut() {
                        *g = match g {
                            ShapeGeometry::Path(p) => ShapeGeometry::Path(round_corners(p, r)),
                            ShapeGeometry::Merged(parts) => ShapeGeometry::Merged(
                                parts.iter().map(|(m, p)| (*m, round_corners(p, r))).collect(),
                            ),
                        };
                    }
                }
                ShapeItem::Merge { mode } => merge(&mut pending, *mode),
                ShapeItem::Repeater(rp) => self.repeat(rp, frame, &mut nodes, &mut pending)?,
            }
        }

        Ok(ScopeOutput {
            nodes,
            geometry: pending,
        })
    }

    fn trim_range(&self, item: &ShapeItem, frame: f32) -> Result<Option<TrimRange>> {
        let ShapeItem::Trim {
            start,
            end,
            offset,
            mode,
        } = item
        else {
            return Ok(None);
        };
        let range = TrimRange {
            start: start.value_at(frame)?,
            end: end.value_at(frame)?,
            offset: offset.value_at(frame)?,
            mode: *mode,
        };
        Ok((!range.is_identity()).then_some(range))
    }

    fn emit(
        &self,
        nodes: &mut Vec<RenderNode>,
        pending: &[ShapeGeometry],
        trims: &[TrimRange],
        name: &Option<String>,
        fill: Option<Fill>,
        stroke: Option<Stroke>,
    ) {
        if fill.is_none() && stroke.is_none() {
            return;
        }
        let mut geoms = pending.to_vec();
        for range in trims {
            apply_trim(&mut geoms, range);
        }
        let geometry = combine(geoms);
        if geometry.is_empty() {
            return;
        }
        nodes.push(RenderNode::shape(
            name.clone(),
            Shape {
                geometry,
                fill,
                stroke,
            },
        ));
    }

    fn stroke(
        &self,
        style: &StrokeStyle,
        paint: Paint,
        opacity: f32,
        width: f32,
        frame: f32,
    ) -> Result<Option<Stroke>> {
        if width <= 0.0 {
            return Ok(None);
        }
        Ok(Some(Stroke {
            paint,
            opacity: opacity.clamp(0.0, 1.0),
            width,
            cap: style.cap,
            join: style.join,
            miter_limit: style.miter_limit,
            dash: dash_pattern(&style.dashes, frame)?,
        }))
    }

    fn gradient_paint(&self, g: &GradientTracks, frame: f32) -> Result<Paint> {
        let stops = parse_gradient_stops(&g.stops.value_at(frame)?, g.color_count);
        let start = g.start.value_at(frame)?;
        let end = g.end.value_at(frame)?;
        Ok(match g.kind {
            GradientKind::Linear => Paint::Linear { start, end, stops },
            GradientKind::Radial => {
                let axis = end - start;
                let radius = axis.length();
                let highlight = (g.highlight_length.value_at(frame)? / 100.0).clamp(-0.99, 0.99);
                let angle = axis.y.atan2(axis.x) + g.highlight_angle.value_at(frame)?.to_radians();
                let focal = start + Vec2::new(angle.cos(), angle.sin()) * radius * highlight;
                Paint::Radial {
                    center: start,
                    radius,
                    focal,
                    stops,
                }
            }
        })
    }

    /// Replace everything declared so far with `copies` transformed copies.
    fn repeat(
        &self,
        rp: &RepeaterItem,
        frame: f32,
        nodes: &mut Vec<RenderNode>,
        pending: &mut Vec<ShapeGeometry>,
    ) -> Result<()> {
        let copies = rp.copies.value_at(frame)?.round().max(0.0) as usize;
        let originals = std::mem::take(nodes);
        let outlines = std::mem::take(pending);
        if copies == 0 {
            return Ok(());
        }

        let offset = rp.offset.value_at(frame)?;
        let anchor = rp.transform.anchor.value_at(frame)?;
        let position = rp.transform.position.value_at(frame)?;
        let scale = rp.transform.scale.value_at(frame)?;
        let rotation = rp.transform.rotation.value_at(frame)?;
        let start_alpha = rp.start_opacity.value_at(frame)?;
        let end_alpha = rp.end_opacity.value_at(frame)?;

        let paint_order: Vec<RenderNode> = originals.into_iter().rev().collect();
        let mut copies_out = Vec::with_capacity(copies);
        for i in 0..copies {
            let m = repeater_matrix(anchor, position, scale, rotation, i as f32 + offset);
            let t = if copies > 1 {
                i as f32 / (copies - 1) as f32
            } else {
                0.0
            };
            let mut node = RenderNode::group(rp.name.clone(), m, paint_order.clone());
            node.alpha = (start_alpha + (end_alpha - start_alpha) * t).clamp(0.0, 1.0);
            copies_out.push(node);
            pending.extend(outlines.iter().map(|g| transform_geometry(g, m)));
        }

        // `nodes` is topmost-first.
        if rp.order == RepeaterOrder::Above {
            copies_out.reverse();
        }
        *nodes = copies_out;
        Ok(())
    }
}

/// Path tangent angle of an animated position, in degrees.
fn orientation(position: &PositionTrack, frame: f32) -> Result<f32> {
    if !position.is_animated() {
        return Ok(0.0);
    }
    let ahead = position.value_at(frame + 0.5)?;
    let behind = position.value_at(frame - 0.5)?;
    let d = ahead - behind;
    if d.length_squared() < 1e-8 {
        return Ok(0.0);
    }
    Ok(d.y.atan2(d.x).to_degrees())
}

fn dash_pattern(dashes: &[DashTrack], frame: f32) -> Result<Option<DashPattern>> {
    if dashes.is_empty() {
        return Ok(None);
    }
    let mut array = Vec::new();
    let mut offset = 0.0;
    for dash in dashes {
        let v = dash.length.value_at(frame)?;
        match dash.kind {
            DashKind::Offset => offset = v,
            DashKind::Dash | DashKind::Gap => array.push(v.max(0.0)),
        }
    }
    let total: f32 = array.iter().sum();
    if array.is_empty() || total <= 0.0 {
        return Ok(None);
    }
    if array.len() % 2 != 0 {
        array.extend_from_slice(&array.clone());
    }
    let total: f32 = array.iter().sum();
    Ok(Some(DashPattern {
        array,
        offset: offset.rem_euclid(total),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EmbeddedOnly;
    use glam::Vec4;
    use serde_json::json;

    fn load(doc: serde_json::Value) -> Document {
        Document::from_bytes(&serde_json::to_vec(&doc).unwrap(), &EmbeddedOnly).unwrap()
    }

    fn scene(layers: serde_json::Value) -> Document {
        load(json!({
            "v": "5.7.0", "fr": 30, "ip": 0, "op": 60, "w": 100, "h": 100,
            "layers": layers
        }))
    }

    fn rect_layer(name: &str, ip: f32, op: f32) -> serde_json::Value {
        json!({
            "ty": 4, "nm": name, "ip": ip, "op": op,
            "shapes": [
                { "ty": "rc", "nm": "box", "s": { "a": 0, "k": [20, 20] }, "p": { "a": 0, "k": [50, 50] } },
                { "ty": "fl", "nm": "paint", "c": { "a": 0, "k": [1, 0, 0, 1] }, "o": { "a": 0, "k": 100 } }
            ]
        })
    }

    fn shape_of<'t>(tree: &'t RenderTree, name: &str) -> &'t Shape {
        match &tree.find(name).expect("node exists").content {
            NodeContent::Shape(s) => s,
            other => panic!("{name} is not a shape: {other:?}"),
        }
    }

    #[test]
    fn frame_range_is_checked() {
        let doc = scene(json!([]));
        let builder = SceneGraphBuilder::new(&doc);
        assert!(builder.build(0.0).is_ok());
        assert!(builder.build(59.0).is_ok());
        for bad in [60.0, -1.0, f32::NAN] {
            assert!(matches!(
                builder.build(bad),
                Err(LottieError::FrameOutOfRange { total_frames: 60, .. })
            ));
        }
    }

    #[test]
    fn layers_outside_their_range_are_skipped() {
        let doc = scene(json!([rect_layer("early", 0.0, 5.0)]));
        let builder = SceneGraphBuilder::new(&doc);
        assert!(builder.build(4.0).unwrap().find("early").is_some());
        assert!(builder.build(5.0).unwrap().find("early").is_none());
    }

    #[test]
    fn first_layer_paints_on_top() {
        let doc = scene(json!([rect_layer("top", 0.0, 60.0), rect_layer("bottom", 0.0, 60.0)]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let NodeContent::Group(children) = &tree.root.content else {
            panic!("root is a group");
        };
        let names: Vec<_> = children.iter().map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec![Some("bottom"), Some("top")]);
    }

    #[test]
    fn style_applies_to_preceding_geometry_only() {
        let doc = scene(json!([{
            "ty": 4, "nm": "L", "ip": 0, "op": 60,
            "shapes": [
                { "ty": "rc", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [10, 10] } },
                { "ty": "fl", "nm": "first", "c": { "a": 0, "k": [1, 0, 0] } },
                { "ty": "el", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [50, 50] } },
                { "ty": "fl", "nm": "second", "c": { "a": 0, "k": [0, 0, 1] } }
            ]
        }]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let ShapeGeometry::Path(first) = &shape_of(&tree, "first").geometry else {
            panic!("plain path");
        };
        let ShapeGeometry::Path(second) = &shape_of(&tree, "second").geometry else {
            panic!("plain path");
        };
        assert_eq!(first.elements().iter().filter(|e| matches!(e, kurbo::PathEl::MoveTo(_))).count(), 1);
        assert_eq!(second.elements().iter().filter(|e| matches!(e, kurbo::PathEl::MoveTo(_))).count(), 2);

        // earlier items sit on top, so "first" is painted after "second"
        let layer = tree.find("L").unwrap();
        let NodeContent::Group(children) = &layer.content else {
            panic!("layer is a group");
        };
        assert_eq!(children.last().and_then(|c| c.name.as_deref()), Some("first"));
    }

    #[test]
    fn opacity_is_interpolated() {
        let doc = scene(json!([{
            "ty": 4, "nm": "fade", "ip": 0, "op": 60,
            "ks": { "o": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 10, "s": [100] } ] } },
            "shapes": []
        }]));
        let builder = SceneGraphBuilder::new(&doc);
        let alpha = |f| builder.build(f).unwrap().find("fade").unwrap().alpha;
        assert_eq!(alpha(0.0), 0.0);
        assert!((alpha(5.0) - 0.5).abs() < 1e-5);
        assert_eq!(alpha(10.0), 1.0);
    }

    #[test]
    fn parent_transform_is_inherited_without_opacity() {
        let doc = scene(json!([
            { "ty": 3, "ind": 1, "nm": "rig", "ip": 0, "op": 60,
              "ks": { "p": { "a": 0, "k": [10, 20] }, "o": { "a": 0, "k": 0 } } },
            { "ty": 4, "ind": 2, "parent": 1, "nm": "child", "ip": 0, "op": 60,
              "ks": { "p": { "a": 0, "k": [1, 1] } }, "shapes": [] }
        ]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let child = tree.find("child").unwrap();
        assert_eq!(child.alpha, 1.0);
        assert_eq!(child.transform.transform_point2(Vec2::ZERO), Vec2::new(11.0, 21.0));
        assert!(tree.find("rig").is_none());
    }

    #[test]
    fn precomp_time_is_remapped_and_clamped() {
        let doc = load(json!({
            "fr": 10, "ip": 0, "op": 100, "w": 100, "h": 100,
            "assets": [{ "id": "inner", "layers": [{
                "ty": 4, "nm": "blink", "ip": 0, "op": 20,
                "ks": { "o": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 19, "s": [100] } ] } },
                "shapes": []
            }]}],
            "layers": [
                { "ty": 0, "nm": "late", "refId": "inner", "ip": 0, "op": 100, "st": 10, "w": 50, "h": 50 },
                { "ty": 0, "nm": "remapped", "refId": "inner", "ip": 0, "op": 100,
                  "tm": { "a": 0, "k": 0.5 } }
            ]
        }));
        let builder = SceneGraphBuilder::new(&doc);

        // before the layer's start: clamped to the first frame
        let tree = builder.build(0.0).unwrap();
        let late = tree.find("late").unwrap();
        assert_eq!(late.clip, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
        let NodeContent::Group(kids) = &late.content else { panic!() };
        assert_eq!(kids[0].alpha, 0.0);

        // long after the child ends: held on its last frame
        let tree = builder.build(90.0).unwrap();
        let NodeContent::Group(kids) = &tree.find("late").unwrap().content else { panic!() };
        assert_eq!(kids[0].alpha, 1.0);

        // remapped to 0.5 s = frame 5 of the child
        let NodeContent::Group(kids) = &tree.find("remapped").unwrap().content else { panic!() };
        assert!((kids[0].alpha - 5.0 / 19.0).abs() < 1e-4);
    }

    #[test]
    fn time_remap_is_divided_by_stretch() {
        let doc = load(json!({
            "fr": 10, "ip": 0, "op": 100, "w": 100, "h": 100,
            "assets": [{ "id": "inner", "layers": [{
                "ty": 4, "nm": "blink", "ip": 0, "op": 20,
                "ks": { "o": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 19, "s": [100] } ] } },
                "shapes": []
            }]}],
            "layers": [
                { "ty": 0, "nm": "slow", "refId": "inner", "ip": 0, "op": 100, "sr": 2,
                  "tm": { "a": 0, "k": 0.5 } },
                { "ty": 0, "nm": "ramp", "refId": "inner", "ip": 0, "op": 100, "sr": 2,
                  "tm": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 40, "s": [4] } ] } }
            ]
        }));
        let builder = SceneGraphBuilder::new(&doc);
        let child_alpha = |frame: f32, name: &str| {
            let tree = builder.build(frame).unwrap();
            let NodeContent::Group(kids) = &tree.find(name).unwrap().content else { panic!() };
            kids[0].alpha
        };

        // 0.5 s is frame 5, halved by the stretch
        assert!((child_alpha(0.0, "slow") - 2.5 / 19.0).abs() < 1e-4);
        // at frame 20 the remap reads 2 s = frame 20, halved to 10
        assert!((child_alpha(20.0, "ramp") - 10.0 / 19.0).abs() < 1e-4);
    }

    #[test]
    fn mattes_attach_to_their_consumer() {
        let doc = scene(json!([
            rect_layer("matte", 0.0, 60.0),
            { "ty": 4, "nm": "content", "ip": 0, "op": 60, "tt": 1, "shapes": [] }
        ]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let content = tree.find("content").unwrap();
        let matte = content.matte.as_ref().expect("matte attached");
        assert_eq!(matte.node.name.as_deref(), Some("matte"));
        // the matte source is not painted as a sibling
        let NodeContent::Group(children) = &tree.root.content else { panic!() };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn trim_after_group_reaches_inside() {
        let doc = scene(json!([{
            "ty": 4, "nm": "L", "ip": 0, "op": 60,
            "shapes": [
                { "ty": "gr", "nm": "g", "it": [
                    { "ty": "rc", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [0, 0] } },
                    { "ty": "st", "nm": "line", "c": { "a": 0, "k": [0, 0, 0] }, "w": { "a": 0, "k": 2 } }
                ]},
                { "ty": "tm", "s": { "a": 0, "k": 0 }, "e": { "a": 0, "k": 50 }, "o": { "a": 0, "k": 0 } }
            ]
        }]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let ShapeGeometry::Path(p) = &shape_of(&tree, "line").geometry else {
            panic!("plain path");
        };
        let len: f64 = p.segments().map(|s| kurbo::ParamCurveArclen::arclen(&s, 1e-6)).sum();
        assert!((len - 20.0).abs() < 1e-2, "len = {len}");
    }

    #[test]
    fn repeater_makes_copies() {
        let doc = scene(json!([{
            "ty": 4, "nm": "L", "ip": 0, "op": 60,
            "shapes": [
                { "ty": "rc", "s": { "a": 0, "k": [4, 4] }, "p": { "a": 0, "k": [0, 0] } },
                { "ty": "fl", "nm": "dot", "c": { "a": 0, "k": [0, 0, 0] } },
                { "ty": "rp", "nm": "rep", "c": { "a": 0, "k": 3 }, "o": { "a": 0, "k": 0 },
                  "tr": { "p": { "a": 0, "k": [10, 0] }, "so": { "a": 0, "k": 100 }, "eo": { "a": 0, "k": 50 } } }
            ]
        }]));
        let tree = SceneGraphBuilder::new(&doc).build(0.0).unwrap();
        let mut origins = Vec::new();
        tree.walk(|node, world, _| {
            if node.name.as_deref() == Some("dot") {
                origins.push(world.transform_point2(Vec2::ZERO).x);
            }
        });
        origins.sort_by(f32::total_cmp);
        assert_eq!(origins, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn overrides_replace_values() {
        let doc = scene(json!([rect_layer("L", 0.0, 60.0)]));
        let mut overrides = PropertyOverrides::new();
        overrides.set("L.paint", PropertyValue::FillColor(Vec3::new(0.0, 1.0, 0.0)));
        overrides.set("**", PropertyValue::FillOpacity(50.0));
        overrides.set("L", PropertyValue::TrPosition(Vec2::new(3.0, 4.0)));
        let tree = SceneGraphBuilder::new(&doc)
            .with_overrides(&overrides)
            .build(0.0)
            .unwrap();
        let fill = shape_of(&tree, "paint").fill.clone().unwrap();
        assert_eq!(fill.paint, Paint::Solid(Vec4::new(0.0, 1.0, 0.0, 1.0)));
        assert_eq!(fill.opacity, 0.5);
        let layer = tree.find("L").unwrap();
        assert_eq!(layer.transform.transform_point2(Vec2::ZERO), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn shape_mismatch_surfaces_inside_the_segment() {
        let tri = json!({ "c": true, "v": [[0,0],[10,0],[10,10]], "i": [[0,0],[0,0],[0,0]], "o": [[0,0],[0,0],[0,0]] });
        let quad = json!({ "c": true, "v": [[0,0],[10,0],[10,10],[0,10]], "i": [[0,0],[0,0],[0,0],[0,0]], "o": [[0,0],[0,0],[0,0],[0,0]] });
        let doc = scene(json!([{
            "ty": 4, "nm": "L", "ip": 0, "op": 60,
            "shapes": [
                { "ty": "sh", "nm": "morph", "ks": { "a": 1, "k": [ { "t": 0, "s": [tri] }, { "t": 10, "s": [quad] } ] } },
                { "ty": "fl", "c": { "a": 0, "k": [0, 0, 0] } }
            ]
        }]));
        let builder = SceneGraphBuilder::new(&doc);
        assert!(builder.build(0.0).is_ok());
        assert!(builder.build(10.0).is_ok());
        match builder.build(5.0) {
            Err(LottieError::ShapeMismatch { context, from, to }) => {
                assert_eq!((from, to), (3, 4));
                assert!(context.contains("morph"), "{context}");
            }
            other => panic!("expected a shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn viewport_scales_the_root() {
        let doc = scene(json!([]));
        let tree = SceneGraphBuilder::new(&doc).build_sized(0.0, 200.0, 50.0).unwrap();
        assert_eq!(
            tree.root.transform.transform_point2(Vec2::new(100.0, 100.0)),
            Vec2::new(200.0, 50.0)
        );
        assert!(SceneGraphBuilder::new(&doc).build_sized(0.0, 0.0, 50.0).is_err());
    }

    #[test]
    fn rotation_is_clockwise() {
        let m = compose_transform(Vec2::ZERO, Vec2::ZERO, Vec2::ONE, 90.0, 0.0, 0.0);
        let p = m.transform_point2(Vec2::new(1.0, 0.0));
        // +x turns to +y, which is downwards on screen
        assert!((p - Vec2::new(0.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn dash_arrays_are_even() {
        let dashes = vec![
            DashTrack {
                kind: DashKind::Dash,
                length: crate::animatable::Track::constant(4.0),
            },
            DashTrack {
                kind: DashKind::Offset,
                length: crate::animatable::Track::constant(-1.0),
            },
        ];
        let pattern = dash_pattern(&dashes, 0.0).unwrap().unwrap();
        assert_eq!(pattern.array, vec![4.0, 4.0]);
        assert_eq!(pattern.offset, 7.0);
    }
}
