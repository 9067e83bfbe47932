//! The per-frame render tree.
//!
//! A [`RenderTree`] is a plain owned value: once built it shares nothing
//! mutable with the document, so callers can keep, inspect or send it
//! across threads while other frames are built.

use glam::{Mat3, Vec2, Vec4};
use kurbo::{BezPath, Rect};
use std::fmt::{self, Write as _};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RenderTree {
    /// Viewport size the tree was built for.
    pub width: f32,
    pub height: f32,
    /// Frame index within `[0, total_frames)`.
    pub frame: f32,
    pub root: RenderNode,
}

impl RenderTree {
    /// Depth-first visit in paint order, with each node's world transform.
    pub fn walk<F: FnMut(&RenderNode, Mat3, usize)>(&self, mut f: F) {
        fn visit<F: FnMut(&RenderNode, Mat3, usize)>(
            node: &RenderNode,
            parent: Mat3,
            depth: usize,
            f: &mut F,
        ) {
            let world = parent * node.transform;
            f(node, world, depth);
            if let NodeContent::Group(children) = &node.content {
                for child in children {
                    visit(child, world, depth + 1, f);
                }
            }
        }
        visit(&self.root, Mat3::IDENTITY, 0, &mut f);
    }

    pub fn node_count(&self) -> usize {
        let mut n = 0;
        self.walk(|_, _, _| n += 1);
        n
    }

    pub fn shape_count(&self) -> usize {
        let mut n = 0;
        self.walk(|node, _, _| {
            if matches!(node.content, NodeContent::Shape(_)) {
                n += 1;
            }
        });
        n
    }

    /// Find the first node with the given name.
    pub fn find(&self, name: &str) -> Option<&RenderNode> {
        self.root.find(name)
    }
}

impl fmt::Display for RenderTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frame {} ({}x{})",
            self.frame, self.width, self.height
        )?;
        let mut out = String::new();
        self.walk(|node, _, depth| {
            let indent = "  ".repeat(depth + 1);
            let name = node.name.as_deref().unwrap_or("-");
            let kind = match &node.content {
                NodeContent::Group(c) => format!("group[{}]", c.len()),
                NodeContent::Shape(s) => {
                    let mut k = String::from("shape");
                    if s.fill.is_some() {
                        k.push_str(" fill");
                    }
                    if s.stroke.is_some() {
                        k.push_str(" stroke");
                    }
                    k
                }
                NodeContent::Image(img) => format!("image {}x{}", img.width, img.height),
            };
            let _ = write!(out, "{indent}{name}: {kind} alpha={:.3}", node.alpha);
            if node.blend_mode != BlendMode::Normal {
                let _ = write!(out, " blend={:?}", node.blend_mode);
            }
            if !node.masks.is_empty() {
                let _ = write!(out, " masks={}", node.masks.len());
            }
            if let Some(matte) = &node.matte {
                let _ = write!(out, " matte={:?}", matte.mode);
            }
            out.push('\n');
        });
        f.write_str(&out)
    }
}

#[derive(Debug, Clone)]
pub struct RenderNode {
    pub name: Option<String>,
    pub transform: Mat3,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub content: NodeContent,
    /// Mask paths live in the same space as `content`.
    pub masks: Vec<Mask>,
    pub matte: Option<Box<Matte>>,
    /// Content outside this rectangle (local space) is discarded.
    pub clip: Option<Rect>,
}

impl RenderNode {
    pub fn group(name: Option<String>, transform: Mat3, children: Vec<RenderNode>) -> Self {
        Self {
            name,
            transform,
            alpha: 1.0,
            blend_mode: BlendMode::Normal,
            content: NodeContent::Group(children),
            masks: Vec::new(),
            matte: None,
            clip: None,
        }
    }

    pub fn shape(name: Option<String>, shape: Shape) -> Self {
        Self {
            content: NodeContent::Shape(shape),
            ..Self::group(name, Mat3::IDENTITY, Vec::new())
        }
    }

    /// Needs an offscreen layer rather than drawing straight into its parent.
    pub fn is_isolated(&self) -> bool {
        !self.masks.is_empty()
            || self.matte.is_some()
            || self.clip.is_some()
            || self.blend_mode != BlendMode::Normal
            || (self.alpha < 1.0 && matches!(self.content, NodeContent::Group(_)))
    }

    pub fn find(&self, name: &str) -> Option<&RenderNode> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        match &self.content {
            NodeContent::Group(children) => children.iter().find_map(|c| c.find(name)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    /// Children in paint order, bottom first.
    Group(Vec<RenderNode>),
    Shape(Shape),
    Image(Arc<ImageData>),
}

/// Premultiplied RGBA8 pixels, drawn into the rectangle `(0,0)-(width,height)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub geometry: ShapeGeometry,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
}

#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    Path(BezPath),
    /// Merge-paths result: coverage of each path combined in order.
    Merged(Vec<(MergeMode, BezPath)>),
}

impl ShapeGeometry {
    /// All contours as one path, ignoring merge operators.
    pub fn flattened(&self) -> BezPath {
        match self {
            ShapeGeometry::Path(p) => p.clone(),
            ShapeGeometry::Merged(parts) => {
                let mut out = BezPath::new();
                for (_, p) in parts {
                    out.extend(p.elements().iter().copied());
                }
                out
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ShapeGeometry::Path(p) => p.elements().is_empty(),
            ShapeGeometry::Merged(parts) => parts.iter().all(|(_, p)| p.elements().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Merge,
    Add,
    Subtract,
    Intersect,
    Exclude,
}

impl MergeMode {
    pub fn from_lottie(mm: u8) -> Self {
        match mm {
            2 => MergeMode::Add,
            3 => MergeMode::Subtract,
            4 => MergeMode::Intersect,
            5 => MergeMode::Exclude,
            _ => MergeMode::Merge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fill {
    pub paint: Paint,
    pub opacity: f32,
    pub rule: FillRule,
}

#[derive(Debug, Clone)]
pub struct Stroke {
    pub paint: Paint,
    pub opacity: f32,
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub dash: Option<DashPattern>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// Straight (not premultiplied) RGBA in 0..1.
    Solid(Vec4),
    Linear {
        start: Vec2,
        end: Vec2,
        stops: Vec<GradientStop>,
    },
    Radial {
        center: Vec2,
        radius: f32,
        focal: Vec2,
        stops: Vec<GradientStop>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_lottie(lc: u8) -> Self {
        match lc {
            2 => LineCap::Round,
            3 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_lottie(lj: u8) -> Self {
        match lj {
            2 => LineJoin::Round,
            3 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashPattern {
    /// Alternating dash and gap lengths; always an even count.
    pub array: Vec<f32>,
    pub offset: f32,
}

#[derive(Debug, Clone)]
pub struct Mask {
    pub mode: MaskMode,
    pub path: BezPath,
    pub opacity: f32,
    pub inverted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    None,
    Add,
    Subtract,
    Intersect,
    Lighten,
    Darken,
    Difference,
}

impl MaskMode {
    pub fn from_lottie(mode: Option<&str>) -> Self {
        match mode {
            Some("n") => MaskMode::None,
            Some("s") => MaskMode::Subtract,
            Some("i") => MaskMode::Intersect,
            Some("l") => MaskMode::Lighten,
            Some("d") => MaskMode::Darken,
            Some("f") => MaskMode::Difference,
            _ => MaskMode::Add,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Matte {
    pub mode: MatteMode,
    pub node: RenderNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatteMode {
    Alpha,
    AlphaInverted,
    Luma,
    LumaInverted,
}

impl MatteMode {
    pub fn from_lottie(tt: u8) -> Option<Self> {
        match tt {
            1 => Some(MatteMode::Alpha),
            2 => Some(MatteMode::AlphaInverted),
            3 => Some(MatteMode::Luma),
            4 => Some(MatteMode::LumaInverted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Lottie `bm` codes 0..=15 in After Effects order. Anything else
    /// (add, hard mix) has no counterpart here.
    pub fn from_lottie(bm: u8) -> Option<Self> {
        Some(match bm {
            0 => BlendMode::Normal,
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Overlay,
            4 => BlendMode::Darken,
            5 => BlendMode::Lighten,
            6 => BlendMode::ColorDodge,
            7 => BlendMode::ColorBurn,
            8 => BlendMode::HardLight,
            9 => BlendMode::SoftLight,
            10 => BlendMode::Difference,
            11 => BlendMode::Exclusion,
            12 => BlendMode::Hue,
            13 => BlendMode::Saturation,
            14 => BlendMode::Color,
            15 => BlendMode::Luminosity,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> RenderNode {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        RenderNode::shape(
            Some(name.to_string()),
            Shape {
                geometry: ShapeGeometry::Path(path),
                fill: Some(Fill {
                    paint: Paint::Solid(Vec4::ONE),
                    opacity: 1.0,
                    rule: FillRule::NonZero,
                }),
                stroke: None,
            },
        )
    }

    #[test]
    fn walk_accumulates_transforms() {
        let inner = RenderNode::group(
            Some("inner".into()),
            Mat3::from_translation(Vec2::new(5.0, 0.0)),
            vec![leaf("dot")],
        );
        let tree = RenderTree {
            width: 10.0,
            height: 10.0,
            frame: 0.0,
            root: RenderNode::group(
                None,
                Mat3::from_translation(Vec2::new(1.0, 2.0)),
                vec![inner],
            ),
        };

        let mut seen = Vec::new();
        tree.walk(|node, world, depth| {
            seen.push((node.name.clone(), world.transform_point2(Vec2::ZERO), depth));
        });
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].0.as_deref(), Some("dot"));
        assert_eq!(seen[2].1, Vec2::new(6.0, 2.0));
        assert_eq!(tree.shape_count(), 1);
        assert!(tree.find("inner").is_some());
        assert!(tree.to_string().contains("dot: shape fill"));
    }

    #[test]
    fn lottie_codes() {
        assert_eq!(BlendMode::from_lottie(1), Some(BlendMode::Multiply));
        assert_eq!(BlendMode::from_lottie(16), None);
        assert_eq!(MaskMode::from_lottie(Some("f")), MaskMode::Difference);
        assert_eq!(MatteMode::from_lottie(3), Some(MatteMode::Luma));
        assert_eq!(MatteMode::from_lottie(0), None);
        assert_eq!(LineCap::from_lottie(2), LineCap::Round);
        assert_eq!(LineJoin::from_lottie(3), LineJoin::Bevel);
    }
}
