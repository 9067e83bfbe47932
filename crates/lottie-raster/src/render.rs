use kurbo::{Affine, BezPath, Shape as _};
use lottie_core::geometry::mat3_to_affine;
use lottie_core::{
    FillRule, ImageData, Mask, MaskMode, MergeMode, NodeContent, RenderNode, RenderTree, Result,
    Shape, ShapeGeometry,
};
use tracing::trace;

use crate::canvas::Canvas;
use crate::coverage::{Coverage, CoverageOp, PixelRect};
use crate::paint::Shader;
use crate::stroke::stroke_outline;
use crate::target::RenderTarget;

/// Software rasterizer for [`RenderTree`]s.
///
/// Holds no state between calls, so one value can be shared by any number
/// of threads rendering different frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuRenderer;

impl CpuRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Pixel size of the full frame for `tree`.
    pub fn frame_size(tree: &RenderTree) -> (u32, u32) {
        let dim = |v: f32| v.ceil().clamp(0.0, u32::MAX as f32) as u32;
        (dim(tree.width), dim(tree.height))
    }

    /// Rasterize `tree` into `buffer`. The target is validated first; on
    /// error the buffer is left exactly as it was.
    pub fn draw(&self, tree: &RenderTree, buffer: &mut [u8], target: &RenderTarget) -> Result<()> {
        let (width, height) = Self::frame_size(tree);
        let layout = target.layout(width, height, buffer.len())?;

        let mut canvas = Canvas::new(layout.region);
        Painter {
            bounds: layout.region,
        }
        .node(&tree.root, Affine::IDENTITY, &mut canvas);
        layout.write(&canvas, buffer);

        trace!(
            frame = tree.frame,
            x = layout.region.x0,
            y = layout.region.y0,
            w = layout.region.width(),
            h = layout.region.height(),
            "rasterized frame"
        );
        Ok(())
    }
}

struct Painter {
    bounds: PixelRect,
}

fn device_path(path: &BezPath, world: Affine) -> BezPath {
    let mut out = path.clone();
    out.apply_affine(world);
    out
}

impl Painter {
    fn node(&self, node: &RenderNode, parent: Affine, canvas: &mut Canvas) {
        if node.alpha <= 0.0 {
            return;
        }
        let world = parent * mat3_to_affine(node.transform);

        if !node.is_isolated() {
            self.content(node, world, canvas, node.alpha);
            return;
        }

        let mut layer = Canvas::new(self.bounds);
        self.content(node, world, &mut layer, 1.0);

        if let Some(clip) = node.clip {
            let cov = Coverage::fill(
                &device_path(&clip.to_path(0.1), world),
                FillRule::NonZero,
                self.bounds,
            );
            layer.mask(&cov);
        }
        if !node.masks.is_empty() {
            layer.mask(&self.masks(&node.masks, world));
        }
        if let Some(matte) = &node.matte {
            // the source sits beside this node, under the same parent
            let mut source = Canvas::new(self.bounds);
            self.node(&matte.node, parent, &mut source);
            layer.mask(&source.matte(matte.mode));
        }

        canvas.draw_layer(&layer, node.alpha, node.blend_mode);
    }

    fn content(&self, node: &RenderNode, world: Affine, canvas: &mut Canvas, alpha: f32) {
        match &node.content {
            NodeContent::Group(children) => {
                for child in children {
                    self.node(child, world, canvas);
                }
            }
            NodeContent::Shape(shape) => self.shape(shape, world, canvas, alpha),
            NodeContent::Image(image) => self.image(image, world, canvas, alpha),
        }
    }

    fn shape(&self, shape: &Shape, world: Affine, canvas: &mut Canvas, alpha: f32) {
        if shape.geometry.is_empty() {
            return;
        }
        if let Some(fill) = &shape.fill {
            let cov = self.geometry(&shape.geometry, fill.rule, world);
            canvas.fill(&cov, &Shader::new(&fill.paint, world), fill.opacity * alpha);
        }
        if let Some(stroke) = &shape.stroke {
            if stroke.width <= 0.0 {
                return;
            }
            let scale = world.determinant().abs().sqrt();
            if scale <= 0.0 {
                return;
            }
            let outline = stroke_outline(&shape.geometry.flattened(), stroke, scale);
            let cov = Coverage::fill(&device_path(&outline, world), FillRule::NonZero, self.bounds);
            canvas.fill(&cov, &Shader::new(&stroke.paint, world), stroke.opacity * alpha);
        }
    }

    fn image(&self, image: &ImageData, world: Affine, canvas: &mut Canvas, alpha: f32) {
        let rect = kurbo::Rect::new(0.0, 0.0, image.width as f64, image.height as f64);
        let cov = Coverage::fill(
            &device_path(&rect.to_path(0.1), world),
            FillRule::NonZero,
            self.bounds,
        );
        canvas.fill(&cov, &Shader::image(image, world), alpha);
    }

    fn geometry(&self, geometry: &ShapeGeometry, rule: FillRule, world: Affine) -> Coverage {
        match geometry {
            ShapeGeometry::Path(path) => Coverage::fill(&device_path(path, world), rule, self.bounds),
            ShapeGeometry::Merged(parts) => {
                let mut acc = Coverage::filled(self.bounds, 0.0);
                for (mode, path) in parts {
                    let op = match mode {
                        MergeMode::Merge | MergeMode::Add => CoverageOp::Union,
                        MergeMode::Subtract => CoverageOp::Subtract,
                        MergeMode::Intersect => CoverageOp::Intersect,
                        MergeMode::Exclude => CoverageOp::Difference,
                    };
                    let cov = Coverage::fill(&device_path(path, world), rule, self.bounds);
                    acc.combine(&cov, op);
                }
                acc
            }
        }
    }

    /// Combined mask weights. Accumulation starts empty, or full when the
    /// first active mask subtracts or intersects.
    fn masks(&self, masks: &[Mask], world: Affine) -> Coverage {
        let Some(first) = masks.iter().find(|m| m.mode != MaskMode::None) else {
            return Coverage::filled(self.bounds, 1.0);
        };
        let start = match first.mode {
            MaskMode::Subtract | MaskMode::Intersect => 1.0,
            _ => 0.0,
        };
        let mut acc = Coverage::filled(self.bounds, start);
        for mask in masks {
            let op = match mask.mode {
                MaskMode::None => continue,
                MaskMode::Add => CoverageOp::Union,
                MaskMode::Subtract => CoverageOp::Subtract,
                MaskMode::Intersect => CoverageOp::Intersect,
                MaskMode::Lighten => CoverageOp::Max,
                MaskMode::Darken => CoverageOp::Min,
                MaskMode::Difference => CoverageOp::Difference,
            };
            let mut cov = Coverage::fill(&device_path(&mask.path, world), FillRule::NonZero, self.bounds);
            if mask.inverted {
                let mut inverse = Coverage::filled(self.bounds, 1.0);
                inverse.combine(&cov, CoverageOp::Subtract);
                cov = inverse;
            }
            cov.scale(mask.opacity.clamp(0.0, 1.0));
            acc.combine(&cov, op);
        }
        acc
    }
}
