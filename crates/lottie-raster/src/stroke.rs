use kurbo::{BezPath, Cap, Join, StrokeOpts};
use lottie_core::{LineCap, LineJoin, Stroke};

use crate::coverage::TOLERANCE;

/// Outline of `path` stroked with `stroke`, in the path's own space.
/// `scale` is the local-to-device scale, used to keep the outline's
/// flattening error near [`TOLERANCE`] device pixels.
pub fn stroke_outline(path: &BezPath, stroke: &Stroke, scale: f64) -> BezPath {
    let cap = match stroke.cap {
        LineCap::Butt => Cap::Butt,
        LineCap::Round => Cap::Round,
        LineCap::Square => Cap::Square,
    };
    let join = match stroke.join {
        LineJoin::Miter => Join::Miter,
        LineJoin::Round => Join::Round,
        LineJoin::Bevel => Join::Bevel,
    };

    let mut style = kurbo::Stroke::new(stroke.width as f64)
        .with_caps(cap)
        .with_join(join)
        .with_miter_limit(stroke.miter_limit.max(1.0) as f64);
    if let Some(dash) = &stroke.dash {
        let pattern: Vec<f64> = dash.array.iter().map(|v| *v as f64).collect();
        style = style.with_dashes(dash.offset as f64, pattern);
    }

    let tolerance = TOLERANCE / scale.max(1e-3);
    kurbo::stroke(path.iter(), &style, &StrokeOpts::default(), tolerance)
}
