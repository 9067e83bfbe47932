//! Path construction for the parametric shape items.
//!
//! Every builder emits paths in the winding and start point After Effects
//! uses, since trim paths measure from the start of each contour.

use glam::{Mat3, Vec2};
use kurbo::{Affine, BezPath, PathEl, Point};
use lottie_data::model as data;
use std::f64::consts::PI;

/// Cubic approximation constant for a quarter circle.
const KAPPA: f64 = 0.552_284_75;

/// A single bezier contour with vertex-relative tangents, as stored in the
/// document. This is the value type shape morphing interpolates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathShape {
    pub closed: bool,
    pub vertices: Vec<Vec2>,
    pub in_tangents: Vec<Vec2>,
    pub out_tangents: Vec<Vec2>,
}

impl PathShape {
    pub fn from_data(path: &data::BezierPath) -> Self {
        let to_vec = |pts: &[data::Vec2]| pts.iter().map(|p| Vec2::from(*p)).collect::<Vec<_>>();
        let vertices = to_vec(&path.v);
        let mut in_tangents = to_vec(&path.i);
        let mut out_tangents = to_vec(&path.o);
        in_tangents.resize(vertices.len(), Vec2::ZERO);
        out_tangents.resize(vertices.len(), Vec2::ZERO);
        Self {
            closed: path.c,
            vertices,
            in_tangents,
            out_tangents,
        }
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut bp = BezPath::new();
        let n = self.vertices.len();
        if n == 0 {
            return bp;
        }
        bp.move_to(point(self.vertices[0]));
        for i in 0..n {
            let next = (i + 1) % n;
            if next == 0 && !self.closed {
                break;
            }
            let p0 = self.vertices[i];
            let p1 = self.vertices[next];
            let c1 = p0 + self.out_tangents[i];
            let c2 = p1 + self.in_tangents[next];
            if c1 == p0 && c2 == p1 {
                bp.line_to(point(p1));
            } else {
                bp.curve_to(point(c1), point(c2), point(p1));
            }
        }
        if self.closed {
            bp.close_path();
        }
        bp
    }
}

pub fn point(v: Vec2) -> Point {
    Point::new(v.x as f64, v.y as f64)
}

pub fn mat3_to_affine(m: Mat3) -> Affine {
    Affine::new([
        m.x_axis.x as f64,
        m.x_axis.y as f64,
        m.y_axis.x as f64,
        m.y_axis.y as f64,
        m.z_axis.x as f64,
        m.z_axis.y as f64,
    ])
}

pub fn transform_path(path: &BezPath, m: Mat3) -> BezPath {
    if m == Mat3::IDENTITY {
        return path.clone();
    }
    let mut out = path.clone();
    out.apply_affine(mat3_to_affine(m));
    out
}

/// Rectangle centred on `pos`, starting at the top-right corner, clockwise.
pub fn rect_path(pos: Vec2, size: Vec2, radius: f32) -> BezPath {
    let mut bp = BezPath::new();
    let (hw, hh) = (size.x as f64 / 2.0, size.y as f64 / 2.0);
    let (cx, cy) = (pos.x as f64, pos.y as f64);
    let (left, right, top, bottom) = (cx - hw, cx + hw, cy - hh, cy + hh);
    let r = (radius as f64).max(0.0).min(hw.abs()).min(hh.abs());

    if r <= 0.0 {
        bp.move_to((right, top));
        bp.line_to((right, bottom));
        bp.line_to((left, bottom));
        bp.line_to((left, top));
        bp.close_path();
        return bp;
    }

    let k = r * (1.0 - KAPPA);
    bp.move_to((right, top + r));
    bp.line_to((right, bottom - r));
    bp.curve_to((right, bottom - k), (right - k, bottom), (right - r, bottom));
    bp.line_to((left + r, bottom));
    bp.curve_to((left + k, bottom), (left, bottom - k), (left, bottom - r));
    bp.line_to((left, top + r));
    bp.curve_to((left, top + k), (left + k, top), (left + r, top));
    bp.line_to((right - r, top));
    bp.curve_to((right - k, top), (right, top + k), (right, top + r));
    bp.close_path();
    bp
}

/// Ellipse centred on `pos`, starting at twelve o'clock, clockwise.
pub fn ellipse_path(pos: Vec2, size: Vec2) -> BezPath {
    let mut bp = BezPath::new();
    let (rx, ry) = (size.x as f64 / 2.0, size.y as f64 / 2.0);
    let (cx, cy) = (pos.x as f64, pos.y as f64);
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);

    bp.move_to((cx, cy - ry));
    bp.curve_to((cx + kx, cy - ry), (cx + rx, cy - ky), (cx + rx, cy));
    bp.curve_to((cx + rx, cy + ky), (cx + kx, cy + ry), (cx, cy + ry));
    bp.curve_to((cx - kx, cy + ry), (cx - rx, cy + ky), (cx - rx, cy));
    bp.curve_to((cx - rx, cy - ky), (cx - kx, cy - ry), (cx, cy - ry));
    bp.close_path();
    bp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarKind {
    Star,
    Polygon,
}

#[derive(Debug, Clone, Copy)]
pub struct PolystarParams {
    pub kind: StarKind,
    pub center: Vec2,
    pub points: f32,
    pub rotation: f32,
    pub outer_radius: f32,
    pub outer_roundness: f32,
    pub inner_radius: f32,
    pub inner_roundness: f32,
}

/// Upper bound on polystar points; larger counts are drawn with this many.
pub const MAX_POLYSTAR_POINTS: f32 = 1000.0;

pub fn polystar_path(params: &PolystarParams) -> BezPath {
    let mut path = BezPath::new();
    let num_points = params.points.round();
    if num_points.is_nan() || num_points < 3.0 {
        return path;
    }
    let num_points = num_points.min(MAX_POLYSTAR_POINTS);

    let is_star = params.kind == StarKind::Star;
    let total = if is_star { num_points * 2.0 } else { num_points } as usize;
    let start_angle = (params.rotation as f64 - 90.0).to_radians();
    let step = 2.0 * PI / total as f64;

    let radius_at = |i: usize| -> (f64, f64) {
        if is_star && i % 2 == 1 {
            (params.inner_radius as f64, params.inner_roundness as f64)
        } else {
            (params.outer_radius as f64, params.outer_roundness as f64)
        }
    };

    // (vertex, in control, out control)
    let mut corners = Vec::with_capacity(total);
    for i in 0..total {
        let (r, roundness) = radius_at(i);
        let angle = start_angle + step * i as f64;
        let (sin_a, cos_a) = angle.sin_cos();
        let vertex = Point::new(
            params.center.x as f64 + r * cos_a,
            params.center.y as f64 + r * sin_a,
        );
        let tangent = kurbo::Vec2::new(-sin_a, cos_a);
        let d = r * step * roundness * 0.01;
        corners.push((vertex, vertex - tangent * d, vertex + tangent * d));
    }

    path.move_to(corners[0].0);
    for i in 0..total {
        let next = (i + 1) % total;
        let (_, _, out_cp) = corners[i];
        let (vertex, in_cp, _) = corners[next];
        if out_cp == corners[i].0 && in_cp == vertex {
            path.line_to(vertex);
        } else {
            path.curve_to(out_cp, in_cp, vertex);
        }
    }
    path.close_path();
    path
}

/// Split a path into contours of (start point, elements after the move).
fn contours(path: &BezPath) -> Vec<(Point, Vec<PathEl>, bool)> {
    let mut out: Vec<(Point, Vec<PathEl>, bool)> = Vec::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.push((p, Vec::new(), false)),
            PathEl::ClosePath => {
                if let Some(last) = out.last_mut() {
                    last.2 = true;
                }
            }
            other => {
                // Drawing after a close continues from the closed contour's start.
                if !matches!(out.last(), Some(c) if !c.2) {
                    let start = out.last().map(|c| c.0).unwrap_or(Point::ZERO);
                    out.push((start, Vec::new(), false));
                }
                if let Some(last) = out.last_mut() {
                    last.1.push(other);
                }
            }
        }
    }
    out
}

/// Round the corners of every contour made purely of straight lines.
/// Curved contours are left as they are.
pub fn round_corners(path: &BezPath, radius: f32) -> BezPath {
    if radius <= 0.0 {
        return path.clone();
    }
    let radius = radius as f64;
    let mut out = BezPath::new();

    for (start, els, closed) in contours(path) {
        let polygonal = els.iter().all(|el| matches!(el, PathEl::LineTo(_)));
        if !polygonal || els.is_empty() {
            out.push(PathEl::MoveTo(start));
            for el in els {
                out.push(el);
            }
            if closed {
                out.close_path();
            }
            continue;
        }

        let mut pts = vec![start];
        pts.extend(els.iter().filter_map(|el| match el {
            PathEl::LineTo(p) => Some(*p),
            _ => None,
        }));
        if closed && pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        let n = pts.len();

        for i in 0..n {
            let curr = pts[i];
            let at_open_end = !closed && (i == 0 || i == n - 1);
            let (prev, next) = (pts[(i + n - 1) % n], pts[(i + 1) % n]);
            let v1 = prev - curr;
            let v2 = next - curr;
            let (len1, len2) = (v1.hypot(), v2.hypot());

            if at_open_end || len1 < 1e-3 || len2 < 1e-3 {
                if i == 0 {
                    out.move_to(curr);
                } else {
                    out.line_to(curr);
                }
                continue;
            }

            // Every edge is shared by two corners, so each may use half of it.
            let d = radius.min(len1 * 0.5).min(len2 * 0.5);
            let p_start = curr + v1 * (d / len1);
            let p_end = curr + v2 * (d / len2);
            let c1 = p_start + (curr - p_start) * KAPPA;
            let c2 = p_end + (curr - p_end) * KAPPA;
            if i == 0 {
                out.move_to(p_start);
            } else {
                out.line_to(p_start);
            }
            out.curve_to(c1, c2, p_end);
        }
        if closed {
            out.close_path();
        }
    }
    out
}
