//! Anti-aliased coverage.
//!
//! Paths are flattened to line segments and sampled on `SUBSAMPLES`
//! horizontal lines per pixel row. Along each sample line the covered
//! spans are exact, so horizontal edges get fractional coverage from the
//! crossing position and vertical edges from the number of lines inside.

use kurbo::{BezPath, PathEl, Point};
use lottie_core::FillRule;

/// Flattening tolerance in device pixels.
pub const TOLERANCE: f64 = 0.25;

const SUBSAMPLES: usize = 5;

/// Integer pixel rectangle, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        (self.x1 - self.x0).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.y1 - self.y0).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let r = PixelRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.is_empty() {
            PixelRect::EMPTY
        } else {
            r
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Row-major index of an inside pixel.
    pub fn index(&self, x: i32, y: i32) -> usize {
        (y - self.y0) as usize * self.width() + (x - self.x0) as usize
    }
}

/// How a second coverage is folded into the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageOp {
    Union,
    Subtract,
    Intersect,
    Difference,
    Max,
    Min,
}

impl CoverageOp {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            CoverageOp::Union => a + b - a * b,
            CoverageOp::Subtract => a * (1.0 - b),
            CoverageOp::Intersect => a * b,
            CoverageOp::Difference => (a - b).abs(),
            CoverageOp::Max => a.max(b),
            CoverageOp::Min => a.min(b),
        }
    }
}

/// Per-pixel coverage in `0..=1` over `bounds`; zero everywhere else.
#[derive(Debug, Clone)]
pub struct Coverage {
    bounds: PixelRect,
    data: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    dir: i32,
}

impl Edge {
    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

fn push_edge(out: &mut Vec<Edge>, a: Point, b: Point) {
    if a.y == b.y || !(a.is_finite() && b.is_finite()) {
        return;
    }
    let edge = if a.y < b.y {
        Edge {
            x0: a.x,
            y0: a.y,
            x1: b.x,
            y1: b.y,
            dir: 1,
        }
    } else {
        Edge {
            x0: b.x,
            y0: b.y,
            x1: a.x,
            y1: a.y,
            dir: -1,
        }
    };
    out.push(edge);
}

/// Line edges of `path`, every subpath implicitly closed.
fn edges(path: &BezPath) -> Vec<Edge> {
    let mut out = Vec::new();
    let mut start = Point::ZERO;
    let mut last = Point::ZERO;
    kurbo::flatten(path.iter(), TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            push_edge(&mut out, last, start);
            start = p;
            last = p;
        }
        PathEl::LineTo(p) => {
            push_edge(&mut out, last, p);
            last = p;
        }
        PathEl::ClosePath => {
            push_edge(&mut out, last, start);
            last = start;
        }
        PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => {
            push_edge(&mut out, last, p);
            last = p;
        }
    });
    push_edge(&mut out, last, start);
    out
}

fn add_span(row: &mut [f32], a: f64, b: f64, weight: f32) {
    let ia = a.floor() as usize;
    let ib = b.floor() as usize;
    if ia >= row.len() {
        return;
    }
    if ia == ib {
        row[ia] += (b - a) as f32 * weight;
        return;
    }
    row[ia] += (ia as f64 + 1.0 - a) as f32 * weight;
    let full_end = ib.min(row.len());
    for v in &mut row[ia + 1..full_end] {
        *v += weight;
    }
    if ib < row.len() {
        row[ib] += (b - ib as f64) as f32 * weight;
    }
}

impl Coverage {
    pub fn filled(bounds: PixelRect, value: f32) -> Self {
        Self {
            bounds,
            data: vec![value; bounds.width() * bounds.height()],
        }
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        if self.bounds.contains(x, y) {
            self.data[self.bounds.index(x, y)]
        } else {
            0.0
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|v| *v <= 0.0)
    }

    /// Scan-convert `path` (device space) inside `clip`.
    pub fn fill(path: &BezPath, rule: FillRule, clip: PixelRect) -> Self {
        let mut edges = edges(path);
        if edges.is_empty() {
            return Self::filled(PixelRect::EMPTY, 0.0);
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for e in &edges {
            min_x = min_x.min(e.x0).min(e.x1);
            max_x = max_x.max(e.x0).max(e.x1);
            min_y = min_y.min(e.y0);
            max_y = max_y.max(e.y1);
        }
        let bbox = PixelRect::new(
            min_x.floor().max(i32::MIN as f64) as i32,
            min_y.floor().max(i32::MIN as f64) as i32,
            max_x.ceil().min(i32::MAX as f64) as i32,
            max_y.ceil().min(i32::MAX as f64) as i32,
        );
        let bounds = bbox.intersect(&clip);
        if bounds.is_empty() {
            return Self::filled(PixelRect::EMPTY, 0.0);
        }

        edges.sort_by(|a, b| a.y0.total_cmp(&b.y0));
        let width = bounds.width();
        let mut data = vec![0.0f32; width * bounds.height()];
        let weight = 1.0 / SUBSAMPLES as f32;
        let (left, right) = (bounds.x0 as f64, bounds.x1 as f64);

        let mut next = 0;
        let mut active: Vec<usize> = Vec::new();
        let mut crossings: Vec<(f64, i32)> = Vec::new();

        for (row_idx, row) in data.chunks_exact_mut(width).enumerate() {
            let y = (bounds.y0 + row_idx as i32) as f64;
            for s in 0..SUBSAMPLES {
                let sy = y + (s as f64 + 0.5) / SUBSAMPLES as f64;
                while next < edges.len() && edges[next].y0 <= sy {
                    active.push(next);
                    next += 1;
                }
                active.retain(|&i| edges[i].y1 > sy);

                crossings.clear();
                crossings.extend(active.iter().map(|&i| (edges[i].x_at(sy), edges[i].dir)));
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    let inside = match rule {
                        FillRule::NonZero => winding != 0,
                        FillRule::EvenOdd => winding % 2 != 0,
                    };
                    if !inside {
                        continue;
                    }
                    let a = pair[0].0.max(left);
                    let b = pair[1].0.min(right);
                    if b > a {
                        add_span(row, a - left, b - left, weight);
                    }
                }
            }
        }

        for v in &mut data {
            *v = v.clamp(0.0, 1.0);
        }
        Self { bounds, data }
    }

    /// Fold `other` into every pixel of `self.bounds`.
    pub fn combine(&mut self, other: &Coverage, op: CoverageOp) {
        let b = self.bounds;
        for y in b.y0..b.y1 {
            for x in b.x0..b.x1 {
                let i = b.index(x, y);
                self.data[i] = op.apply(self.data[i], other.get(x, y)).clamp(0.0, 1.0);
            }
        }
    }

    pub fn scale(&mut self, k: f32) {
        if k != 1.0 {
            self.data.iter_mut().for_each(|v| *v *= k);
        }
    }

    pub(crate) fn from_parts(bounds: PixelRect, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), bounds.width() * bounds.height());
        Self { bounds, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape as _;

    const CLIP: PixelRect = PixelRect {
        x0: 0,
        y0: 0,
        x1: 16,
        y1: 16,
    };

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
        kurbo::Rect::new(x0, y0, x1, y1).to_path(0.1)
    }

    #[test]
    fn aligned_rect_is_exact() {
        let cov = Coverage::fill(&rect(2.0, 2.0, 6.0, 5.0), FillRule::NonZero, CLIP);
        assert_eq!(cov.bounds(), PixelRect::new(2, 2, 6, 5));
        assert!((cov.get(3, 3) - 1.0).abs() < 1e-6);
        assert_eq!(cov.get(1, 3), 0.0);
        assert_eq!(cov.get(6, 3), 0.0);
    }

    #[test]
    fn half_pixel_edge_is_half_covered() {
        let cov = Coverage::fill(&rect(0.0, 0.0, 2.5, 4.0), FillRule::NonZero, CLIP);
        assert!((cov.get(2, 1) - 0.5).abs() < 1e-5);
        assert!((cov.get(1, 1) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn clip_bounds_the_result() {
        let cov = Coverage::fill(&rect(-10.0, -10.0, 100.0, 100.0), FillRule::NonZero, CLIP);
        assert_eq!(cov.bounds(), CLIP);
        assert!((cov.get(15, 15) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fill_rules_differ_on_overlap() {
        let mut path = rect(0.0, 0.0, 8.0, 8.0);
        path.extend(rect(2.0, 2.0, 6.0, 6.0));
        let nonzero = Coverage::fill(&path, FillRule::NonZero, CLIP);
        let evenodd = Coverage::fill(&path, FillRule::EvenOdd, CLIP);
        assert!((nonzero.get(4, 4) - 1.0).abs() < 1e-5);
        assert_eq!(evenodd.get(4, 4), 0.0);
        assert!((evenodd.get(1, 1) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn open_paths_are_closed() {
        let mut tri = BezPath::new();
        tri.move_to((0.0, 0.0));
        tri.line_to((8.0, 0.0));
        tri.line_to((0.0, 8.0));
        let cov = Coverage::fill(&tri, FillRule::NonZero, CLIP);
        assert!(cov.get(1, 1) > 0.9);
        assert_eq!(cov.get(7, 7), 0.0);
    }

    #[test]
    fn degenerate_input_is_empty() {
        let mut line = BezPath::new();
        line.move_to((0.0, 3.0));
        line.line_to((10.0, 3.0));
        assert!(Coverage::fill(&line, FillRule::NonZero, CLIP).is_empty());
        assert!(Coverage::fill(&BezPath::new(), FillRule::NonZero, CLIP).is_empty());
    }

    #[test]
    fn combine_ops() {
        let a = Coverage::fill(&rect(0.0, 0.0, 8.0, 16.0), FillRule::NonZero, CLIP);
        let b = Coverage::fill(&rect(4.0, 0.0, 12.0, 16.0), FillRule::NonZero, CLIP);
        let at = |op| {
            let mut acc = Coverage::filled(CLIP, 0.0);
            acc.combine(&a, CoverageOp::Union);
            acc.combine(&b, op);
            [acc.get(2, 2), acc.get(6, 2), acc.get(10, 2)]
        };
        assert_eq!(at(CoverageOp::Union), [1.0, 1.0, 1.0]);
        assert_eq!(at(CoverageOp::Subtract), [1.0, 0.0, 0.0]);
        assert_eq!(at(CoverageOp::Intersect), [0.0, 1.0, 0.0]);
        assert_eq!(at(CoverageOp::Difference), [1.0, 0.0, 1.0]);
    }
}
