//! Trim paths: keep only a fraction of each outline's length.

use kurbo::{BezPath, CubicBez, Line, ParamCurve, ParamCurveArclen, PathEl, PathSeg, Point, QuadBez};

const ARCLEN_ACCURACY: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    /// Every shape is trimmed on its own with the same range.
    Simultaneous,
    /// Shapes are laid end to end and trimmed as one outline.
    Individual,
}

impl TrimMode {
    pub fn from_lottie(m: u8) -> Self {
        if m == 2 {
            TrimMode::Individual
        } else {
            TrimMode::Simultaneous
        }
    }
}

/// Start and end as fractions of the length, offset in whole turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRange {
    pub start: f32,
    pub end: f32,
    pub offset: f32,
    pub mode: TrimMode,
}

enum Coverage {
    Full,
    Empty,
    Spans(Vec<(f64, f64)>),
}

impl TrimRange {
    fn coverage(&self) -> Coverage {
        let mut s = self.start.clamp(0.0, 1.0) as f64;
        let mut e = self.end.clamp(0.0, 1.0) as f64;
        if s > e {
            std::mem::swap(&mut s, &mut e);
        }
        if e - s >= 1.0 - 1e-6 {
            return Coverage::Full;
        }
        if e - s <= 1e-6 {
            return Coverage::Empty;
        }

        let o = (self.offset as f64).rem_euclid(1.0);
        let (mut a, mut b) = (s + o, e + o);
        if a >= 1.0 {
            a -= 1.0;
            b -= 1.0;
        }
        if b > 1.0 {
            Coverage::Spans(vec![(a, 1.0), (0.0, b - 1.0)])
        } else {
            Coverage::Spans(vec![(a, b)])
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.coverage(), Coverage::Full)
    }

    /// Trim each path in place according to the mode.
    pub fn apply(&self, paths: &mut [BezPath]) {
        let spans = match self.coverage() {
            Coverage::Full => return,
            Coverage::Empty => {
                paths.iter_mut().for_each(|p| *p = BezPath::new());
                return;
            }
            Coverage::Spans(spans) => spans,
        };

        match self.mode {
            TrimMode::Simultaneous => {
                for path in paths.iter_mut() {
                    let m = Measured::new(path);
                    let ranges: Vec<_> = spans.iter().map(|(a, b)| (a * m.total, b * m.total)).collect();
                    *path = m.extract(&ranges);
                }
            }
            TrimMode::Individual => {
                let measured: Vec<_> = paths.iter().map(Measured::new).collect();
                let total: f64 = measured.iter().map(|m| m.total).sum();
                let mut base = 0.0;
                for (path, m) in paths.iter_mut().zip(&measured) {
                    let ranges: Vec<_> = spans
                        .iter()
                        .map(|(a, b)| (a * total - base, b * total - base))
                        .collect();
                    *path = m.extract(&ranges);
                    base += m.total;
                }
            }
        }
    }
}

struct Piece {
    seg: PathSeg,
    offset: f64,
    len: f64,
    starts_contour: bool,
}

struct Measured {
    pieces: Vec<Piece>,
    total: f64,
}

impl Measured {
    fn new(path: &BezPath) -> Self {
        let mut pieces = Vec::new();
        let mut total = 0.0;
        let (mut start, mut last) = (Point::ZERO, Point::ZERO);
        let mut fresh = true;

        for el in path.elements() {
            let seg = match *el {
                PathEl::MoveTo(p) => {
                    start = p;
                    last = p;
                    fresh = true;
                    continue;
                }
                PathEl::LineTo(p) => PathSeg::Line(Line::new(last, p)),
                PathEl::QuadTo(c, p) => PathSeg::Quad(QuadBez::new(last, c, p)),
                PathEl::CurveTo(c1, c2, p) => PathSeg::Cubic(CubicBez::new(last, c1, c2, p)),
                PathEl::ClosePath => {
                    let closing = (last != start).then(|| PathSeg::Line(Line::new(last, start)));
                    last = start;
                    match closing {
                        Some(seg) => seg,
                        None => {
                            fresh = true;
                            continue;
                        }
                    }
                }
            };
            let len = seg.arclen(ARCLEN_ACCURACY);
            last = seg.end();
            pieces.push(Piece {
                seg,
                offset: total,
                len,
                starts_contour: fresh,
            });
            fresh = matches!(el, PathEl::ClosePath);
            total += len;
        }
        Self { pieces, total }
    }

    /// The parts of the outline inside the given length ranges.
    fn extract(&self, ranges: &[(f64, f64)]) -> BezPath {
        let mut out = BezPath::new();
        for &(from, to) in ranges {
            if to <= from {
                continue;
            }
            let mut prev: Option<usize> = None;
            for (idx, piece) in self.pieces.iter().enumerate() {
                let (s0, s1) = (piece.offset, piece.offset + piece.len);
                if s1 <= from || s0 >= to || piece.len <= 0.0 {
                    continue;
                }
                let t0 = if from > s0 {
                    piece.seg.inv_arclen(from - s0, ARCLEN_ACCURACY)
                } else {
                    0.0
                };
                let t1 = if to < s1 {
                    piece.seg.inv_arclen(to - s0, ARCLEN_ACCURACY)
                } else {
                    1.0
                };
                let sub = piece.seg.subsegment(t0..t1);

                let continues = prev == Some(idx.wrapping_sub(1)) && !piece.starts_contour;
                if !continues {
                    out.move_to(sub.start());
                }
                match sub {
                    PathSeg::Line(l) => out.line_to(l.p1),
                    PathSeg::Quad(q) => out.quad_to(q.p1, q.p2),
                    PathSeg::Cubic(c) => out.curve_to(c.p1, c.p2, c.p3),
                }
                prev = Some(idx);
            }
        }
        out
    }
}
