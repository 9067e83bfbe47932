//! Keyframe tracks and their evaluation.
//!
//! Properties are compiled once at load into [`Track`]s holding typed values,
//! so evaluating a frame is a binary search plus one easing solve.

use crate::error::{LottieError, Result};
use crate::geometry::PathShape;
use glam::{Vec2, Vec4};
use lottie_data::model::{BezierTangent, Property, Value};

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self>;

    fn lerp_spatial(&self, other: &Self, t: f32, _tan_out: Vec2, _tan_in: Vec2) -> Result<Self> {
        self.lerp(other, t)
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self> {
        Ok(self + (other - self) * t)
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self> {
        Ok(Vec2::lerp(*self, *other, t))
    }

    /// Motion along the cubic through `self + to` and `other + ti`.
    fn lerp_spatial(&self, other: &Self, t: f32, tan_out: Vec2, tan_in: Vec2) -> Result<Self> {
        let p0 = *self;
        let p1 = p0 + tan_out;
        let p3 = *other;
        let p2 = p3 + tan_in;
        let mt = 1.0 - t;
        Ok(p0 * (mt * mt * mt) + p1 * (3.0 * mt * mt * t) + p2 * (3.0 * mt * t * t) + p3 * (t * t * t))
    }
}

impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self> {
        Ok(Vec4::lerp(*self, *other, t))
    }
}

// Gradient stop data. Extra trailing entries on either side are held.
impl Interpolatable for Vec<f32> {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self> {
        let len = self.len().max(other.len());
        Ok((0..len)
            .map(|i| match (self.get(i), other.get(i)) {
                (Some(a), Some(b)) => a + (b - a) * t,
                (Some(a), None) => *a,
                (None, Some(b)) => *b,
                (None, None) => 0.0,
            })
            .collect())
    }
}

impl Interpolatable for PathShape {
    fn lerp(&self, other: &Self, t: f32) -> Result<Self> {
        if t <= 0.0 {
            return Ok(self.clone());
        }
        if t >= 1.0 {
            return Ok(other.clone());
        }
        if self.vertices.len() != other.vertices.len() {
            return Err(LottieError::ShapeMismatch {
                context: "path".to_string(),
                from: self.vertices.len(),
                to: other.vertices.len(),
            });
        }

        let mix = |a: &[Vec2], b: &[Vec2]| -> Vec<Vec2> {
            a.iter().zip(b).map(|(p, q)| Vec2::lerp(*p, *q, t)).collect()
        };
        Ok(PathShape {
            closed: self.closed,
            vertices: mix(&self.vertices, &other.vertices),
            in_tangents: mix(&self.in_tangents, &other.in_tangents),
            out_tangents: mix(&self.out_tangents, &other.out_tangents),
        })
    }
}

/// Solve the CSS-style easing curve through (0,0), `p1`, `p2`, (1,1) for `x`.
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let x1 = p1.x.clamp(0.0, 1.0);
    let x2 = p2.x.clamp(0.0, 1.0);

    let bezier = |a: f32, b: f32, t: f32| {
        let mt = 1.0 - t;
        3.0 * mt * mt * t * a + 3.0 * mt * t * t * b + t * t * t
    };
    let slope = |a: f32, b: f32, t: f32| {
        let mt = 1.0 - t;
        3.0 * mt * mt * a + 6.0 * mt * t * (b - a) + 3.0 * t * t * (1.0 - b)
    };

    let mut t = x;
    let mut converged = false;
    for _ in 0..8 {
        let err = bezier(x1, x2, t) - x;
        if err.abs() < 1e-5 {
            converged = true;
            break;
        }
        let d = slope(x1, x2, t);
        if d.abs() < 1e-6 {
            break;
        }
        t = (t - err / d).clamp(0.0, 1.0);
    }

    // Flat tangents stall Newton; bisect instead.
    if !converged {
        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        t = x;
        for _ in 0..32 {
            let v = bezier(x1, x2, t);
            if (v - x).abs() < 1e-6 {
                break;
            }
            if v < x {
                lo = t;
            } else {
                hi = t;
            }
            t = 0.5 * (lo + hi);
        }
    }

    bezier(p1.y, p2.y, t)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Hold,
    Linear,
    Bezier { out: Vec2, r#in: Vec2 },
}

#[derive(Debug, Clone)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
    /// Legacy explicit end value for the segment starting here.
    pub end: Option<T>,
    pub easing: Easing,
    /// Spatial tangents (`to`, `ti`) for motion paths.
    pub spatial: Option<(Vec2, Vec2)>,
}

#[derive(Debug, Clone)]
pub enum Track<T> {
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

fn tangent_point(t: &BezierTangent, fallback: f32) -> Vec2 {
    Vec2::new(
        t.x.first().copied().unwrap_or(fallback),
        t.y.first().copied().unwrap_or(fallback),
    )
}

fn spatial_vec(v: &Option<Vec<f32>>) -> Vec2 {
    match v.as_deref() {
        Some([x, y, ..]) => Vec2::new(*x, *y),
        _ => Vec2::ZERO,
    }
}

impl<T: Interpolatable> Track<T> {
    pub fn constant(value: T) -> Self {
        Track::Static(value)
    }

    /// Compile a document property. `location` names the property in errors.
    pub fn from_property<S>(
        prop: &Property<S>,
        location: &str,
        default: T,
        convert: impl Fn(&S) -> T,
    ) -> Result<Self> {
        if prop.x.is_some() {
            return Err(LottieError::unsupported("expression", location));
        }
        let raw = match &prop.k {
            Value::Default => return Ok(Track::Static(default)),
            Value::Static(v) => return Ok(Track::Static(convert(v))),
            Value::Animated(raw) if raw.is_empty() => return Ok(Track::Static(default)),
            Value::Animated(raw) => raw,
        };

        let mut keyframes: Vec<Keyframe<T>> = Vec::with_capacity(raw.len());
        for (idx, kf) in raw.iter().enumerate() {
            if !kf.t.is_finite() {
                return Err(LottieError::parse(format!(
                    "{location}: keyframe {idx} has a non-finite time"
                )));
            }
            if let Some(prev) = keyframes.last() {
                if kf.t < prev.frame {
                    return Err(LottieError::parse(format!(
                        "{location}: keyframe {idx} at {} precedes {}",
                        kf.t, prev.frame
                    )));
                }
            }

            let value = match (&kf.s, keyframes.last()) {
                (Some(s), _) => convert(s),
                (None, Some(prev)) => prev.end.clone().unwrap_or_else(|| prev.value.clone()),
                (None, None) => {
                    return Err(LottieError::parse(format!(
                        "{location}: first keyframe has no value"
                    )))
                }
            };

            let easing = if kf.h == Some(1) {
                Easing::Hold
            } else {
                let next_in = raw.get(idx + 1).and_then(|n| n.i.as_ref());
                match (&kf.o, kf.i.as_ref().or(next_in)) {
                    (Some(o), Some(i)) => Easing::Bezier {
                        out: tangent_point(o, 0.0),
                        r#in: tangent_point(i, 1.0),
                    },
                    _ => Easing::Linear,
                }
            };

            let spatial = if kf.to.is_some() || kf.ti.is_some() {
                let to = spatial_vec(&kf.to);
                let ti = spatial_vec(&kf.ti);
                (to != Vec2::ZERO || ti != Vec2::ZERO).then_some((to, ti))
            } else {
                None
            };

            keyframes.push(Keyframe {
                frame: kf.t,
                value,
                end: kf.e.as_ref().map(&convert),
                easing,
                spatial,
            });
        }

        if keyframes.len() == 1 {
            let only = keyframes.remove(0);
            return Ok(Track::Static(only.value));
        }
        Ok(Track::Animated(keyframes))
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Track::Animated(_))
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        match self {
            Track::Static(_) => &[],
            Track::Animated(kfs) => kfs,
        }
    }

    pub fn value_at(&self, frame: f32) -> Result<T> {
        let keyframes = match self {
            Track::Static(v) => return Ok(v.clone()),
            Track::Animated(kfs) => kfs,
        };

        // First keyframe strictly after `frame`; the segment is [idx-1, idx].
        let idx = keyframes.partition_point(|kf| kf.frame <= frame);
        if idx == 0 {
            return Ok(keyframes[0].value.clone());
        }
        if idx >= keyframes.len() {
            return Ok(keyframes[keyframes.len() - 1].value.clone());
        }

        let start = &keyframes[idx - 1];
        let end = &keyframes[idx];
        let end_value = start.end.as_ref().unwrap_or(&end.value);

        let duration = end.frame - start.frame;
        if duration <= 0.0 {
            return Ok(end_value.clone());
        }
        let progress = ((frame - start.frame) / duration).clamp(0.0, 1.0);

        let eased = match start.easing {
            Easing::Hold => return Ok(start.value.clone()),
            Easing::Linear => progress,
            Easing::Bezier { out, r#in } => solve_cubic_bezier(out, r#in, progress),
        };

        match start.spatial {
            Some((to, ti)) => start.value.lerp_spatial(end_value, eased, to, ti),
            None => start.value.lerp(end_value, eased),
        }
    }
}

/// `[x, y, ..]` with missing components taken from `default`.
pub fn vec2_from(v: &[f32], default: Vec2) -> Vec2 {
    Vec2::new(
        v.first().copied().unwrap_or(default.x),
        v.get(1).copied().unwrap_or(default.y),
    )
}

/// `[r, g, b, a?]` in 0..1; alpha defaults to opaque.
pub fn color_from(v: &[f32]) -> Vec4 {
    Vec4::new(
        v.first().copied().unwrap_or(0.0),
        v.get(1).copied().unwrap_or(0.0),
        v.get(2).copied().unwrap_or(0.0),
        v.get(3).copied().unwrap_or(1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_data::model::Keyframe as RawKeyframe;

    fn raw(t: f32, s: f32) -> RawKeyframe<f32> {
        RawKeyframe {
            t,
            s: Some(s),
            e: None,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
        }
    }

    fn track(kfs: Vec<RawKeyframe<f32>>) -> Track<f32> {
        let prop = Property {
            a: 1,
            k: Value::Animated(kfs),
            ix: None,
            x: None,
        };
        Track::from_property(&prop, "test", 0.0, |v| *v).unwrap()
    }

    #[test]
    fn binary_search_segments() {
        let t = track(vec![raw(0.0, 0.0), raw(10.0, 10.0), raw(20.0, 30.0)]);

        assert_eq!(t.value_at(0.0).unwrap(), 0.0);
        assert_eq!(t.value_at(10.0).unwrap(), 10.0);
        assert_eq!(t.value_at(20.0).unwrap(), 30.0);
        assert_eq!(t.value_at(-5.0).unwrap(), 0.0);
        assert_eq!(t.value_at(25.0).unwrap(), 30.0);
        assert_eq!(t.value_at(5.0).unwrap(), 5.0);
        assert_eq!(t.value_at(15.0).unwrap(), 20.0);
    }

    #[test]
    fn single_keyframe_is_constant() {
        let t = track(vec![raw(12.0, 7.5)]);
        assert!(!t.is_animated());
        for frame in [-100.0, 0.0, 12.0, 1e6] {
            assert_eq!(t.value_at(frame).unwrap(), 7.5);
        }
    }

    #[test]
    fn hold_keeps_left_value() {
        let mut first = raw(0.0, 1.0);
        first.h = Some(1);
        let t = track(vec![first, raw(10.0, 5.0)]);
        assert_eq!(t.value_at(9.99).unwrap(), 1.0);
        assert_eq!(t.value_at(10.0).unwrap(), 5.0);
    }

    #[test]
    fn zero_length_segment_takes_later_value() {
        let t = track(vec![
            raw(0.0, 0.0),
            raw(10.0, 5.0),
            raw(10.0, 20.0),
            raw(20.0, 30.0),
        ]);
        assert_eq!(t.value_at(10.0).unwrap(), 20.0);
        assert!((t.value_at(5.0).unwrap() - 2.5).abs() < 1e-5);
        assert!((t.value_at(15.0).unwrap() - 25.0).abs() < 1e-5);
    }

    #[test]
    fn bezier_easing_reshapes_progress() {
        let mut first = raw(0.0, 0.0);
        first.o = Some(BezierTangent {
            x: vec![0.42],
            y: vec![0.0],
        });
        first.i = Some(BezierTangent {
            x: vec![1.0],
            y: vec![1.0],
        });
        let t = track(vec![first, raw(10.0, 100.0)]);
        let mid = t.value_at(5.0).unwrap();
        // ease-in lags behind linear at the midpoint
        assert!(mid < 50.0 && mid > 10.0, "mid = {mid}");
        assert!((t.value_at(10.0).unwrap() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn decreasing_times_are_a_parse_error() {
        let prop = Property {
            a: 1,
            k: Value::Animated(vec![raw(10.0, 0.0), raw(5.0, 1.0)]),
            ix: None,
            x: None,
        };
        let err = Track::from_property(&prop, "opacity", 0.0, |v: &f32| *v).unwrap_err();
        assert!(matches!(err, LottieError::Parse(_)));
    }

    #[test]
    fn expressions_are_unsupported() {
        let mut prop = Property::constant(1.0f32);
        prop.x = Some("wiggle(1, 2)".into());
        let err = Track::from_property(&prop, "rotation", 0.0, |v: &f32| *v).unwrap_err();
        assert!(matches!(err, LottieError::UnsupportedFeature { .. }));
    }

    #[test]
    fn legacy_end_values() {
        let mut first = raw(0.0, 0.0);
        first.e = Some(8.0);
        let last = RawKeyframe {
            s: None,
            ..raw(4.0, 0.0)
        };
        let t = track(vec![first, last]);
        assert_eq!(t.value_at(2.0).unwrap(), 4.0);
        assert_eq!(t.value_at(4.0).unwrap(), 8.0);
    }

    #[test]
    fn path_morph_requires_matching_vertices() {
        let a = PathShape {
            closed: true,
            vertices: vec![Vec2::ZERO; 3],
            in_tangents: vec![Vec2::ZERO; 3],
            out_tangents: vec![Vec2::ZERO; 3],
        };
        let b = PathShape {
            vertices: vec![Vec2::ONE; 4],
            in_tangents: vec![Vec2::ZERO; 4],
            out_tangents: vec![Vec2::ZERO; 4],
            ..a.clone()
        };
        assert!(matches!(
            a.lerp(&b, 0.5),
            Err(LottieError::ShapeMismatch { from: 3, to: 4, .. })
        ));
        // endpoints never need a morph
        assert_eq!(a.lerp(&b, 1.0).unwrap(), b);
    }

    #[test]
    fn path_morph_blends_each_vertex() {
        let a = PathShape {
            closed: true,
            vertices: vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)],
            in_tangents: vec![Vec2::ZERO; 3],
            out_tangents: vec![Vec2::new(2.0, 0.0); 3],
        };
        let b = PathShape {
            closed: true,
            vertices: vec![Vec2::new(10.0, 10.0), Vec2::new(30.0, 10.0), Vec2::new(10.0, 30.0)],
            in_tangents: vec![Vec2::new(-4.0, 4.0); 3],
            out_tangents: vec![Vec2::new(6.0, 0.0); 3],
        };

        let mid = a.lerp(&b, 0.5).unwrap();
        assert!(mid.closed);
        assert_eq!(
            mid.vertices,
            vec![Vec2::new(5.0, 5.0), Vec2::new(20.0, 5.0), Vec2::new(5.0, 20.0)]
        );
        assert_eq!(mid.in_tangents, vec![Vec2::new(-2.0, 2.0); 3]);
        assert_eq!(mid.out_tangents, vec![Vec2::new(4.0, 0.0); 3]);

        let quarter = a.lerp(&b, 0.25).unwrap();
        assert_eq!(quarter.vertices[1], Vec2::new(15.0, 2.5));
    }

    #[test]
    fn easing_solver_endpoints() {
        let p1 = Vec2::new(0.25, 0.1);
        let p2 = Vec2::new(0.25, 1.0);
        assert_eq!(solve_cubic_bezier(p1, p2, 0.0), 0.0);
        assert_eq!(solve_cubic_bezier(p1, p2, 1.0), 1.0);
        let linear = solve_cubic_bezier(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), 0.3);
        assert!((linear - 0.3).abs() < 1e-3);
    }
}
