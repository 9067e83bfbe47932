//! Colour sources sampled per device pixel. All samples are premultiplied.

use glam::{Vec2, Vec4};
use kurbo::{Affine, Point};
use lottie_core::{GradientStop, ImageData, Paint};

const LUT_SIZE: usize = 256;

pub type Rgba = [f32; 4];

pub fn premultiply(c: Vec4) -> Rgba {
    let a = c.w.clamp(0.0, 1.0);
    [
        c.x.clamp(0.0, 1.0) * a,
        c.y.clamp(0.0, 1.0) * a,
        c.z.clamp(0.0, 1.0) * a,
        a,
    ]
}

/// Straight-alpha colour of a sorted stop list at `t`, clamped at the ends.
fn stop_color(stops: &[GradientStop], t: f32) -> Vec4 {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Vec4::ZERO;
    };
    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let k = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            return a.color.lerp(b.color, k);
        }
    }
    last.color
}

fn gradient_lut(stops: &[GradientStop]) -> Vec<Rgba> {
    let mut sorted = stops.to_vec();
    sorted.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    (0..LUT_SIZE)
        .map(|i| premultiply(stop_color(&sorted, i as f32 / (LUT_SIZE - 1) as f32)))
        .collect()
}

fn lut_at(lut: &[Rgba], t: f32) -> Rgba {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 1.0 };
    lut[(t * (LUT_SIZE - 1) as f32).round() as usize]
}

pub enum Shader<'a> {
    Solid(Rgba),
    Linear {
        inverse: Affine,
        start: Vec2,
        axis: Vec2,
        lut: Vec<Rgba>,
    },
    /// Two-point conical: circles grow from `focal` to the outer circle.
    Radial {
        inverse: Affine,
        center: Vec2,
        focal: Vec2,
        radius: f32,
        lut: Vec<Rgba>,
    },
    Image {
        inverse: Affine,
        image: &'a ImageData,
    },
}

impl<'a> Shader<'a> {
    /// `world` maps paint space to device pixels.
    pub fn new(paint: &Paint, world: Affine) -> Self {
        let inverse = world.inverse();
        match paint {
            Paint::Solid(c) => Shader::Solid(premultiply(*c)),
            Paint::Linear { start, end, stops } => Shader::Linear {
                inverse,
                start: *start,
                axis: *end - *start,
                lut: gradient_lut(stops),
            },
            Paint::Radial {
                center,
                radius,
                focal,
                stops,
            } => Shader::Radial {
                inverse,
                center: *center,
                focal: *focal,
                radius: *radius,
                lut: gradient_lut(stops),
            },
        }
    }

    pub fn image(image: &'a ImageData, world: Affine) -> Self {
        Shader::Image {
            inverse: world.inverse(),
            image,
        }
    }

    /// Sample at the centre of device pixel `(x, y)`.
    pub fn sample(&self, x: i32, y: i32) -> Rgba {
        let device = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        match self {
            Shader::Solid(c) => *c,
            Shader::Linear {
                inverse,
                start,
                axis,
                lut,
            } => {
                let p = *inverse * device;
                let len2 = axis.length_squared();
                if len2 <= f32::EPSILON {
                    return lut[LUT_SIZE - 1];
                }
                let d = Vec2::new(p.x as f32, p.y as f32) - *start;
                lut_at(lut, d.dot(*axis) / len2)
            }
            Shader::Radial {
                inverse,
                center,
                focal,
                radius,
                lut,
            } => {
                let p = *inverse * device;
                lut_at(lut, radial_t(Vec2::new(p.x as f32, p.y as f32), *center, *focal, *radius))
            }
            Shader::Image { inverse, image } => {
                let p = *inverse * device;
                bilinear(image, p.x as f32, p.y as f32)
            }
        }
    }
}

/// Gradient position of `p` for circles interpolating from a point at
/// `focal` to the circle (`center`, `radius`).
fn radial_t(p: Vec2, center: Vec2, focal: Vec2, radius: f32) -> f32 {
    if radius <= f32::EPSILON {
        return 1.0;
    }
    let d = p - focal;
    let cf = center - focal;
    let a = cf.length_squared() - radius * radius;
    let b = d.dot(cf);
    if a.abs() < 1e-6 {
        // focal point on the circle
        return if b.abs() < 1e-6 { 1.0 } else { d.length_squared() / (2.0 * b) };
    }
    let disc = b * b - a * d.length_squared();
    if disc < 0.0 {
        return 1.0;
    }
    (b - disc.sqrt()) / a
}

fn texel(image: &ImageData, x: i64, y: i64) -> Rgba {
    let x = x.clamp(0, image.width as i64 - 1) as usize;
    let y = y.clamp(0, image.height as i64 - 1) as usize;
    let i = (y * image.width as usize + x) * 4;
    match image.pixels.get(i..i + 4) {
        Some(p) => [
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
            p[3] as f32 / 255.0,
        ],
        None => [0.0; 4],
    }
}

fn bilinear(image: &ImageData, u: f32, v: f32) -> Rgba {
    if image.width == 0 || image.height == 0 || !u.is_finite() || !v.is_finite() {
        return [0.0; 4];
    }
    let (fx, fy) = (u - 0.5, v - 0.5);
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);
    let (a, b) = (texel(image, x0, y0), texel(image, x0 + 1, y0));
    let (c, d) = (texel(image, x0, y0 + 1), texel(image, x0 + 1, y0 + 1));
    let mut out = [0.0; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * tx;
        let bottom = c[i] + (d[i] - c[i]) * tx;
        out[i] = top + (bottom - top) * ty;
    }
    out
}
