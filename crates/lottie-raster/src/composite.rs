//! Porter-Duff source-over with separable and non-separable blend modes,
//! on premultiplied `f32` RGBA.

use lottie_core::BlendMode;

use crate::paint::Rgba;

#[inline]
pub fn source_over(dst: &mut Rgba, src: Rgba, k: f32) {
    let sa = src[3] * k;
    if sa <= 0.0 {
        return;
    }
    let inv = 1.0 - sa;
    for c in 0..4 {
        dst[c] = src[c] * k + dst[c] * inv;
    }
}

/// Composite `src` onto `dst` pixel for pixel. The mode is matched once;
/// each arm runs its own specialised loop.
pub fn composite(dst: &mut [Rgba], src: &[Rgba], opacity: f32, mode: BlendMode) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    match mode {
        BlendMode::Normal => {
            for (d, s) in dst.iter_mut().zip(src) {
                source_over(d, *s, opacity);
            }
        }
        BlendMode::Multiply => separable(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => separable(dst, src, opacity, |s, d| s + d - s * d),
        BlendMode::Overlay => separable(dst, src, opacity, |s, d| hard_light(d, s)),
        BlendMode::Darken => separable(dst, src, opacity, f32::min),
        BlendMode::Lighten => separable(dst, src, opacity, f32::max),
        BlendMode::ColorDodge => separable(dst, src, opacity, |s, d| {
            if d <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
        BlendMode::ColorBurn => separable(dst, src, opacity, |s, d| {
            if d >= 1.0 {
                1.0
            } else if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }),
        BlendMode::HardLight => separable(dst, src, opacity, hard_light),
        BlendMode::SoftLight => separable(dst, src, opacity, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
        BlendMode::Difference => separable(dst, src, opacity, |s, d| (d - s).abs()),
        BlendMode::Exclusion => separable(dst, src, opacity, |s, d| d + s - 2.0 * d * s),
        BlendMode::Hue => blend(dst, src, opacity, |s, d| set_lum(set_sat(s, sat(d)), lum(d))),
        BlendMode::Saturation => {
            blend(dst, src, opacity, |s, d| set_lum(set_sat(d, sat(s)), lum(d)))
        }
        BlendMode::Color => blend(dst, src, opacity, |s, d| set_lum(s, lum(d))),
        BlendMode::Luminosity => blend(dst, src, opacity, |s, d| set_lum(d, lum(s))),
    }
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        2.0 * s * d
    } else {
        1.0 - 2.0 * (1.0 - s) * (1.0 - d)
    }
}

#[inline(always)]
fn separable<F>(dst: &mut [Rgba], src: &[Rgba], opacity: f32, f: F)
where
    F: Fn(f32, f32) -> f32,
{
    blend(dst, src, opacity, |s, d| [f(s[0], d[0]), f(s[1], d[1]), f(s[2], d[2])])
}

/// `out = sp(1 - da) + dp(1 - sa) + B(sc, dc) sa da`, with `B` applied to
/// unpremultiplied colour.
#[inline(always)]
fn blend<F>(dst: &mut [Rgba], src: &[Rgba], opacity: f32, f: F)
where
    F: Fn([f32; 3], [f32; 3]) -> [f32; 3],
{
    for (d, s) in dst.iter_mut().zip(src) {
        let sa = s[3] * opacity;
        if sa <= 0.0 {
            continue;
        }
        let sp = [s[0] * opacity, s[1] * opacity, s[2] * opacity];
        let da = d[3];
        let unpremul = |c: f32, a: f32| if a > 0.0 { (c / a).clamp(0.0, 1.0) } else { 0.0 };
        let sc = [unpremul(sp[0], sa), unpremul(sp[1], sa), unpremul(sp[2], sa)];
        let dc = [unpremul(d[0], da), unpremul(d[1], da), unpremul(d[2], da)];
        let b = f(sc, dc);
        for c in 0..3 {
            d[c] = (sp[c] * (1.0 - da) + d[c] * (1.0 - sa) + b[c].clamp(0.0, 1.0) * sa * da)
                .clamp(0.0, 1.0);
        }
        d[3] = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 && l - n > 0.0 {
        out = out.map(|v| l + (v - l) * l / (l - n));
    }
    if x > 1.0 && x - l > 0.0 {
        out = out.map(|v| l + (v - l) * (1.0 - l) / (x - l));
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color(c.map(|v| v + d))
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    if max - min <= 0.0 {
        return [0.0; 3];
    }
    c.map(|v| (v - min) * s / (max - min))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(dst: Rgba, src: Rgba, mode: BlendMode) -> Rgba {
        let mut d = [dst];
        composite(&mut d, &[src], 1.0, mode);
        d[0]
    }

    fn close(a: Rgba, b: Rgba) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn normal_is_source_over() {
        let out = one([0.0, 0.0, 1.0, 1.0], [0.5, 0.0, 0.0, 0.5], BlendMode::Normal);
        assert!(close(out, [0.5, 0.0, 0.5, 1.0]));
        let mut d = [[0.0, 0.0, 1.0, 1.0]];
        composite(&mut d, &[[1.0, 0.0, 0.0, 1.0]], 0.25, BlendMode::Normal);
        assert!(close(d[0], [0.25, 0.0, 0.75, 1.0]));
    }

    #[test]
    fn multiply_and_screen_on_opaque() {
        let grey = [0.5, 0.5, 0.5, 1.0];
        assert!(close(one(grey, grey, BlendMode::Multiply), [0.25, 0.25, 0.25, 1.0]));
        assert!(close(one(grey, grey, BlendMode::Screen), [0.75, 0.75, 0.75, 1.0]));
    }

    #[test]
    fn blending_over_transparent_is_plain_source() {
        let src = [0.2, 0.4, 0.1, 0.5];
        for mode in [BlendMode::Multiply, BlendMode::Difference, BlendMode::Hue] {
            assert!(close(one([0.0; 4], src, mode), src), "{mode:?}");
        }
    }

    #[test]
    fn luminosity_keeps_destination_hue() {
        let red = [1.0, 0.0, 0.0, 1.0];
        let white = [1.0, 1.0, 1.0, 1.0];
        let out = one(red, white, BlendMode::Luminosity);
        // white's luminosity pushed into red clips to white
        assert!(close(out, white));
        let black = [0.0, 0.0, 0.0, 1.0];
        assert!(close(one(red, black, BlendMode::Luminosity), black));
    }

    #[test]
    fn zero_opacity_is_a_no_op() {
        let mut d = [[0.1, 0.2, 0.3, 0.4]];
        composite(&mut d, &[[1.0; 4]], 0.0, BlendMode::Screen);
        assert_eq!(d[0], [0.1, 0.2, 0.3, 0.4]);
    }
}
