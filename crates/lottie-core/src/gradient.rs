use crate::renderer::GradientStop;
use glam::Vec4;

struct ColorStop {
    t: f32,
    rgb: [f32; 3],
}

struct AlphaStop {
    t: f32,
    a: f32,
}

/// Decode Lottie gradient data: `color_count` `[t, r, g, b]` stops, then
/// optional `[t, a]` opacity stops. Opacity stops are merged into the
/// colour stops so every offset carries a full RGBA value.
pub fn parse_gradient_stops(raw: &[f32], color_count: usize) -> Vec<GradientStop> {
    let color_len = (color_count * 4).min(raw.len() - raw.len() % 4);
    let colors: Vec<ColorStop> = raw[..color_len]
        .chunks_exact(4)
        .map(|c| ColorStop {
            t: c[0],
            rgb: [c[1], c[2], c[3]],
        })
        .collect();
    if colors.is_empty() {
        return Vec::new();
    }
    let alphas: Vec<AlphaStop> = raw[color_len..]
        .chunks_exact(2)
        .map(|c| AlphaStop { t: c[0], a: c[1] })
        .collect();

    if alphas.is_empty() {
        return colors
            .iter()
            .map(|c| GradientStop {
                offset: c.t,
                color: Vec4::new(c.rgb[0], c.rgb[1], c.rgb[2], 1.0),
            })
            .collect();
    }

    let mut offsets: Vec<f32> = colors.iter().map(|c| c.t).chain(alphas.iter().map(|a| a.t)).collect();
    offsets.sort_by(f32::total_cmp);
    offsets.dedup();

    offsets
        .into_iter()
        .map(|t| {
            let [r, g, b] = color_at(&colors, t);
            GradientStop {
                offset: t,
                color: Vec4::new(r, g, b, alpha_at(&alphas, t)),
            }
        })
        .collect()
}

fn color_at(stops: &[ColorStop], t: f32) -> [f32; 3] {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return [1.0, 1.0, 1.0];
    };
    if t <= first.t {
        return first.rgb;
    }
    if t >= last.t {
        return last.rgb;
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t >= a.t && t <= b.t {
            let span = b.t - a.t;
            let k = if span > 0.0 { (t - a.t) / span } else { 0.0 };
            return [
                a.rgb[0] + (b.rgb[0] - a.rgb[0]) * k,
                a.rgb[1] + (b.rgb[1] - a.rgb[1]) * k,
                a.rgb[2] + (b.rgb[2] - a.rgb[2]) * k,
            ];
        }
    }
    last.rgb
}

fn alpha_at(stops: &[AlphaStop], t: f32) -> f32 {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return 1.0;
    };
    if t <= first.t {
        return first.a;
    }
    if t >= last.t {
        return last.a;
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t >= a.t && t <= b.t {
            let span = b.t - a.t;
            let k = if span > 0.0 { (t - a.t) / span } else { 0.0 };
            return a.a + (b.a - a.a) * k;
        }
    }
    last.a
}
