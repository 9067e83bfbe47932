use lottie_core::{BlendMode, MatteMode};

use crate::composite::{composite, source_over};
use crate::coverage::{Coverage, PixelRect};
use crate::paint::{Rgba, Shader};

/// Premultiplied `f32` RGBA pixels over a device rectangle.
#[derive(Debug, Clone)]
pub struct Canvas {
    bounds: PixelRect,
    pixels: Vec<Rgba>,
}

impl Canvas {
    pub fn new(bounds: PixelRect) -> Self {
        Self {
            bounds,
            pixels: vec![[0.0; 4]; bounds.width() * bounds.height()],
        }
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: i32, y: i32) -> Rgba {
        if self.bounds.contains(x, y) {
            self.pixels[self.bounds.index(x, y)]
        } else {
            [0.0; 4]
        }
    }

    /// Paint `shader` through `coverage`, scaled by `opacity`.
    pub fn fill(&mut self, coverage: &Coverage, shader: &Shader<'_>, opacity: f32) {
        if opacity <= 0.0 {
            return;
        }
        let area = coverage.bounds().intersect(&self.bounds);
        let solid = match shader {
            Shader::Solid(c) => Some(*c),
            _ => None,
        };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let k = coverage.get(x, y) * opacity;
                if k <= 0.0 {
                    continue;
                }
                let src = match solid {
                    Some(c) => c,
                    None => shader.sample(x, y),
                };
                let i = self.bounds.index(x, y);
                source_over(&mut self.pixels[i], src, k);
            }
        }
    }

    /// Multiply every pixel by `alpha`; pixels outside it are cleared.
    pub fn mask(&mut self, alpha: &Coverage) {
        let b = self.bounds;
        for y in b.y0..b.y1 {
            for x in b.x0..b.x1 {
                let k = alpha.get(x, y);
                let px = &mut self.pixels[b.index(x, y)];
                if k <= 0.0 {
                    *px = [0.0; 4];
                } else if k < 1.0 {
                    px.iter_mut().for_each(|c| *c *= k);
                }
            }
        }
    }

    /// Composite an offscreen layer of the same bounds.
    pub fn draw_layer(&mut self, layer: &Canvas, opacity: f32, mode: BlendMode) {
        debug_assert_eq!(self.bounds, layer.bounds);
        composite(&mut self.pixels, &layer.pixels, opacity, mode);
    }

    /// Matte weights taken from this canvas.
    pub fn matte(&self, mode: MatteMode) -> Coverage {
        let data = self
            .pixels
            .iter()
            .map(|p| {
                let v = match mode {
                    MatteMode::Alpha | MatteMode::AlphaInverted => p[3],
                    MatteMode::Luma | MatteMode::LumaInverted => {
                        0.2126 * p[0] + 0.7152 * p[1] + 0.0722 * p[2]
                    }
                };
                let v = v.clamp(0.0, 1.0);
                match mode {
                    MatteMode::AlphaInverted | MatteMode::LumaInverted => 1.0 - v,
                    _ => v,
                }
            })
            .collect();
        Coverage::from_parts(self.bounds, data)
    }
}
