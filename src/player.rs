use lottie_core::RenderTree;

use crate::animation::LottieAnimation;
use crate::error::Result;
use crate::options::RenderOptions;

/// Wall-clock playback over a [`LottieAnimation`], looping at the end.
#[derive(Debug, Clone)]
pub struct LottiePlayer {
    pub animation: LottieAnimation,
    /// Fractional frame index in `[0, total_frames)`.
    pub current_frame: f32,
    /// Playback rate; negative plays backwards.
    pub speed: f32,
}

impl LottiePlayer {
    pub fn new(animation: LottieAnimation) -> Self {
        Self {
            animation,
            current_frame: 0.0,
            speed: 1.0,
        }
    }

    /// Move the clock by `dt` seconds, wrapping around the ends.
    pub fn advance(&mut self, dt: f32) {
        let total = self.animation.total_frames() as f32;
        let frames = dt * self.animation.frame_rate() * self.speed;
        if !frames.is_finite() {
            return;
        }
        self.current_frame = (self.current_frame + frames).rem_euclid(total);
        // rem_euclid can round up to `total` for tiny negative inputs
        if self.current_frame >= total {
            self.current_frame = 0.0;
        }
    }

    /// Jump to `pos` through the animation, in `[0, 1]`.
    pub fn seek(&mut self, pos: f32) {
        self.current_frame = self.animation.frame_at_pos(pos) as f32;
    }

    /// Whole frame currently shown.
    pub fn frame(&self) -> usize {
        let last = self.animation.total_frames() - 1;
        (self.current_frame.max(0.0).floor() as usize).min(last)
    }

    pub fn render_tree(&self) -> Result<RenderTree> {
        self.animation.render_tree(self.frame())
    }

    pub fn render(&self, buffer: &mut [u8], options: &RenderOptions) -> Result<()> {
        self.animation.render_with(self.frame(), buffer, options)
    }
}
