use lottie_data::ParseError;

pub type Result<T> = std::result::Result<T, LottieError>;

#[derive(Debug, thiserror::Error)]
pub enum LottieError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("frame {frame} is outside [0, {total_frames})")]
    FrameOutOfRange { frame: f32, total_frames: usize },

    #[error("shape mismatch in {context}: {from} vertices cannot morph into {to}")]
    ShapeMismatch {
        context: String,
        from: usize,
        to: usize,
    },

    #[error("unsupported feature: {feature} ({location})")]
    UnsupportedFeature { feature: String, location: String },

    #[error("invalid render target: {0}")]
    InvalidTarget(String),
}

impl LottieError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(ParseError::invalid(msg))
    }

    pub fn unsupported(feature: impl Into<String>, location: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            location: location.into(),
        }
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    /// Attach the owning property's location to a shape mismatch.
    pub fn at(self, location: &str) -> Self {
        match self {
            Self::ShapeMismatch { from, to, .. } => Self::ShapeMismatch {
                context: location.to_string(),
                from,
                to,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(LottieError::parse("x").to_string().starts_with("parse error: "));
        assert!(LottieError::unsupported("text layer", "layer \"t\"")
            .to_string()
            .starts_with("unsupported feature: text layer"));
        assert_eq!(
            LottieError::FrameOutOfRange {
                frame: 60.0,
                total_frames: 60
            }
            .to_string(),
            "frame 60 is outside [0, 60)"
        );
        assert!(LottieError::invalid_target("x")
            .to_string()
            .starts_with("invalid render target: "));
    }
}
