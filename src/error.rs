use lottie_core::LottieError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lottie(#[from] LottieError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("png encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("unsupported export format: {0:?}")]
    UnsupportedFormat(String),

    #[error("render worker for frame {0} stopped before finishing")]
    WorkerLost(usize),
}

impl Error {
    /// The engine error behind this one, if any.
    pub fn as_lottie(&self) -> Option<&LottieError> {
        match self {
            Error::Lottie(e) => Some(e),
            _ => None,
        }
    }
}

impl From<lottie_core::ParseError> for Error {
    fn from(err: lottie_core::ParseError) -> Self {
        Error::Lottie(err.into())
    }
}
