//! Byte-level loading: gzip detection, JSON decoding and top-level validation.

use crate::model::{Layer, LottieJson};
use flate2::read::GzDecoder;
use std::io::Read;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,
    #[error("gzip stream could not be decompressed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    Invalid(String),
}

impl ParseError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// True when `bytes` start with the gzip magic number (`.tgs` stickers).
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(ParseError::Decompress)?;
    Ok(out)
}

/// Decode raw or gzip-wrapped JSON and check the fields every document needs.
pub fn parse(bytes: &[u8]) -> Result<LottieJson, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }

    let model: LottieJson = if is_gzip(bytes) {
        let inflated = decompress(bytes)?;
        serde_json::from_slice(&inflated)?
    } else {
        serde_json::from_slice(bytes)?
    };

    validate(&model)?;
    Ok(model)
}

pub fn validate(model: &LottieJson) -> Result<(), ParseError> {
    if !model.fr.is_finite() || model.fr <= 0.0 {
        return Err(ParseError::invalid(format!(
            "frame rate must be positive, got {}",
            model.fr
        )));
    }
    if !model.ip.is_finite() || !model.op.is_finite() || model.op <= model.ip {
        return Err(ParseError::invalid(format!(
            "frame range [{}, {}) is empty",
            model.ip, model.op
        )));
    }
    if model.w == 0 || model.h == 0 {
        return Err(ParseError::invalid(format!(
            "canvas size {}x{} is empty",
            model.w, model.h
        )));
    }

    validate_layers(&model.layers, "root")?;
    for asset in &model.assets {
        if let Some(layers) = &asset.layers {
            validate_layers(layers, &asset.id)?;
        }
    }
    Ok(())
}

fn validate_layers(layers: &[Layer], comp: &str) -> Result<(), ParseError> {
    for layer in layers {
        if !layer.ip.is_finite() || !layer.op.is_finite() || layer.ip > layer.op {
            return Err(ParseError::invalid(format!(
                "layer {:?} in composition {comp} has in-point {} after out-point {}",
                layer.nm.as_deref().unwrap_or(""),
                layer.ip,
                layer.op
            )));
        }
        if layer.sr == 0.0 || !layer.sr.is_finite() {
            return Err(ParseError::invalid(format!(
                "layer {:?} in composition {comp} has time stretch {}",
                layer.nm.as_deref().unwrap_or(""),
                layer.sr
            )));
        }
    }
    Ok(())
}
