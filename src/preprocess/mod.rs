//! Image normalization
//!
//! Turns an uploaded payload (base64, optionally behind a data-URL prefix)
//! into the `(1, 28, 28, 1)` float tensor the classifiers are trained on.

mod tensor;

pub use tensor::{DigitTensor, IMAGE_SIDE, INPUT_SHAPE, PIXEL_COUNT};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::GrayImage;
use thiserror::Error;

use crate::config::PreprocessConfig;

/// Payload decoding failures
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image payload is empty")]
    EmptyPayload,

    #[error("invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("payload is not a supported image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },
}

impl DecodeError {
    /// Short label used for metrics and error responses
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::EmptyPayload => "empty_payload",
            DecodeError::InvalidBase64(_) => "invalid_base64",
            DecodeError::InvalidImage(_) | DecodeError::ZeroArea { .. } => "invalid_image",
        }
    }
}

/// Strip a `<scheme>,` data-URL prefix, keeping everything after the first comma
pub fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) => data.trim(),
        None => payload.trim(),
    }
}

/// Decode the base64 portion of a payload into raw image bytes
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let data = strip_data_url(payload);
    if data.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let bytes = STANDARD.decode(data)?;
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }
    Ok(bytes)
}

/// Normalize encoded image bytes into a model input tensor
pub fn normalize_bytes(bytes: &[u8], config: &PreprocessConfig) -> Result<DigitTensor, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let gray = image::load_from_memory(bytes)?.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroArea { width, height });
    }
    Ok(normalize_gray(&gray, config))
}

/// Full pipeline: payload string to model input tensor
pub fn normalize_payload(payload: &str, config: &PreprocessConfig) -> Result<DigitTensor, DecodeError> {
    let bytes = decode_payload(payload)?;
    normalize_bytes(&bytes, config)
}

/// Resize a grayscale image to 28x28 and scale it into [0, 1]
pub fn normalize_gray(gray: &GrayImage, config: &PreprocessConfig) -> DigitTensor {
    let side = IMAGE_SIDE as u32;

    let resized;
    let pixels = if gray.dimensions() == (side, side) {
        gray
    } else {
        resized = image::imageops::resize(gray, side, side, FilterType::Lanczos3);
        &resized
    };

    let values = pixels.as_raw().iter().map(|&v| {
        let v = if config.invert { 255 - v } else { v };
        f32::from(v) / 255.0
    });

    DigitTensor::from_pixels(values)
}
