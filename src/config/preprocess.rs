//! Image normalization settings

use serde::{Deserialize, Serialize};

/// Image normalization settings
///
/// `invert` must match the convention of the training data: MNIST digits are
/// light strokes on a dark background, which is also what the drawing canvas
/// posts, so the default leaves intensities alone. Enable it only for models
/// trained on dark-on-light images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Replace every pixel value `v` with `255 - v` before scaling
    #[serde(default)]
    pub invert: bool,
}
