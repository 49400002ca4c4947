//! Model input tensor

use ndarray::Array4;

/// Side length of the square input image
pub const IMAGE_SIDE: usize = 28;

/// Number of pixels in one input image
pub const PIXEL_COUNT: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Input layout: batch, height, width, channel
pub const INPUT_SHAPE: [usize; 4] = [1, IMAGE_SIDE, IMAGE_SIDE, 1];

/// A single normalized 28x28 grayscale image, shaped `(1, 28, 28, 1)`,
/// every value in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitTensor {
    data: Array4<f32>,
}

impl DigitTensor {
    /// Build from exactly `PIXEL_COUNT` row-major pixel values.
    ///
    /// Panics if the iterator yields a different number of values; callers
    /// in this crate always pass a 28x28 raster.
    pub(crate) fn from_pixels(values: impl IntoIterator<Item = f32>) -> Self {
        let values: Vec<f32> = values.into_iter().collect();
        assert_eq!(values.len(), PIXEL_COUNT, "digit tensor needs 784 pixels");
        let shape = (1, IMAGE_SIDE, IMAGE_SIDE, 1);
        let data = Array4::from_shape_vec(shape, values).expect("length checked above");
        Self { data }
    }

    /// Build from a 28x28 grid of values already scaled to `[0, 1]`
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.len() != PIXEL_COUNT || values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return None;
        }
        Some(Self::from_pixels(values.iter().copied()))
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Flat view in standard (row-major) order
    pub fn values(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("tensor is always in standard layout")
    }
}
