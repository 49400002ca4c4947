//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod fake_mlflow;

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use digitserve::model::{Classifier, NUM_CLASSES};
use digitserve::preprocess::DigitTensor;
use digitserve::ArtifactLoader;

pub use fake_mlflow::{FakeMlflow, FAKE_ONNX_BYTES};

/// Classifier whose favourite digit follows the mean brightness of the image
pub struct BrightnessClassifier;

impl Classifier for BrightnessClassifier {
    fn predict(&self, input: &DigitTensor) -> anyhow::Result<Vec<f32>> {
        let values = input.values();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let class = ((mean * 9.0).round() as usize).min(NUM_CLASSES - 1);

        let mut probs = vec![0.02; NUM_CLASSES];
        probs[class] = 0.82;
        Ok(probs)
    }
}

/// Loader that accepts any artifact `detect_model_source` can make sense of,
/// provided the graph file holds the fake ONNX payload
pub struct StubLoader;

impl ArtifactLoader for StubLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn Classifier>> {
        let source = digitserve::loader::detect_model_source(path)?;
        let bytes = std::fs::read(&source.weights_path)?;
        anyhow::ensure!(bytes == FAKE_ONNX_BYTES, "unexpected model bytes");
        Ok(Arc::new(BrightnessClassifier))
    }
}

/// Solid grayscale PNG
pub fn solid_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = GrayImage::from_pixel(width, height, Luma([value]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
