//! ONNX classifier backed by tract

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use super::prediction::{is_distribution, softmax};
use super::Classifier;
use crate::preprocess::{DigitTensor, IMAGE_SIDE};

type Plan = TypedRunnableModel<TypedModel>;

/// Input memory layout expected by the graph.
///
/// With a single channel both layouts share the same memory order, so the
/// normalized tensor is fed unchanged and only the declared shape differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// Keras style `(1, 28, 28, 1)`
    Nhwc,
    /// PyTorch style `(1, 1, 28, 28)`
    Nchw,
}

impl InputLayout {
    fn shape(self) -> [usize; 4] {
        match self {
            InputLayout::Nhwc => [1, IMAGE_SIDE, IMAGE_SIDE, 1],
            InputLayout::Nchw => [1, 1, IMAGE_SIDE, IMAGE_SIDE],
        }
    }
}

/// A digit classifier compiled from an ONNX graph
pub struct OnnxClassifier {
    plan: Plan,
    layout: InputLayout,
}

impl OnnxClassifier {
    /// Load and optimize an ONNX model, probing NHWC then NCHW input layouts
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read ONNX model {}", path.display()))?;

        let mut failures = Vec::new();
        for layout in [InputLayout::Nhwc, InputLayout::Nchw] {
            match Self::compile(model.clone(), layout) {
                Ok(plan) => {
                    tracing::debug!(path = %path.display(), ?layout, "compiled ONNX model");
                    return Ok(Self { plan, layout });
                }
                Err(e) => failures.push(format!("{:?}: {}", layout, e)),
            }
        }

        Err(anyhow!(
            "ONNX model {} does not accept a 28x28 single-channel input ({})",
            path.display(),
            failures.join("; ")
        ))
    }

    fn compile(model: InferenceModel, layout: InputLayout) -> TractResult<Plan> {
        model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), layout.shape()))?
            .into_optimized()?
            .into_runnable()
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: &DigitTensor) -> Result<Vec<f32>> {
        let tensor = Tensor::from_shape(&self.layout.shape(), input.values())?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;

        let first = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores: Vec<f32> = first.to_array_view::<f32>()?.iter().copied().collect();

        // Graphs exported without a final softmax emit logits
        if is_distribution(&scores) {
            Ok(scores)
        } else {
            Ok(softmax(&scores))
        }
    }
}
