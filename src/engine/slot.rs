//! Process-wide model slot

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::model::LoadedModel;

/// Holds the model currently being served.
///
/// Readers take an owned snapshot, so a swap never affects a request that
/// already holds the previous model.
pub struct ModelSlot {
    inner: ArcSwapOption<LoadedModel>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            inner: ArcSwapOption::empty(),
        }
    }

    /// Snapshot of the current model, if one is loaded
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.inner.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Atomically replace the served model
    pub fn store(&self, model: LoadedModel) -> Arc<LoadedModel> {
        let model = Arc::new(model);
        self.inner.store(Some(model.clone()));
        model
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, ModelOrigin};
    use crate::preprocess::DigitTensor;

    struct Uniform;

    impl Classifier for Uniform {
        fn predict(&self, _input: &DigitTensor) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.1; 10])
        }
    }

    #[test]
    fn test_empty_then_loaded() {
        let slot = ModelSlot::new();
        assert!(!slot.is_loaded());
        assert!(slot.current().is_none());

        slot.store(LoadedModel::new(Arc::new(Uniform), "1", ModelOrigin::Registry));
        assert!(slot.is_loaded());
        assert_eq!(slot.current().unwrap().version(), "1");
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let slot = ModelSlot::new();
        slot.store(LoadedModel::new(Arc::new(Uniform), "1", ModelOrigin::Registry));

        let held = slot.current().unwrap();
        slot.store(LoadedModel::new(Arc::new(Uniform), "2", ModelOrigin::Registry));

        assert_eq!(held.version(), "1");
        assert_eq!(slot.current().unwrap().version(), "2");
    }
}
