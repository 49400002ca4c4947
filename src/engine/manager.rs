//! Model lifecycle management
//!
//! Owns the model slot and the resolver. Resolution runs once in the
//! background at startup and again, lazily, when a request finds the slot
//! empty. Concurrent reload attempts collapse into one, and after a failure
//! requests skip resolution until the retry interval has passed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::ModelSlot;
use crate::model::LoadedModel;
use crate::resolver::{ModelResolver, ResolveError};

/// Model manager
pub struct ModelManager {
    slot: ModelSlot,
    resolver: ModelResolver,
    /// Serializes resolution attempts; holds the time of the last failure
    reload: Mutex<Option<Instant>>,
    /// Number of finished resolution attempts
    attempts: AtomicU64,
    retry_interval: Duration,
}

impl ModelManager {
    /// Manager that retries immediately after a failed resolution
    pub fn new(resolver: ModelResolver) -> Self {
        Self {
            slot: ModelSlot::new(),
            resolver,
            reload: Mutex::new(None),
            attempts: AtomicU64::new(0),
            retry_interval: Duration::ZERO,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.slot.current()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.is_loaded()
    }

    /// Resolve a model and swap it into the slot
    pub async fn load(&self) -> Result<Arc<LoadedModel>, ResolveError> {
        let mut last_failure = self.reload.lock().await;
        self.resolve_locked(&mut last_failure).await
    }

    async fn resolve_locked(
        &self,
        last_failure: &mut Option<Instant>,
    ) -> Result<Arc<LoadedModel>, ResolveError> {
        let result = self.resolver.resolve().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let resolved = match result {
            Ok(resolved) => resolved,
            Err(e) => {
                *last_failure = Some(Instant::now());
                return Err(e);
            }
        };
        *last_failure = None;

        let model = self.slot.store(resolved.into_loaded());
        tracing::info!(
            version = model.version(),
            origin = %model.origin(),
            loaded_at = %model.loaded_at().to_rfc3339(),
            "Model ready to serve"
        );
        Ok(model)
    }

    /// Current model, resolving it first if the slot is empty.
    ///
    /// Callers that queued behind an attempt reuse its outcome instead of
    /// resolving again. Within the retry interval of a failure no new attempt
    /// is made.
    pub async fn ensure_loaded(&self) -> Option<Arc<LoadedModel>> {
        if let Some(model) = self.slot.current() {
            return Some(model);
        }

        let seen = self.attempts.load(Ordering::SeqCst);
        let mut last_failure = self.reload.lock().await;

        if self.attempts.load(Ordering::SeqCst) != seen {
            return self.slot.current();
        }
        if let Some(model) = self.slot.current() {
            return Some(model);
        }
        if let Some(failed_at) = *last_failure {
            if failed_at.elapsed() < self.retry_interval {
                tracing::debug!(
                    since_failure_ms = failed_at.elapsed().as_millis() as u64,
                    "Skipping model resolution inside retry interval"
                );
                return None;
            }
        }

        match self.resolve_locked(&mut last_failure).await {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::error!(error = %e, "Lazy model resolution failed");
                None
            }
        }
    }

    /// Resolve in the background; failures leave the server running unhealthy
    pub fn spawn_initial_load(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.load().await {
                tracing::error!(
                    error = %e,
                    "Initial model resolution failed; serving without a model"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, ModelOrigin};
    use crate::preprocess::DigitTensor;
    use crate::resolver::{ResolutionStrategy, Resolved};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Uniform;

    impl Classifier for Uniform {
        fn predict(&self, _input: &DigitTensor) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.1; 10])
        }
    }

    /// Fails until `fail_first` calls have been made, sleeping on each call
    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl ResolutionStrategy for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn resolve(&self) -> Result<Option<Resolved>, ResolveError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if n < self.fail_first {
                return Err(ResolveError::NoRuns("exp".into()));
            }
            Ok(Some(Resolved {
                classifier: Arc::new(Uniform),
                version: format!("{}", n + 1),
                origin: ModelOrigin::Registry,
                location: "test".into(),
            }))
        }
    }

    fn manager(fail_first: usize) -> (Arc<ModelManager>, Arc<AtomicUsize>) {
        manager_with_interval(fail_first, Duration::ZERO)
    }

    fn manager_with_interval(
        fail_first: usize,
        interval: Duration,
    ) -> (Arc<ModelManager>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Flaky {
            calls: calls.clone(),
            fail_first,
        };
        let strategies: Vec<Box<dyn ResolutionStrategy>> = vec![Box::new(strategy)];
        let resolver = ModelResolver::new(strategies, false);
        let manager = ModelManager::new(resolver).with_retry_interval(interval);
        (Arc::new(manager), calls)
    }

    #[tokio::test]
    async fn test_concurrent_lazy_loads_resolve_once() {
        let (manager, calls) = manager(0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = manager.clone();
                tokio::spawn(async move { m.ensure_loaded().await })
            })
            .collect();

        for handle in handles {
            let model = handle.await.unwrap().unwrap();
            assert_eq!(model.version(), "1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_is_shared_then_retried() {
        let (manager, calls) = manager(1);

        let (a, b) = tokio::join!(manager.ensure_loaded(), manager.ensure_loaded());
        assert!(a.is_none());
        assert!(b.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!manager.is_loaded());

        let model = manager.ensure_loaded().await.unwrap();
        assert_eq!(model.version(), "2");
        assert!(manager.is_loaded());
    }

    #[tokio::test]
    async fn test_initial_load_in_background() {
        let (manager, _) = manager(0);
        assert!(!manager.is_loaded());

        manager.spawn_initial_load().await.unwrap();
        assert!(manager.is_loaded());
        assert_eq!(manager.current().unwrap().origin(), ModelOrigin::Registry);
    }

    #[tokio::test]
    async fn test_no_retry_inside_interval() {
        let (manager, calls) = manager_with_interval(1, Duration::from_secs(60));

        assert!(manager.ensure_loaded().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(manager.ensure_loaded().await.is_none());
        assert!(manager.ensure_loaded().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_after_interval() {
        let (manager, calls) = manager_with_interval(1, Duration::from_millis(50));

        assert!(manager.ensure_loaded().await.is_none());
        tokio::time::sleep(Duration::from_millis(60)).await;

        let model = manager.ensure_loaded().await.unwrap();
        assert_eq!(model.version(), "2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_initial_load_starts_interval() {
        let (manager, calls) = manager_with_interval(1, Duration::from_secs(60));

        manager.spawn_initial_load().await.unwrap();
        assert!(!manager.is_loaded());

        assert!(manager.ensure_loaded().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
