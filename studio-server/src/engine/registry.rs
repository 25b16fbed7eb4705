//! Lazily loaded, process-wide diffusion engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use gesture_studio_common::ModelStatus;
use tokio::sync::{Mutex, OnceCell};

use super::{DiffusionEngine, EngineLoader, GenerationParams, Scheduler};
use crate::error::Result;

/// Owns the single shared engine.
///
/// The first `acquire` loads the engine; callers racing it wait for that one
/// load and then observe the same handle. A failed load leaves the registry
/// uninitialized, so a later request loads again.
pub struct ModelRegistry {
    loader: Arc<dyn EngineLoader>,
    handle: OnceCell<ModelHandle>,
    loading: AtomicBool,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            handle: OnceCell::new(),
            loading: AtomicBool::new(false),
        }
    }

    /// Get the shared engine handle, loading it on first use.
    pub async fn acquire(&self) -> Result<ModelHandle> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                self.loading.store(true, Ordering::SeqCst);
                let start = Instant::now();
                tracing::info!(model = %self.loader.model_name(), "Loading diffusion model");

                let result = self.loader.load().await;
                self.loading.store(false, Ordering::SeqCst);

                match result {
                    Ok(engine) => {
                        tracing::info!(
                            model = %self.loader.model_name(),
                            engine = engine.engine_type(),
                            duration_ms = %start.elapsed().as_millis(),
                            "Model loaded successfully"
                        );
                        Ok(ModelHandle::new(engine))
                    }
                    Err(e) => {
                        tracing::error!(model = %self.loader.model_name(), "Model load failed: {}", e);
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(handle.clone())
    }

    pub fn status(&self) -> ModelStatus {
        if self.handle.initialized() {
            ModelStatus::Ready
        } else if self.loading.load(Ordering::SeqCst) {
            ModelStatus::Loading
        } else {
            ModelStatus::Uninitialized
        }
    }
}

/// Shared handle to the loaded engine.
///
/// Every inference call runs under one exclusive lock covering both the
/// scheduler reconfiguration and the generation itself, so concurrent
/// requests are serialized and cannot see each other's step count.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    engine: Mutex<Box<dyn DiffusionEngine>>,
    engine_type: &'static str,
    /// Scheduler as loaded, for planning progress without the lock.
    base_scheduler: Scheduler,
}

impl ModelHandle {
    fn new(engine: Box<dyn DiffusionEngine>) -> Self {
        let engine_type = engine.engine_type();
        let base_scheduler = engine.scheduler().clone();
        Self {
            inner: Arc::new(HandleInner {
                engine: Mutex::new(engine),
                engine_type,
                base_scheduler,
            }),
        }
    }

    pub fn engine_type(&self) -> &'static str {
        self.inner.engine_type
    }

    /// Timesteps a generation with `steps` will run through.
    ///
    /// Computed on a private copy of the scheduler; the shared one is only
    /// reconfigured inside [`ModelHandle::generate`].
    pub fn plan_timesteps(&self, steps: u32) -> Vec<u32> {
        self.inner.base_scheduler.with_timesteps(steps).timesteps().to_vec()
    }

    /// Run one inference call with exclusive access to the engine.
    pub async fn generate(&self, params: &GenerationParams) -> Result<Vec<u8>> {
        let mut engine = self.inner.engine.lock().await;
        engine.scheduler_mut().set_timesteps(params.steps);
        engine.generate(params).await
    }

    /// Whether two handles refer to the same loaded engine.
    pub fn same_engine(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
