// Load-once resources (vision engine, face model).
//
// A `LazyResource` moves `Uninitialized → Loading → Ready | Failed` exactly
// once. Callers racing on `LazyResource::ensure_ready` all wait on the same
// in-flight load, and a failed load is reported but never retried.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

pub struct LazyResource<T> {
    name: &'static str,
    slot: OnceLock<std::result::Result<T, String>>,
    loading: AtomicBool,
    loader: Loader<T>,
}

impl<T> LazyResource<T> {
    pub fn new<F>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self { name, slot: OnceLock::new(), loading: AtomicBool::new(false), loader: Box::new(loader) }
    }

    /// Load on first call; later calls return the cached outcome.
    pub fn ensure_ready(&self) -> Option<&T> {
        let outcome = self.slot.get_or_init(|| {
            self.loading.store(true, Ordering::Release);
            let loaded = (self.loader)().map_err(|e| e.to_string());
            self.loading.store(false, Ordering::Release);
            match &loaded {
                Ok(_) => log::info!("{} ready", self.name),
                Err(e) => log::warn!("{} unavailable: {e}", self.name),
            }
            loaded
        });
        outcome.as_ref().ok()
    }

    pub fn state(&self) -> ResourceState {
        match self.slot.get() {
            Some(Ok(_)) => ResourceState::Ready,
            Some(Err(_)) => ResourceState::Failed,
            None if self.loading.load(Ordering::Acquire) => ResourceState::Loading,
            None => ResourceState::Uninitialized,
        }
    }
}
