use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::environment::Environment;
use crate::services::{DefaultServiceProvider, ServiceProvider};

/// Builds environments from a cached root.
///
/// The first successful call constructs the root from the service
/// provider and caches it; later calls hand out deep clones. Degraded
/// paths recover locally and are only logged: a failed clone falls back
/// to sharing the cached tables outright, and a failed construction with
/// nothing cached yields an empty environment over stub services.
pub struct EnvironmentFactory {
    provider: Arc<dyn ServiceProvider>,
    cache: Mutex<Option<Environment>>,
}

impl EnvironmentFactory {
    pub fn new(provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(None),
        }
    }

    pub fn with_default_services() -> Self {
        Self::new(Arc::new(DefaultServiceProvider))
    }

    pub fn create_root(&self) -> Environment {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(root) = cache.as_ref() {
            return match root.try_clone() {
                Ok(clone) => clone,
                Err(error) => {
                    warn!(%error, "root clone failed; handing out the shared root tables");
                    root.share()
                }
            };
        }

        match self.provider.services() {
            Ok(services) => {
                let root = Environment::with_services(Arc::new(services));
                *cache = Some(root.share());
                root
            }
            Err(error) => {
                warn!(%error, "root construction failed with nothing cached; using an empty environment");
                Environment::new()
            }
        }
    }

    /// Drops the cached root so the next call rebuilds it. Test isolation.
    pub fn reset(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Shared handle to the cached root, if one was built.
    pub fn cached_root(&self) -> Option<Environment> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Environment::share)
    }
}
