//! One-time audio engine loading.

use std::sync::Arc;

use bridge_traits::{AudioEngine, EngineFailure};
use once_cell::sync::{Lazy, OnceCell};
use tracing::{error, info};

enum LoadOutcome {
    Loaded(Arc<dyn AudioEngine>),
    Failed(String),
}

/// Holds the process-wide engine instance.
///
/// Loading happens at most once. A failed load is remembered, and every
/// later `start()` reports the engine as unavailable instead of retrying.
pub struct EngineLoader {
    slot: OnceCell<LoadOutcome>,
}

static GLOBAL: Lazy<Arc<EngineLoader>> = Lazy::new(|| Arc::new(EngineLoader::new()));

impl EngineLoader {
    pub fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// Loader shared by every service in the process.
    pub fn global() -> Arc<EngineLoader> {
        Arc::clone(&GLOBAL)
    }

    /// Runs `load` unless a load already happened. Returns `true` if the
    /// engine is available afterwards.
    pub fn load_with<F>(&self, load: F) -> bool
    where
        F: FnOnce() -> Result<Arc<dyn AudioEngine>, EngineFailure>,
    {
        let outcome = self.slot.get_or_init(|| match load() {
            Ok(engine) => {
                info!("Audio engine loaded");
                LoadOutcome::Loaded(engine)
            }
            Err(failure) => {
                error!(error = %failure, "Audio engine failed to load");
                LoadOutcome::Failed(failure.message)
            }
        });
        matches!(outcome, LoadOutcome::Loaded(_))
    }

    /// Installs an already constructed engine.
    pub fn install(&self, engine: Arc<dyn AudioEngine>) -> bool {
        self.load_with(move || Ok(engine))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot.get(), Some(LoadOutcome::Loaded(_)))
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self.slot.get() {
            Some(LoadOutcome::Failed(message)) => Some(message),
            _ => None,
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn AudioEngine>> {
        match self.slot.get() {
            Some(LoadOutcome::Loaded(engine)) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    /// Human-readable reason the engine cannot be used.
    pub(crate) fn unavailable_reason(&self) -> String {
        match self.slot.get() {
            Some(LoadOutcome::Failed(message)) => format!("load failed: {}", message),
            Some(LoadOutcome::Loaded(_)) => "engine is loaded".to_string(),
            None => "engine has not been loaded".to_string(),
        }
    }
}

impl Default for EngineLoader {
    fn default() -> Self {
        Self::new()
    }
}
