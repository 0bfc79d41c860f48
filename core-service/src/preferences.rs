//! Persisted on/off preferences read by the triggers.

use std::fmt;
use std::sync::Arc;

use bridge_traits::SettingsStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKey {
    /// Start the service when the device finishes booting.
    RunOnBoot,
    /// Hold the wake guard while the engine runs.
    WakeGuardEnabled,
    /// Pause the engine when headphones are disconnected.
    PauseOnDisconnect,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 3] = [
        PreferenceKey::RunOnBoot,
        PreferenceKey::WakeGuardEnabled,
        PreferenceKey::PauseOnDisconnect,
    ];

    /// Storage key.
    pub fn key(&self) -> &'static str {
        match self {
            PreferenceKey::RunOnBoot => "run_on_boot",
            PreferenceKey::WakeGuardEnabled => "wakelock",
            PreferenceKey::PauseOnDisconnect => "pause_on_headphones_disconnect",
        }
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Typed access to the preference flags. Unset flags read as `false`.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn SettingsStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: PreferenceKey) -> Result<bool> {
        Ok(self.store.get_bool(key.key()).await?.unwrap_or(false))
    }

    pub async fn set(&self, key: PreferenceKey, enabled: bool) -> Result<()> {
        debug!(key = %key, enabled, "Preference updated");
        self.store.set_bool(key.key(), enabled).await?;
        Ok(())
    }
}
