//! Entry points for boot and automation triggers.
//!
//! The platform decides when these fire; this module only maps them onto
//! the client using the persisted preferences.

use tracing::{info, warn};

use crate::client::ServiceClient;
use crate::error::Result;
use crate::preferences::{PreferenceKey, Preferences};

async fn read_flag(preferences: &Preferences, key: PreferenceKey) -> bool {
    match preferences.get(key).await {
        Ok(value) => value,
        Err(err) => {
            warn!(key = %key, error = %err, "Failed to read preference, assuming off");
            false
        }
    }
}

/// Applies the persisted policies and starts the service.
pub async fn start_from_trigger(client: &ServiceClient, preferences: &Preferences) -> Result<()> {
    let pause_on_disconnect = read_flag(preferences, PreferenceKey::PauseOnDisconnect).await;
    let wake_guard = read_flag(preferences, PreferenceKey::WakeGuardEnabled).await;

    client.set_pause_on_disconnect_policy(pause_on_disconnect);
    if wake_guard {
        client.set_wake_guard_enabled(true);
    }

    info!(wake_guard, pause_on_disconnect, "Start trigger fired");
    client.start()
}

/// Boot trigger. Starts the service only if `run_on_boot` is set and
/// returns whether it did.
pub async fn on_boot(client: &ServiceClient, preferences: &Preferences) -> Result<bool> {
    if !read_flag(preferences, PreferenceKey::RunOnBoot).await {
        info!("Boot trigger ignored, run-on-boot is off");
        return Ok(false);
    }

    start_from_trigger(client, preferences).await?;
    Ok(true)
}

pub async fn stop_from_trigger(client: &ServiceClient) -> Result<()> {
    info!("Stop trigger fired");
    client.stop_async().await
}
