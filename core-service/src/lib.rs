//! Engine host service façade.
//!
//! This crate supervises a single native audio engine on a dedicated worker
//! thread and fans its lifecycle out to any number of observers. Hosts build
//! a [`HostConfig`](core_runtime::config::HostConfig) with their bridge
//! implementations, hand it to [`HostService::new`] together with an
//! [`EngineLoader`], and drive the engine through the [`ServiceClient`].
//! Desktop apps typically enable the `desktop-shims` feature and use
//! [`bootstrap_desktop`].
//!
//! ```ignore
//! use core_service::{ChannelListener, EngineLoader, HostService};
//! use std::sync::Arc;
//!
//! let loader = EngineLoader::global();
//! loader.install(Arc::new(MyEngine::new()));
//!
//! let service = HostService::new(config, loader)?;
//! let client = service.client();
//!
//! let (listener, mut statuses) = ChannelListener::new();
//! client.register(Arc::new(listener));
//! client.start()?;
//! ```

pub mod client;
pub mod error;
pub mod listeners;
pub mod loader;
pub mod log_buffer;
pub mod preferences;
pub mod resources;
pub mod status;
mod supervisor;
pub mod triggers;

pub use client::ServiceClient;
pub use error::{Result, ServiceError};
pub use listeners::{ChannelListener, ListenerError, ListenerId, ListenerRegistry, ServiceListener};
pub use loader::EngineLoader;
pub use log_buffer::{LogBuffer, LogSubscription};
pub use preferences::{PreferenceKey, Preferences};
pub use resources::{ForegroundLease, NotificationStrategy};
pub use status::{StatusSnapshot, StatusTracker, StatusWatch};

use std::sync::Arc;

use core_runtime::config::HostConfig;
use core_runtime::events::EventBus;
use tokio::runtime::Handle;
use tracing::info;

use crate::supervisor::Supervisor;

/// Primary façade exposed to host applications.
///
/// Owns the supervisor and everything it shares with observers. Dropping
/// the service does not stop a running engine; call
/// [`ServiceClient::stop`] first.
pub struct HostService {
    supervisor: Arc<Supervisor>,
    client: ServiceClient,
    preferences: Preferences,
}

impl HostService {
    /// Create a new service from a validated configuration.
    ///
    /// The engine does not need to be loaded yet; `start()` reports
    /// [`ServiceError::EngineUnavailable`] until it is. When the config carries
    /// an audio route observer, call this from within a tokio runtime: the
    /// disconnect watcher runs on the runtime current at construction.
    pub fn new(config: HostConfig, loader: Arc<EngineLoader>) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.options.event_buffer);
        let supervisor = Arc::new(Supervisor::new(&config, loader, events));
        let client = ServiceClient::new(
            Arc::clone(&supervisor),
            config.audio_route_observer.clone(),
            Handle::try_current().ok(),
        );
        let preferences = Preferences::new(Arc::clone(&config.settings_store));

        info!(
            log_capacity = config.options.log_capacity,
            wake_lock_timeout_secs = config.options.wake_lock_timeout.as_secs(),
            "Host service initialized"
        );

        Ok(Self {
            supervisor,
            client,
            preferences,
        })
    }

    pub fn client(&self) -> ServiceClient {
        self.client.clone()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Engine log lines, newest last.
    pub fn log_buffer(&self) -> Arc<LogBuffer> {
        Arc::clone(self.supervisor.logs())
    }

    pub fn status_tracker(&self) -> Arc<StatusTracker> {
        Arc::clone(self.supervisor.status_tracker())
    }

    /// Lifecycle and resource events.
    pub fn events(&self) -> &EventBus {
        self.supervisor.events()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Every required bridge is filled with its desktop default and preferences
/// persist in `<data_dir>/settings.db`. No audio route observer is attached;
/// build the [`HostConfig`] by hand to feed route changes.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, EngineLoader};
///
/// let service = bootstrap_desktop("/tmp/engine-host", EngineLoader::global())?;
/// let running = service.client().is_running();
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    data_dir: impl Into<std::path::PathBuf>,
    loader: Arc<EngineLoader>,
) -> Result<HostService> {
    let config = HostConfig::builder().data_dir(data_dir).build()?;
    HostService::new(config, loader)
}
