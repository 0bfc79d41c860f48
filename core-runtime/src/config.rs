//! # Host Configuration Module
//!
//! Provides configuration management for the engine host.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a [`HostConfig`]
//! holding every platform bridge the service layer needs plus its tunables
//! ([`ServiceOptions`]). Missing bridges are reported at build time rather
//! than when the first `start()` hits them.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - Persisted preference flags
//! - `WakeLock` - Power retention while the engine runs
//! - `NotificationPoster` - Persistent foreground notification
//!
//! ## Optional Dependencies
//!
//! - `MediaSessionProvider` - Media session opened alongside the notification
//! - `AudioRouteObserver` - Headphone-disconnect events for the pause policy
//!
//! When the `desktop-shims` feature is enabled, desktop adapters from
//! `bridge-desktop` are injected for every required bridge and for the media
//! session provider if not provided. The desktop settings store lives at
//! `<data_dir>/settings.db`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::HostConfig;
//! use std::time::Duration;
//!
//! let config = HostConfig::builder()
//!     .data_dir("/var/lib/engine-host")
//!     .wake_lock_timeout(Duration::from_secs(600))
//!     .log_capacity(500)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```ignore
//! use core_runtime::{config::HostConfig, Error};
//!
//! // Without desktop-shims, a missing bridge is reported by name.
//! match HostConfig::builder().build() {
//!     Err(Error::CapabilityMissing { capability, .. }) => assert_eq!(capability, "SettingsStore"),
//!     _ => unreachable!(),
//! }
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioRouteObserver, MediaSessionProvider, NotificationPoster, NotificationSpec, SettingsStore,
    WakeLock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default number of engine log lines retained.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Upper bound accepted for the log buffer capacity.
pub const MAX_LOG_CAPACITY: usize = 100_000;

/// Default maximum hold time of the wake lock.
pub const DEFAULT_WAKE_LOCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default time `stop()` waits for the engine to return.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default name of the media session opened with the notification.
pub const DEFAULT_MEDIA_SESSION_NAME: &str = "engine-host";

/// Tunables of the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Engine log lines retained by the log buffer
    pub log_capacity: usize,

    /// Maximum hold time for each wake lock acquisition
    pub wake_lock_timeout: Duration,

    /// How long `stop()` waits for the worker to exit; `None` waits forever
    pub join_timeout: Option<Duration>,

    /// Buffer size of the event bus channel
    pub event_buffer: usize,

    /// Notification posted while the service is in the foreground
    pub notification: NotificationSpec,

    /// Name given to the media session
    pub media_session_name: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            wake_lock_timeout: DEFAULT_WAKE_LOCK_TIMEOUT,
            join_timeout: Some(DEFAULT_JOIN_TIMEOUT),
            event_buffer: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
            notification: NotificationSpec::default(),
            media_session_name: DEFAULT_MEDIA_SESSION_NAME.to_string(),
        }
    }
}

impl ServiceOptions {
    /// Validates the tunables and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            return Err(Error::Config(
                "Log capacity must be greater than 0".to_string(),
            ));
        }

        if self.log_capacity > MAX_LOG_CAPACITY {
            return Err(Error::Config(format!(
                "Log capacity exceeds maximum of {} lines",
                MAX_LOG_CAPACITY
            )));
        }

        if self.wake_lock_timeout.is_zero() {
            return Err(Error::Config(
                "Wake lock timeout must be greater than 0".to_string(),
            ));
        }

        if self.join_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config(
                "Join timeout must be greater than 0; use None to wait indefinitely".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer must be greater than 0".to_string(),
            ));
        }

        if self.notification.channel.id.trim().is_empty() {
            return Err(Error::Config(
                "Notification channel id cannot be empty".to_string(),
            ));
        }

        if self.media_session_name.trim().is_empty() {
            return Err(Error::Config(
                "Media session name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Host configuration.
///
/// Use [`HostConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct HostConfig {
    /// Directory for host state (desktop settings database)
    pub data_dir: Option<PathBuf>,

    /// User preferences storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Power-retention lock (required)
    pub wake_lock: Arc<dyn WakeLock>,

    /// Foreground notification poster (required)
    pub notification_poster: Arc<dyn NotificationPoster>,

    /// Media session provider (optional)
    pub media_sessions: Option<Arc<dyn MediaSessionProvider>>,

    /// Audio route observer (optional)
    pub audio_route_observer: Option<Arc<dyn AudioRouteObserver>>,

    /// Service tunables
    pub options: ServiceOptions,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("data_dir", &self.data_dir)
            .field("settings_store", &"SettingsStore { ... }")
            .field("wake_lock", &"WakeLock { ... }")
            .field("notification_poster", &"NotificationPoster { ... }")
            .field(
                "media_sessions",
                &self
                    .media_sessions
                    .as_ref()
                    .map(|_| "MediaSessionProvider { ... }"),
            )
            .field(
                "audio_route_observer",
                &self
                    .audio_route_observer
                    .as_ref()
                    .map(|_| "AudioRouteObserver { ... }"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl HostConfig {
    /// Creates a new builder for constructing a `HostConfig`.
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("Data directory cannot be empty".to_string()));
            }
        }

        self.options.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, desktop_default: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default {}. \
             Mobile: inject the platform-native adapter.",
            capability, purpose, desktop_default
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let data_dir = data_dir.ok_or_else(|| {
        Error::Config(
            "Data directory is required for the default settings store. \
             Use .data_dir() or inject a SettingsStore."
                .to_string(),
        )
    })?;
    let path = data_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        Ok(runtime.block_on(SqliteSettingsStore::new(path))?)
    };

    // block_on cannot nest inside a running runtime, so hop to a plain thread.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "for persisted preference flags",
        "SqliteSettingsStore",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_wake_lock() -> Result<Arc<dyn WakeLock>> {
    Ok(Arc::new(bridge_desktop::DesktopWakeLock::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_wake_lock() -> Result<Arc<dyn WakeLock>> {
    Err(capability_missing(
        "WakeLock",
        "to keep the device awake while the engine runs",
        "DesktopWakeLock",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notification_poster() -> Result<Arc<dyn NotificationPoster>> {
    Ok(Arc::new(bridge_desktop::TracingNotificationPoster::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notification_poster() -> Result<Arc<dyn NotificationPoster>> {
    Err(capability_missing(
        "NotificationPoster",
        "to keep the service in the foreground",
        "TracingNotificationPoster",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_sessions() -> Option<Arc<dyn MediaSessionProvider>> {
    Some(Arc::new(bridge_desktop::DesktopMediaSessions::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_sessions() -> Option<Arc<dyn MediaSessionProvider>> {
    None
}

/// Builder for constructing [`HostConfig`] instances.
#[derive(Default)]
pub struct HostConfigBuilder {
    data_dir: Option<PathBuf>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    wake_lock: Option<Arc<dyn WakeLock>>,
    notification_poster: Option<Arc<dyn NotificationPoster>>,
    media_sessions: Option<Arc<dyn MediaSessionProvider>>,
    audio_route_observer: Option<Arc<dyn AudioRouteObserver>>,
    options: ServiceOptions,
}

impl HostConfigBuilder {
    /// Sets the directory for host state.
    ///
    /// Only required when the desktop settings store is used.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the settings store implementation (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the wake lock implementation (required).
    pub fn wake_lock(mut self, lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = Some(lock);
        self
    }

    /// Sets the notification poster implementation (required).
    ///
    /// Whether channels are created before posting is decided once, from the
    /// poster's `supports_channels()`, when the service is constructed.
    pub fn notification_poster(mut self, poster: Arc<dyn NotificationPoster>) -> Self {
        self.notification_poster = Some(poster);
        self
    }

    /// Sets the media session provider (optional).
    pub fn media_sessions(mut self, provider: Arc<dyn MediaSessionProvider>) -> Self {
        self.media_sessions = Some(provider);
        self
    }

    /// Sets the audio route observer (optional).
    ///
    /// Without one, the pause-on-disconnect policy is stored but never fires.
    pub fn audio_route_observer(mut self, observer: Arc<dyn AudioRouteObserver>) -> Self {
        self.audio_route_observer = Some(observer);
        self
    }

    /// Sets the number of engine log lines retained.
    ///
    /// Default: 500
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.options.log_capacity = capacity;
        self
    }

    /// Sets the maximum hold time for each wake lock acquisition.
    ///
    /// Default: 10 minutes
    pub fn wake_lock_timeout(mut self, timeout: Duration) -> Self {
        self.options.wake_lock_timeout = timeout;
        self
    }

    /// Sets how long `stop()` waits for the engine to return.
    ///
    /// Default: 30 seconds. `None` waits indefinitely.
    pub fn join_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.join_timeout = timeout;
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: 100
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.options.event_buffer = size;
        self
    }

    /// Sets the notification posted while in the foreground.
    pub fn notification(mut self, notification: NotificationSpec) -> Self {
        self.options.notification = notification;
        self
    }

    /// Sets the media session name.
    pub fn media_session_name(mut self, name: impl Into<String>) -> Self {
        self.options.media_session_name = name.into();
        self
    }

    /// Sets all service tunables at once.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the final `HostConfig` instance.
    ///
    /// Tunables are validated before any default bridge is created, so an
    /// invalid option never leaves a settings database behind.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a tunable is invalid
    /// - [`Error::CapabilityMissing`] if a required bridge is absent and no
    ///   desktop default is available
    pub fn build(self) -> Result<HostConfig> {
        self.options.validate()?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir.as_ref())?,
        };

        let wake_lock = match self.wake_lock {
            Some(lock) => lock,
            None => provide_default_wake_lock()?,
        };

        let notification_poster = match self.notification_poster {
            Some(poster) => poster,
            None => provide_default_notification_poster()?,
        };

        let media_sessions = self.media_sessions.or_else(provide_default_media_sessions);

        let config = HostConfig {
            data_dir: self.data_dir,
            settings_store,
            wake_lock,
            notification_poster,
            media_sessions,
            audio_route_observer: self.audio_route_observer,
            options: self.options,
        };

        config.validate()?;

        Ok(config)
    }
}
