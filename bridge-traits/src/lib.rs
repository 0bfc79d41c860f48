//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform
//! running the audio engine host.
//!
//! ## Overview
//!
//! This crate defines the contract between the host core and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Engine
//! - [`AudioEngine`](engine::AudioEngine) - The opaque native engine (`run`, `shutdown`, `pause`)
//! - [`EngineLogSink`](engine::EngineLogSink) - Receiver for the engine's log callback
//!
//! ### Foreground Resources
//! - [`WakeLock`](power::WakeLock) - Power-retention lock with bounded hold time
//! - [`NotificationPoster`](session::NotificationPoster) - Persistent notification and channels
//! - [`MediaSessionProvider`](session::MediaSessionProvider) - Media session handle
//!
//! ### Platform Integration
//! - [`AudioRouteObserver`](audio_route::AudioRouteObserver) - Headphone disconnects and route changes
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let wake_lock = config.wake_lock
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "WakeLock".to_string(),
//!         message: "No wake lock implementation provided. \
//!                  Desktop: ensure default feature is enabled. \
//!                  Mobile: inject platform-native adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. A platform
//! refusing a foreground resource should report
//! [`BridgeError::PermissionDenied`](error::BridgeError::PermissionDenied) so the
//! core can surface it to the caller that requested the start.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. The resource traits
//! ([`WakeLock`](power::WakeLock), [`NotificationPoster`](session::NotificationPoster),
//! [`MediaSessionProvider`](session::MediaSessionProvider)) are synchronous because
//! the core calls them while holding its lifecycle lock; implementations must
//! return promptly.

pub mod audio_route;
pub mod engine;
pub mod error;
pub mod power;
pub mod session;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio_route::{AudioRouteChangeStream, AudioRouteEvent, AudioRouteObserver};
pub use engine::{AudioEngine, EngineFailure, EngineLogSink, EngineSeverity};
pub use power::{WakeLock, DEFAULT_WAKE_LOCK_TAG};
pub use session::{
    ChannelImportance, ChannelSpec, MediaSessionId, MediaSessionProvider, NotificationId,
    NotificationPoster, NotificationSpec,
};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
