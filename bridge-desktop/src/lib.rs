//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `WakeLock` as an in-process timed lease
//! - `NotificationPoster` that records notifications through `tracing`
//! - `MediaSessionProvider` as an in-memory session registry
//! - `AudioRouteObserver` fed by the embedding application
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopWakeLock, SqliteSettingsStore, TracingNotificationPoster};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = SqliteSettingsStore::new("data/settings.db".into()).await.unwrap();
//!     let wake_lock = DesktopWakeLock::new();
//!     let notifications = TracingNotificationPoster::new();
//!
//!     // Use in host configuration
//! }
//! ```

mod audio_route;
mod power;
mod session;
mod settings;

pub use audio_route::DesktopAudioRouteObserver;
pub use power::DesktopWakeLock;
pub use session::{DesktopMediaSessions, TracingNotificationPoster};
pub use settings::SqliteSettingsStore;
