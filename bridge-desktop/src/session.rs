//! Notification and media-session adapters for desktop hosts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use bridge_traits::{
    error::{BridgeError, Result},
    session::{
        ChannelSpec, MediaSessionId, MediaSessionProvider, NotificationId, NotificationPoster,
        NotificationSpec,
    },
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Notification poster that records notifications in the log.
///
/// Desktop hosts have no persistent service notification; posting is
/// represented by a tracing event and an in-memory set of active ids. The
/// poster can be told to refuse posts to exercise the host's failure path.
pub struct TracingNotificationPoster {
    supports_channels: bool,
    denied: AtomicBool,
    channels: Mutex<HashSet<String>>,
    active: Mutex<HashSet<NotificationId>>,
}

impl TracingNotificationPoster {
    pub fn new() -> Self {
        Self::with_channel_support(true)
    }

    /// Poster for a platform generation without notification channels.
    pub fn legacy() -> Self {
        Self::with_channel_support(false)
    }

    fn with_channel_support(supports_channels: bool) -> Self {
        Self {
            supports_channels,
            denied: AtomicBool::new(false),
            channels: Mutex::new(HashSet::new()),
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Refuse (or allow again) subsequent posts.
    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn has_channel(&self, id: &str) -> bool {
        self.channels.lock().contains(id)
    }
}

impl Default for TracingNotificationPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPoster for TracingNotificationPoster {
    fn supports_channels(&self) -> bool {
        self.supports_channels
    }

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        if !self.supports_channels {
            return Err(BridgeError::NotAvailable(
                "Notification channels are not supported".to_string(),
            ));
        }

        self.channels.lock().insert(channel.id.clone());
        debug!(
            channel = %channel.id,
            importance = channel.importance.level(),
            "Notification channel created"
        );
        Ok(())
    }

    fn post(&self, notification: &NotificationSpec) -> Result<NotificationId> {
        if self.denied.load(Ordering::SeqCst) {
            warn!(title = %notification.title, "Notification post denied");
            return Err(BridgeError::PermissionDenied(
                "Notification posting is disabled".to_string(),
            ));
        }

        if self.supports_channels && !self.has_channel(&notification.channel.id) {
            return Err(BridgeError::OperationFailed(format!(
                "Notification channel '{}' does not exist",
                notification.channel.id
            )));
        }

        let id = NotificationId(Uuid::new_v4().to_string());
        self.active.lock().insert(id.clone());
        info!(
            id = %id.0,
            title = %notification.title,
            text = %notification.text,
            "Notification posted"
        );
        Ok(id)
    }

    fn cancel(&self, id: &NotificationId) -> Result<()> {
        if self.active.lock().remove(id) {
            info!(id = %id.0, "Notification cancelled");
        }
        Ok(())
    }
}

/// In-memory media session registry.
#[derive(Default)]
pub struct DesktopMediaSessions {
    open: Mutex<HashSet<MediaSessionId>>,
}

impl DesktopMediaSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}

impl MediaSessionProvider for DesktopMediaSessions {
    fn open(&self, name: &str) -> Result<MediaSessionId> {
        let id = MediaSessionId(Uuid::new_v4().to_string());
        self.open.lock().insert(id.clone());
        debug!(id = %id.0, name, "Media session opened");
        Ok(id)
    }

    fn close(&self, id: &MediaSessionId) -> Result<()> {
        if self.open.lock().remove(id) {
            debug!(id = %id.0, "Media session closed");
        }
        Ok(())
    }
}
