//! Foreground Presence
//!
//! Persistent notification and media-session handles that keep the host
//! visible to the platform while the engine runs.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Importance assigned to a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelImportance {
    Min,
    Low,
    Default,
    High,
}

impl ChannelImportance {
    /// Numeric level as understood by channel-capable platforms.
    pub fn level(&self) -> i32 {
        match self {
            ChannelImportance::Min => 1,
            ChannelImportance::Low => 2,
            ChannelImportance::Default => 3,
            ChannelImportance::High => 4,
        }
    }
}

/// Notification channel description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub importance: ChannelImportance,
}

/// Persistent notification shown while the service is in the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub channel: ChannelSpec,
    pub title: String,
    pub text: String,
    pub ongoing: bool,
}

impl Default for NotificationSpec {
    fn default() -> Self {
        Self {
            channel: ChannelSpec {
                id: "engine-host".to_string(),
                name: "Engine host service".to_string(),
                importance: ChannelImportance::Default,
            },
            title: "Audio engine".to_string(),
            text: "Audio engine is running".to_string(),
            ongoing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSessionId(pub String);

/// Posts and cancels the host's persistent notification.
///
/// Platforms that group notifications into channels report
/// `supports_channels() == true` and expect `create_channel` before the
/// first `post` on that channel. Any call may be refused by the platform.
pub trait NotificationPoster: Send + Sync {
    fn supports_channels(&self) -> bool;

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()>;

    fn post(&self, notification: &NotificationSpec) -> Result<NotificationId>;

    fn cancel(&self, id: &NotificationId) -> Result<()>;
}

/// Opens and closes the media session advertised while the engine runs.
pub trait MediaSessionProvider: Send + Sync {
    fn open(&self, name: &str) -> Result<MediaSessionId>;

    fn close(&self, id: &MediaSessionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_notification_is_ongoing() {
        let spec = NotificationSpec::default();
        assert!(spec.ongoing);
        assert_eq!(spec.channel.importance.level(), 3);
    }
}
