//! Foreground resources held while the engine runs.
//!
//! [`WakeGuard`] owns the power-retention lock; [`ForegroundCoordinator`]
//! owns the persistent notification and the optional media session. Both
//! are driven by the supervisor under its lifecycle lock.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{
    BridgeError, MediaSessionId, MediaSessionProvider, NotificationId, NotificationPoster,
    NotificationSpec, WakeLock,
};
use core_runtime::events::{CoreEvent, EventBus, ResourceEvent};
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};

// ============================================================================
// Wake guard
// ============================================================================

/// Keeps the device awake for at most `timeout` per acquisition.
pub struct WakeGuard {
    lock: Arc<dyn WakeLock>,
    timeout: Duration,
    enabled: bool,
    events: EventBus,
}

impl WakeGuard {
    pub fn new(lock: Arc<dyn WakeLock>, timeout: Duration, events: EventBus) -> Self {
        Self {
            lock,
            timeout,
            enabled: false,
            events,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquires the lock. Calling it again re-arms the timeout.
    pub fn enable(&mut self) -> Result<()> {
        self.lock.acquire(self.timeout)?;
        self.enabled = true;

        debug!(timeout_secs = self.timeout.as_secs(), "Wake guard acquired");
        let _ = self
            .events
            .emit(CoreEvent::Resource(ResourceEvent::WakeGuardAcquired {
                timeout_secs: self.timeout.as_secs(),
            }));
        Ok(())
    }

    /// Releases the lock if this guard holds it. Release failures are logged
    /// and the guard is considered disabled regardless.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;

        if let Err(err) = self.lock.release() {
            warn!(error = %err, "Failed to release wake lock");
        }
        debug!("Wake guard released");
        let _ = self
            .events
            .emit(CoreEvent::Resource(ResourceEvent::WakeGuardReleased));
    }
}

// ============================================================================
// Foreground notification and media session
// ============================================================================

/// How the persistent notification is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStrategy {
    /// Create the channel, then post into it.
    Channelled,
    /// Post directly; the platform has no channels.
    Legacy,
}

impl NotificationStrategy {
    pub fn for_poster(poster: &dyn NotificationPoster) -> Self {
        if poster.supports_channels() {
            NotificationStrategy::Channelled
        } else {
            NotificationStrategy::Legacy
        }
    }
}

/// Handles acquired by [`ForegroundCoordinator::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundLease {
    pub notification: NotificationId,
    pub media_session: Option<MediaSessionId>,
}

pub struct ForegroundCoordinator {
    poster: Arc<dyn NotificationPoster>,
    sessions: Option<Arc<dyn MediaSessionProvider>>,
    strategy: NotificationStrategy,
    notification: NotificationSpec,
    session_name: String,
    channel_ready: bool,
    events: EventBus,
}

impl ForegroundCoordinator {
    pub fn new(
        poster: Arc<dyn NotificationPoster>,
        sessions: Option<Arc<dyn MediaSessionProvider>>,
        notification: NotificationSpec,
        session_name: String,
        events: EventBus,
    ) -> Self {
        let strategy = NotificationStrategy::for_poster(poster.as_ref());
        debug!(?strategy, "Notification strategy selected");

        Self {
            poster,
            sessions,
            strategy,
            notification,
            session_name,
            channel_ready: false,
            events,
        }
    }

    pub fn strategy(&self) -> NotificationStrategy {
        self.strategy
    }

    /// Posts the notification and opens the media session.
    ///
    /// On failure nothing stays acquired: a posted notification is
    /// cancelled again if the media session cannot be opened.
    pub fn open(&mut self) -> Result<ForegroundLease> {
        if self.strategy == NotificationStrategy::Channelled && !self.channel_ready {
            self.poster
                .create_channel(&self.notification.channel)
                .map_err(|source| unavailable("notification channel", source))?;
            self.channel_ready = true;
        }

        let notification = self
            .poster
            .post(&self.notification)
            .map_err(|source| unavailable("notification", source))?;

        let media_session = match &self.sessions {
            Some(sessions) => match sessions.open(&self.session_name) {
                Ok(id) => Some(id),
                Err(source) => {
                    if let Err(err) = self.poster.cancel(&notification) {
                        warn!(error = %err, "Failed to cancel notification after media session failure");
                    }
                    return Err(unavailable("media session", source));
                }
            },
            None => None,
        };

        info!(
            notification_id = %notification.0,
            media_session = media_session.as_ref().map(|id| id.0.as_str()),
            "Foreground presence acquired"
        );
        let _ = self
            .events
            .emit(CoreEvent::Resource(ResourceEvent::ForegroundOpened {
                notification_id: notification.0.clone(),
                media_session_id: media_session.as_ref().map(|id| id.0.clone()),
            }));

        Ok(ForegroundLease {
            notification,
            media_session,
        })
    }

    /// Releases everything held by `lease`. Failures are logged only.
    pub fn close(&mut self, lease: ForegroundLease) {
        if let (Some(sessions), Some(id)) = (&self.sessions, &lease.media_session) {
            if let Err(err) = sessions.close(id) {
                warn!(error = %err, media_session = %id.0, "Failed to close media session");
            }
        }

        if let Err(err) = self.poster.cancel(&lease.notification) {
            warn!(error = %err, notification_id = %lease.notification.0, "Failed to cancel notification");
        }

        info!("Foreground presence released");
        let _ = self
            .events
            .emit(CoreEvent::Resource(ResourceEvent::ForegroundClosed));
    }
}

fn unavailable(resource: &'static str, source: BridgeError) -> ServiceError {
    ServiceError::ResourceUnavailable { resource, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ChannelSpec;
    use mockall::{mock, predicate::eq, Sequence};

    type BridgeResult<T> = std::result::Result<T, BridgeError>;

    mock! {
        Poster {}
        impl NotificationPoster for Poster {
            fn supports_channels(&self) -> bool;
            fn create_channel(&self, channel: &ChannelSpec) -> BridgeResult<()>;
            fn post(&self, notification: &NotificationSpec) -> BridgeResult<NotificationId>;
            fn cancel(&self, id: &NotificationId) -> BridgeResult<()>;
        }
    }

    mock! {
        Sessions {}
        impl MediaSessionProvider for Sessions {
            fn open(&self, name: &str) -> BridgeResult<MediaSessionId>;
            fn close(&self, id: &MediaSessionId) -> BridgeResult<()>;
        }
    }

    mock! {
        Lock {}
        impl WakeLock for Lock {
            fn acquire(&self, timeout: Duration) -> BridgeResult<()>;
            fn release(&self) -> BridgeResult<()>;
            fn is_held(&self) -> bool;
        }
    }

    fn coordinator(
        poster: MockPoster,
        sessions: Option<MockSessions>,
    ) -> (ForegroundCoordinator, EventBus) {
        let events = EventBus::new(16);
        let sessions = sessions.map(|s| Arc::new(s) as Arc<dyn MediaSessionProvider>);
        let coordinator = ForegroundCoordinator::new(
            Arc::new(poster),
            sessions,
            NotificationSpec::default(),
            "engine-host".to_string(),
            events.clone(),
        );
        (coordinator, events)
    }

    #[test]
    fn test_channelled_creates_channel_before_posting() {
        let mut seq = Sequence::new();
        let mut poster = MockPoster::new();
        poster.expect_supports_channels().return_const(true);
        poster
            .expect_create_channel()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        poster
            .expect_post()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(NotificationId("n-1".into())));
        poster.expect_cancel().returning(|_| Ok(()));

        let (mut coordinator, _events) = coordinator(poster, None);
        assert_eq!(coordinator.strategy(), NotificationStrategy::Channelled);

        let lease = coordinator.open().unwrap();
        coordinator.close(lease);
        // Channel already exists on the second acquisition.
        coordinator.open().unwrap();
    }

    #[test]
    fn test_legacy_posts_without_channel() {
        let mut poster = MockPoster::new();
        poster.expect_supports_channels().return_const(false);
        poster.expect_create_channel().never();
        poster
            .expect_post()
            .times(1)
            .returning(|_| Ok(NotificationId("n-1".into())));

        let (mut coordinator, _events) = coordinator(poster, None);
        assert_eq!(coordinator.strategy(), NotificationStrategy::Legacy);

        let lease = coordinator.open().unwrap();
        assert_eq!(lease.notification, NotificationId("n-1".into()));
        assert!(lease.media_session.is_none());
    }

    #[test]
    fn test_post_failure_reports_resource() {
        let mut poster = MockPoster::new();
        poster.expect_supports_channels().return_const(false);
        poster
            .expect_post()
            .returning(|_| Err(BridgeError::PermissionDenied("notifications off".into())));

        let (mut coordinator, _events) = coordinator(poster, None);
        match coordinator.open() {
            Err(ServiceError::ResourceUnavailable { resource, .. }) => {
                assert_eq!(resource, "notification")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_session_failure_cancels_notification() {
        let mut poster = MockPoster::new();
        poster.expect_supports_channels().return_const(false);
        poster
            .expect_post()
            .returning(|_| Ok(NotificationId("n-7".into())));
        poster
            .expect_cancel()
            .with(eq(NotificationId("n-7".into())))
            .times(1)
            .returning(|_| Ok(()));

        let mut sessions = MockSessions::new();
        sessions
            .expect_open()
            .returning(|_| Err(BridgeError::NotAvailable("no session service".into())));

        let (mut coordinator, _events) = coordinator(poster, Some(sessions));
        match coordinator.open() {
            Err(ServiceError::ResourceUnavailable { resource, .. }) => {
                assert_eq!(resource, "media session")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_close_releases_session_then_notification() {
        let mut seq = Sequence::new();
        let mut poster = MockPoster::new();
        poster.expect_supports_channels().return_const(false);
        poster
            .expect_post()
            .returning(|_| Ok(NotificationId("n-1".into())));

        let mut sessions = MockSessions::new();
        sessions
            .expect_open()
            .withf(|name| name == "engine-host")
            .returning(|_| Ok(MediaSessionId("s-1".into())));
        sessions
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        poster
            .expect_cancel()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (mut coordinator, events) = coordinator(poster, Some(sessions));
        let mut rx = events.subscribe();

        let lease = coordinator.open().unwrap();
        assert_eq!(lease.media_session, Some(MediaSessionId("s-1".into())));
        coordinator.close(lease);

        assert!(matches!(
            rx.try_recv().unwrap(),
            CoreEvent::Resource(ResourceEvent::ForegroundOpened { .. })
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Resource(ResourceEvent::ForegroundClosed)
        );
    }

    #[test]
    fn test_wake_guard_reacquires_and_releases_once() {
        let mut lock = MockLock::new();
        lock.expect_acquire()
            .with(eq(Duration::from_secs(600)))
            .times(2)
            .returning(|_| Ok(()));
        lock.expect_release().times(1).returning(|| Ok(()));

        let mut guard = WakeGuard::new(Arc::new(lock), Duration::from_secs(600), EventBus::new(8));
        guard.enable().unwrap();
        guard.enable().unwrap();
        assert!(guard.is_enabled());

        guard.disable();
        guard.disable();
        assert!(!guard.is_enabled());
    }

    #[test]
    fn test_wake_guard_acquire_failure_leaves_disabled() {
        let mut lock = MockLock::new();
        lock.expect_acquire()
            .returning(|_| Err(BridgeError::PermissionDenied("wake lock".into())));
        lock.expect_release().never();

        let mut guard = WakeGuard::new(Arc::new(lock), Duration::from_secs(1), EventBus::new(8));
        assert!(guard.enable().is_err());
        assert!(!guard.is_enabled());
        guard.disable();
    }
}
