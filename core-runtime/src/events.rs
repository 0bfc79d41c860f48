//! # Event Bus System
//!
//! Provides an in-process event stream for the engine host using
//! `tokio::sync::broadcast`. Every committed lifecycle transition and every
//! foreground-resource change is published here, in commit order, for
//! diagnostics and for embedders that prefer a channel over listener
//! callbacks.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`ServiceStatus`] and [`ResourceEvent`], wrapped by [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │ Supervisor     ├──────────>│           │    subscribe    ┌────────────┐
//! └────────────────┘           │ EventBus  ├────────────────>│ Subscriber │
//! ┌────────────────┐   emit    │ (broadcast│                 └────────────┘
//! │ Resource coord.├──────────>│  channel) │
//! └────────────────┘           └───────────┘
//! ```
//!
//! The bus is a side channel. Lifecycle callbacks with catch-up delivery are
//! the listener registry's job; a bus subscriber only sees events emitted
//! after it subscribed.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ServiceStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Service(ServiceStatus::Started)).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Service(ServiceStatus::Started));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// A committed lifecycle transition
    Service(ServiceStatus),
    /// A foreground resource changed hands
    Resource(ResourceEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Service(status) => status.description(),
            CoreEvent::Resource(event) => event.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Service(status) => status.severity(),
            CoreEvent::Resource(_) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Service Status
// ============================================================================

/// Observable lifecycle state of the supervised engine.
///
/// The transient "starting" phase is deliberately absent: it is never
/// committed, so no observer can see it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "message")]
pub enum ServiceStatus {
    /// No engine work in flight (initial state)
    #[default]
    Stopped,
    /// The worker has entered the engine's `run`
    Started,
    /// The engine reported a failure; terminal until an explicit restart
    Error(String),
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Started)
    }

    /// The failure message, when in the error state.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ServiceStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    fn description(&self) -> &str {
        match self {
            ServiceStatus::Stopped => "Engine stopped",
            ServiceStatus::Started => "Engine started",
            ServiceStatus::Error(_) => "Engine failed",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            ServiceStatus::Stopped => EventSeverity::Info,
            ServiceStatus::Started => EventSeverity::Info,
            ServiceStatus::Error(_) => EventSeverity::Error,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Stopped => f.write_str("stopped"),
            ServiceStatus::Started => f.write_str("started"),
            ServiceStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

// ============================================================================
// Resource Events
// ============================================================================

/// Changes to the resources held around the engine's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ResourceEvent {
    /// The power-retention lock was acquired or re-armed.
    WakeGuardAcquired {
        /// Maximum hold time in seconds.
        timeout_secs: u64,
    },
    /// The power-retention lock was released.
    WakeGuardReleased,
    /// The persistent notification (and media session, if any) were created.
    ForegroundOpened {
        notification_id: String,
        media_session_id: Option<String>,
    },
    /// The persistent notification and media session were torn down.
    ForegroundClosed,
}

impl ResourceEvent {
    fn description(&self) -> &str {
        match self {
            ResourceEvent::WakeGuardAcquired { .. } => "Wake guard acquired",
            ResourceEvent::WakeGuardReleased => "Wake guard released",
            ResourceEvent::ForegroundOpened { .. } => "Foreground presence opened",
            ResourceEvent::ForegroundClosed => "Foreground presence closed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to host events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `tokio::sync::broadcast` requirement).
    /// `HostConfig` validation rejects a zero buffer before it reaches here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribes and wraps the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let lifecycle_only = event_bus
///     .stream()
///     .filter(|event| matches!(event, CoreEvent::Service(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
