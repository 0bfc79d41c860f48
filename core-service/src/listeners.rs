//! Listener registry and lifecycle callback fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use core_runtime::events::ServiceStatus;
use parking_lot::{Mutex, ReentrantMutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Why a callback could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The observer is gone for good; the registry drops it.
    #[error("listener is unreachable")]
    Unreachable,

    /// The observer refused this delivery but stays registered.
    #[error("listener rejected delivery: {0}")]
    Rejected(String),
}

/// Observer of lifecycle transitions.
///
/// Callbacks run on whichever thread committed the transition, while the
/// service's lifecycle lock is held. They must return promptly and must not
/// call `start`, `stop` or `pause` synchronously; hand work off to another
/// thread or task instead (see [`ChannelListener`]).
pub trait ServiceListener: Send + Sync {
    fn on_started(&self) -> Result<(), ListenerError>;

    fn on_stopped(&self) -> Result<(), ListenerError>;

    fn on_error(&self, message: &str) -> Result<(), ListenerError>;
}

fn deliver(listener: &dyn ServiceListener, status: &ServiceStatus) -> Result<(), ListenerError> {
    match status {
        ServiceStatus::Started => listener.on_started(),
        ServiceStatus::Stopped => listener.on_stopped(),
        ServiceStatus::Error(message) => listener.on_error(message),
    }
}

/// Registration token returned by [`ListenerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct RegistryState {
    listeners: HashMap<ListenerId, Arc<dyn ServiceListener>>,
    current: ServiceStatus,
}

/// Dynamic set of lifecycle observers.
///
/// `delivery` serializes broadcasts against catch-up deliveries so every
/// listener sees transitions in commit order, catch-up included. It is
/// reentrant so a callback may register further listeners. `state` is only
/// held for bookkeeping, never across a callback, so `unregister` never
/// waits on a delivery in progress.
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
    delivery: ReentrantMutex<()>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                listeners: HashMap::new(),
                current: ServiceStatus::Stopped,
            }),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Adds a listener and immediately delivers the current status to it.
    ///
    /// Registering the same listener twice returns the original id; the
    /// catch-up is delivered either way.
    ///
    /// Waits for a broadcast already in flight to finish delivering. The
    /// catch-up is then the status that broadcast carried, and a listener
    /// never sees a stale catch-up after a newer transition. A listener that
    /// blocks inside a callback therefore also delays registrations. Called
    /// from inside a callback, this does not deadlock: the delivery lock is
    /// reentrant.
    pub fn register(&self, listener: Arc<dyn ServiceListener>) -> ListenerId {
        let _delivery = self.delivery.lock();

        let (id, current) = {
            let mut state = self.state.lock();
            let existing = state
                .listeners
                .iter()
                .find(|(_, registered)| same_listener(registered, &listener))
                .map(|(id, _)| *id);

            let id = existing.unwrap_or_else(|| {
                let id = ListenerId(Uuid::new_v4());
                state.listeners.insert(id, Arc::clone(&listener));
                id
            });
            (id, state.current.clone())
        };

        debug!(listener_id = %id, status = %current, "Listener registered");
        self.deliver_one(id, listener.as_ref(), &current);
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.state.lock().listeners.remove(&id).is_some();
        if removed {
            debug!(listener_id = %id, "Listener unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of the most recent broadcast.
    pub fn current(&self) -> ServiceStatus {
        self.state.lock().current.clone()
    }

    /// Delivers `status` to every listener registered at the time of the
    /// call. Failures are absorbed per listener.
    pub fn broadcast(&self, status: &ServiceStatus) {
        let _delivery = self.delivery.lock();

        let recipients: Vec<(ListenerId, Arc<dyn ServiceListener>)> = {
            let mut state = self.state.lock();
            state.current = status.clone();
            state
                .listeners
                .iter()
                .map(|(id, listener)| (*id, Arc::clone(listener)))
                .collect()
        };

        trace!(status = %status, recipients = recipients.len(), "Broadcasting status");

        for (id, listener) in recipients {
            // Skip anyone unregistered since the snapshot was taken.
            if !self.state.lock().listeners.contains_key(&id) {
                continue;
            }
            self.deliver_one(id, listener.as_ref(), status);
        }
    }

    fn deliver_one(&self, id: ListenerId, listener: &dyn ServiceListener, status: &ServiceStatus) {
        match deliver(listener, status) {
            Ok(()) => {}
            Err(ListenerError::Unreachable) => {
                debug!(listener_id = %id, "Pruning unreachable listener");
                self.state.lock().listeners.remove(&id);
            }
            Err(err) => {
                debug!(listener_id = %id, error = %err, "Listener delivery failed");
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn same_listener(a: &Arc<dyn ServiceListener>, b: &Arc<dyn ServiceListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Forwards callbacks into an unbounded tokio channel.
///
/// Delivery never blocks. Once the receiver is dropped the listener reports
/// itself unreachable and is pruned on the next delivery.
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<ServiceStatus>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServiceStatus>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, status: ServiceStatus) -> Result<(), ListenerError> {
        self.sender
            .send(status)
            .map_err(|_| ListenerError::Unreachable)
    }
}

impl ServiceListener for ChannelListener {
    fn on_started(&self) -> Result<(), ListenerError> {
        self.forward(ServiceStatus::Started)
    }

    fn on_stopped(&self) -> Result<(), ListenerError> {
        self.forward(ServiceStatus::Stopped)
    }

    fn on_error(&self, message: &str) -> Result<(), ListenerError> {
        self.forward(ServiceStatus::Error(message.to_string()))
    }
}
