//! Observable copy of the committed service status.

use core_runtime::events::ServiceStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Status message shown while the engine runs.
pub const STARTED_MESSAGE: &str = "service started";

/// Flattened status for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    /// `"service started"`, empty once stopped, or the engine failure message.
    pub message: String,
}

impl From<&ServiceStatus> for StatusSnapshot {
    fn from(status: &ServiceStatus) -> Self {
        match status {
            ServiceStatus::Started => Self {
                running: true,
                message: STARTED_MESSAGE.to_string(),
            },
            ServiceStatus::Stopped => Self::default(),
            ServiceStatus::Error(message) => Self {
                running: false,
                message: message.clone(),
            },
        }
    }
}

/// Latest committed status, readable without touching the lifecycle lock.
pub struct StatusTracker {
    status: watch::Sender<ServiceStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ServiceStatus::Stopped);
        Self { status }
    }

    pub(crate) fn publish(&self, status: &ServiceStatus) {
        self.status.send_replace(status.clone());
    }

    pub fn current(&self) -> ServiceStatus {
        self.status.borrow().clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::from(&*self.status.borrow())
    }

    pub fn subscribe(&self) -> StatusWatch {
        StatusWatch {
            receiver: self.status.subscribe(),
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of [`StatusTracker::subscribe`].
pub struct StatusWatch {
    receiver: watch::Receiver<ServiceStatus>,
}

impl StatusWatch {
    pub fn current(&mut self) -> StatusSnapshot {
        StatusSnapshot::from(&*self.receiver.borrow_and_update())
    }

    /// Waits for the next commit. Intermediate commits may be skipped.
    /// Returns `None` once the tracker is dropped.
    pub async fn changed(&mut self) -> Option<StatusSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.current())
    }

    /// Waits until `predicate` holds for the committed status.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<ServiceStatus>
    where
        F: FnMut(&ServiceStatus) -> bool,
    {
        self.receiver
            .wait_for(|status| predicate(status))
            .await
            .ok()
            .map(|status| status.clone())
    }
}
