//! In-process wake lock for desktop hosts.
//!
//! Desktop platforms have no per-process power lease the core can rely on, so
//! this adapter models one: a timed lease that expires on its own, driven by
//! an injectable [`Clock`] so expiry can be tested.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{
    error::{BridgeError, Result},
    power::{WakeLock, DEFAULT_WAKE_LOCK_TAG},
    time::{Clock, SystemClock},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Timed wake lock lease.
pub struct DesktopWakeLock {
    tag: String,
    clock: Arc<dyn Clock>,
    expires_at: Mutex<Option<DateTime<Utc>>>,
}

impl DesktopWakeLock {
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_WAKE_LOCK_TAG, Arc::new(SystemClock))
    }

    pub fn with_clock(tag: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tag: tag.into(),
            clock,
            expires_at: Mutex::new(None),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Instant at which the current lease lapses, if one is active.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let expires_at = *self.expires_at.lock();
        expires_at.filter(|deadline| *deadline > self.clock.now())
    }
}

impl Default for DesktopWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for DesktopWakeLock {
    fn acquire(&self, timeout: Duration) -> Result<()> {
        let timeout = chrono::Duration::from_std(timeout).map_err(|e| {
            BridgeError::OperationFailed(format!("Invalid wake lock timeout: {}", e))
        })?;
        let deadline = self.clock.now() + timeout;

        *self.expires_at.lock() = Some(deadline);
        info!(tag = %self.tag, %deadline, "Wake lock acquired");
        Ok(())
    }

    fn release(&self) -> Result<()> {
        if self.expires_at.lock().take().is_some() {
            info!(tag = %self.tag, "Wake lock released");
        } else {
            debug!(tag = %self.tag, "Wake lock release requested while not held");
        }
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.expires_at().is_some()
    }
}
