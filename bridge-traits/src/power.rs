//! Power Retention
//!
//! A process-wide lock that keeps the device from sleeping while audio work
//! is in progress.

use std::time::Duration;

use crate::error::Result;

/// Tag used for the host's single wake lock.
pub const DEFAULT_WAKE_LOCK_TAG: &str = "engine-host:wakelock-main";

/// Platform power-retention lock.
///
/// Acquisitions always carry a timeout so a lock whose release was missed
/// cannot be held forever. Acquiring while held re-arms the timeout.
///
/// # Platform Support
///
/// - **Android**: `PowerManager.WakeLock` (partial)
/// - **Desktop**: in-process lease (see `bridge-desktop`)
pub trait WakeLock: Send + Sync {
    /// Acquire (or re-arm) the lock for at most `timeout`.
    fn acquire(&self, timeout: Duration) -> Result<()>;

    /// Release the lock. Releasing an unheld lock is not an error.
    fn release(&self) -> Result<()>;

    /// Whether the lock is currently held and not yet expired.
    fn is_held(&self) -> bool;
}
