//! Command surface handed to presentation layers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{AudioRouteEvent, AudioRouteObserver};
use core_runtime::events::ServiceStatus;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::listeners::{ListenerId, ServiceListener};
use crate::status::StatusSnapshot;
use crate::supervisor::Supervisor;

/// Cheap, cloneable handle to the running host service.
///
/// `start`, `stop` and `pause` are synchronous; `stop` may block until the
/// engine returns, so async callers should prefer [`stop_async`](Self::stop_async).
#[derive(Clone)]
pub struct ServiceClient {
    supervisor: Arc<Supervisor>,
    pause_on_disconnect: Arc<AtomicBool>,
    route_watch: Arc<RouteWatch>,
}

impl ServiceClient {
    pub(crate) fn new(
        supervisor: Arc<Supervisor>,
        route_observer: Option<Arc<dyn AudioRouteObserver>>,
        runtime: Option<Handle>,
    ) -> Self {
        if route_observer.is_some() && runtime.is_none() {
            warn!("No tokio runtime for the audio route observer, disconnects will not pause");
        }

        Self {
            supervisor,
            pause_on_disconnect: Arc::new(AtomicBool::new(false)),
            route_watch: Arc::new(RouteWatch {
                observer: route_observer,
                runtime,
                task: Mutex::new(None),
            }),
        }
    }

    /// Starts the engine and, when a route observer is configured, begins
    /// watching for output disconnects.
    pub fn start(&self) -> Result<()> {
        self.supervisor.start()?;
        self.route_watch
            .arm(Arc::clone(&self.supervisor), Arc::clone(&self.pause_on_disconnect));
        Ok(())
    }

    pub fn stop(&self) {
        self.route_watch.disarm();
        self.supervisor.stop();
    }

    /// Runs [`stop`](Self::stop) on the blocking pool.
    pub async fn stop_async(&self) -> Result<()> {
        self.route_watch.disarm();
        let supervisor = Arc::clone(&self.supervisor);
        tokio::task::spawn_blocking(move || supervisor.stop())
            .await
            .map_err(|e| ServiceError::Internal(format!("Stop task failed: {}", e)))
    }

    pub fn pause(&self) {
        self.supervisor.pause();
    }

    /// Pause the engine when the audio output disconnects.
    pub fn set_pause_on_disconnect_policy(&self, enabled: bool) {
        debug!(enabled, "Pause-on-disconnect policy updated");
        self.pause_on_disconnect.store(enabled, Ordering::Release);
    }

    pub fn pause_on_disconnect_policy(&self) -> bool {
        self.pause_on_disconnect.load(Ordering::Acquire)
    }

    /// Hold the wake guard while the engine runs.
    pub fn set_wake_guard_enabled(&self, enabled: bool) {
        debug!(enabled, "Wake guard request updated");
        self.supervisor.set_wake_guard(enabled);
    }

    /// `true` from a successful `start()` until the worker commits a
    /// terminal status or `stop()` returns.
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn status(&self) -> ServiceStatus {
        self.supervisor.status()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.supervisor.status_tracker().snapshot()
    }

    /// Registers a lifecycle observer. The current status is delivered to it
    /// before this returns.
    pub fn register(&self, listener: Arc<dyn ServiceListener>) -> ListenerId {
        self.supervisor.listeners().register(listener)
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        self.supervisor.listeners().unregister(id)
    }

    /// `true` while the audio route watcher task is alive.
    pub fn is_watching_audio_route(&self) -> bool {
        self.route_watch.is_active()
    }
}

/// Audio route watcher shared by every clone of a client. Armed by `start`
/// and aborted by `stop`.
struct RouteWatch {
    observer: Option<Arc<dyn AudioRouteObserver>>,
    runtime: Option<Handle>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RouteWatch {
    fn arm(&self, supervisor: Arc<Supervisor>, policy: Arc<AtomicBool>) {
        let (Some(observer), Some(runtime)) = (&self.observer, &self.runtime) else {
            return;
        };

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let observer = Arc::clone(observer);
        *task = Some(runtime.spawn(async move {
            let mut changes = match observer.subscribe_changes().await {
                Ok(changes) => changes,
                Err(err) => {
                    warn!(error = %err, "Audio route subscription failed");
                    return;
                }
            };
            debug!("Watching audio route");

            while let Some(event) = changes.next().await {
                match event {
                    AudioRouteEvent::BecomingNoisy if policy.load(Ordering::Acquire) => {
                        info!("Audio output disconnected, pausing engine");
                        supervisor.pause();
                    }
                    other => debug!(event = ?other, "Audio route event ignored"),
                }
            }
            debug!("Audio route stream ended");
        }));
    }

    fn disarm(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RouteWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("running", &self.is_running())
            .field("pause_on_disconnect", &self.pause_on_disconnect_policy())
            .field("watching_audio_route", &self.is_watching_audio_route())
            .finish()
    }
}
