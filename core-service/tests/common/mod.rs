//! Shared fixtures: a scripted engine and bridges that journal every call.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_desktop::SqliteSettingsStore;
use bridge_traits::{
    error::Result as BridgeResult, AudioEngine, BridgeError, ChannelSpec, EngineFailure,
    EngineLogSink, EngineSeverity, MediaSessionId, MediaSessionProvider, NotificationId,
    NotificationPoster, NotificationSpec, WakeLock,
};
use core_runtime::config::{HostConfig, HostConfigBuilder};
use core_runtime::events::ServiceStatus;
use core_service::{EngineLoader, HostService, ServiceClient};
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Journal
// ============================================================================

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: &str) {
        self.0.lock().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Block in `run` until `shutdown` is called.
    RunUntilShutdown,
    /// Like `RunUntilShutdown`, then linger before returning.
    SlowExit(Duration),
    /// Return a failure immediately.
    Fail(String),
    /// Panic inside `run`.
    Panic(String),
}

pub struct FakeEngine {
    behavior: Mutex<Behavior>,
    shutdown_requested: Mutex<bool>,
    released: Condvar,
    pub runs: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub pauses: AtomicUsize,
    in_run: AtomicUsize,
    max_in_run: AtomicUsize,
    journal: Journal,
}

impl FakeEngine {
    pub fn new(behavior: Behavior, journal: Journal) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            shutdown_requested: Mutex::new(false),
            released: Condvar::new(),
            runs: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            in_run: AtomicUsize::new(0),
            max_in_run: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Most `run` calls ever observed executing at once.
    pub fn max_concurrent_runs(&self) -> usize {
        self.max_in_run.load(Ordering::SeqCst)
    }

    fn wait_for_shutdown(&self) {
        let mut requested = self.shutdown_requested.lock();
        while !*requested {
            self.released.wait(&mut requested);
        }
        // Consumed here so a shutdown racing ahead of `run` is not lost.
        *requested = false;
    }
}

impl AudioEngine for FakeEngine {
    fn run(&self, sink: Arc<dyn EngineLogSink>) -> Result<(), EngineFailure> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let concurrent = self.in_run.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_run.fetch_max(concurrent, Ordering::SeqCst);
        self.journal.record("engine.run.enter");
        sink.log(EngineSeverity::Info, "engine ready");

        let behavior = self.behavior.lock().clone();
        let result = match behavior {
            Behavior::RunUntilShutdown => {
                self.wait_for_shutdown();
                Ok(())
            }
            Behavior::SlowExit(linger) => {
                self.wait_for_shutdown();
                std::thread::sleep(linger);
                Ok(())
            }
            Behavior::Fail(message) => {
                sink.log_priority(6, &message);
                Err(EngineFailure::new(message))
            }
            Behavior::Panic(message) => {
                self.in_run.fetch_sub(1, Ordering::SeqCst);
                panic!("{}", message)
            }
        };

        self.in_run.fetch_sub(1, Ordering::SeqCst);
        self.journal.record("engine.run.exit");
        result
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.journal.record("engine.shutdown");
        *self.shutdown_requested.lock() = true;
        self.released.notify_all();
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.journal.record("engine.pause");
    }
}

// ============================================================================
// Bridges
// ============================================================================

pub struct RecordingWakeLock {
    journal: Journal,
    held: AtomicBool,
}

impl WakeLock for RecordingWakeLock {
    fn acquire(&self, _timeout: Duration) -> BridgeResult<()> {
        self.journal.record("wake.acquire");
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> BridgeResult<()> {
        self.journal.record("wake.release");
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

pub struct RecordingPoster {
    journal: Journal,
    denied: AtomicBool,
    next_id: AtomicUsize,
}

impl RecordingPoster {
    pub fn deny(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }
}

impl NotificationPoster for RecordingPoster {
    fn supports_channels(&self) -> bool {
        true
    }

    fn create_channel(&self, _channel: &ChannelSpec) -> BridgeResult<()> {
        self.journal.record("notification.channel");
        Ok(())
    }

    fn post(&self, _notification: &NotificationSpec) -> BridgeResult<NotificationId> {
        if self.denied.load(Ordering::SeqCst) {
            self.journal.record("notification.denied");
            return Err(BridgeError::PermissionDenied(
                "notifications disabled".to_string(),
            ));
        }
        self.journal.record("notification.post");
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(NotificationId(format!("notification-{}", id)))
    }

    fn cancel(&self, _id: &NotificationId) -> BridgeResult<()> {
        self.journal.record("notification.cancel");
        Ok(())
    }
}

pub struct RecordingSessions {
    journal: Journal,
}

impl MediaSessionProvider for RecordingSessions {
    fn open(&self, name: &str) -> BridgeResult<MediaSessionId> {
        self.journal.record("session.open");
        Ok(MediaSessionId(name.to_string()))
    }

    fn close(&self, _id: &MediaSessionId) -> BridgeResult<()> {
        self.journal.record("session.close");
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub service: HostService,
    pub client: ServiceClient,
    pub engine: Arc<FakeEngine>,
    pub journal: Journal,
    pub wake_lock: Arc<RecordingWakeLock>,
    pub poster: Arc<RecordingPoster>,
    pub settings: Arc<SqliteSettingsStore>,
}

pub struct HarnessOptions {
    pub behavior: Behavior,
    pub load_engine: bool,
    pub join_timeout: Option<Duration>,
    pub customize: Option<Box<dyn FnOnce(HostConfigBuilder) -> HostConfigBuilder>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            behavior: Behavior::RunUntilShutdown,
            load_engine: true,
            join_timeout: Some(WAIT),
            customize: None,
        }
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_behavior(behavior: Behavior) -> Self {
        Self::with_options(HarnessOptions {
            behavior,
            ..HarnessOptions::default()
        })
        .await
    }

    pub async fn with_options(options: HarnessOptions) -> Self {
        let journal = Journal::default();
        let engine = Arc::new(FakeEngine::new(options.behavior, journal.clone()));
        let wake_lock = Arc::new(RecordingWakeLock {
            journal: journal.clone(),
            held: AtomicBool::new(false),
        });
        let poster = Arc::new(RecordingPoster {
            journal: journal.clone(),
            denied: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        });
        let sessions = Arc::new(RecordingSessions {
            journal: journal.clone(),
        });
        let settings = Arc::new(
            SqliteSettingsStore::in_memory()
                .await
                .expect("in-memory settings store"),
        );

        let mut builder = HostConfig::builder()
            .settings_store(settings.clone())
            .wake_lock(wake_lock.clone())
            .notification_poster(poster.clone())
            .media_sessions(sessions)
            .join_timeout(options.join_timeout);
        if let Some(customize) = options.customize {
            builder = customize(builder);
        }
        let config = builder.build().expect("valid host config");

        let loader = Arc::new(EngineLoader::new());
        if options.load_engine {
            loader.install(engine.clone());
        }

        let service = HostService::new(config, loader).expect("host service");
        let client = service.client();

        Self {
            service,
            client,
            engine,
            journal,
            wake_lock,
            poster,
            settings,
        }
    }
}

/// Receives the next status or panics after [`WAIT`].
pub async fn next_status(receiver: &mut UnboundedReceiver<ServiceStatus>) -> ServiceStatus {
    tokio::time::timeout(WAIT, receiver.recv())
        .await
        .expect("timed out waiting for a status")
        .expect("status channel closed")
}

/// Asserts nothing else arrives within a short grace period.
pub async fn assert_quiet(receiver: &mut UnboundedReceiver<ServiceStatus>) {
    let extra = tokio::time::timeout(Duration::from_millis(100), receiver.recv()).await;
    assert!(extra.is_err(), "unexpected status: {:?}", extra);
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
