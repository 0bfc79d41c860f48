//! Engine worker supervision.
//!
//! Every lifecycle decision happens under one lock (`lifecycle`): the
//! committed status, the worker record, the abort latch, the wake guard and
//! the foreground lease. Transitions are committed and broadcast while that
//! lock is held, so transition N has been delivered to every listener before
//! transition N+1 can be committed.
//!
//! ```text
//! STOPPED --start()--> STARTING --worker entry--> STARTED --run returns--> STOPPED | ERROR
//!                          |                          |
//!                       stop(): abort latch       stop(): engine.shutdown() + join
//! ```
//!
//! A stop that outlives the join timeout releases the foreground resources
//! but leaves the worker record and the committed status alone. The worker
//! commits its own terminal status once `run` finally returns, and `start()`
//! is refused with [`ServiceError::EngineBusy`] until then.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bridge_traits::{AudioEngine, EngineLogSink};
use core_runtime::config::HostConfig;
use core_runtime::events::{CoreEvent, EventBus, ServiceStatus};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServiceError};
use crate::listeners::ListenerRegistry;
use crate::loader::EngineLoader;
use crate::log_buffer::LogBuffer;
use crate::resources::{ForegroundCoordinator, ForegroundLease, WakeGuard};
use crate::status::StatusTracker;

struct Worker {
    generation: u64,
    engine: Arc<dyn AudioEngine>,
    thread: Option<JoinHandle<()>>,
    /// Worker passed its entry check and committed STARTED.
    started: bool,
    /// Worker committed a terminal status and no longer touches the engine.
    exited: bool,
    shutdown_requested: bool,
}

struct Lifecycle {
    worker: Option<Worker>,
    abort: bool,
    generation: u64,
    wake_guard: WakeGuard,
    wake_requested: bool,
    foreground: ForegroundCoordinator,
    lease: Option<ForegroundLease>,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.generation == generation && !worker.exited)
    }

    /// A worker that has not exited and was not asked to shut down.
    fn has_active_worker(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.exited && !worker.shutdown_requested)
    }

    fn release_lease(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.foreground.close(lease);
        }
    }

    /// Drops the worker record and releases its foreground lease.
    fn reap(&mut self) -> Option<JoinHandle<()>> {
        let thread = self.worker.take().and_then(|mut worker| worker.thread.take());
        self.abort = false;
        self.release_lease();
        thread
    }
}

enum StopPlan {
    Done(Option<JoinHandle<()>>),
    Join { generation: u64 },
}

enum WaitOutcome {
    Exited,
    TimedOut,
    Gone,
}

pub(crate) struct Supervisor {
    loader: Arc<EngineLoader>,
    lifecycle: Mutex<Lifecycle>,
    worker_exit: Condvar,
    alive: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    status: Arc<StatusTracker>,
    events: EventBus,
    logs: Arc<LogBuffer>,
    join_timeout: Option<Duration>,
}

impl Supervisor {
    pub(crate) fn new(config: &HostConfig, loader: Arc<EngineLoader>, events: EventBus) -> Self {
        let options = &config.options;
        let wake_guard = WakeGuard::new(
            Arc::clone(&config.wake_lock),
            options.wake_lock_timeout,
            events.clone(),
        );
        let foreground = ForegroundCoordinator::new(
            Arc::clone(&config.notification_poster),
            config.media_sessions.clone(),
            options.notification.clone(),
            options.media_session_name.clone(),
            events.clone(),
        );

        Self {
            loader,
            lifecycle: Mutex::new(Lifecycle {
                worker: None,
                abort: false,
                generation: 0,
                wake_guard,
                wake_requested: false,
                foreground,
                lease: None,
            }),
            worker_exit: Condvar::new(),
            alive: AtomicBool::new(false),
            listeners: Arc::new(ListenerRegistry::new()),
            status: Arc::new(StatusTracker::new()),
            events,
            logs: Arc::new(LogBuffer::new(options.log_capacity)),
            join_timeout: options.join_timeout,
        }
    }

    pub(crate) fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub(crate) fn status_tracker(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    pub(crate) fn logs(&self) -> &Arc<LogBuffer> {
        &self.logs
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn is_running(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn status(&self) -> ServiceStatus {
        self.status.current()
    }

    // ------------------------------------------------------------------------
    // start
    // ------------------------------------------------------------------------

    /// Starts the engine worker unless one is already starting or running.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::EngineUnavailable`] if the engine never loaded
    /// - [`ServiceError::ResourceUnavailable`] if the notification or media
    ///   session could not be acquired
    /// - [`ServiceError::EngineBusy`] if the previous run was asked to shut
    ///   down and has not returned yet
    /// - [`ServiceError::WorkerSpawn`] if the worker thread could not be created
    ///
    /// No status is committed or broadcast on any of these.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let mut state = self.lifecycle.lock();
        let previous = self.start_locked(&mut state);
        drop(state);

        let previous = previous?;
        if let Some(thread) = previous {
            join_worker(thread);
        }
        Ok(())
    }

    /// Returns the thread of a finished worker that was reaped to make room.
    fn start_locked(self: &Arc<Self>, state: &mut Lifecycle) -> Result<Option<JoinHandle<()>>> {
        let pending = state
            .worker
            .as_ref()
            .filter(|worker| !worker.exited)
            .map(|worker| (worker.generation, worker.started, worker.shutdown_requested));

        if let Some((generation, started, shutdown_requested)) = pending {
            if shutdown_requested {
                warn!(generation, "Cannot start, previous engine run has not returned");
                return Err(ServiceError::EngineBusy);
            }
            if state.abort && !started {
                self.withdraw_cancellation(state, generation)?;
            } else {
                debug!(generation, "Start ignored, worker already active");
            }
            return Ok(None);
        }

        // A worker that ended on its own still holds its lease.
        let previous = if state.worker.is_some() {
            debug!("Reaping finished worker before restart");
            state.reap()
        } else {
            None
        };

        let engine = self.loader.engine().ok_or_else(|| {
            let reason = self.loader.unavailable_reason();
            error!(reason = %reason, "Cannot start, audio engine unavailable");
            ServiceError::EngineUnavailable(reason)
        })?;

        let lease = state.foreground.open().map_err(|err| {
            error!(error = %err, "Cannot start, foreground presence refused");
            err
        })?;

        let generation = state.generation + 1;
        let supervisor = Arc::clone(self);
        let worker_engine = Arc::clone(&engine);
        let spawned = thread::Builder::new()
            .name(format!("engine-worker-{}", generation))
            .spawn(move || supervisor.run_worker(generation, worker_engine));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                error!(error = %err, "Failed to spawn engine worker");
                state.foreground.close(lease);
                return Err(ServiceError::WorkerSpawn(err.to_string()));
            }
        };

        state.generation = generation;
        state.abort = false;
        state.lease = Some(lease);
        state.worker = Some(Worker {
            generation,
            engine,
            thread: Some(thread),
            started: false,
            exited: false,
            shutdown_requested: false,
        });
        self.alive.store(true, Ordering::Release);
        info!(generation, "Engine worker spawned");

        self.apply_wake_request(state);
        Ok(previous)
    }

    /// Revives a worker whose start was cancelled before it reached the
    /// engine. The cancelling stop already released its lease.
    fn withdraw_cancellation(&self, state: &mut Lifecycle, generation: u64) -> Result<()> {
        let lease = state.foreground.open().map_err(|err| {
            error!(error = %err, "Cannot start, foreground presence refused");
            err
        })?;

        debug!(generation, "Pending cancellation withdrawn");
        state.lease = Some(lease);
        state.abort = false;
        self.alive.store(true, Ordering::Release);
        self.apply_wake_request(state);
        Ok(())
    }

    fn apply_wake_request(&self, state: &mut Lifecycle) {
        if !state.wake_requested {
            return;
        }
        if let Err(err) = state.wake_guard.enable() {
            warn!(error = %err, "Wake guard could not be acquired");
        }
    }

    // ------------------------------------------------------------------------
    // worker
    // ------------------------------------------------------------------------

    fn run_worker(self: Arc<Self>, generation: u64, engine: Arc<dyn AudioEngine>) {
        {
            let mut state = self.lifecycle.lock();
            if !state.is_current(generation) {
                debug!(generation, "Stale worker exiting");
                return;
            }

            if state.abort {
                info!(generation, "Start cancelled before engine entry");
                self.finish(&mut state, generation, ServiceStatus::Stopped);
                // Nobody joins a cancelled worker; it drops its own record.
                drop(state.reap());
                return;
            }

            if let Some(worker) = state.worker.as_mut() {
                worker.started = true;
            }
            self.commit(&mut state, ServiceStatus::Started);
        }

        let sink: Arc<dyn EngineLogSink> = Arc::clone(&self.logs) as Arc<dyn EngineLogSink>;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.run(sink)));

        let status = match outcome {
            Ok(Ok(())) => ServiceStatus::Stopped,
            Ok(Err(failure)) => {
                warn!(generation, error = %failure, "Audio engine failed");
                ServiceStatus::Error(failure.message)
            }
            Err(payload) => {
                let message = format!("engine panicked: {}", panic_message(payload.as_ref()));
                error!(generation, "{}", message);
                ServiceStatus::Error(message)
            }
        };

        let mut state = self.lifecycle.lock();
        self.finish(&mut state, generation, status);
    }

    /// Commits the worker's terminal status. Ignored for a worker that is no
    /// longer the current one.
    fn finish(&self, state: &mut Lifecycle, generation: u64, status: ServiceStatus) {
        if !state.is_current(generation) {
            debug!(generation, status = %status, "Ignoring exit of detached worker");
            return;
        }

        if let Some(worker) = state.worker.as_mut() {
            worker.exited = true;
        }
        state.wake_guard.disable();
        self.alive.store(false, Ordering::Release);
        self.commit(state, status);
        self.worker_exit.notify_all();
    }

    fn commit(&self, _state: &mut Lifecycle, status: ServiceStatus) {
        info!(status = %status, "Service status changed");
        self.status.publish(&status);
        let _ = self.events.emit(CoreEvent::Service(status.clone()));
        self.listeners.broadcast(&status);
    }

    // ------------------------------------------------------------------------
    // stop
    // ------------------------------------------------------------------------

    /// Stops the worker and releases every foreground resource.
    ///
    /// Before the engine is entered this latches a cancellation, releases the
    /// lease and returns. Once the engine runs, it requests shutdown and
    /// blocks until the worker exits or the join timeout elapses.
    pub(crate) fn stop(&self) {
        let mut state = self.lifecycle.lock();
        let plan = self.begin_stop(&mut state);

        let generation = match plan {
            StopPlan::Done(thread) => {
                drop(state);
                if let Some(thread) = thread {
                    join_worker(thread);
                }
                return;
            }
            StopPlan::Join { generation } => generation,
        };

        match self.wait_for_exit(&mut state, generation) {
            WaitOutcome::Gone => {}
            WaitOutcome::Exited => {
                let thread = state.reap();
                drop(state);
                if let Some(thread) = thread {
                    join_worker(thread);
                }
            }
            WaitOutcome::TimedOut => {
                error!(
                    generation,
                    timeout_ms = self.join_timeout.map(|t| t.as_millis() as u64),
                    "Engine worker did not exit in time, releasing its resources"
                );
                // The record stays so the late exit is still committed and
                // reaped, and no second run can start before it.
                state.release_lease();
                self.alive.store(false, Ordering::Release);
            }
        }
    }

    fn begin_stop(&self, state: &mut Lifecycle) -> StopPlan {
        state.wake_guard.disable();

        let Some(worker) = state.worker.as_mut() else {
            state.release_lease();
            debug!("Stop ignored, no worker");
            return StopPlan::Done(None);
        };

        if worker.exited {
            debug!(generation = worker.generation, "Reaping finished worker");
            return StopPlan::Done(state.reap());
        }

        if !worker.started {
            debug!(generation = worker.generation, "Cancelling pending start");
            state.abort = true;
            state.release_lease();
            self.alive.store(false, Ordering::Release);
            return StopPlan::Done(None);
        }

        if !worker.shutdown_requested {
            worker.shutdown_requested = true;
            info!(generation = worker.generation, "Requesting engine shutdown");
            worker.engine.shutdown();
        }
        StopPlan::Join {
            generation: worker.generation,
        }
    }

    fn wait_for_exit(
        &self,
        state: &mut parking_lot::MutexGuard<'_, Lifecycle>,
        generation: u64,
    ) -> WaitOutcome {
        let deadline = self.join_timeout.map(|timeout| Instant::now() + timeout);
        let mut timed_out = false;

        loop {
            match state.worker.as_ref() {
                Some(worker) if worker.generation == generation => {
                    if worker.exited {
                        return WaitOutcome::Exited;
                    }
                    if timed_out {
                        return WaitOutcome::TimedOut;
                    }
                }
                // Another stop already reaped this worker.
                _ => return WaitOutcome::Gone,
            }

            match deadline {
                Some(deadline) => {
                    timed_out = self.worker_exit.wait_until(state, deadline).timed_out();
                }
                None => self.worker_exit.wait(state),
            }
        }
    }

    // ------------------------------------------------------------------------
    // controls
    // ------------------------------------------------------------------------

    /// Forwards a pause to the engine while it runs. No status change.
    pub(crate) fn pause(&self) {
        let state = self.lifecycle.lock();
        match state.worker.as_ref() {
            Some(worker) if worker.started && !worker.exited => {
                debug!(generation = worker.generation, "Pausing engine");
                worker.engine.pause();
            }
            _ => debug!("Pause ignored, engine not running"),
        }
    }

    /// Records whether the wake guard should be held while the engine runs
    /// and applies it immediately.
    pub(crate) fn set_wake_guard(&self, enabled: bool) {
        let mut state = self.lifecycle.lock();
        state.wake_requested = enabled;

        if enabled && state.has_active_worker() {
            self.apply_wake_request(&mut state);
        } else if !enabled {
            state.wake_guard.disable();
        }
    }
}

fn join_worker(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        error!("Engine worker thread panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
