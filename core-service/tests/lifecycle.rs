mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{assert_quiet, eventually, next_status, Behavior, Harness, HarnessOptions};
use bridge_traits::WakeLock;
use core_runtime::events::{CoreEvent, ResourceEvent, ServiceStatus};
use core_service::{ChannelListener, ServiceError};

#[tokio::test(flavor = "multi_thread")]
async fn test_start_twice_runs_engine_once() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);

    harness.client.start().unwrap();
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    harness.client.start().unwrap();

    assert!(eventually(|| harness.engine.runs() == 1).await);
    assert_quiet(&mut statuses).await;
    assert_eq!(harness.journal.count("notification.post"), 1);

    harness.client.stop_async().await.unwrap();
    assert_eq!(harness.engine.runs(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_mid_run_shuts_engine_down_once() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);

    harness.client.set_wake_guard_enabled(true);
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert!(harness.client.is_running());
    assert!(harness.wake_lock.is_held());
    assert!(eventually(|| harness.engine.runs() == 1).await);

    let client = harness.client.clone();
    thread::spawn(move || client.stop()).join().unwrap();

    assert_eq!(harness.engine.shutdowns(), 1);
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);
    assert_quiet(&mut statuses).await;

    assert!(!harness.client.is_running());
    assert!(!harness.wake_lock.is_held());
    assert_eq!(harness.client.status(), ServiceStatus::Stopped);
    assert_eq!(harness.journal.count("notification.cancel"), 1);
    assert_eq!(harness.journal.count("session.close"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resource_sequencing() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.set_wake_guard_enabled(true);
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert!(eventually(|| harness.engine.runs() == 1).await);
    harness.client.stop_async().await.unwrap();

    let journal = &harness.journal;
    let at = |entry: &str| {
        journal
            .position(entry)
            .unwrap_or_else(|| panic!("{} missing from {:?}", entry, journal.entries()))
    };

    // Foreground presence exists before the wake guard and before the engine.
    assert!(at("notification.channel") < at("notification.post"));
    assert!(at("notification.post") < at("session.open"));
    assert!(at("session.open") < at("wake.acquire"));
    assert!(at("session.open") < at("engine.run.enter"));

    // The wake guard is dropped before the engine is even asked to stop.
    assert!(at("wake.release") < at("engine.shutdown"));
    assert!(at("engine.shutdown") < at("engine.run.exit"));
    assert!(at("engine.run.exit") < at("session.close"));
    assert!(at("session.close") < at("notification.cancel"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_stops_shut_down_once() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert!(eventually(|| harness.engine.runs() == 1).await);

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let client = harness.client.clone();
            thread::spawn(move || client.stop())
        })
        .collect();
    for stopper in stoppers {
        stopper.join().unwrap();
    }

    assert_eq!(harness.engine.shutdowns(), 1);
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);
    assert_quiet(&mut statuses).await;
    assert_eq!(harness.journal.count("notification.cancel"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_when_stopped_is_noop() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.stop_async().await.unwrap();
    harness.client.stop_async().await.unwrap();

    assert_quiet(&mut statuses).await;
    assert_eq!(harness.engine.shutdowns(), 0);
    assert!(harness.journal.entries().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_right_after_start_ends_stopped() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.start().unwrap();
    harness.client.stop_async().await.unwrap();

    // Whether the start was cancelled before entry or the engine was entered
    // and shut down, nothing is held once stop returns.
    assert!(!harness.client.is_running());
    assert_eq!(harness.journal.count("notification.post"), 1);
    assert_eq!(harness.journal.count("notification.cancel"), 1);
    assert_eq!(harness.journal.count("session.close"), 1);

    let mut last = next_status(&mut statuses).await;
    while let Ok(Some(status)) =
        tokio::time::timeout(Duration::from_millis(100), statuses.recv()).await
    {
        last = status;
    }
    assert_eq!(last, ServiceStatus::Stopped);
    assert_eq!(harness.engine.runs(), harness.engine.shutdowns());

    harness.client.stop_async().await.unwrap();
    assert_eq!(harness.journal.count("notification.cancel"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_waits_for_slow_engine_after_join_timeout() {
    let harness = Harness::with_options(HarnessOptions {
        behavior: Behavior::SlowExit(Duration::from_millis(300)),
        join_timeout: Some(Duration::from_millis(50)),
        ..HarnessOptions::default()
    })
    .await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);

    harness.client.stop_async().await.unwrap();

    // The timed-out stop releases resources without a transition.
    assert!(!harness.client.is_running());
    assert_eq!(harness.journal.count("notification.cancel"), 1);
    assert_eq!(harness.client.status(), ServiceStatus::Started);
    assert!(matches!(harness.client.start(), Err(ServiceError::EngineBusy)));
    assert_eq!(harness.journal.count("notification.post"), 1);

    // The lingering run reports its own exit.
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);

    harness.engine.set_behavior(Behavior::RunUntilShutdown);
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    harness.client.stop_async().await.unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);

    assert_eq!(harness.engine.runs(), 2);
    assert_eq!(harness.engine.max_concurrent_runs(), 1);
    assert_eq!(harness.journal.count("notification.cancel"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_failure_then_restart() {
    let harness = Harness::with_behavior(Behavior::Fail("no output device".into())).await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert_eq!(
        next_status(&mut statuses).await,
        ServiceStatus::Error("no output device".into())
    );
    assert!(eventually(|| !harness.client.is_running()).await);

    let snapshot = harness.client.status_snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.message, "no output device");
    assert!(harness
        .service
        .log_buffer()
        .snapshot()
        .contains(&"E/no output device".to_string()));

    // Not retried on its own.
    assert_quiet(&mut statuses).await;
    assert_eq!(harness.engine.runs(), 1);

    harness.engine.set_behavior(Behavior::RunUntilShutdown);
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert_eq!(harness.client.status_snapshot().message, "service started");
    // The failed run's lease was released before the new one was posted.
    assert_eq!(harness.journal.count("notification.cancel"), 1);
    assert_eq!(harness.journal.count("notification.post"), 2);

    assert!(eventually(|| harness.engine.runs() == 2).await);
    harness.client.stop_async().await.unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_panic_is_reported_as_error() {
    let harness = Harness::with_behavior(Behavior::Panic("decoder exploded".into())).await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert_eq!(
        next_status(&mut statuses).await,
        ServiceStatus::Error("engine panicked: decoder exploded".into())
    );
    assert!(eventually(|| !harness.client.is_running()).await);

    harness.client.stop_async().await.unwrap();
    assert_quiet(&mut statuses).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pause_only_reaches_running_engine() {
    let harness = Harness::new().await;
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.pause();
    assert_eq!(harness.engine.pauses(), 0);

    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    harness.client.pause();
    assert_eq!(harness.engine.pauses(), 1);
    assert_quiet(&mut statuses).await;

    harness.client.stop_async().await.unwrap();
    harness.client.pause();
    assert_eq!(harness.engine.pauses(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_notification_refusal_leaves_state_untouched() {
    let harness = Harness::new().await;
    harness.poster.deny(true);
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.set_wake_guard_enabled(true);
    let err = harness.client.start().unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ResourceUnavailable {
            resource: "notification",
            ..
        }
    ));

    assert!(!harness.client.is_running());
    assert_eq!(harness.client.status(), ServiceStatus::Stopped);
    assert_quiet(&mut statuses).await;
    assert_eq!(harness.engine.runs(), 0);
    assert_eq!(harness.journal.count("wake.acquire"), 0);

    // The next attempt succeeds once the platform allows it.
    harness.poster.deny(false);
    harness.client.start().unwrap();
    assert_eq!(next_status(&mut statuses).await, ServiceStatus::Started);
    assert!(harness.wake_lock.is_held());
    harness.client.stop_async().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unloaded_engine_is_reported() {
    let harness = Harness::with_options(HarnessOptions {
        load_engine: false,
        ..HarnessOptions::default()
    })
    .await;

    let err = harness.client.start().unwrap_err();
    assert!(matches!(err, ServiceError::EngineUnavailable(_)));
    assert!(!harness.client.is_running());
    assert!(harness.journal.entries().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_logs_reach_buffer_and_events_flow() {
    let harness = Harness::new().await;
    let mut events = harness.service.events().subscribe();
    let (listener, mut statuses) = ChannelListener::new();
    harness.client.register(Arc::new(listener));
    next_status(&mut statuses).await;

    harness.client.set_wake_guard_enabled(true);
    harness.client.start().unwrap();
    next_status(&mut statuses).await;
    let logs = harness.service.log_buffer();
    assert!(eventually(|| logs.snapshot() == vec!["I/engine ready".to_string()]).await);

    harness.client.stop_async().await.unwrap();
    next_status(&mut statuses).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        seen.first(),
        Some(CoreEvent::Resource(ResourceEvent::ForegroundOpened { .. }))
    ));
    assert!(seen.contains(&CoreEvent::Service(ServiceStatus::Started)));
    assert!(seen.contains(&CoreEvent::Resource(ResourceEvent::WakeGuardReleased)));
    assert_eq!(
        seen.last(),
        Some(&CoreEvent::Resource(ResourceEvent::ForegroundClosed))
    );
}
