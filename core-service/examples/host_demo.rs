//! Runs a toy engine under the desktop host for a few seconds.
//!
//! ```text
//! cargo run -p core-service --example host_demo
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bridge_traits::{AudioEngine, EngineFailure, EngineLogSink, EngineSeverity, LogLevel};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{bootstrap_desktop, ChannelListener, EngineLoader};

/// Emits a log line every 200ms until shut down.
struct TickingEngine {
    stop: AtomicBool,
}

impl AudioEngine for TickingEngine {
    fn run(&self, sink: Arc<dyn EngineLogSink>) -> Result<(), EngineFailure> {
        sink.log(EngineSeverity::Info, "engine ready");
        let mut tick = 0u32;
        while !self.stop.swap(false, Ordering::AcqRel) {
            tick += 1;
            sink.log(EngineSeverity::Debug, &format!("tick {}", tick));
            thread::sleep(Duration::from_millis(200));
        }
        sink.log(EngineSeverity::Info, "engine stopped");
        Ok(())
    }

    fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn pause(&self) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let data_dir = std::env::temp_dir().join("engine-host-demo");
    std::fs::create_dir_all(&data_dir)?;

    let loader = EngineLoader::global();
    loader.install(Arc::new(TickingEngine {
        stop: AtomicBool::new(false),
    }));

    let service = tokio::task::spawn_blocking(move || bootstrap_desktop(data_dir, loader)).await??;
    let client = service.client();

    let (listener, mut statuses) = ChannelListener::new();
    client.register(Arc::new(listener));
    tokio::spawn(async move {
        while let Some(status) = statuses.recv().await {
            println!("status: {}", status);
        }
    });

    let mut logs = service.log_buffer().subscribe();
    tokio::spawn(async move {
        while let Some(lines) = logs.changed().await {
            if let Some(last) = lines.last() {
                println!("engine: {}", last);
            }
        }
    });

    client.set_wake_guard_enabled(true);
    client.start()?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    client.pause();
    client.stop_async().await?;

    println!("retained {} log lines", service.log_buffer().len());
    Ok(())
}
