//! Engine Boundary
//!
//! The contract between the host and the opaque native audio engine it
//! supervises. The engine is blocking, single-instance and not re-entrant:
//! the host calls [`AudioEngine::run`] from exactly one dedicated thread and
//! signals it from other threads through [`AudioEngine::shutdown`] and
//! [`AudioEngine::pause`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity attached to a line emitted by the engine's log callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineSeverity {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    /// A priority the host does not recognise. Kept so the line is not lost.
    Other(i32),
}

impl EngineSeverity {
    /// Maps a numeric host log priority (2 = verbose .. 6 = error).
    pub fn from_priority(priority: i32) -> Self {
        match priority {
            2 => EngineSeverity::Verbose,
            3 => EngineSeverity::Debug,
            4 => EngineSeverity::Info,
            5 => EngineSeverity::Warn,
            6 => EngineSeverity::Error,
            other => EngineSeverity::Other(other),
        }
    }

    /// Single-character code used when formatting buffered log lines.
    ///
    /// Unrecognised severities map to an empty code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineSeverity::Debug => "D",
            EngineSeverity::Error => "E",
            EngineSeverity::Info => "I",
            EngineSeverity::Verbose => "V",
            EngineSeverity::Warn => "W",
            EngineSeverity::Other(_) => "",
        }
    }
}

impl fmt::Display for EngineSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSeverity::Other(priority) => write!(f, "priority({})", priority),
            known => f.write_str(known.code()),
        }
    }
}

/// Failure reported by [`AudioEngine::run`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receiver for the engine's asynchronous log callback.
///
/// Called from inside `run` at arbitrary times, possibly concurrently with
/// lifecycle transitions on other threads. Implementations must not block.
pub trait EngineLogSink: Send + Sync {
    fn log(&self, severity: EngineSeverity, message: &str);

    /// Convenience entry point for engines that report raw numeric priorities.
    fn log_priority(&self, priority: i32, message: &str) {
        self.log(EngineSeverity::from_priority(priority), message);
    }
}

/// Opaque native audio engine.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::engine::{AudioEngine, EngineFailure, EngineLogSink};
///
/// fn drive(engine: &dyn AudioEngine, sink: Arc<dyn EngineLogSink>) {
///     match engine.run(sink) {
///         Ok(()) => println!("engine exited"),
///         Err(EngineFailure { message }) => eprintln!("engine failed: {message}"),
///     }
/// }
/// ```
pub trait AudioEngine: Send + Sync {
    /// Blocks for the engine's entire active lifetime.
    fn run(&self, sink: Arc<dyn EngineLogSink>) -> Result<(), EngineFailure>;

    /// Asks a running `run` call to return. Must not block.
    fn shutdown(&self);

    /// Pauses playback. Only meaningful while `run` is active.
    fn pause(&self);
}
