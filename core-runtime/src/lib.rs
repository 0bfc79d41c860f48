//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the engine host:
//! - Logging and tracing infrastructure
//! - Host configuration with fail-fast capability checks
//! - Event bus for lifecycle and resource events
//!
//! ## Overview
//!
//! Everything the service layer needs that is not itself lifecycle logic
//! lives here, so `core-service` can stay focused on supervision.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, ResourceEvent, ServiceStatus};
