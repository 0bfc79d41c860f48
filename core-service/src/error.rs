use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The platform refused a foreground resource; no worker was created.
    #[error("Foreground resource unavailable ({resource}): {source}")]
    ResourceUnavailable {
        resource: &'static str,
        #[source]
        source: BridgeError,
    },

    #[error("Audio engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A previous engine run was asked to shut down and has not returned.
    #[error("Audio engine is still shutting down")]
    EngineBusy,

    #[error("Failed to spawn engine worker: {0}")]
    WorkerSpawn(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
