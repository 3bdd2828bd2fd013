use crate::features::Direction;
use crate::resolver::ConfigError;
use thiserror::Error;

/// Core error types for the proxy system
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{direction} protocol '{name}' is already registered")]
    DuplicateName { direction: Direction, name: String },

    #[error("{direction} protocol '{name}' not found")]
    ProtocolNotFound { direction: Direction, name: String },

    #[error("bad configuration for {direction} protocol '{name}': {source}")]
    BadConfiguration {
        direction: Direction,
        name: String,
        #[source]
        source: ConfigError,
    },

    #[error("registry is frozen, cannot register {direction} protocol '{name}'")]
    RegistryFrozen { direction: Direction, name: String },

    #[error("Invalid protocol name: {0:?}")]
    InvalidName(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Lifecycle hooks for handler instances.
///
/// The registry and dispatcher never call these; whoever owns the handler
/// decides when it starts and stops.
#[async_trait::async_trait]
pub trait Runnable: Send + Sync {
    /// Start the object
    async fn start(&self) -> CoreResult<()>;

    /// Stop the object and clean up resources
    async fn close(&self) -> CoreResult<()>;
}

/// Macro to implement no-op Runnable for a type
#[macro_export]
macro_rules! impl_runnable {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl $crate::common::Runnable for $type {
            async fn start(&self) -> $crate::common::CoreResult<()> {
                Ok(())
            }

            async fn close(&self) -> $crate::common::CoreResult<()> {
                Ok(())
            }
        }
    };
}
