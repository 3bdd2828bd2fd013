pub mod common;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod features;
pub mod protocols;
pub mod registry;
pub mod resolver;
pub mod space;

// Re-export commonly used types
pub use common::{CoreError, CoreResult, Runnable};
pub use crate::core::{new_with_defaults, Instance};
pub use dispatcher::Dispatcher;
pub use features::{Direction, HandlerKind, Inbound, InboundHandler, Outbound, OutboundHandler};
pub use registry::{Factory, Registry};
pub use resolver::{ConfigError, ConfigResolver, JsonConfigResolver, ProtocolConfig};
pub use space::Space;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

/// Initialize tracing
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a configured level; `RUST_LOG` still wins when set
pub fn init_tracing_with(log: &config::LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
