//! Protocols shipped with the core.
//!
//! Each protocol registers its factory together with its configuration
//! schema, the same way an external protocol crate would.

pub mod blackhole;
pub mod direct;

use crate::common::CoreResult;
use crate::registry::Registry;
use crate::resolver::JsonConfigResolver;

// Re-export commonly used types
pub use blackhole::{create_blackhole_outbound, BlackholeConfig, BlackholeResponse};
pub use direct::{create_direct_inbound, create_freedom_outbound, DirectConfig, FreedomConfig};

/// Register every built-in protocol
pub fn register_builtin(registry: &Registry, resolver: &mut JsonConfigResolver) -> CoreResult<()> {
    registry.register_inbound("direct", create_direct_inbound)?;
    resolver.register_inbound::<DirectConfig>("direct")?;

    registry.register_outbound("freedom", create_freedom_outbound)?;
    resolver.register_outbound::<FreedomConfig>("freedom")?;

    registry.register_outbound("blackhole", create_blackhole_outbound)?;
    resolver.register_outbound::<BlackholeConfig>("blackhole")?;

    Ok(())
}
