//! Turns (direction, name, raw configuration) requests into handler instances.

use crate::common::{CoreError, CoreResult};
use crate::features::{inbound, outbound, HandlerKind, Inbound, Outbound};
use crate::registry::Registry;
use crate::resolver::ConfigResolver;
use crate::space::Space;
use std::sync::Arc;

/// Creates handlers from registered factories.
///
/// Holds no per-call state, so any number of `create` calls may run
/// concurrently; they only share the registry's read path.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    resolver: Arc<dyn ConfigResolver>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, resolver: Arc<dyn ConfigResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Create a handler for protocol `name` in direction `K`.
    ///
    /// An empty `raw_config` means protocol defaults: the factory gets `None`
    /// and the resolver is not consulted. Otherwise the payload is resolved
    /// first; a resolver failure becomes `BadConfiguration` and the factory is
    /// never called. Errors returned by the factory are passed through as is.
    pub fn create<K: HandlerKind>(
        &self,
        name: &str,
        space: &Space,
        raw_config: &[u8],
    ) -> CoreResult<Arc<K::Handler>> {
        let factory = self.registry.lookup::<K>(name)?;

        let config = if raw_config.is_empty() {
            None
        } else {
            let resolved = self
                .resolver
                .resolve(K::DIRECTION, name, raw_config)
                .map_err(|source| {
                    tracing::warn!("Rejected {} configuration for {}: {}", K::DIRECTION, name, source);
                    CoreError::BadConfiguration {
                        direction: K::DIRECTION,
                        name: name.to_string(),
                        source,
                    }
                })?;
            Some(resolved)
        };

        tracing::debug!(
            "Creating {} handler {} ({})",
            K::DIRECTION,
            name,
            config.as_ref().map(|c| c.type_name()).unwrap_or("defaults")
        );
        factory.create(space, config)
    }

    pub fn create_inbound(
        &self,
        name: &str,
        space: &Space,
        raw_config: &[u8],
    ) -> CoreResult<Arc<dyn inbound::Handler>> {
        self.create::<Inbound>(name, space, raw_config)
    }

    pub fn create_outbound(
        &self,
        name: &str,
        space: &Space,
        raw_config: &[u8],
    ) -> CoreResult<Arc<dyn outbound::Handler>> {
        self.create::<Outbound>(name, space, raw_config)
    }
}
