//! Name to factory registry for inbound and outbound protocols.
//!
//! The registry has two phases. While open, protocol implementations register
//! their factories (reads are served under a lock). [`Registry::freeze`] moves
//! it to the frozen phase: registration is rejected from then on and lookups
//! read an immutable map without locking.

use crate::common::{CoreError, CoreResult};
use crate::features::{inbound, outbound, Direction, HandlerKind, Inbound, Outbound};
use crate::resolver::ProtocolConfig;
use crate::space::Space;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Builds handler instances for one protocol and direction
pub trait Factory<H: ?Sized>: Send + Sync {
    /// `config` is `None` when the caller supplied no configuration; the
    /// protocol applies its own defaults then.
    fn create(&self, space: &Space, config: Option<ProtocolConfig>) -> CoreResult<Arc<H>>;
}

impl<H, F> Factory<H> for F
where
    H: ?Sized,
    F: Fn(&Space, Option<ProtocolConfig>) -> CoreResult<Arc<H>> + Send + Sync,
{
    fn create(&self, space: &Space, config: Option<ProtocolConfig>) -> CoreResult<Arc<H>> {
        self(space, config)
    }
}

type FactoryMap<H> = HashMap<String, Arc<dyn Factory<H>>>;

/// Factories of a single direction
pub struct FactoryTable<H: ?Sized + 'static> {
    direction: Direction,
    open: RwLock<Option<FactoryMap<H>>>,
    frozen: OnceCell<FactoryMap<H>>,
}

impl<H: ?Sized + 'static> FactoryTable<H> {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            open: RwLock::new(Some(HashMap::new())),
            frozen: OnceCell::new(),
        }
    }

    fn register(&self, name: &str, factory: Arc<dyn Factory<H>>) -> CoreResult<()> {
        if name.trim().is_empty() {
            return Err(CoreError::InvalidName(name.to_string()));
        }

        let mut open = self.open.write();
        let Some(map) = open.as_mut() else {
            return Err(CoreError::RegistryFrozen {
                direction: self.direction,
                name: name.to_string(),
            });
        };

        match map.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CoreError::DuplicateName {
                direction: self.direction,
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(factory);
                Ok(())
            }
        }
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Factory<H>>> {
        if let Some(map) = self.frozen.get() {
            return map.get(name).cloned();
        }

        let open = self.open.read();
        match open.as_ref() {
            Some(map) => map.get(name).cloned(),
            // frozen between the two checks; the cell is set before the lock is released
            None => self.frozen.get().and_then(|map| map.get(name).cloned()),
        }
    }

    fn lookup(&self, name: &str) -> CoreResult<Arc<dyn Factory<H>>> {
        self.get(name).ok_or_else(|| CoreError::ProtocolNotFound {
            direction: self.direction,
            name: name.to_string(),
        })
    }

    fn freeze(&self) {
        let mut open = self.open.write();
        if let Some(map) = open.take() {
            // only reachable once, the open map is gone afterwards
            let _ = self.frozen.set(map);
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.frozen.get() {
            Some(map) => map.keys().cloned().collect(),
            None => {
                let open = self.open.read();
                match open.as_ref() {
                    Some(map) => map.keys().cloned().collect(),
                    None => self
                        .frozen
                        .get()
                        .map(|map| map.keys().cloned().collect())
                        .unwrap_or_default(),
                }
            }
        };
        names.sort();
        names
    }
}

/// Registry of inbound and outbound handler factories.
///
/// Constructed once by the process entry point and shared (usually through an
/// `Arc`) with whatever registers protocols and whatever dispatches them.
pub struct Registry {
    inbound: FactoryTable<dyn inbound::Handler>,
    outbound: FactoryTable<dyn outbound::Handler>,
    frozen: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inbound: FactoryTable::new(Direction::Inbound),
            outbound: FactoryTable::new(Direction::Outbound),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn inbound_table(&self) -> &FactoryTable<dyn inbound::Handler> {
        &self.inbound
    }

    pub fn outbound_table(&self) -> &FactoryTable<dyn outbound::Handler> {
        &self.outbound
    }

    /// Register a factory under `name` for direction `K`.
    ///
    /// Fails with `DuplicateName` if the name is taken (the existing factory
    /// stays), `InvalidName` for an empty name and `RegistryFrozen` after
    /// [`Registry::freeze`].
    pub fn register<K, F>(&self, name: &str, factory: F) -> CoreResult<()>
    where
        K: HandlerKind,
        F: Factory<K::Handler> + 'static,
    {
        let result = if self.is_frozen() {
            Err(CoreError::RegistryFrozen {
                direction: K::DIRECTION,
                name: name.to_string(),
            })
        } else {
            K::table(self).register(name, Arc::new(factory))
        };
        match &result {
            Ok(()) => tracing::info!("Registered {} protocol: {}", K::DIRECTION, name),
            Err(e) => tracing::warn!("Failed to register {} protocol {}: {}", K::DIRECTION, name, e),
        }
        result
    }

    pub fn register_inbound<F>(&self, name: &str, factory: F) -> CoreResult<()>
    where
        F: Factory<dyn inbound::Handler> + 'static,
    {
        self.register::<Inbound, F>(name, factory)
    }

    pub fn register_outbound<F>(&self, name: &str, factory: F) -> CoreResult<()>
    where
        F: Factory<dyn outbound::Handler> + 'static,
    {
        self.register::<Outbound, F>(name, factory)
    }

    /// Look up the factory for `name`; pure read
    pub fn lookup<K: HandlerKind>(&self, name: &str) -> CoreResult<Arc<dyn Factory<K::Handler>>> {
        K::table(self).lookup(name)
    }

    pub fn contains(&self, direction: Direction, name: &str) -> bool {
        match direction {
            Direction::Inbound => self.inbound.get(name).is_some(),
            Direction::Outbound => self.outbound.get(name).is_some(),
        }
    }

    /// Close registration for both directions at once. Idempotent.
    ///
    /// The registry counts as frozen from the moment this is called; a
    /// registration already holding a table lock may still land and is then
    /// part of the frozen map.
    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inbound.freeze();
        self.outbound.freeze();
        tracing::info!(
            "Protocol registry frozen with {} inbound and {} outbound protocols",
            self.inbound.names().len(),
            self.outbound.names().len()
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Registered protocol names for a direction, sorted
    pub fn protocols(&self, direction: Direction) -> Vec<String> {
        match direction {
            Direction::Inbound => self.inbound.names(),
            Direction::Outbound => self.outbound.names(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::inbound::InboundContext;
    use crate::features::InboundHandler;
    use tokio::net::TcpStream;

    struct NamedInbound(&'static str);

    crate::impl_runnable!(NamedInbound);

    #[async_trait::async_trait]
    impl InboundHandler for NamedInbound {
        fn protocol(&self) -> &str {
            self.0
        }

        async fn handle_connection(&self, _stream: TcpStream, _context: InboundContext) -> CoreResult<()> {
            Ok(())
        }
    }

    fn first(_: &Space, _: Option<ProtocolConfig>) -> CoreResult<Arc<dyn InboundHandler>> {
        Ok(Arc::new(NamedInbound("first")))
    }

    fn second(_: &Space, _: Option<ProtocolConfig>) -> CoreResult<Arc<dyn InboundHandler>> {
        Ok(Arc::new(NamedInbound("second")))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry.register_inbound("socks", first).unwrap();

        let factory = registry.lookup::<Inbound>("socks").unwrap();
        let handler = factory.create(&Space::new(), None).unwrap();
        assert_eq!(handler.protocol(), "first");
        assert!(registry.contains(Direction::Inbound, "socks"));
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let registry = Registry::new();
        registry.register_inbound("socks", first).unwrap();

        let err = registry.register_inbound("socks", second).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateName { direction: Direction::Inbound, ref name } if name == "socks"
        ));

        let handler = registry
            .lookup::<Inbound>("socks")
            .unwrap()
            .create(&Space::new(), None)
            .unwrap();
        assert_eq!(handler.protocol(), "first");
    }

    #[test]
    fn test_lookup_missing() {
        let registry = Registry::new();
        let err = registry.lookup::<Outbound>("http").err().unwrap();
        assert!(matches!(
            err,
            CoreError::ProtocolNotFound { direction: Direction::Outbound, .. }
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = Registry::new();
        assert!(matches!(
            registry.register_inbound("", first),
            Err(CoreError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register_inbound("  ", first),
            Err(CoreError::InvalidName(_))
        ));
        assert!(registry.protocols(Direction::Inbound).is_empty());
    }

    #[test]
    fn test_freeze_rejects_registration() {
        let registry = Registry::new();
        registry.register_inbound("socks", first).unwrap();
        registry.freeze();
        registry.freeze();

        assert!(registry.is_frozen());
        assert!(matches!(
            registry.register_inbound("http", second),
            Err(CoreError::RegistryFrozen { direction: Direction::Inbound, .. })
        ));
        assert!(registry.lookup::<Inbound>("socks").is_ok());
        assert!(registry.lookup::<Inbound>("http").is_err());
    }

    #[test]
    fn test_protocols_sorted() {
        let registry = Registry::new();
        registry.register_inbound("vmess", first).unwrap();
        registry.register_inbound("http", first).unwrap();
        registry.register_inbound("socks", first).unwrap();

        assert_eq!(registry.protocols(Direction::Inbound), vec!["http", "socks", "vmess"]);
        assert!(registry.protocols(Direction::Outbound).is_empty());

        registry.freeze();
        assert_eq!(registry.protocols(Direction::Inbound).len(), 3);
    }

    #[test]
    fn test_freeze_covers_both_directions_under_concurrent_registration() {
        let registry = Arc::new(Registry::new());

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| {
                            let name = format!("in-{}-{}", worker, i);
                            let result = registry.register_inbound(&name, first);
                            (name, result)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        registry.freeze();
        assert!(registry.is_frozen());

        for worker in workers {
            for (name, result) in worker.join().unwrap() {
                match result {
                    Ok(()) => assert!(registry.lookup::<Inbound>(&name).is_ok()),
                    Err(e) => {
                        assert!(matches!(e, CoreError::RegistryFrozen { .. }));
                        assert!(registry.lookup::<Inbound>(&name).is_err());
                    }
                }
            }
        }

        assert!(matches!(
            registry.register_outbound("blackhole", crate::protocols::create_blackhole_outbound),
            Err(CoreError::RegistryFrozen { direction: Direction::Outbound, .. })
        ));
        assert!(matches!(
            registry.register_inbound("late", first),
            Err(CoreError::RegistryFrozen { direction: Direction::Inbound, .. })
        ));
    }
}
