//! Shared execution context handed to every handler factory.
//!
//! The registry and dispatcher only forward a [`Space`]; what lives inside is
//! agreed between the process entry point and the protocol implementations.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct SpaceInner {
    apps: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    context: RwLock<HashMap<String, String>>,
}

/// Process-scoped context. Cloning is cheap and every clone sees the same state.
#[derive(Clone, Default)]
pub struct Space {
    inner: Arc<SpaceInner>,
}

impl Space {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an application object under its type.
    ///
    /// Returns false and leaves the existing binding alone if one is present.
    pub fn bind_app<T: Any + Send + Sync>(&self, app: Arc<T>) -> bool {
        let mut apps = self.inner.apps.write();
        if apps.contains_key(&TypeId::of::<T>()) {
            return false;
        }
        apps.insert(TypeId::of::<T>(), app);
        tracing::debug!("Bound app to space: {}", std::any::type_name::<T>());
        true
    }

    /// Get an application object by type
    pub fn app<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let app = self.inner.apps.read().get(&TypeId::of::<T>()).cloned()?;
        app.downcast::<T>().ok()
    }

    pub fn has_app<T: Any + Send + Sync>(&self) -> bool {
        self.inner.apps.read().contains_key(&TypeId::of::<T>())
    }

    /// Set context value
    pub fn set_context(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.context.write().insert(key.into(), value.into());
    }

    /// Get context value
    pub fn get_context(&self, key: &str) -> Option<String> {
        self.inner.context.read().get(key).cloned()
    }

    /// Whether two handles refer to the same space
    pub fn same_as(&self, other: &Space) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Space")
            .field("apps", &self.inner.apps.read().len())
            .field("context", &self.inner.context.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dns {
        server: String,
    }

    #[test]
    fn test_bind_and_get_app() {
        let space = Space::new();
        assert!(!space.has_app::<Dns>());

        assert!(space.bind_app(Arc::new(Dns { server: "1.1.1.1".to_string() })));
        assert!(!space.bind_app(Arc::new(Dns { server: "8.8.8.8".to_string() })));

        let dns = space.app::<Dns>().unwrap();
        assert_eq!(dns.server, "1.1.1.1");
        assert!(space.app::<String>().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let space = Space::new();
        let clone = space.clone();
        clone.set_context("node", "edge-1");

        assert_eq!(space.get_context("node").as_deref(), Some("edge-1"));
        assert!(space.same_as(&clone));
        assert!(!space.same_as(&Space::new()));
    }
}
