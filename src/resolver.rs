//! Resolution of raw configuration bytes into typed protocol configuration.
//!
//! A protocol never sees raw bytes: the dispatcher hands non-empty payloads to
//! a [`ConfigResolver`] and passes the resulting [`ProtocolConfig`] on.

use crate::common::{CoreError, CoreResult};
use crate::features::Direction;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Reasons a resolver rejects a raw configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no configuration schema registered")]
    UnknownSchema,

    #[error("{0}")]
    Rejected(String),
}

/// Type-erased configuration object produced by a resolver
#[derive(Clone)]
pub struct ProtocolConfig {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ProtocolConfig {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Like `downcast_ref`, but reports a mismatch as an `InvalidConfiguration`
    /// error so factories can use `?`.
    pub fn typed<T: Any>(&self) -> CoreResult<&T> {
        self.downcast_ref::<T>().ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "expected {}, got {}",
                std::any::type_name::<T>(),
                self.type_name
            ))
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ProtocolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolConfig")
            .field("type", &self.type_name)
            .finish()
    }
}

/// Turns raw configuration bytes for a (direction, name) pair into a typed value
pub trait ConfigResolver: Send + Sync {
    fn resolve(
        &self,
        direction: Direction,
        name: &str,
        raw: &[u8],
    ) -> Result<ProtocolConfig, ConfigError>;
}

impl<F> ConfigResolver for F
where
    F: Fn(Direction, &str, &[u8]) -> Result<ProtocolConfig, ConfigError> + Send + Sync,
{
    fn resolve(
        &self,
        direction: Direction,
        name: &str,
        raw: &[u8],
    ) -> Result<ProtocolConfig, ConfigError> {
        self(direction, name, raw)
    }
}

type Loader = fn(&[u8]) -> Result<ProtocolConfig, ConfigError>;

fn load_json<T>(raw: &[u8]) -> Result<ProtocolConfig, ConfigError>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let value: T = serde_json::from_slice(raw)?;
    Ok(ProtocolConfig::new(value))
}

/// JSON resolver with one serde schema per (direction, name).
///
/// Unknown-field policy belongs to each schema type (`deny_unknown_fields`).
#[derive(Default)]
pub struct JsonConfigResolver {
    loaders: HashMap<(Direction, String), Loader>,
}

impl JsonConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema `T` for a protocol
    pub fn register<T>(&mut self, direction: Direction, name: &str) -> CoreResult<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        match self.loaders.entry((direction, name.to_string())) {
            Entry::Occupied(_) => Err(CoreError::DuplicateName {
                direction,
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(load_json::<T>);
                tracing::debug!(
                    "Registered {} config schema {} as {}",
                    direction,
                    name,
                    std::any::type_name::<T>()
                );
                Ok(())
            }
        }
    }

    pub fn register_inbound<T>(&mut self, name: &str) -> CoreResult<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T>(Direction::Inbound, name)
    }

    pub fn register_outbound<T>(&mut self, name: &str) -> CoreResult<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T>(Direction::Outbound, name)
    }

    pub fn has_schema(&self, direction: Direction, name: &str) -> bool {
        self.loaders.contains_key(&(direction, name.to_string()))
    }
}

impl ConfigResolver for JsonConfigResolver {
    fn resolve(
        &self,
        direction: Direction,
        name: &str,
        raw: &[u8],
    ) -> Result<ProtocolConfig, ConfigError> {
        let loader = self
            .loaders
            .get(&(direction, name.to_string()))
            .ok_or(ConfigError::UnknownSchema)?;
        loader(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct VmessSettings {
        id: String,
        #[serde(default)]
        alter_id: u16,
    }

    fn resolver() -> JsonConfigResolver {
        let mut resolver = JsonConfigResolver::new();
        resolver.register_inbound::<VmessSettings>("vmess").unwrap();
        resolver
    }

    #[test]
    fn test_resolves_registered_schema() {
        let config = resolver()
            .resolve(Direction::Inbound, "vmess", br#"{"id":"a3482e88"}"#)
            .unwrap();

        assert!(config.is::<VmessSettings>());
        let settings = config.typed::<VmessSettings>().unwrap();
        assert_eq!(settings.id, "a3482e88");
        assert_eq!(settings.alter_id, 0);
    }

    #[test]
    fn test_malformed_payload() {
        let err = resolver()
            .resolve(Direction::Inbound, "vmess", br#"{"malformed":"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_unknown_fields_follow_schema_policy() {
        let err = resolver()
            .resolve(Direction::Inbound, "vmess", br#"{"id":"x","level":1}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_schema_is_keyed_by_direction() {
        let err = resolver()
            .resolve(Direction::Outbound, "vmess", br#"{"id":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema));
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let mut resolver = resolver();
        let err = resolver.register_inbound::<VmessSettings>("vmess").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateName { direction: Direction::Inbound, .. }));
        assert!(resolver.register_outbound::<VmessSettings>("vmess").is_ok());
    }

    #[test]
    fn test_typed_mismatch_is_invalid_configuration() {
        let config = ProtocolConfig::new(42u32);
        let err = config.typed::<String>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfiguration(_)));
        assert_eq!(config.type_name(), "u32");
    }

    #[test]
    fn test_closure_resolver() {
        let reject = |_: Direction, name: &str, _: &[u8]| -> Result<ProtocolConfig, ConfigError> {
            Err(ConfigError::Rejected(format!("{} is disabled", name)))
        };
        let err = reject.resolve(Direction::Outbound, "http", b"{}").unwrap_err();
        assert_eq!(err.to_string(), "http is disabled");
    }
}
