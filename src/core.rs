use crate::common::CoreResult;
use crate::config::{Config, HandlerConfig};
use crate::dispatcher::Dispatcher;
use crate::features::{inbound, outbound, Direction};
use crate::protocols;
use crate::registry::Registry;
use crate::resolver::{ConfigResolver, JsonConfigResolver};
use crate::space::Space;
use std::sync::Arc;

/// Core instance: one space plus a dispatcher over a frozen registry
#[derive(Clone)]
pub struct Instance {
    space: Space,
    dispatcher: Dispatcher,
}

/// Outcome of creating one manifest entry
#[derive(Debug)]
pub struct CheckReport {
    pub direction: Direction,
    pub tag: String,
    pub protocol: String,
    pub result: Result<(), String>,
}

impl Instance {
    /// Create an instance over an already populated registry.
    ///
    /// The registry is frozen here if it is not already.
    pub fn new(space: Space, registry: Arc<Registry>, resolver: Arc<dyn ConfigResolver>) -> Self {
        registry.freeze();
        Self {
            space,
            dispatcher: Dispatcher::new(registry, resolver),
        }
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    pub fn create_inbound(&self, name: &str, raw_config: &[u8]) -> CoreResult<Arc<dyn inbound::Handler>> {
        self.dispatcher.create_inbound(name, &self.space, raw_config)
    }

    pub fn create_outbound(&self, name: &str, raw_config: &[u8]) -> CoreResult<Arc<dyn outbound::Handler>> {
        self.dispatcher.create_outbound(name, &self.space, raw_config)
    }

    /// Create every handler a manifest lists, collecting one report per entry
    pub fn check(&self, config: &Config) -> Vec<CheckReport> {
        let mut reports = Vec::new();
        for (index, handler) in config.inbounds.iter().enumerate() {
            let result = handler
                .raw_settings()
                .and_then(|raw| self.create_inbound(&handler.protocol, &raw).map(|_| ()));
            reports.push(report(Direction::Inbound, index, handler, result));
        }
        for (index, handler) in config.outbounds.iter().enumerate() {
            let result = handler
                .raw_settings()
                .and_then(|raw| self.create_outbound(&handler.protocol, &raw).map(|_| ()));
            reports.push(report(Direction::Outbound, index, handler, result));
        }
        reports
    }
}

fn report(direction: Direction, index: usize, handler: &HandlerConfig, result: CoreResult<()>) -> CheckReport {
    let tag = handler.tag_or(index);
    if let Err(e) = &result {
        tracing::error!("{} {} ({}) failed: {}", direction, tag, handler.protocol, e);
    }
    CheckReport {
        direction,
        tag,
        protocol: handler.protocol.clone(),
        result: result.map_err(|e| e.to_string()),
    }
}

/// Create a new instance with the built-in protocols registered
pub fn new_with_defaults() -> CoreResult<Instance> {
    let registry = Arc::new(Registry::new());
    let mut resolver = JsonConfigResolver::new();
    protocols::register_builtin(&registry, &mut resolver)?;
    Ok(Instance::new(Space::new(), registry, Arc::new(resolver)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::CoreError;

    #[test]
    fn test_new_with_defaults() {
        let instance = new_with_defaults().unwrap();
        assert!(instance.registry().is_frozen());

        let handler = instance.create_outbound("blackhole", br#"{"response":"http"}"#).unwrap();
        assert_eq!(handler.protocol(), "blackhole");
        assert_eq!(handler.settings().unwrap()["response"], "http");

        let handler = instance.create_inbound("direct", &[]).unwrap();
        assert_eq!(handler.protocol(), "direct");
    }

    #[test]
    fn test_builtin_errors() {
        let instance = new_with_defaults().unwrap();

        assert!(matches!(
            instance.create_outbound("direct", &[]).err().unwrap(),
            CoreError::ProtocolNotFound { direction: Direction::Outbound, .. }
        ));
        assert!(matches!(
            instance.create_outbound("freedom", br#"{"redirect":"not an address"}"#).err().unwrap(),
            CoreError::BadConfiguration { .. }
        ));
        assert!(matches!(
            instance.create_inbound("direct", br#"{"address":""}"#).err().unwrap(),
            CoreError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_registration_closed_after_start() {
        let instance = new_with_defaults().unwrap();
        let err = instance
            .registry()
            .register_outbound("freedom2", protocols::create_freedom_outbound)
            .unwrap_err();
        assert!(matches!(err, CoreError::RegistryFrozen { .. }));
    }

    #[test]
    fn test_check_manifest() {
        let config = Config::from_json(
            r#"{
                "inbounds": [{"tag": "in", "protocol": "direct", "settings": {"port": 8080}}],
                "outbounds": [
                    {"tag": "out", "protocol": "freedom"},
                    {"protocol": "vmess", "settings": {"id": "x"}},
                    {"protocol": "blackhole", "settings": {"response": "nope"}}
                ]
            }"#,
        )
        .unwrap();

        let reports = new_with_defaults().unwrap().check(&config);
        assert_eq!(reports.len(), 4);
        assert!(reports[0].result.is_ok());
        assert!(reports[1].result.is_ok());
        assert_eq!(reports[2].tag, "vmess-1");
        assert_eq!(reports[2].result, Err("outbound protocol 'vmess' not found".to_string()));
        assert!(reports[3].result.as_ref().unwrap_err().starts_with("bad configuration"));
    }
}
