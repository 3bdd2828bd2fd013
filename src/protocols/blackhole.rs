use crate::common::CoreResult;
use crate::features::outbound;
use crate::resolver::ProtocolConfig;
use crate::space::Space;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const HTTP_403_RESPONSE: &[u8] = b"HTTP/1.1 403 Forbidden\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// What to send before dropping a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlackholeResponse {
    #[default]
    None,
    Http,
}

/// Settings for the `blackhole` outbound
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlackholeConfig {
    #[serde(default)]
    pub response: BlackholeResponse,
}

/// Outbound that discards everything sent to it
pub struct BlackholeOutbound {
    config: BlackholeConfig,
}

impl BlackholeOutbound {
    pub fn new(config: BlackholeConfig) -> Self {
        Self { config }
    }
}

crate::impl_runnable!(BlackholeOutbound);

#[async_trait]
impl outbound::Handler for BlackholeOutbound {
    fn protocol(&self) -> &str {
        "blackhole"
    }

    async fn dispatch(&self, context: outbound::OutboundContext, mut link: outbound::Link) -> CoreResult<()> {
        tracing::debug!("Blackholing connection to {}", context.destination_addr);
        if self.config.response == BlackholeResponse::Http {
            link.writer.write_all(HTTP_403_RESPONSE).await?;
            link.writer.flush().await?;
        }
        link.writer.shutdown().await?;
        Ok(())
    }

    fn settings(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.config).ok()
    }
}

/// Factory for the `blackhole` outbound
pub fn create_blackhole_outbound(_space: &Space, config: Option<ProtocolConfig>) -> CoreResult<Arc<dyn outbound::Handler>> {
    let config = match config {
        Some(config) => config.typed::<BlackholeConfig>()?.clone(),
        None => BlackholeConfig::default(),
    };
    Ok(Arc::new(BlackholeOutbound::new(config)))
}
