use crate::common::{CoreError, CoreResult, Runnable};
use crate::features::{inbound, outbound};
use crate::resolver::ProtocolConfig;
use crate::space::Space;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Settings for the `direct` inbound
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectConfig {
    /// Fixed destination host; the connection's own destination when unset
    pub address: Option<String>,

    /// Fixed destination port
    pub port: Option<u16>,
}

/// Settings for the `freedom` outbound
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreedomConfig {
    /// Send every connection here instead of the requested destination
    pub redirect: Option<SocketAddr>,
}

/// Relay bytes both ways until either side finishes.
///
/// The direction that finishes first decides the result; the other copy is
/// aborted.
async fn relay<R1, W1, R2, W2>(
    mut client_reader: R1,
    mut client_writer: W1,
    mut remote_reader: R2,
    mut remote_writer: W2,
) -> CoreResult<()>
where
    R1: AsyncRead + Send + Unpin + 'static,
    W1: AsyncWrite + Send + Unpin + 'static,
    R2: AsyncRead + Send + Unpin + 'static,
    W2: AsyncWrite + Send + Unpin + 'static,
{
    let mut uplink = tokio::spawn(async move { tokio::io::copy(&mut client_reader, &mut remote_writer).await });
    let mut downlink = tokio::spawn(async move { tokio::io::copy(&mut remote_reader, &mut client_writer).await });

    let (link, result) = tokio::select! {
        result = &mut uplink => {
            downlink.abort();
            ("Uplink", result)
        }
        result = &mut downlink => {
            uplink.abort();
            ("Downlink", result)
        }
    };

    match result {
        Ok(Ok(bytes)) => {
            tracing::debug!("{} finished after {} bytes", link, bytes);
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("{} error: {}", link, e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("{} task failed: {}", link, e);
            Err(CoreError::NetworkError(format!("{} task failed: {}", link, e)))
        }
    }
}

/// Inbound that forwards every accepted connection over plain TCP
pub struct DirectInbound {
    config: DirectConfig,
}

impl DirectInbound {
    pub fn new(config: DirectConfig) -> Self {
        Self { config }
    }

    async fn target(&self, context: &inbound::InboundContext) -> CoreResult<SocketAddr> {
        match (&self.config.address, self.config.port) {
            (None, None) => Ok(context.destination_addr),
            (address, port) => {
                let host = address.clone().unwrap_or_else(|| context.destination_addr.ip().to_string());
                let port = port.unwrap_or(context.destination_addr.port());
                let addr = tokio::net::lookup_host((host.as_str(), port))
                    .await?
                    .next()
                    .ok_or_else(|| CoreError::NetworkError(format!("DNS resolve failed for {}", host)));
                addr
            }
        }
    }
}

#[async_trait]
impl Runnable for DirectInbound {
    async fn start(&self) -> CoreResult<()> {
        tracing::info!("Direct inbound started");
        Ok(())
    }

    async fn close(&self) -> CoreResult<()> {
        tracing::info!("Direct inbound closed");
        Ok(())
    }
}

#[async_trait]
impl inbound::Handler for DirectInbound {
    fn protocol(&self) -> &str {
        "direct"
    }

    async fn handle_connection(&self, stream: TcpStream, context: inbound::InboundContext) -> CoreResult<()> {
        let target = self.target(&context).await?;
        tracing::debug!("Forwarding {} to {}", context.source_addr, target);

        let remote = TcpStream::connect(target)
            .await
            .map_err(|e| CoreError::NetworkError(format!("Failed to connect to {}: {}", target, e)))?;
        let (client_reader, client_writer) = stream.into_split();
        let (remote_reader, remote_writer) = remote.into_split();
        relay(client_reader, client_writer, remote_reader, remote_writer).await
    }

    fn settings(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.config).ok()
    }
}

/// Outbound that connects straight to the destination
pub struct FreedomOutbound {
    config: FreedomConfig,
}

impl FreedomOutbound {
    pub fn new(config: FreedomConfig) -> Self {
        Self { config }
    }
}

crate::impl_runnable!(FreedomOutbound);

#[async_trait]
impl outbound::Handler for FreedomOutbound {
    fn protocol(&self) -> &str {
        "freedom"
    }

    async fn dispatch(&self, context: outbound::OutboundContext, link: outbound::Link) -> CoreResult<()> {
        let target = self.config.redirect.unwrap_or(context.destination_addr);
        tracing::debug!("Dispatching freedom outbound connection to {}", target);

        match TcpStream::connect(target).await {
            Ok(remote) => {
                let (remote_reader, remote_writer) = remote.into_split();
                relay(link.reader, link.writer, remote_reader, remote_writer).await
            }
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", target, e);
                Err(CoreError::NetworkError(format!("Failed to connect to {}: {}", target, e)))
            }
        }
    }

    fn settings(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.config).ok()
    }
}

/// Factory for the `direct` inbound
pub fn create_direct_inbound(_space: &Space, config: Option<ProtocolConfig>) -> CoreResult<Arc<dyn inbound::Handler>> {
    let config = match config {
        Some(config) => config.typed::<DirectConfig>()?.clone(),
        None => DirectConfig::default(),
    };
    if config.address.as_deref().is_some_and(|a| a.trim().is_empty()) {
        return Err(CoreError::InvalidConfiguration("direct: empty address".to_string()));
    }
    Ok(Arc::new(DirectInbound::new(config)))
}

/// Factory for the `freedom` outbound
pub fn create_freedom_outbound(_space: &Space, config: Option<ProtocolConfig>) -> CoreResult<Arc<dyn outbound::Handler>> {
    let config = match config {
        Some(config) => config.typed::<FreedomConfig>()?.clone(),
        None => FreedomConfig::default(),
    };
    Ok(Arc::new(FreedomOutbound::new(config)))
}
