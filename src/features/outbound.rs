use crate::common::{CoreResult, Runnable};
use async_trait::async_trait;
use std::net::SocketAddr;

/// Context for outbound connections
#[derive(Debug, Clone)]
pub struct OutboundContext {
    pub destination_addr: SocketAddr,
}

impl OutboundContext {
    pub fn new(destination_addr: SocketAddr) -> Self {
        Self { destination_addr }
    }
}

/// Transport link for data transmission
pub struct Link {
    pub reader: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    pub writer: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
}

impl Link {
    pub fn new(
        reader: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
        writer: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
    ) -> Self {
        Self { reader, writer }
    }
}

/// Handler for processing outbound connections
#[async_trait]
pub trait Handler: Runnable {
    /// Name of the protocol this handler speaks
    fn protocol(&self) -> &str;

    /// Dispatch data through this outbound handler
    async fn dispatch(&self, context: OutboundContext, link: Link) -> CoreResult<()>;

    /// Effective settings, for diagnostics
    fn settings(&self) -> Option<serde_json::Value> {
        None
    }
}
