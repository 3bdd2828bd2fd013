use crate::common::{CoreResult, Runnable};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Context for inbound connections
#[derive(Debug, Clone)]
pub struct InboundContext {
    pub source_addr: SocketAddr,
    pub destination_addr: SocketAddr,
}

impl InboundContext {
    pub fn new(source_addr: SocketAddr, destination_addr: SocketAddr) -> Self {
        Self {
            source_addr,
            destination_addr,
        }
    }
}

/// Handler for processing inbound connections.
///
/// Instances come out of an inbound factory; accepting connections and
/// feeding them in is the caller's job.
#[async_trait]
pub trait Handler: Runnable {
    /// Name of the protocol this handler speaks
    fn protocol(&self) -> &str;

    /// Handle an incoming connection
    async fn handle_connection(&self, stream: TcpStream, context: InboundContext) -> CoreResult<()>;

    /// Effective settings, for diagnostics
    fn settings(&self) -> Option<serde_json::Value> {
        None
    }
}
