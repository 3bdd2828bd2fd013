pub mod inbound;
pub mod outbound;

use crate::registry::{FactoryTable, Registry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a handler accepts incoming connections or initiates outgoing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one direction: which handler type its factories
/// produce and where its factories live in a [`Registry`].
pub trait HandlerKind: Send + Sync + 'static {
    /// Handler trait object produced by factories of this direction
    type Handler: ?Sized + Send + Sync + 'static;

    const DIRECTION: Direction;

    /// The factory table for this direction
    fn table(registry: &Registry) -> &FactoryTable<Self::Handler>;
}

/// Marker for inbound handlers
#[derive(Debug, Clone, Copy)]
pub struct Inbound;

/// Marker for outbound handlers
#[derive(Debug, Clone, Copy)]
pub struct Outbound;

impl HandlerKind for Inbound {
    type Handler = dyn inbound::Handler;
    const DIRECTION: Direction = Direction::Inbound;

    fn table(registry: &Registry) -> &FactoryTable<Self::Handler> {
        registry.inbound_table()
    }
}

impl HandlerKind for Outbound {
    type Handler = dyn outbound::Handler;
    const DIRECTION: Direction = Direction::Outbound;

    fn table(registry: &Registry) -> &FactoryTable<Self::Handler> {
        registry.outbound_table()
    }
}

// Re-export commonly used types
pub use inbound::{Handler as InboundHandler, InboundContext};
pub use outbound::{Handler as OutboundHandler, Link, OutboundContext};
