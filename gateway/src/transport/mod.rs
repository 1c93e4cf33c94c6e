// Publish/subscribe transport boundary and link boundary.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod datagram;
pub mod link;

pub use datagram::DatagramTransport;
pub use link::{InterfaceLink, Link, LinkError};

/// Identifier handed out by every successful connect, monotonically increasing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub keep_alive: Duration,
    pub will: LastWill,
}

/// Asynchronous notifications raised by the transport outside of any call.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Disconnected { session: SessionId },
    Message { topic: String, payload: Vec<u8> },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no active session")]
    NotConnected,
    #[error("broker rejected the request: {0}")]
    Rejected(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("transport io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("envelope codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionId, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;
}
