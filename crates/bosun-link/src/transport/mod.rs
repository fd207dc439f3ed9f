use anyhow::Result;
use async_trait::async_trait;

pub mod mock;
pub mod websocket;

pub use mock::{MockDialer, MockRemote, MockTransport};
pub use websocket::{WebSocketDialer, WebSocketTransport};

/// A live duplex socket carrying text frames. Owned exclusively by the link
/// driver; everything else talks to the server through the registry and the
/// correlator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one text frame to the server.
    async fn send(&self, text: String) -> Result<()>;

    /// Receive the next text frame. `None` means the socket is gone; errors
    /// and clean closes are not distinguished.
    async fn recv(&mut self) -> Option<String>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Connection factory the reconnect loop retries through.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn Transport>>;
}
