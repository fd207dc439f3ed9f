use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Dialer, Transport};

/// In-memory transport for tests. `pair` returns the client half together
/// with a [`MockRemote`] playing the server side of the socket.
pub struct MockTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn pair() -> (MockTransport, MockRemote) {
        let (tx_out, rx_out) = mpsc::unbounded_channel();
        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let transport = MockTransport {
            tx: tx_out,
            rx: rx_in,
            connected: connected.clone(),
        };
        let remote = MockRemote {
            tx: Some(tx_in),
            rx: rx_out,
            connected,
        };
        (transport, remote)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(anyhow::anyhow!("mock transport disconnected"));
        }
        self.tx
            .send(text)
            .map_err(|_| anyhow::anyhow!("mock remote gone"))?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Server side of a [`MockTransport`] pair.
pub struct MockRemote {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
}

impl MockRemote {
    /// Push a raw text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(text.into());
        }
    }

    /// Push a server frame as JSON.
    pub fn push_json(&self, value: serde_json::Value) {
        self.push(value.to_string());
    }

    /// Next frame the client wrote to the socket.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Next frame parsed as JSON.
    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        let text = self.next_frame().await?;
        serde_json::from_str(&text).ok()
    }

    /// Frame already sitting in the queue, if any.
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Simulate a transport fault: the client observes the socket closing.
    pub fn drop_connection(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.tx = None;
    }
}

enum DialScript {
    Fail,
    Stall(std::time::Duration),
}

/// Dialer with scripted outcomes. Successful dials hand the server half of
/// the new transport to the receiver returned by [`MockDialer::new`].
pub struct MockDialer {
    script: Mutex<VecDeque<DialScript>>,
    remotes: mpsc::UnboundedSender<MockRemote>,
    dials: Mutex<Vec<tokio::time::Instant>>,
}

impl MockDialer {
    pub fn new() -> (Arc<MockDialer>, mpsc::UnboundedReceiver<MockRemote>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dialer = Arc::new(MockDialer {
            script: Mutex::new(VecDeque::new()),
            remotes: tx,
            dials: Mutex::new(Vec::new()),
        });
        (dialer, rx)
    }

    /// Make the next `n` dials fail before connections start succeeding again.
    pub fn fail_next(&self, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(DialScript::Fail);
        }
    }

    /// Make the next dial hang for `delay` before succeeding.
    pub fn stall_next(&self, delay: std::time::Duration) {
        self.script.lock().push_back(DialScript::Stall(delay));
    }

    pub fn dial_count(&self) -> usize {
        self.dials.lock().len()
    }

    /// When each dial attempt happened, for asserting on backoff spacing.
    pub fn dial_instants(&self) -> Vec<tokio::time::Instant> {
        self.dials.lock().clone()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>> {
        self.dials.lock().push(tokio::time::Instant::now());
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(DialScript::Fail) => return Err(anyhow::anyhow!("connection refused")),
            Some(DialScript::Stall(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }
        let (transport, remote) = MockTransport::pair();
        let _ = self.remotes.send(remote);
        Ok(Box::new(transport))
    }
}
