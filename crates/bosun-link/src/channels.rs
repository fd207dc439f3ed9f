use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::link::LinkCore;
use bosun_proto::ClientFrame;

struct Entry {
    id: u64,
    tx: mpsc::UnboundedSender<Value>,
}

struct RegistryInner {
    next_id: u64,
    channels: HashMap<String, Vec<Entry>>,
}

/// Maps channel names to local subscribers and keeps the server's view of
/// membership in step: a subscribe frame goes out exactly when a channel
/// gains its first subscriber, an unsubscribe frame exactly when it loses
/// its last one, and every open transition replays the full set.
pub(crate) struct ChannelRegistry {
    core: Arc<LinkCore>,
    inner: Mutex<RegistryInner>,
}

impl ChannelRegistry {
    pub(crate) fn new(core: Arc<LinkCore>) -> Self {
        Self {
            core,
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                channels: HashMap::new(),
            }),
        }
    }

    /// Register a new subscriber. The returned handle receives every push
    /// for the channel until it is dropped.
    pub(crate) fn subscribe(self: &Arc<Self>, channel: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            let entries = inner.channels.entry(channel.to_string()).or_default();
            let first = entries.is_empty();
            entries.push(Entry { id, tx });
            if first {
                // First local subscriber: tell the server now. The frame is
                // dropped while no socket is live, and the open replay runs
                // before Open becomes observable, so a channel is announced
                // once per connection either here or by the replay, never
                // both.
                self.core.send_frame(&ClientFrame::subscribe(channel));
            }
            id
        };
        Subscription {
            channel: channel.to_string(),
            id,
            rx,
            registry: self.clone(),
        }
    }

    fn remove(&self, channel: &str, id: u64) {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.channels.get_mut(channel) else {
            return;
        };
        entries.retain(|entry| entry.id != id);
        if entries.is_empty() {
            inner.channels.remove(channel);
            // Dropped while no socket is live, which is fine: the server has
            // already forgotten us.
            self.core.send_frame(&ClientFrame::unsubscribe(channel));
        }
    }

    /// Deliver a push payload to every subscriber of `channel`, pruning
    /// handles whose receiver side is gone.
    pub(crate) fn dispatch(&self, channel: &str, payload: Value) {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.channels.get_mut(channel) else {
            // A push may race a pending unsubscribe round-trip.
            debug!(%channel, "push for channel with no subscribers");
            return;
        };
        entries.retain(|entry| entry.tx.send(payload.clone()).is_ok());
        if entries.is_empty() {
            inner.channels.remove(channel);
            self.core.send_frame(&ClientFrame::unsubscribe(channel));
        }
    }

    /// Re-send subscribe frames for every channel that still has local
    /// subscribers. Runs on every new socket, before the open state is
    /// published.
    pub(crate) fn replay(&self) {
        let inner = self.inner.lock();
        for (channel, entries) in &inner.channels {
            if !entries.is_empty() {
                trace!(%channel, "replaying subscription");
                self.core.send_frame(&ClientFrame::subscribe(channel));
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .channels
            .get(channel)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

/// A live channel subscription. Dropping the handle unsubscribes; when the
/// last handle for a channel goes away the server is told to stop pushing.
pub struct Subscription {
    channel: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Value>,
    registry: Arc<ChannelRegistry>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next push payload for this channel. `None` after the registry itself
    /// is gone, which only happens at client teardown.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Payload already sitting in the queue, if any.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    /// Explicit unsubscribe; equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(&self.channel, self.id);
    }
}
