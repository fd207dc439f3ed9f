use bosun_proto::{ClientFrame, ServerFrame};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::calls::CallTable;
use crate::channels::ChannelRegistry;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::transport::{Dialer, Transport};

/// Lifecycle of the single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
    /// Terminal. A disposed link never dials again.
    Closed,
}

/// Outbound side of the socket. The sender is present exactly while a
/// socket is live; frames offered while it is absent are dropped. The
/// epoch is bumped by every stop/dispose, and a driver whose epoch is
/// stale must not publish state or touch the socket slot again.
struct Outbound {
    tx: Option<mpsc::UnboundedSender<String>>,
    epoch: u64,
}

/// State shared between the driver task, the channel registry and the call
/// table.
pub(crate) struct LinkCore {
    state_tx: watch::Sender<LinkState>,
    outbound: Mutex<Outbound>,
}

impl LinkCore {
    pub(crate) fn new() -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            state_tx,
            outbound: Mutex::new(Outbound { tx: None, epoch: 0 }),
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LinkState) {
        self.state_tx.send_replace(state);
    }

    /// Encode and send a frame if a socket is live. Returns false when the
    /// frame was dropped.
    pub(crate) fn send_frame(&self, frame: &ClientFrame) -> bool {
        let guard = self.outbound.lock();
        let Some(tx) = guard.tx.as_ref() else {
            trace!(?frame, "dropping frame, no live socket");
            return false;
        };
        match bosun_proto::encode(frame) {
            Ok(text) => tx.send(text).is_ok(),
            Err(err) => {
                warn!(%err, "failed to encode outbound frame");
                false
            }
        }
    }

    fn current_epoch(&self) -> u64 {
        self.outbound.lock().epoch
    }

    /// Publish a state transition on behalf of a driver, unless the driver
    /// has been superseded by a stop in the meantime.
    fn publish_if_current(&self, epoch: u64, state: LinkState) -> bool {
        let outbound = self.outbound.lock();
        if outbound.epoch != epoch {
            return false;
        }
        self.set_state(state);
        true
    }

    /// Install the outbound sender for a freshly dialed socket.
    fn attach_socket(&self, epoch: u64, tx: mpsc::UnboundedSender<String>) -> bool {
        let mut outbound = self.outbound.lock();
        if outbound.epoch != epoch {
            return false;
        }
        outbound.tx = Some(tx);
        true
    }

    /// Clear the socket and publish Reconnecting after a transport fault.
    fn socket_lost(&self, epoch: u64) -> bool {
        let mut outbound = self.outbound.lock();
        if outbound.epoch != epoch {
            return false;
        }
        outbound.tx = None;
        self.set_state(LinkState::Reconnecting);
        true
    }

    /// Retire the current driver epoch, drop the socket, and publish the
    /// final state. Used by stop and dispose.
    fn shutdown(&self, next: LinkState) {
        let mut outbound = self.outbound.lock();
        outbound.epoch += 1;
        outbound.tx = None;
        self.set_state(next);
    }
}

struct DriverSlot {
    handle: Option<tokio::task::JoinHandle<()>>,
    disposed: bool,
}

/// Owns the socket lifecycle: dials, pumps frames, and retries with bounded
/// exponential backoff after transport faults.
pub struct ReconnectingLink {
    core: Arc<LinkCore>,
    registry: Arc<ChannelRegistry>,
    calls: Arc<CallTable>,
    dialer: Arc<dyn Dialer>,
    backoff_base: Duration,
    backoff_cap: Duration,
    driver: Mutex<DriverSlot>,
}

impl ReconnectingLink {
    pub(crate) fn new(
        core: Arc<LinkCore>,
        registry: Arc<ChannelRegistry>,
        calls: Arc<CallTable>,
        dialer: Arc<dyn Dialer>,
        config: &LinkConfig,
    ) -> Self {
        Self {
            core,
            registry,
            calls,
            dialer,
            backoff_base: config.backoff_base,
            backoff_cap: config.backoff_cap,
            driver: Mutex::new(DriverSlot {
                handle: None,
                disposed: false,
            }),
        }
    }

    pub fn state(&self) -> LinkState {
        self.core.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.core.watch_state()
    }

    /// Start the connection driver. Idempotent: a second start while the
    /// driver is alive is a no-op, so at most one socket ever exists.
    pub fn start(&self) {
        let mut slot = self.driver.lock();
        if slot.disposed {
            debug!("start ignored, link disposed");
            return;
        }
        if slot.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("start ignored, driver already running");
            return;
        }

        let core = self.core.clone();
        let registry = self.registry.clone();
        let calls = self.calls.clone();
        let dialer = self.dialer.clone();
        let base = self.backoff_base;
        let cap = self.backoff_cap;
        let epoch = core.current_epoch();
        slot.handle = Some(tokio::spawn(async move {
            run_driver(core, registry, calls, dialer, base, cap, epoch).await;
        }));
    }

    /// Stop the driver: cancels any pending backoff sleep, closes the live
    /// socket, and rejects every pending call before returning. Retiring
    /// the epoch keeps an in-flight driver section from publishing state
    /// after this.
    pub fn stop(&self) {
        let mut slot = self.driver.lock();
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        let next = if slot.disposed {
            LinkState::Closed
        } else {
            LinkState::Disconnected
        };
        self.core.shutdown(next);
        self.calls.fail_all();
    }

    /// Stop and mark the link terminal. Subsequent starts are ignored and
    /// calls fail with [`LinkError::Closed`].
    pub fn dispose(&self) {
        let mut slot = self.driver.lock();
        slot.disposed = true;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        self.core.shutdown(LinkState::Closed);
        self.calls.fail_all();
    }
}

impl Drop for ReconnectingLink {
    fn drop(&mut self) {
        // The driver holds its own Arcs; without this it would keep
        // dialing after the last client handle is gone.
        if let Some(handle) = self.driver.get_mut().handle.take() {
            handle.abort();
        }
    }
}

async fn run_driver(
    core: Arc<LinkCore>,
    registry: Arc<ChannelRegistry>,
    calls: Arc<CallTable>,
    dialer: Arc<dyn Dialer>,
    backoff_base: Duration,
    backoff_cap: Duration,
    epoch: u64,
) {
    let mut retry_delay = backoff_base;
    loop {
        if !core.publish_if_current(epoch, LinkState::Connecting) {
            return;
        }
        match dialer.dial().await {
            Ok(transport) => {
                retry_delay = backoff_base;

                let (out_tx, out_rx) = mpsc::unbounded_channel();
                if !core.attach_socket(epoch, out_tx) {
                    return;
                }

                // The server forgets all channel membership on disconnect,
                // so every new socket re-sends subscribe frames for the
                // channels that still have local subscribers. Replay runs
                // before Open is published: a subscriber reacting to the
                // state change can only announce a channel the replay has
                // not already covered.
                registry.replay();
                if !core.publish_if_current(epoch, LinkState::Open) {
                    return;
                }
                debug!("link open");

                pump(transport, out_rx, &registry, &calls).await;

                if !core.socket_lost(epoch) {
                    return;
                }
                calls.fail_all();
                debug!("link lost, reconnecting");
            }
            Err(err) => {
                warn!(%err, "connect failed");
                if !core.publish_if_current(epoch, LinkState::Reconnecting) {
                    return;
                }
            }
        }

        tokio::time::sleep(retry_delay).await;
        retry_delay = std::cmp::min(retry_delay * 2, backoff_cap);
    }
}

/// Forward outbound frames to the socket and dispatch inbound frames until
/// the socket drops.
async fn pump(
    mut transport: Box<dyn Transport>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    registry: &ChannelRegistry,
    calls: &CallTable,
) {
    loop {
        tokio::select! {
            outgoing = out_rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(err) = transport.send(text).await {
                        warn!(%err, "socket send failed");
                        break;
                    }
                }
                None => break,
            },
            incoming = transport.recv() => match incoming {
                Some(text) => dispatch(registry, calls, &text),
                None => {
                    debug!("socket closed");
                    break;
                }
            },
        }
    }
}

/// Classify one inbound frame: pushes go to channel subscribers, replies to
/// the call table. Malformed frames are logged and dropped.
fn dispatch(registry: &ChannelRegistry, calls: &CallTable, text: &str) {
    match bosun_proto::decode(text) {
        Ok(ServerFrame::Push { ty, channel, payload }) => {
            trace!(%ty, %channel, "push frame");
            registry.dispatch(&channel, payload);
        }
        Ok(ServerFrame::Reply { request_id, data, error }) => {
            let result = match error {
                Some(message) => Err(LinkError::Remote(message)),
                None => Ok(data.unwrap_or(Value::Null)),
            };
            calls.complete(&request_id, result);
        }
        Err(err) => {
            warn!(%err, "dropping malformed frame");
        }
    }
}
