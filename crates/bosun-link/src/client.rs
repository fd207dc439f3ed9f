use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::calls::CallTable;
use crate::channels::{ChannelRegistry, Subscription};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::link::{LinkCore, LinkState, ReconnectingLink};
use crate::route::RouteBinder;
use crate::transport::{Dialer, WebSocketDialer};

/// The realtime client: one logical connection to the console server,
/// multiplexing channel subscriptions and request/response calls.
///
/// Explicitly constructed and cheap to clone; hand clones to whichever
/// consumers need it instead of reaching for a global.
#[derive(Clone)]
pub struct RealtimeClient {
    link: Arc<ReconnectingLink>,
    registry: Arc<ChannelRegistry>,
    calls: Arc<CallTable>,
    config: LinkConfig,
}

impl RealtimeClient {
    /// Build a client over an arbitrary dialer. Tests inject mock dialers
    /// through this.
    pub fn new(config: LinkConfig, dialer: Arc<dyn Dialer>) -> Self {
        let core = Arc::new(LinkCore::new());
        let registry = Arc::new(ChannelRegistry::new(core.clone()));
        let calls = Arc::new(CallTable::new(core.clone()));
        let link = Arc::new(ReconnectingLink::new(
            core,
            registry.clone(),
            calls.clone(),
            dialer,
            &config,
        ));
        Self {
            link,
            registry,
            calls,
            config,
        }
    }

    /// Build a client dialing the configured websocket endpoint.
    pub fn websocket(config: LinkConfig) -> Self {
        let dialer = Arc::new(WebSocketDialer::new(&config));
        Self::new(config, dialer)
    }

    /// Start connecting. Idempotent while the driver is alive.
    pub fn start(&self) {
        self.link.start();
    }

    /// Disconnect and cancel any reconnect in progress. Pending calls are
    /// rejected before this returns.
    pub fn stop(&self) {
        self.link.stop();
    }

    /// Stop permanently. The client never reconnects after this.
    pub fn dispose(&self) {
        self.link.dispose();
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    /// Read-only connection-state observable, e.g. for a disconnected
    /// indicator in the UI.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.link.watch_state()
    }

    /// Subscribe to a named channel. Dropping the handle unsubscribes.
    pub fn subscribe(&self, channel: &str) -> Subscription {
        self.registry.subscribe(channel)
    }

    /// One-shot request/response over the same socket, using the configured
    /// default timeout (30 seconds unless overridden in [`LinkConfig`]).
    pub async fn call(&self, ty: &str, payload: Value) -> Result<Value, LinkError> {
        self.calls.call(ty, payload, self.config.call_timeout).await
    }

    /// Like [`call`](Self::call) with an explicit deadline; `None` waits
    /// for the reply indefinitely.
    pub async fn call_with_timeout(
        &self,
        ty: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, LinkError> {
        self.calls.call(ty, payload, timeout).await
    }

    /// A binder that follows navigation changes with the configured route
    /// channel set.
    pub fn route_binder(&self) -> RouteBinder {
        RouteBinder::new(self.registry.clone(), self.config.route_channels.clone())
    }
}
