//! Realtime client for the bosun server console.
//!
//! One persistent websocket multiplexes any number of logical channels
//! (dashboard, network, docker, updates, ...) plus ad-hoc request/response
//! calls. The link reconnects with bounded exponential backoff and replays
//! channel subscriptions on every reopen; delivery is best-effort, so
//! consumers that miss pushes during an outage simply resume when the
//! channel resubscribes.

mod calls;
mod channels;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod link;
pub mod route;
pub mod transport;

pub use channels::Subscription;
pub use client::RealtimeClient;
pub use config::{LinkConfig, DEFAULT_CHANNEL, DEFAULT_ROUTE_CHANNELS};
pub use error::LinkError;
pub use gate::AuthGate;
pub use link::LinkState;
pub use route::{route_to_channel, RouteBinder};
pub use transport::{Dialer, Transport};
