use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::channels::{ChannelRegistry, Subscription};
use crate::config::DEFAULT_CHANNEL;

/// Derive the channel implied by a navigation path: the first path segment,
/// with the root path mapping to the default channel. Paths outside the
/// known set have no live channel.
pub fn route_to_channel(path: &str, known: &[String]) -> Option<String> {
    let segment = path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default();
    let channel = if segment.is_empty() {
        DEFAULT_CHANNEL
    } else {
        segment
    };
    known
        .iter()
        .any(|k| k == channel)
        .then(|| channel.to_string())
}

/// Keeps at most one route-derived channel subscription alive, swapping it
/// as navigation changes.
pub struct RouteBinder {
    registry: Arc<ChannelRegistry>,
    known: Vec<String>,
    bound: Option<Subscription>,
}

impl RouteBinder {
    pub(crate) fn new(registry: Arc<ChannelRegistry>, known: Vec<String>) -> Self {
        Self {
            registry,
            known,
            bound: None,
        }
    }

    /// React to a navigation change. Unsubscribes the previous channel and
    /// subscribes the new one when the derived channel differs.
    pub fn navigate(&mut self, path: &str) {
        let next = route_to_channel(path, &self.known);
        if next.as_deref() == self.channel() {
            return;
        }
        // Drop first so the unsubscribe frame precedes the new subscribe.
        self.bound = None;
        if let Some(channel) = next {
            debug!(%channel, %path, "binding route channel");
            self.bound = Some(self.registry.subscribe(&channel));
        } else {
            debug!(%path, "no channel for route");
        }
    }

    /// The channel currently bound, if any.
    pub fn channel(&self) -> Option<&str> {
        self.bound.as_ref().map(|sub| sub.channel())
    }

    /// Next push payload on the bound channel. Returns `None` when no
    /// channel is bound.
    pub async fn recv(&mut self) -> Option<Value> {
        match &mut self.bound {
            Some(sub) => sub.recv().await,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        crate::config::DEFAULT_ROUTE_CHANNELS
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn root_path_maps_to_dashboard() {
        assert_eq!(route_to_channel("/", &known()).as_deref(), Some("dashboard"));
        assert_eq!(route_to_channel("", &known()).as_deref(), Some("dashboard"));
    }

    #[test]
    fn first_segment_selects_the_channel() {
        assert_eq!(
            route_to_channel("/network", &known()).as_deref(),
            Some("network")
        );
        assert_eq!(
            route_to_channel("/docker/containers/abc", &known()).as_deref(),
            Some("docker")
        );
    }

    #[test]
    fn unknown_segment_has_no_channel() {
        assert_eq!(route_to_channel("/settings", &known()), None);
        assert_eq!(route_to_channel("/sign-in", &known()), None);
    }
}
