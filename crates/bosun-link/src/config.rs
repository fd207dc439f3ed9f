use std::time::Duration;

/// Channels the route binder may auto-subscribe. Matches the console pages
/// that have a live backing channel on the server.
pub const DEFAULT_ROUTE_CHANNELS: &[&str] = &["dashboard", "network", "docker", "updates"];

/// Channel bound when the navigation path has no leading segment.
pub const DEFAULT_CHANNEL: &str = "dashboard";

/// Configuration for the realtime link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// The server URL or bare host (`ws://` / `wss://` prefixes optional).
    pub url: String,
    /// Endpoint path of the realtime socket.
    pub path: String,
    /// Whether to use TLS (wss:// vs ws://).
    pub use_tls: bool,
    /// First reconnect delay after a transport fault.
    pub backoff_base: Duration,
    /// Upper bound on the reconnect delay.
    pub backoff_cap: Duration,
    /// Default deadline applied to calls. `None` waits for the reply
    /// indefinitely.
    pub call_timeout: Option<Duration>,
    /// Channels the route binder recognizes.
    pub route_channels: Vec<String>,
}

impl LinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        // Auto-detect TLS based on URL
        let use_tls = url.starts_with("wss://")
            || (!url.starts_with("ws://")
                && !url.contains("127.0.0.1")
                && !url.contains("localhost"));

        Self {
            url,
            path: "/ws".to_string(),
            use_tls,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(10),
            call_timeout: Some(Duration::from_secs(30)),
            route_channels: DEFAULT_ROUTE_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_route_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Build the full websocket URL.
    pub fn build_url(&self) -> String {
        let mut url = self.url.clone();

        // Normalize scheme
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            url = if self.use_tls {
                format!("wss://{}", url)
            } else {
                format!("ws://{}", url)
            };
        }

        // Normalize localhost to avoid IPv6 issues
        if url.contains("localhost") {
            url = url.replace("localhost", "127.0.0.1");
        }

        if let Some(trimmed) = url.strip_suffix('/') {
            url = trimmed.to_string();
        }
        if !self.path.starts_with('/') {
            url.push('/');
        }
        url.push_str(&self.path);

        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_tls() {
        let config = LinkConfig::new("console.example.com");
        assert!(config.use_tls);
        assert_eq!(config.build_url(), "wss://console.example.com/ws");
    }

    #[test]
    fn localhost_stays_plaintext_and_is_normalized() {
        let config = LinkConfig::new("localhost:8080");
        assert!(!config.use_tls);
        assert_eq!(config.build_url(), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let config = LinkConfig::new("ws://10.0.0.5:8080");
        assert_eq!(config.build_url(), "ws://10.0.0.5:8080/ws");
    }

    #[test]
    fn custom_path_is_appended_once() {
        let config = LinkConfig::new("wss://console.example.com/").with_path("realtime");
        assert_eq!(config.build_url(), "wss://console.example.com/realtime");
    }
}
