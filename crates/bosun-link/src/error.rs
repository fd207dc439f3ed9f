use std::time::Duration;
use thiserror::Error;

/// Faults surfaced to callers of the realtime client. Transport and decode
/// faults are handled inside the link and never reach this type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("connection is not open")]
    NotConnected,
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("link has been disposed")]
    Closed,
}
