use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::LinkError;
use crate::link::{LinkCore, LinkState};
use bosun_proto::ClientFrame;

/// Tracks in-flight request/response exchanges. Calls fail fast when the
/// connection is not open; nothing is queued for replay. Pending calls do
/// not survive a disconnect, callers that want retry semantics re-issue
/// after observing the connection reopen.
pub(crate) struct CallTable {
    core: Arc<LinkCore>,
    pending: Mutex<HashMap<String, oneshot::Sender<Result<Value, LinkError>>>>,
}

impl CallTable {
    pub(crate) fn new(core: Arc<LinkCore>) -> Self {
        Self {
            core,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a call and wait for the matching reply. `timeout` of `None`
    /// waits indefinitely.
    pub(crate) async fn call(
        &self,
        ty: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, LinkError> {
        match self.core.state() {
            LinkState::Open => {}
            LinkState::Closed => return Err(LinkError::Closed),
            _ => return Err(LinkError::NotConnected),
        }

        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        let frame = ClientFrame::Call {
            ty: ty.to_string(),
            request_id: request_id.clone(),
            payload,
        };
        if !self.core.send_frame(&frame) {
            self.pending.lock().remove(&request_id);
            return Err(LinkError::NotConnected);
        }
        trace!(%ty, %request_id, "call sent");

        match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(result)) => result,
                // Sender dropped without completing, treated as lost.
                Ok(Err(_)) => Err(LinkError::NotConnected),
                Err(_) => {
                    // Late replies for this id are ignored by `complete`.
                    self.pending.lock().remove(&request_id);
                    Err(LinkError::Timeout(deadline))
                }
            },
            None => rx.await.unwrap_or(Err(LinkError::NotConnected)),
        }
    }

    /// Resolve or reject the pending call matching `request_id`. Replies
    /// with no matching entry (late arrival after timeout or abandonment)
    /// are dropped.
    pub(crate) fn complete(&self, request_id: &str, result: Result<Value, LinkError>) {
        let entry = self.pending.lock().remove(request_id);
        match entry {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(%request_id, "reply with no pending call"),
        }
    }

    /// Reject every pending call. Invoked on every transition out of Open.
    pub(crate) fn fail_all(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "rejecting pending calls");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(LinkError::NotConnected));
        }
    }
}
