use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::RealtimeClient;

/// Ties the connection lifecycle to an external authentication signal:
/// the link starts when the session becomes authenticated and stops when
/// it ends. Dropping the gate stops watching but leaves the link as-is.
pub struct AuthGate {
    task: tokio::task::JoinHandle<()>,
}

impl AuthGate {
    pub fn spawn(mut auth_rx: watch::Receiver<bool>, client: RealtimeClient) -> Self {
        let task = tokio::spawn(async move {
            let mut authenticated = *auth_rx.borrow();
            apply(&client, authenticated);

            while auth_rx.changed().await.is_ok() {
                let next = *auth_rx.borrow();
                if next != authenticated {
                    authenticated = next;
                    apply(&client, authenticated);
                }
            }
            debug!("auth signal gone, gate exiting");
        });
        Self { task }
    }
}

fn apply(client: &RealtimeClient, authenticated: bool) {
    if authenticated {
        info!("session authenticated, starting link");
        client.start();
    } else {
        info!("session ended, stopping link");
        client.stop();
    }
}

impl Drop for AuthGate {
    fn drop(&mut self) {
        self.task.abort();
    }
}
