//! Fire-and-forget outbound path.
//!
//! The tick loop hands messages to [`Outbound`] and moves on. A writer task
//! drains the queue and performs the actual sends, each under a deadline.
//! Failures are logged and dropped: the next periodic broadcast carries a
//! newer position anyway.

use std::time::Duration;

use sync_shared::net::{SyncMsg, Transport};
use tokio::{sync::mpsc, time};
use tracing::{debug, warn};

/// Cloneable handle for queueing outbound messages.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<SyncMsg>,
}

impl Outbound {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues `msg`. Never blocks; a closed writer is logged and ignored.
    pub fn send(&self, msg: SyncMsg) {
        if let Err(e) = self.tx.send(msg) {
            warn!(msg = ?e.0, "Outbound writer gone, message dropped");
        }
    }
}

/// Drains `rx` into `transport` until every [`Outbound`] handle is dropped.
pub async fn run_writer<T: Transport + ?Sized>(
    transport: &T,
    mut rx: mpsc::UnboundedReceiver<SyncMsg>,
    send_timeout: Duration,
) {
    while let Some(msg) = rx.recv().await {
        match time::timeout(send_timeout, transport.send(&msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Outbound send failed"),
            Err(_) => warn!(?send_timeout, "Outbound send timed out"),
        }
    }
    debug!("Outbound writer finished");
}
