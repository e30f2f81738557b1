//! Shutdown signalling for [`crate::replication::poller::ChangeCapturePoller`].
//!
//! Built on a `watch` channel so that every receiver observes the same request.

use tokio::sync::watch;

/// Sending side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Asks every subscribed receiver to stop.
    ///
    /// Requests sent while no receiver is alive are dropped.
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }

    /// Creates a new receiver that only observes requests sent after this call.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Receiving side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a connected shutdown sender and receiver.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}
