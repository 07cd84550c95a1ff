//! Shutdown signalling shared by the pipeline and the session manager.

use tokio::sync::watch;

/// Sending half: asserts shutdown for every [`Shutdown`] receiver.
#[derive(Debug)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown(self.0.subscribe())
    }
}

/// Receiving half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// Whether shutdown has been asserted.
    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once shutdown is asserted.
    ///
    /// Never resolves if the sender is dropped without asserting shutdown.
    pub async fn requested(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked shutdown sender and receiver.
pub fn shutdown_channel() -> (ShutdownTx, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), Shutdown(rx))
}
