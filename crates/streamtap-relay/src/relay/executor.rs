//! Relay graph execution: one task per relay node.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use streamtap_core::Tuple;

use super::observer::StreamObserver;
use crate::shutdown::ShutdownError;

pub(super) struct RelayNodeTask {
    pub(super) index: usize,
    pub(super) rx: mpsc::Receiver<Tuple>,
    pub(super) observers: Vec<Arc<dyn StreamObserver>>,
}

impl RelayNodeTask {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            // Cancellation is checked before every delivery so nothing is
            // observed once it has been requested.
            let tuple = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(node = self.index, dropped = self.rx.len(), "Relay node cancelled");
                    return;
                }
                next = self.rx.recv() => match next {
                    Some(tuple) => tuple,
                    None => {
                        debug!(node = self.index, "Relay node input closed");
                        return;
                    }
                },
            };
            for observer in &self.observers {
                observer.on_tuple(&tuple);
            }
        }
    }
}

/// Handle to a running relay graph.
pub struct RelayExecution {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl RelayExecution {
    pub(super) fn spawn(nodes: Vec<RelayNodeTask>, cancel: CancellationToken) -> Self {
        let mut tasks = JoinSet::new();
        for node in nodes {
            tasks.spawn(node.run(cancel.clone()));
        }
        Self { cancel, tasks }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Node tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every node and wait for them to acknowledge.
    ///
    /// Tuples still queued in node inputs are dropped. Nodes that have not
    /// stopped within `grace` are aborted and reported; an observer stuck in
    /// blocking code cannot be interrupted this way.
    pub async fn cancel_and_wait(mut self, grace: Duration) -> Result<(), ShutdownError> {
        self.cancel.cancel();

        let mut panicked = 0usize;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    error!(error = %e, "Relay node task panicked");
                    panicked += 1;
                }
            }
        })
        .await;

        if drained.is_err() {
            let pending = self.tasks.len();
            warn!(pending, ?grace, "Relay nodes did not stop in time, aborting");
            self.tasks.abort_all();
            return Err(ShutdownError::RelayTimeout { pending, grace });
        }
        if panicked > 0 {
            return Err(ShutdownError::RelayPanicked(panicked));
        }
        Ok(())
    }
}
