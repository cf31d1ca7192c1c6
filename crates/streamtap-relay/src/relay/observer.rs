//! Test observers and their per-stream registration.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use streamtap_core::Tuple;

use crate::topology::ObservedStream;

/// Callback invoked once per tuple delivered to an observed stream.
///
/// Invoked from the relay node's task; keep it short and non-blocking.
pub trait StreamObserver: Send + Sync {
    fn on_tuple(&self, tuple: &Tuple);
}

impl<F> StreamObserver for F
where
    F: Fn(&Tuple) + Send + Sync,
{
    fn on_tuple(&self, tuple: &Tuple) {
        self(tuple);
    }
}

/// Observers registered for one stream.
pub type ObserverSet = Vec<Arc<dyn StreamObserver>>;

/// Observer registrations keyed by stream.
///
/// Streams keep the order in which they were first registered, which is
/// also the order in which they are connected to the sink.
#[derive(Default)]
pub struct StreamObservers {
    entries: Vec<(ObservedStream, ObserverSet)>,
}

impl StreamObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `stream`.
    pub fn observe<O>(&mut self, stream: &ObservedStream, observer: O) -> &mut Self
    where
        O: StreamObserver + 'static,
    {
        self.observe_shared(stream, Arc::new(observer))
    }

    /// Register an already shared observer, e.g. one the test keeps a
    /// handle to.
    ///
    /// Registering the same `Arc` twice for one stream is a no-op; each
    /// observer is invoked once per tuple.
    pub fn observe_shared(
        &mut self,
        stream: &ObservedStream,
        observer: Arc<dyn StreamObserver>,
    ) -> &mut Self {
        let set = self.entry(stream);
        if !set
            .iter()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&observer)))
        {
            set.push(observer);
        }
        self
    }

    /// Mention a stream without attaching anything. Streams with no
    /// observers are not wired.
    pub fn declare(&mut self, stream: &ObservedStream) -> &mut Self {
        self.entry(stream);
        self
    }

    fn entry(&mut self, stream: &ObservedStream) -> &mut ObserverSet {
        let index = match self.entries.iter().position(|(s, _)| s == stream) {
            Some(i) => i,
            None => {
                self.entries.push((stream.clone(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn observers(&self, stream: &ObservedStream) -> Option<&[Arc<dyn StreamObserver>]> {
        self.entries
            .iter()
            .find(|(s, _)| s == stream)
            .map(|(_, set)| set.as_slice())
    }

    /// Distinct streams mentioned, observed or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Streams with at least one observer, in registration order.
    pub fn into_observed(self) -> impl Iterator<Item = (ObservedStream, ObserverSet)> {
        self.entries.into_iter().filter(|(_, set)| !set.is_empty())
    }
}

/// Observer that records every tuple it sees.
#[derive(Debug)]
pub struct TupleCollector {
    tuples: Mutex<Vec<Tuple>>,
    count: watch::Sender<usize>,
}

impl Default for TupleCollector {
    fn default() -> Self {
        Self {
            tuples: Mutex::new(Vec::new()),
            count: watch::Sender::new(0),
        }
    }
}

impl TupleCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tuples seen so far, in delivery order.
    pub fn tuples(&self) -> Vec<Tuple> {
        self.tuples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        *self.count.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `n` tuples have been seen. Returns `false` on
    /// timeout.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|seen| *seen >= n)).await,
            Ok(Ok(_))
        )
    }
}

impl StreamObserver for TupleCollector {
    fn on_tuple(&self, tuple: &Tuple) {
        self.tuples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tuple.clone());
        self.count.send_modify(|n| *n += 1);
    }
}
