//! Accept loop and per-connection envelope reader.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use streamtap_core::config::ListenerConfig;
use streamtap_core::envelope::decode_line;

use super::dispatch::{DeliveryError, TupleDispatcher};
use super::frame::{Frame, LineFramer};
use crate::shutdown::ShutdownError;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    dispatched: AtomicU64,
    delivery_misses: AtomicU64,
    relay_closed: AtomicU64,
    decode_errors: AtomicU64,
}

/// Point-in-time listener counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub connections: u64,
    pub dispatched: u64,
    /// Envelopes whose tester id had no registry entry.
    pub delivery_misses: u64,
    /// Envelopes whose relay node had already stopped.
    pub relay_closed: u64,
    pub decode_errors: u64,
}

impl Counters {
    fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            connections: self.connections.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivery_misses: self.delivery_misses.load(Ordering::Relaxed),
            relay_closed: self.relay_closed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// A bound but not yet serving listener.
///
/// Binding and serving are separate so the port can be published to the
/// sink before any envelope is read. Connections made in between wait in
/// the socket backlog.
pub struct TesterListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_envelope_bytes: usize,
}

impl TesterListener {
    /// Bind an ephemeral port on `config.bind_host`.
    pub async fn bind(config: &ListenerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind((config.bind_host.as_str(), 0)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Tester listener bound");
        Ok(Self {
            listener,
            local_addr,
            max_envelope_bytes: config.max_envelope_bytes,
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting connections, handing envelopes to `dispatcher`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn serve<D: TupleDispatcher>(
        self,
        dispatcher: Arc<D>,
        cancel: CancellationToken,
    ) -> ListenerHandle {
        let counters = Arc::new(Counters::default());
        let local_addr = self.local_addr;
        let task = tokio::spawn(accept_loop(
            self,
            dispatcher,
            cancel.clone(),
            Arc::clone(&counters),
        ));
        info!(addr = %local_addr, "Tester listener accepting");
        ListenerHandle {
            local_addr,
            cancel,
            task,
            counters,
        }
    }
}

/// Handle to a serving listener.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl ListenerHandle {
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ListenerStats {
        self.counters.snapshot()
    }

    /// Stop accepting, close every connection, and wait for the tasks.
    ///
    /// Lines already read but not yet dispatched are dropped.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), ShutdownError> {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {
                info!(addr = %self.local_addr, stats = ?self.stats(), "Tester listener stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Tester listener task failed");
                Err(ShutdownError::ListenerPanicked)
            }
            Err(_) => {
                warn!(?grace, "Tester listener did not stop in time, aborting");
                self.task.abort();
                Err(ShutdownError::ListenerTimeout(grace))
            }
        }
    }
}

async fn accept_loop<D: TupleDispatcher>(
    listener: TesterListener,
    dispatcher: Arc<D>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    let TesterListener {
        listener,
        max_envelope_bytes,
        ..
    } = listener;
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    error!(error = %e, "Sink connection task panicked");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    counters.connections.fetch_add(1, Ordering::Relaxed);
                    info!(peer = %peer, "Tester sink connected");
                    connections.spawn(read_envelopes(
                        stream,
                        peer,
                        Arc::clone(&dispatcher),
                        cancel.clone(),
                        Arc::clone(&counters),
                        max_envelope_bytes,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    // Stop accepting before waiting on connections.
    drop(listener);
    while connections.join_next().await.is_some() {}
    debug!("Accept loop finished");
}

async fn read_envelopes<D: TupleDispatcher>(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<D>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    max_envelope_bytes: usize,
) {
    let mut frames = LineFramer::new(BufReader::new(stream), max_envelope_bytes);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = frames.next_frame() => next,
        };
        match next {
            Ok(Frame::Line) => {}
            Ok(Frame::Oversized { len }) => {
                counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %peer, len, max = max_envelope_bytes, "Dropping oversized envelope");
                continue;
            }
            Ok(Frame::Eof) => {
                info!(peer = %peer, "Tester sink disconnected");
                break;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Read from tester sink failed");
                break;
            }
        }

        let line = match std::str::from_utf8(frames.line()) {
            Ok(line) => line,
            Err(e) => {
                counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %peer, error = %e, "Dropping envelope that is not UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let envelope = match decode_line(line, max_envelope_bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %peer, error = %e, "Dropping undecodable envelope");
                continue;
            }
        };
        let tester_id = envelope.tester_id;

        let delivered = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            delivered = dispatcher.dispatch(envelope) => delivered,
        };
        match delivered {
            Ok(()) => {
                counters.dispatched.fetch_add(1, Ordering::Relaxed);
                debug!(peer = %peer, tester_id, "Envelope dispatched");
            }
            Err(e @ DeliveryError::UnknownTester(_)) => {
                counters.delivery_misses.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %peer, tester_id, error = %e, "Delivery miss");
            }
            Err(e @ DeliveryError::RelayClosed(_)) => {
                counters.relay_closed.fetch_add(1, Ordering::Relaxed);
                warn!(peer = %peer, tester_id, error = %e, "Relay node closed, envelope dropped");
            }
        }
    }
}
