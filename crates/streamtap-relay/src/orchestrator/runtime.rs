//! The tester runtime.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use streamtap_core::{BridgeConfig, Envelope, TesterId};

use super::types::{LifecycleViolation, RuntimeState, SetupError, StreamTester};
use crate::listener::{DeliveryError, ListenerHandle, ListenerStats, TesterListener, TupleDispatcher};
use crate::registry::CorrelationRegistry;
use crate::relay::{ObserverSet, PreparedRelayGraph, RelayExecution, RelayGraph, StreamObservers};
use crate::shutdown::ShutdownError;
use crate::sink::{HostInfo, SinkWiring};
use crate::topology::{JobTopology, ObservedStream};

#[derive(Default)]
enum Phase {
    #[default]
    Uninitialized,
    Finalized {
        relay: PreparedRelayGraph,
        listener: ListenerHandle,
    },
    Running {
        execution: RelayExecution,
        listener: ListenerHandle,
    },
    Shutdown,
    Failed,
}

impl Phase {
    const fn state(&self) -> RuntimeState {
        match self {
            Self::Uninitialized => RuntimeState::Uninitialized,
            Self::Finalized { .. } => RuntimeState::Finalized,
            Self::Running { .. } => RuntimeState::Running,
            Self::Shutdown => RuntimeState::Shutdown,
            Self::Failed => RuntimeState::Failed,
        }
    }
}

/// Everything finalize produces, committed to the runtime only on success.
struct Wired {
    testers: Vec<StreamTester>,
    host_info: HostInfo,
    registry: Arc<CorrelationRegistry>,
    relay: PreparedRelayGraph,
    listener: ListenerHandle,
}

/// Bridges tuples from a remote job's tester sink to local observers.
///
/// Lifecycle: [`finalize`](Self::finalize) once, then [`start`](Self::start),
/// then [`shutdown`](Self::shutdown). Dropping the runtime cancels every
/// task it spawned.
pub struct TesterRuntime {
    id: Uuid,
    config: BridgeConfig,
    registry: Arc<CorrelationRegistry>,
    testers: Vec<StreamTester>,
    host_info: Option<HostInfo>,
    phase: Phase,
    cancel: CancellationToken,
}

impl TesterRuntime {
    pub fn new(config: BridgeConfig) -> Self {
        let id = Uuid::new_v4();
        info!(bridge_id = %id, "Tester runtime created");
        Self {
            id,
            config,
            registry: Arc::new(CorrelationRegistry::new()),
            testers: Vec::new(),
            host_info: None,
            phase: Phase::Uninitialized,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BridgeConfig::default())
    }

    /// Per-instance id, used to tell bridges apart in logs.
    pub const fn bridge_id(&self) -> Uuid {
        self.id
    }

    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub const fn state(&self) -> RuntimeState {
        self.phase.state()
    }

    /// Address published to the job-side sink, once finalized.
    pub const fn host_info(&self) -> Option<&HostInfo> {
        self.host_info.as_ref()
    }

    /// Wired streams in finalize order.
    pub fn testers(&self) -> &[StreamTester] {
        &self.testers
    }

    pub fn tester_id(&self, stream: &ObservedStream) -> Option<TesterId> {
        self.testers
            .iter()
            .find(|t| &t.stream == stream)
            .map(|t| t.tester_id)
    }

    pub const fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Listener counters while the listener is serving.
    pub fn listener_stats(&self) -> Option<ListenerStats> {
        match &self.phase {
            Phase::Finalized { listener, .. } | Phase::Running { listener, .. } => {
                Some(listener.stats())
            }
            _ => None,
        }
    }

    /// Wire every observed stream into `topology` and the local relay graph.
    ///
    /// Streams in `observers` with no observer attached are skipped. On
    /// success the listener is already accepting; tuples that arrive before
    /// [`start`](Self::start) are buffered in the relay node inputs. Any
    /// failure leaves the runtime `Failed` with the listener released. A
    /// second call fails without touching the runtime.
    ///
    /// Changes already made to `topology` are not rolled back: if a step
    /// after the sink was attached fails, the sink node and any stream
    /// connections made so far stay in the job graph. Discard the job graph
    /// after a failed finalize; nothing in it is wired to a live listener.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn finalize<T>(
        &mut self,
        topology: &mut T,
        observers: StreamObservers,
    ) -> Result<(), SetupError>
    where
        T: JobTopology + ?Sized,
    {
        let state = self.state();
        if state != RuntimeState::Uninitialized {
            warn!(bridge_id = %self.id, %state, "finalize called more than once");
            return Err(SetupError::AlreadyFinalized(state));
        }

        match self.wire(topology, observers).await {
            Ok(wired) => {
                info!(
                    bridge_id = %self.id,
                    testers = wired.testers.len(),
                    sink = %wired.host_info,
                    "Tester runtime finalized"
                );
                self.testers = wired.testers;
                self.host_info = Some(wired.host_info);
                self.registry = wired.registry;
                self.phase = Phase::Finalized {
                    relay: wired.relay,
                    listener: wired.listener,
                };
                Ok(())
            }
            Err(e) => {
                error!(bridge_id = %self.id, error = %e, "Tester runtime finalize failed");
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    async fn wire<T>(
        &self,
        topology: &mut T,
        observers: StreamObservers,
    ) -> Result<Wired, SetupError>
    where
        T: JobTopology + ?Sized,
    {
        self.config.validate().map_err(SetupError::Config)?;

        let observed: Vec<(ObservedStream, ObserverSet)> = observers.into_observed().collect();
        if observed.is_empty() {
            return Err(SetupError::NoObservedStreams);
        }

        let listener = TesterListener::bind(&self.config.listener)
            .await
            .map_err(SetupError::Bind)?;
        let host_info = HostInfo::for_listener(
            listener.local_addr(),
            self.config.listener.advertise_host.as_deref(),
        );
        let wiring = SinkWiring::attach(topology, host_info.clone())?;

        let mut relay = RelayGraph::new();
        let mut seen = HashSet::new();
        let mut testers = Vec::with_capacity(observed.len());
        for (stream, _) in &observed {
            let tester_id = wiring.connect(topology, stream)?;
            if !seen.insert(tester_id) {
                return Err(SetupError::DuplicateTesterId(tester_id));
            }
            let (input, output) = relay.add_relay(Arc::clone(stream.shared_schema()));
            testers.push(StreamTester {
                tester_id,
                stream: stream.clone(),
                input,
                output,
            });
        }

        let mut relay = relay.prepare(self.config.relay.channel_capacity)?;
        let registry = Arc::new(CorrelationRegistry::new());
        for (tester, (_, set)) in testers.iter().zip(observed) {
            for observer in set {
                relay.register_observer(tester.output, observer)?;
            }
            registry
                .register(tester.tester_id, relay.injector(tester.input)?)
                .await?;
        }
        registry.seal().await;

        let dispatcher = Arc::new(RuntimeDispatcher {
            registry: Arc::clone(&registry),
        });
        let listener = listener.serve(dispatcher, self.cancel.child_token());

        Ok(Wired {
            testers,
            host_info,
            registry,
            relay,
            listener,
        })
    }

    /// Start relaying tuples to observers. Returns immediately.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Panics
    ///
    /// If the runtime is not `Finalized`. The runtime is left unchanged.
    #[track_caller]
    pub fn start(&mut self) {
        match std::mem::take(&mut self.phase) {
            Phase::Finalized { relay, listener } => {
                let execution = relay.execute(self.cancel.child_token());
                self.phase = Phase::Running {
                    execution,
                    listener,
                };
                info!(bridge_id = %self.id, "Tester runtime started");
            }
            other => {
                self.phase = other;
                self.lifecycle_violation("start", RuntimeState::Finalized);
            }
        }
    }

    /// Stop the listener, then the relay graph, waiting for both.
    ///
    /// Envelopes the listener had read but not yet handed to a relay node
    /// are dropped. Once this returns no observer is invoked again.
    /// Failures of either half are collected; both halves are always
    /// attempted.
    ///
    /// # Panics
    ///
    /// If the runtime is not `Running`. The runtime is left unchanged.
    pub async fn shutdown(&mut self) -> Result<(), ShutdownError> {
        let (execution, listener) = match std::mem::take(&mut self.phase) {
            Phase::Running {
                execution,
                listener,
            } => (execution, listener),
            other => {
                self.phase = other;
                self.lifecycle_violation("shutdown", RuntimeState::Running);
            }
        };
        self.phase = Phase::Shutdown;

        let grace = self.config.relay.shutdown_grace();
        let mut failures = Vec::new();
        if let Err(e) = listener.shutdown(grace).await {
            failures.push(e);
        }
        if let Err(e) = execution.cancel_and_wait(grace).await {
            failures.push(e);
        }

        let result = ShutdownError::collect(failures);
        match &result {
            Ok(()) => info!(bridge_id = %self.id, "Tester runtime shut down"),
            Err(e) => warn!(bridge_id = %self.id, error = %e, "Tester runtime shut down uncleanly"),
        }
        result
    }

    #[track_caller]
    #[allow(clippy::panic)]
    fn lifecycle_violation(&self, operation: &'static str, expected: RuntimeState) -> ! {
        let violation = LifecycleViolation {
            operation,
            state: self.state(),
            expected,
        };
        error!(bridge_id = %self.id, %violation, "Lifecycle violation");
        panic!("{violation}");
    }
}

impl Drop for TesterRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TesterRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesterRuntime")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("host_info", &self.host_info)
            .field("testers", &self.testers.len())
            .finish_non_exhaustive()
    }
}

/// Routes decoded envelopes through the sealed registry.
struct RuntimeDispatcher {
    registry: Arc<CorrelationRegistry>,
}

impl TupleDispatcher for RuntimeDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        let Envelope { tester_id, tuple } = envelope;
        let injector = self
            .registry
            .lookup(tester_id)
            .await
            .ok_or(DeliveryError::UnknownTester(tester_id))?;
        injector
            .inject(tuple)
            .await
            .map_err(|_| DeliveryError::RelayClosed(tester_id))
    }
}
