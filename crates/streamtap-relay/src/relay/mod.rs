//! Local relay graph.
//!
//! Data flow:
//! ```text
//! listener -> TupleInjector -> relay node input -> node task -> observers
//! ```
//!
//! One pass-through node per observed stream. The graph is declared with
//! [`RelayGraph`], frozen by [`RelayGraph::prepare`], and run by
//! [`PreparedRelayGraph::execute`].

mod executor;
mod graph;
mod observer;

pub use executor::RelayExecution;
pub use graph::{
    InjectError, PreparedRelayGraph, RelayGraph, RelayGraphError, RelayInput, RelayOutput,
    TupleInjector,
};
pub use observer::{ObserverSet, StreamObserver, StreamObservers, TupleCollector};
