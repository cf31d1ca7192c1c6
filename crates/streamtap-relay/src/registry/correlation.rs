//! In-memory correlation registry: tester id to relay input.
//!
//! Filled once while the runtime is being finalized, then sealed. After
//! sealing it is only read, concurrently, from the listener's connection
//! tasks. Entries are never replaced or removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info};

use streamtap_core::TesterId;

use crate::relay::TupleInjector;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tester id {0} is already registered")]
    Duplicate(TesterId),

    #[error("Registry is sealed; cannot register tester id {0}")]
    Sealed(TesterId),
}

/// Thread-safe map of tester ids to relay node injectors.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    entries: RwLock<HashMap<TesterId, TupleInjector>>,
    sealed: AtomicBool,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the delivery endpoint for `tester_id`.
    pub async fn register(
        &self,
        tester_id: TesterId,
        injector: TupleInjector,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().await;
        // Checked under the write lock so a concurrent seal cannot slip in.
        if self.sealed.load(Ordering::Acquire) {
            return Err(RegistryError::Sealed(tester_id));
        }
        if entries.contains_key(&tester_id) {
            return Err(RegistryError::Duplicate(tester_id));
        }
        let node = injector.node();
        entries.insert(tester_id, injector);
        drop(entries);
        debug!(tester_id, node, "Tester registered");
        Ok(())
    }

    /// Freeze the registry. Later registrations fail.
    pub async fn seal(&self) {
        let entries = self.entries.write().await;
        self.sealed.store(true, Ordering::Release);
        info!(testers = entries.len(), "Correlation registry sealed");
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Delivery endpoint for `tester_id`, if registered.
    pub async fn lookup(&self, tester_id: TesterId) -> Option<TupleInjector> {
        self.entries.read().await.get(&tester_id).cloned()
    }

    /// Registered tester ids in ascending order.
    pub async fn tester_ids(&self) -> Vec<TesterId> {
        let mut ids: Vec<_> = self.entries.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
