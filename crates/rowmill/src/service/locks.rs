use rowmill_core::chain::PreparationId;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

///
/// LockRegistry
///
/// Per-preparation exclusive locks. Structural edits serialize on these
/// for the whole edit state machine, from target identification to head
/// publication. This is the seam where a distributed lock service would
/// plug in for multi-process deployments.
///

#[derive(Debug, Default)]
pub(crate) struct LockRegistry {
    locks: Mutex<HashMap<PreparationId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Fetch the lock for one preparation, creating it on first use.
    /// Locks are never pruned; one map entry per preparation is cheap
    /// next to the preparation itself.
    pub(crate) fn acquire(&self, id: PreparationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        Arc::clone(locks.entry(id).or_default())
    }
}

///
/// TESTS
///
