mod locks;
mod transform;

pub use transform::{TransformOptions, TransformService};

use chrono::Utc;
use locks::LockRegistry;
use rowmill_core::{
    action::ActionDefinition,
    chain::{
        CleanReport, Preparation, PreparationId, PreparationStepMarker, PreparationStore, Step,
        StepEdit, StepId, StepMarker, apply_edit, chain_from_store, remove_orphan_steps,
    },
    error::EngineError,
    signature::ExecutionSignature,
};
use std::sync::Arc;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

///
/// PreparationService
///
/// Operational surface over the step-chain engine: preparation
/// lifecycle, structural history edits under the per-preparation lock,
/// and the maintenance sweep. The core editor stays pure; this layer
/// owns locking, head compare-and-swap, and clock access.
///

pub struct PreparationService {
    store: Arc<dyn PreparationStore>,
    locks: LockRegistry,
}

impl PreparationService {
    #[must_use]
    pub fn new(store: Arc<dyn PreparationStore>) -> Self {
        Self {
            store,
            locks: LockRegistry::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PreparationStore> {
        &self.store
    }

    /// Create a preparation pointing at the root step.
    pub fn create(
        &self,
        name: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Preparation {
        let preparation = Preparation::new(name, dataset_id, now_millis());
        self.store.add_preparation(preparation.clone());
        preparation
    }

    pub fn get(&self, id: &PreparationId) -> Result<Preparation, EngineError> {
        self.store
            .get_preparation(id)
            .ok_or_else(|| EngineError::preparation_not_found(id.to_string()))
    }

    #[must_use]
    pub fn list(&self) -> Vec<Preparation> {
        self.store.list_preparations()
    }

    /// Delete the preparation record. Its steps stay behind until the
    /// next orphan sweep collects whatever no other head still reaches.
    pub fn remove(&self, id: &PreparationId) -> Result<(), EngineError> {
        self.get(id)?;
        self.store.remove_preparation(id);
        Ok(())
    }

    /// Steps from root to head.
    pub fn steps(&self, id: &PreparationId) -> Result<Vec<Step>, EngineError> {
        let preparation = self.get(id)?;
        let snapshot = chain_from_store(self.store.as_ref(), &preparation.head_id)?;
        Ok(snapshot.steps().to_vec())
    }

    /// Concatenated action list from root to head — the pipeline input.
    pub fn actions(&self, id: &PreparationId) -> Result<Vec<ActionDefinition>, EngineError> {
        let preparation = self.get(id)?;
        let snapshot = chain_from_store(self.store.as_ref(), &preparation.head_id)?;
        Ok(snapshot.actions())
    }

    /// Append one step at the head. `created_columns` records the column
    /// ids the appended actions introduce (see
    /// [`TransformService::created_columns`]); history edits rely on it.
    pub fn append_step(
        &self,
        id: &PreparationId,
        actions: Vec<ActionDefinition>,
        created_columns: Vec<String>,
    ) -> Result<StepId, EngineError> {
        self.edit(
            id,
            None,
            StepEdit::Append {
                actions,
                created_columns,
            },
        )
    }

    /// Replace a step's action list, rewriting the downstream chain.
    pub fn update_step(
        &self,
        id: &PreparationId,
        step_id: StepId,
        actions: Vec<ActionDefinition>,
        expected_head: &StepId,
    ) -> Result<StepId, EngineError> {
        self.edit(id, Some(expected_head), StepEdit::Update { step_id, actions })
    }

    /// Remove a step, dropping invalidated tail actions and shifting
    /// later column ids.
    pub fn delete_step(
        &self,
        id: &PreparationId,
        step_id: StepId,
        expected_head: &StepId,
    ) -> Result<StepId, EngineError> {
        self.edit(id, Some(expected_head), StepEdit::Delete { step_id })
    }

    /// Reinsert a step right after another one.
    pub fn move_step(
        &self,
        id: &PreparationId,
        step_id: StepId,
        after: StepId,
        expected_head: &StepId,
    ) -> Result<StepId, EngineError> {
        self.edit(id, Some(expected_head), StepEdit::Move { step_id, after })
    }

    /// Stable cache key for executing this preparation at its head.
    pub fn execution_signature(
        &self,
        id: &PreparationId,
    ) -> Result<ExecutionSignature, EngineError> {
        let preparation = self.get(id)?;
        let actions = self.actions(id)?;
        Ok(ExecutionSignature::compute(
            &preparation.id,
            &preparation.head_id,
            &actions,
        ))
    }

    /// Run one orphan-step sweep with the standard preparation marker.
    pub fn clean_orphan_steps(&self, run_marker: &str) -> Result<CleanReport, EngineError> {
        let marker = PreparationStepMarker::default();
        let markers: [&dyn StepMarker; 1] = [&marker];
        remove_orphan_steps(self.store.as_ref(), &markers, run_marker, now_millis())
    }

    /// The whole edit state machine runs under the preparation's
    /// exclusive lock; the head is re-read inside it, so `expected_head`
    /// only fails when the caller's view was already stale. Nothing is
    /// persisted on any failure path.
    fn edit(
        &self,
        id: &PreparationId,
        expected_head: Option<&StepId>,
        edit: StepEdit,
    ) -> Result<StepId, EngineError> {
        let lock = self.locks.acquire(*id);
        let _guard = lock.lock().expect("preparation lock poisoned");

        let mut preparation = self.get(id)?;
        if let Some(expected) = expected_head
            && *expected != preparation.head_id
        {
            return Err(EngineError::head_conflict(
                id,
                expected,
                preparation.head_id,
            ));
        }

        let snapshot = chain_from_store(self.store.as_ref(), &preparation.head_id)?;
        let rewrite = apply_edit(&snapshot, &edit)?;

        self.store.add_steps(rewrite.new_steps);
        preparation.rebase_head(rewrite.head_id, now_millis());
        self.store.add_preparation(preparation);

        Ok(rewrite.head_id)
    }
}

impl std::fmt::Debug for PreparationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparationService").finish_non_exhaustive()
    }
}

///
/// TESTS
///
