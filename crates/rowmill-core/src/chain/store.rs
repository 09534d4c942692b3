use crate::{
    chain::{
        editor::ChainSnapshot,
        preparation::{Preparation, PreparationId},
        step::{Step, StepId},
    },
    error::EngineError,
};
use std::{
    collections::HashMap,
    sync::Mutex,
};

///
/// PreparationStore
///
/// Narrow persistence contract consumed by the service layer and the
/// maintenance sweep: get/add/remove/exist/list over preparations and
/// steps. Additions are upserts; steps are content-addressed, so adding
/// an existing id is a no-op by value.
///

pub trait PreparationStore: Send + Sync {
    fn get_preparation(&self, id: &PreparationId) -> Option<Preparation>;
    fn add_preparation(&self, preparation: Preparation);
    fn remove_preparation(&self, id: &PreparationId);
    fn list_preparations(&self) -> Vec<Preparation>;

    fn get_step(&self, id: &StepId) -> Option<Step>;
    fn add_steps(&self, steps: Vec<Step>);
    /// Remove steps matching the predicate, returning how many went.
    fn remove_steps_where(&self, predicate: &dyn Fn(&Step) -> bool) -> usize;
    fn list_steps(&self) -> Vec<Step>;

    /// Whether any preparation was modified at or after the instant
    /// (epoch milliseconds).
    fn preparation_modified_since(&self, since_millis: i64) -> bool;
}

/// Resolve the chain for a head id by walking parent links to the root.
///
/// The root step itself is synthesized — stores only hold derived steps.
pub fn chain_from_store(
    store: &dyn PreparationStore,
    head_id: &StepId,
) -> Result<ChainSnapshot, EngineError> {
    let mut reversed = Vec::new();
    let mut current = *head_id;
    let stored_steps = store.list_steps().len();

    while !current.is_root() {
        let step = store
            .get_step(&current)
            .ok_or_else(|| EngineError::step_not_found(current.to_string()))?;
        let parent = *step
            .parent_id()
            .ok_or_else(|| EngineError::store_internal("non-root step without parent"))?;
        reversed.push(step);
        current = parent;

        // A content-addressed chain cannot cycle; a walk longer than the
        // store itself means corruption, not a long chain.
        if reversed.len() > stored_steps {
            return Err(EngineError::store_internal(format!(
                "chain for head {head_id} does not reach the root"
            )));
        }
    }

    let mut steps = vec![Step::root()];
    steps.extend(reversed.into_iter().rev());
    ChainSnapshot::new(steps)
}

///
/// InMemoryPreparationStore
///
/// Map-backed store for tests and single-process deployments.
///

#[derive(Debug, Default)]
pub struct InMemoryPreparationStore {
    preparations: Mutex<HashMap<PreparationId, Preparation>>,
    steps: Mutex<HashMap<StepId, Step>>,
}

impl InMemoryPreparationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.lock().expect("store poisoned").len()
    }
}

impl PreparationStore for InMemoryPreparationStore {
    fn get_preparation(&self, id: &PreparationId) -> Option<Preparation> {
        self.preparations.lock().expect("store poisoned").get(id).cloned()
    }

    fn add_preparation(&self, preparation: Preparation) {
        self.preparations
            .lock()
            .expect("store poisoned")
            .insert(preparation.id, preparation);
    }

    fn remove_preparation(&self, id: &PreparationId) {
        self.preparations.lock().expect("store poisoned").remove(id);
    }

    fn list_preparations(&self) -> Vec<Preparation> {
        self.preparations
            .lock()
            .expect("store poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn get_step(&self, id: &StepId) -> Option<Step> {
        self.steps.lock().expect("store poisoned").get(id).cloned()
    }

    fn add_steps(&self, steps: Vec<Step>) {
        let mut map = self.steps.lock().expect("store poisoned");
        for step in steps {
            map.insert(*step.id(), step);
        }
    }

    fn remove_steps_where(&self, predicate: &dyn Fn(&Step) -> bool) -> usize {
        let mut map = self.steps.lock().expect("store poisoned");
        let before = map.len();
        map.retain(|_, step| !predicate(step));
        before - map.len()
    }

    fn list_steps(&self) -> Vec<Step> {
        self.steps.lock().expect("store poisoned").values().cloned().collect()
    }

    fn preparation_modified_since(&self, since_millis: i64) -> bool {
        self.preparations
            .lock()
            .expect("store poisoned")
            .values()
            .any(|preparation| preparation.last_modified_at >= since_millis)
    }
}

///
/// TESTS
///
