use crate::{
    chain::store::{PreparationStore, chain_from_store},
    error::EngineError,
};

///
/// MarkOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarkOutcome {
    Completed,
    /// A preparation changed while marking; pending marks must be
    /// discarded rather than swept against.
    Interrupted,
}

///
/// StepMarker
///
/// One marking strategy of the orphan-step sweep: stamp every step that
/// is still referenced with the current run marker. Steps left
/// unstamped are the sweep's removal candidates.
///

pub trait StepMarker: Send + Sync {
    fn mark(
        &self,
        store: &dyn PreparationStore,
        run_marker: &str,
        now_millis: i64,
    ) -> Result<MarkOutcome, EngineError>;
}

///
/// PreparationStepMarker
///
/// Marks every non-root step reachable from any preparation head. Backs
/// off whenever a preparation was modified within the quiet period, so
/// the sweep never races an active editing session.
///

#[derive(Clone, Copy, Debug)]
pub struct PreparationStepMarker {
    pub quiet_period_millis: i64,
}

impl Default for PreparationStepMarker {
    fn default() -> Self {
        Self {
            // one hour, matching the sweep cadence
            quiet_period_millis: 60 * 60 * 1000,
        }
    }
}

impl StepMarker for PreparationStepMarker {
    fn mark(
        &self,
        store: &dyn PreparationStore,
        run_marker: &str,
        now_millis: i64,
    ) -> Result<MarkOutcome, EngineError> {
        let quiet_after = now_millis - self.quiet_period_millis;
        if store.preparation_modified_since(quiet_after) {
            return Ok(MarkOutcome::Interrupted);
        }

        for preparation in store.list_preparations() {
            if store.preparation_modified_since(quiet_after) {
                return Ok(MarkOutcome::Interrupted);
            }

            let snapshot = chain_from_store(store, &preparation.head_id)?;
            let marked: Vec<_> = snapshot
                .steps()
                .iter()
                .filter(|step| !step.is_root())
                .map(|step| {
                    let mut step = (*step).clone();
                    step.set_marker(run_marker);
                    step
                })
                .collect();
            store.add_steps(marked);
        }

        Ok(MarkOutcome::Completed)
    }
}

///
/// CleanReport
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanReport {
    pub run_marker: String,
    pub removed_steps: usize,
    pub interrupted: bool,
}

/// Run one orphan-step sweep: every marker stamps the steps it still
/// considers referenced, then everything missing the current run marker
/// is removed. An interrupted marker discards the whole run — pending
/// marks from it must never be swept against.
pub fn remove_orphan_steps(
    store: &dyn PreparationStore,
    markers: &[&dyn StepMarker],
    run_marker: &str,
    now_millis: i64,
) -> Result<CleanReport, EngineError> {
    let mut interrupted = false;
    for marker in markers {
        if marker.mark(store, run_marker, now_millis)? == MarkOutcome::Interrupted {
            interrupted = true;
        }
    }

    let removed_steps = if interrupted {
        0
    } else {
        store.remove_steps_where(&|step| step.marker() != Some(run_marker))
    };

    Ok(CleanReport {
        run_marker: run_marker.to_owned(),
        removed_steps,
        interrupted,
    })
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::{ActionDefinition, params},
        chain::{
            preparation::Preparation,
            step::{Step, StepId, StepRowDiff},
            store::InMemoryPreparationStore,
        },
    };

    const HOUR: i64 = 60 * 60 * 1000;

    fn action(column: &str) -> ActionDefinition {
        ActionDefinition::new("uppercase").with_param(params::COLUMN_ID, column)
    }

    /// One preparation with a two-step chain plus one orphan step.
    fn seeded_store(modified_at: i64) -> (InMemoryPreparationStore, StepId) {
        let store = InMemoryPreparationStore::new();

        let first = Step::new(&StepId::ROOT, vec![action("0000")], StepRowDiff::default());
        let second = Step::new(first.id(), vec![action("0001")], StepRowDiff::default());
        let orphan = Step::new(&StepId::ROOT, vec![action("0009")], StepRowDiff::default());
        let orphan_id = *orphan.id();
        let head = *second.id();
        store.add_steps(vec![first, second, orphan]);

        let mut preparation = Preparation::new("p", "d", modified_at);
        preparation.rebase_head(head, modified_at);
        store.add_preparation(preparation);

        (store, orphan_id)
    }

    #[test]
    fn sweep_removes_only_unreferenced_steps() {
        let (store, orphan_id) = seeded_store(0);
        let marker = PreparationStepMarker::default();
        let markers: [&dyn StepMarker; 1] = [&marker];

        let report = remove_orphan_steps(&store, &markers, "run-1", 10 * HOUR).unwrap();

        assert!(!report.interrupted);
        assert_eq!(report.removed_steps, 1);
        assert!(store.get_step(&orphan_id).is_none());
        assert_eq!(store.step_count(), 2);
    }

    #[test]
    fn recent_modification_interrupts_the_sweep() {
        let now = 10 * HOUR;
        let (store, orphan_id) = seeded_store(now - HOUR / 2);
        let marker = PreparationStepMarker::default();
        let markers: [&dyn StepMarker; 1] = [&marker];

        let report = remove_orphan_steps(&store, &markers, "run-2", now).unwrap();

        assert!(report.interrupted);
        assert_eq!(report.removed_steps, 0);
        assert!(store.get_step(&orphan_id).is_some());
    }

    #[test]
    fn marking_stamps_referenced_steps_with_the_run() {
        let (store, _) = seeded_store(0);
        let marker = PreparationStepMarker::default();

        let outcome = marker.mark(&store, "run-3", 10 * HOUR).unwrap();
        assert_eq!(outcome, MarkOutcome::Completed);

        let marked = store
            .list_steps()
            .into_iter()
            .filter(|step| step.marker() == Some("run-3"))
            .count();
        assert_eq!(marked, 2);
    }
}
