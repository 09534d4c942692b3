use crate::{
    action::ActionDefinition,
    chain::step::{Step, StepId, StepRowDiff},
    error::{EngineError, ErrorKind, ErrorOrigin},
};
use std::collections::BTreeSet;

///
/// ChainSnapshot
///
/// Immutable view of one preparation's chain, root first, head last.
/// Structural edits are pure functions over a snapshot; publishing the
/// resulting rewrite (and racing other writers) is the caller's job.
///

#[derive(Clone, Debug)]
pub struct ChainSnapshot {
    steps: Vec<Step>,
}

impl ChainSnapshot {
    /// Validate and wrap an ordered root..head step list.
    pub fn new(steps: Vec<Step>) -> Result<Self, EngineError> {
        let Some(first) = steps.first() else {
            return Err(chain_invariant("chain snapshot is empty"));
        };
        if !first.is_root() {
            return Err(chain_invariant("chain snapshot must start at the root step"));
        }

        for pair in steps.windows(2) {
            if pair[1].parent_id() != Some(pair[0].id()) {
                return Err(chain_invariant(format!(
                    "step {} does not link to its predecessor {}",
                    pair[1].id(),
                    pair[0].id()
                )));
            }
        }

        Ok(Self { steps })
    }

    #[must_use]
    pub fn head_id(&self) -> &StepId {
        self.steps
            .last()
            .map_or(&StepId::ROOT, |step| step.id())
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Concatenated action list, root to head — the pipeline input.
    #[must_use]
    pub fn actions(&self) -> Vec<ActionDefinition> {
        self.steps
            .iter()
            .flat_map(|step| step.actions().iter().cloned())
            .collect()
    }
}

///
/// StepEdit
///
/// One structural operation on a chain.
///

#[derive(Clone, Debug)]
pub enum StepEdit {
    /// Append one step at the head.
    Append {
        actions: Vec<ActionDefinition>,
        created_columns: Vec<String>,
    },
    /// Replace the target step's action list.
    Update {
        step_id: StepId,
        actions: Vec<ActionDefinition>,
    },
    /// Remove the target step, dropping tail actions that referenced the
    /// columns it created and shifting later numeric column ids.
    Delete { step_id: StepId },
    /// Detach the target step and reinsert it right after `after`
    /// (`StepId::ROOT` moves it to the front), preserving the relative
    /// order of every other step.
    Move { step_id: StepId, after: StepId },
}

///
/// ChainRewrite
///
/// Result of an edit: the splice point (last retained step), the fresh
/// downstream steps to persist, and the new head. Existing steps are
/// never touched — other preparations may share them.
///

#[derive(Clone, Debug)]
pub struct ChainRewrite {
    pub parent_id: StepId,
    pub new_steps: Vec<Step>,
    pub head_id: StepId,
}

impl ChainRewrite {
    fn unchanged(head_id: StepId) -> Self {
        Self {
            parent_id: head_id,
            new_steps: Vec::new(),
            head_id,
        }
    }
}

///
/// RebuildUnit
///
/// Step content waiting to be re-chained: the action list plus the
/// created-column record that travels with it.
///

#[derive(Clone, Debug)]
struct RebuildUnit {
    actions: Vec<ActionDefinition>,
    diff: StepRowDiff,
}

impl RebuildUnit {
    fn of(step: &Step) -> Self {
        Self {
            actions: step.actions().to_vec(),
            diff: step.diff().clone(),
        }
    }
}

/// Apply one structural edit to a chain snapshot.
///
/// The returned rewrite leaves every existing step intact; downstream
/// steps of the edit point are re-derived with fresh content ids.
pub fn apply_edit(snapshot: &ChainSnapshot, edit: &StepEdit) -> Result<ChainRewrite, EngineError> {
    match edit {
        StepEdit::Append {
            actions,
            created_columns,
        } => {
            let step = Step::new(
                snapshot.head_id(),
                actions.clone(),
                StepRowDiff::new(created_columns.clone()),
            );
            Ok(ChainRewrite {
                parent_id: *snapshot.head_id(),
                head_id: *step.id(),
                new_steps: vec![step],
            })
        }
        StepEdit::Update { step_id, actions } => {
            let target = locate(snapshot, step_id)?;
            let steps = snapshot.steps();

            let mut units = vec![RebuildUnit {
                actions: actions.clone(),
                diff: steps[target].diff().clone(),
            }];
            units.extend(steps[target + 1..].iter().map(RebuildUnit::of));

            Ok(rebuild(*steps[target - 1].id(), units))
        }
        StepEdit::Delete { step_id } => {
            let target = locate(snapshot, step_id)?;
            let steps = snapshot.steps();

            let tail = steps[target + 1..].iter().map(RebuildUnit::of).collect();
            let units = adjust_after_delete(tail, &steps[target].diff().created_columns)?;

            Ok(rebuild(*steps[target - 1].id(), units))
        }
        StepEdit::Move { step_id, after } => {
            if step_id == after {
                return Err(EngineError::chain_unsupported(
                    "cannot move a step after itself",
                ));
            }
            let target = locate(snapshot, step_id)?;
            let steps = snapshot.steps();

            // Work in unit space: units[i] corresponds to steps[i + 1].
            let mut units: Vec<RebuildUnit> = steps[1..].iter().map(RebuildUnit::of).collect();
            let mut unit_ids: Vec<StepId> = steps[1..].iter().map(|step| *step.id()).collect();

            let moved = units.remove(target - 1);
            unit_ids.remove(target - 1);

            let insert_at = if after.is_root() {
                0
            } else {
                unit_ids
                    .iter()
                    .position(|id| id == after)
                    .ok_or_else(|| EngineError::step_not_found(after.to_string()))?
                    + 1
            };

            if insert_at == target - 1 {
                return Ok(ChainRewrite::unchanged(*snapshot.head_id()));
            }
            units.insert(insert_at, moved);

            // Everything before the first displaced unit is retained.
            let splice = insert_at.min(target - 1);
            Ok(rebuild(*steps[splice].id(), units.split_off(splice)))
        }
    }
}

/// IDENTIFY_TARGET: index of the edit target, rejecting the root.
fn locate(snapshot: &ChainSnapshot, step_id: &StepId) -> Result<usize, EngineError> {
    if step_id.is_root() {
        return Err(EngineError::chain_unsupported(
            "structural edits cannot target the root step",
        ));
    }

    snapshot
        .steps()
        .iter()
        .position(|step| step.id() == step_id)
        .ok_or_else(|| EngineError::step_not_found(step_id.to_string()))
}

/// REBUILD_CHAIN: derive one fresh step per unit, each parented on the
/// previously derived one.
fn rebuild(parent_id: StepId, units: Vec<RebuildUnit>) -> ChainRewrite {
    let mut new_steps = Vec::with_capacity(units.len());
    let mut parent = parent_id;

    for unit in units {
        let step = Step::new(&parent, unit.actions, unit.diff);
        parent = *step.id();
        new_steps.push(step);
    }

    ChainRewrite {
        parent_id,
        new_steps,
        head_id: parent,
    }
}

/// Drop tail actions that referenced columns created by the deleted step
/// and shift numeric column ids positioned after them.
fn adjust_after_delete(
    units: Vec<RebuildUnit>,
    created: &[String],
) -> Result<Vec<RebuildUnit>, EngineError> {
    let created_set: BTreeSet<&str> = created.iter().map(String::as_str).collect();
    let numerics: Vec<u64> = created
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect();
    let shift = u64::try_from(numerics.len()).unwrap_or(u64::MAX);
    let bounds = numerics
        .iter()
        .min()
        .copied()
        .zip(numerics.iter().max().copied());

    let mut out = Vec::with_capacity(units.len());
    for mut unit in units {
        let mut actions = Vec::with_capacity(unit.actions.len());
        for mut action in std::mem::take(&mut unit.actions) {
            let Some(column) = action.column_id().map(str::to_owned) else {
                actions.push(action);
                continue;
            };

            // The action's target no longer exists: the action is invalid.
            if created_set.contains(column.as_str()) {
                continue;
            }

            if let Some(shifted) = shifted_column(&column, bounds, shift)? {
                action.set_column_id(shifted);
            }
            actions.push(action);
        }

        // A step whose every action became invalid disappears entirely.
        if actions.is_empty() {
            continue;
        }
        unit.actions = actions;

        unit.diff.created_columns = std::mem::take(&mut unit.diff.created_columns)
            .into_iter()
            .map(|id| Ok(shifted_column(&id, bounds, shift)?.unwrap_or(id)))
            .collect::<Result<_, EngineError>>()?;

        out.push(unit);
    }

    Ok(out)
}

/// Shift one numeric column id past the deleted step's created range.
/// Ids inside the range that the deleted step did not create belong to a
/// different edit branch; refusing is safer than guessing.
fn shifted_column(
    column: &str,
    bounds: Option<(u64, u64)>,
    shift: u64,
) -> Result<Option<String>, EngineError> {
    let Some((min, max)) = bounds else {
        return Ok(None);
    };
    let Ok(numeric) = column.parse::<u64>() else {
        return Ok(None);
    };

    if numeric > max {
        let shifted = numeric - shift;
        return Ok(Some(format!("{shifted:0width$}", width = column.len())));
    }
    if numeric >= min {
        return Err(EngineError::chain_unsupported(format!(
            "column id {column} lies inside the deleted step's created range",
        )));
    }
    Ok(None)
}

fn chain_invariant(message: impl Into<String>) -> EngineError {
    EngineError::new(ErrorKind::Internal, ErrorOrigin::Chain, message)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::params;

    fn action(name: &str, column: &str) -> ActionDefinition {
        ActionDefinition::new(name).with_param(params::COLUMN_ID, column)
    }

    fn chain(specs: &[(&str, &str, &[&str])]) -> ChainSnapshot {
        let mut steps = vec![Step::root()];
        for (name, column, created) in specs {
            let parent = *steps.last().unwrap().id();
            steps.push(Step::new(
                &parent,
                vec![action(name, column)],
                StepRowDiff::new(created.iter().map(|c| (*c).to_owned()).collect()),
            ));
        }
        ChainSnapshot::new(steps).unwrap()
    }

    #[test]
    fn snapshot_rejects_broken_parent_links() {
        let stray = Step::new(&StepId::from_bytes([9; 32]), vec![], StepRowDiff::default());
        let err = ChainSnapshot::new(vec![Step::root(), stray]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn append_chains_on_the_head() {
        let snapshot = chain(&[("uppercase", "0000", &[])]);
        let rewrite = apply_edit(
            &snapshot,
            &StepEdit::Append {
                actions: vec![action("lowercase", "0001")],
                created_columns: vec![],
            },
        )
        .unwrap();

        assert_eq!(&rewrite.parent_id, snapshot.head_id());
        assert_eq!(rewrite.new_steps.len(), 1);
        assert_eq!(rewrite.new_steps[0].parent_id(), Some(snapshot.head_id()));
        assert_eq!(&rewrite.head_id, rewrite.new_steps[0].id());
    }

    #[test]
    fn update_rewrites_the_downstream_tail() {
        let snapshot = chain(&[
            ("uppercase", "0000", &[]),
            ("lowercase", "0001", &[]),
            ("delete_on_value", "0001", &[]),
        ]);
        let target = *snapshot.steps()[1].id();

        let rewrite = apply_edit(
            &snapshot,
            &StepEdit::Update {
                step_id: target,
                actions: vec![action("uppercase", "0001")],
            },
        )
        .unwrap();

        assert_eq!(rewrite.parent_id, StepId::ROOT);
        assert_eq!(rewrite.new_steps.len(), 3);
        // replacement content, same tail semantics, fresh ids everywhere
        assert_eq!(rewrite.new_steps[0].actions()[0].column_id(), Some("0001"));
        assert_eq!(rewrite.new_steps[1].actions()[0].name, "lowercase");
        assert_ne!(rewrite.new_steps[1].id(), snapshot.steps()[2].id());
        assert_eq!(&rewrite.head_id, rewrite.new_steps[2].id());
    }

    #[test]
    fn delete_drops_tail_actions_on_created_columns() {
        // [root, A(copy creates 0002), B(uppercase 0002)]
        let snapshot = chain(&[("copy", "0000", &["0002"]), ("uppercase", "0002", &[])]);
        let target = *snapshot.steps()[1].id();

        let rewrite = apply_edit(&snapshot, &StepEdit::Delete { step_id: target }).unwrap();

        // B referenced a column created by A: the whole tail evaporates
        assert_eq!(rewrite.parent_id, StepId::ROOT);
        assert!(rewrite.new_steps.is_empty());
        assert!(rewrite.head_id.is_root());
    }

    #[test]
    fn delete_shifts_later_numeric_column_ids() {
        let snapshot = chain(&[
            ("copy", "0000", &["0002"]),
            ("copy", "0001", &["0003"]),
            ("uppercase", "0003", &[]),
            ("uppercase", "0001", &[]),
        ]);
        let target = *snapshot.steps()[1].id();

        let rewrite = apply_edit(&snapshot, &StepEdit::Delete { step_id: target }).unwrap();

        assert_eq!(rewrite.new_steps.len(), 3);
        // the second copy's created column record shifts down with it
        assert_eq!(rewrite.new_steps[0].diff().created_columns, ["0002"]);
        // the action referencing 0003 follows the shift
        assert_eq!(rewrite.new_steps[1].actions()[0].column_id(), Some("0002"));
        // ids before the deleted step's created range stay put
        assert_eq!(rewrite.new_steps[2].actions()[0].column_id(), Some("0001"));
    }

    #[test]
    fn delete_refuses_foreign_ids_inside_the_created_range() {
        let snapshot = chain(&[
            ("copy", "0000", &["0002", "0004"]),
            ("uppercase", "0003", &[]),
        ]);
        let target = *snapshot.steps()[1].id();

        let err = apply_edit(&snapshot, &StepEdit::Delete { step_id: target }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedStructuralEdit);
    }

    #[test]
    fn move_up_reinserts_after_the_named_parent() {
        let snapshot = chain(&[
            ("uppercase", "0000", &[]),
            ("lowercase", "0000", &[]),
            ("copy", "0000", &[]),
        ]);
        let target = *snapshot.steps()[3].id();

        let rewrite = apply_edit(
            &snapshot,
            &StepEdit::Move {
                step_id: target,
                after: StepId::ROOT,
            },
        )
        .unwrap();

        assert_eq!(rewrite.parent_id, StepId::ROOT);
        let names: Vec<&str> = rewrite
            .new_steps
            .iter()
            .map(|step| step.actions()[0].name.as_str())
            .collect();
        assert_eq!(names, ["copy", "uppercase", "lowercase"]);
    }

    #[test]
    fn move_down_keeps_the_untouched_prefix() {
        let snapshot = chain(&[
            ("uppercase", "0000", &[]),
            ("lowercase", "0000", &[]),
            ("copy", "0000", &[]),
        ]);
        let target = *snapshot.steps()[1].id();
        let after = *snapshot.steps()[2].id();

        let rewrite = apply_edit(
            &snapshot,
            &StepEdit::Move {
                step_id: target,
                after,
            },
        )
        .unwrap();

        assert_eq!(rewrite.parent_id, StepId::ROOT);
        let names: Vec<&str> = rewrite
            .new_steps
            .iter()
            .map(|step| step.actions()[0].name.as_str())
            .collect();
        assert_eq!(names, ["lowercase", "uppercase", "copy"]);
    }

    #[test]
    fn move_to_current_position_is_a_no_op() {
        let snapshot = chain(&[("uppercase", "0000", &[]), ("lowercase", "0000", &[])]);
        let target = *snapshot.steps()[2].id();
        let after = *snapshot.steps()[1].id();

        let rewrite = apply_edit(
            &snapshot,
            &StepEdit::Move {
                step_id: target,
                after,
            },
        )
        .unwrap();

        assert!(rewrite.new_steps.is_empty());
        assert_eq!(&rewrite.head_id, snapshot.head_id());
    }

    #[test]
    fn edits_on_missing_or_root_steps_fail_cleanly() {
        let snapshot = chain(&[("uppercase", "0000", &[])]);

        let missing = StepId::from_bytes([5; 32]);
        let err = apply_edit(&snapshot, &StepEdit::Delete { step_id: missing }).unwrap_err();
        assert!(err.is_not_found());

        let err = apply_edit(&snapshot, &StepEdit::Delete { step_id: StepId::ROOT }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedStructuralEdit);

        let err = apply_edit(
            &snapshot,
            &StepEdit::Move {
                step_id: StepId::ROOT,
                after: *snapshot.head_id(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedStructuralEdit);
    }
}
