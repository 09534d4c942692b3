use crate::{
    action::{ActionDefinition, ParamValue},
    chain::step::StepId,
};
use sha2::{Digest, Sha256};

/// Version tag for the step-id contract. Bump when the hashed layout
/// changes; old and new ids must never collide silently.
const STEP_ID_VERSION: &[u8] = b"stepid:v1";

/// Compute a step's content id.
///
/// The id is a pure function of (parent id, action list): same parent
/// and byte-identical actions always produce the same id, anything else
/// produces a different one. Maintenance markers and derived
/// created-column records are deliberately not part of the content.
#[must_use]
pub(crate) fn step_content_id(parent: &StepId, actions: &[ActionDefinition]) -> StepId {
    let mut hasher = Sha256::new();
    hasher.update(STEP_ID_VERSION);
    hasher.update(parent.as_bytes());

    write_len(&mut hasher, "action_count", actions.len());
    for action in actions {
        write_str(&mut hasher, &action.name);
        write_len(&mut hasher, "param_count", action.parameters.len());
        for (name, value) in &action.parameters {
            write_str(&mut hasher, name);
            match value {
                ParamValue::Text(text) => {
                    hasher.update([0x01]);
                    write_str(&mut hasher, text);
                }
                ParamValue::Flag(flag) => {
                    hasher.update([0x02, u8::from(*flag)]);
                }
            }
        }
    }

    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    StepId::from_bytes(out)
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_len(hasher, "str", value.len());
    hasher.update(value.as_bytes());
}

fn write_len(hasher: &mut Sha256, label: &str, len: usize) {
    hasher.update(label.as_bytes());
    hasher.update(&u64::try_from(len).unwrap_or(u64::MAX).to_be_bytes());
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::params;

    fn action(value: &str) -> ActionDefinition {
        ActionDefinition::new("uppercase")
            .with_param(params::COLUMN_ID, "0001")
            .with_param(params::VALUE, value)
    }

    #[test]
    fn same_parent_and_actions_hash_identically() {
        let left = step_content_id(&StepId::ROOT, &[action("x")]);
        let right = step_content_id(&StepId::ROOT, &[action("x")]);
        assert_eq!(left, right);
    }

    #[test]
    fn parent_actions_and_params_all_contribute() {
        let base = step_content_id(&StepId::ROOT, &[action("x")]);

        let other_parent = step_content_id(&base, &[action("x")]);
        assert_ne!(base, other_parent);

        let other_param = step_content_id(&StepId::ROOT, &[action("y")]);
        assert_ne!(base, other_param);

        let more_actions = step_content_id(&StepId::ROOT, &[action("x"), action("x")]);
        assert_ne!(base, more_actions);
    }

    #[test]
    fn empty_action_list_is_distinct_from_root() {
        let id = step_content_id(&StepId::ROOT, &[]);
        assert_ne!(id, StepId::ROOT);
    }
}
