use crate::{
    action::{ActionDefinition, ParamValue},
    chain::{PreparationId, StepId},
};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

const SIGNATURE_VERSION: u8 = 1;

///
/// ExecutionSignature
///
/// Stable cache key over (preparation id, head step id, canonical action
/// parameters). External dispatchers key at-most-one-concurrent-execution
/// and result caches on it; two executions with the same signature are
/// interchangeable because action application is deterministic.
///

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ExecutionSignature([u8; 16]);

impl ExecutionSignature {
    /// Compute the signature for one execution request.
    #[must_use]
    pub fn compute(
        preparation_id: &PreparationId,
        head_id: &StepId,
        actions: &[ActionDefinition],
    ) -> Self {
        let mut hasher = Xxh3::with_seed(0);
        hasher.update(&[SIGNATURE_VERSION]);
        hash_labeled_str(&mut hasher, "preparation_id", &preparation_id.to_string());
        hasher.update(head_id.as_bytes());

        hash_labeled_len(&mut hasher, "action_count", actions.len());
        for action in actions {
            hash_labeled_str(&mut hasher, "action_name", &action.name);
            hash_labeled_len(&mut hasher, "param_count", action.parameters.len());
            for (name, value) in &action.parameters {
                hash_labeled_str(&mut hasher, "param_name", name);
                match value {
                    ParamValue::Text(text) => hash_labeled_str(&mut hasher, "param_text", text),
                    ParamValue::Flag(flag) => hasher.update(&[0xf0, u8::from(*flag)]),
                }
            }
        }

        Self(hasher.digest128().to_be_bytes())
    }
}

impl fmt::Display for ExecutionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionSignature({self})")
    }
}

fn hash_labeled_str(hasher: &mut Xxh3, label: &str, value: &str) {
    hash_labeled_len(hasher, label, value.len());
    hasher.update(value.as_bytes());
}

fn hash_labeled_len(hasher: &mut Xxh3, label: &str, len: usize) {
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

    fn actions() -> Vec<ActionDefinition> {
        vec![
            ActionDefinition::new("uppercase")
                .with_param(params::COLUMN_ID, "0000")
                .with_param("zeta", "z"),
        ]
    }

    #[test]
    fn signature_is_stable_for_equal_inputs() {
        let preparation = PreparationId::generate();

        // parameter insertion order must not matter: the map is canonical
        let reordered = vec![
            ActionDefinition::new("uppercase")
                .with_param("zeta", "z")
                .with_param(params::COLUMN_ID, "0000"),
        ];

        let left = ExecutionSignature::compute(&preparation, &StepId::ROOT, &actions());
        let right = ExecutionSignature::compute(&preparation, &StepId::ROOT, &reordered);
        assert_eq!(left, right);
    }

    #[test]
    fn any_component_changes_the_signature() {
        let preparation = PreparationId::generate();
        let base = ExecutionSignature::compute(&preparation, &StepId::ROOT, &actions());

        let other_preparation =
            ExecutionSignature::compute(&PreparationId::generate(), &StepId::ROOT, &actions());
        assert_ne!(base, other_preparation);

        let other_head = ExecutionSignature::compute(
            &preparation,
            &StepId::from_bytes([1; 32]),
            &actions(),
        );
        assert_ne!(base, other_head);

        let other_actions = ExecutionSignature::compute(&preparation, &StepId::ROOT, &[]);
        assert_ne!(base, other_actions);
    }

    #[test]
    fn signature_renders_as_hex() {
        let signature =
            ExecutionSignature::compute(&PreparationId::generate(), &StepId::ROOT, &[]);
        let hex = signature.to_string();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
