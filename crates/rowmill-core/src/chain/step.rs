use crate::{action::ActionDefinition, chain::hash::step_content_id};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// StepId
///
/// 32-byte content hash identifying a step, rendered as lowercase hex.
/// The all-zero value is the well-known root sentinel; content hashing
/// cannot produce it in practice, so the root is unambiguous by
/// construction.
///

#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StepId([u8; 32]);

impl StepId {
    /// Sentinel id of the root step every chain ends at.
    pub const ROOT: Self = Self([0; 32]);

    #[must_use]
    pub(crate) const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({self})")
    }
}

///
/// ParseStepIdError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("invalid step id '{value}': expected 64 hex characters")]
pub struct ParseStepIdError {
    pub value: String,
}

impl FromStr for StepId {
    type Err = ParseStepIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseStepIdError {
            value: s.to_owned(),
        };

        if s.len() != 64 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = s.get(i * 2..i * 2 + 2).ok_or_else(invalid)?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

///
/// StepRowDiff
///
/// Derived per-step record of the columns its actions created, supplied
/// when the step is appended. Consulted by history edits (deleting a
/// step invalidates downstream references to these columns); not part of
/// the content hash.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StepRowDiff {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_columns: Vec<String>,
}

impl StepRowDiff {
    #[must_use]
    pub fn new(created_columns: Vec<String>) -> Self {
        Self { created_columns }
    }
}

///
/// Step
///
/// Immutable node in a preparation's history: one action list, a parent
/// reference toward the root, and a content-derived id. Steps are never
/// edited in place; history edits derive replacement steps with fresh
/// ids. The maintenance `marker` is the single annotation exempt from
/// immutability — it is bookkeeping, not content.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    id: StepId,
    parent: Option<StepId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    actions: Vec<ActionDefinition>,
    #[serde(default, skip_serializing_if = "step_diff_is_empty")]
    diff: StepRowDiff,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marker: Option<String>,
}

fn step_diff_is_empty(diff: &StepRowDiff) -> bool {
    diff.created_columns.is_empty()
}

impl Step {
    /// Derive a new step from its parent and action list.
    #[must_use]
    pub fn new(parent: &StepId, actions: Vec<ActionDefinition>, diff: StepRowDiff) -> Self {
        Self {
            id: step_content_id(parent, &actions),
            parent: Some(*parent),
            actions,
            diff,
            marker: None,
        }
    }

    /// The sentinel root step chains end at.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            id: StepId::ROOT,
            parent: None,
            actions: Vec::new(),
            diff: StepRowDiff {
                created_columns: Vec::new(),
            },
            marker: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &StepId {
        &self.id
    }

    /// Parent step id; `None` only for the root.
    #[must_use]
    pub const fn parent_id(&self) -> Option<&StepId> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    #[must_use]
    pub const fn diff(&self) -> &StepRowDiff {
        &self.diff
    }

    #[must_use]
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Maintenance annotation used by the orphan-step sweep.
    pub fn set_marker(&mut self, marker: impl Into<String>) {
        self.marker = Some(marker.into());
    }
}

///
/// TESTS
///
