use crate::chain::step::StepId;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ulid::Ulid;

///
/// PreparationId
///

#[derive(Clone, Copy, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PreparationId(Ulid);

impl PreparationId {
    /// Generate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for PreparationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for PreparationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreparationId({})", self.0)
    }
}

impl FromStr for PreparationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

///
/// Preparation
///
/// Named entity owning the mutable head pointer into a step chain. The
/// head is the only structurally mutable field; everything it points at
/// is immutable and shareable across preparations.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Preparation {
    pub id: PreparationId,
    pub name: String,
    pub dataset_id: String,
    pub head_id: StepId,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, updated on every head move and rename.
    pub last_modified_at: i64,
}

impl Preparation {
    /// Create a preparation pointing at the root step.
    #[must_use]
    pub fn new(name: impl Into<String>, dataset_id: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: PreparationId::generate(),
            name: name.into(),
            dataset_id: dataset_id.into(),
            head_id: StepId::ROOT,
            created_at: now_millis,
            last_modified_at: now_millis,
        }
    }

    /// Move the head and record the modification time.
    pub fn rebase_head(&mut self, head_id: StepId, now_millis: i64) {
        self.head_id = head_id;
        self.last_modified_at = now_millis;
    }
}

///
/// TESTS
///
