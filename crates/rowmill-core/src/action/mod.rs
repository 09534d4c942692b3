pub mod builtin;
pub mod context;
pub mod registry;

pub use context::{ActionContext, ActionState};
pub use registry::{ActionRegistry, ResolvedAction};

use crate::{
    error::{EngineError, ErrorDetail, ErrorKind, ErrorOrigin},
    row::{DataSetRow, RowMetadata},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Well-known parameter names shared by most actions.
///

pub mod params {
    /// Column the action operates on.
    pub const COLUMN_ID: &str = "column_id";
    /// Literal value parameter (compare value, fill value, ...).
    pub const VALUE: &str = "value";
    /// Whether the action writes into a freshly created column.
    pub const CREATE_NEW_COLUMN: &str = "create_new_column";
}

///
/// ParamValue
///
/// Action parameter payload. Parameters are part of a step's persisted
/// content, so the representation is stable and canonically ordered by
/// the enclosing map.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Flag(bool),
}

impl ParamValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Flag(_) => None,
        }
    }

    #[must_use]
    pub const fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

///
/// ActionDefinition
///
/// A named, parameterized unit of transformation as persisted inside a
/// step. Resolution to executable code happens through the
/// [`ActionRegistry`] at pipeline-build time.
///
/// Applying the same definition to the same input is deterministic; the
/// execution cache signature and diff reproducibility both rely on it.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl ActionDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    #[must_use]
    pub fn text_param(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(ParamValue::as_text)
    }

    #[must_use]
    pub fn flag_param(&self, name: &str, default: bool) -> bool {
        self.param(name).and_then(ParamValue::as_flag).unwrap_or(default)
    }

    /// The column this action is scoped to, when any.
    #[must_use]
    pub fn column_id(&self) -> Option<&str> {
        self.text_param(params::COLUMN_ID)
    }

    /// Rewrite the scoped column id (used by history edits when column
    /// ids shift after a step deletion).
    pub fn set_column_id(&mut self, column_id: impl Into<String>) {
        self.parameters
            .insert(params::COLUMN_ID.to_owned(), ParamValue::Text(column_id.into()));
    }
}

///
/// ActionError
///
/// Failure of one action on one row. Contained by the pipeline according
/// to the action's failure policy; never aborts the run.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Promote a contained failure into the engine taxonomy, e.g. when a
    /// caller wants to surface flagged rows as transport errors.
    #[must_use]
    pub fn into_engine(self, action: &str) -> EngineError {
        EngineError {
            kind: ErrorKind::ActionApplication,
            origin: ErrorOrigin::Action,
            message: format!("action '{action}' failed: {}", self.message),
            detail: Some(ErrorDetail::ActionFailure {
                action: action.to_owned(),
                message: self.message,
            }),
        }
    }
}

///
/// FailurePolicy
///
/// What the pipeline does with a row when this action fails on it.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Leave the row exactly as it was before the action ran.
    #[default]
    Passthrough,
    /// Keep the (possibly partially modified) row and mark it with a
    /// processing-error flag.
    FlagRow,
}

///
/// RowAction
///
/// Row-scoped executable form of an action: applied to each row in
/// stream order. `compile` runs once per pipeline build, before any row
/// is seen, and is the place to request derived columns.
///

pub trait RowAction: Send + Sync {
    fn compile(&self, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        let _ = ctx;
        Ok(())
    }

    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError>;
}

///
/// DatasetAction
///
/// Dataset-scoped executable form: a materializing pipeline stage that
/// consumes the full upstream output before producing anything. Output
/// order is whatever the action defines.
///

pub trait DatasetAction: Send + Sync {
    fn apply(
        &self,
        rows: Vec<DataSetRow>,
        metadata: &RowMetadata,
    ) -> Result<Vec<DataSetRow>, EngineError>;
}

///
/// ExecutableAction
///
/// Capability-tagged resolution of an action definition.
///

pub enum ExecutableAction {
    Row(Box<dyn RowAction>),
    Dataset(Box<dyn DatasetAction>),
}

impl std::fmt::Debug for ExecutableAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row(_) => f.write_str("ExecutableAction::Row"),
            Self::Dataset(_) => f.write_str("ExecutableAction::Dataset"),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_canonically_ordered() {
        let action = ActionDefinition::new("uppercase")
            .with_param("zebra", "z")
            .with_param("alpha", "a");

        let keys: Vec<&str> = action.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, ["alpha", "zebra"]);
    }

    #[test]
    fn typed_parameter_accessors() {
        let action = ActionDefinition::new("delete_on_value")
            .with_param(params::COLUMN_ID, "0001")
            .with_param("trim", true);

        assert_eq!(action.column_id(), Some("0001"));
        assert!(action.flag_param("trim", false));
        assert!(!action.flag_param("missing", false));
        assert_eq!(action.text_param("trim"), None);
    }

    #[test]
    fn action_error_converts_with_detail() {
        let err = ActionError::new("boom").into_engine("uppercase");
        assert_eq!(err.kind, ErrorKind::ActionApplication);
        assert!(matches!(err.detail, Some(ErrorDetail::ActionFailure { .. })));
    }
}
