use std::fmt;
use thiserror::Error as ThisError;

///
/// EngineError
///
/// Structured runtime error with a stable internal classification.
/// The service layer maps kinds to its own transport codes; the engine
/// only guarantees kind stability and enough context to do so.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `kind`.
    pub detail: Option<ErrorDetail>,
}

impl EngineError {
    /// Construct an EngineError with no structured detail.
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a not-found error for a step id missing from a chain or store.
    pub fn step_not_found(id: impl Into<String>) -> Self {
        Self::not_found(NotFoundEntity::Step, ErrorOrigin::Chain, id)
    }

    /// Construct a not-found error for a preparation id missing from the store.
    pub fn preparation_not_found(id: impl Into<String>) -> Self {
        Self::not_found(NotFoundEntity::Preparation, ErrorOrigin::Store, id)
    }

    /// Construct a not-found error for a column id missing from row metadata.
    pub fn column_not_found(id: impl Into<String>) -> Self {
        Self::not_found(NotFoundEntity::Column, ErrorOrigin::Pipeline, id)
    }

    /// Construct a not-found error for an action name unknown to the registry.
    pub fn unknown_action(name: impl Into<String>) -> Self {
        Self::not_found(NotFoundEntity::Action, ErrorOrigin::Action, name)
    }

    fn not_found(entity: NotFoundEntity, origin: ErrorOrigin, id: impl Into<String>) -> Self {
        let id = id.into();

        Self {
            kind: ErrorKind::NotFound,
            origin,
            message: format!("{entity} not found: {id}"),
            detail: Some(ErrorDetail::NotFound { entity, id }),
        }
    }

    /// Construct a chain-origin unsupported structural edit error.
    pub(crate) fn chain_unsupported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UnsupportedStructuralEdit,
            ErrorOrigin::Chain,
            message,
        )
    }

    /// Construct a concurrent-edit conflict on a preparation head.
    pub fn head_conflict(
        preparation_id: impl fmt::Display,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::new(
            ErrorKind::ConcurrentEdit,
            ErrorOrigin::Service,
            format!("preparation {preparation_id} head moved: expected {expected}, found {found}"),
        )
    }

    /// Construct a store-origin internal error.
    pub(crate) fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, ErrorOrigin::Store, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::ConcurrentEdit)
    }

    #[must_use]
    pub fn display_with_kind(&self) -> String {
        format!("{}:{}: {}", self.origin, self.kind, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, kind-specific error detail carried by [`EngineError`].
/// This enum is intentionally extensible.
///

#[derive(Clone, Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{entity} not found: {id}")]
    NotFound { entity: NotFoundEntity, id: String },

    #[error("action '{action}' failed: {message}")]
    ActionFailure { action: String, message: String },
}

///
/// NotFoundEntity
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotFoundEntity {
    Step,
    Preparation,
    Column,
    Action,
}

impl fmt::Display for NotFoundEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Step => "step",
            Self::Preparation => "preparation",
            Self::Column => "column",
            Self::Action => "action",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorKind
/// Stable error taxonomy surfaced to callers for transport mapping.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    InvalidFilter,
    ActionApplication,
    DateParse,
    ConcurrentEdit,
    UnsupportedStructuralEdit,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::InvalidFilter => "invalid_filter",
            Self::ActionApplication => "action_application",
            Self::DateParse => "date_parse",
            Self::ConcurrentEdit => "concurrent_edit",
            Self::UnsupportedStructuralEdit => "unsupported_structural_edit",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Filter,
    Action,
    Pipeline,
    Chain,
    Store,
    Date,
    Service,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Filter => "filter",
            Self::Action => "action",
            Self::Pipeline => "pipeline",
            Self::Chain => "chain",
            Self::Store => "store",
            Self::Date => "date",
            Self::Service => "service",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_detail() {
        let err = EngineError::step_not_found("a1b2");
        assert!(err.is_not_found());
        assert!(matches!(
            err.detail,
            Some(ErrorDetail::NotFound {
                entity: NotFoundEntity::Step,
                ..
            })
        ));
    }

    #[test]
    fn display_with_kind_is_origin_prefixed() {
        let err = EngineError::new(ErrorKind::Internal, ErrorOrigin::Pipeline, "boom");
        assert_eq!(err.display_with_kind(), "pipeline:internal: boom");
    }

    #[test]
    fn head_conflict_classifies_as_concurrent_edit() {
        let err = EngineError::head_conflict("p1", "aaaa", "bbbb");
        assert!(err.is_conflict());
        assert_eq!(err.origin, ErrorOrigin::Service);
    }
}
