pub mod pattern;
pub mod predicate;

pub use predicate::RowPredicate;

use crate::error::{EngineError, ErrorKind, ErrorOrigin};
use serde_json::Value;
use thiserror::Error as ThisError;

///
/// FilterBuildError
///
/// Any malformed filter expression fails here, at build time. Predicate
/// evaluation itself is infallible.
///

#[derive(Clone, Debug, ThisError)]
pub enum FilterBuildError {
    #[error("malformed filter: {message}")]
    Malformed { message: String },

    #[error("unknown filter operation '{operation}'")]
    UnknownOperation { operation: String },

    #[error("filter operation '{operation}' needs a value")]
    MissingValue { operation: String },

    #[error("malformed '{operation}' (expected 2 children)")]
    MalformedCombinator { operation: String },

    #[error("malformed 'range': {message}")]
    MalformedRange { message: String },

    #[error("range filter references unknown column '{column}'")]
    UnknownColumn { column: String },
}

impl From<FilterBuildError> for EngineError {
    fn from(err: FilterBuildError) -> Self {
        Self::new(ErrorKind::InvalidFilter, ErrorOrigin::Filter, err.to_string())
    }
}

///
/// Filter
///
/// Parsed filter expression tree. A `column` of `None` means a
/// full-dataset filter: at compile time it expands to an OR over every
/// column of the row metadata.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    /// Matches every row (the empty filter).
    True,
    Eq { column: Option<String>, value: String },
    Gt { column: Option<String>, value: String },
    Lt { column: Option<String>, value: String },
    Gte { column: Option<String>, value: String },
    Lte { column: Option<String>, value: String },
    Contains { column: Option<String>, value: String },
    Matches { column: Option<String>, pattern: String },
    Empty { column: Option<String> },
    Valid { column: Option<String> },
    Invalid { column: Option<String> },
    Range {
        column: Option<String>,
        start: String,
        end: String,
        lower_open: bool,
        upper_open: bool,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Parse a filter expression from its JSON form.
    ///
    /// An empty input is the neutral filter. Every structural problem is
    /// reported here rather than at evaluation time.
    pub fn parse(filter: &str) -> Result<Self, FilterBuildError> {
        if filter.trim().is_empty() {
            return Ok(Self::True);
        }

        let root: Value = serde_json::from_str(filter).map_err(|err| FilterBuildError::Malformed {
            message: err.to_string(),
        })?;

        build_node(&root)
    }
}

fn build_node(node: &Value) -> Result<Filter, FilterBuildError> {
    let object = node.as_object().ok_or_else(|| FilterBuildError::Malformed {
        message: format!("expected an object node, got: {node}"),
    })?;

    let (operation, content) = object.iter().next().ok_or(FilterBuildError::Malformed {
        message: "empty filter definition".to_owned(),
    })?;

    let column = text_property(content, "field");
    let value = text_property(content, "value");

    match operation.as_str() {
        "eq" => Ok(Filter::Eq {
            column,
            value: require_value(operation, value)?,
        }),
        "gt" => Ok(Filter::Gt {
            column,
            value: require_value(operation, value)?,
        }),
        "lt" => Ok(Filter::Lt {
            column,
            value: require_value(operation, value)?,
        }),
        "gte" => Ok(Filter::Gte {
            column,
            value: require_value(operation, value)?,
        }),
        "lte" => Ok(Filter::Lte {
            column,
            value: require_value(operation, value)?,
        }),
        "contains" => Ok(Filter::Contains {
            column,
            value: require_value(operation, value)?,
        }),
        "matches" => Ok(Filter::Matches {
            column,
            pattern: require_value(operation, value)?,
        }),
        "empty" => Ok(Filter::Empty { column }),
        "valid" => Ok(Filter::Valid { column }),
        "invalid" => Ok(Filter::Invalid { column }),
        "range" => build_range(content, column),
        "and" => {
            let (left, right) = binary_children(operation, content)?;
            Ok(Filter::And(Box::new(left), Box::new(right)))
        }
        "or" => {
            let (left, right) = binary_children(operation, content)?;
            Ok(Filter::Or(Box::new(left), Box::new(right)))
        }
        "not" => {
            if !content.is_object() || content.as_object().is_some_and(serde_json::Map::is_empty) {
                return Err(FilterBuildError::MalformedCombinator {
                    operation: "not".to_owned(),
                });
            }
            Ok(Filter::Not(Box::new(build_node(content)?)))
        }
        other => Err(FilterBuildError::UnknownOperation {
            operation: other.to_owned(),
        }),
    }
}

fn build_range(content: &Value, column: Option<String>) -> Result<Filter, FilterBuildError> {
    let start = text_property(content, "start").ok_or_else(|| FilterBuildError::MalformedRange {
        message: "missing 'start' bound".to_owned(),
    })?;
    let end = text_property(content, "end").ok_or_else(|| FilterBuildError::MalformedRange {
        message: "missing 'end' bound".to_owned(),
    })?;

    // [start, end) unless a bound is explicitly overridden.
    let lower_open = content
        .get("lowerOpen")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let upper_open = content
        .get("upperOpen")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    Ok(Filter::Range {
        column,
        start,
        end,
        lower_open,
        upper_open,
    })
}

fn binary_children(operation: &str, content: &Value) -> Result<(Filter, Filter), FilterBuildError> {
    let children = content.as_array().ok_or_else(|| FilterBuildError::MalformedCombinator {
        operation: operation.to_owned(),
    })?;

    if children.len() != 2 {
        return Err(FilterBuildError::MalformedCombinator {
            operation: operation.to_owned(),
        });
    }

    Ok((build_node(&children[0])?, build_node(&children[1])?))
}

fn require_value(operation: &str, value: Option<String>) -> Result<String, FilterBuildError> {
    value.ok_or_else(|| FilterBuildError::MissingValue {
        operation: operation.to_owned(),
    })
}

/// Read a textual property, accepting strings, numbers, and booleans the
/// way the wire format does.
fn text_property(content: &Value, name: &str) -> Option<String> {
    match content.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

///
/// TESTS
///
