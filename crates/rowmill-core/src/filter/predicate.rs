use crate::{
    date::{DateParser, from_epoch_millis},
    filter::{Filter, FilterBuildError, pattern::CompliancePattern},
    row::{ColumnMetadata, DataSetRow, RowMetadata},
};
use chrono::NaiveDateTime;
use std::{collections::BTreeSet, sync::Arc};

///
/// RowPredicate
///
/// Compiled, evaluation-only form of a [`Filter`]. Column resolution,
/// full-dataset expansion, bound parsing, and type dispatch all happen
/// once at compile time; evaluation is infallible.
///

#[derive(Clone)]
pub struct RowPredicate {
    node: EvalNode,
}

impl RowPredicate {
    #[must_use]
    pub fn matches(&self, row: &DataSetRow) -> bool {
        eval(&self.node, row)
    }
}

impl std::fmt::Debug for RowPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowPredicate").finish_non_exhaustive()
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CompareOp {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

#[derive(Clone)]
enum EvalNode {
    True,
    And(Box<EvalNode>, Box<EvalNode>),
    Or(Box<EvalNode>, Box<EvalNode>),
    Not(Box<EvalNode>),
    Compare {
        column: String,
        op: CompareOp,
        value: String,
    },
    Contains {
        column: String,
        value_lower: String,
    },
    Matches {
        column: String,
        pattern: CompliancePattern,
    },
    Empty {
        column: String,
    },
    Valid {
        column: String,
        invalid_values: BTreeSet<String>,
    },
    Invalid {
        column: String,
        invalid_values: BTreeSet<String>,
    },
    NumberRange {
        column: String,
        low: f64,
        high: f64,
        lower_open: bool,
        upper_open: bool,
    },
    DateRange {
        column: ColumnMetadata,
        parser: Arc<dyn DateParser>,
        min: NaiveDateTime,
        max: NaiveDateTime,
        lower_open: bool,
        upper_open: bool,
    },
}

impl Filter {
    /// Compile this filter against row metadata into an executable
    /// predicate. Column-less value operations expand to an OR across
    /// every column; an expansion over empty metadata is neutral.
    pub fn compile(
        &self,
        metadata: &RowMetadata,
        date_parser: Arc<dyn DateParser>,
    ) -> Result<RowPredicate, FilterBuildError> {
        let node = compile_node(self, metadata, &date_parser)?;
        Ok(RowPredicate { node })
    }
}

fn compile_node(
    filter: &Filter,
    metadata: &RowMetadata,
    parser: &Arc<dyn DateParser>,
) -> Result<EvalNode, FilterBuildError> {
    match filter {
        Filter::True => Ok(EvalNode::True),
        Filter::And(left, right) => Ok(EvalNode::And(
            Box::new(compile_node(left, metadata, parser)?),
            Box::new(compile_node(right, metadata, parser)?),
        )),
        Filter::Or(left, right) => Ok(EvalNode::Or(
            Box::new(compile_node(left, metadata, parser)?),
            Box::new(compile_node(right, metadata, parser)?),
        )),
        Filter::Not(inner) => Ok(EvalNode::Not(Box::new(compile_node(
            inner, metadata, parser,
        )?))),
        Filter::Eq { column, value } => {
            expand(column, metadata, |id| compare(id, CompareOp::Eq, value))
        }
        Filter::Gt { column, value } => {
            expand(column, metadata, |id| compare(id, CompareOp::Gt, value))
        }
        Filter::Lt { column, value } => {
            expand(column, metadata, |id| compare(id, CompareOp::Lt, value))
        }
        Filter::Gte { column, value } => {
            expand(column, metadata, |id| compare(id, CompareOp::Gte, value))
        }
        Filter::Lte { column, value } => {
            expand(column, metadata, |id| compare(id, CompareOp::Lte, value))
        }
        Filter::Contains { column, value } => expand(column, metadata, |id| {
            Ok(EvalNode::Contains {
                column: id.to_owned(),
                value_lower: value.to_lowercase(),
            })
        }),
        Filter::Matches { column, pattern } => expand(column, metadata, |id| {
            Ok(EvalNode::Matches {
                column: id.to_owned(),
                pattern: CompliancePattern::compile(pattern),
            })
        }),
        Filter::Empty { column } => expand(column, metadata, |id| {
            Ok(EvalNode::Empty {
                column: id.to_owned(),
            })
        }),
        Filter::Valid { column } => expand(column, metadata, |id| {
            Ok(EvalNode::Valid {
                column: id.to_owned(),
                invalid_values: invalid_values(metadata, id),
            })
        }),
        Filter::Invalid { column } => expand(column, metadata, |id| {
            Ok(EvalNode::Invalid {
                column: id.to_owned(),
                invalid_values: invalid_values(metadata, id),
            })
        }),
        Filter::Range {
            column,
            start,
            end,
            lower_open,
            upper_open,
        } => expand(column, metadata, |id| {
            compile_range(id, metadata, parser, start, end, *lower_open, *upper_open)
        }),
    }
}

/// Expand an optional column reference: a concrete column compiles to a
/// single node, a column-less filter to an OR over every column.
fn expand(
    column: &Option<String>,
    metadata: &RowMetadata,
    mut build: impl FnMut(&str) -> Result<EvalNode, FilterBuildError>,
) -> Result<EvalNode, FilterBuildError> {
    match column {
        Some(id) => build(id),
        None => {
            let mut nodes = metadata
                .columns()
                .iter()
                .map(|column| build(&column.id))
                .collect::<Result<Vec<_>, _>>()?;

            // We can't return a null predicate, default to the neutral value.
            let Some(first) = nodes.pop() else {
                return Ok(EvalNode::True);
            };
            Ok(nodes
                .into_iter()
                .fold(first, |acc, node| EvalNode::Or(Box::new(node), Box::new(acc))))
        }
    }
}

fn compare(column: &str, op: CompareOp, value: &str) -> Result<EvalNode, FilterBuildError> {
    Ok(EvalNode::Compare {
        column: column.to_owned(),
        op,
        value: value.to_owned(),
    })
}

fn invalid_values(metadata: &RowMetadata, column_id: &str) -> BTreeSet<String> {
    metadata
        .column(column_id)
        .map(|column| column.quality.invalid_values.clone())
        .unwrap_or_default()
}

fn compile_range(
    column_id: &str,
    metadata: &RowMetadata,
    parser: &Arc<dyn DateParser>,
    start: &str,
    end: &str,
    lower_open: bool,
    upper_open: bool,
) -> Result<EvalNode, FilterBuildError> {
    let column = metadata
        .column(column_id)
        .ok_or_else(|| FilterBuildError::UnknownColumn {
            column: column_id.to_owned(),
        })?;

    if column.column_type.is_date() {
        // Date bounds arrive as epoch-millisecond timestamps.
        let min = start
            .parse::<i64>()
            .ok()
            .and_then(from_epoch_millis)
            .ok_or_else(|| FilterBuildError::MalformedRange {
                message: format!("expected timestamp bounds, got start '{start}'"),
            })?;
        let max = end
            .parse::<i64>()
            .ok()
            .and_then(from_epoch_millis)
            .ok_or_else(|| FilterBuildError::MalformedRange {
                message: format!("expected timestamp bounds, got end '{end}'"),
            })?;

        return Ok(EvalNode::DateRange {
            column: column.clone(),
            parser: Arc::clone(parser),
            min,
            max,
            lower_open,
            upper_open,
        });
    }

    // Assume the range is numeric; the column may still be typed as text
    // while holding numbers.
    let low = parse_number(start).ok_or_else(|| FilterBuildError::MalformedRange {
        message: format!("expected number bounds, got start '{start}'"),
    })?;
    let high = parse_number(end).ok_or_else(|| FilterBuildError::MalformedRange {
        message: format!("expected number bounds, got end '{end}'"),
    })?;

    Ok(EvalNode::NumberRange {
        column: column_id.to_owned(),
        low,
        high,
        lower_open,
        upper_open,
    })
}

fn eval(node: &EvalNode, row: &DataSetRow) -> bool {
    match node {
        EvalNode::True => true,
        EvalNode::And(left, right) => eval(left, row) && eval(right, row),
        EvalNode::Or(left, right) => eval(left, row) || eval(right, row),
        EvalNode::Not(inner) => !eval(inner, row),
        EvalNode::Compare { column, op, value } => eval_compare(row.get(column), *op, value),
        EvalNode::Contains { column, value_lower } => row
            .get(column)
            .is_some_and(|cell| cell.to_lowercase().contains(value_lower)),
        EvalNode::Matches { column, pattern } => {
            row.get(column).is_some_and(|cell| pattern.matches(cell))
        }
        EvalNode::Empty { column } => row.get(column).is_none_or(str::is_empty),
        EvalNode::Valid {
            column,
            invalid_values,
        } => row
            .get(column)
            .is_some_and(|cell| !cell.is_empty() && !invalid_values.contains(cell)),
        EvalNode::Invalid {
            column,
            invalid_values,
        } => row.get(column).is_some_and(|cell| invalid_values.contains(cell)),
        EvalNode::NumberRange {
            column,
            low,
            high,
            lower_open,
            upper_open,
        } => row.get(column).is_some_and(|cell| {
            parse_number(cell).is_some_and(|number| {
                in_bounds(number.partial_cmp(low), number.partial_cmp(high), *lower_open, *upper_open)
            })
        }),
        EvalNode::DateRange {
            column,
            parser,
            min,
            max,
            lower_open,
            upper_open,
        } => row.get(&column.id).is_some_and(|cell| {
            // Unparseable cells fall outside every date range.
            parser.parse(cell, column).ok().is_some_and(|date| {
                in_bounds(date.partial_cmp(min), date.partial_cmp(max), *lower_open, *upper_open)
            })
        }),
    }
}

fn in_bounds(
    against_low: Option<std::cmp::Ordering>,
    against_high: Option<std::cmp::Ordering>,
    lower_open: bool,
    upper_open: bool,
) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};

    let low_ok = match against_low {
        Some(Greater) => true,
        Some(Equal) => !lower_open,
        Some(Less) | None => false,
    };
    let high_ok = match against_high {
        Some(Less) => true,
        Some(Equal) => !upper_open,
        Some(Greater) | None => false,
    };

    low_ok && high_ok
}

/// Compare a cell against a literal: string equality first, numeric
/// comparison when both sides parse as numbers. Ordering operators are
/// numeric-only.
fn eval_compare(cell: Option<&str>, op: CompareOp, value: &str) -> bool {
    let Some(cell) = cell else {
        return false;
    };

    if op == CompareOp::Eq && cell == value {
        return true;
    }

    let (Some(left), Some(right)) = (parse_number(cell), parse_number(value)) else {
        return false;
    };

    match op {
        CompareOp::Eq => left == right,
        CompareOp::Gt => left > right,
        CompareOp::Lt => left < right,
        CompareOp::Gte => left >= right,
        CompareOp::Lte => left <= right,
    }
}

/// Parse a cell as a finite number, tolerating surrounding whitespace.
#[must_use]
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        date::PatternDateParser,
        row::{ColumnMetadata, ColumnType},
    };

    fn parser() -> Arc<dyn DateParser> {
        Arc::new(PatternDateParser::default())
    }

    fn metadata() -> RowMetadata {
        RowMetadata::new(vec![
            ColumnMetadata::new("0000", "name", ColumnType::Text),
            ColumnMetadata::new("0001", "amount", ColumnType::Integer),
        ])
    }

    fn compiled(json: &str) -> RowPredicate {
        Filter::parse(json)
            .unwrap()
            .compile(&metadata(), parser())
            .unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> DataSetRow {
        let mut row = DataSetRow::new();
        for (id, value) in pairs {
            row.set(*id, *value);
        }
        row
    }

    #[test]
    fn eq_tries_string_equality_then_numbers() {
        let predicate = compiled(r#"{"eq": {"field": "0001", "value": "10"}}"#);

        assert!(predicate.matches(&row(&[("0001", "10")])));
        assert!(predicate.matches(&row(&[("0001", "10.0")])));
        assert!(!predicate.matches(&row(&[("0001", "ten")])));
        assert!(!predicate.matches(&row(&[("0000", "10")])));
    }

    #[test]
    fn ordering_operators_are_numeric_only() {
        let predicate = compiled(r#"{"gt": {"field": "0001", "value": "5"}}"#);

        assert!(predicate.matches(&row(&[("0001", "5.5")])));
        assert!(!predicate.matches(&row(&[("0001", "5")])));
        assert!(!predicate.matches(&row(&[("0001", "abc")])));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let predicate = compiled(r#"{"contains": {"field": "0000", "value": "oWi"}}"#);
        assert!(predicate.matches(&row(&[("0000", "David Bowie")])));
        assert!(!predicate.matches(&row(&[("0000", "David")])));
    }

    #[test]
    fn number_range_is_lower_inclusive_upper_exclusive_by_default() {
        let predicate = compiled(r#"{"range": {"field": "0001", "start": "5", "end": "10"}}"#);

        assert!(predicate.matches(&row(&[("0001", "5")])));
        assert!(predicate.matches(&row(&[("0001", "9.999")])));
        assert!(!predicate.matches(&row(&[("0001", "10")])));
        assert!(!predicate.matches(&row(&[("0001", "not a number")])));
    }

    #[test]
    fn range_bound_overrides_flip_edge_membership() {
        let predicate = compiled(
            r#"{"range": {"field": "0001", "start": "5", "end": "10", "lowerOpen": true, "upperOpen": false}}"#,
        );

        assert!(!predicate.matches(&row(&[("0001", "5")])));
        assert!(predicate.matches(&row(&[("0001", "10")])));
    }

    #[test]
    fn date_range_dispatches_on_column_type() {
        let meta = RowMetadata::new(vec![
            ColumnMetadata::new("0000", "when", ColumnType::Date).with_date_pattern("yyyy-MM-dd"),
        ]);
        // [2015-01-01T00:00:00Z, 2016-01-01T00:00:00Z)
        let filter = Filter::parse(
            r#"{"range": {"field": "0000", "start": "1420070400000", "end": "1451606400000"}}"#,
        )
        .unwrap();
        let predicate = filter.compile(&meta, parser()).unwrap();

        assert!(predicate.matches(&row(&[("0000", "2015-06-15")])));
        assert!(!predicate.matches(&row(&[("0000", "2016-01-01")])));
        assert!(!predicate.matches(&row(&[("0000", "never")])));
    }

    #[test]
    fn range_on_unknown_column_fails_at_compile_time() {
        let filter =
            Filter::parse(r#"{"range": {"field": "0009", "start": "5", "end": "10"}}"#).unwrap();
        let err = filter.compile(&metadata(), parser()).unwrap_err();
        assert!(matches!(err, FilterBuildError::UnknownColumn { .. }));
    }

    #[test]
    fn combinators_compose() {
        let predicate = compiled(
            r#"{"and": [{"eq": {"field": "0000", "value": "Berlin"}}, {"not": {"eq": {"field": "0001", "value": "0"}}}]}"#,
        );

        assert!(predicate.matches(&row(&[("0000", "Berlin"), ("0001", "1")])));
        assert!(!predicate.matches(&row(&[("0000", "Berlin"), ("0001", "0")])));
    }

    #[test]
    fn column_less_filter_expands_over_all_columns() {
        let predicate = compiled(r#"{"contains": {"value": "bowie"}}"#);
        assert!(predicate.matches(&row(&[("0000", "David Bowie"), ("0001", "7")])));
        assert!(!predicate.matches(&row(&[("0000", "Iggy Pop"), ("0001", "7")])));
    }

    #[test]
    fn valid_and_invalid_use_column_quality() {
        let meta = RowMetadata::new(vec![
            ColumnMetadata::new("0000", "age", ColumnType::Integer).with_invalid_value("abc"),
        ]);
        let valid = Filter::parse(r#"{"valid": {"field": "0000"}}"#)
            .unwrap()
            .compile(&meta, parser())
            .unwrap();
        let invalid = Filter::parse(r#"{"invalid": {"field": "0000"}}"#)
            .unwrap()
            .compile(&meta, parser())
            .unwrap();

        assert!(valid.matches(&row(&[("0000", "42")])));
        assert!(!valid.matches(&row(&[("0000", "abc")])));
        assert!(!valid.matches(&row(&[("0000", "")])));
        assert!(invalid.matches(&row(&[("0000", "abc")])));
        assert!(!invalid.matches(&row(&[("0000", "42")])));
    }

    #[test]
    fn empty_matches_missing_and_blank_cells() {
        let predicate = compiled(r#"{"empty": {"field": "0000"}}"#);
        assert!(predicate.matches(&row(&[("0001", "5")])));
        assert!(predicate.matches(&row(&[("0000", "")])));
        assert!(!predicate.matches(&row(&[("0000", "x")])));
    }
}
