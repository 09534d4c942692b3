use crate::{
    action::{ActionDefinition, DatasetAction},
    error::EngineError,
    filter::predicate::parse_number,
    row::{DataSetRow, RowMetadata},
};
use std::cmp::Ordering;

pub const SORT_ACTION_NAME: &str = "sort";

/// Sort direction parameter: `asc` (default) or `desc`.
pub const ORDER_PARAMETER: &str = "order";

///
/// SortColumn
///
/// Dataset-scoped sort on one column. This is a materializing stage: it
/// buffers the entire upstream output, so downstream row order is the
/// sort order, not the input order. Numeric cells order before
/// non-numeric ones and compare by value; everything else compares
/// lexicographically. Missing cells compare as empty text. The sort is
/// stable.
///

#[derive(Clone, Debug)]
pub struct SortColumn {
    column_id: String,
    descending: bool,
}

impl SortColumn {
    #[must_use]
    pub fn new(column_id: impl Into<String>, descending: bool) -> Self {
        Self {
            column_id: column_id.into(),
            descending,
        }
    }

    /// Build from an action definition's parameters.
    pub fn from_definition(definition: &ActionDefinition) -> Result<Self, EngineError> {
        let column_id = definition
            .column_id()
            .ok_or_else(|| EngineError::column_not_found("<unset>"))?;
        let descending = definition.text_param(ORDER_PARAMETER) == Some("desc");

        Ok(Self::new(column_id, descending))
    }

    fn key<'row>(&self, row: &'row DataSetRow) -> SortKey<'row> {
        let cell = row.get(&self.column_id).unwrap_or_default();
        match parse_number(cell) {
            Some(number) => SortKey::Number(number),
            None => SortKey::Text(cell),
        }
    }

    fn compare(&self, left: &DataSetRow, right: &DataSetRow) -> Ordering {
        let ordering = self.key(left).cmp(&self.key(right));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

///
/// SortKey
///
/// Total order over cell values: finite numbers first (by value), then
/// text (lexicographic). `parse_number` only yields finite values, so
/// the ordering below is total.
///

#[derive(Debug, PartialEq)]
enum SortKey<'row> {
    Number(f64),
    Text(&'row str),
}

impl Eq for SortKey<'_> {}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => {
                left.partial_cmp(right).unwrap_or(Ordering::Equal)
            }
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl DatasetAction for SortColumn {
    fn apply(
        &self,
        mut rows: Vec<DataSetRow>,
        _metadata: &RowMetadata,
    ) -> Result<Vec<DataSetRow>, EngineError> {
        rows.sort_by(|left, right| self.compare(left, right));
        Ok(rows)
    }
}

///
/// TESTS
///
