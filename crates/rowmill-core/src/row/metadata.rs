use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Width of generated numeric column ids ("0000", "0001", ...).
pub(crate) const COLUMN_ID_WIDTH: usize = 4;

///
/// ColumnType
///
/// Declared type of a column, as supplied by the row source.
/// Drives range-predicate dispatch and action applicability; the engine
/// itself never infers types.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Double,
    Boolean,
    Date,
    Any,
}

impl ColumnType {
    #[must_use]
    pub const fn is_date(self) -> bool {
        matches!(self, Self::Date)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

///
/// ColumnQuality
///
/// Per-column quality statistics carried by the row source.
/// `invalid_values` backs the `valid`/`invalid` filter operations.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnQuality {
    pub valid: u64,
    pub invalid: u64,
    pub empty: u64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub invalid_values: BTreeSet<String>,
}

///
/// ColumnMetadata
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub quality: ColumnQuality,
    /// Date patterns in most-frequent-first order, as analyzed upstream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_patterns: Vec<String>,
}

impl ColumnMetadata {
    /// Construct a column with default quality and no date patterns.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type,
            quality: ColumnQuality::default(),
            date_patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_date_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_invalid_value(mut self, value: impl Into<String>) -> Self {
        self.quality.invalid_values.insert(value.into());
        self
    }
}

///
/// RowMetadata
///
/// Ordered column definitions for one dataset/preparation version.
/// Column order is the serialization order of emitted rows; ids are
/// stable across reorders. During a pipeline run, only the action
/// context may add columns here.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RowMetadata {
    columns: Vec<ColumnMetadata>,
}

impl RowMetadata {
    #[must_use]
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, id: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.column(id).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Next free generated column id, zero-padded to the canonical width.
    ///
    /// Non-numeric ids (from sources with named columns) are skipped when
    /// computing the next id, so generated ids never collide with them.
    #[must_use]
    pub fn next_column_id(&self) -> String {
        let next = self
            .columns
            .iter()
            .filter_map(|column| column.id.parse::<u64>().ok())
            .map(|id| id + 1)
            .max()
            .unwrap_or(0);

        format!("{next:0width$}", width = COLUMN_ID_WIDTH)
    }

    /// Append a column at the end of the ordered list.
    pub fn push(&mut self, column: ColumnMetadata) {
        self.columns.push(column);
    }

    /// Insert a column immediately after the column with id `anchor_id`.
    ///
    /// This is the placement contract of context-created columns: a derived
    /// column always lands right after the column that triggered it.
    pub fn insert_after(&mut self, anchor_id: &str, column: ColumnMetadata) -> Result<(), EngineError> {
        let position = self
            .columns
            .iter()
            .position(|existing| existing.id == anchor_id)
            .ok_or_else(|| EngineError::column_not_found(anchor_id))?;

        self.columns.insert(position + 1, column);
        Ok(())
    }

    /// Remove a column definition by id. Returns the removed column.
    pub fn remove(&mut self, id: &str) -> Result<ColumnMetadata, EngineError> {
        let position = self
            .columns
            .iter()
            .position(|existing| existing.id == id)
            .ok_or_else(|| EngineError::column_not_found(id))?;

        Ok(self.columns.remove(position))
    }
}

///
/// TESTS
///
