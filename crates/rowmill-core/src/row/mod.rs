pub mod diff;
pub mod metadata;

pub use diff::{DiffFlag, EmittedRow, RowFlag};
pub use metadata::{ColumnMetadata, ColumnQuality, ColumnType, RowMetadata};

///
/// DataSetRow
///
/// One tabular record under transformation: an ordered mapping from
/// column id to string value, a deletion marker, and (during previews)
/// an exclusive link to the same row as produced by an older preparation
/// version. Rows are never persisted; only the emitted output stream is.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataSetRow {
    values: Vec<(String, String)>,
    deleted: bool,
    error: Option<String>,
    previous: Option<Box<DataSetRow>>,
}

impl DataSetRow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: Vec::new(),
            deleted: false,
            error: None,
            previous: None,
        }
    }

    /// Construct a row from (column id, value) pairs, preserving order.
    #[must_use]
    pub fn from_pairs(values: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: values.into_iter().collect(),
            deleted: false,
            error: None,
            previous: None,
        }
    }

    /// Set a column value, replacing in place or appending at the end.
    pub fn set(&mut self, column_id: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let column_id = column_id.into();
        let value = value.into();

        match self.values.iter_mut().find(|(id, _)| *id == column_id) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column_id, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, column_id: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, value)| value.as_str())
    }

    /// Remove a column value. Returns the removed value when present.
    pub fn remove(&mut self, column_id: &str) -> Option<String> {
        let position = self.values.iter().position(|(id, _)| id == column_id)?;
        Some(self.values.remove(position).1)
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub const fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Row-level processing-error marker set by the pipeline when a
    /// flag-row classified action fails on this row.
    #[must_use]
    pub fn processing_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_processing_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Record the prior version of this row for diff emission.
    ///
    /// The snapshot is owned exclusively by this row; it is consulted only
    /// by [`DataSetRow::values`] and [`DataSetRow::should_write`].
    pub fn diff(&mut self, previous: Self) {
        self.previous = Some(Box::new(previous));
    }

    #[must_use]
    pub fn previous(&self) -> Option<&Self> {
        self.previous.as_deref()
    }

    /// Ordered (column id, value) pairs, without diff interpretation.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.values
    }

    /// Reset the row to its just-created state.
    pub fn clear(&mut self) {
        self.values.clear();
        self.deleted = false;
        self.error = None;
        self.previous = None;
    }
}

///
/// TESTS
///
