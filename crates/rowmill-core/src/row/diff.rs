use crate::row::DataSetRow;
use serde::{Deserialize, Serialize};

///
/// RowFlag
///
/// Row-level diff marker. A row is NEW when it exists only in the newer
/// version, DELETE when it exists only in the older one. Value-level
/// changes never flag the whole row.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFlag {
    New,
    Delete,
}

///
/// DiffFlag
///
/// Column-level diff marker between two versions of the same row.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffFlag {
    New,
    Update,
    Delete,
}

///
/// EmittedRow
///
/// Sink-facing projection of a row: ordered values, an optional
/// row-level flag, and per-column diff flags when a previous version
/// was recorded. Columns deleted between versions are restored into
/// `values` so the removed content remains visible in diff output.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EmittedRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<RowFlag>,
    pub values: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_diffs: Vec<(String, DiffFlag)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmittedRow {
    #[must_use]
    pub fn diff_for(&self, column_id: &str) -> Option<DiffFlag> {
        self.column_diffs
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, flag)| *flag)
    }

    #[must_use]
    pub fn value(&self, column_id: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, value)| value.as_str())
    }
}

impl DataSetRow {
    /// Project this row for emission, applying the diff rules against the
    /// recorded previous version (when any).
    ///
    /// - no previous: current values verbatim, no flags;
    /// - previous deleted, current alive: row flagged NEW, current values;
    /// - previous alive, current deleted: row flagged DELETE, previous
    ///   values (deleted content stays visible);
    /// - otherwise: per-column NEW/UPDATE/DELETE flags, with deleted
    ///   columns restored into the output after the surviving values.
    #[must_use]
    pub fn values(&self) -> EmittedRow {
        let Some(previous) = self.previous() else {
            return EmittedRow {
                flag: None,
                values: self.pairs().to_vec(),
                column_diffs: Vec::new(),
                error: self.processing_error().map(str::to_owned),
            };
        };

        if previous.is_deleted() && !self.is_deleted() {
            return EmittedRow {
                flag: Some(RowFlag::New),
                values: self.pairs().to_vec(),
                column_diffs: Vec::new(),
                error: self.processing_error().map(str::to_owned),
            };
        }

        if !previous.is_deleted() && self.is_deleted() {
            return EmittedRow {
                flag: Some(RowFlag::Delete),
                values: previous.pairs().to_vec(),
                column_diffs: Vec::new(),
                error: self.processing_error().map(str::to_owned),
            };
        }

        let mut values = self.pairs().to_vec();
        let mut column_diffs = Vec::new();

        for (id, value) in self.pairs() {
            match previous.get(id) {
                None => column_diffs.push((id.clone(), DiffFlag::New)),
                Some(old) if old != value => column_diffs.push((id.clone(), DiffFlag::Update)),
                Some(_) => {}
            }
        }

        // Columns present only in the previous version are restored so the
        // removed content is still shown, flagged DELETE.
        for (id, value) in previous.pairs() {
            if self.get(id).is_none() {
                values.push((id.clone(), value.clone()));
                column_diffs.push((id.clone(), DiffFlag::Delete));
            }
        }

        EmittedRow {
            flag: None,
            values,
            column_diffs,
            error: self.processing_error().map(str::to_owned),
        }
    }

    /// Sink filter: whether this row belongs in the output stream.
    ///
    /// Without a previous version, deleted rows are dropped. With one,
    /// only a row deleted in both versions produces no output.
    #[must_use]
    pub fn should_write(&self) -> bool {
        match self.previous() {
            None => !self.is_deleted(),
            Some(previous) => !(previous.is_deleted() && self.is_deleted()),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> DataSetRow {
        DataSetRow::from_pairs(
            pairs
                .iter()
                .map(|(id, v)| ((*id).to_owned(), (*v).to_owned())),
        )
    }

    #[test]
    fn values_without_previous_are_verbatim() {
        let r = row(&[("0000", "a"), ("0001", "b")]);
        let emitted = r.values();

        assert_eq!(emitted.flag, None);
        assert!(emitted.column_diffs.is_empty());
        assert_eq!(emitted.value("0000"), Some("a"));
        assert_eq!(emitted.value("0001"), Some("b"));
    }

    #[test]
    fn undeleted_row_is_flagged_new_with_current_values() {
        let mut old = row(&[("0000", "old")]);
        old.set_deleted(true);

        let mut new = row(&[("0000", "new")]);
        new.diff(old);

        let emitted = new.values();
        assert_eq!(emitted.flag, Some(RowFlag::New));
        assert_eq!(emitted.value("0000"), Some("new"));
    }

    #[test]
    fn deleted_row_is_flagged_delete_with_previous_values() {
        let old = row(&[("0000", "old")]);

        let mut new = row(&[("0000", "new")]);
        new.set_deleted(true);
        new.diff(old);

        let emitted = new.values();
        assert_eq!(emitted.flag, Some(RowFlag::Delete));
        assert_eq!(emitted.value("0000"), Some("old"));
    }

    #[test]
    fn per_column_diff_flags_new_update_delete() {
        let old = row(&[("0000", "same"), ("0001", "before"), ("0002", "dropped")]);

        let mut new = row(&[("0000", "same"), ("0001", "after"), ("0003", "fresh")]);
        new.diff(old);

        let emitted = new.values();
        assert_eq!(emitted.flag, None);
        assert_eq!(emitted.diff_for("0000"), None);
        assert_eq!(emitted.diff_for("0001"), Some(DiffFlag::Update));
        assert_eq!(emitted.diff_for("0003"), Some(DiffFlag::New));
        assert_eq!(emitted.diff_for("0002"), Some(DiffFlag::Delete));
        // the deleted column's value is restored into the output
        assert_eq!(emitted.value("0002"), Some("dropped"));
    }

    #[test]
    fn should_write_matrix() {
        let alive = row(&[("0000", "a")]);
        assert!(alive.should_write());

        let mut deleted = row(&[("0000", "a")]);
        deleted.set_deleted(true);
        assert!(!deleted.should_write());

        // deleted in the new version only: still written (as a DELETE row)
        let mut new_deleted = row(&[("0000", "a")]);
        new_deleted.set_deleted(true);
        new_deleted.diff(row(&[("0000", "a")]));
        assert!(new_deleted.should_write());

        // deleted in both versions: no output at all
        let mut both = row(&[("0000", "a")]);
        both.set_deleted(true);
        let mut old = row(&[("0000", "a")]);
        old.set_deleted(true);
        both.diff(old);
        assert!(!both.should_write());
    }
}
