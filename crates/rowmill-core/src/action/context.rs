use crate::{
    action::ActionDefinition,
    error::EngineError,
    row::{ColumnMetadata, RowMetadata},
};
use std::collections::BTreeMap;

///
/// ActionState
///
/// Per-(action, pipeline-run) mutable state: the action's definition,
/// the memo of columns it created, and an action-local key/value store.
/// Lives for the whole run; the per-call [`ActionContext`] borrows it
/// together with the shared row metadata.
///

#[derive(Debug, Default)]
pub struct ActionState {
    definition: ActionDefinition,
    /// Logical column name -> created column id, memoized per run.
    created: BTreeMap<String, String>,
    /// Created column ids in creation order.
    created_ids: Vec<String>,
    store: BTreeMap<String, String>,
}

impl ActionState {
    #[must_use]
    pub fn new(definition: ActionDefinition) -> Self {
        Self {
            definition,
            created: BTreeMap::new(),
            created_ids: Vec::new(),
            store: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    /// Column ids created by this action during the run, in creation order.
    #[must_use]
    pub fn created_column_ids(&self) -> &[String] {
        &self.created_ids
    }
}

///
/// ActionContext
///
/// Borrowed execution view handed to an action: its own state plus the
/// shared row metadata. This is the only place allowed to add column
/// definitions while a pipeline runs; all row value mutations stay in
/// the action's `apply` body.
///

#[derive(Debug)]
pub struct ActionContext<'run> {
    state: &'run mut ActionState,
    metadata: &'run mut RowMetadata,
}

impl<'run> ActionContext<'run> {
    #[must_use]
    pub fn new(state: &'run mut ActionState, metadata: &'run mut RowMetadata) -> Self {
        Self { state, metadata }
    }

    /// The column this action is scoped to, when any.
    #[must_use]
    pub fn column_id(&self) -> Option<&str> {
        self.state.definition.column_id()
    }

    #[must_use]
    pub fn definition(&self) -> &ActionDefinition {
        self.state.definition()
    }

    #[must_use]
    pub fn text_param(&self, name: &str) -> Option<&str> {
        self.state.definition.text_param(name)
    }

    #[must_use]
    pub fn flag_param(&self, name: &str, default: bool) -> bool {
        self.state.definition.flag_param(name, default)
    }

    #[must_use]
    pub fn metadata(&self) -> &RowMetadata {
        self.metadata
    }

    /// Resolve (or lazily create) a derived column.
    ///
    /// The supplier runs exactly once per distinct logical name for the
    /// whole run; later calls return the memoized id. New columns are
    /// registered into the shared metadata immediately after the
    /// triggering column, or appended when the action has no scope
    /// column.
    pub fn column(
        &mut self,
        name: &str,
        supplier: impl FnOnce(&str) -> ColumnMetadata,
    ) -> Result<String, EngineError> {
        if let Some(existing) = self.state.created.get(name) {
            return Ok(existing.clone());
        }

        let id = self.metadata.next_column_id();
        let mut column = supplier(&id);
        column.id = id.clone();

        match self.column_id().map(str::to_owned) {
            Some(anchor) => self.metadata.insert_after(&anchor, column)?,
            None => self.metadata.push(column),
        }

        self.state.created.insert(name.to_owned(), id.clone());
        self.state.created_ids.push(id.clone());
        Ok(id)
    }

    /// Action-local key/value store, scoped to this run.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.state.store.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.store.insert(key.into(), value.into());
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::params,
        row::{ColumnMetadata, ColumnType},
    };

    fn metadata() -> RowMetadata {
        RowMetadata::new(vec![
            ColumnMetadata::new("0000", "name", ColumnType::Text),
            ColumnMetadata::new("0001", "city", ColumnType::Text),
        ])
    }

    #[test]
    fn column_is_created_once_and_memoized() {
        let mut state = ActionState::new(
            ActionDefinition::new("uppercase").with_param(params::COLUMN_ID, "0000"),
        );
        let mut meta = metadata();
        let mut calls = 0;

        for _ in 0..3 {
            let mut ctx = ActionContext::new(&mut state, &mut meta);
            let id = ctx
                .column("name_upper", |id| {
                    calls += 1;
                    ColumnMetadata::new(id, "name_upper", ColumnType::Text)
                })
                .unwrap();
            assert_eq!(id, "0002");
        }

        assert_eq!(calls, 1);
        assert_eq!(state.created_column_ids(), ["0002".to_owned()]);
    }

    #[test]
    fn created_column_lands_after_the_trigger_column() {
        let mut state = ActionState::new(
            ActionDefinition::new("uppercase").with_param(params::COLUMN_ID, "0000"),
        );
        let mut meta = metadata();

        let mut ctx = ActionContext::new(&mut state, &mut meta);
        ctx.column("name_upper", |id| {
            ColumnMetadata::new(id, "name_upper", ColumnType::Text)
        })
        .unwrap();

        let ids: Vec<&str> = meta.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["0000", "0002", "0001"]);
    }

    #[test]
    fn scope_less_action_appends_created_columns() {
        let mut state = ActionState::new(ActionDefinition::new("synthetic"));
        let mut meta = metadata();

        let mut ctx = ActionContext::new(&mut state, &mut meta);
        ctx.column("extra", |id| ColumnMetadata::new(id, "extra", ColumnType::Text))
            .unwrap();

        let ids: Vec<&str> = meta.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["0000", "0001", "0002"]);
    }

    #[test]
    fn local_store_round_trips() {
        let mut state = ActionState::new(ActionDefinition::new("any"));
        let mut meta = metadata();
        let mut ctx = ActionContext::new(&mut state, &mut meta);

        assert_eq!(ctx.get("seen"), None);
        ctx.put("seen", "yes");
        assert_eq!(ctx.get("seen"), Some("yes"));
    }
}
