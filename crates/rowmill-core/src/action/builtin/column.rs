use crate::{
    action::{
        ActionContext, ActionError, RowAction,
        builtin::text::{derived_column_name, scoped_column},
    },
    error::EngineError,
    row::{ColumnMetadata, ColumnType, DataSetRow},
};

pub const COPY_ACTION_NAME: &str = "copy";

const COPY_COLUMN_SUFFIX: &str = "_copy";

///
/// CopyColumn
///
/// Duplicates the scoped column into a freshly created one, preserving
/// the source column's declared type and date patterns.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CopyColumn;

impl RowAction for CopyColumn {
    fn compile(&self, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        let name = derived_column_name(ctx, COPY_COLUMN_SUFFIX)?;
        let source = ctx
            .metadata()
            .column(ctx.column_id().unwrap_or_default())
            .cloned()
            .ok_or_else(|| EngineError::column_not_found(ctx.column_id().unwrap_or_default()))?;

        ctx.column(&name, |id| {
            let mut column = ColumnMetadata::new(id, &name, source.column_type);
            column.date_patterns = source.date_patterns.clone();
            column
        })?;
        Ok(())
    }

    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let column_id = scoped_column(ctx)?;
        let Some(value) = row.get(&column_id).map(str::to_owned) else {
            return Ok(());
        };

        let name =
            derived_column_name(ctx, COPY_COLUMN_SUFFIX).map_err(|err| ActionError::new(err.to_string()))?;
        let target = ctx
            .column(&name, |id| ColumnMetadata::new(id, &name, ColumnType::Text))
            .map_err(|err| ActionError::new(err.to_string()))?;

        row.set(target, value);
        Ok(())
    }
}

///
/// TESTS
///
