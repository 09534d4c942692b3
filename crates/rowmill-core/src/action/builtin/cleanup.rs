use crate::{
    action::{ActionContext, ActionError, RowAction, builtin::text::scoped_column, params},
    row::DataSetRow,
};

pub const DELETE_ON_VALUE_ACTION_NAME: &str = "delete_on_value";

/// Whether cell values are trimmed before comparison.
pub const TRIM_PARAMETER: &str = "trim";

///
/// DeleteOnValue
///
/// Marks a row deleted when the scoped column equals the configured
/// value. The comparison is case-sensitive and exact; with trimming
/// enabled (the default) only the cell side is trimmed, so padded cells
/// still match. Row values are never modified.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteOnValue;

impl RowAction for DeleteOnValue {
    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let column_id = scoped_column(ctx)?;
        let value = ctx
            .text_param(params::VALUE)
            .ok_or_else(|| ActionError::new("missing value parameter"))?;

        let Some(cell) = row.get(&column_id) else {
            return Ok(());
        };

        let cell = if ctx.flag_param(TRIM_PARAMETER, true) {
            cell.trim()
        } else {
            cell
        };

        if cell == value {
            row.set_deleted(true);
        }
        Ok(())
    }
}

///
/// TESTS
///
