use crate::{
    action::{ActionContext, ActionError, RowAction, params},
    error::EngineError,
    row::{ColumnMetadata, ColumnType, DataSetRow},
};

pub const UPPERCASE_ACTION_NAME: &str = "uppercase";
pub const LOWERCASE_ACTION_NAME: &str = "lowercase";

const UPPER_COLUMN_SUFFIX: &str = "_upper";
const LOWER_COLUMN_SUFFIX: &str = "_lower";

///
/// UpperCase
///
/// Upper-cases the scoped column, in place or into a derived column when
/// `create_new_column` is set.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct UpperCase;

impl RowAction for UpperCase {
    fn compile(&self, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        compile_case_target(ctx, UPPER_COLUMN_SUFFIX)
    }

    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        apply_case(row, ctx, UPPER_COLUMN_SUFFIX, str::to_uppercase)
    }
}

///
/// LowerCase
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LowerCase;

impl RowAction for LowerCase {
    fn compile(&self, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        compile_case_target(ctx, LOWER_COLUMN_SUFFIX)
    }

    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        apply_case(row, ctx, LOWER_COLUMN_SUFFIX, str::to_lowercase)
    }
}

fn compile_case_target(ctx: &mut ActionContext<'_>, suffix: &str) -> Result<(), EngineError> {
    if !ctx.flag_param(params::CREATE_NEW_COLUMN, false) {
        return Ok(());
    }

    let name = derived_column_name(ctx, suffix)?;
    ctx.column(&name, |id| ColumnMetadata::new(id, &name, ColumnType::Text))?;
    Ok(())
}

fn apply_case(
    row: &mut DataSetRow,
    ctx: &mut ActionContext<'_>,
    suffix: &str,
    transform: impl Fn(&str) -> String,
) -> Result<(), ActionError> {
    let column_id = scoped_column(ctx)?;
    let Some(value) = row.get(&column_id).map(str::to_owned) else {
        return Ok(());
    };

    let target = if ctx.flag_param(params::CREATE_NEW_COLUMN, false) {
        let name =
            derived_column_name(ctx, suffix).map_err(|err| ActionError::new(err.to_string()))?;
        ctx.column(&name, |id| ColumnMetadata::new(id, &name, ColumnType::Text))
            .map_err(|err| ActionError::new(err.to_string()))?
    } else {
        column_id
    };

    row.set(target, transform(&value));
    Ok(())
}

pub(super) fn scoped_column(ctx: &ActionContext<'_>) -> Result<String, ActionError> {
    ctx.column_id()
        .map(str::to_owned)
        .ok_or_else(|| ActionError::new("missing column_id parameter"))
}

pub(super) fn derived_column_name(
    ctx: &ActionContext<'_>,
    suffix: &str,
) -> Result<String, EngineError> {
    let column_id = ctx
        .column_id()
        .ok_or_else(|| EngineError::column_not_found("<unset>"))?;
    let column = ctx
        .metadata()
        .column(column_id)
        .ok_or_else(|| EngineError::column_not_found(column_id))?;

    Ok(format!("{}{suffix}", column.name))
}

///
/// TESTS
///
