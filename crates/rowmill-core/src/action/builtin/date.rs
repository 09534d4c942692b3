use crate::{
    action::{ActionContext, ActionError, RowAction, builtin::text::scoped_column},
    date::DateParser,
    error::EngineError,
    row::{ColumnMetadata, ColumnType, DataSetRow},
};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::sync::Arc;

pub const EXTRACT_DATE_TOKENS_ACTION_NAME: &str = "extract_date_tokens";

///
/// DateToken
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DateToken {
    Year,
    Month,
    Day,
    Hour24,
    Minute,
    Second,
}

/// Token table in output-column order: (parameter name, default).
const DATE_TOKENS: [(DateToken, &str, bool); 6] = [
    (DateToken::Year, "YEAR", true),
    (DateToken::Month, "MONTH", true),
    (DateToken::Day, "DAY", true),
    (DateToken::Hour24, "HOUR_24", true),
    (DateToken::Minute, "MINUTE", true),
    (DateToken::Second, "SECOND", false),
];

impl DateToken {
    fn extract(self, date: &NaiveDateTime) -> String {
        match self {
            Self::Year => date.year().to_string(),
            Self::Month => date.month().to_string(),
            Self::Day => date.day().to_string(),
            Self::Hour24 => date.hour().to_string(),
            Self::Minute => date.minute().to_string(),
            Self::Second => date.second().to_string(),
        }
    }
}

///
/// ExtractDateTokens
///
/// Splits a date column into one derived column per enabled token
/// (`<column>_YEAR`, `<column>_MONTH`, ...). Unparseable or missing
/// cells degrade to empty token values; they never fail the row.
///

pub struct ExtractDateTokens {
    parser: Arc<dyn DateParser>,
}

impl ExtractDateTokens {
    #[must_use]
    pub fn new(parser: Arc<dyn DateParser>) -> Self {
        Self { parser }
    }

    fn token_column(
        ctx: &mut ActionContext<'_>,
        column_name: &str,
        param: &str,
    ) -> Result<String, EngineError> {
        let name = format!("{column_name}_{param}");
        ctx.column(&name, |id| ColumnMetadata::new(id, &name, ColumnType::Integer))
    }
}

impl std::fmt::Debug for ExtractDateTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractDateTokens").finish_non_exhaustive()
    }
}

impl RowAction for ExtractDateTokens {
    fn compile(&self, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        let column_id = ctx
            .column_id()
            .ok_or_else(|| EngineError::column_not_found("<unset>"))?;
        let column_name = ctx
            .metadata()
            .column(column_id)
            .ok_or_else(|| EngineError::column_not_found(column_id))?
            .name
            .clone();

        for (_, param, default) in DATE_TOKENS {
            if ctx.flag_param(param, default) {
                Self::token_column(ctx, &column_name, param)?;
            }
        }
        Ok(())
    }

    fn apply(&self, row: &mut DataSetRow, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let column_id = scoped_column(ctx)?;
        let column = ctx
            .metadata()
            .column(&column_id)
            .cloned()
            .ok_or_else(|| ActionError::new(format!("column not found: {column_id}")))?;

        let parsed = row
            .get(&column_id)
            .and_then(|cell| self.parser.parse(cell, &column).ok());

        for (token, param, default) in DATE_TOKENS {
            if !ctx.flag_param(param, default) {
                continue;
            }
            let target = Self::token_column(ctx, &column.name, param)
                .map_err(|err| ActionError::new(err.to_string()))?;
            let value = parsed
                .as_ref()
                .map(|date| token.extract(date))
                .unwrap_or_default();
            row.set(target, value);
        }
        Ok(())
    }
}

///
/// TESTS
///
