use crate::{
    error::{EngineError, ErrorKind, ErrorOrigin},
    row::ColumnMetadata,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error as ThisError;

///
/// DateParseError
///

#[derive(Clone, Debug, ThisError)]
pub enum DateParseError {
    #[error("unsupported date pattern '{pattern}': token '{token}'")]
    UnsupportedPattern { pattern: String, token: char },

    #[error("value '{value}' does not match any known date pattern")]
    Unparseable { value: String },
}

impl From<DateParseError> for EngineError {
    fn from(err: DateParseError) -> Self {
        Self::new(ErrorKind::DateParse, ErrorOrigin::Date, err.to_string())
    }
}

///
/// DateParser
///
/// Parses a cell value into a date-time using the column's declared
/// patterns. Implementations must be deterministic: same (value, column)
/// in, same result out.
///

pub trait DateParser: Send + Sync {
    fn parse(&self, value: &str, column: &ColumnMetadata) -> Result<NaiveDateTime, DateParseError>;
}

///
/// PatternDateParser
///
/// Default parser: tries the column's analyzed patterns in declared
/// order, then a small set of common fallbacks. Patterns use the
/// platform's `yyyy-MM-dd HH:mm:ss` dialect and are translated to
/// chrono format strings.
///

#[derive(Clone, Debug)]
pub struct PatternDateParser {
    fallback_patterns: Vec<String>,
}

impl Default for PatternDateParser {
    fn default() -> Self {
        Self {
            fallback_patterns: ["yyyy-MM-dd", "yyyy-MM-dd HH:mm:ss", "MM/dd/yyyy", "dd/MM/yyyy"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl DateParser for PatternDateParser {
    fn parse(&self, value: &str, column: &ColumnMetadata) -> Result<NaiveDateTime, DateParseError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DateParseError::Unparseable {
                value: value.to_owned(),
            });
        }

        column
            .date_patterns
            .iter()
            .chain(self.fallback_patterns.iter())
            .find_map(|pattern| parse_with_pattern(value, pattern).ok())
            .ok_or_else(|| DateParseError::Unparseable {
                value: value.to_owned(),
            })
    }
}

/// Parse one value against one platform-dialect pattern.
pub(crate) fn parse_with_pattern(value: &str, pattern: &str) -> Result<NaiveDateTime, DateParseError> {
    let format = translate_pattern(pattern)?;

    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, &format) {
        return Ok(parsed);
    }

    // Date-only patterns parse to midnight.
    NaiveDate::parse_from_str(value, &format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DateParseError::Unparseable {
            value: value.to_owned(),
        })
}

/// Interpret an epoch-millisecond bound as a UTC date-time.
#[must_use]
pub(crate) fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Translate a `yyyy-MM-dd`-dialect pattern into a chrono format string.
///
/// Letter runs are translated as fields; every other character is kept as
/// a literal. Unknown pattern letters are rejected so build-time callers
/// fail fast instead of silently never matching.
fn translate_pattern(pattern: &str) -> Result<String, DateParseError> {
    let mut format = String::with_capacity(pattern.len() + 4);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphabetic() {
            let mut run = 1;
            while i + run < chars.len() && chars[i + run] == c {
                run += 1;
            }
            let field = match (c, run) {
                ('y', 2) => "%y",
                ('y', _) => "%Y",
                ('M', _) => "%m",
                ('d', _) => "%d",
                ('H', _) => "%H",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                _ => {
                    return Err(DateParseError::UnsupportedPattern {
                        pattern: pattern.to_owned(),
                        token: c,
                    });
                }
            };
            format.push_str(field);
            i += run;
        } else {
            if c == '%' {
                format.push('%');
            }
            format.push(c);
            i += 1;
        }
    }

    Ok(format)
}

///
/// TESTS
///
