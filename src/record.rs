use std::fmt;

use chrono::NaiveDate;

use crate::config::ValueMode;
use crate::error::IngestError;

/// Fixed textual date layout of the source data: month/day/two-digit year,
/// no zero padding.
pub const DATE_FORMAT: &str = "%m/%d/%y";

/// Expected number of fields per data row: identifier, address, suburb,
/// date, value.
pub const FIELD_COUNT: usize = 5;

/// One parsed, validated sales entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub address: String,
    pub suburb: String,
    pub date: NaiveDate,
    pub value: SaleValue,
}

/// The sale value field, interpreted per the configured [`ValueMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaleValue {
    Text(String),
    Amount(i64),
}

impl SaleValue {
    /// The numeric amount, if this value was ingested in numeric mode.
    pub fn amount(&self) -> Option<i64> {
        match self {
            SaleValue::Amount(amount) => Some(*amount),
            SaleValue::Text(_) => None,
        }
    }
}

impl fmt::Display for SaleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleValue::Text(text) => write!(f, "{text}"),
            SaleValue::Amount(amount) => write!(f, "{amount}"),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.id, self.address, self.suburb, self.date, self.value
        )
    }
}

/// Outcome of parsing one raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Row(Record),
    /// All fields empty: a legitimate blank line, skipped without error.
    Blank,
}

/// Parses one raw row into a [`Record`].
///
/// `row` is the ordered field sequence, `line` the 1-based line number used
/// in error reports, `expected` the required field count. A row whose
/// fields are all empty yields [`RowOutcome::Blank`]; any other parse
/// failure is a malformed row, fatal to the file.
pub fn parse_row(
    row: &csv::StringRecord,
    line: u64,
    expected: usize,
    mode: ValueMode,
) -> Result<RowOutcome, IngestError> {
    if row.iter().all(str::is_empty) {
        return Ok(RowOutcome::Blank);
    }
    if row.len() != expected {
        return Err(IngestError::malformed(
            line,
            format!("expected {expected} fields, got {}", row.len()),
        ));
    }

    let id: i64 = row[0]
        .parse()
        .map_err(|_| IngestError::malformed(line, format!("invalid identifier '{}'", &row[0])))?;
    let date = NaiveDate::parse_from_str(&row[3], DATE_FORMAT)
        .map_err(|_| IngestError::malformed(line, format!("invalid date '{}'", &row[3])))?;
    let value = match mode {
        ValueMode::Numeric => SaleValue::Amount(row[4].parse().map_err(|_| {
            IngestError::malformed(line, format!("invalid sale value '{}'", &row[4]))
        })?),
        ValueMode::Text => SaleValue::Text(row[4].to_string()),
    };

    Ok(RowOutcome::Row(Record {
        id,
        address: row[1].to_string(),
        suburb: row[2].to_string(),
        date,
        value,
    }))
}
