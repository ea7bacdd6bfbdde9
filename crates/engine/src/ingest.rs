//! Bank statement rows and their conversion into ledger candidates.
//!
//! Statements arrive as spreadsheet exports. A cell is either empty, a number
//! (amounts, or dates as spreadsheet serial days) or text. The engine side of
//! ingestion lives in `ops::ingest`.

use std::io::Read;

use chrono::{Days, NaiveDate};

use crate::{
    EngineError, MoneyCents, ResultEngine,
    util::{normalize_remarks, parse_display_date},
};

/// Day zero of spreadsheet serial dates (serial 1 is 1899-12-31, serial
/// 45292 is 2024-01-01).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

#[derive(Clone, Debug, PartialEq)]
pub enum StatementCell {
    Empty,
    Number(f64),
    Text(String),
}

impl StatementCell {
    /// Classifies a raw CSV field.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let numeric = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
        match trimmed.parse::<f64>() {
            Ok(value) if numeric && value.is_finite() => Self::Number(value),
            _ => Self::Text(trimmed.to_string()),
        }
    }
}

/// One statement line, as read from the file.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementRow {
    /// 1-based line in the source file, for error messages.
    pub line: u64,
    pub value_date: StatementCell,
    pub credit: StatementCell,
    pub remarks: StatementCell,
}

impl StatementRow {
    pub fn new(
        line: u64,
        value_date: StatementCell,
        credit: StatementCell,
        remarks: StatementCell,
    ) -> Self {
        Self {
            line,
            value_date,
            credit,
            remarks,
        }
    }
}

/// Zero-based column positions within a statement export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatementLayout {
    pub value_date: usize,
    pub credit: usize,
    pub remarks: usize,
    pub has_header: bool,
}

impl Default for StatementLayout {
    fn default() -> Self {
        Self {
            value_date: 2,
            credit: 3,
            remarks: 4,
            has_header: true,
        }
    }
}

/// A validated row ready to be stored as an unapproved entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateEntry {
    pub value_date: NaiveDate,
    pub remarks: String,
    pub credit_amount: MoneyCents,
}

/// Summary of a statement import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Reads a CSV statement export. Blank lines are skipped; short lines yield
/// empty cells.
pub fn read_csv_statement<R: Read>(
    reader: R,
    layout: &StatementLayout,
) -> ResultEngine<Vec<StatementRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(layout.has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|err| EngineError::InvalidStatement(err.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let cell = |index: usize| {
            record
                .get(index)
                .map(StatementCell::from_field)
                .unwrap_or(StatementCell::Empty)
        };
        rows.push(StatementRow::new(
            line,
            cell(layout.value_date),
            cell(layout.credit),
            cell(layout.remarks),
        ));
    }
    Ok(rows)
}

/// Converts a spreadsheet serial day number into a date. Fractions (time of
/// day) are dropped.
pub fn serial_to_date(serial: f64) -> ResultEngine<NaiveDate> {
    let (y, m, d) = SERIAL_EPOCH;
    if !serial.is_finite() || serial < 1.0 {
        return Err(EngineError::InvalidDate(format!(
            "invalid serial date {serial}"
        )));
    }
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|epoch| epoch.checked_add_days(Days::new(serial.trunc() as u64)))
        .ok_or_else(|| EngineError::InvalidDate(format!("invalid serial date {serial}")))
}

impl StatementRow {
    pub fn to_candidate(&self) -> ResultEngine<CandidateEntry> {
        let value_date = match &self.value_date {
            StatementCell::Number(serial) => serial_to_date(*serial),
            StatementCell::Text(text) => parse_display_date(text),
            StatementCell::Empty => Err(EngineError::InvalidDate("missing value date".to_string())),
        }
        .map_err(|err| match err {
            EngineError::InvalidDate(msg) => {
                EngineError::InvalidDate(format!("line {}: {msg}", self.line))
            }
            other => other,
        })?;

        let credit_amount = match &self.credit {
            StatementCell::Empty => Ok(MoneyCents::ZERO),
            StatementCell::Number(units) => MoneyCents::from_units(*units),
            StatementCell::Text(text) => text.parse::<MoneyCents>(),
        }
        .map_err(|err| match err {
            EngineError::InvalidAmount(msg) => {
                EngineError::InvalidAmount(format!("line {}: {msg}", self.line))
            }
            other => other,
        })?;
        if credit_amount.is_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "line {}: credit must be >= 0",
                self.line
            )));
        }

        let remarks = match &self.remarks {
            StatementCell::Empty => normalize_remarks(None),
            StatementCell::Number(value) => normalize_remarks(Some(&value.to_string())),
            StatementCell::Text(text) => normalize_remarks(Some(text)),
        };

        Ok(CandidateEntry {
            value_date,
            remarks,
            credit_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::MISSING_REMARKS;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn serial_dates_use_spreadsheet_epoch() {
        assert_eq!(serial_to_date(1.0).unwrap(), date(1899, 12, 31));
        assert_eq!(serial_to_date(45292.0).unwrap(), date(2024, 1, 1));
        assert_eq!(serial_to_date(45292.75).unwrap(), date(2024, 1, 1));
        assert!(serial_to_date(0.0).is_err());
    }

    #[test]
    fn classifies_fields() {
        assert_eq!(StatementCell::from_field("  "), StatementCell::Empty);
        assert_eq!(StatementCell::from_field("45292"), StatementCell::Number(45292.0));
        assert_eq!(StatementCell::from_field("12.5"), StatementCell::Number(12.5));
        assert_eq!(
            StatementCell::from_field("1,250.00"),
            StatementCell::Text("1,250.00".to_string())
        );
        assert_eq!(
            StatementCell::from_field("inf"),
            StatementCell::Text("inf".to_string())
        );
    }

    #[test]
    fn candidate_applies_defaults() {
        let row = StatementRow::new(
            2,
            StatementCell::Text("02-05-2024".to_string()),
            StatementCell::Empty,
            StatementCell::Empty,
        );
        let candidate = row.to_candidate().unwrap();
        assert_eq!(candidate.value_date, date(2024, 5, 2));
        assert_eq!(candidate.credit_amount, MoneyCents::ZERO);
        assert_eq!(candidate.remarks, MISSING_REMARKS);
    }

    #[test]
    fn candidate_rejects_negative_credit() {
        let row = StatementRow::new(
            5,
            StatementCell::Number(45292.0),
            StatementCell::Number(-10.0),
            StatementCell::Text("REFUND".to_string()),
        );
        let err = row.to_candidate().unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("line 5: credit must be >= 0".to_string())
        );
    }

    #[test]
    fn candidate_names_line_of_bad_date() {
        let row = StatementRow::new(
            9,
            StatementCell::Text("yesterday".to_string()),
            StatementCell::Number(10.0),
            StatementCell::Empty,
        );
        assert!(matches!(
            row.to_candidate(),
            Err(EngineError::InvalidDate(msg)) if msg.starts_with("line 9:")
        ));
    }

    #[test]
    fn reads_default_layout_and_skips_blank_lines() {
        let csv = "\
account,posted,value date,credit,remarks
001,x,02-05-2024,\"1,250.50\",TRF ACME
,,,,
001,x,45292,100,
";
        let rows = read_csv_statement(csv.as_bytes(), &StatementLayout::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let first = rows[0].to_candidate().unwrap();
        assert_eq!(first.value_date, date(2024, 5, 2));
        assert_eq!(first.credit_amount, MoneyCents::new(125_050));
        assert_eq!(first.remarks, "TRF ACME");

        let second = rows[1].to_candidate().unwrap();
        assert_eq!(second.value_date, date(2024, 1, 1));
        assert_eq!(second.credit_amount, MoneyCents::new(10_000));
        assert_eq!(second.remarks, MISSING_REMARKS);
    }

    #[test]
    fn short_lines_yield_empty_cells() {
        let layout = StatementLayout {
            has_header: false,
            ..StatementLayout::default()
        };
        let rows = read_csv_statement("a,b,01-01-2024\n".as_bytes(), &layout).unwrap();
        assert_eq!(rows[0].credit, StatementCell::Empty);
        assert_eq!(rows[0].remarks, StatementCell::Empty);
        assert_eq!(rows[0].line, 1);
    }
}
