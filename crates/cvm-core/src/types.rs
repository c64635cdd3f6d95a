//! Core data types for regulatory filings.
//!
//! This module defines the typed data model:
//!
//! - [`CadastralRecord`] - One registered company
//! - [`ReportRow`] - One statement line item
//! - [`ReportTable`] - Ordered rows of one report type for one company
//! - [`RowSelection`] - Borrowed view used to query a table
//! - [`ConsolidatedDataset`] - Report tables accumulated over several years
//! - [`ComparisonPeriod`] - Label plus optional date for period comparisons

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::family::{ReportFamily, ReportType};

/// Date format used by every date column in the bulk files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` value, ignoring surrounding whitespace and any time suffix.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

/// A company registered with the regulator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadastralRecord {
    /// Regulator code (`CD_CVM`), as published.
    pub code: String,
    /// Legal name (`DENOM_SOCIAL`).
    pub legal_name: String,
    /// Trade name (`DENOM_COMERC`).
    pub trade_name: Option<String>,
    /// Tax id (`CNPJ_CIA`).
    pub tax_id: String,
    /// Business sector (`SETOR_ATIV`).
    pub sector: Option<String>,
    /// City (`MUN`).
    pub city: Option<String>,
    /// State (`UF`).
    pub state: Option<String>,
    /// Registration status (`SIT`).
    pub status: Option<String>,
    /// Registration date (`DT_REG`).
    pub registration_date: Option<NaiveDate>,
    /// Founding date (`DT_CONST`).
    pub founding_date: Option<NaiveDate>,
    /// Registered independent auditor (`AUDITOR`).
    pub auditor: Option<String>,
}

impl CadastralRecord {
    /// Creates a record with the identifying fields set.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        legal_name: impl Into<String>,
        tax_id: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            legal_name: legal_name.into(),
            tax_id: tax_id.into(),
            ..Default::default()
        }
    }
}

/// Exercise-order tag of a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseOrder {
    /// Current figures of the filing (`ÚLTIMO`).
    Final,
    /// Prior-period comparatives (`PENÚLTIMO`).
    Prior,
    /// Any other tag, kept verbatim.
    Other(String),
}

impl ExerciseOrder {
    /// Parses the tag as found in the bulk files.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let tag = value.trim().to_uppercase();
        match tag.as_str() {
            "" => None,
            "ÚLTIMO" | "ULTIMO" => Some(Self::Final),
            "PENÚLTIMO" | "PENULTIMO" => Some(Self::Prior),
            _ => Some(Self::Other(tag)),
        }
    }
}

/// One line item of a statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Fiscal period end (`DT_REFER`), when parseable.
    pub reference_date: Option<NaiveDate>,
    /// `DT_REFER` as published.
    pub reference_raw: String,
    /// Start of the accumulation the row represents (`DT_INI_EXERC`).
    pub period_start: Option<NaiveDate>,
    /// Dotted hierarchical account code (`CD_CONTA`).
    pub account_code: String,
    /// Account description (`DS_CONTA`).
    pub description: String,
    /// Currency-scaled value (`VL_CONTA`).
    pub value: Option<f64>,
    /// Exercise-order tag (`ORDEM_EXERC`).
    pub exercise_order: Option<ExerciseOrder>,
    /// Report family the row came from.
    pub source: ReportFamily,
    /// Every other column of the source file.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ReportRow {
    /// Creates a row for an account at a reference date.
    #[must_use]
    pub fn new(
        reference_date: NaiveDate,
        account_code: impl Into<String>,
        description: impl Into<String>,
        value: f64,
        source: ReportFamily,
    ) -> Self {
        Self {
            reference_date: Some(reference_date),
            reference_raw: reference_date.format(DATE_FORMAT).to_string(),
            period_start: None,
            account_code: account_code.into(),
            description: description.into(),
            value: Some(value),
            exercise_order: None,
            source,
            fields: BTreeMap::new(),
        }
    }

    /// Sets the period start.
    #[must_use]
    pub const fn with_period_start(mut self, period_start: NaiveDate) -> Self {
        self.period_start = Some(period_start);
        self
    }

    /// Sets the exercise order.
    #[must_use]
    pub fn with_exercise_order(mut self, order: ExerciseOrder) -> Self {
        self.exercise_order = Some(order);
        self
    }

    /// Sets an extra column.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a non-empty extra column.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Fiscal year of the row, from the parsed date or the raw prefix.
    #[must_use]
    pub fn fiscal_year(&self) -> Option<i32> {
        self.reference_date
            .map(|d| d.year())
            .or_else(|| self.reference_raw.get(..4)?.parse().ok())
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        match self.reference_date {
            Some(d) => d == date,
            None => self.reference_raw.trim() == date.format(DATE_FORMAT).to_string(),
        }
    }
}

/// Rows of one report type for one company, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Appends a row.
    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    /// Appends every row of another table.
    pub fn append(&mut self, other: Self) {
        self.rows.extend(other.rows);
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, ReportRow> {
        self.rows.iter()
    }

    /// Latest parseable reference date.
    #[must_use]
    pub fn max_reference_date(&self) -> Option<NaiveDate> {
        self.rows.iter().filter_map(|r| r.reference_date).max()
    }

    /// Distinct parseable reference dates, ascending.
    #[must_use]
    pub fn reference_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().filter_map(|r| r.reference_date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Starts a query over every row.
    #[must_use]
    pub fn select(&self) -> RowSelection<'_> {
        RowSelection {
            rows: self.rows.iter().collect(),
        }
    }
}

impl FromIterator<ReportRow> for ReportTable {
    fn from_iter<I: IntoIterator<Item = ReportRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ReportTable {
    type Item = &'a ReportRow;
    type IntoIter = std::slice::Iter<'a, ReportRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Borrowed subset of a [`ReportTable`], narrowed by chained filters.
///
/// Filters keep the table's row order.
#[derive(Clone, Debug)]
pub struct RowSelection<'a> {
    rows: Vec<&'a ReportRow>,
}

impl<'a> RowSelection<'a> {
    /// Keeps rows whose reference date equals `date`.
    ///
    /// Rows with an unparseable date are compared on their raw text.
    #[must_use]
    pub fn at_date(mut self, date: NaiveDate) -> Self {
        self.rows.retain(|r| r.matches_date(date));
        self
    }

    /// Keeps rows at the latest reference date present.
    #[must_use]
    pub fn at_latest(mut self) -> Self {
        if let Some(max) = self.rows.iter().filter_map(|r| r.reference_date).max() {
            self.rows.retain(|r| r.reference_date == Some(max));
        } else if let Some(max) = self.rows.iter().map(|r| r.reference_raw.clone()).max() {
            self.rows.retain(|r| r.reference_raw == max);
        }
        self
    }

    /// Keeps full-year accumulations when the selection holds any.
    ///
    /// The fiscal year comes from the first row; rows whose period start is
    /// January 1 of that year survive. When none does, the selection is
    /// left untouched.
    #[must_use]
    pub fn accumulated(mut self) -> Self {
        let Some(year) = self.rows.first().and_then(|r| r.fiscal_year()) else {
            return self;
        };
        let Some(year_start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return self;
        };
        if self.rows.iter().any(|r| r.period_start == Some(year_start)) {
            self.rows.retain(|r| r.period_start == Some(year_start));
        }
        self
    }

    /// Keeps `Final` rows when the selection holds any.
    #[must_use]
    pub fn final_exercise(mut self) -> Self {
        if self
            .rows
            .iter()
            .any(|r| r.exercise_order == Some(ExerciseOrder::Final))
        {
            self.rows
                .retain(|r| r.exercise_order == Some(ExerciseOrder::Final));
        }
        self
    }

    /// Keeps rows whose account code starts with `prefix`.
    #[must_use]
    pub fn with_account_prefix(mut self, prefix: &str) -> Self {
        self.rows.retain(|r| r.account_code.starts_with(prefix));
        self
    }

    /// Keeps rows whose description contains `needle`, ignoring case.
    #[must_use]
    pub fn with_description(mut self, needle: &str) -> Self {
        let needle = needle.to_lowercase();
        self.rows
            .retain(|r| r.description.to_lowercase().contains(&needle));
        self
    }

    /// First row of the selection.
    #[must_use]
    pub fn first(&self) -> Option<&'a ReportRow> {
        self.rows.first().copied()
    }

    /// Number of selected rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the selected rows.
    pub fn iter(&self) -> impl Iterator<Item = &'a ReportRow> + '_ {
        self.rows.iter().copied()
    }
}

/// Report tables of one company accumulated across fiscal years.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsolidatedDataset {
    tables: BTreeMap<ReportType, ReportTable>,
}

impl ConsolidatedDataset {
    /// Creates an empty dataset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Concatenates `table` onto the existing rows of `report_type`.
    pub fn append(&mut self, report_type: ReportType, table: ReportTable) {
        if table.is_empty() {
            return;
        }
        self.tables.entry(report_type).or_default().append(table);
    }

    /// Concatenates every table of a partial result.
    pub fn merge(&mut self, partial: impl IntoIterator<Item = (ReportType, ReportTable)>) {
        for (report_type, table) in partial {
            self.append(report_type, table);
        }
    }

    /// Table for a report type, if any rows were collected.
    #[must_use]
    pub fn table(&self, report_type: ReportType) -> Option<&ReportTable> {
        self.tables.get(&report_type).filter(|t| !t.is_empty())
    }

    /// Number of rows collected for a report type.
    #[must_use]
    pub fn row_count(&self, report_type: ReportType) -> usize {
        self.tables.get(&report_type).map_or(0, ReportTable::len)
    }

    /// Number of rows across all report types.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(ReportTable::len).sum()
    }

    /// Report types with at least one row.
    pub fn report_types(&self) -> impl Iterator<Item = ReportType> + '_ {
        self.tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(rt, _)| *rt)
    }

    /// Returns true if no rows were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }
}

impl FromIterator<(ReportType, ReportTable)> for ConsolidatedDataset {
    fn from_iter<I: IntoIterator<Item = (ReportType, ReportTable)>>(iter: I) -> Self {
        let mut dataset = Self::new();
        dataset.merge(iter);
        dataset
    }
}

/// A period to compare figures over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPeriod {
    /// Display label, e.g. `LTM (30/09/2023)` or `2022`.
    pub label: String,
    /// Explicit reference date; `None` means latest available (LTM).
    pub date: Option<NaiveDate>,
}

impl ComparisonPeriod {
    /// Creates a comparison period.
    #[must_use]
    pub fn new(label: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            label: label.into(),
            date,
        }
    }
}

impl fmt::Display for ComparisonPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
