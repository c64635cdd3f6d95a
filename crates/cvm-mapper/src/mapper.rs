//! Account lookups over a consolidated dataset.

use chrono::{Datelike, NaiveDate};
use cvm_core::{ComparisonPeriod, ConsolidatedDataset, ReportTable, ReportType};
use tracing::{debug, trace};

use crate::accounts::{self, Account};

/// Reads standardized figures out of a [`ConsolidatedDataset`].
///
/// Every getter takes an optional reference date; `None` means the latest
/// date of the statement involved. Absent data reads as `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct AccountMapper<'a> {
    dataset: &'a ConsolidatedDataset,
}

impl<'a> AccountMapper<'a> {
    /// Creates a mapper over `dataset`.
    #[must_use]
    pub const fn new(dataset: &'a ConsolidatedDataset) -> Self {
        Self { dataset }
    }

    /// Dataset being read.
    #[must_use]
    pub const fn dataset(&self) -> &'a ConsolidatedDataset {
        self.dataset
    }

    fn table(&self, report_type: ReportType) -> Option<&'a ReportTable> {
        self.dataset.table(report_type)
    }

    // ========================================================================
    // Lookup primitives
    // ========================================================================

    /// Value of a statement line.
    ///
    /// Rows are narrowed to `date` (or the latest date), then to full-year
    /// accumulations when `force_accumulated` is set, then to final exercise
    /// rows. The first row whose code starts with `code` wins, else the first
    /// whose description contains `description`. Returns `0.0` when nothing
    /// matches.
    #[must_use]
    pub fn get_value(
        &self,
        report_type: ReportType,
        code: &str,
        description: Option<&str>,
        date: Option<NaiveDate>,
        force_accumulated: bool,
    ) -> f64 {
        let Some(table) = self.table(report_type) else {
            return 0.0;
        };

        let mut selection = match date {
            Some(date) => table.select().at_date(date),
            None => table.select().at_latest(),
        };
        if selection.is_empty() {
            return 0.0;
        }
        if force_accumulated {
            selection = selection.accumulated();
        }
        let selection = selection.final_exercise();

        let by_code = (!code.is_empty())
            .then(|| selection.clone().with_account_prefix(code).first())
            .flatten();
        let row = by_code.or_else(|| {
            description
                .filter(|d| !d.is_empty())
                .and_then(|d| selection.clone().with_description(d).first())
        });

        row.and_then(|r| r.value).unwrap_or(0.0)
    }

    fn value_of(&self, account: Account, date: Option<NaiveDate>, force_accumulated: bool) -> f64 {
        self.get_value(
            account.report_type,
            account.code,
            Some(account.description),
            date,
            force_accumulated,
        )
    }

    /// Year-to-date accumulation of a line at an exact date, the point in
    /// time figure behind evolution tables.
    #[must_use]
    pub fn get_raw_value(&self, report_type: ReportType, code: &str, description: &str, date: NaiveDate) -> f64 {
        self.get_value(report_type, code, Some(description), Some(date), true)
    }

    /// Trailing twelve months of a flow line.
    ///
    /// At a fiscal year-end this is the accumulated value itself. Otherwise
    /// it is `accumulated(date) + annual(previous year) -
    /// accumulated(same date previous year)`, with Feb 29 mapped to Feb 28.
    #[must_use]
    pub fn get_ltm_value(
        &self,
        report_type: ReportType,
        code: &str,
        description: Option<&str>,
        date: Option<NaiveDate>,
    ) -> f64 {
        let Some(date) = date.or_else(|| self.table(report_type)?.max_reference_date()) else {
            return 0.0;
        };

        let current = self.get_value(report_type, code, description, Some(date), true);
        if date.month() == 12 && date.day() == 31 {
            return current;
        }

        let Some((previous_year_end, previous_same_point)) = previous_year_points(date) else {
            return current;
        };
        let previous_annual = self.get_value(report_type, code, description, Some(previous_year_end), true);
        let previous_partial = self.get_value(report_type, code, description, Some(previous_same_point), true);

        trace!(
            report_type = %report_type,
            code,
            %date,
            current,
            previous_annual,
            previous_partial,
            "LTM components"
        );
        current + previous_annual - previous_partial
    }

    fn ltm_of(&self, account: Account, date: Option<NaiveDate>) -> f64 {
        self.get_ltm_value(account.report_type, account.code, Some(account.description), date)
    }

    /// Latest reference date of the primary statement: DRE, else BPA.
    #[must_use]
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.table(ReportType::Dre)
            .or_else(|| self.table(ReportType::Bpa))
            .and_then(ReportTable::max_reference_date)
    }

    /// LTM at the latest date plus the two previous fiscal year-ends.
    ///
    /// Empty when the dataset has neither an income statement nor assets.
    #[must_use]
    pub fn get_comparison_dates(&self) -> Vec<ComparisonPeriod> {
        let Some(latest) = self.reference_date() else {
            debug!("No reference date for comparison periods");
            return Vec::new();
        };

        let mut periods = vec![ComparisonPeriod::new(
            format!("LTM ({})", latest.format("%d/%m/%Y")),
            None,
        )];
        for offset in 1..=2 {
            let year = latest.year() - offset;
            periods.push(ComparisonPeriod::new(
                year.to_string(),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ));
        }
        periods
    }

    // ========================================================================
    // Income statement (LTM)
    // ========================================================================

    /// Net operating revenue, LTM.
    #[must_use]
    pub fn get_revenue(&self, date: Option<NaiveDate>) -> f64 {
        self.ltm_of(accounts::REVENUE, date)
    }

    /// Gross profit, LTM.
    #[must_use]
    pub fn get_gross_profit(&self, date: Option<NaiveDate>) -> f64 {
        self.ltm_of(accounts::GROSS_PROFIT, date)
    }

    /// EBIT, LTM.
    #[must_use]
    pub fn get_ebit(&self, date: Option<NaiveDate>) -> f64 {
        self.ltm_of(accounts::EBIT, date)
    }

    /// Net income, LTM.
    #[must_use]
    pub fn get_net_income(&self, date: Option<NaiveDate>) -> f64 {
        self.ltm_of(accounts::NET_INCOME, date)
    }

    /// Accumulated depreciation and amortization from the value added statement.
    #[must_use]
    pub fn get_depreciation(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::DEPRECIATION, date, true)
    }

    /// EBIT plus the absolute depreciation.
    #[must_use]
    pub fn get_ebitda(&self, date: Option<NaiveDate>) -> f64 {
        self.get_ebit(date) + self.get_depreciation(date).abs()
    }

    // ========================================================================
    // Balance sheet
    // ========================================================================

    /// Shareholders' equity.
    #[must_use]
    pub fn get_equity(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::EQUITY, date, false)
    }

    /// Total assets.
    #[must_use]
    pub fn get_total_assets(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::TOTAL_ASSETS, date, false)
    }

    /// Current assets.
    #[must_use]
    pub fn get_current_assets(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::CURRENT_ASSETS, date, false)
    }

    /// Current liabilities.
    #[must_use]
    pub fn get_current_liabilities(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::CURRENT_LIABILITIES, date, false)
    }

    /// Short plus long-term loans and financing.
    #[must_use]
    pub fn get_gross_debt(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::SHORT_TERM_DEBT, date, false)
            + self.value_of(accounts::LONG_TERM_DEBT, date, false)
    }

    /// Cash and cash equivalents.
    #[must_use]
    pub fn get_cash_and_equivalents(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::CASH, date, false)
    }

    /// Gross debt minus cash.
    #[must_use]
    pub fn get_net_debt(&self, date: Option<NaiveDate>) -> f64 {
        self.get_gross_debt(date) - self.get_cash_and_equivalents(date)
    }

    // ========================================================================
    // Cash flow
    // ========================================================================

    /// Statement used for cash flow lines: indirect method when present.
    fn cash_flow_report(&self) -> ReportType {
        if self.table(ReportType::DfcMi).is_some() {
            ReportType::DfcMi
        } else {
            ReportType::DfcMd
        }
    }

    /// Net cash from operations, indirect method first.
    #[must_use]
    pub fn get_operating_cash_flow(&self, date: Option<NaiveDate>) -> f64 {
        let indirect = self.value_of(accounts::OPERATING_CASH_FLOW, date, false);
        if indirect != 0.0 {
            return indirect;
        }
        self.value_of(accounts::OPERATING_CASH_FLOW.in_report(ReportType::DfcMd), date, false)
    }

    /// Net cash from investing activities, usually negative.
    #[must_use]
    pub fn get_capex(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::CAPEX.in_report(self.cash_flow_report()), date, false)
    }

    /// Dividends paid, else interest on equity paid, as a positive amount.
    #[must_use]
    pub fn get_dividends_paid(&self, date: Option<NaiveDate>) -> f64 {
        let report = self.cash_flow_report();
        let dividends = self.value_of(accounts::DIVIDENDS_PAID.in_report(report), date, false);
        if dividends != 0.0 {
            return dividends.abs();
        }
        self.value_of(accounts::INTEREST_ON_EQUITY_PAID.in_report(report), date, false)
            .abs()
    }

    // ========================================================================
    // Value added distribution
    // ========================================================================

    /// Value added distributed to personnel.
    #[must_use]
    pub fn dva_personnel(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::DVA_PERSONNEL, date, false)
    }

    /// Value added distributed as taxes.
    #[must_use]
    pub fn dva_taxes(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::DVA_TAXES, date, false)
    }

    /// Value added distributed to lenders.
    #[must_use]
    pub fn dva_lenders(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::DVA_LENDERS, date, false)
    }

    /// Value added retained by or paid to shareholders.
    #[must_use]
    pub fn dva_shareholders(&self, date: Option<NaiveDate>) -> f64 {
        self.value_of(accounts::DVA_SHAREHOLDERS, date, false)
    }

    // ========================================================================
    // Shares and series
    // ========================================================================

    /// Total shares at the latest capital composition date, `0` when absent.
    #[must_use]
    pub fn share_count(&self) -> u64 {
        let Some(table) = self.table(ReportType::CapitalComposition) else {
            return 0;
        };
        table
            .select()
            .at_latest()
            .iter()
            .find_map(|row| {
                accounts::SHARE_COUNT_FIELDS
                    .iter()
                    .find_map(|name| row.field(name))
                    .and_then(parse_share_count)
            })
            .unwrap_or(0)
    }

    /// Year-to-date value of a line at every reference date of its
    /// statement, oldest first.
    #[must_use]
    pub fn evolution(&self, report_type: ReportType, code: &str, description: &str) -> Vec<(NaiveDate, f64)> {
        self.table(report_type)
            .map(|table| {
                table
                    .reference_dates()
                    .into_iter()
                    .map(|date| (date, self.get_raw_value(report_type, code, description, date)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Previous fiscal year-end and the same day and month one year earlier.
fn previous_year_points(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let year = date.year() - 1;
    let year_end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    let same_point = NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))?;
    Some((year_end, same_point))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_share_count(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}
