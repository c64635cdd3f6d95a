//! Financial summaries and derived indicators.

use chrono::{Datelike, NaiveDate};
use cvm_core::{ComparisonPeriod, ReportType};
use serde::{Deserialize, Serialize};

use crate::mapper::AccountMapper;

/// Every standardized figure of a company for one comparison period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// Period label.
    pub label: String,
    /// Reference date, `None` for the latest available.
    pub date: Option<NaiveDate>,

    // Income statement (LTM)
    /// Net operating revenue.
    pub revenue: f64,
    /// Gross profit.
    pub gross_profit: f64,
    /// EBIT.
    pub ebit: f64,
    /// EBITDA.
    pub ebitda: f64,
    /// Net income.
    pub net_income: f64,

    // Balance sheet
    /// Total assets.
    pub total_assets: f64,
    /// Current assets.
    pub current_assets: f64,
    /// Cash and cash equivalents.
    pub cash_and_equivalents: f64,
    /// Current liabilities.
    pub current_liabilities: f64,
    /// Loans and financing, short and long term.
    pub gross_debt: f64,
    /// Gross debt minus cash.
    pub net_debt: f64,
    /// Shareholders' equity.
    pub equity: f64,

    // Cash flow
    /// Net cash from operations.
    pub operating_cash_flow: f64,
    /// Net cash from investing activities.
    pub capex: f64,
    /// Dividends or interest on equity paid.
    pub dividends_paid: f64,
}

impl FinancialSummary {
    /// Reads every figure for `period`.
    #[must_use]
    pub fn from_mapper(mapper: &AccountMapper<'_>, period: &ComparisonPeriod) -> Self {
        let date = period.date;
        Self {
            label: period.label.clone(),
            date,
            revenue: mapper.get_revenue(date),
            gross_profit: mapper.get_gross_profit(date),
            ebit: mapper.get_ebit(date),
            ebitda: mapper.get_ebitda(date),
            net_income: mapper.get_net_income(date),
            total_assets: mapper.get_total_assets(date),
            current_assets: mapper.get_current_assets(date),
            cash_and_equivalents: mapper.get_cash_and_equivalents(date),
            current_liabilities: mapper.get_current_liabilities(date),
            gross_debt: mapper.get_gross_debt(date),
            net_debt: mapper.get_net_debt(date),
            equity: mapper.get_equity(date),
            operating_cash_flow: mapper.get_operating_cash_flow(date),
            capex: mapper.get_capex(date),
            dividends_paid: mapper.get_dividends_paid(date),
        }
    }

    /// Operating cash flow plus capex.
    #[must_use]
    pub fn free_cash_flow(&self) -> f64 {
        self.operating_cash_flow + self.capex
    }
}

/// Key ratios of a company. Ratios are fractions, not percentages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    /// Reference date the figures were read at, `None` for the latest.
    pub date: Option<NaiveDate>,

    // Profitability
    /// Gross profit over revenue.
    pub gross_margin: Option<f64>,
    /// EBIT over revenue.
    pub ebit_margin: Option<f64>,
    /// Net income over revenue.
    pub net_margin: Option<f64>,
    /// Net income over equity.
    pub roe: Option<f64>,
    /// Net income over total assets.
    pub roa: Option<f64>,

    // Debt & liquidity
    /// Gross debt minus cash.
    pub net_debt: f64,
    /// Net debt over EBITDA.
    pub net_debt_to_ebitda: Option<f64>,
    /// Current assets over current liabilities.
    pub current_ratio: Option<f64>,

    // Valuation, with a share price
    /// Total shares.
    pub share_count: u64,
    /// Share price the valuation ratios use.
    pub price: Option<f64>,
    /// Price times share count.
    pub market_cap: Option<f64>,
    /// Price over earnings per share.
    pub pe_ratio: Option<f64>,
    /// Price over book value per share.
    pub pb_ratio: Option<f64>,
    /// Dividends paid over market cap.
    pub dividend_yield: Option<f64>,
    /// Market cap over free cash flow.
    pub price_to_fcf: Option<f64>,
    /// Market cap plus net debt.
    pub enterprise_value: Option<f64>,
    /// Enterprise value over EBITDA.
    pub ev_to_ebitda: Option<f64>,
}

impl KeyMetrics {
    /// Computes the ratios at `date`; valuation ratios need `price`.
    #[must_use]
    pub fn compute(mapper: &AccountMapper<'_>, date: Option<NaiveDate>, price: Option<f64>) -> Self {
        let summary = FinancialSummary::from_mapper(mapper, &ComparisonPeriod::new("", date));
        let mut metrics = Self {
            date,
            net_debt: summary.net_debt,
            share_count: mapper.share_count(),
            price,
            ..Self::default()
        };

        // Profitability
        if summary.revenue > 0.0 {
            metrics.gross_margin = Some(summary.gross_profit / summary.revenue);
            metrics.ebit_margin = Some(summary.ebit / summary.revenue);
            metrics.net_margin = Some(summary.net_income / summary.revenue);
        }
        if summary.equity > 0.0 {
            metrics.roe = Some(summary.net_income / summary.equity);
        }
        if summary.total_assets > 0.0 {
            metrics.roa = Some(summary.net_income / summary.total_assets);
        }

        // Debt & liquidity
        metrics.net_debt_to_ebitda = ratio(summary.net_debt, summary.ebitda);
        if summary.current_liabilities > 0.0 {
            metrics.current_ratio = Some(summary.current_assets / summary.current_liabilities);
        }

        // Valuation
        let Some(price) = price.filter(|p| *p > 0.0) else {
            return metrics;
        };
        if metrics.share_count == 0 {
            return metrics;
        }
        #[allow(clippy::cast_precision_loss)]
        let shares = metrics.share_count as f64;
        let market_cap = price * shares;
        let enterprise_value = market_cap + summary.net_debt;

        metrics.market_cap = Some(market_cap);
        metrics.enterprise_value = Some(enterprise_value);
        metrics.pe_ratio = ratio(price, summary.net_income / shares);
        if summary.equity > 0.0 {
            metrics.pb_ratio = Some(price / (summary.equity / shares));
        }
        metrics.dividend_yield = Some(summary.dividends_paid / market_cap);
        metrics.price_to_fcf = ratio(market_cap, summary.free_cash_flow());
        if summary.ebitda > 0.0 {
            metrics.ev_to_ebitda = Some(enterprise_value / summary.ebitda);
        }
        metrics
    }
}

/// `numerator / denominator`, `None` for a zero or non-finite denominator.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0 && denominator.is_finite()).then(|| numerator / denominator)
}

/// Compound annual growth rate between two positive values.
///
/// Returns `None` unless `start`, `end` and `years` are all positive.
#[must_use]
pub fn cagr(start: f64, end: f64, years: f64) -> Option<f64> {
    (start > 0.0 && end > 0.0 && years > 0.0).then(|| (end / start).powf(years.recip()) - 1.0)
}

/// Revenue and net income growth across the income statement history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthRates {
    /// First fiscal year of the history.
    pub start_year: i32,
    /// Last fiscal year of the history.
    pub end_year: i32,
    /// LTM revenue CAGR.
    pub revenue_cagr: Option<f64>,
    /// LTM net income CAGR.
    pub net_income_cagr: Option<f64>,
    /// Net income went from a loss to a profit, which has no CAGR.
    pub net_income_turnaround: bool,
}

impl GrowthRates {
    /// Compares LTM figures at the latest income statement date with the
    /// same point of the earliest year. `None` with less than two years.
    #[must_use]
    pub fn from_mapper(mapper: &AccountMapper<'_>) -> Option<Self> {
        let dates = mapper.dataset().table(ReportType::Dre)?.reference_dates();
        let (first, last) = (*dates.first()?, *dates.last()?);
        let (start_year, end_year) = (first.year(), last.year());
        if start_year == end_year {
            return None;
        }

        let start = NaiveDate::from_ymd_opt(start_year, last.month(), last.day())
            .or_else(|| NaiveDate::from_ymd_opt(start_year, last.month(), 28))?;
        let years = f64::from(end_year - start_year);

        let (initial_revenue, current_revenue) =
            (mapper.get_revenue(Some(start)), mapper.get_revenue(Some(last)));
        let (initial_income, current_income) =
            (mapper.get_net_income(Some(start)), mapper.get_net_income(Some(last)));

        Some(Self {
            start_year,
            end_year,
            revenue_cagr: cagr(initial_revenue, current_revenue, years),
            net_income_cagr: cagr(initial_income, current_income, years),
            net_income_turnaround: initial_income < 0.0 && current_income > 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvm_core::{ConsolidatedDataset, ReportFamily, ReportRow, ReportTable};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn annual(y: i32, code: &str, desc: &str, value: f64) -> ReportRow {
        ReportRow::new(date(y, 12, 31), code, desc, value, ReportFamily::Dfp).with_period_start(date(y, 1, 1))
    }

    fn sample() -> ConsolidatedDataset {
        let dre: ReportTable = [2021, 2023]
            .into_iter()
            .flat_map(|y| {
                let scale = if y == 2021 { 1.0 } else { 1.21 };
                [
                    annual(y, "3.01", "Receita de Venda", 1000.0 * scale),
                    annual(y, "3.03", "Resultado Bruto", 400.0 * scale),
                    annual(y, "3.05", "Resultado Antes do Resultado Financeiro", 200.0 * scale),
                    annual(y, "3.11", "Lucro/Prejuízo do Período", if y == 2021 { -50.0 } else { 121.0 }),
                ]
            })
            .collect();
        let bpa: ReportTable = [
            annual(2023, "1", "Ativo Total", 2000.0),
            annual(2023, "1.01", "Ativo Circulante", 600.0),
            annual(2023, "1.01.01", "Caixa e Equivalentes", 100.0),
        ]
        .into_iter()
        .collect();
        let bpp: ReportTable = [
            annual(2023, "2.01", "Passivo Circulante", 300.0),
            annual(2023, "2.01.04", "Empréstimos e Financiamentos", 150.0),
            annual(2023, "2.02.01", "Empréstimos e Financiamentos", 250.0),
            annual(2023, "2.03", "Patrimônio Líquido Consolidado", 1210.0),
        ]
        .into_iter()
        .collect();
        let dva: ReportTable = [annual(2023, "7.04.01", "Depreciação, Amortização e Exaustão", -58.0)]
            .into_iter()
            .collect();
        let dfc: ReportTable = [
            annual(2023, "6.01", "Caixa Líquido Atividades Operacionais", 300.0),
            annual(2023, "6.02", "Caixa Líquido Atividades de Investimento", -100.0),
            annual(2023, "6.03.02", "Dividendos Pagos", -60.5),
        ]
        .into_iter()
        .collect();
        let capital: ReportTable = [ReportRow::new(date(2023, 12, 31), "", "", 0.0, ReportFamily::Dfp)
            .with_field("QT_ACAO_TOTAL_CAP_INTEGR", "100")]
        .into_iter()
        .collect();

        [
            (ReportType::Dre, dre),
            (ReportType::Bpa, bpa),
            (ReportType::Bpp, bpp),
            (ReportType::Dva, dva),
            (ReportType::DfcMi, dfc),
            (ReportType::CapitalComposition, capital),
        ]
        .into_iter()
        .collect()
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|a| (a - expected).abs() < 1e-9)
    }

    #[test]
    fn test_summary_from_mapper() {
        let data = sample();
        let mapper = AccountMapper::new(&data);
        let periods = mapper.get_comparison_dates();
        let summary = FinancialSummary::from_mapper(&mapper, &periods[0]);

        assert_eq!(summary.label, "LTM (31/12/2023)");
        assert!((summary.revenue - 1210.0).abs() < 1e-9);
        assert!((summary.ebitda - 300.0).abs() < 1e-9);
        assert_eq!(summary.gross_debt, 400.0);
        assert_eq!(summary.net_debt, 300.0);
        assert_eq!(summary.free_cash_flow(), 200.0);
        assert_eq!(summary.dividends_paid, 60.5);

        let previous = FinancialSummary::from_mapper(&mapper, &periods[1]);
        assert_eq!(previous.label, "2022");
        assert_eq!(previous.revenue, 0.0);
    }

    #[test]
    fn test_key_metrics_without_price() {
        let data = sample();
        let metrics = KeyMetrics::compute(&AccountMapper::new(&data), None, None);

        assert!(close(metrics.gross_margin, 400.0 / 1000.0));
        assert!(close(metrics.net_margin, 0.1));
        assert!(close(metrics.roe, 0.1));
        assert!(close(metrics.current_ratio, 2.0));
        assert!(close(metrics.net_debt_to_ebitda, 1.0));
        assert_eq!(metrics.share_count, 100);
        assert_eq!(metrics.market_cap, None);
        assert_eq!(metrics.pe_ratio, None);
    }

    #[test]
    fn test_key_metrics_with_price() {
        let data = sample();
        let metrics = KeyMetrics::compute(&AccountMapper::new(&data), None, Some(12.1));

        assert!(close(metrics.market_cap, 1210.0));
        assert!(close(metrics.pe_ratio, 10.0));
        assert!(close(metrics.pb_ratio, 1.0));
        assert!(close(metrics.dividend_yield, 0.05));
        assert!(close(metrics.price_to_fcf, 6.05));
        assert!(close(metrics.enterprise_value, 1510.0));
        assert!(close(metrics.ev_to_ebitda, 1510.0 / 300.0));
    }

    #[test]
    fn test_zero_denominators_are_none() {
        let empty = ConsolidatedDataset::new();
        let metrics = KeyMetrics::compute(&AccountMapper::new(&empty), None, Some(10.0));

        assert_eq!(metrics.gross_margin, None);
        assert_eq!(metrics.roe, None);
        assert_eq!(metrics.net_debt_to_ebitda, None);
        assert_eq!(metrics.current_ratio, None);
        assert_eq!(metrics.market_cap, None);
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(ratio(1.0, 4.0), Some(0.25));
    }

    #[test]
    fn test_cagr() {
        assert!(close(cagr(1000.0, 1210.0, 2.0), 0.1));
        assert_eq!(cagr(0.0, 100.0, 2.0), None);
        assert_eq!(cagr(-10.0, 100.0, 2.0), None);
        assert_eq!(cagr(100.0, 200.0, 0.0), None);
    }

    #[test]
    fn test_growth_rates() {
        let data = sample();
        let growth = GrowthRates::from_mapper(&AccountMapper::new(&data)).unwrap();

        assert_eq!((growth.start_year, growth.end_year), (2021, 2023));
        assert!(close(growth.revenue_cagr, 0.1));
        assert_eq!(growth.net_income_cagr, None);
        assert!(growth.net_income_turnaround);
    }

    #[test]
    fn test_growth_needs_two_years() {
        let data: ConsolidatedDataset = [(
            ReportType::Dre,
            [annual(2023, "3.01", "Receita", 1.0)].into_iter().collect::<ReportTable>(),
        )]
        .into_iter()
        .collect();

        assert_eq!(GrowthRates::from_mapper(&AccountMapper::new(&data)), None);
    }
}
