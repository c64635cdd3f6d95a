//! Standard chart of accounts.
//!
//! Statement lines are located by their dotted account code; the description
//! fragment is the fallback for filers that number their lines differently.

use cvm_core::ReportType;

/// A statement line to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// Statement holding the line.
    pub report_type: ReportType,
    /// Account code prefix, empty to match by description only.
    pub code: &'static str,
    /// Case-insensitive description fragment.
    pub description: &'static str,
}

impl Account {
    /// Creates an account reference.
    #[must_use]
    pub const fn new(report_type: ReportType, code: &'static str, description: &'static str) -> Self {
        Self {
            report_type,
            code,
            description,
        }
    }

    /// Same line in another statement.
    #[must_use]
    pub const fn in_report(self, report_type: ReportType) -> Self {
        Self {
            report_type,
            ..self
        }
    }
}

// ============================================================================
// Income statement (DRE)
// ============================================================================

/// Net operating revenue.
pub const REVENUE: Account = Account::new(ReportType::Dre, "3.01", "Receita");
/// Gross profit.
pub const GROSS_PROFIT: Account = Account::new(ReportType::Dre, "3.03", "Resultado Bruto");
/// Result before financial result and taxes.
pub const EBIT: Account = Account::new(ReportType::Dre, "3.05", "Resultado Antes");
/// Net income for the period.
pub const NET_INCOME: Account = Account::new(ReportType::Dre, "3.11", "Lucro");

// ============================================================================
// Balance sheet (BPA / BPP)
// ============================================================================

/// Total assets.
pub const TOTAL_ASSETS: Account = Account::new(ReportType::Bpa, "1", "Ativo Total");
/// Current assets.
pub const CURRENT_ASSETS: Account = Account::new(ReportType::Bpa, "1.01", "Ativo Circulante");
/// Cash and cash equivalents.
pub const CASH: Account = Account::new(ReportType::Bpa, "1.01.01", "Caixa");
/// Current liabilities.
pub const CURRENT_LIABILITIES: Account = Account::new(ReportType::Bpp, "2.01", "Passivo Circulante");
/// Short-term loans and financing.
pub const SHORT_TERM_DEBT: Account = Account::new(ReportType::Bpp, "2.01.04", "Empréstimos");
/// Long-term loans and financing.
pub const LONG_TERM_DEBT: Account = Account::new(ReportType::Bpp, "2.02.01", "Empréstimos");
/// Shareholders' equity.
pub const EQUITY: Account = Account::new(ReportType::Bpp, "2.03", "Patrimônio Líquido");

// ============================================================================
// Cash flow (DFC, indirect method first)
// ============================================================================

/// Net cash from operating activities.
pub const OPERATING_CASH_FLOW: Account = Account::new(ReportType::DfcMi, "6.01", "Operacionais");
/// Net cash from investing activities, used as the capex proxy.
pub const CAPEX: Account = Account::new(ReportType::DfcMi, "6.02", "Investimento");
/// Dividends paid, matched by description anywhere in the statement.
pub const DIVIDENDS_PAID: Account = Account::new(ReportType::DfcMi, "", "Dividendos Pagos");
/// Interest on equity paid, the fallback when no dividend line exists.
pub const INTEREST_ON_EQUITY_PAID: Account = Account::new(ReportType::DfcMi, "", "Juros sobre Capital");

// ============================================================================
// Value added (DVA)
// ============================================================================

/// Depreciation, amortization and depletion.
pub const DEPRECIATION: Account = Account::new(ReportType::Dva, "7.04.01", "Depreciação");
/// Value distributed to personnel.
pub const DVA_PERSONNEL: Account = Account::new(ReportType::Dva, "7.08.01", "Pessoal");
/// Value distributed as taxes.
pub const DVA_TAXES: Account = Account::new(ReportType::Dva, "7.08.02", "Impostos");
/// Value distributed to third-party capital.
pub const DVA_LENDERS: Account = Account::new(ReportType::Dva, "7.08.03", "Terceiros");
/// Value distributed to shareholders' own capital.
pub const DVA_SHAREHOLDERS: Account = Account::new(ReportType::Dva, "7.08.04", "Próprio");

// ============================================================================
// Capital composition
// ============================================================================

/// Share count columns of the capital composition table, in preference order.
pub const SHARE_COUNT_FIELDS: [&str; 2] = ["QT_ACAO_TOTAL_CAP_INTEGR", "QT_TOTAL"];
