//! Value added distribution and the auditor's opinion.

use chrono::NaiveDate;
use cvm_core::{ReportRow, ReportType};
use serde::{Deserialize, Serialize};

use crate::mapper::AccountMapper;
use crate::metrics::ratio;

const OPINION_TYPE: &str = "TP_RELAT_AUD";
const OPINION_TEXT: &str = "DS_OPINIAO";
const AUDITOR_NAME: &str = "NM_AUDITOR";

/// How the value added by a company was distributed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WealthDistribution {
    /// Reference date, `None` for the latest.
    pub date: Option<NaiveDate>,
    /// Personnel and benefits.
    pub personnel: f64,
    /// Taxes and contributions.
    pub taxes: f64,
    /// Interest and rent paid to third-party capital.
    pub lenders: f64,
    /// Dividends, interest on equity and retained earnings.
    pub shareholders: f64,
}

impl WealthDistribution {
    /// Sum of the four shares.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.personnel + self.taxes + self.lenders + self.shareholders
    }

    /// Fraction of the total taken by `part`, `None` when nothing was distributed.
    #[must_use]
    pub fn share(&self, part: f64) -> Option<f64> {
        ratio(part, self.total())
    }
}

/// Latest audit report of a company.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOpinion {
    /// Reference date of the audited statements.
    pub reference_date: Option<NaiveDate>,
    /// Report type or opinion text.
    pub opinion: String,
    /// Audit firm, when published in structured form.
    pub auditor: Option<String>,
}

impl AccountMapper<'_> {
    /// Value added distribution at `date`.
    #[must_use]
    pub fn wealth_distribution(&self, date: Option<NaiveDate>) -> WealthDistribution {
        WealthDistribution {
            date,
            personnel: self.dva_personnel(date),
            taxes: self.dva_taxes(date),
            lenders: self.dva_lenders(date),
            shareholders: self.dva_shareholders(date),
        }
    }

    /// Most recent audit report carrying an opinion.
    #[must_use]
    pub fn audit_opinion(&self) -> Option<AuditOpinion> {
        let table = self.dataset().table(ReportType::AuditOpinion)?;
        let row = table
            .iter()
            .filter(|r| opinion_of(r).is_some())
            .max_by(|a, b| {
                a.reference_date
                    .cmp(&b.reference_date)
                    .then_with(|| a.reference_raw.cmp(&b.reference_raw))
            })?;

        Some(AuditOpinion {
            reference_date: row.reference_date,
            opinion: opinion_of(row)?.to_string(),
            auditor: row.field(AUDITOR_NAME).map(str::to_string),
        })
    }
}

fn opinion_of(row: &ReportRow) -> Option<&str> {
    row.field(OPINION_TYPE).or_else(|| row.field(OPINION_TEXT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvm_core::{ConsolidatedDataset, ReportFamily, ReportTable};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset(report_type: ReportType, rows: Vec<ReportRow>) -> ConsolidatedDataset {
        [(report_type, rows.into_iter().collect::<ReportTable>())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_wealth_distribution() {
        let end = date(2023, 12, 31);
        let row = |code: &str, desc: &str, value| ReportRow::new(end, code, desc, value, ReportFamily::Dfp);
        let data = dataset(
            ReportType::Dva,
            vec![
                row("7.08.01", "Pessoal", 400.0),
                row("7.08.02", "Impostos, Taxas e Contribuições", 300.0),
                row("7.08.03", "Remuneração de Capitais de Terceiros", 100.0),
                row("7.08.04", "Remuneração de Capitais Próprios", 200.0),
            ],
        );
        let wealth = AccountMapper::new(&data).wealth_distribution(None);

        assert_eq!(wealth.total(), 1000.0);
        assert_eq!(wealth.share(wealth.personnel), Some(0.4));
        assert_eq!(WealthDistribution::default().share(1.0), None);
    }

    #[test]
    fn test_audit_opinion_latest() {
        let row = |d: NaiveDate| ReportRow::new(d, "", "", 0.0, ReportFamily::Dfp);
        let data = dataset(
            ReportType::AuditOpinion,
            vec![
                row(date(2022, 12, 31))
                    .with_field("TP_RELAT_AUD", "Sem Ressalva")
                    .with_field("NM_AUDITOR", "KPMG"),
                row(date(2023, 12, 31))
                    .with_field("DS_OPINIAO", "Opinião sem modificação")
                    .with_field("NM_AUDITOR", "PwC"),
                row(date(2024, 3, 31)),
            ],
        );
        let opinion = AccountMapper::new(&data).audit_opinion().unwrap();

        assert_eq!(opinion.reference_date, Some(date(2023, 12, 31)));
        assert_eq!(opinion.opinion, "Opinião sem modificação");
        assert_eq!(opinion.auditor.as_deref(), Some("PwC"));
    }

    #[test]
    fn test_audit_opinion_absent() {
        let data = ConsolidatedDataset::new();
        assert_eq!(AccountMapper::new(&data).audit_opinion(), None);
    }
}
