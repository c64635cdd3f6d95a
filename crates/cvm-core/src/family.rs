//! Report family and report type definitions.
//!
//! This module defines [`ReportFamily`] for the two bulk filing families
//! published by the regulator and [`ReportType`] for the statements contained
//! in each yearly archive, together with the fixed file naming convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CvmError;

/// Bulk filing family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportFamily {
    /// Quarterly filings (ITR).
    Itr,
    /// Annual filings (DFP).
    Dfp,
}

impl ReportFamily {
    /// Prefix shared by archive and member file names.
    #[must_use]
    pub const fn file_prefix(&self) -> &'static str {
        match self {
            Self::Itr => "itr_cia_aberta",
            Self::Dfp => "dfp_cia_aberta",
        }
    }

    /// Tag stored on every parsed row.
    #[must_use]
    pub const fn source_tag(&self) -> &'static str {
        match self {
            Self::Itr => "ITR",
            Self::Dfp => "DFP",
        }
    }

    /// Name of the yearly archive, e.g. `itr_cia_aberta_2023.zip`.
    #[must_use]
    pub fn archive_name(&self, year: i32) -> String {
        format!("{}_{}.zip", self.file_prefix(), year)
    }
}

impl fmt::Display for ReportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_tag())
    }
}

/// Statement contained in a yearly archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportType {
    /// Balance sheet, assets.
    #[serde(rename = "BPA")]
    Bpa,
    /// Balance sheet, liabilities and equity.
    #[serde(rename = "BPP")]
    Bpp,
    /// Income statement.
    #[serde(rename = "DRE")]
    Dre,
    /// Cash flow statement, direct method.
    #[serde(rename = "DFC_MD")]
    DfcMd,
    /// Cash flow statement, indirect method.
    #[serde(rename = "DFC_MI")]
    DfcMi,
    /// Statement of changes in equity.
    #[serde(rename = "DMPL")]
    Dmpl,
    /// Statement of comprehensive income.
    #[serde(rename = "DRA")]
    Dra,
    /// Value added statement.
    #[serde(rename = "DVA")]
    Dva,
    /// Capital composition (share counts).
    #[serde(rename = "composicao_capital")]
    CapitalComposition,
    /// Independent auditor opinion.
    #[serde(rename = "parecer")]
    AuditOpinion,
}

impl ReportType {
    /// Every report type, in archive order.
    pub const ALL: [Self; 10] = [
        Self::Bpa,
        Self::Bpp,
        Self::Dre,
        Self::DfcMd,
        Self::DfcMi,
        Self::Dmpl,
        Self::Dra,
        Self::Dva,
        Self::CapitalComposition,
        Self::AuditOpinion,
    ];

    /// Code used in member file names and configuration.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Bpa => "BPA",
            Self::Bpp => "BPP",
            Self::Dre => "DRE",
            Self::DfcMd => "DFC_MD",
            Self::DfcMi => "DFC_MI",
            Self::Dmpl => "DMPL",
            Self::Dra => "DRA",
            Self::Dva => "DVA",
            Self::CapitalComposition => "composicao_capital",
            Self::AuditOpinion => "parecer",
        }
    }

    /// Whether the statement is published separately as consolidated and individual.
    #[must_use]
    pub const fn has_consolidation_split(&self) -> bool {
        !matches!(self, Self::CapitalComposition | Self::AuditOpinion)
    }

    /// Member file name inside a yearly archive (lowercase).
    ///
    /// Statements with a consolidation split embed `con` or `ind`:
    /// `dfp_cia_aberta_dre_con_2023.csv`. The others do not:
    /// `dfp_cia_aberta_parecer_2023.csv`.
    #[must_use]
    pub fn member_file_name(&self, family: ReportFamily, year: i32, consolidated: bool) -> String {
        let name = if self.has_consolidation_split() {
            let scope = if consolidated { "con" } else { "ind" };
            format!("{}_{}_{}_{}.csv", family.file_prefix(), self.code(), scope, year)
        } else {
            format!("{}_{}_{}.csv", family.file_prefix(), self.code(), year)
        };
        name.to_lowercase()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReportType {
    type Err = CvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|rt| rt.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CvmError::InvalidParameter(format!("unknown report type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_name() {
        assert_eq!(ReportFamily::Itr.archive_name(2023), "itr_cia_aberta_2023.zip");
        assert_eq!(ReportFamily::Dfp.archive_name(2020), "dfp_cia_aberta_2020.zip");
    }

    #[test]
    fn test_member_file_names() {
        assert_eq!(
            ReportType::Dre.member_file_name(ReportFamily::Dfp, 2023, true),
            "dfp_cia_aberta_dre_con_2023.csv"
        );
        assert_eq!(
            ReportType::DfcMi.member_file_name(ReportFamily::Itr, 2022, false),
            "itr_cia_aberta_dfc_mi_ind_2022.csv"
        );
        assert_eq!(
            ReportType::CapitalComposition.member_file_name(ReportFamily::Itr, 2022, true),
            "itr_cia_aberta_composicao_capital_2022.csv"
        );
        assert_eq!(
            ReportType::AuditOpinion.member_file_name(ReportFamily::Dfp, 2021, false),
            "dfp_cia_aberta_parecer_2021.csv"
        );
    }

    #[test]
    fn test_report_type_from_str() {
        assert_eq!("dre".parse::<ReportType>().unwrap(), ReportType::Dre);
        assert_eq!(" DFC_MD ".parse::<ReportType>().unwrap(), ReportType::DfcMd);
        assert_eq!(
            "COMPOSICAO_CAPITAL".parse::<ReportType>().unwrap(),
            ReportType::CapitalComposition
        );
        assert!("XYZ".parse::<ReportType>().is_err());
    }
}
