//! Name matching rules.

use std::fmt::Debug;

use cvm_core::CadastralRecord;

/// Rule picking the record a search term refers to.
pub trait CompanyMatcher: Debug + Send + Sync {
    /// Index of the best record for `term`, if any matches.
    fn find(&self, records: &[CadastralRecord], term: &str) -> Option<usize>;
}

/// Case-insensitive substring match on the legal name; the shortest matching
/// name wins.
///
/// Holding companies usually carry shorter names than their subsidiaries, so
/// `"WEG"` lands on `WEG S.A.` rather than `WEG EQUIPAMENTOS ELETRICOS S.A.`.
/// Ties keep registry order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestNameMatcher;

impl CompanyMatcher for ShortestNameMatcher {
    fn find(&self, records: &[CadastralRecord], term: &str) -> Option<usize> {
        let needle = term.trim().to_uppercase();
        if needle.is_empty() {
            return None;
        }
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.legal_name.to_uppercase().contains(&needle))
            .min_by_key(|(_, r)| r.legal_name.chars().count())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_name_wins() {
        let records = vec![
            CadastralRecord::new("12345", "WEG EQUIPAMENTOS ELETRICOS S.A.", "07.175.725/0001-60"),
            CadastralRecord::new("5410", "WEG S.A.", "84.429.695/0001-11"),
            CadastralRecord::new("999", "PETROLEO BRASILEIRO S.A. PETROBRAS", "33.000.167/0001-01"),
        ];
        let matcher = ShortestNameMatcher;
        assert_eq!(matcher.find(&records, "weg"), Some(1));
        assert_eq!(matcher.find(&records, "Petrobras"), Some(2));
        assert_eq!(matcher.find(&records, "VALE"), None);
        assert_eq!(matcher.find(&records, "  "), None);
    }
}
