//! Portal directory listing parsing.

use cvm_core::{CvmError, ReportFamily, Result};
use scraper::{Html, Selector};

/// Extracts the years of the archives linked from a directory listing.
///
/// Anchor `href` values containing `{prefix}_YYYY.zip` contribute their
/// year. The result is deduplicated and sorted newest first.
///
/// # Errors
/// Returns an error if the anchor selector cannot be built.
pub fn extract_years_from_html(html: &str, family: ReportFamily) -> Result<Vec<i32>> {
    let document = Html::parse_document(html);
    let anchors =
        Selector::parse("a[href]").map_err(|e| CvmError::Parse(format!("selector error: {e:?}")))?;
    let needle = format!("{}_", family.file_prefix());

    let mut years: Vec<i32> = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .flat_map(|href| archive_years(href, &needle))
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    Ok(years)
}

fn archive_years(href: &str, needle: &str) -> Vec<i32> {
    href.match_indices(needle)
        .filter_map(|(pos, _)| {
            let rest = &href[pos + needle.len()..];
            let digits = rest.get(..4)?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) || !rest[4..].starts_with(".zip") {
                return None;
            }
            digits.parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body><pre>
        <a href="../">../</a>
        <a href="itr_cia_aberta_2021.zip">itr_cia_aberta_2021.zip</a>
        <a href="itr_cia_aberta_2023.zip">itr_cia_aberta_2023.zip</a>
        <a href="itr_cia_aberta_2022.zip">itr_cia_aberta_2022.zip</a>
        <a href="/dados/itr_cia_aberta_2023.zip">dup</a>
        <a href="itr_cia_aberta_2020.csv">not an archive</a>
        <a href="dfp_cia_aberta_2019.zip">other family</a>
        <a href="itr_cia_aberta_20x1.zip">bad year</a>
    </pre></body></html>"#;

    #[test]
    fn test_extract_years() {
        let years = extract_years_from_html(LISTING, ReportFamily::Itr).unwrap();
        assert_eq!(years, vec![2023, 2022, 2021]);
    }

    #[test]
    fn test_extract_years_other_family() {
        let years = extract_years_from_html(LISTING, ReportFamily::Dfp).unwrap();
        assert_eq!(years, vec![2019]);
    }

    #[test]
    fn test_extract_years_none() {
        assert!(
            extract_years_from_html("<html><p>maintenance</p></html>", ReportFamily::Itr)
                .unwrap()
                .is_empty()
        );
    }
}
