//! Fetcher tests against a mock portal.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use cvm_cache::{FileCache, InMemoryCache};
use cvm_core::{
    BlobCache, CacheNamespace, CvmError, ReportFamily, ReportType, format_cache_key,
};
use cvm_portal::{CvmClient, CvmConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

const ITR_DIR: &str = "/dados/CIA_ABERTA/DOC/ITR/DADOS/";
const DFP_DIR: &str = "/dados/CIA_ABERTA/DOC/DFP/DADOS/";
const CAD_FILE: &str = "/dados/CIA_ABERTA/CAD/DADOS/cad_cia_aberta.csv";

const CADASTRAL: &str = "\
CNPJ_CIA;DENOM_SOCIAL;DENOM_COMERC;DT_REG;DT_CONST;CD_CVM;SIT;SETOR_ATIV;MUN;UF
07.175.725/0001-60;WEG EQUIPAMENTOS ELETRICOS S.A.;WEG EQUIPAMENTOS;1990-01-01;1961-09-16;12345;ATIVO;Máquinas;JARAGUA DO SUL;SC
84.429.695/0001-11;WEG S.A.;WEG;1971-08-11;1961-09-16;5410;ATIVO;Máquinas;JARAGUA DO SUL;SC
33.592.510/0001-54;VALE S.A.;VALE;1970-01-01;1942-06-01;4170;ATIVO;Mineração;RIO DE JANEIRO;RJ
";

const DRE_HEADER: &str = "CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;GRUPO_DFP;MOEDA;ESCALA_MOEDA;ORDEM_EXERC;DT_INI_EXERC;DT_FIM_EXERC;CD_CONTA;DS_CONTA;VL_CONTA;ST_CONTA_FIXA";

fn config(server: &MockServer) -> CvmConfig {
    CvmConfig::default()
        .with_portal_root(&server.uri())
        .with_report_types(vec![ReportType::Dre, ReportType::Bpa])
        .with_retries(0, Duration::from_millis(1))
        .with_min_request_interval(Duration::ZERO)
}

fn client(server: &MockServer, cache: Arc<dyn BlobCache>) -> CvmClient {
    CvmClient::with_cache(config(server), cache).unwrap()
}

/// DRE lines for WEG (code 005410) plus one line for another filer.
fn dre_csv(year: i32, weg_lines: usize) -> String {
    let mut csv = format!("{DRE_HEADER}\n");
    for i in 0..weg_lines {
        csv.push_str(&format!(
            "84.429.695/0001-11;{year}-12-31;1;WEG S.A.;005410;DF Consolidado;REAL;MIL;ÚLTIMO;{year}-01-01;{year}-12-31;3.0{};Conta {i};{}0,50;S\n",
            i + 1,
            i + 1
        ));
    }
    csv.push_str(&format!(
        "33.592.510/0001-54;{year}-12-31;1;VALE S.A.;004170;DF Consolidado;REAL;MIL;ÚLTIMO;{year}-01-01;{year}-12-31;3.01;Receita;999,00;S\n"
    ));
    csv
}

fn bpa_csv(year: i32) -> String {
    format!(
        "CNPJ_CIA;DT_REFER;CD_CVM;ESCALA_MOEDA;ORDEM_EXERC;CD_CONTA;DS_CONTA;VL_CONTA\n\
         84.429.695/0001-11;{year}-12-31;5410;MIL;ÚLTIMO;1;Ativo Total;5000\n"
    )
}

fn archive(members: &[(String, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in members {
        writer.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
        let bytes: Vec<u8> = content.chars().map(|c| c as u32 as u8).collect();
        writer.write_all(&bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn family_archive(family: ReportFamily, year: i32, dre_lines: usize) -> Vec<u8> {
    let prefix = family.file_prefix();
    archive(&[
        (format!("{prefix}_DRE_con_{year}.csv"), dre_csv(year, dre_lines)),
        (format!("{prefix}_BPA_con_{year}.csv"), bpa_csv(year)),
    ])
}

fn year_index(years: &[i32]) -> String {
    let links: String = years
        .iter()
        .map(|y| format!("<a href=\"itr_cia_aberta_{y}.zip\">itr_cia_aberta_{y}.zip</a>\n"))
        .collect();
    format!("<html><body><pre>{links}<a href=\"../\">../</a></pre></body></html>")
}

async fn mount_cadastral(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(CAD_FILE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CADASTRAL.as_bytes().to_vec()))
        .mount(server)
        .await;
}

async fn mount_index(server: &MockServer, years: &[i32]) {
    Mock::given(method("GET"))
        .and(path(ITR_DIR))
        .respond_with(ResponseTemplate::new(200).set_body_string(year_index(years)))
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer, family: ReportFamily, year: i32, bytes: Vec<u8>) {
    let dir = match family {
        ReportFamily::Itr => ITR_DIR,
        ReportFamily::Dfp => DFP_DIR,
    };
    Mock::given(method("GET"))
        .and(path(format!("{dir}{}", family.archive_name(year))))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_and_tax_id() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    assert_eq!(client.resolve("WEG").await.unwrap().as_deref(), Some("5410"));
    assert_eq!(client.resolve("WEG S.A.").await.unwrap().as_deref(), Some("5410"));
    assert_eq!(client.resolve("Nonexistent Corp").await.unwrap(), None);
    assert_eq!(
        client.get_tax_id("005410").await.unwrap().as_deref(),
        Some("84.429.695/0001-11")
    );
    assert_eq!(client.get_tax_id("abc").await.unwrap(), None);
}

#[tokio::test]
async fn test_registry_is_loaded_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CAD_FILE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CADASTRAL.as_bytes().to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    client.resolve("VALE").await.unwrap();
    client.resolve("WEG").await.unwrap();
    assert_eq!(client.get_cadastral_data().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unreadable_cadastral_registry_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CAD_FILE))
        .respond_with(ResponseTemplate::new(200).set_body_string("A;B\n1;2\n"))
        .mount(&server)
        .await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let err = client.resolve("WEG").await.unwrap_err();
    assert!(matches!(err, CvmError::Parse(_)));
}

#[tokio::test]
async fn test_list_available_years() {
    let server = MockServer::start().await;
    mount_index(&server, &[2021, 2023, 2022]).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    assert_eq!(client.list_available_years(3).await, vec![2023, 2022, 2021]);
}

#[tokio::test]
async fn test_list_available_years_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITR_DIR))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let current = Local::now().year();
    assert_eq!(
        client.list_available_years(3).await,
        vec![current, current - 1, current - 2]
    );
}

#[tokio::test]
async fn test_missing_annual_archive_is_empty() {
    let server = MockServer::start().await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let data = client.get_dfp_data("5410", None, 2019).await.unwrap();
    assert!(data.is_empty());
}

#[tokio::test]
async fn test_missing_quarterly_archive_for_single_year_is_not_found() {
    let server = MockServer::start().await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let err = client.get_itr_data("5410", None, 2019).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        CvmError::ReportNotFound {
            family: ReportFamily::Itr,
            year: 2019
        }
    ));
}

#[tokio::test]
async fn test_report_data_filters_company_and_scales() {
    let server = MockServer::start().await;
    mount_archive(&server, ReportFamily::Dfp, 2023, family_archive(ReportFamily::Dfp, 2023, 2)).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let data = client.get_dfp_data("5410", None, 2023).await.unwrap();
    let dre = &data[&ReportType::Dre];
    assert_eq!(dre.len(), 2);
    assert!(dre.iter().all(|r| r.source == ReportFamily::Dfp));
    assert_eq!(dre.rows()[0].value, Some(10_500.0));
    assert_eq!(data[&ReportType::Bpa].rows()[0].value, Some(5_000_000.0));
}

#[tokio::test]
async fn test_archives_are_served_from_cache() {
    let server = MockServer::start().await;
    mount_archive(&server, ReportFamily::Itr, 2023, family_archive(ReportFamily::Itr, 2023, 1)).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let first = client.get_itr_data("5410", None, 2023).await.unwrap();
    let second = client.get_itr_data("5410", None, 2023).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_merged_rows_equal_sum_of_year_rows() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    mount_index(&server, &[2023, 2022, 2021, 2020]).await;

    let dre_lines = [(2023, 3, 2), (2022, 1, 4), (2021, 2, 1)];
    for (year, itr, dfp) in dre_lines {
        mount_archive(&server, ReportFamily::Itr, year, family_archive(ReportFamily::Itr, year, itr)).await;
        mount_archive(&server, ReportFamily::Dfp, year, family_archive(ReportFamily::Dfp, year, dfp)).await;
    }

    let cache = Arc::new(InMemoryCache::new());
    let client = client(&server, cache.clone());
    let dataset = client.get_consolidated_company_data("WEG", 3).await.unwrap();

    let mut expected_dre = 0;
    let mut expected_bpa = 0;
    for (year, _, _) in dre_lines {
        let outcome = client.fetch_year_data("5410", Some("84.429.695/0001-11"), year).await;
        assert!(outcome.transient_failure.is_none());
        expected_dre += outcome.row_count(ReportType::Dre);
        expected_bpa += outcome.row_count(ReportType::Bpa);
    }

    assert_eq!(expected_dre, 13);
    assert_eq!(dataset.row_count(ReportType::Dre), expected_dre);
    assert_eq!(dataset.row_count(ReportType::Bpa), expected_bpa);
    assert_eq!(dataset.row_count(ReportType::Bpa), 6);
    assert!(
        dataset
            .table(ReportType::Dre)
            .unwrap()
            .iter()
            .all(|r| r.fiscal_year().is_some_and(|y| (2021..=2023).contains(&y)))
    );
}

#[tokio::test]
async fn test_dataset_cache_hit_skips_download() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    mount_index(&server, &[2023]).await;
    mount_archive(&server, ReportFamily::Itr, 2023, family_archive(ReportFamily::Itr, 2023, 2)).await;
    mount_archive(&server, ReportFamily::Dfp, 2023, family_archive(ReportFamily::Dfp, 2023, 1)).await;

    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<dyn BlobCache> = Arc::new(FileCache::new(dir.path()));
    let client = client(&server, Arc::clone(&cache));

    let first = client.get_consolidated_company_data("weg s.a.", 1).await.unwrap();
    let second = client.get_consolidated_company_data("weg s.a.", 1).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.row_count(ReportType::Dre), 3);

    let key = format_cache_key("weg s.a.", "financials_1y");
    assert_eq!(key, "WEG_SA_financials_1y.json");
    assert!(dir.path().join("financials").join(&key).exists());
}

#[tokio::test]
async fn test_failed_year_is_dropped() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    mount_index(&server, &[2023, 2022]).await;
    mount_archive(&server, ReportFamily::Itr, 2023, family_archive(ReportFamily::Itr, 2023, 2)).await;
    Mock::given(method("GET"))
        .and(path(format!("{ITR_DIR}itr_cia_aberta_2022.zip")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server, Arc::new(InMemoryCache::new()));
    let dataset = client.get_consolidated_company_data("WEG", 2).await.unwrap();

    assert_eq!(dataset.row_count(ReportType::Dre), 2);
    assert_eq!(dataset.table(ReportType::Dre).unwrap().reference_dates().len(), 1);
}

#[tokio::test]
async fn test_every_year_failing_is_an_error_and_not_cached() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    mount_index(&server, &[2023, 2022]).await;
    for dir in [ITR_DIR, DFP_DIR] {
        Mock::given(method("GET"))
            .and(wiremock::matchers::path_regex(format!("^{dir}.*\\.zip$")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
    }

    let cache = Arc::new(InMemoryCache::new());
    let client = client(&server, cache.clone());
    let err = client.get_consolidated_company_data("WEG", 2).await.unwrap_err();
    assert!(err.is_transient());

    let key = format_cache_key("WEG", "financials_2y");
    let cached = cache
        .load(CacheNamespace::Datasets, &key, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn test_corrupted_archive_contributes_nothing() {
    let server = MockServer::start().await;
    mount_archive(&server, ReportFamily::Dfp, 2023, b"not a zip archive".to_vec()).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let data = client.get_dfp_data("5410", None, 2023).await.unwrap();
    assert!(data.is_empty());
}

#[tokio::test]
async fn test_unknown_ticker_is_not_found() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    let client = client(&server, Arc::new(InMemoryCache::new()));

    let err = client.get_consolidated_company_data("ZZZZ9", 3).await.unwrap_err();
    assert!(matches!(err, CvmError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_fetches_share_archives() {
    let server = MockServer::start().await;
    mount_cadastral(&server).await;
    mount_index(&server, &[2023, 2022]).await;
    for year in [2023, 2022] {
        for (family, dir) in [(ReportFamily::Itr, ITR_DIR), (ReportFamily::Dfp, DFP_DIR)] {
            // Both cold callers may download the same archive
            Mock::given(method("GET"))
                .and(path(format!("{dir}{}", family.archive_name(year))))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(family_archive(family, year, 3)))
                .expect(1..=2)
                .mount(&server)
                .await;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<dyn BlobCache> = Arc::new(FileCache::new(dir.path()));
    let client = client(&server, cache);

    let (by_ticker, by_name) = tokio::join!(
        client.get_consolidated_company_data("WEG", 2),
        client.get_consolidated_company_data("WEG S.A.", 2),
    );
    let by_ticker = by_ticker.unwrap();
    let by_name = by_name.unwrap();
    assert_eq!(by_ticker.row_count(ReportType::Dre), 12);
    assert_eq!(by_ticker.row_count(ReportType::Dre), by_name.row_count(ReportType::Dre));
    assert_eq!(by_ticker.row_count(ReportType::Bpa), by_name.row_count(ReportType::Bpa));

    // A new identifier misses the dataset cache and parses cached archives
    let from_archives = client.get_consolidated_company_data("weg s", 2).await.unwrap();
    assert_eq!(from_archives.row_count(ReportType::Dre), by_ticker.row_count(ReportType::Dre));
    assert_eq!(from_archives.row_count(ReportType::Bpa), by_ticker.row_count(ReportType::Bpa));

    let archive_dir = dir.path().join("cvm");
    assert!(archive_dir.join("itr_cia_aberta_2023.zip").exists());
    let leftovers = std::fs::read_dir(&archive_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}
