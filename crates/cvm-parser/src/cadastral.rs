//! Cadastral registry parsing.

use csv::ReaderBuilder;
use cvm_core::{CadastralRecord, CvmError, Result, parse_date};
use tracing::{debug, warn};

use crate::text::decode_text;

const REQUIRED_COLUMNS: [&str; 3] = ["CD_CVM", "DENOM_SOCIAL", "CNPJ_CIA"];

/// Parses the cadastral registry file.
///
/// Empty content yields an empty registry. Unlike statement files, a
/// malformed registry is an error: nothing downstream can resolve companies
/// without it.
///
/// # Errors
/// Returns [`CvmError::Parse`] on malformed CSV or when a required column
/// (`CD_CVM`, `DENOM_SOCIAL`, `CNPJ_CIA`) is missing.
pub fn parse_cadastral_csv(bytes: &[u8]) -> Result<Vec<CadastralRecord>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!("Empty content received for cadastral CSV");
        return Ok(Vec::new());
    }

    let text = decode_text(bytes);
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CvmError::Parse(format!("cadastral CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_uppercase())
        .collect();

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !headers.iter().any(|h| h == *c))
    {
        return Err(CvmError::Parse(format!(
            "cadastral CSV is missing column {missing}"
        )));
    }
    let index = |name: &str| headers.iter().position(|h| h == name);
    let [code, legal_name, tax_id] = REQUIRED_COLUMNS.map(index);
    let trade_name = index("DENOM_COMERC");
    let sector = index("SETOR_ATIV");
    let city = index("MUN");
    let state = index("UF");
    let status = index("SIT");
    let registered = index("DT_REG");
    let founded = index("DT_CONST");
    let auditor = index("AUDITOR");

    let mut records = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            CvmError::Parse(format!("cadastral CSV record {}: {e}", line + 2))
        })?;
        let text_at = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        records.push(CadastralRecord {
            code: text_at(code).unwrap_or_default(),
            legal_name: text_at(legal_name).unwrap_or_default(),
            trade_name: text_at(trade_name),
            tax_id: text_at(tax_id).unwrap_or_default(),
            sector: text_at(sector),
            city: text_at(city),
            state: text_at(state),
            status: text_at(status),
            registration_date: text_at(registered).as_deref().and_then(parse_date),
            founding_date: text_at(founded).as_deref().and_then(parse_date),
            auditor: text_at(auditor),
        });
    }

    debug!(companies = records.len(), "Parsed cadastral registry");
    Ok(records)
}
