//! Statement CSV and yearly archive parsing.
//!
//! A yearly archive holds one semicolon-delimited file per statement, each
//! covering every filer of the year. Parsing narrows a file to one company,
//! normalizes the value column and tags the rows with their family.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use cvm_core::{
    CvmError, ExerciseOrder, ReportFamily, ReportRow, ReportTable, ReportType, Result,
    parse_date,
};
use tracing::{debug, error, warn};
use zip::ZipArchive;

use crate::text::{TextEncoding, numeric_code, parse_number};

// ============================================================================
// Column names
// ============================================================================

const COL_CODE: &str = "CD_CVM";
const COL_TAX_ID: &str = "CNPJ_CIA";
const COL_REFERENCE: &str = "DT_REFER";
const COL_PERIOD_START: &str = "DT_INI_EXERC";
const COL_ACCOUNT: &str = "CD_CONTA";
const COL_DESCRIPTION: &str = "DS_CONTA";
const COL_VALUE: &str = "VL_CONTA";
const COL_SCALE: &str = "ESCALA_MOEDA";
const COL_EXERCISE: &str = "ORDEM_EXERC";

/// Columns mapped onto typed [`ReportRow`] fields; the rest go to `fields`.
const TYPED_COLUMNS: [&str; 6] = [
    COL_REFERENCE,
    COL_PERIOD_START,
    COL_ACCOUNT,
    COL_DESCRIPTION,
    COL_VALUE,
    COL_EXERCISE,
];

/// Scale marker for values published in thousands.
const SCALE_THOUSANDS: &str = "MIL";

/// Identity used to narrow a statement file to one company.
#[derive(Debug, Clone, Copy)]
pub struct CompanyKey<'a> {
    /// Regulator code, any padding.
    pub code: &'a str,
    /// Tax id, used when the code column is absent or yields no match.
    pub tax_id: Option<&'a str>,
}

/// What to extract from one yearly archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveRequest<'a> {
    /// Family the archive belongs to.
    pub family: ReportFamily,
    /// Fiscal year of the archive.
    pub year: i32,
    /// Company to keep.
    pub company: CompanyKey<'a>,
    /// Statements to extract.
    pub report_types: &'a [ReportType],
    /// Consolidated (`con`) rather than individual (`ind`) statements.
    pub consolidated: bool,
}

/// Header index lookup.
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &ByteRecord, encoding: TextEncoding) -> Self {
        let names = headers
            .iter()
            .map(|h| encoding.decode(h).trim().trim_start_matches('\u{feff}').to_uppercase())
            .collect();
        Self { names }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

fn cell<'r>(record: &'r StringRecord, index: Option<usize>) -> &'r str {
    index.and_then(|i| record.get(i)).map_or("", str::trim)
}

/// Parses one statement file and keeps the rows of `company`.
///
/// Rows are matched on the integer value of the code column first and on
/// the exact tax id second. When neither matches, the result is empty.
/// Values containing a comma anywhere in the company's rows switch the whole
/// column to Brazilian notation; rows scaled in thousands are multiplied by
/// 1,000.
///
/// # Errors
/// Returns an error if the header row cannot be read.
pub fn parse_report_csv(
    bytes: &[u8],
    company: &CompanyKey<'_>,
    family: ReportFamily,
    file_name: &str,
) -> Result<ReportTable> {
    let (encoding, body) = TextEncoding::detect(bytes);
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(body);

    let headers = reader
        .byte_headers()
        .map_err(|e| CvmError::Parse(format!("{file_name}: {e}")))?;
    let columns = Columns::new(headers, encoding);

    let selected = select_company(&mut reader, &columns, company, encoding, file_name);
    if selected.is_empty() {
        warn!(
            file = file_name,
            source = family.source_tag(),
            "Could not filter company, missing or non-matching id columns"
        );
        return Ok(ReportTable::new());
    }

    let value_idx = columns.index(COL_VALUE);
    let scale_idx = columns.index(COL_SCALE);
    let brazilian = selected
        .iter()
        .any(|r| cell(r, value_idx).contains(','));

    let reference_idx = columns.index(COL_REFERENCE);
    let start_idx = columns.index(COL_PERIOD_START);
    let account_idx = columns.index(COL_ACCOUNT);
    let description_idx = columns.index(COL_DESCRIPTION);
    let exercise_idx = columns.index(COL_EXERCISE);

    let table: ReportTable = selected
        .iter()
        .map(|record| {
            let mut value = value_idx.and_then(|_| parse_number(cell(record, value_idx), brazilian));
            if cell(record, scale_idx).eq_ignore_ascii_case(SCALE_THOUSANDS) {
                value = value.map(|v| v * 1_000.0);
            }

            let reference_raw = cell(record, reference_idx).to_string();
            let fields = columns
                .names
                .iter()
                .zip(record.iter())
                .filter(|(name, v)| !TYPED_COLUMNS.contains(&name.as_str()) && !v.trim().is_empty())
                .map(|(name, v)| (name.clone(), v.trim().to_string()))
                .collect();

            ReportRow {
                reference_date: parse_date(&reference_raw),
                reference_raw,
                period_start: parse_date(cell(record, start_idx)),
                account_code: cell(record, account_idx).to_string(),
                description: cell(record, description_idx).to_string(),
                value,
                exercise_order: ExerciseOrder::parse(cell(record, exercise_idx)),
                source: family,
                fields,
            }
        })
        .collect();

    debug!(file = file_name, rows = table.len(), brazilian, "Parsed statement");
    Ok(table)
}

/// Streams the records of a file and keeps those of `company`.
///
/// Code matches and tax id matches are buffered separately; code matches
/// win when there are any. Only kept records are decoded.
fn select_company<R: Read>(
    reader: &mut csv::Reader<R>,
    columns: &Columns,
    company: &CompanyKey<'_>,
    encoding: TextEncoding,
    file_name: &str,
) -> Vec<StringRecord> {
    let target = numeric_code(company.code);
    let code_idx = columns.index(COL_CODE).filter(|_| target != 0);
    let tax_id = company.tax_id.map(str::trim).filter(|t| !t.is_empty());
    let tax_idx = columns.index(COL_TAX_ID).filter(|_| tax_id.is_some());

    let mut by_code = Vec::new();
    let mut by_tax_id = Vec::new();
    let mut skipped = 0usize;
    for record in reader.byte_records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };

        let code_hit = code_idx.is_some_and(|i| {
            let raw = record.get(i).unwrap_or_default();
            numeric_code(std::str::from_utf8(raw).unwrap_or_default()) == target
        });
        if code_hit {
            if by_code.is_empty() {
                by_tax_id = Vec::new();
            }
            by_code.push(decode_record(&record, encoding));
            continue;
        }

        let tax_hit = by_code.is_empty()
            && tax_idx.zip(tax_id).is_some_and(|(i, tax_id)| {
                record.get(i).unwrap_or_default().trim_ascii() == tax_id.as_bytes()
            });
        if tax_hit {
            by_tax_id.push(decode_record(&record, encoding));
        }
    }
    if skipped > 0 {
        warn!(file = file_name, skipped, "Skipped malformed CSV records");
    }

    if by_code.is_empty() {
        by_tax_id
    } else {
        by_code
    }
}

fn decode_record(record: &ByteRecord, encoding: TextEncoding) -> StringRecord {
    StringRecord::from(record.iter().map(|field| encoding.decode(field)).collect::<Vec<_>>())
}

/// Extracts the requested statements of one company from a yearly archive.
///
/// Member files are located case-insensitively by their conventional name;
/// a missing member or a company absent from it skips that report type. A
/// corrupted archive yields an empty map.
#[must_use]
pub fn parse_archive(bytes: &[u8], request: &ArchiveRequest<'_>) -> BTreeMap<ReportType, ReportTable> {
    let source = request.family.source_tag();
    let year = request.year;
    let mut results = BTreeMap::new();

    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            error!(source, year, error = %e, "Corrupted archive");
            return results;
        }
    };
    let members: Vec<String> = archive.file_names().map(str::to_string).collect();

    for report_type in request.report_types {
        let expected = report_type.member_file_name(request.family, year, request.consolidated);
        let Some(member) = members.iter().find(|name| {
            let base = name.rsplit('/').next().unwrap_or(name);
            base.to_lowercase() == expected
        }) else {
            debug!(source, year, file = %expected, "Member file not in archive");
            continue;
        };

        let mut content = Vec::new();
        let read = archive
            .by_name(member)
            .map_err(|e| e.to_string())
            .and_then(|mut f| f.read_to_end(&mut content).map_err(|e| e.to_string()));
        if let Err(e) = read {
            warn!(source, year, file = %member, error = %e, "Failed to read member file");
            continue;
        }

        match parse_report_csv(&content, &request.company, request.family, member) {
            Ok(table) if !table.is_empty() => {
                results.insert(*report_type, table);
            }
            Ok(_) => {}
            Err(e) => warn!(source, year, file = %member, error = %e, "Failed to parse member file"),
        }
    }

    debug!(source, year, report_types = results.len(), "Parsed archive");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const HEADER: &str = "CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;GRUPO_DFP;MOEDA;ESCALA_MOEDA;ORDEM_EXERC;DT_INI_EXERC;DT_FIM_EXERC;CD_CONTA;DS_CONTA;VL_CONTA;ST_CONTA_FIXA";

    fn latin1(s: &str) -> Vec<u8> {
        s.chars().map(|c| u8::try_from(u32::from(c)).unwrap()).collect()
    }

    fn company() -> CompanyKey<'static> {
        CompanyKey {
            code: "1234",
            tax_id: Some("84.429.695/0001-11"),
        }
    }

    fn zip_with(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_brazilian_numbers_with_scale() {
        let csv = format!(
            "{HEADER}\n\
             84.429.695/0001-11;2023-12-31;1;WEG SA;001234;DF Consolidado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.01;Receita de Venda;1.234,56;S\n\
             84.429.695/0001-11;2023-12-31;1;WEG SA;001234;DF Consolidado;REAL;UNIDADE;ÚLTIMO;2023-01-01;2023-12-31;3.02;Custo;1000,00;S\n\
             11.111.111/0001-11;2023-12-31;1;OUTRA SA;009999;DF Consolidado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.01;Receita;5,00;S\n"
        );
        let table =
            parse_report_csv(&latin1(&csv), &company(), ReportFamily::Dfp, "dre.csv").unwrap();

        assert_eq!(table.len(), 2);
        let rows = table.rows();
        assert_eq!(rows[0].value, Some(1_234_560.0));
        assert_eq!(rows[1].value, Some(1000.0));
        assert_eq!(rows[0].exercise_order, Some(ExerciseOrder::Final));
        assert_eq!(rows[0].source, ReportFamily::Dfp);
        assert_eq!(
            rows[0].reference_date,
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(rows[0].period_start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(rows[0].field("DENOM_CIA"), Some("WEG SA"));
        assert_eq!(rows[0].field("ESCALA_MOEDA"), Some("MIL"));
    }

    #[test]
    fn test_plain_numbers() {
        let csv = format!(
            "{HEADER}\n\
             84.429.695/0001-11;2023-09-30;1;WEG SA;1234;DF Consolidado;REAL;UNIDADE;ÚLTIMO;2023-01-01;2023-09-30;3.01;Receita;1234.5;S\n\
             84.429.695/0001-11;2023-09-30;1;WEG SA;1234;DF Consolidado;REAL;UNIDADE;ÚLTIMO;2023-01-01;2023-09-30;3.02;Custo;n/d;S\n"
        );
        let table =
            parse_report_csv(csv.as_bytes(), &company(), ReportFamily::Itr, "dre.csv").unwrap();
        assert_eq!(table.rows()[0].value, Some(1234.5));
        assert_eq!(table.rows()[1].value, None);
    }

    #[test]
    fn test_filter_by_padded_code() {
        let csv = "CD_CVM;CD_CONTA;DS_CONTA;VL_CONTA;DT_REFER\n\
                   001234;1;Ativo Total;10;2023-12-31\n\
                   4321;1;Ativo Total;20;2023-12-31\n";
        let table =
            parse_report_csv(csv.as_bytes(), &company(), ReportFamily::Dfp, "bpa.csv").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].value, Some(10.0));
    }

    #[test]
    fn test_filter_falls_back_to_tax_id() {
        let csv = "CNPJ_CIA;CD_CONTA;DS_CONTA;VL_CONTA;DT_REFER\n\
                   84.429.695/0001-11;1;Ativo Total;10;2023-12-31\n\
                   00.000.000/0001-00;1;Ativo Total;20;2023-12-31\n";
        let table =
            parse_report_csv(csv.as_bytes(), &company(), ReportFamily::Dfp, "bpa.csv").unwrap();
        assert_eq!(table.len(), 1);

        let nobody = CompanyKey {
            code: "777",
            tax_id: None,
        };
        let empty =
            parse_report_csv(csv.as_bytes(), &nobody, ReportFamily::Dfp, "bpa.csv").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_code_matches_win_over_earlier_tax_id_rows() {
        let csv = "CNPJ_CIA;CD_CVM;CD_CONTA;DS_CONTA;VL_CONTA;DT_REFER\n\
                   84.429.695/0001-11;9999;1;Ativo Total;5;2023-12-31\n\
                   00.000.000/0001-00;1234;1;Ativo Total;10;2023-12-31\n\
                   84.429.695/0001-11;9999;2;Passivo Total;7;2023-12-31\n\
                   00.000.000/0001-00;1234;2;Passivo Total;12;2023-12-31\n";
        let table =
            parse_report_csv(csv.as_bytes(), &company(), ReportFamily::Dfp, "bpa.csv").unwrap();

        let values: Vec<_> = table.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(10.0), Some(12.0)]);
    }

    #[test]
    fn test_latin1_rows_decoded_after_filtering() {
        let csv = "CD_CVM;CD_CONTA;DS_CONTA;VL_CONTA;DT_REFER\n\
                   4321;2.03;Patrimônio Líquido;1;2023-12-31\n\
                   1234;2.03;Patrimônio Líquido Consolidado;2;2023-12-31\n";
        let table =
            parse_report_csv(&latin1(csv), &company(), ReportFamily::Dfp, "bpp.csv").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].description, "Patrimônio Líquido Consolidado");
    }

    #[test]
    fn test_non_numeric_code_never_matches() {
        let csv = "CD_CVM;CD_CONTA;VL_CONTA\nABC;1;10\n";
        let key = CompanyKey {
            code: "ABC",
            tax_id: None,
        };
        let table = parse_report_csv(csv.as_bytes(), &key, ReportFamily::Dfp, "x.csv").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_archive_selects_members() {
        let dre = format!(
            "{HEADER}\n84.429.695/0001-11;2023-12-31;1;WEG SA;1234;DF Consolidado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.01;Receita;10;S\n"
        );
        let capital = "CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;QT_ACAO_ORDIN_CAP_INTEGR;QT_ACAO_PREF_CAP_INTEGR;QT_ACAO_TOTAL_CAP_INTEGR\n\
                       84.429.695/0001-11;2023-12-31;1;WEG SA;1234;4197317998;0;4197317998\n";
        let archive = zip_with(&[
            ("DFP_CIA_ABERTA_DRE_CON_2023.csv", latin1(&dre)),
            ("dfp_cia_aberta_dre_ind_2023.csv", latin1(&dre)),
            ("dfp_cia_aberta_composicao_capital_2023.csv", capital.as_bytes().to_vec()),
        ]);

        let request = ArchiveRequest {
            family: ReportFamily::Dfp,
            year: 2023,
            company: company(),
            report_types: &[ReportType::Dre, ReportType::Bpa, ReportType::CapitalComposition],
            consolidated: true,
        };
        let result = parse_archive(&archive, &request);

        assert_eq!(result.len(), 2);
        assert_eq!(result[&ReportType::Dre].rows()[0].value, Some(10_000.0));
        assert!(!result.contains_key(&ReportType::Bpa));
        let capital_rows = result[&ReportType::CapitalComposition].rows();
        assert_eq!(
            capital_rows[0].field("QT_ACAO_TOTAL_CAP_INTEGR"),
            Some("4197317998")
        );
    }

    #[test]
    fn test_corrupted_archive_is_empty() {
        let request = ArchiveRequest {
            family: ReportFamily::Itr,
            year: 2022,
            company: company(),
            report_types: &ReportType::ALL,
            consolidated: true,
        };
        assert!(parse_archive(b"definitely not a zip", &request).is_empty());
    }
}
