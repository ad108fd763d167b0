//! Delimited source reader
//!
//! Exports arrive as delimited text whose separator depends on the tool and
//! the spreadsheet locale that produced them. Comma is tried first; the
//! reader falls back to semicolon when the comma parse fails or collapses the
//! whole header into a single column. Rows shorter than the header are kept
//! with the trailing cells absent; a row wider than the header fails the
//! parse.

use crate::error::SourceError;
use std::collections::HashMap;
use std::path::Path;

/// One row of a source file: header name -> cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawIncidentRow {
    fields: HashMap<String, String>,
}

impl RawIncidentRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = HashMap::new();
        for (k, v) in pairs {
            // First occurrence of a duplicated header wins
            fields.entry(k.into()).or_insert_with(|| v.into());
        }
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(|s| s.as_str())
    }
}

/// Parsed source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    delimiter: u8,
    headers: Vec<String>,
    rows: Vec<RawIncidentRow>,
}

impl SourceTable {
    pub fn new(delimiter: u8, headers: Vec<String>, rows: Vec<RawIncidentRow>) -> Self {
        Self {
            delimiter,
            headers,
            rows,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let data = std::fs::read(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_bytes(&data)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.len(),
            delimiter = %(table.delimiter as char),
            "source loaded"
        );
        Ok(table)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SourceError> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(SourceError::Empty);
        }

        match parse_with(data, b',') {
            Ok(table) if !table.looks_semicolon_delimited() => Ok(table),
            Ok(_) => {
                tracing::debug!("single comma column contains ';', reparsing with semicolon");
                parse_with(data, b';')
            }
            Err(SourceError::Empty) => Err(SourceError::Empty),
            Err(e) => {
                tracing::debug!("comma parse failed ({}), retrying with semicolon", e);
                parse_with(data, b';')
            }
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawIncidentRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell values of one column, row by row
    pub fn column(&self, name: &str) -> Vec<Option<&str>> {
        self.rows.iter().map(|r| r.get(name)).collect()
    }

    fn looks_semicolon_delimited(&self) -> bool {
        self.headers.len() == 1 && self.headers[0].contains(';')
    }
}

fn parse_with(data: &[u8], delimiter: u8) -> Result<SourceTable, SourceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| clean_header(&String::from_utf8_lossy(h)))
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SourceError::Empty);
    }

    let mut rows = Vec::new();
    for record in rdr.byte_records() {
        let record = record?;
        if record.len() > headers.len() {
            return Err(SourceError::TooManyFields {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: headers.len(),
                found: record.len(),
            });
        }
        rows.push(RawIncidentRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), String::from_utf8_lossy(v).into_owned())),
        ));
    }

    Ok(SourceTable::new(delimiter, headers, rows))
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_source() {
        let data = b"ID,Descri\xc3\xa7\xc3\xa3o,Grupo\n1,\"Tipo da falha: Disco\nfim\",NOC\n2,texto,DBA\n";
        let table = SourceTable::from_bytes(data).unwrap();
        assert_eq!(table.delimiter(), b',');
        assert_eq!(table.headers(), &["ID", "Descrição", "Grupo"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows()[0].get("Descrição"),
            Some("Tipo da falha: Disco\nfim")
        );
        assert_eq!(table.column("Grupo"), vec![Some("NOC"), Some("DBA")]);
    }

    #[test]
    fn test_semicolon_source_single_column_fallback() {
        let data = "Número;Assunto;Data Hora de Abertura\nINC1;Rede - lenta;17/12/2025 10:00\n";
        let table = SourceTable::from_bytes(data.as_bytes()).unwrap();
        assert_eq!(table.delimiter(), b';');
        assert_eq!(table.rows()[0].get("Assunto"), Some("Rede - lenta"));
    }

    #[test]
    fn test_semicolon_source_ragged_comma_fallback() {
        // Commas inside values make the comma parse ragged
        let data = "Número;Assunto\nINC1;Falha, grave\nINC2;ok\n";
        let table = SourceTable::from_bytes(data.as_bytes()).unwrap();
        assert_eq!(table.delimiter(), b';');
        assert_eq!(table.rows()[0].get("Assunto"), Some("Falha, grave"));
    }

    #[test]
    fn test_short_comma_row_keeps_comma_delimiter() {
        let data = "ID,Description,Created,Grupo\n\
D1,x,17/12/2025 10:00:00,NOC\n\
D2,y,18/12/2025 10:00:00\n";
        let table = SourceTable::from_bytes(data.as_bytes()).unwrap();
        assert_eq!(table.delimiter(), b',');
        assert_eq!(table.headers(), &["ID", "Description", "Created", "Grupo"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].get("Created"), Some("18/12/2025 10:00:00"));
        assert_eq!(table.column("Grupo"), vec![Some("NOC"), None]);
    }

    #[test]
    fn test_wide_row_is_rejected() {
        assert!(matches!(
            parse_with(b"ID,Grupo\n1,NOC,extra\n", b','),
            Err(SourceError::TooManyFields {
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_bom_and_whitespace_stripped_from_headers() {
        let data = "\u{feff} ID , Grupo\n1,NOC\n";
        let table = SourceTable::from_bytes(data.as_bytes()).unwrap();
        assert_eq!(table.headers(), &["ID", "Grupo"]);
        assert_eq!(table.rows()[0].get("ID"), Some("1"));
    }

    #[test]
    fn test_latin1_bytes_decoded_lossily() {
        let data = b"ID,Grupo\n1,Opera\xe7\xf5es\n";
        let table = SourceTable::from_bytes(data).unwrap();
        assert!(table.rows()[0].get("Grupo").unwrap().starts_with("Opera"));
    }

    #[test]
    fn test_empty_source_is_error() {
        assert!(matches!(
            SourceTable::from_bytes(b"  \n"),
            Err(SourceError::Empty)
        ));
    }

    #[test]
    fn test_duplicate_header_keeps_first_value() {
        let row = RawIncidentRow::from_pairs([("ID", "1"), ("ID", "2")]);
        assert_eq!(row.get("ID"), Some("1"));
    }
}
