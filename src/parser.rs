// 📄 Snapshot Parser - semicolon-delimited registry dumps
// Loose positional rows in, strict Municipality records out

use crate::model::Municipality;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

// ============================================================================
// FORMAT CONSTANTS
// ============================================================================

/// Field delimiter used by the upstream registry dump
pub const FIELD_DELIMITER: u8 = b';';

/// Minimum number of fields a row must yield to become a record.
/// Extra columns beyond the fifth are ignored.
pub const MIN_FIELDS: usize = 5;

// ============================================================================
// SNAPSHOT READING (encoding fallback)
// ============================================================================

/// Read a snapshot file into a String.
///
/// The upstream dump is usually UTF-8, but older exports were produced on
/// Windows with the legacy single-byte code page. Decode UTF-8 first and
/// fall back to Windows-1252 when that fails. An empty file is fine and
/// yields an empty string.
pub fn read_snapshot_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

/// Read a snapshot file as raw lines (the differ operates on these).
pub fn read_snapshot_lines(path: &Path) -> Result<Vec<String>> {
    let text = read_snapshot_text(path)?;
    Ok(text.lines().map(str::to_string).collect())
}

// ============================================================================
// SNAPSHOT PARSER
// ============================================================================

/// Parses a registry snapshot into `Municipality` records.
///
/// Rows are positionally typed with no schema enforcement upstream, so the
/// parse boundary is where strictness happens:
/// - blank / whitespace-only lines are skipped
/// - rows with fewer than 5 fields are skipped (never an error)
/// - rows with an empty IBGE code after sanitization are skipped
///   (IBGE is the primary key; a record without it is unusable)
/// - an optional header row is auto-detected and skipped
pub struct SnapshotParser;

impl SnapshotParser {
    pub fn new() -> Self {
        SnapshotParser
    }

    /// Parse a snapshot file from disk
    pub fn parse_file(&self, path: &Path) -> Result<Vec<Municipality>> {
        let text = read_snapshot_text(path)?;
        Ok(self.parse_text(&text))
    }

    /// Parse already-decoded snapshot text.
    ///
    /// Malformed rows are silently dropped; parsing itself never fails.
    pub fn parse_text(&self, text: &str) -> Vec<Municipality> {
        // quoting(false): the dump is a naive semicolon join, a quote char
        // inside a name is literal content, not CSV quoting
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();

        for (index, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(_) => continue,
            };

            if index == 0 && is_header_row(&row) {
                continue;
            }

            if let Some(record) = parse_row(&row) {
                records.push(record);
            }
        }

        records
    }
}

impl Default for SnapshotParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Header auto-detection: row 0 is a header when its first two columns
/// carry the registry names (case-insensitive substring match).
fn is_header_row(row: &csv::StringRecord) -> bool {
    let first = row.get(0).unwrap_or("").to_lowercase();
    let second = row.get(1).unwrap_or("").to_lowercase();
    first.contains("tom") && second.contains("ibge")
}

/// Turn one positional row into a record, or None when the row is unusable
fn parse_row(row: &csv::StringRecord) -> Option<Municipality> {
    if row.len() < MIN_FIELDS {
        return None;
    }

    let record = Municipality::new(
        row.get(0).unwrap_or(""),
        row.get(1).unwrap_or(""),
        row.get(2).unwrap_or(""),
        row.get(3).unwrap_or(""),
        row.get(4).unwrap_or(""),
    );

    // IBGE code is required non-empty
    if record.ibge_code.is_empty() {
        return None;
    }

    Some(record)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_basic_rows() {
        let parser = SnapshotParser::new();
        let text = "0001;5300108;Brasília;Brasília;DF\n7107;3550308;São Paulo;São Paulo;SP\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tom_code, "0001");
        assert_eq!(records[0].ibge_code, "5300108");
        assert_eq!(records[0].tom_name, "Brasília");
        assert_eq!(records[0].ibge_name, "Brasília");
        assert_eq!(records[0].uf, "DF");
        assert_eq!(records[1].uf, "SP");

        println!("✅ Basic parse test passed");
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let parser = SnapshotParser::new();
        // 4 fields, blank line, whitespace-only line, 1 field
        let text = "0001;5300108;Brasília;DF\n\n   \nlonerow\n7107;3550308;São Paulo;São Paulo;SP\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ibge_code, "3550308");

        println!("✅ Malformed row exclusion test passed");
    }

    #[test]
    fn test_parse_skips_empty_ibge() {
        let parser = SnapshotParser::new();
        let text = "0001; ;Brasília;Brasília;DF\n7107;3550308;São Paulo;São Paulo;SP\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ibge_code, "3550308");

        println!("✅ Empty IBGE exclusion test passed");
    }

    #[test]
    fn test_header_row_detected_and_skipped() {
        let parser = SnapshotParser::new();
        let text = "TOM;IBGE;NomeTOM;NomeIBGE;UF\n0001;5300108;Brasília;Brasília;DF\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ibge_code, "5300108");

        println!("✅ Header detection test passed");
    }

    #[test]
    fn test_header_detection_only_checks_row_zero() {
        let parser = SnapshotParser::new();
        // a name starting with "Tom" in a later row must not be mistaken
        // for a header
        let text = "0001;5300108;Brasília;Brasília;DF\n5555;2802106;Tomar do Geru;Ibge-less;SE\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 2);

        println!("✅ Header position test passed");
    }

    #[test]
    fn test_extra_columns_ignored() {
        let parser = SnapshotParser::new();
        let text = "0001;5300108;Brasília;Brasília;DF;extra;columns\n";

        let records = parser.parse_text(text);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uf, "DF");

        println!("✅ Extra column test passed");
    }

    #[test]
    fn test_empty_text_yields_no_records() {
        let parser = SnapshotParser::new();
        assert!(parser.parse_text("").is_empty());

        println!("✅ Empty snapshot test passed");
    }

    #[test]
    fn test_read_snapshot_windows_1252_fallback() {
        // "São Tomé" in Windows-1252: ã = 0xE3, é = 0xE9 (invalid as UTF-8)
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0001;5300108;S\xE3o Tom\xE9;S\xE3o Tom\xE9;SP\n")
            .unwrap();

        let text = read_snapshot_text(file.path()).unwrap();
        assert!(text.contains("São Tomé"));

        let records = SnapshotParser::new().parse_text(&text);
        assert_eq!(records[0].tom_name, "São Tomé");

        println!("✅ Windows-1252 fallback test passed");
    }

    #[test]
    fn test_read_snapshot_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let lines = read_snapshot_lines(file.path()).unwrap();
        assert!(lines.is_empty());

        println!("✅ Empty file test passed");
    }
}
