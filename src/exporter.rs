// 📦 Region Exporter - partitioned multi-format output
// One file set per UF: delimited text + JSON document + fixed-layout binary
//
// The three outputs of a group enumerate records in the same sorted order,
// so row i of each format refers to the same municipality. The binary form
// carries the five raw fields only, never the hash.

use crate::hashing::KeyDerivationEngine;
use crate::model::{Municipality, EXTRATERRITORIAL_UF};
use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

// ============================================================================
// FORMAT CONSTANTS
// ============================================================================

/// Header row of the per-group delimited output
pub const CSV_HEADER: [&str; 6] = ["TOM", "IBGE", "NomeTOM", "NomeIBGE", "UF", "Hash"];

/// Progress is reported every this many records, plus on group completion
pub const PROGRESS_BATCH: usize = 50;

// ============================================================================
// PROGRESS OBSERVER
// ============================================================================

/// Observational side channel for the CPU-bound export loop.
/// Purely informational, never part of the output contract.
pub trait ProgressObserver {
    /// Called after every `PROGRESS_BATCH` records of a group
    fn on_batch(&self, uf: &str, processed: usize);

    /// Called once per group, after its three files are written
    fn on_group_complete(&self, uf: &str, total: usize);
}

/// No-op observer for tests and library callers
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_batch(&self, _uf: &str, _processed: usize) {}
    fn on_group_complete(&self, _uf: &str, _total: usize) {}
}

// ============================================================================
// EXPORT RECORD (JSON shape)
// ============================================================================

/// Per-record shape of the JSON document output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "Tom")]
    pub tom: String,

    #[serde(rename = "Ibge")]
    pub ibge: String,

    #[serde(rename = "NomeTom")]
    pub nome_tom: String,

    #[serde(rename = "NomeIbge")]
    pub nome_ibge: String,

    #[serde(rename = "Uf")]
    pub uf: String,

    #[serde(rename = "Hash")]
    pub hash: String,
}

impl ExportRecord {
    fn from_record(record: &Municipality, hash: &str) -> Self {
        ExportRecord {
            tom: record.tom_code.clone(),
            ibge: record.ibge_code.clone(),
            nome_tom: record.tom_name.clone(),
            nome_ibge: record.ibge_name.clone(),
            uf: record.uf.clone(),
            hash: hash.to_string(),
        }
    }
}

// ============================================================================
// EXPORT SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Number of region groups written
    pub group_count: usize,

    /// Number of records across all written groups
    pub record_count: usize,

    /// Records excluded from export because their UF is "EX"
    pub extraterritorial_skipped: usize,

    /// Every file produced, in write order
    pub files: Vec<PathBuf>,
}

impl ExportSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} records in {} groups ({} files, {} extraterritorial skipped)",
            self.record_count,
            self.group_count,
            self.files.len(),
            self.extraterritorial_skipped
        )
    }
}

// ============================================================================
// REGION EXPORTER
// ============================================================================

pub struct RegionExporter {
    output_dir: PathBuf,
    engine: KeyDerivationEngine,
}

impl RegionExporter {
    pub fn new(output_dir: impl Into<PathBuf>, engine: KeyDerivationEngine) -> Self {
        RegionExporter {
            output_dir: output_dir.into(),
            engine,
        }
    }

    /// Output paths are derived from the region code alone, so no two
    /// groups can ever collide.
    pub fn csv_path(&self, uf: &str) -> PathBuf {
        self.output_dir.join(format!("municipios_{}.csv", uf))
    }

    pub fn json_path(&self, uf: &str) -> PathBuf {
        self.output_dir.join(format!("municipios_{}.json", uf))
    }

    pub fn binary_path(&self, uf: &str) -> PathBuf {
        self.output_dir.join(format!("municipios_{}.bin", uf))
    }

    /// Group records by upper-cased UF, excluding the extraterritorial
    /// placeholder group. BTreeMap keys come out in sorted order, which is
    /// exactly the group processing order the pipeline wants.
    pub fn group_by_region<'a>(
        &self,
        records: &'a [Municipality],
    ) -> BTreeMap<String, Vec<&'a Municipality>> {
        let mut groups: BTreeMap<String, Vec<&Municipality>> = BTreeMap::new();

        for record in records {
            let key = record.uf.to_uppercase();
            if key == EXTRATERRITORIAL_UF {
                continue;
            }
            groups.entry(key).or_default().push(record);
        }

        groups
    }

    /// Export every non-extraterritorial group, one after another in
    /// sorted key order. Each group's three files are opened, fully
    /// written and closed before the next group starts; on error, partial
    /// files stay on disk and the run aborts.
    pub fn export_all(
        &self,
        records: &[Municipality],
        progress: &dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let groups = self.group_by_region(records);
        let grouped_total: usize = groups.values().map(Vec::len).sum();

        let mut summary = ExportSummary {
            group_count: groups.len(),
            record_count: grouped_total,
            extraterritorial_skipped: records.len() - grouped_total,
            files: Vec::new(),
        };

        for (uf, mut group) in groups {
            self.export_group(&uf, &mut group, progress, &mut summary.files)?;
            progress.on_group_complete(&uf, group.len());
        }

        Ok(summary)
    }

    fn export_group(
        &self,
        uf: &str,
        group: &mut Vec<&Municipality>,
        progress: &dyn ProgressObserver,
        files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        // sort by preferred name, case-insensitive ascending
        group.sort_by_key(|record| record.preferred_name().to_lowercase());

        // derive hashes up front; this is the CPU-bound part of the run
        let mut rows: Vec<(&Municipality, String)> = Vec::with_capacity(group.len());
        for (index, record) in group.iter().enumerate() {
            rows.push((*record, self.engine.derive_hash(record)));

            let processed = index + 1;
            if processed % PROGRESS_BATCH == 0 {
                progress.on_batch(uf, processed);
            }
        }

        let csv_path = self.csv_path(uf);
        self.write_delimited(&csv_path, &rows)
            .with_context(|| format!("Failed to write delimited output for {}", uf))?;
        files.push(csv_path);

        let json_path = self.json_path(uf);
        self.write_json(&json_path, &rows)
            .with_context(|| format!("Failed to write JSON output for {}", uf))?;
        files.push(json_path);

        let binary_path = self.binary_path(uf);
        self.write_binary(&binary_path, &rows)
            .with_context(|| format!("Failed to write binary output for {}", uf))?;
        files.push(binary_path);

        Ok(())
    }

    /// Delimited output: header + one ';'-joined row per record, hash as
    /// the final column. UTF-8, no BOM.
    fn write_delimited(&self, path: &Path, rows: &[(&Municipality, String)]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)?;

        writer.write_record(CSV_HEADER)?;

        for (record, hash) in rows {
            writer.write_record([
                record.tom_code.as_str(),
                record.ibge_code.as_str(),
                record.tom_name.as_str(),
                record.ibge_name.as_str(),
                record.uf.as_str(),
                hash.as_str(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// JSON output: array of objects, same record order, human-readable
    /// indentation
    fn write_json(&self, path: &Path, rows: &[(&Municipality, String)]) -> Result<()> {
        let documents: Vec<ExportRecord> = rows
            .iter()
            .map(|(record, hash)| ExportRecord::from_record(record, hash))
            .collect();

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &documents)?;
        writer.flush()?;
        Ok(())
    }

    /// Binary output layout:
    ///   [i32 LE record count]
    ///   per record, in order: TOM, IBGE, NomeTOM, NomeIBGE, UF
    ///   each string as [u32 LE byte length][UTF-8 bytes]
    /// No padding, no hash.
    fn write_binary(&self, path: &Path, rows: &[(&Municipality, String)]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_i32::<LittleEndian>(rows.len() as i32)?;

        for (record, _hash) in rows {
            write_binary_field(&mut writer, &record.tom_code)?;
            write_binary_field(&mut writer, &record.ibge_code)?;
            write_binary_field(&mut writer, &record.tom_name)?;
            write_binary_field(&mut writer, &record.ibge_name)?;
            write_binary_field(&mut writer, &record.uf)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn write_binary_field<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_u32::<LittleEndian>(value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

// ============================================================================
// BINARY READER
// ============================================================================

/// Read a per-group binary file back into records.
///
/// The binary format is meant to be independently consumable; this reader
/// is also what the cross-format tests use to check row correspondence.
pub fn read_binary_export(path: &Path) -> Result<Vec<Municipality>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open binary export {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let count = reader.read_i32::<LittleEndian>().context("Missing record count")?;
    if count < 0 {
        bail!("Corrupt binary export: negative record count {}", count);
    }

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(Municipality {
            tom_code: read_binary_field(&mut reader)?,
            ibge_code: read_binary_field(&mut reader)?,
            tom_name: read_binary_field(&mut reader)?,
            ibge_name: read_binary_field(&mut reader)?,
            uf: read_binary_field(&mut reader)?,
        });
    }

    Ok(records)
}

fn read_binary_field<R: Read>(reader: &mut R) -> Result<String> {
    let length = reader.read_u32::<LittleEndian>().context("Missing field length")?;

    let mut bytes = vec![0u8; length as usize];
    reader
        .read_exact(&mut bytes)
        .context("Truncated binary field")?;

    String::from_utf8(bytes).context("Binary field is not valid UTF-8")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const TEST_ITERATIONS: u32 = 100;

    fn test_engine() -> KeyDerivationEngine {
        KeyDerivationEngine::with_parameters(TEST_ITERATIONS, 32)
    }

    fn create_test_records() -> Vec<Municipality> {
        vec![
            Municipality::new("7107", "3550308", "São Paulo", "São Paulo", "SP"),
            Municipality::new("0001", "5300108", "Brasília", "Brasília", "DF"),
            Municipality::new("6001", "3509502", "Campinas", "Campinas", "SP"),
            Municipality::new("9701", "9999999", "Exterior", "Exterior", "EX"),
            Municipality::new("6477", "3548906", "Santos", "", "SP"),
        ]
    }

    #[test]
    fn test_grouping_excludes_extraterritorial() {
        let exporter = RegionExporter::new("unused", test_engine());
        let records = create_test_records();

        let groups = exporter.group_by_region(&records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["DF"].len(), 1);
        assert_eq!(groups["SP"].len(), 3);
        assert!(!groups.contains_key("EX"));

        println!("✅ Grouping test passed");
    }

    #[test]
    fn test_group_keys_come_out_sorted() {
        let exporter = RegionExporter::new("unused", test_engine());
        let records = vec![
            Municipality::new("1", "1100205", "Porto Velho", "Porto Velho", "RO"),
            Municipality::new("2", "2704302", "Maceió", "Maceió", "AL"),
            Municipality::new("3", "5300108", "Brasília", "Brasília", "DF"),
        ];

        let keys: Vec<String> = exporter.group_by_region(&records).into_keys().collect();
        assert_eq!(keys, ["AL", "DF", "RO"]);

        println!("✅ Group ordering test passed");
    }

    #[test]
    fn test_export_writes_three_files_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        let summary = exporter
            .export_all(&create_test_records(), &SilentProgress)
            .unwrap();

        assert_eq!(summary.group_count, 2);
        assert_eq!(summary.record_count, 4);
        assert_eq!(summary.extraterritorial_skipped, 1);
        assert_eq!(summary.files.len(), 6);

        for uf in ["DF", "SP"] {
            assert!(exporter.csv_path(uf).exists());
            assert!(exporter.json_path(uf).exists());
            assert!(exporter.binary_path(uf).exists());
        }
        assert!(!exporter.csv_path("EX").exists());

        println!("✅ Export file set test passed: {}", summary.summary());
    }

    #[test]
    fn test_delimited_output_shape_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        exporter
            .export_all(&create_test_records(), &SilentProgress)
            .unwrap();

        let content = std::fs::read_to_string(exporter.csv_path("SP")).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "TOM;IBGE;NomeTOM;NomeIBGE;UF;Hash");
        assert_eq!(lines.len(), 4); // header + 3 records

        // sorted by preferred name: Campinas, Santos, São Paulo.
        // Santos has an empty IBGE name, so its TOM name sorts it.
        assert!(lines[1].starts_with("6001;3509502;Campinas;Campinas;SP;"));
        assert!(lines[2].starts_with("6477;3548906;Santos;;SP;"));
        assert!(lines[3].starts_with("7107;3550308;São Paulo;São Paulo;SP;"));

        // hash is the final column: 64 lower-hex chars
        for line in &lines[1..] {
            let hash = line.rsplit(';').next().unwrap();
            assert_eq!(hash.len(), 64);
            assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        }

        println!("✅ Delimited output test passed");
    }

    #[test]
    fn test_json_matches_delimited_row_for_row() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        exporter
            .export_all(&create_test_records(), &SilentProgress)
            .unwrap();

        let json = std::fs::read_to_string(exporter.json_path("SP")).unwrap();
        let documents: Vec<ExportRecord> = serde_json::from_str(&json).unwrap();

        let csv = std::fs::read_to_string(exporter.csv_path("SP")).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();

        assert_eq!(documents.len(), rows.len());
        for (doc, row) in documents.iter().zip(&rows) {
            let fields: Vec<&str> = row.split(';').collect();
            assert_eq!(doc.tom, fields[0]);
            assert_eq!(doc.ibge, fields[1]);
            assert_eq!(doc.nome_tom, fields[2]);
            assert_eq!(doc.nome_ibge, fields[3]);
            assert_eq!(doc.uf, fields[4]);
            assert_eq!(doc.hash, fields[5]);
        }

        // field names follow the document convention
        assert!(json.contains("\"Tom\""));
        assert!(json.contains("\"NomeIbge\""));
        assert!(json.contains("\"Hash\""));

        println!("✅ JSON correspondence test passed");
    }

    #[test]
    fn test_binary_matches_delimited_row_for_row() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        exporter
            .export_all(&create_test_records(), &SilentProgress)
            .unwrap();

        let decoded = read_binary_export(&exporter.binary_path("SP")).unwrap();

        let csv = std::fs::read_to_string(exporter.csv_path("SP")).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();

        assert_eq!(decoded.len(), rows.len());
        for (record, row) in decoded.iter().zip(&rows) {
            let fields: Vec<&str> = row.split(';').collect();
            assert_eq!(record.tom_code, fields[0]);
            assert_eq!(record.ibge_code, fields[1]);
            assert_eq!(record.tom_name, fields[2]);
            assert_eq!(record.ibge_name, fields[3]);
            assert_eq!(record.uf, fields[4]);
        }

        println!("✅ Binary correspondence test passed");
    }

    #[test]
    fn test_binary_layout_has_no_hash() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        exporter
            .export_all(&create_test_records(), &SilentProgress)
            .unwrap();

        let bytes = std::fs::read(exporter.binary_path("DF")).unwrap();

        // exact layout for the single DF record:
        // count + 5 length-prefixed fields, nothing else
        let record = Municipality::new("0001", "5300108", "Brasília", "Brasília", "DF");
        let expected_len = 4
            + [
                record.tom_code.len(),
                record.ibge_code.len(),
                record.tom_name.len(),
                record.ibge_name.len(),
                record.uf.len(),
            ]
            .iter()
            .map(|len| 4 + len)
            .sum::<usize>();

        assert_eq!(bytes.len(), expected_len);
        assert_eq!(&bytes[..4], &1i32.to_le_bytes());

        println!("✅ Binary layout test passed");
    }

    #[test]
    fn test_empty_group_set_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        let only_ex = vec![Municipality::new("9701", "9999999", "Exterior", "Exterior", "EX")];
        let summary = exporter.export_all(&only_ex, &SilentProgress).unwrap();

        assert_eq!(summary.group_count, 0);
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.extraterritorial_skipped, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        println!("✅ Empty export test passed");
    }

    struct CountingProgress {
        batches: RefCell<Vec<(String, usize)>>,
        completed: RefCell<Vec<(String, usize)>>,
    }

    impl CountingProgress {
        fn new() -> Self {
            CountingProgress {
                batches: RefCell::new(Vec::new()),
                completed: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProgressObserver for CountingProgress {
        fn on_batch(&self, uf: &str, processed: usize) {
            self.batches.borrow_mut().push((uf.to_string(), processed));
        }

        fn on_group_complete(&self, uf: &str, total: usize) {
            self.completed.borrow_mut().push((uf.to_string(), total));
        }
    }

    #[test]
    fn test_progress_batches_every_fifty_records() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = RegionExporter::new(dir.path(), test_engine());

        // 120 records in one group: batches at 50 and 100, then completion
        let records: Vec<Municipality> = (0..120)
            .map(|i| {
                Municipality::new(
                    &format!("{:04}", i),
                    &format!("31{:05}", i),
                    &format!("Cidade {:03}", i),
                    &format!("Cidade {:03}", i),
                    "MG",
                )
            })
            .collect();

        let progress = CountingProgress::new();
        exporter.export_all(&records, &progress).unwrap();

        assert_eq!(
            *progress.batches.borrow(),
            vec![("MG".to_string(), 50), ("MG".to_string(), 100)]
        );
        assert_eq!(*progress.completed.borrow(), vec![("MG".to_string(), 120)]);

        println!("✅ Progress batching test passed");
    }
}
