// 🚇 Pipeline Driver - fetch → diff → parse → export orchestration
// Thin sequencing layer; every stage's real logic lives in its own module
//
// Snapshot bookkeeping: the first run persists the fetched data as the
// frozen base. Later runs save to the new-snapshot path, diff against the
// base and keep the base untouched. Promotion of new → base is a manual
// operation, never done here.

use crate::differ::{write_change_report, SnapshotDiff, SnapshotDiffer};
use crate::exporter::{ExportSummary, ProgressObserver, RegionExporter};
use crate::fetcher::download_snapshot;
use crate::hashing::KeyDerivationEngine;
use crate::model::Municipality;
use crate::parser::{read_snapshot_lines, SnapshotParser};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Default registry dump location
pub const DEFAULT_SOURCE_URL: &str =
    "https://servicodados.ibge.gov.br/api/v1/localidades/municipios";

/// Default working directory for snapshots, reports and exports
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding snapshots, change reports and the export tree
    pub data_dir: PathBuf,

    /// Where the registry dump is fetched from
    pub source_url: String,

    /// PBKDF2 iteration count for record fingerprints
    pub iterations: u32,

    /// Derived key length in bytes
    pub key_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            iterations: crate::hashing::DEFAULT_ITERATIONS,
            key_length: crate::hashing::DEFAULT_KEY_LENGTH,
        }
    }
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Frozen prior state; created on first run, never overwritten after
    pub fn base_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("municipios_base.txt")
    }

    /// Freshly fetched state; rewritten on every non-first run
    pub fn new_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("municipios_novo.txt")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("export")
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug)]
pub struct PipelineReport {
    /// True when this run created the base snapshot
    pub first_run: bool,

    /// Snapshot the records were parsed from
    pub active_snapshot: PathBuf,

    /// Diff against the base (None on first run)
    pub diff: Option<SnapshotDiff>,

    /// Change report file, when the diff was non-empty
    pub change_report: Option<PathBuf>,

    /// Records parsed from the active snapshot (extraterritorial included)
    pub record_count: usize,

    pub export: ExportSummary,

    pub elapsed: Duration,
}

// ============================================================================
// CONSOLE PROGRESS
// ============================================================================

/// Progress observer printing console status lines
pub struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_batch(&self, uf: &str, processed: usize) {
        println!("   ⏳ {}: {} records hashed...", uf, processed);
    }

    fn on_group_complete(&self, uf: &str, total: usize) {
        println!("   ✓ {} complete ({} records)", uf, total);
    }
}

// ============================================================================
// PIPELINE DRIVER
// ============================================================================

pub struct PipelineDriver {
    config: PipelineConfig,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig) -> Self {
        PipelineDriver { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Full run: fetch the dump, then process it.
    pub fn run(&self) -> Result<PipelineReport> {
        std::fs::create_dir_all(&self.config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.config.data_dir.display())
        })?;

        let first_run = !self.config.base_snapshot_path().exists();
        let target = if first_run {
            // first run: fetched data becomes the base. A leftover new
            // snapshot would shadow it, so clear it out.
            let stale = self.config.new_snapshot_path();
            if stale.exists() {
                std::fs::remove_file(&stale)
                    .with_context(|| format!("Failed to remove stale snapshot {}", stale.display()))?;
            }
            self.config.base_snapshot_path()
        } else {
            self.config.new_snapshot_path()
        };

        println!("🌐 Fetching registry dump...");
        download_snapshot(&self.config.source_url, &target)?;
        println!("   ✓ Saved to {}", target.display());

        self.process(&ConsoleProgress)
    }

    /// Process already-downloaded snapshots: diff, parse, export.
    ///
    /// Split from `run` so tests (and offline reruns) can seed the
    /// snapshot files themselves.
    pub fn process(&self, progress: &dyn ProgressObserver) -> Result<PipelineReport> {
        let started = Instant::now();

        let base_path = self.config.base_snapshot_path();
        let new_path = self.config.new_snapshot_path();
        let has_base = base_path.exists();
        let has_new = new_path.exists();
        let first_run = !has_new;

        // diff only when both snapshots exist; the base stays frozen
        let (diff, change_report) = if !(has_base && has_new) {
            (None, None)
        } else {
            let diff_started = Instant::now();
            let base_lines = read_snapshot_lines(&base_path)?;
            let new_lines = read_snapshot_lines(&new_path)?;

            let diff = SnapshotDiffer::new().diff(&base_lines, &new_lines);
            println!("🔀 Diff vs base: {}", diff.summary());

            let report = write_change_report(&diff, &self.config.data_dir, Utc::now())?;
            if let Some(path) = &report {
                println!("   ✓ Change report: {}", path.display());
            }
            println!("   ⏱  Diff stage took {:?}", diff_started.elapsed());

            (Some(diff), report)
        };

        let active_snapshot = if has_new { new_path } else { base_path };

        println!("📄 Parsing {}...", active_snapshot.display());
        let records = SnapshotParser::new().parse_file(&active_snapshot)?;
        println!("   ✓ {} records parsed", records.len());

        let export = self.export(&records, progress)?;

        let report = PipelineReport {
            first_run,
            active_snapshot,
            diff,
            change_report,
            record_count: records.len(),
            export,
            elapsed: started.elapsed(),
        };

        println!("⏱  Pipeline finished in {:?}", report.elapsed);
        Ok(report)
    }

    fn export(
        &self,
        records: &[Municipality],
        progress: &dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        let export_started = Instant::now();
        println!("📦 Exporting to {}...", self.config.export_dir().display());

        let engine =
            KeyDerivationEngine::with_parameters(self.config.iterations, self.config.key_length);
        let exporter = RegionExporter::new(self.config.export_dir(), engine);

        let summary = exporter.export_all(records, progress)?;

        println!("   ✓ {}", summary.summary());
        println!("   ⏱  Export stage took {:?}", export_started.elapsed());
        Ok(summary)
    }

    /// Load the collection the interactive lookup runs over: the newest
    /// snapshot available on disk, extraterritorial records included.
    pub fn load_records_for_lookup(&self) -> Result<Vec<Municipality>> {
        let path = self.active_snapshot_on_disk().with_context(|| {
            format!(
                "No snapshot found under {}; run the pipeline first",
                self.config.data_dir.display()
            )
        })?;

        SnapshotParser::new().parse_file(&path)
    }

    fn active_snapshot_on_disk(&self) -> Option<PathBuf> {
        let new_path = self.config.new_snapshot_path();
        if new_path.exists() {
            return Some(new_path);
        }
        let base_path = self.config.base_snapshot_path();
        base_path.exists().then_some(base_path)
    }
}

// ============================================================================
// TESTS
// ============================================================================
