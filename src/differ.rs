// 🔀 Snapshot Differ - line-set reconciliation between registry snapshots
// Reports which raw lines appeared and which disappeared since the base

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

// ============================================================================
// DIFF RESULT
// ============================================================================

/// Result of comparing two snapshots as unordered sets of whole lines.
///
/// Comparison is exact character equality per line, never per-field.
/// Duplicate lines collapse under set semantics, so multiplicity is not
/// preserved. Consumers must treat `added`/`removed` as sets, not
/// sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Lines present in the new snapshot but absent from the base
    pub added: BTreeSet<String>,

    /// Lines present in the base but absent from the new snapshot
    pub removed: BTreeSet<String>,
}

impl SnapshotDiff {
    /// True when the two snapshots contain the same line set
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed lines
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} removed ({} total changes)",
            self.added.len(),
            self.removed.len(),
            self.change_count()
        )
    }
}

// ============================================================================
// SNAPSHOT DIFFER
// ============================================================================

pub struct SnapshotDiffer;

impl SnapshotDiffer {
    pub fn new() -> Self {
        SnapshotDiffer
    }

    /// Compare two snapshots line-set against line-set.
    ///
    /// `added` = in `new_lines` but not `base_lines`;
    /// `removed` = in `base_lines` but not `new_lines`.
    /// Symmetric by construction: diff(a, b).added == diff(b, a).removed.
    pub fn diff(&self, base_lines: &[String], new_lines: &[String]) -> SnapshotDiff {
        let base: HashSet<&str> = base_lines.iter().map(String::as_str).collect();
        let new: HashSet<&str> = new_lines.iter().map(String::as_str).collect();

        let added = new
            .difference(&base)
            .map(|line| (*line).to_string())
            .collect();
        let removed = base
            .difference(&new)
            .map(|line| (*line).to_string())
            .collect();

        SnapshotDiff { added, removed }
    }
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CHANGE REPORT (caller-side effect)
// ============================================================================

/// Write the timestamped change report for a non-empty diff.
///
/// Format: `CHANGE;LINE` header, then one `+;<line>` row per addition
/// followed by one `-;<line>` row per removal. Returns `None` (and writes
/// nothing) when the diff is empty.
pub fn write_change_report(
    diff: &SnapshotDiff,
    dir: &Path,
    run_timestamp: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    if diff.is_empty() {
        return Ok(None);
    }

    let filename = format!("mudancas_{}.csv", run_timestamp.format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);

    // QuoteStyle::Never keeps the raw line intact in the second column,
    // semicolons included
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Never)
        .from_path(&path)
        .with_context(|| format!("Failed to create change report {}", path.display()))?;

    writer
        .write_record(["CHANGE", "LINE"])
        .context("Failed to write change report header")?;

    for line in &diff.added {
        writer
            .write_record(["+", line.as_str()])
            .context("Failed to write addition row")?;
    }
    for line in &diff.removed {
        writer
            .write_record(["-", line.as_str()])
            .context("Failed to write removal row")?;
    }

    writer.flush().context("Failed to flush change report")?;

    Ok(Some(path))
}

// ============================================================================
// TESTS
// ============================================================================
