// 🌐 Snapshot Fetcher - single best-effort download
// Fetch URL, save body to path. No retry, no backoff: one attempt, and
// any failure propagates up and terminates the run.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Connect/read timeout for the single fetch attempt
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Download the registry dump and write it verbatim to `dest`.
///
/// The body is saved as raw bytes; decoding (UTF-8 with the Windows-1252
/// fallback) happens later at snapshot-read time.
pub fn download_snapshot(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch snapshot from {}", url))?
        .error_for_status()
        .with_context(|| format!("Snapshot source {} answered with an error status", url))?;

    let body = response
        .bytes()
        .context("Failed to read snapshot response body")?;

    fs::write(dest, &body)
        .with_context(|| format!("Failed to save snapshot to {}", dest.display()))?;

    Ok(())
}
