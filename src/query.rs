// 🔎 Interactive Lookup - filter-and-print over the in-memory dataset
// Plain console loop; the underlying collection is never mutated

use crate::model::Municipality;
use anyhow::Result;
use std::io::{BufRead, Write};

// ============================================================================
// QUERY FILTER
// ============================================================================

/// Result cap for a single lookup
pub const MAX_RESULTS: usize = 50;

/// Ad-hoc filter over the in-memory collection.
///
/// All criteria are optional and combine with AND. Extraterritorial
/// records are searchable here even though the exporter skips them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    /// Exact region match, case-insensitive
    pub region: Option<String>,

    /// Case-insensitive substring match on the preferred name
    pub name_contains: Option<String>,

    /// Exact match on either the TOM or the IBGE code
    pub code: Option<String>,
}

impl QueryFilter {
    /// Build a filter from raw prompt input; empty answers mean
    /// "no criterion"
    pub fn from_inputs(region: &str, name: &str, code: &str) -> Self {
        QueryFilter {
            region: non_empty(region),
            name_contains: non_empty(name),
            code: non_empty(code),
        }
    }

    pub fn matches(&self, record: &Municipality) -> bool {
        if let Some(region) = &self.region {
            if !record.in_region(region) {
                return false;
            }
        }

        if let Some(fragment) = &self.name_contains {
            let haystack = record.preferred_name().to_lowercase();
            if !haystack.contains(&fragment.to_lowercase()) {
                return false;
            }
        }

        if let Some(code) = &self.code {
            if record.tom_code != *code && record.ibge_code != *code {
                return false;
            }
        }

        true
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Return at most `MAX_RESULTS` matching records, in collection order
pub fn search<'a>(records: &'a [Municipality], filter: &QueryFilter) -> Vec<&'a Municipality> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .take(MAX_RESULTS)
        .collect()
}

// ============================================================================
// INTERACTIVE LOOP
// ============================================================================

/// Console lookup loop. Prompts for UF / name fragment / code on each
/// round; an empty UF answer terminates the loop.
pub fn run_query_loop(records: &[Municipality]) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();

    run_loop_with(records, &mut input, &mut output)
}

/// Loop body over explicit streams so tests can drive it
pub fn run_loop_with<R: BufRead, W: Write>(
    records: &[Municipality],
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    loop {
        write!(output, "\nUF (empty to quit): ")?;
        output.flush()?;
        let region = match read_line(input)? {
            Some(line) => line,
            None => break,
        };
        if region.trim().is_empty() {
            break;
        }

        write!(output, "Name contains (optional): ")?;
        output.flush()?;
        let name = read_line(input)?.unwrap_or_default();

        write!(output, "TOM/IBGE code (optional): ")?;
        output.flush()?;
        let code = read_line(input)?.unwrap_or_default();

        let filter = QueryFilter::from_inputs(&region, &name, &code);
        let results = search(records, &filter);

        if results.is_empty() {
            writeln!(output, "No municipality matches the filter.")?;
            continue;
        }

        writeln!(output, "{} result(s):", results.len())?;
        for record in &results {
            writeln!(
                output,
                "  {} | {} | {} ({})",
                record.tom_code,
                record.ibge_code,
                record.preferred_name(),
                record.uf
            )?;
        }
        if results.len() == MAX_RESULTS {
            writeln!(output, "  ... result list capped at {}", MAX_RESULTS)?;
        }
    }

    Ok(())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Ok(None); // EOF terminates like an empty answer
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

// ============================================================================
// TESTS
// ============================================================================
