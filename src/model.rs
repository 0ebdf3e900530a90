// 🏛️ Municipality Record Model
// One record per municipality, keyed by two registry code systems:
// TOM (Tabela de Órgãos e Municípios) and IBGE (national registry)

use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Placeholder region code for extraterritorial entries.
/// These records stay in memory for lookup but are never exported.
pub const EXTRATERRITORIAL_UF: &str = "EX";

// ============================================================================
// MUNICIPALITY RECORD
// ============================================================================

/// A single municipality registry record.
///
/// Immutable once constructed: the parser builds records from the active
/// snapshot and they are read-only for the rest of the run. No field is
/// ever `None` — missing source data becomes an empty string so persisted
/// outputs never carry nulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    /// TOM registry code (external registry)
    pub tom_code: String,

    /// IBGE registry code (national registry)
    /// Primary key for diffing, lookup and hash-salt derivation
    pub ibge_code: String,

    /// Name as registered in TOM
    pub tom_name: String,

    /// Name as registered in IBGE
    pub ibge_name: String,

    /// 2-letter administrative region code (UF), always upper-case
    pub uf: String,
}

impl Municipality {
    /// Build a record from raw field values.
    ///
    /// All fields are sanitized (trimmed, control characters stripped) and
    /// the UF is upper-cased so grouping never has to normalize again.
    pub fn new(
        tom_code: &str,
        ibge_code: &str,
        tom_name: &str,
        ibge_name: &str,
        uf: &str,
    ) -> Self {
        Municipality {
            tom_code: sanitize_field(tom_code),
            ibge_code: sanitize_field(ibge_code),
            tom_name: sanitize_field(tom_name),
            ibge_name: sanitize_field(ibge_name),
            uf: sanitize_field(uf).to_uppercase(),
        }
    }

    /// Display name used for sorting and searching.
    ///
    /// Prefers the IBGE name; falls back to the TOM name when the IBGE
    /// registry has no name for this record. Never persisted as a separate
    /// field in any output.
    pub fn preferred_name(&self) -> &str {
        if self.ibge_name.is_empty() {
            &self.tom_name
        } else {
            &self.ibge_name
        }
    }

    /// Extraterritorial placeholder records are excluded from export
    /// grouping but remain available to interactive lookup.
    pub fn is_extraterritorial(&self) -> bool {
        self.uf == EXTRATERRITORIAL_UF
    }

    /// Case-insensitive region comparison (UF is stored upper-case)
    pub fn in_region(&self, uf: &str) -> bool {
        self.uf.eq_ignore_ascii_case(uf.trim())
    }
}

// ============================================================================
// FIELD SANITIZATION
// ============================================================================

/// Sanitize a raw field value: strip control characters, then trim.
///
/// Control characters can leak in from the upstream dump (stray tabs,
/// carriage returns inside fields). Everything else passes through
/// untouched, accents included.
pub fn sanitize_field(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    stripped.trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
