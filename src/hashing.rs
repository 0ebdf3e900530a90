// 🔐 Key Derivation Engine - deterministic per-record fingerprints
// PBKDF2-HMAC-SHA256 over the concatenated record fields
//
// The salt is derived from the IBGE code plus a fixed pepper, NOT random.
// That is deliberate: identical record content must produce an identical
// hash across runs, so regenerated outputs can be diffed byte-for-byte.
// This is an idempotence property, not a password-storage scheme.

use crate::model::Municipality;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

// ============================================================================
// DERIVATION CONSTANTS
// ============================================================================

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 50_000;

/// Default derived key length in bytes (32 bytes = 64 hex chars)
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// Fixed application-wide pepper appended to the IBGE code when building
/// the salt. Must never change: every stored hash depends on it.
pub const SALT_PEPPER: &str = "registro-municipal-tom-ibge";

/// Separator joining the five fields into password material.
///
/// Fields are produced by splitting the source row on ';', so no sanitized
/// field can ever contain it. That makes the join unambiguous and stable
/// across runs.
pub const FIELD_SEPARATOR: &str = ";";

// ============================================================================
// KEY DERIVATION ENGINE
// ============================================================================

pub struct KeyDerivationEngine {
    /// PBKDF2 rounds (default: 50,000)
    pub iterations: u32,

    /// Derived key length in bytes (default: 32)
    pub output_len: usize,
}

impl KeyDerivationEngine {
    /// Create engine with default parameters
    pub fn new() -> Self {
        KeyDerivationEngine {
            iterations: DEFAULT_ITERATIONS,
            output_len: DEFAULT_KEY_LENGTH,
        }
    }

    pub fn with_parameters(iterations: u32, output_len: usize) -> Self {
        KeyDerivationEngine {
            iterations,
            output_len,
        }
    }

    /// Password material: all five fields in fixed order, ';'-joined
    pub fn password_material(&self, record: &Municipality) -> String {
        [
            record.tom_code.as_str(),
            record.ibge_code.as_str(),
            record.tom_name.as_str(),
            record.ibge_name.as_str(),
            record.uf.as_str(),
        ]
        .join(FIELD_SEPARATOR)
    }

    /// Salt bytes: UTF-8 encoding of IBGE code + pepper.
    ///
    /// Records sharing an IBGE code always get identical salt bytes,
    /// whatever their other fields hold.
    pub fn salt_bytes(&self, ibge_code: &str) -> Vec<u8> {
        format!("{}{}", ibge_code, SALT_PEPPER).into_bytes()
    }

    /// Derive the record fingerprint as a lower-case hex string.
    ///
    /// Infallible: password material and salt are Rust strings, already
    /// valid UTF-8, and PBKDF2 itself has no failure mode. Identical
    /// record + identical parameters ⇒ byte-identical output.
    pub fn derive_hash(&self, record: &Municipality) -> String {
        let password = self.password_material(record);
        let salt = self.salt_bytes(&record.ibge_code);

        let mut key = vec![0u8; self.output_len];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut key);

        hex::encode(key)
    }
}

impl Default for KeyDerivationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
