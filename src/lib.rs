// Municipality Registry Pipeline - Core Library
// Exposes all modules for use in the CLI and tests

pub mod model;
pub mod parser;
pub mod differ;
pub mod hashing;
pub mod exporter;
pub mod query;
pub mod fetcher;
pub mod pipeline;

// Re-export commonly used types
pub use model::{sanitize_field, Municipality, EXTRATERRITORIAL_UF};
pub use parser::{
    read_snapshot_lines, read_snapshot_text, SnapshotParser, FIELD_DELIMITER, MIN_FIELDS,
};
pub use differ::{write_change_report, SnapshotDiff, SnapshotDiffer};
pub use hashing::{
    KeyDerivationEngine, DEFAULT_ITERATIONS, DEFAULT_KEY_LENGTH, FIELD_SEPARATOR, SALT_PEPPER,
};
pub use exporter::{
    read_binary_export, ExportRecord, ExportSummary, ProgressObserver, RegionExporter,
    SilentProgress, CSV_HEADER, PROGRESS_BATCH,
};
pub use query::{run_query_loop, search, QueryFilter, MAX_RESULTS};
pub use fetcher::download_snapshot;
pub use pipeline::{
    ConsoleProgress, PipelineConfig, PipelineDriver, PipelineReport, DEFAULT_DATA_DIR,
    DEFAULT_SOURCE_URL,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
