// ==========================================
// PV PAN Tool - Core Library
// ==========================================
// Ingestion, normalization and query core for
// vendor-supplied PV module .PAN specification files.
// Stack: Rust + SQLite
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Parser layer - tokenizer / field mapper / validator / assembler
pub mod parser;

// Ingestion layer - file discovery, change detection, batch commits
pub mod ingest;

// Repository layer - data access
pub mod repository;

// Query layer - filters, comparison, statistics
pub mod query;

// Configuration layer
pub mod config;

// Database infrastructure (connection init / unified PRAGMA)
pub mod db;

// Logging
pub mod logging;

// API layer - collaborator-facing surface
pub mod api;

// ==========================================
// Core type re-exports
// ==========================================

// Domain types
pub use domain::types::{CellType, ModuleType, SortDirection, WarningSeverity};

// Domain entities
pub use domain::{
    CurvePoint, CurveSeries, ElectricalParameters, FileMetadata, FileRegistryEntry,
    IngestionStatus, IngestionSummary, ModuleRecord, ParseOutcome, ParseWarning,
    PhysicalParameters,
};

// Parser
pub use parser::{FieldMapper, PanParser, RecordAssembler, Tokenizer, Validator};

// Ingestion
pub use ingest::{CancelFlag, IngestionCoordinator, ModuleIngestor};

// Query
pub use query::{
    ComparisonResult, DatabaseStatistics, FilterSpec, QueryEngine, SortKey, StatsGroupBy,
    StatsResult,
};

// Configuration
pub use config::{ConfigError, IngestConfig};

// API
pub use api::PvPanTool;

// ==========================================
// Constants
// ==========================================

// System version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// System name
pub const APP_NAME: &str = "PV PAN Tool";

// Parser version recorded in the file registry; bump when extraction
// semantics change so already-registered files are picked up again.
pub const PARSER_VERSION: &str = "1.0.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!PARSER_VERSION.is_empty());
    }
}
