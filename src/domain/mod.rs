// ==========================================
// PV PAN Tool - Domain layer
// ==========================================
// Entities and value types shared by the parser,
// ingestion, repository and query layers
// ==========================================

pub mod module;
pub mod registry;
pub mod types;

pub use module::{
    CurvePoint, CurveSeries, ElectricalParameters, FileMetadata, ModuleRecord, ParseOutcome,
    ParseWarning, PhysicalParameters,
};
pub use registry::{FileFingerprint, FileRegistryEntry, IngestionStatus, IngestionSummary};
pub use types::{CellType, ModuleType, SortDirection, WarningSeverity};
