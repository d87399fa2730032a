// ==========================================
// PV PAN Tool - Collaborator-facing API
// ==========================================
// Thin facade bundling the ingestion coordinator and query engine over
// one shared connection. CLI and desktop layers call these operations;
// they carry no business rules of their own.
// ==========================================

use crate::config::IngestConfig;
use crate::db::open_sqlite_connection;
use crate::domain::module::{CurveSeries, ModuleRecord};
use crate::domain::registry::{FileRegistryEntry, IngestionSummary};
use crate::ingest::{CancelFlag, IngestionCoordinator, ModuleIngestor};
use crate::query::{
    ComparisonResult, DatabaseStatistics, FilterSpec, QueryEngine, StatsGroupBy, StatsResult,
};
use crate::repository::{ModuleRepository, RegistryRepository, StoreResult};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct PvPanTool {
    coordinator: IngestionCoordinator,
    registry_repo: RegistryRepository,
    query_engine: QueryEngine,
}

impl PvPanTool {
    /// Open the tool against a database path.
    ///
    /// The configuration is validated up front; an invalid one fails
    /// here, before any ingestion can start. All components share one
    /// connection, which serializes every write through a single path.
    pub fn new(db_path: &str, config: IngestConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid ingestion configuration")?;

        let conn = open_sqlite_connection(db_path)
            .with_context(|| format!("failed to open database at {}", db_path))?;
        let conn = Arc::new(Mutex::new(conn));

        let module_repo = ModuleRepository::from_connection(Arc::clone(&conn))?;
        let registry_repo = RegistryRepository::from_connection(Arc::clone(&conn))?;
        let query_engine = QueryEngine::from_connection(Arc::clone(&conn));
        let coordinator = IngestionCoordinator::new(
            config,
            module_repo,
            RegistryRepository::from_connection(Arc::clone(&conn))?,
        );

        info!(db_path, "pv-pan-tool opened");
        Ok(Self {
            coordinator,
            registry_repo,
            query_engine,
        })
    }

    /// Open with the default configuration.
    pub fn with_defaults(db_path: &str) -> anyhow::Result<Self> {
        Self::new(db_path, IngestConfig::default())
    }

    // ==========================================
    // Ingestion
    // ==========================================
    pub async fn ingest(
        &self,
        paths: Vec<PathBuf>,
        force_reparse: bool,
        worker_count: Option<usize>,
    ) -> anyhow::Result<IngestionSummary> {
        self.coordinator
            .ingest(paths, force_reparse, worker_count)
            .await
    }

    /// Cancellation handle for the coordinator (honored between batches).
    pub fn cancel_flag(&self) -> CancelFlag {
        self.coordinator.cancel_flag()
    }

    /// Registry entries, for collaborators that surface ingestion state.
    pub fn file_registry(&self) -> StoreResult<Vec<FileRegistryEntry>> {
        self.registry_repo.list_all()
    }

    // ==========================================
    // Queries
    // ==========================================
    pub fn query(&self, spec: &FilterSpec) -> StoreResult<Vec<ModuleRecord>> {
        self.query_engine.query(spec)
    }

    pub fn get_module(&self, unique_id: &str) -> StoreResult<Option<ModuleRecord>> {
        self.query_engine.get_module(unique_id)
    }

    pub fn get_curve_series(&self, unique_id: &str) -> StoreResult<Vec<CurveSeries>> {
        self.query_engine.get_curve_series(unique_id)
    }

    pub fn compare(&self, unique_ids: &[String]) -> StoreResult<ComparisonResult> {
        self.query_engine.compare(unique_ids)
    }

    pub fn stats(&self, group_by: StatsGroupBy) -> StoreResult<StatsResult> {
        self.query_engine.stats(group_by)
    }

    pub fn database_statistics(&self) -> StoreResult<DatabaseStatistics> {
        self.query_engine.database_statistics()
    }

    pub fn export_csv<W: std::io::Write>(
        &self,
        spec: &FilterSpec,
        writer: W,
    ) -> StoreResult<usize> {
        self.query_engine.export_csv(spec, writer)
    }
}
