// ==========================================
// PV PAN Tool - Ingestion coordinator
// ==========================================
// Flow: discover -> diff against registry -> parse concurrently ->
// commit in batches -> summarize.
// Parsing is a pure function per file, so workers share nothing
// mutable; every write is serialized through the repository's batch
// commit, one transaction per batch. A cancellation request is honored
// between batches: in-flight parses finish, nothing further commits.
// ==========================================

use crate::config::IngestConfig;
use crate::domain::module::ParseOutcome;
use crate::domain::registry::{
    FileFingerprint, FileRegistryEntry, IngestionStatus, IngestionSummary,
};
use crate::parser::pan_parser::PanParser;
use crate::repository::{FileCommit, ModuleRepository, RegistryRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

// ==========================================
// CancelFlag
// ==========================================
/// Cooperative cancellation handle. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==========================================
// ModuleIngestor trait
// ==========================================
// The collaborator-facing ingestion interface.
#[async_trait]
pub trait ModuleIngestor: Send + Sync {
    /// Ingest every .pan file under the given paths (files or
    /// directories, scanned recursively).
    ///
    /// # Arguments
    /// - paths: candidate files and/or directories
    /// - force_reparse: re-parse files whose fingerprint is unchanged
    /// - worker_count: parse pool override; None uses the configured size
    async fn ingest(
        &self,
        paths: Vec<PathBuf>,
        force_reparse: bool,
        worker_count: Option<usize>,
    ) -> anyhow::Result<IngestionSummary>;
}

// ==========================================
// IngestionCoordinator
// ==========================================
pub struct IngestionCoordinator {
    config: Arc<IngestConfig>,
    parser: Arc<PanParser>,
    module_repo: ModuleRepository,
    registry_repo: RegistryRepository,
    cancel: CancelFlag,
}

/// Per-file worker verdict.
enum WorkResult {
    SkippedUnchanged,
    Commit(Box<FileCommit>),
}

impl IngestionCoordinator {
    pub fn new(
        config: IngestConfig,
        module_repo: ModuleRepository,
        registry_repo: RegistryRepository,
    ) -> Self {
        let parser = Arc::new(PanParser::new(&config));
        Self {
            config: Arc::new(config),
            parser,
            module_repo,
            registry_repo,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling the current run between batches.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Recursively collect .pan files. Each file remembers the scan root
    /// it came from so manufacturer/model path hints stay relative.
    pub fn collect_candidates(paths: &[PathBuf]) -> Vec<(PathBuf, Option<PathBuf>)> {
        let mut out: Vec<(PathBuf, Option<PathBuf>)> = Vec::new();
        for root in paths {
            if root.is_dir() {
                for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
                    if entry.file_type().is_file() && has_pan_extension(entry.path()) {
                        out.push((entry.into_path(), Some(root.clone())));
                    }
                }
            } else if root.is_file() && has_pan_extension(root) {
                out.push((root.clone(), None));
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

#[async_trait]
impl ModuleIngestor for IngestionCoordinator {
    #[instrument(skip(self, paths), fields(run_id))]
    async fn ingest(
        &self,
        paths: Vec<PathBuf>,
        force_reparse: bool,
        worker_count: Option<usize>,
    ) -> anyhow::Result<IngestionSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let candidates = Self::collect_candidates(&paths);
        let total_candidates = candidates.len();
        let workers = worker_count.unwrap_or(self.config.worker_count).max(1);
        info!(
            candidates = total_candidates,
            workers,
            force_reparse,
            "ingestion run started"
        );

        // Registry snapshot for change detection; workers stay DB-free.
        let known: Arc<HashMap<String, FileRegistryEntry>> = Arc::new(
            self.registry_repo
                .list_all()?
                .into_iter()
                .map(|e| (e.path.clone(), e))
                .collect(),
        );

        let mut summary = IngestionSummary {
            run_id,
            total_candidates,
            parsed: 0,
            skipped_unchanged: 0,
            warned: 0,
            failed: 0,
            cancelled: false,
            elapsed: started.elapsed(),
        };

        let parser = Arc::clone(&self.parser);
        let mut results = stream::iter(candidates.into_iter().map(|(path, base)| {
            let parser = Arc::clone(&parser);
            let known = Arc::clone(&known);
            async move {
                let job_path = path.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    parse_one(&parser, &path, base.as_deref(), force_reparse, &known)
                });
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(path = %job_path.display(), error = %e, "parse worker panicked");
                        WorkResult::Commit(Box::new(FileCommit::Failed {
                            entry: failure_entry(
                                &job_path,
                                None,
                                format!("parse worker failed: {}", e),
                            ),
                        }))
                    }
                }
            }
        }))
        .buffer_unordered(workers);

        let mut pending: Vec<FileCommit> = Vec::with_capacity(self.config.batch_size);
        while let Some(result) = results.next().await {
            match result {
                WorkResult::SkippedUnchanged => summary.skipped_unchanged += 1,
                WorkResult::Commit(commit) => pending.push(*commit),
            }

            if pending.len() >= self.config.batch_size {
                self.commit_pending(&mut pending, &mut summary)?;
                if self.cancel.is_cancelled() {
                    summary.cancelled = true;
                    info!("cancellation requested, stopping after committed batch");
                    break;
                }
            }
        }
        drop(results);

        if !summary.cancelled && !pending.is_empty() {
            self.commit_pending(&mut pending, &mut summary)?;
        }

        summary.elapsed = started.elapsed();
        info!(
            parsed = summary.parsed,
            skipped = summary.skipped_unchanged,
            warned = summary.warned,
            failed = summary.failed,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "ingestion run finished"
        );
        Ok(summary)
    }
}

impl IngestionCoordinator {
    /// Commit the pending batch in one transaction and fold its counts
    /// into the summary.
    fn commit_pending(
        &self,
        pending: &mut Vec<FileCommit>,
        summary: &mut IngestionSummary,
    ) -> anyhow::Result<()> {
        let batch: Vec<FileCommit> = std::mem::take(pending);
        let size = batch.len();
        self.module_repo.commit_batch(&batch)?;
        for commit in &batch {
            match commit {
                FileCommit::Parsed { entry, .. } => {
                    summary.parsed += 1;
                    if entry.outcome == IngestionStatus::Warning {
                        summary.warned += 1;
                    }
                }
                FileCommit::Failed { .. } => summary.failed += 1,
            }
        }
        debug!(batch_size = size, "batch committed");
        Ok(())
    }
}

// ==========================================
// Per-file worker (runs on the blocking pool)
// ==========================================
fn parse_one(
    parser: &PanParser,
    path: &Path,
    base: Option<&Path>,
    force_reparse: bool,
    known: &HashMap<String, FileRegistryEntry>,
) -> WorkResult {
    // Read once: the same bytes feed the fingerprint and the parser.
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "file unreadable, marked failed");
            return WorkResult::Commit(Box::new(FileCommit::Failed {
                entry: failure_entry(path, None, format!("unreadable: {}", e)),
            }));
        }
    };
    let modified_at: DateTime<Utc> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(Into::into)
        .unwrap_or_else(|_| Utc::now());

    let fingerprint = FileFingerprint::of_bytes(path, modified_at, &bytes);

    if !force_reparse {
        if let Some(entry) = known.get(&fingerprint.path) {
            // Unchanged content (mtime ignored) and previously usable:
            // a no-op. Previously failed files are retried.
            if entry.outcome != IngestionStatus::Failed
                && entry.fingerprint().same_content(&fingerprint)
            {
                debug!(path = %path.display(), "unchanged, skipped");
                return WorkResult::SkippedUnchanged;
            }
        }
    }

    match parser.parse_bytes(path, modified_at, &bytes, base) {
        Ok(outcome) => {
            let entry = success_entry(&fingerprint, &outcome);
            WorkResult::Commit(Box::new(FileCommit::Parsed { outcome, entry }))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "structural parse failure");
            WorkResult::Commit(Box::new(FileCommit::Failed {
                entry: failure_entry(path, Some(&fingerprint), e.to_string()),
            }))
        }
    }
}

fn success_entry(fingerprint: &FileFingerprint, outcome: &ParseOutcome) -> FileRegistryEntry {
    let status = if outcome.has_warnings() {
        IngestionStatus::Warning
    } else {
        IngestionStatus::Success
    };
    FileRegistryEntry {
        path: fingerprint.path.clone(),
        file_size: fingerprint.file_size,
        modified_at: fingerprint.modified_at,
        content_hash: fingerprint.content_hash.clone(),
        parsed_at: Utc::now(),
        parser_version: crate::PARSER_VERSION.to_string(),
        outcome: status,
        error_message: None,
        warnings: outcome.warnings.clone(),
    }
}

fn failure_entry(
    path: &Path,
    fingerprint: Option<&FileFingerprint>,
    message: String,
) -> FileRegistryEntry {
    FileRegistryEntry {
        path: path.to_string_lossy().to_string(),
        file_size: fingerprint.map(|f| f.file_size).unwrap_or(0),
        modified_at: fingerprint
            .map(|f| f.modified_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        content_hash: fingerprint
            .map(|f| f.content_hash.clone())
            .unwrap_or_default(),
        parsed_at: Utc::now(),
        parser_version: crate::PARSER_VERSION.to_string(),
        outcome: IngestionStatus::Failed,
        error_message: Some(message),
        warnings: Vec::new(),
    }
}

fn has_pan_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("pan"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_pan_extension() {
        assert!(has_pan_extension(Path::new("a/b/spec.pan")));
        assert!(has_pan_extension(Path::new("a/b/SPEC.PAN")));
        assert!(!has_pan_extension(Path::new("a/b/spec.txt")));
        assert!(!has_pan_extension(Path::new("a/b/pan")));
    }

    #[test]
    fn test_cancel_flag_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
