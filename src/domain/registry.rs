// ==========================================
// PV PAN Tool - File registry domain model
// ==========================================
// Tracks which source files have been ingested and with what outcome.
// Written only by the ingestion coordinator's commit path; the query
// layer never mutates it.
// ==========================================

use crate::domain::module::ParseWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::time::Duration;

// ==========================================
// FileFingerprint - change-detection identity
// ==========================================
// Derived from path + modification time + content hash. Two snapshots
// of a path are "unchanged" when size, mtime and hash all agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: String,
    pub file_size: u64,
    pub modified_at: DateTime<Utc>,
    pub content_hash: String, // SHA-256 hex digest
}

impl FileFingerprint {
    /// Compute the fingerprint of a file on disk.
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let modified_at: DateTime<Utc> = meta.modified()?.into();
        let bytes = std::fs::read(path)?;
        Ok(Self {
            path: path.to_string_lossy().to_string(),
            file_size: meta.len(),
            modified_at,
            content_hash: sha256_hex(&bytes),
        })
    }

    /// Build a fingerprint from already-read bytes plus file metadata.
    pub fn of_bytes(path: &Path, modified_at: DateTime<Utc>, bytes: &[u8]) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            file_size: bytes.len() as u64,
            modified_at,
            content_hash: sha256_hex(bytes),
        }
    }

    /// Whether a registry snapshot still matches this fingerprint.
    pub fn matches(&self, other: &FileFingerprint) -> bool {
        self.file_size == other.file_size
            && self.modified_at == other.modified_at
            && self.content_hash == other.content_hash
    }

    /// Content identity only. The skip decision uses this: a touched
    /// mtime with unchanged bytes is still a no-op.
    pub fn same_content(&self, other: &FileFingerprint) -> bool {
        self.file_size == other.file_size && self.content_hash == other.content_hash
    }
}

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ==========================================
// IngestionStatus - per-file outcome
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Success,
    Warning,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Success => "success",
            IngestionStatus::Warning => "warning",
            IngestionStatus::Failed => "failed",
        }
    }

    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "success" => IngestionStatus::Success,
            "warning" => IngestionStatus::Warning,
            _ => IngestionStatus::Failed,
        }
    }
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FileRegistryEntry - persisted registry row
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRegistryEntry {
    pub path: String,
    pub file_size: u64,
    pub modified_at: DateTime<Utc>,
    pub content_hash: String,
    pub parsed_at: DateTime<Utc>,
    pub parser_version: String,
    pub outcome: IngestionStatus,
    pub error_message: Option<String>,
    pub warnings: Vec<ParseWarning>,
}

impl FileRegistryEntry {
    pub fn fingerprint(&self) -> FileFingerprint {
        FileFingerprint {
            path: self.path.clone(),
            file_size: self.file_size,
            modified_at: self.modified_at,
            content_hash: self.content_hash.clone(),
        }
    }
}

// ==========================================
// IngestionSummary - per-run report
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub run_id: String,
    pub total_candidates: usize,
    pub parsed: usize,
    pub skipped_unchanged: usize,
    pub warned: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}
