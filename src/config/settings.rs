// ==========================================
// PV PAN Tool - Ingestion settings
// ==========================================
// Compiled defaults, optionally overridden from a JSON file.
// Invalid settings fail fast with ConfigError before any
// ingestion begins.
// ==========================================

use crate::config::key_table::{CanonicalField, KeyTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    FileParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),

    #[error("unknown canonical field in key-table extension: {0}")]
    UnknownField(String),
}

/// Result alias
pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// IngestConfig
// ==========================================
/// Immutable configuration shared with every parse worker.
///
/// Every knob the pipeline consumes lives here: series point cap,
/// worker pool size, batch size, encoding fallback order, curve block
/// markers, and candidate-key table extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum points accepted per curve series. Oversized series are
    /// rejected, not truncated, unless downsampling is requested.
    pub max_points_per_series: usize,

    /// When true, oversized series are downsampled to the cap (endpoints
    /// preserved) instead of rejected.
    pub downsample_oversized_series: bool,

    /// Bounded parse worker pool size.
    pub worker_count: usize,

    /// Files committed per store transaction.
    pub batch_size: usize,

    /// Encoding fallback order. The first entry is tried strictly; later
    /// entries are legacy fallbacks.
    pub encoding_fallbacks: Vec<String>,

    /// Header markers that open a curve point-list block
    /// (case-insensitive prefix match).
    pub block_markers: Vec<String>,

    /// Extra accepted raw-key spellings per canonical field name,
    /// appended to the built-in table.
    pub extra_key_spellings: HashMap<String, Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_points_per_series: 2000,
            downsample_oversized_series: false,
            worker_count: 4,
            batch_size: 50,
            encoding_fallbacks: vec![
                "utf-8".to_string(),
                "windows-1252".to_string(),
                "iso-8859-1".to_string(),
            ],
            block_markers: vec![
                "IVCurve".to_string(),
                "CurvePoints".to_string(),
                "PVObject_IVCurve".to_string(),
            ],
            extra_key_spellings: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from a JSON file on top of the defaults.
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: IngestConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::FileParseError {
                path: path.display().to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every setting. Called before any ingestion starts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_points_per_series < 4 {
            return Err(ConfigError::InvalidValue {
                key: "max_points_per_series".into(),
                value: self.max_points_per_series.to_string(),
                message: "must be at least 4 (the minimum stored series length)".into(),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "worker_count".into(),
                value: "0".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size".into(),
                value: "0".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.encoding_fallbacks.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "encoding_fallbacks".into(),
                value: "[]".into(),
                message: "at least one encoding is required".into(),
            });
        }
        for label in &self.encoding_fallbacks {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(ConfigError::UnknownEncoding(label.clone()));
            }
        }
        if self.block_markers.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "block_markers".into(),
                value: "[]".into(),
                message: "at least one block marker is required".into(),
            });
        }
        for field_name in self.extra_key_spellings.keys() {
            if CanonicalField::from_name(field_name).is_none() {
                return Err(ConfigError::UnknownField(field_name.clone()));
            }
        }
        Ok(())
    }

    /// Resolved candidate-key table (defaults + configured extensions).
    pub fn key_table(&self) -> KeyTable {
        KeyTable::with_extensions(&self.extra_key_spellings)
    }
}
