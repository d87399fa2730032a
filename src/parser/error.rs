// ==========================================
// PV PAN Tool - Parser error types
// ==========================================
// Structural failures only: a variant here aborts the single file it
// belongs to. Field- and series-level problems are ParseWarning values
// carried through the pipeline, never errors.
// ==========================================

use thiserror::Error;

/// Parser error type (file-level, structural)
#[derive(Error, Debug)]
pub enum ParseError {
    // ===== File access =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read file {path}: {message}")]
    FileReadError { path: String, message: String },

    // ===== Decoding =====
    #[error("content of {path} is not decodable with any configured encoding (tried: {tried})")]
    UndecodableContent { path: String, tried: String },

    // ===== Structure =====
    #[error("no key/value structure found in {0}")]
    EmptyStructure(String),

    // ===== Catch-all =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParseError {
    pub fn read_error(path: &std::path::Path, err: &std::io::Error) -> Self {
        ParseError::FileReadError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result alias
pub type ParseResult<T> = Result<T, ParseError>;
