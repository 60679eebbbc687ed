//! Error types for pkgstore
//!
//! All modules use `StoreResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// All errors that can occur in pkgstore
#[derive(Error, Debug)]
pub enum StoreError {
    // Reference errors
    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Reference {reference} has no revision")]
    MissingRevision { reference: String },

    // Lookup errors
    #[error("Not found: {reference}")]
    NotFound { reference: String },

    #[error("Case mismatch: requested '{requested}' but '{existing}' exists")]
    CaseMismatch { requested: PathBuf, existing: PathBuf },

    #[error("Corrupted cache entry (interrupted write): {path}")]
    Corrupted { path: PathBuf },

    #[error("Invalid revision ledger {path} at line {line}: {reason}")]
    InvalidLedger {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // Lock errors
    #[error("Lock on {path} still busy after {attempts} attempts")]
    LockBusy { path: PathBuf, attempts: u32 },

    // Download errors
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // User errors
    #[error("{0}")]
    User(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl StoreError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a malformed reference error
    pub fn malformed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error for any displayable reference
    pub fn not_found(reference: impl ToString) -> Self {
        Self::NotFound {
            reference: reference.to_string(),
        }
    }

    /// Whether the caller can reasonably recover (e.g. fall back to a remote)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Corrupted { .. } => {
                Some("Remove this revision with `pkgstore remove <ref#rev>` and fetch it again")
            }
            Self::CaseMismatch { .. } => {
                Some("Use the exact casing of the existing reference or remove it first")
            }
            Self::InvalidLedger { .. } => {
                Some("Remove the damaged revisions.txt; affected revisions must be exported again")
            }
            Self::MissingRevision { .. } => Some("Append #<revision> to the reference"),
            Self::NotFound { .. } => Some("List known revisions with `pkgstore revisions <ref>`"),
            _ => None,
        }
    }
}
