//! Error types for cidx operations.
//!
//! Errors are split along the same line as the indexing pipeline:
//!
//! - **`Error`**: failures that halt a build, update or query (storage
//!   integrity, unreadable manifest, bad configuration)
//! - **`IndexError`**: failures scoped to one file, collected into the build
//!   report while the batch continues
//!
//! `IndexErrorKind` separates input problems (the source or manifest is at
//! fault) from internal problems (the indexer or its environment is at fault).

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cidx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for cidx operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed, including foreign-key violations
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compile commands manifest is not valid JSON
    #[error("compile commands error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tree-sitter parsing infrastructure failed
    #[error("parser error: {0}")]
    Parser(String),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// Invariant broken inside cidx itself
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error encountered while indexing a specific file.
///
/// These never abort a batch. The file's previous rows are dropped and
/// whatever could still be extracted is kept.
#[derive(Debug, Clone)]
pub struct IndexError {
    /// Path to the file that failed
    pub path: PathBuf,
    /// Category of the error
    pub kind: IndexErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for IndexError {}

/// Categorization of per-file indexing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    // === Input problems ===
    /// The front end produced no syntax tree at all
    ParseFailed,

    /// The syntax tree contains error nodes; extraction was partial
    SyntaxErrors,

    /// File content is not valid UTF-8
    EncodingError,

    /// A typedef chain exceeded the configured hop limit
    TypedefChainTooDeep,

    /// The file has no entry in the compile commands manifest
    NoCompileCommand,

    // === Internal problems ===
    /// Could not read the file from disk
    IoError,

    /// Database operation failed for this file
    DatabaseError,
}

impl std::fmt::Display for IndexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseFailed => write!(f, "parse failed"),
            Self::SyntaxErrors => write!(f, "syntax errors"),
            Self::EncodingError => write!(f, "encoding error"),
            Self::TypedefChainTooDeep => write!(f, "typedef chain too deep"),
            Self::NoCompileCommand => write!(f, "no compile command"),
            Self::IoError => write!(f, "I/O error"),
            Self::DatabaseError => write!(f, "database error"),
        }
    }
}

impl IndexErrorKind {
    /// Returns `true` if the source file or manifest is at fault.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::ParseFailed
                | Self::SyntaxErrors
                | Self::EncodingError
                | Self::TypedefChainTooDeep
                | Self::NoCompileCommand
        )
    }

    /// Returns `true` if the indexer or its environment is at fault.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::IoError | Self::DatabaseError)
    }
}

impl IndexError {
    /// Create a new indexing error.
    #[must_use]
    pub fn new(path: PathBuf, kind: IndexErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create a parse error for a file.
    #[must_use]
    pub fn parse_failed(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(path, IndexErrorKind::ParseFailed, message)
    }

    /// Create an error for a file whose syntax tree contained errors.
    #[must_use]
    pub fn syntax_errors(path: PathBuf, count: usize) -> Self {
        Self::new(
            path,
            IndexErrorKind::SyntaxErrors,
            format!("{count} errors during parsing"),
        )
    }

    /// Create an encoding error for a file.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(path, IndexErrorKind::EncodingError, "file is not valid UTF-8")
    }

    /// Create an error for a file missing from the compile commands.
    #[must_use]
    pub fn no_compile_command(path: PathBuf) -> Self {
        Self::new(
            path,
            IndexErrorKind::NoCompileCommand,
            "no compile command for file, skipping",
        )
    }

    /// Create an I/O error for a file.
    #[must_use]
    pub fn io_error(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, IndexErrorKind::IoError, error.to_string())
    }

    /// Create a database error for a file.
    #[must_use]
    pub fn database_error(path: PathBuf, error: &Error) -> Self {
        Self::new(path, IndexErrorKind::DatabaseError, error.to_string())
    }
}
