//! `SQLite` storage layer for the C index.
//!
//! `SQLite` is the source of truth for all persistent data. Every write for a
//! file happens in one transaction, so a crash leaves the index consistent
//! at file granularity.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)
//! - `helpers` - Row conversion and parsing utilities
//! - `records` - Owned rows produced by extraction
//! - `files` - File registry rows
//! - `store` - Atomic per-file writes
//! - `linking` - Name-to-id linking of calls and references
//! - `functions`, `types`, `macros`, `calls`, `references`, `includes`,
//!   `docs`, `source` - Read-side queries

// SQLite stores integers as i64; counts, lines and sizes round-trip through it.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

mod calls;
mod docs;
mod files;
mod functions;
mod helpers;
mod includes;
mod linking;
mod macros;
mod records;
mod references;
mod schema;
mod source;
mod store;
mod types;

pub use linking::LinkSummary;
pub use records::{
    CallData, DocData, FileExtraction, FileMeta, FunctionData, IncludeData, LocalSymbol,
    MacroData, ReferenceData, SymbolData, TypeData, VariableData,
};
pub use store::StoredFile;

pub(crate) use files::normalize_path;

pub(crate) use schema::{SCHEMA, TABLES};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};

use crate::error::{Error, Result};
use crate::types::IndexStats;

/// `extraction_meta` key holding the time of the last build or update.
pub const META_EXTRACTED_AT: &str = "extracted_at";

/// `extraction_meta` key holding the indexed workspace root.
pub const META_WORKSPACE_ROOT: &str = "workspace_root";

/// `SQLite` database wrapper for the C index.
///
/// The connection is wrapped in a `Mutex` so readers can share an `Index`
/// across threads once a batch has committed.
pub struct Index {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Index {
    /// Open or create the index database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the connection lock.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "index connection lock poisoned: {e}"
            ))
        })
    }

    /// Current unix timestamp in nanoseconds.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn now_ns() -> Result<i64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .map_err(|e| {
                Error::Config(format!(
                    "system clock reads earlier than 1970: {e}"
                ))
            })
    }

    /// Delete every row, keeping the schema.
    ///
    /// Used by a full rebuild. Builtin macros and extraction metadata go too;
    /// everything else cascades from `files`.
    pub fn clear_all(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "BEGIN;
             DELETE FROM files;
             DELETE FROM macros;
             DELETE FROM extraction_meta;
             COMMIT;",
        )?;
        tracing::debug!(path = %self.path.display(), "Cleared index");
        Ok(())
    }

    /// Record an `extraction_meta` value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO extraction_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Row counts per table plus the extraction metadata.
    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.connection()?;

        let mut tables = BTreeMap::new();
        for table in TABLES {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            tables.insert((*table).to_string(), count as usize);
        }

        let mut stmt = conn.prepare("SELECT key, value FROM extraction_meta ORDER BY key")?;
        let meta = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(IndexStats { tables, meta })
    }

    /// Update `SQLite` query planner statistics.
    ///
    /// Worth calling after a full rebuild; not needed after small updates.
    pub fn analyze(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute_batch("ANALYZE")?;
        Ok(())
    }
}
