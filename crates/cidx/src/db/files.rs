//! File registry rows.

use std::path::Path;

use rusqlite::{OptionalExtension, Transaction, params};

use super::helpers::{FILES_COLUMNS, row_to_indexed_file};
use super::{FileMeta, Index};
use crate::error::Result;
use crate::types::{FileId, IndexedFile};

/// Path as stored in `files.path`, with `/` separators.
pub(crate) fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

/// Insert or update the file row inside `tx`.
///
/// Returns the file ID and whether the row already existed.
pub(super) fn upsert_file_tx(
    tx: &Transaction<'_>,
    meta: &FileMeta,
    indexed_at: i64,
) -> Result<(i64, bool)> {
    let path_str = normalize_path(&meta.path);

    let updated = tx.execute(
        "UPDATE files SET mtime_ns = ?2, size_bytes = ?3, content_hash = ?4, indexed_at = ?5
         WHERE path = ?1",
        params![
            path_str,
            meta.mtime_ns,
            meta.size_bytes as i64,
            meta.content_hash.map(|h| h as i64),
            indexed_at
        ],
    )?;

    if updated > 0 {
        let id: i64 = tx.query_row("SELECT id FROM files WHERE path = ?1", [&path_str], |row| {
            row.get(0)
        })?;
        return Ok((id, true));
    }

    tx.execute(
        "INSERT INTO files (path, mtime_ns, size_bytes, content_hash, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            path_str,
            meta.mtime_ns,
            meta.size_bytes as i64,
            meta.content_hash.map(|h| h as i64),
            indexed_at
        ],
    )?;
    Ok((tx.last_insert_rowid(), false))
}

impl Index {
    /// Insert or update a file record without touching its contents.
    pub fn upsert_file(&self, meta: &FileMeta) -> Result<FileId> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let (id, _) = upsert_file_tx(&tx, meta, Self::now_ns()?)?;
        tx.commit()?;
        Ok(FileId::from(id))
    }

    /// Get a file by path.
    pub fn get_file(&self, path: &Path) -> Result<Option<IndexedFile>> {
        let path_str = normalize_path(path);
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {FILES_COLUMNS} FROM files WHERE path = ?1"),
            [&path_str],
            row_to_indexed_file,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get file ID by path.
    pub fn get_file_id(&self, path: &Path) -> Result<Option<FileId>> {
        let path_str = normalize_path(path);
        let conn = self.connection()?;

        conn.query_row("SELECT id FROM files WHERE path = ?1", [&path_str], |row| {
            row.get::<_, i64>(0).map(FileId::from)
        })
        .optional()
        .map_err(Into::into)
    }

    /// Get all indexed files, ordered by path.
    pub fn list_files(&self) -> Result<Vec<IndexedFile>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!("SELECT {FILES_COLUMNS} FROM files ORDER BY path"))?;
        let files = stmt
            .query_map([], row_to_indexed_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    /// Delete a file and, by cascade, everything extracted from it.
    ///
    /// Returns `false` when the path was not indexed.
    pub fn delete_file(&self, path: &Path) -> Result<bool> {
        let path_str = normalize_path(path);
        let conn = self.connection()?;

        let deleted = conn.execute("DELETE FROM files WHERE path = ?1", [&path_str])?;
        if deleted > 0 {
            tracing::debug!(path = %path_str, "Purged file from index");
        }
        Ok(deleted > 0)
    }
}
