//! Cross-reference and definition lookups.

use super::helpers::{REFS_COLUMNS, path_matches, row_to_reference};
use super::Index;
use crate::error::Result;
use crate::types::{Reference, ReferenceKind};

impl Index {
    /// Linked references to symbols named `name`, optionally of one kind,
    /// ordered by file and position.
    pub fn find_references(
        &self,
        name: &str,
        kind: Option<ReferenceKind>,
    ) -> Result<Vec<Reference>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {REFS_COLUMNS}
             FROM refs r
             JOIN files f ON f.id = r.file_id
             LEFT JOIN symbols ctx ON ctx.id = r.context_function_id
             WHERE r.symbol_name = ?1 AND r.symbol_id IS NOT NULL
               AND (?2 IS NULL OR r.kind = ?2)
             ORDER BY f.path, r.line, r.column"
        ))?;
        let refs = stmt
            .query_map(
                rusqlite::params![name, kind.map(|k| k.as_str())],
                row_to_reference,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(refs)
    }

    /// Linked references made from a file, ordered by position.
    pub fn references_in_file(&self, path: &str) -> Result<Vec<Reference>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {REFS_COLUMNS}
             FROM refs r
             JOIN files f ON f.id = r.file_id
             LEFT JOIN symbols ctx ON ctx.id = r.context_function_id
             WHERE {} AND r.symbol_id IS NOT NULL
             ORDER BY f.path, r.line, r.column",
            path_matches("f.path", "?1")
        ))?;
        let refs = stmt
            .query_map([path], row_to_reference)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(refs)
    }
}
