//! Cached file contents.

use rusqlite::OptionalExtension;

use super::Index;
use crate::error::Result;
use crate::types::FileId;

impl Index {
    /// Contents of a file as cached when it was last indexed.
    pub fn cached_source(&self, file: FileId) -> Result<Option<String>> {
        let conn = self.connection()?;

        conn.query_row(
            "SELECT content FROM source_cache WHERE file_id = ?1",
            [file.as_i64()],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::super::FileExtraction;
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn cache_is_optional_and_replaced_on_restore() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        let empty = FileExtraction::default();

        let stored = index.store_file_extraction(&meta("a.c"), &empty, None).unwrap();
        assert_eq!(index.cached_source(stored.file_id).unwrap(), None);

        index
            .store_file_extraction(&meta("a.c"), &empty, Some("int x;\n"))
            .unwrap();
        assert_eq!(
            index.cached_source(stored.file_id).unwrap().as_deref(),
            Some("int x;\n")
        );
    }
}
