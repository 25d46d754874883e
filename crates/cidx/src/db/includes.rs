//! Include-graph queries.

use std::collections::{BTreeSet, HashSet, VecDeque};

use rusqlite::OptionalExtension;

use super::helpers::{INCLUDES_COLUMNS, path_matches, row_to_include};
use super::Index;
use crate::error::Result;
use crate::types::Include;

impl Index {
    /// Include directives of an indexed file, by line.
    pub fn includes_of(&self, path: &str) -> Result<Vec<Include>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {INCLUDES_COLUMNS}
             FROM includes i
             JOIN files f ON f.id = i.file_id
             WHERE {}
             ORDER BY f.path, i.line",
            path_matches("f.path", "?1")
        ))?;
        let includes = stmt
            .query_map([path], row_to_include)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(includes)
    }

    /// The indexed file path an include resolved to, if the header itself is
    /// indexed. Indexed paths are workspace-relative while resolved paths are
    /// absolute, so the match is on the indexed path being a suffix.
    pub fn indexed_path_for(&self, resolved: &str) -> Result<Option<String>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!(
                "SELECT f.path FROM files f WHERE {}
                 ORDER BY length(f.path) DESC LIMIT 1",
                path_matches("?1", "f.path")
            ),
            [resolved],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// Headers included by `path`, as resolved paths (the written path when
    /// unresolved), sorted.
    ///
    /// With `recursive`, headers that are themselves indexed are followed;
    /// each file is expanded once, so include cycles terminate.
    pub fn include_closure(&self, path: &str, recursive: bool) -> Result<Vec<String>> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut worklist = VecDeque::from([path.to_string()]);

        while let Some(current) = worklist.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for include in self.includes_of(&current)? {
                let target = include
                    .resolved_path
                    .clone()
                    .unwrap_or_else(|| include.included_path.clone());
                found.insert(target);

                if !recursive {
                    continue;
                }
                let Some(resolved) = include.resolved_path.as_deref() else {
                    continue;
                };
                if let Some(next) = self.indexed_path_for(resolved)? {
                    worklist.push_back(next);
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Indexed files that include `header`, matched against the path as
    /// written or a resolved path ending with it.
    pub fn includers_of(&self, header: &str) -> Result<Vec<String>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT f.path
             FROM includes i
             JOIN files f ON f.id = i.file_id
             WHERE i.included_path = ?1 OR {}
             ORDER BY f.path",
            path_matches("i.resolved_path", "?1")
        ))?;
        let paths = stmt
            .query_map([header], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{FileExtraction, IncludeData};
    use super::*;

    fn including(headers: &[(&str, Option<&str>)]) -> FileExtraction {
        let mut ex = FileExtraction::default();
        for (line, (written, resolved)) in headers.iter().enumerate() {
            ex.includes.push(IncludeData {
                included_path: (*written).to_string(),
                resolved_path: resolved.map(ToString::to_string),
                line: line as u32 + 1,
                is_system: resolved.map_or(true, |p| p.starts_with("/usr/")),
            });
        }
        ex
    }

    fn include_graph() -> (tempfile::TempDir, Index) {
        let (dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        index
            .store_file_extraction(
                &meta("src/main.c"),
                &including(&[
                    ("util.h", Some("/ws/src/util.h")),
                    ("stdio.h", Some("/usr/include/stdio.h")),
                ]),
                None,
            )
            .unwrap();
        index
            .store_file_extraction(
                &meta("src/util.h"),
                &including(&[
                    ("types.h", Some("/ws/src/types.h")),
                    ("main.c", Some("/ws/src/main.c")),
                ]),
                None,
            )
            .unwrap();
        index
            .store_file_extraction(&meta("src/types.h"), &including(&[("gen.h", None)]), None)
            .unwrap();
        (dir, index)
    }

    #[test]
    fn direct_includes_are_sorted_resolved_paths() {
        let (_dir, index) = include_graph();

        let direct = index.include_closure("main.c", false).unwrap();

        assert_eq!(direct, vec!["/usr/include/stdio.h", "/ws/src/util.h"]);
    }

    #[test]
    fn recursive_includes_follow_indexed_headers_and_survive_cycles() {
        let (_dir, index) = include_graph();

        let all = index.include_closure("src/main.c", true).unwrap();

        assert_eq!(
            all,
            vec![
                "/usr/include/stdio.h",
                "/ws/src/main.c",
                "/ws/src/types.h",
                "/ws/src/util.h",
                "gen.h"
            ]
        );
    }

    #[test]
    fn includers_match_written_or_resolved_suffix() {
        let (_dir, index) = include_graph();

        assert_eq!(index.includers_of("util.h").unwrap(), vec!["src/main.c"]);
        assert_eq!(index.includers_of("src/types.h").unwrap(), vec!["src/util.h"]);
        assert!(index.includers_of("nothing.h").unwrap().is_empty());
        assert_eq!(
            index.indexed_path_for("/ws/src/util.h").unwrap().as_deref(),
            Some("src/util.h")
        );
        assert_eq!(index.indexed_path_for("/elsewhere/x.h").unwrap(), None);
    }
}
