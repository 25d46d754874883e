//! Name-to-id linking of call sites and references.
//!
//! Extraction records both by name. Linking runs once per batch, after every
//! file of the batch is stored, so callees and targets defined in files
//! walked later are still found.

use tracing::{debug, warn};

use super::Index;
use crate::config::CallResolution;
use crate::error::Result;

/// Outcome of one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSummary {
    /// Call sites given a callee in this pass
    pub calls_resolved: usize,
    /// Call sites still without a callee
    pub calls_unresolved: usize,
    /// Callee names with more than one candidate definition
    pub ambiguous_callees: Vec<(String, usize)>,
    /// References given a target in this pass
    pub refs_linked: usize,
    /// Pending references discarded because no target exists
    pub refs_dropped: usize,
}

// Orders candidates by where they are written, never by row id: re-indexing
// a file gives its symbols new ids, and links must not move because of it.
fn callee_order(policy: CallResolution) -> &'static str {
    match policy {
        CallResolution::FirstMatch => "f.path, s.line, s.column",
        CallResolution::PreferExternalLinkage => {
            "(s.linkage = 'external') DESC, f.path, s.line, s.column"
        }
    }
}

impl Index {
    /// Link every unresolved call site to a function definition of the same
    /// name. Already-linked call sites are never touched.
    pub fn link_calls(&self, policy: CallResolution, summary: &mut LinkSummary) -> Result<()> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT c.callee_name, COUNT(DISTINCT s.id)
             FROM calls c
             JOIN symbols s ON s.name = c.callee_name
                 AND s.kind = 'function' AND s.is_definition = 1
             WHERE c.callee_id IS NULL
             GROUP BY c.callee_name
             HAVING COUNT(DISTINCT s.id) > 1
             ORDER BY c.callee_name",
        )?;
        let ambiguous = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        for (name, candidates) in &ambiguous {
            warn!(
                callee = %name,
                candidates,
                policy = ?policy,
                "Multiple definitions match callee; picking one by resolution policy"
            );
        }

        let resolved = conn.execute(
            &format!(
                "UPDATE calls SET callee_id = (
                     SELECT s.id FROM symbols s JOIN files f ON f.id = s.file_id
                     WHERE s.name = calls.callee_name AND s.kind = 'function' AND s.is_definition = 1
                     ORDER BY {} LIMIT 1
                 )
                 WHERE callee_id IS NULL AND EXISTS (
                     SELECT 1 FROM symbols s
                     WHERE s.name = calls.callee_name AND s.kind = 'function' AND s.is_definition = 1
                 )",
                callee_order(policy)
            ),
            [],
        )?;

        let unresolved: i64 = conn.query_row(
            "SELECT COUNT(*) FROM calls WHERE callee_id IS NULL",
            [],
            |row| row.get(0),
        )?;

        summary.calls_resolved += resolved;
        summary.calls_unresolved = unresolved as usize;
        summary.ambiguous_callees = ambiguous;
        debug!(resolved, unresolved, "Linked call sites");
        Ok(())
    }

    /// Link pending references to their targets, then discard the ones with
    /// no target in the index.
    ///
    /// A target in the reference's own file wins, then definitions, then the
    /// first by path and position.
    pub fn link_references(&self, summary: &mut LinkSummary) -> Result<()> {
        let conn = self.connection()?;

        let linked = conn.execute(
            "UPDATE refs SET symbol_id = COALESCE(
                 (SELECT s.id FROM symbols s
                  WHERE s.name = refs.symbol_name AND s.kind = refs.symbol_kind
                      AND s.file_id = refs.file_id
                  ORDER BY s.is_definition DESC, s.line, s.column
                  LIMIT 1),
                 (SELECT s.id FROM symbols s JOIN files f ON f.id = s.file_id
                  WHERE s.name = refs.symbol_name AND s.kind = refs.symbol_kind
                  ORDER BY s.is_definition DESC, f.path, s.line, s.column
                  LIMIT 1)
             )
             WHERE symbol_id IS NULL",
            [],
        )?;
        let dropped = conn.execute("DELETE FROM refs WHERE symbol_id IS NULL", [])?;

        summary.refs_linked += linked.saturating_sub(dropped);
        summary.refs_dropped += dropped;
        debug!(linked = linked.saturating_sub(dropped), dropped, "Linked references");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::super::test_support::*;
    use super::super::{FileExtraction, ReferenceData};
    use super::*;
    use crate::types::{Linkage, ReferenceKind, StorageClass, SymbolKind};

    fn callee_of(index: &Index, caller: &str, callee: &str) -> Option<i64> {
        let conn = index.connection().unwrap();
        conn.query_row(
            "SELECT c.callee_id FROM calls c JOIN symbols s ON s.id = c.caller_id
             WHERE s.name = ?1 AND c.callee_name = ?2",
            [caller, callee],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn symbol_id(index: &Index, name: &str, file: &str) -> i64 {
        let conn = index.connection().unwrap();
        conn.query_row(
            "SELECT s.id FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.name = ?1 AND f.path = ?2",
            [name, file],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn calls_link_across_files_after_the_batch() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("a", "b puts")]), None)
            .unwrap();
        index
            .store_file_extraction(&meta("b.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();

        let mut summary = LinkSummary::default();
        index.link_calls(CallResolution::FirstMatch, &mut summary).unwrap();

        assert_eq!(summary.calls_resolved, 1);
        assert_eq!(summary.calls_unresolved, 1);
        assert_eq!(callee_of(&index, "a", "b"), Some(symbol_id(&index, "b", "b.c")));
        assert_eq!(callee_of(&index, "a", "puts"), None);
    }

    #[test]
    fn resolved_calls_are_stable_across_passes() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("a", "b")]), None)
            .unwrap();
        index
            .store_file_extraction(&meta("b.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();
        let mut summary = LinkSummary::default();
        index.link_calls(CallResolution::FirstMatch, &mut summary).unwrap();
        let first = callee_of(&index, "a", "b");

        // A second definition appears; the existing link must not move
        index
            .store_file_extraction(&meta("c.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();
        let mut again = LinkSummary::default();
        index.link_calls(CallResolution::FirstMatch, &mut again).unwrap();

        assert_eq!(again.calls_resolved, 0);
        assert_eq!(callee_of(&index, "a", "b"), first);
    }

    #[test]
    fn external_linkage_policy_skips_static_definitions() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        let mut static_b = functions_calling(&[("b", "")]);
        static_b.symbols[0].storage_class = StorageClass::Static;
        static_b.symbols[0].linkage = Linkage::Internal;
        index.store_file_extraction(&meta("s.c"), &static_b, None).unwrap();
        index
            .store_file_extraction(&meta("b.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("a", "b")]), None)
            .unwrap();

        let mut summary = LinkSummary::default();
        index
            .link_calls(CallResolution::PreferExternalLinkage, &mut summary)
            .unwrap();

        assert_eq!(summary.ambiguous_callees, vec![("b".to_string(), 2)]);
        assert_eq!(callee_of(&index, "a", "b"), Some(symbol_id(&index, "b", "b.c")));
    }

    #[test]
    fn deleting_callee_file_unlinks_call_sites() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("a", "b")]), None)
            .unwrap();
        index
            .store_file_extraction(&meta("b.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();
        index
            .link_calls(CallResolution::FirstMatch, &mut LinkSummary::default())
            .unwrap();

        index.delete_file(Path::new("b.c")).unwrap();

        assert_eq!(callee_of(&index, "a", "b"), None);
    }

    #[test]
    fn references_prefer_same_file_and_drop_unknown_targets() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        let mut other = FileExtraction::default();
        other.push_symbol(symbol("count", SymbolKind::Variable, 1));
        index.store_file_extraction(&meta("other.c"), &other, None).unwrap();

        let mut ex = functions_calling(&[("main", "")]);
        ex.push_symbol(symbol("count", SymbolKind::Variable, 50));
        for name in ["count", "missing"] {
            ex.references.push(ReferenceData {
                symbol_name: name.to_string(),
                symbol_kind: SymbolKind::Variable,
                line: 2,
                column: 3,
                kind: ReferenceKind::Read,
                context_function: Some(0),
            });
        }
        index.store_file_extraction(&meta("main.c"), &ex, None).unwrap();

        let mut summary = LinkSummary::default();
        index.link_references(&mut summary).unwrap();

        assert_eq!(summary.refs_linked, 1);
        assert_eq!(summary.refs_dropped, 1);
        let conn = index.connection().unwrap();
        let target: i64 = conn
            .query_row("SELECT symbol_id FROM refs", [], |row| row.get(0))
            .unwrap();
        drop(conn);
        assert_eq!(target, symbol_id(&index, "count", "main.c"));
    }

    #[test]
    fn relinking_after_reindex_keeps_the_same_definition() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        for file in ["a.c", "b.c"] {
            index
                .store_file_extraction(&meta(file), &functions_calling(&[("foo", "")]), None)
                .unwrap();
        }
        index
            .store_file_extraction(&meta("main.c"), &functions_calling(&[("main", "foo")]), None)
            .unwrap();
        index
            .link_calls(CallResolution::FirstMatch, &mut LinkSummary::default())
            .unwrap();
        assert_eq!(callee_of(&index, "main", "foo"), Some(symbol_id(&index, "foo", "a.c")));

        // Storing a.c again gives its symbols higher ids than b.c's
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("foo", "")]), None)
            .unwrap();
        assert_eq!(callee_of(&index, "main", "foo"), None);
        index
            .link_calls(CallResolution::FirstMatch, &mut LinkSummary::default())
            .unwrap();

        assert_eq!(callee_of(&index, "main", "foo"), Some(symbol_id(&index, "foo", "a.c")));
    }

    #[test]
    fn references_to_other_files_pick_by_path_not_insertion() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        for file in ["z.c", "m.c"] {
            let mut ex = FileExtraction::default();
            ex.push_symbol(symbol("shared", SymbolKind::Variable, 3));
            index.store_file_extraction(&meta(file), &ex, None).unwrap();
        }
        let mut ex = functions_calling(&[("main", "")]);
        ex.references.push(ReferenceData {
            symbol_name: "shared".to_string(),
            symbol_kind: SymbolKind::Variable,
            line: 2,
            column: 3,
            kind: ReferenceKind::Write,
            context_function: Some(0),
        });
        index.store_file_extraction(&meta("main.c"), &ex, None).unwrap();

        let mut summary = LinkSummary::default();
        index.link_references(&mut summary).unwrap();

        assert_eq!(summary.refs_linked, 1);
        let conn = index.connection().unwrap();
        let target: i64 = conn
            .query_row("SELECT symbol_id FROM refs", [], |row| row.get(0))
            .unwrap();
        drop(conn);
        assert_eq!(target, symbol_id(&index, "shared", "m.c"));
    }
}
