//! Call-graph resolution pass.
//!
//! Extraction records call sites and references by name only. Once every
//! file of a batch is stored, [`resolve`] links them to symbol ids across the
//! whole index: the callee of a call may live in a file walked later in the
//! batch, or in a file indexed by an earlier batch.

use tracing::{info, warn};

use crate::config::CallResolution;
use crate::db::{Index, LinkSummary};
use crate::error::Result;

/// Link pending call sites and references against the whole index.
///
/// Call sites that already have a callee keep it. Call sites whose name
/// matches no definition stay unresolved until a later pass finds one.
pub fn resolve(index: &Index, policy: CallResolution) -> Result<LinkSummary> {
    let mut summary = LinkSummary::default();

    index.link_calls(policy, &mut summary)?;
    index.link_references(&mut summary)?;

    if !summary.ambiguous_callees.is_empty() {
        warn!(
            names = summary.ambiguous_callees.len(),
            policy = ?policy,
            "Some callees have several definitions"
        );
    }
    info!(
        calls_resolved = summary.calls_resolved,
        calls_unresolved = summary.calls_unresolved,
        refs_linked = summary.refs_linked,
        refs_dropped = summary.refs_dropped,
        "Resolved call graph"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::db::ReferenceData;
    use crate::types::{ReferenceKind, SymbolKind};

    #[test]
    fn calls_and_references_link_in_one_pass() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();

        let mut main = functions_calling(&[("main", "helper printf")]);
        main.references.push(ReferenceData {
            symbol_name: "helper".to_string(),
            symbol_kind: SymbolKind::Function,
            line: 2,
            column: 5,
            kind: ReferenceKind::Call,
            context_function: Some(0),
        });
        index.store_file_extraction(&meta("main.c"), &main, None).unwrap();
        index
            .store_file_extraction(&meta("helper.c"), &functions_calling(&[("helper", "")]), None)
            .unwrap();

        let summary = resolve(&index, CallResolution::FirstMatch).unwrap();

        assert_eq!(summary.calls_resolved, 1);
        assert_eq!(summary.calls_unresolved, 1, "printf is never defined");
        assert_eq!(summary.refs_linked, 1);
        let callers = index.callers_of("helper").unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].caller_name, "main");
        assert!(callers[0].callee_id.is_some());
    }

    #[test]
    fn later_batches_resolve_earlier_gaps() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        index
            .store_file_extraction(&meta("a.c"), &functions_calling(&[("a", "b")]), None)
            .unwrap();

        let first = resolve(&index, CallResolution::FirstMatch).unwrap();
        assert_eq!(first.calls_resolved, 0);
        assert_eq!(first.calls_unresolved, 1);

        index
            .store_file_extraction(&meta("b.c"), &functions_calling(&[("b", "")]), None)
            .unwrap();
        let second = resolve(&index, CallResolution::FirstMatch).unwrap();

        assert_eq!(second.calls_resolved, 1);
        assert_eq!(second.calls_unresolved, 0);
        let callees = index.callees_of("a").unwrap();
        assert!(callees[0].callee_id.is_some());
    }
}
