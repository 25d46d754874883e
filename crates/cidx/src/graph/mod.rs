//! Call-graph traversal.
//!
//! The traversals only need "who does this function call", so they are
//! written against the [`CallGraph`] trait. The index implements it over
//! resolved and unresolved call sites alike; tests use a plain map.
//!
//! Both traversals use an explicit stack and a visited set scoped to the
//! current path, never a global one: a function reachable along two
//! different paths is explored along both, while a cycle on the current path
//! is cut.

use crate::error::Result;
use crate::types::CallTree;

/// Name-level view of the call graph.
pub trait CallGraph {
    /// Distinct names called by the definitions of `function`, in call order.
    fn callees(&self, function: &str) -> Result<Vec<String>>;
}

/// Every simple call path from `from` to `to` of at most `max_depth` hops.
///
/// A path may end where it started (`a -> b -> a`), but never passes through
/// any other function twice. Paths are returned in depth-first order.
pub fn find_call_paths<G: CallGraph + ?Sized>(
    graph: &G,
    from: &str,
    to: &str,
    max_depth: usize,
) -> Result<Vec<Vec<String>>> {
    let mut paths = Vec::new();
    if max_depth == 0 {
        return Ok(paths);
    }

    let mut stack = vec![vec![from.to_string()]];
    while let Some(path) = stack.pop() {
        let hops = path.len();
        let Some(current) = path.last() else {
            continue;
        };

        let mut extensions = Vec::new();
        for callee in graph.callees(current)? {
            if callee == to {
                let mut found = path.clone();
                found.push(callee);
                paths.push(found);
            } else if hops < max_depth && !path.contains(&callee) {
                let mut next = path.clone();
                next.push(callee);
                extensions.push(next);
            }
        }
        // Reversed so the first callee is explored first
        stack.extend(extensions.into_iter().rev());
    }

    Ok(paths)
}

/// Nested callees of `root`, `depth` levels deep.
///
/// Functions below the depth limit, and functions already on the path from
/// the root, appear as truncated leaves.
pub fn call_tree<G: CallGraph + ?Sized>(graph: &G, root: &str, depth: usize) -> Result<CallTree> {
    struct Frame {
        name: String,
        pending: std::vec::IntoIter<String>,
        calls: Vec<CallTree>,
    }

    let open = |name: &str| -> Result<Frame> {
        Ok(Frame {
            name: name.to_string(),
            pending: graph.callees(name)?.into_iter(),
            calls: Vec::new(),
        })
    };

    let mut stack = vec![open(root)?];
    let mut finished = None;
    while let Some(top) = stack.last_mut() {
        match top.pending.next() {
            Some(callee) => {
                let level = stack.len() - 1;
                let on_path = stack.iter().any(|frame| frame.name == callee);
                if on_path || level >= depth {
                    if let Some(top) = stack.last_mut() {
                        top.calls.push(CallTree {
                            name: callee,
                            calls: Vec::new(),
                            truncated: true,
                        });
                    }
                } else {
                    stack.push(open(&callee)?);
                }
            }
            None => {
                if let Some(done) = stack.pop() {
                    let node = CallTree {
                        name: done.name,
                        calls: done.calls,
                        truncated: false,
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.calls.push(node),
                        None => finished = Some(node),
                    }
                }
            }
        }
    }

    Ok(finished.unwrap_or_else(|| CallTree {
        name: root.to_string(),
        calls: Vec::new(),
        truncated: false,
    }))
}

#[cfg(test)]
pub(crate) mod test_graph {
    use std::collections::HashMap;

    use super::CallGraph;
    use crate::error::Result;

    /// In-memory call graph built from `(caller, "callee callee ...")` pairs.
    pub(crate) struct MapGraph(HashMap<String, Vec<String>>);

    impl MapGraph {
        pub(crate) fn new(edges: &[(&str, &str)]) -> Self {
            Self(
                edges
                    .iter()
                    .map(|(caller, callees)| {
                        (
                            (*caller).to_string(),
                            callees.split_whitespace().map(ToString::to_string).collect(),
                        )
                    })
                    .collect(),
            )
        }
    }

    impl CallGraph for MapGraph {
        fn callees(&self, function: &str) -> Result<Vec<String>> {
            Ok(self.0.get(function).cloned().unwrap_or_default())
        }
    }
}
