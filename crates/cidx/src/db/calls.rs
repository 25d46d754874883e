//! Call-site queries and the call graph over the index.

use super::helpers::{CALLS_COLUMNS, row_to_call_site};
use super::Index;
use crate::error::Result;
use crate::graph::CallGraph;
use crate::types::CallSite;

impl Index {
    /// Calls made by every definition of `function`, by file then source order.
    pub fn callees_of(&self, function: &str) -> Result<Vec<CallSite>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CALLS_COLUMNS}
             FROM calls c
             JOIN symbols caller ON caller.id = c.caller_id
             JOIN files f ON f.id = c.file_id
             WHERE caller.id IN (
                 SELECT s.id FROM symbols s
                 WHERE s.name = ?1 AND s.kind = 'function' AND s.is_definition = 1
             )
             ORDER BY f.path, c.line, c.column"
        ))?;
        let calls = stmt
            .query_map([function], row_to_call_site)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(calls)
    }

    /// Calls naming `function` as their callee, resolved or not.
    pub fn callers_of(&self, function: &str) -> Result<Vec<CallSite>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CALLS_COLUMNS}
             FROM calls c
             JOIN symbols caller ON caller.id = c.caller_id
             JOIN files f ON f.id = c.file_id
             WHERE c.callee_name = ?1
             ORDER BY caller.name, c.line, c.column"
        ))?;
        let calls = stmt
            .query_map([function], row_to_call_site)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(calls)
    }
}

impl CallGraph for Index {
    fn callees(&self, function: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for call in self.callees_of(function)? {
            if !names.contains(&call.callee_name) {
                names.push(call.callee_name);
            }
        }
        Ok(names)
    }
}
