//! File-scope variables.

use super::Walker;
use crate::db::VariableData;
use crate::frontend::Cursor;
use crate::types::SymbolKind;

impl<'a> Walker<'a> {
    pub(super) fn extract_global(&mut self, cursor: &'a Cursor) {
        if cursor.spelling.is_empty() {
            return;
        }
        let (type_name, is_const, is_volatile) = cursor
            .ty
            .as_ref()
            .map_or_else(|| (String::new(), false, false), |ty| (ty.spelling(), ty.is_const, ty.is_volatile));

        let symbol = self.push_declaration(cursor, &cursor.spelling, SymbolKind::Variable);
        self.out.variables.push(VariableData {
            symbol,
            type_name,
            is_const,
            is_volatile,
            initial_value: cursor.decl.initializer.clone(),
        });

        let mut ancestors = vec![cursor];
        for child in &cursor.children {
            self.walk_uses(child, &mut ancestors, None, 0);
        }
    }
}
