//! Macro lookups.

use super::helpers::{MACROS_COLUMNS, row_to_macro};
use super::Index;
use crate::error::Result;
use crate::types::Macro;

impl Index {
    /// Definitions of a macro, file definitions before builtins.
    pub fn macro_definitions(&self, name: &str) -> Result<Vec<Macro>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MACROS_COLUMNS}
             FROM macros m
             LEFT JOIN files f ON f.id = m.file_id
             WHERE m.name = ?1
             ORDER BY m.is_builtin ASC, f.path, m.line, m.id"
        ))?;
        let macros = stmt
            .query_map([name], row_to_macro)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(macros)
    }

    /// Non-builtin macros whose name matches a SQL `LIKE` pattern.
    pub fn search_macros(&self, pattern: &str) -> Result<Vec<Macro>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MACROS_COLUMNS}
             FROM macros m
             LEFT JOIN files f ON f.id = m.file_id
             WHERE m.name LIKE ?1 AND m.is_builtin = 0
             ORDER BY m.name, f.path, m.line"
        ))?;
        let macros = stmt
            .query_map([pattern], row_to_macro)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(macros)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{FileExtraction, MacroData};
    use super::*;

    fn define(name: &str, definition: &str, params: Option<&[&str]>, builtin: bool) -> MacroData {
        MacroData {
            name: name.to_string(),
            line: if builtin { 0 } else { 3 },
            definition: definition.to_string(),
            is_function_like: params.is_some(),
            params: params.map(|p| p.iter().map(ToString::to_string).collect()),
            is_builtin: builtin,
        }
    }

    #[test]
    fn file_definitions_come_before_builtins() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        let mut ex = FileExtraction::default();
        ex.macros.push(define("DEBUG", "1", None, true));
        ex.macros.push(define("DEBUG", "2", None, false));
        ex.macros
            .push(define("MAX", "((a) > (b) ? (a) : (b))", Some(&["a", "b"]), false));
        index.store_file_extraction(&meta("cfg.h"), &ex, None).unwrap();

        let debug = index.macro_definitions("DEBUG").unwrap();
        assert_eq!(debug.len(), 2);
        assert!(!debug[0].is_builtin);
        assert_eq!(debug[0].file_path.as_deref().and_then(|p| p.to_str()), Some("cfg.h"));
        assert!(debug[1].is_builtin);
        assert_eq!(debug[1].file_path, None);

        let max = &index.macro_definitions("MAX").unwrap()[0];
        assert!(max.is_function_like);
        assert_eq!(max.params, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn search_skips_builtins() {
        let (_dir, path) = temp_db();
        let index = Index::open(&path).unwrap();
        let mut ex = FileExtraction::default();
        ex.macros.push(define("BUF_SIZE", "64", None, false));
        ex.macros.push(define("BUF_DEBUG", "1", None, true));
        index.store_file_extraction(&meta("buf.h"), &ex, None).unwrap();

        let names: Vec<_> = index
            .search_macros("BUF_%")
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["BUF_SIZE"]);
    }
}
