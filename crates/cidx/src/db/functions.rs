//! Function, variable and symbol lookups.

use rusqlite::OptionalExtension;

use super::helpers::{
    FUNCTIONS_COLUMNS, SYMBOLS_COLUMNS, VARIABLES_COLUMNS, path_matches, row_to_function,
    row_to_local, row_to_parameter, row_to_symbol, row_to_variable,
};
use super::Index;
use crate::error::Result;
use crate::types::{Function, Local, Parameter, Symbol, SymbolId, Variable};

fn function_select(condition: &str, order: &str) -> String {
    format!(
        "SELECT {SYMBOLS_COLUMNS}, {FUNCTIONS_COLUMNS}
         FROM symbols s
         JOIN functions fn_ ON fn_.symbol_id = s.id
         JOIN files f ON f.id = s.file_id
         WHERE s.kind = 'function' AND {condition}
         ORDER BY {order}"
    )
}

impl Index {
    /// All functions with this exact name, definitions first.
    pub fn find_functions(&self, name: &str) -> Result<Vec<Function>> {
        let conn = self.connection()?;

        let mut stmt =
            conn.prepare(&function_select("s.name = ?1", "s.is_definition DESC, f.path, s.line, s.column"))?;
        let functions = stmt
            .query_map([name], row_to_function)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(functions)
    }

    /// The authoritative definition of a function: the first by file path
    /// and position.
    pub fn function_definition(&self, name: &str) -> Result<Option<Function>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!(
                "{} LIMIT 1",
                function_select("s.name = ?1 AND s.is_definition = 1", "f.path, s.line, s.column")
            ),
            [name],
            row_to_function,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Parameters of a function symbol, by position.
    pub fn function_parameters(&self, function: SymbolId) -> Result<Vec<Parameter>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT position, name, type FROM parameters WHERE function_id = ?1 ORDER BY position",
        )?;
        let params = stmt
            .query_map([function.as_i64()], row_to_parameter)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(params)
    }

    /// Locals of a function symbol, in declaration order.
    pub fn function_locals(&self, function: SymbolId) -> Result<Vec<Local>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT name, type, line, scope_depth FROM locals WHERE function_id = ?1
             ORDER BY line, id",
        )?;
        let locals = stmt
            .query_map([function.as_i64()], row_to_local)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(locals)
    }

    /// Function definitions in a file, by line.
    pub fn functions_in_file(&self, path: &str) -> Result<Vec<Function>> {
        let conn = self.connection()?;

        let condition = format!("s.is_definition = 1 AND {}", path_matches("f.path", "?1"));
        let mut stmt = conn.prepare(&function_select(&condition, "f.path, s.line"))?;
        let functions = stmt
            .query_map([path], row_to_function)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(functions)
    }

    /// Function definitions whose name matches a SQL `LIKE` pattern.
    pub fn search_functions(&self, pattern: &str) -> Result<Vec<Function>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&function_select(
            "s.is_definition = 1 AND s.name LIKE ?1",
            "s.name, f.path, s.line, s.column",
        ))?;
        let functions = stmt
            .query_map([pattern], row_to_function)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(functions)
    }

    /// Global variable definitions in a file, by line.
    pub fn globals_in_file(&self, path: &str) -> Result<Vec<Variable>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOLS_COLUMNS}, {VARIABLES_COLUMNS}
             FROM symbols s
             JOIN variables v ON v.symbol_id = s.id
             JOIN files f ON f.id = s.file_id
             WHERE s.kind = 'variable' AND s.is_definition = 1 AND {}
             ORDER BY f.path, s.line",
            path_matches("f.path", "?1")
        ))?;
        let vars = stmt
            .query_map([path], row_to_variable)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(vars)
    }

    /// Symbols with this exact name, definitions first, then by location.
    pub fn symbols_named(&self, name: &str) -> Result<Vec<Symbol>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOLS_COLUMNS}
             FROM symbols s
             JOIN files f ON f.id = s.file_id
             WHERE s.name = ?1
             ORDER BY s.is_definition DESC, f.path, s.line, s.column"
        ))?;
        let symbols = stmt
            .query_map([name], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(symbols)
    }
}
