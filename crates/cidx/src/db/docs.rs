//! Documentation lookups.

use rusqlite::OptionalExtension;

use super::helpers::parse_direction;
use super::Index;
use crate::error::Result;
use crate::types::{Documentation, ParamDoc, SymbolId};

impl Index {
    /// Parsed documentation attached to a symbol, with its parameter docs.
    pub fn documentation(&self, symbol: SymbolId) -> Result<Option<Documentation>> {
        let conn = self.connection()?;

        let doc = conn
            .query_row(
                "SELECT raw_comment, brief, detailed, return_doc FROM docs WHERE symbol_id = ?1",
                [symbol.as_i64()],
                |row| {
                    Ok(Documentation {
                        raw_comment: row.get(0)?,
                        brief: row.get(1)?,
                        detailed: row.get(2)?,
                        return_doc: row.get(3)?,
                        params: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut doc) = doc else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT name, description, direction FROM param_docs
             WHERE symbol_id = ?1 ORDER BY position",
        )?;
        doc.params = stmt
            .query_map([symbol.as_i64()], |row| {
                Ok(ParamDoc {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    direction: row
                        .get::<_, Option<String>>(2)?
                        .map(|d| parse_direction(&d))
                        .transpose()?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(doc))
    }
}
