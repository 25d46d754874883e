//! Struct, union, enum and typedef lookups.

use std::collections::HashSet;
use std::path::PathBuf;

use rusqlite::OptionalExtension;

use super::helpers::{
    SYMBOLS_COLUMNS, TYPES_COLUMNS, row_to_enum_constant, row_to_field, row_to_type,
};
use super::Index;
use crate::error::Result;
use crate::types::{EnumConstant, Field, SymbolId, TypeDefinition, TypeUsage, UsageSite};

/// Whether `name` occurs in `text` as a whole C identifier.
pub(crate) fn mentions_identifier(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(name).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + name.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

impl Index {
    /// Type definitions with this name, by file path and position.
    ///
    /// Tagged aggregates are stored under their bare tag (`point` for
    /// `struct point`), so a leading `struct `/`union `/`enum ` is ignored.
    pub fn type_definitions(&self, name: &str) -> Result<Vec<TypeDefinition>> {
        let conn = self.connection()?;
        let name = strip_tag_keyword(name);

        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOLS_COLUMNS}, {TYPES_COLUMNS}
             FROM symbols s
             JOIN types t ON t.symbol_id = s.id
             JOIN files f ON f.id = s.file_id
             WHERE s.name = ?1 AND s.is_definition = 1
             ORDER BY f.path, s.line, s.column"
        ))?;
        let types = stmt
            .query_map([name], row_to_type)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(types)
    }

    /// The fully chased target of the first typedef with this name.
    pub fn typedef_underlying(&self, name: &str) -> Result<Option<String>> {
        let conn = self.connection()?;

        let underlying: Option<Option<String>> = conn
            .query_row(
                "SELECT t.underlying_type
                 FROM symbols s
                 JOIN types t ON t.symbol_id = s.id
                 JOIN files f ON f.id = s.file_id
                 WHERE s.name = ?1 AND t.kind = 'typedef' AND s.is_definition = 1
                 ORDER BY f.path, s.line, s.column LIMIT 1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(underlying.flatten())
    }

    /// Members of a struct or union, by position.
    pub fn type_fields(&self, type_id: SymbolId) -> Result<Vec<Field>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT position, name, type, offset_bits, size_bits, is_bitfield, bitfield_width
             FROM fields WHERE type_id = ?1 ORDER BY position",
        )?;
        let fields = stmt
            .query_map([type_id.as_i64()], row_to_field)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(fields)
    }

    /// Enumerators of an enum, by position.
    pub fn enum_constants(&self, enum_id: SymbolId) -> Result<Vec<EnumConstant>> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT position, name, value FROM enum_constants WHERE enum_id = ?1 ORDER BY position",
        )?;
        let constants = stmt
            .query_map([enum_id.as_i64()], row_to_enum_constant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(constants)
    }

    /// Every place a type name is used: `type_ref` references plus the
    /// declared types of variables, parameters and fields.
    ///
    /// Declared types match on whole identifiers, so `point` does not match
    /// `point3d`.
    pub fn type_usages(&self, name: &str) -> Result<Vec<TypeUsage>> {
        let name = strip_tag_keyword(name);
        let like = format!("%{name}%");
        let conn = self.connection()?;
        let mut usages = Vec::new();

        let mut stmt = conn.prepare(
            "SELECT r.symbol_name, ctx.name, f.path, r.line
             FROM refs r
             JOIN files f ON f.id = r.file_id
             LEFT JOIN symbols ctx ON ctx.id = r.context_function_id
             WHERE r.symbol_name = ?1 AND r.kind = 'type_ref' AND r.symbol_id IS NOT NULL
             ORDER BY f.path, r.line, r.column",
        )?;
        let refs = stmt.query_map([name], |row| {
            Ok(TypeUsage {
                site: UsageSite::Reference,
                name: row.get(0)?,
                owner: row.get(1)?,
                type_name: None,
                file_path: PathBuf::from(row.get::<_, String>(2)?),
                line: row.get(3)?,
            })
        })?;
        for usage in refs {
            usages.push(usage?);
        }

        let declared = [
            (
                UsageSite::Variable,
                "SELECT s.name, NULL, v.type, f.path, s.line
                 FROM variables v
                 JOIN symbols s ON s.id = v.symbol_id
                 JOIN files f ON f.id = s.file_id
                 WHERE v.type LIKE ?1
                 ORDER BY f.path, s.line",
            ),
            (
                UsageSite::Parameter,
                "SELECT p.name, s.name, p.type, f.path, s.line
                 FROM parameters p
                 JOIN symbols s ON s.id = p.function_id
                 JOIN files f ON f.id = s.file_id
                 WHERE p.type LIKE ?1 AND s.is_definition = 1
                 ORDER BY f.path, s.line, p.position",
            ),
            (
                UsageSite::Field,
                "SELECT fd.name, s.name, fd.type, f.path, s.line
                 FROM fields fd
                 JOIN symbols s ON s.id = fd.type_id
                 JOIN files f ON f.id = s.file_id
                 WHERE fd.type LIKE ?1
                 ORDER BY f.path, s.line, fd.position",
            ),
        ];

        for (site, sql) in declared {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([&like], |row| {
                Ok(TypeUsage {
                    site,
                    name: row.get(0)?,
                    owner: row.get(1)?,
                    type_name: row.get(2)?,
                    file_path: PathBuf::from(row.get::<_, String>(3)?),
                    line: row.get(4)?,
                })
            })?;
            for usage in rows {
                let usage = usage?;
                if usage
                    .type_name
                    .as_deref()
                    .is_some_and(|ty| mentions_identifier(ty, name))
                {
                    usages.push(usage);
                }
            }
        }

        // A header seen from several translation units yields the same row more than once
        let mut seen = HashSet::new();
        usages.retain(|u| {
            seen.insert((
                u.site,
                u.name.clone(),
                u.owner.clone(),
                u.file_path.clone(),
                u.line,
            ))
        });

        Ok(usages)
    }
}

fn strip_tag_keyword(name: &str) -> &str {
    let trimmed = name.trim();
    ["struct ", "union ", "enum "]
        .iter()
        .find_map(|kw| trimmed.strip_prefix(kw))
        .map_or(trimmed, str::trim)
}
