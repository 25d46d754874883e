//! Atomic per-file writes.
//!
//! A file's rows are replaced wholesale: the previous symbols, macros,
//! includes, references and cached source are deleted (dependent rows
//! cascade), then the new extraction is inserted. Rows are never patched in
//! place.

use std::collections::BTreeMap;

use rusqlite::{Transaction, params};
use tracing::trace;

use super::files::upsert_file_tx;
use super::{FileExtraction, FileMeta, Index, MacroData};
use crate::error::{Error, Result};
use crate::types::{FileId, SymbolId};

/// Result of storing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Registry ID of the file
    pub file_id: FileId,
    /// Database IDs of the stored symbols, in extraction order
    pub symbol_ids: Vec<SymbolId>,
    /// Rows inserted, by table name
    pub rows: BTreeMap<&'static str, usize>,
}

impl Index {
    /// Atomically replace everything stored for a file.
    ///
    /// Either the file row and all of its extracted rows are written, or
    /// nothing is. `source`, when given, is cached for source extraction.
    pub fn store_file_extraction(
        &self,
        meta: &FileMeta,
        extraction: &FileExtraction,
        source: Option<&str>,
    ) -> Result<StoredFile> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let (file_id, existed) = upsert_file_tx(&tx, meta, Self::now_ns()?)?;
        if existed {
            clear_file_rows(&tx, file_id)?;
        }

        let mut rows = BTreeMap::new();
        let symbol_ids = insert_symbols(&tx, file_id, extraction, &mut rows)?;
        insert_details(&tx, extraction, &symbol_ids, &mut rows)?;
        insert_edges(&tx, file_id, extraction, &symbol_ids, &mut rows)?;

        if let Some(source) = source {
            tx.execute(
                "INSERT INTO source_cache (file_id, content) VALUES (?1, ?2)",
                params![file_id, source],
            )?;
            *rows.entry("source_cache").or_insert(0) += 1;
        }

        tx.commit()?;
        rows.retain(|_, count| *count > 0);
        trace!(path = %meta.path.display(), file_id, ?rows, "Stored file extraction");

        Ok(StoredFile {
            file_id: FileId::from(file_id),
            symbol_ids: symbol_ids.into_iter().map(SymbolId::from).collect(),
            rows,
        })
    }
}

fn clear_file_rows(tx: &Transaction<'_>, file_id: i64) -> Result<()> {
    // Symbols cascade to details, parameters, locals, fields, enumerators,
    // docs, outgoing calls and references made inside them.
    tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM macros WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM includes WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM refs WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM calls WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM source_cache WHERE file_id = ?1", [file_id])?;
    Ok(())
}

fn bump(rows: &mut BTreeMap<&'static str, usize>, table: &'static str) {
    *rows.entry(table).or_insert(0) += 1;
}

fn resolve_local(symbol_ids: &[i64], local: usize) -> Result<i64> {
    symbol_ids.get(local).copied().ok_or_else(|| {
        Error::Internal(format!(
            "extraction refers to symbol #{local} but only {} were extracted",
            symbol_ids.len()
        ))
    })
}

fn insert_symbols(
    tx: &Transaction<'_>,
    file_id: i64,
    extraction: &FileExtraction,
    rows: &mut BTreeMap<&'static str, usize>,
) -> Result<Vec<i64>> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO symbols (file_id, name, kind, line, column, end_line, end_column,
         is_definition, is_static, storage_class, linkage)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    let mut ids = Vec::with_capacity(extraction.symbols.len());
    for sym in &extraction.symbols {
        stmt.execute(params![
            file_id,
            sym.name,
            sym.kind.as_str(),
            sym.line,
            sym.column,
            sym.span.map(|s| s.end_line()),
            sym.span.map(|s| s.end_column()),
            sym.is_definition,
            sym.is_static(),
            sym.storage_class.as_str(),
            sym.linkage.as_str(),
        ])?;
        ids.push(tx.last_insert_rowid());
        bump(rows, "symbols");
    }
    Ok(ids)
}

fn insert_details(
    tx: &Transaction<'_>,
    extraction: &FileExtraction,
    symbol_ids: &[i64],
    rows: &mut BTreeMap<&'static str, usize>,
) -> Result<()> {
    for function in &extraction.functions {
        let id = resolve_local(symbol_ids, function.symbol)?;
        tx.execute(
            "INSERT INTO functions (symbol_id, return_type, signature, is_variadic, is_inline)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                function.return_type,
                function.signature,
                function.is_variadic,
                function.is_inline
            ],
        )?;
        bump(rows, "functions");

        for param in &function.parameters {
            tx.execute(
                "INSERT INTO parameters (function_id, position, name, type) VALUES (?1, ?2, ?3, ?4)",
                params![id, param.position, param.name, param.type_name],
            )?;
            bump(rows, "parameters");
        }
        for local in &function.locals {
            tx.execute(
                "INSERT INTO locals (function_id, name, type, line, scope_depth)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, local.name, local.type_name, local.line, local.scope_depth],
            )?;
            bump(rows, "locals");
        }
    }

    for ty in &extraction.types {
        let id = resolve_local(symbol_ids, ty.symbol)?;
        tx.execute(
            "INSERT INTO types (symbol_id, kind, underlying_type, size_bytes, alignment, is_anonymous)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                ty.kind.as_str(),
                ty.underlying_type,
                ty.size_bytes.map(|v| v as i64),
                ty.alignment.map(|v| v as i64),
                ty.is_anonymous
            ],
        )?;
        bump(rows, "types");

        for field in &ty.fields {
            tx.execute(
                "INSERT INTO fields (type_id, position, name, type, offset_bits, size_bits,
                 is_bitfield, bitfield_width)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    field.position,
                    field.name,
                    field.type_name,
                    field.offset_bits.map(|v| v as i64),
                    field.size_bits.map(|v| v as i64),
                    field.is_bitfield,
                    field.bitfield_width
                ],
            )?;
            bump(rows, "fields");
        }
        for constant in &ty.enum_constants {
            tx.execute(
                "INSERT INTO enum_constants (enum_id, position, name, value) VALUES (?1, ?2, ?3, ?4)",
                params![id, constant.position, constant.name, constant.value],
            )?;
            bump(rows, "enum_constants");
        }
    }

    for var in &extraction.variables {
        let id = resolve_local(symbol_ids, var.symbol)?;
        tx.execute(
            "INSERT INTO variables (symbol_id, type, is_const, is_volatile, initial_value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, var.type_name, var.is_const, var.is_volatile, var.initial_value],
        )?;
        bump(rows, "variables");
    }

    for doc in &extraction.docs {
        let id = resolve_local(symbol_ids, doc.symbol)?;
        tx.execute(
            "INSERT INTO docs (symbol_id, raw_comment, brief, detailed, return_doc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                doc.doc.raw_comment,
                doc.doc.brief,
                doc.doc.detailed,
                doc.doc.return_doc
            ],
        )?;
        bump(rows, "docs");

        for (position, param) in doc.doc.params.iter().enumerate() {
            tx.execute(
                "INSERT INTO param_docs (symbol_id, position, name, description, direction)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    position as i64,
                    param.name,
                    param.description,
                    param.direction.map(|d| d.as_str())
                ],
            )?;
            bump(rows, "param_docs");
        }
    }

    Ok(())
}

fn insert_edges(
    tx: &Transaction<'_>,
    file_id: i64,
    extraction: &FileExtraction,
    symbol_ids: &[i64],
    rows: &mut BTreeMap<&'static str, usize>,
) -> Result<()> {
    for mac in &extraction.macros {
        if insert_macro(tx, file_id, mac)? {
            bump(rows, "macros");
        }
    }

    for call in &extraction.calls {
        let caller = resolve_local(symbol_ids, call.caller)?;
        tx.execute(
            "INSERT INTO calls (caller_id, callee_name, callee_id, file_id, line, column, is_indirect)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6)",
            params![
                caller,
                call.callee_name,
                file_id,
                call.line,
                call.column,
                call.is_indirect
            ],
        )?;
        bump(rows, "calls");
    }

    for reference in &extraction.references {
        let context = reference
            .context_function
            .map(|local| resolve_local(symbol_ids, local))
            .transpose()?;
        tx.execute(
            "INSERT INTO refs (symbol_id, symbol_name, symbol_kind, file_id, line, column, kind,
             context_function_id)
             VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reference.symbol_name,
                reference.symbol_kind.as_str(),
                file_id,
                reference.line,
                reference.column,
                reference.kind.as_str(),
                context
            ],
        )?;
        bump(rows, "refs");
    }

    for include in &extraction.includes {
        tx.execute(
            "INSERT INTO includes (file_id, included_path, resolved_path, line, is_system)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file_id,
                include.included_path,
                include.resolved_path,
                include.line,
                include.is_system
            ],
        )?;
        bump(rows, "includes");
    }

    Ok(())
}

/// Insert a macro. Builtins are stored once per distinct name and
/// definition, without an owning file. Returns whether a row was written.
fn insert_macro(tx: &Transaction<'_>, file_id: i64, mac: &MacroData) -> Result<bool> {
    let params_json = mac
        .params
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    if mac.is_builtin {
        let inserted = tx.execute(
            "INSERT INTO macros (name, file_id, line, definition, is_function_like, params, is_builtin)
             SELECT ?1, NULL, 0, ?2, ?3, ?4, 1
             WHERE NOT EXISTS (
                 SELECT 1 FROM macros WHERE is_builtin = 1 AND name = ?1 AND definition = ?2
             )",
            params![mac.name, mac.definition, mac.is_function_like, params_json],
        )?;
        return Ok(inserted > 0);
    }

    tx.execute(
        "INSERT INTO macros (name, file_id, line, definition, is_function_like, params, is_builtin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![
            mac.name,
            file_id,
            mac.line,
            mac.definition,
            mac.is_function_like,
            params_json
        ],
    )?;
    Ok(true)
}
