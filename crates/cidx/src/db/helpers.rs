//! Row mapping between `SQLite` and the domain types.
//!
//! Each `*_COLUMNS` list is paired with the `row_to_*` function that reads
//! it, so the column order lives in one place.

use std::path::PathBuf;

use rusqlite::types::Type;

use crate::types::{
    CallSite, EnumConstant, Field, FileId, Function, Include, IndexedFile, Linkage, Local, Macro,
    ParamDirection, Parameter, Reference, ReferenceKind, Span, StorageClass, Symbol, SymbolId,
    SymbolKind, TypeDefinition, TypeKind, Variable,
};

/// Columns read by `row_to_indexed_file`.
pub(crate) const FILES_COLUMNS: &str =
    "id, path, mtime_ns, size_bytes, content_hash, indexed_at";

/// Columns read by `row_to_symbol`, over `symbols s JOIN files f`.
pub(crate) const SYMBOLS_COLUMNS: &str = "s.id, s.file_id, f.path, s.name, s.kind, s.line, \
     s.column, s.end_line, s.end_column, s.is_definition, s.is_static, s.storage_class, s.linkage";

/// Number of columns in [`SYMBOLS_COLUMNS`], for offsetting detail columns.
pub(crate) const SYMBOLS_COLUMN_COUNT: usize = 13;

/// SQL column list for function details (`fn_` alias), after [`SYMBOLS_COLUMNS`].
pub(crate) const FUNCTIONS_COLUMNS: &str =
    "fn_.return_type, fn_.signature, fn_.is_variadic, fn_.is_inline";

/// SQL column list for type details (`t` alias), after [`SYMBOLS_COLUMNS`].
pub(crate) const TYPES_COLUMNS: &str =
    "t.kind, t.underlying_type, t.size_bytes, t.alignment, t.is_anonymous";

/// SQL column list for variable details (`v` alias), after [`SYMBOLS_COLUMNS`].
pub(crate) const VARIABLES_COLUMNS: &str = "v.type, v.is_const, v.is_volatile, v.initial_value";

/// SQL column list for macros (`m` alias) with their optional file (`f` alias).
pub(crate) const MACROS_COLUMNS: &str = "m.id, m.name, f.path, m.line, m.definition, \
     m.is_function_like, m.params, m.is_builtin";

/// SQL column list for call sites (`c` alias) joined with the caller
/// symbol (`caller` alias) and the file (`f` alias).
pub(crate) const CALLS_COLUMNS: &str = "c.caller_id, caller.name, c.callee_name, c.callee_id, \
     f.path, c.line, c.column, c.is_indirect";

/// SQL column list for references (`r` alias) joined with the file (`f`)
/// and the optional context function (`ctx`).
pub(crate) const REFS_COLUMNS: &str =
    "r.symbol_id, r.symbol_name, f.path, r.line, r.column, r.kind, ctx.name";

/// SQL column list for includes (`i` alias) joined with the file (`f`).
pub(crate) const INCLUDES_COLUMNS: &str =
    "f.path, i.included_path, i.resolved_path, i.line, i.is_system";

/// SQL condition matching `column` against a path parameter either exactly
/// or as a trailing path component sequence (`util.c` matches `src/util.c`).
pub(crate) fn path_matches(column: &str, param: &str) -> String {
    format!(
        "({column} = {param} OR (length({column}) > length({param}) \
         AND substr({column}, -length({param}) - 1) = '/' || {param}))"
    )
}

fn unknown_value(what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!(
            "Unknown {what} '{value}' in database. Database may be corrupted or from a newer version."
        )
        .into(),
    )
}

/// Parse a symbol kind string from the database.
///
/// Returns an error for unrecognized values, indicating possible database corruption.
pub(crate) fn parse_symbol_kind(s: &str) -> rusqlite::Result<SymbolKind> {
    match s {
        "function" => Ok(SymbolKind::Function),
        "variable" => Ok(SymbolKind::Variable),
        "struct" => Ok(SymbolKind::Struct),
        "union" => Ok(SymbolKind::Union),
        "enum" => Ok(SymbolKind::Enum),
        "typedef" => Ok(SymbolKind::Typedef),
        "enum_constant" => Ok(SymbolKind::EnumConstant),
        "macro" => Ok(SymbolKind::Macro),
        unknown => Err(unknown_value("symbol kind", unknown)),
    }
}

/// Parse a storage class string from the database.
pub(crate) fn parse_storage_class(s: &str) -> rusqlite::Result<StorageClass> {
    match s {
        "none" => Ok(StorageClass::None),
        "static" => Ok(StorageClass::Static),
        "extern" => Ok(StorageClass::Extern),
        "register" => Ok(StorageClass::Register),
        unknown => Err(unknown_value("storage class", unknown)),
    }
}

/// Parse a linkage string from the database.
pub(crate) fn parse_linkage(s: &str) -> rusqlite::Result<Linkage> {
    match s {
        "external" => Ok(Linkage::External),
        "internal" => Ok(Linkage::Internal),
        "none" => Ok(Linkage::None),
        unknown => Err(unknown_value("linkage", unknown)),
    }
}

/// Parse a reference kind string from the database.
pub(crate) fn parse_reference_kind(s: &str) -> rusqlite::Result<ReferenceKind> {
    s.parse()
        .map_err(|_: String| unknown_value("reference kind", s))
}

/// Parse a type kind string from the database.
pub(crate) fn parse_type_kind(s: &str) -> rusqlite::Result<TypeKind> {
    match s {
        "struct" => Ok(TypeKind::Struct),
        "union" => Ok(TypeKind::Union),
        "enum" => Ok(TypeKind::Enum),
        "typedef" => Ok(TypeKind::Typedef),
        unknown => Err(unknown_value("type kind", unknown)),
    }
}

/// Parse a parameter direction string from the database.
pub(crate) fn parse_direction(s: &str) -> rusqlite::Result<ParamDirection> {
    match s {
        "in" => Ok(ParamDirection::In),
        "out" => Ok(ParamDirection::Out),
        "in,out" => Ok(ParamDirection::InOut),
        unknown => Err(unknown_value("parameter direction", unknown)),
    }
}

/// Build a span from start and optional end positions.
///
/// Returns `None` if either `end_line` or `end_column` is missing, or if the
/// span would be invalid (end before start).
pub(crate) fn build_span(
    start_line: u32,
    start_column: u32,
    end_line: Option<u32>,
    end_column: Option<u32>,
) -> Option<Span> {
    end_line
        .zip(end_column)
        .and_then(|(el, ec)| Span::new(start_line, start_column, el, ec))
}

/// Convert a database row to an [`IndexedFile`].
///
/// Expected columns: id, path, `mtime_ns`, `size_bytes`, `content_hash`, `indexed_at`
pub(crate) fn row_to_indexed_file(row: &rusqlite::Row) -> rusqlite::Result<IndexedFile> {
    Ok(IndexedFile {
        id: FileId::from(row.get::<_, i64>(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
        mtime_ns: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        content_hash: row.get::<_, Option<i64>>(4)?.map(|h| h as u64),
        indexed_at: row.get(5)?,
    })
}

/// Convert a database row to a [`Symbol`] (see [`SYMBOLS_COLUMNS`]).
pub(crate) fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Symbol> {
    let line: u32 = row.get(5)?;
    let column: u32 = row.get(6)?;
    Ok(Symbol {
        id: SymbolId::from(row.get::<_, i64>(0)?),
        file_id: FileId::from(row.get::<_, i64>(1)?),
        file_path: PathBuf::from(row.get::<_, String>(2)?),
        name: row.get(3)?,
        kind: parse_symbol_kind(row.get::<_, String>(4)?.as_str())?,
        line,
        column,
        span: build_span(line, column, row.get(7)?, row.get(8)?),
        is_definition: row.get(9)?,
        is_static: row.get(10)?,
        storage_class: parse_storage_class(row.get::<_, String>(11)?.as_str())?,
        linkage: parse_linkage(row.get::<_, String>(12)?.as_str())?,
    })
}

/// Convert a row of [`SYMBOLS_COLUMNS`] followed by [`FUNCTIONS_COLUMNS`].
pub(crate) fn row_to_function(row: &rusqlite::Row) -> rusqlite::Result<Function> {
    let base = SYMBOLS_COLUMN_COUNT;
    Ok(Function {
        symbol: row_to_symbol(row)?,
        return_type: row.get(base)?,
        signature: row.get(base + 1)?,
        is_variadic: row.get(base + 2)?,
        is_inline: row.get(base + 3)?,
    })
}

/// Convert a row of [`SYMBOLS_COLUMNS`] followed by [`TYPES_COLUMNS`].
pub(crate) fn row_to_type(row: &rusqlite::Row) -> rusqlite::Result<TypeDefinition> {
    let base = SYMBOLS_COLUMN_COUNT;
    Ok(TypeDefinition {
        symbol: row_to_symbol(row)?,
        kind: parse_type_kind(row.get::<_, String>(base)?.as_str())?,
        underlying_type: row.get(base + 1)?,
        size_bytes: row.get::<_, Option<i64>>(base + 2)?.map(|v| v as u64),
        alignment: row.get::<_, Option<i64>>(base + 3)?.map(|v| v as u64),
        is_anonymous: row.get(base + 4)?,
    })
}

/// Convert a row of [`SYMBOLS_COLUMNS`] followed by [`VARIABLES_COLUMNS`].
pub(crate) fn row_to_variable(row: &rusqlite::Row) -> rusqlite::Result<Variable> {
    let base = SYMBOLS_COLUMN_COUNT;
    Ok(Variable {
        symbol: row_to_symbol(row)?,
        type_name: row.get(base)?,
        is_const: row.get(base + 1)?,
        is_volatile: row.get(base + 2)?,
        initial_value: row.get(base + 3)?,
    })
}

/// Convert a `position, name, type` row to a [`Parameter`].
pub(crate) fn row_to_parameter(row: &rusqlite::Row) -> rusqlite::Result<Parameter> {
    Ok(Parameter {
        position: row.get(0)?,
        name: row.get(1)?,
        type_name: row.get(2)?,
    })
}

/// Convert a `name, type, line, scope_depth` row to a [`Local`].
pub(crate) fn row_to_local(row: &rusqlite::Row) -> rusqlite::Result<Local> {
    Ok(Local {
        name: row.get(0)?,
        type_name: row.get(1)?,
        line: row.get(2)?,
        scope_depth: row.get(3)?,
    })
}

/// Convert a `position, name, type, offset_bits, size_bits, is_bitfield,
/// bitfield_width` row to a [`Field`].
pub(crate) fn row_to_field(row: &rusqlite::Row) -> rusqlite::Result<Field> {
    Ok(Field {
        position: row.get(0)?,
        name: row.get(1)?,
        type_name: row.get(2)?,
        offset_bits: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
        size_bits: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        is_bitfield: row.get(5)?,
        bitfield_width: row.get(6)?,
    })
}

/// Convert a `position, name, value` row to an [`EnumConstant`].
pub(crate) fn row_to_enum_constant(row: &rusqlite::Row) -> rusqlite::Result<EnumConstant> {
    Ok(EnumConstant {
        position: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
    })
}

/// Convert a database row to a [`Macro`] (see [`MACROS_COLUMNS`]).
pub(crate) fn row_to_macro(row: &rusqlite::Row) -> rusqlite::Result<Macro> {
    let params = row
        .get::<_, Option<String>>(6)?
        .map(|json| {
            serde_json::from_str::<Vec<String>>(&json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))
        })
        .transpose()?;
    Ok(Macro {
        id: row.get(0)?,
        name: row.get(1)?,
        file_path: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
        line: row.get(3)?,
        definition: row.get(4)?,
        is_function_like: row.get(5)?,
        params,
        is_builtin: row.get(7)?,
    })
}

/// Convert a database row to a [`CallSite`] (see [`CALLS_COLUMNS`]).
pub(crate) fn row_to_call_site(row: &rusqlite::Row) -> rusqlite::Result<CallSite> {
    Ok(CallSite {
        caller_id: SymbolId::from(row.get::<_, i64>(0)?),
        caller_name: row.get(1)?,
        callee_name: row.get(2)?,
        callee_id: row.get::<_, Option<i64>>(3)?.map(SymbolId::from),
        file_path: PathBuf::from(row.get::<_, String>(4)?),
        line: row.get(5)?,
        column: row.get(6)?,
        is_indirect: row.get(7)?,
    })
}

/// Convert a database row to a [`Reference`] (see [`REFS_COLUMNS`]).
pub(crate) fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<Reference> {
    Ok(Reference {
        symbol_id: SymbolId::from(row.get::<_, i64>(0)?),
        symbol_name: row.get(1)?,
        file_path: PathBuf::from(row.get::<_, String>(2)?),
        line: row.get(3)?,
        column: row.get(4)?,
        kind: parse_reference_kind(row.get::<_, String>(5)?.as_str())?,
        context_function: row.get(6)?,
    })
}

/// Convert a database row to an [`Include`] (see [`INCLUDES_COLUMNS`]).
pub(crate) fn row_to_include(row: &rusqlite::Row) -> rusqlite::Result<Include> {
    Ok(Include {
        file_path: PathBuf::from(row.get::<_, String>(0)?),
        included_path: row.get(1)?,
        resolved_path: row.get(2)?,
        line: row.get(3)?,
        is_system: row.get(4)?,
    })
}
