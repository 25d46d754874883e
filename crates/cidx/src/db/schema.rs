//! Database schema definition for the C index.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Indexed source files
-- AUTOINCREMENT everywhere: ids are never reused within one index
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    mtime_ns INTEGER NOT NULL,
    size_bytes INTEGER NOT NULL,
    content_hash INTEGER,
    indexed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);

-- Key/value facts about the last extraction (timestamp, workspace root)
CREATE TABLE IF NOT EXISTS extraction_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Named program entities; a declaration and its definition are separate rows
CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    line INTEGER NOT NULL,
    column INTEGER NOT NULL,
    end_line INTEGER,
    end_column INTEGER,
    is_definition INTEGER NOT NULL,
    is_static INTEGER NOT NULL,
    storage_class TEXT NOT NULL,
    linkage TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);
CREATE INDEX IF NOT EXISTS idx_symbols_definitions ON symbols(name, kind) WHERE is_definition = 1;

CREATE TABLE IF NOT EXISTS functions (
    symbol_id INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    return_type TEXT NOT NULL,
    signature TEXT NOT NULL,
    is_variadic INTEGER NOT NULL,
    is_inline INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS parameters (
    function_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    PRIMARY KEY (function_id, position)
);

CREATE TABLE IF NOT EXISTS locals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    line INTEGER NOT NULL,
    scope_depth INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_locals_function ON locals(function_id);

-- struct / union / enum / typedef details
CREATE TABLE IF NOT EXISTS types (
    symbol_id INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    underlying_type TEXT,
    size_bytes INTEGER,
    alignment INTEGER,
    is_anonymous INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS fields (
    type_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    offset_bits INTEGER,
    size_bits INTEGER,
    is_bitfield INTEGER NOT NULL,
    bitfield_width INTEGER,
    PRIMARY KEY (type_id, position)
);

CREATE TABLE IF NOT EXISTS enum_constants (
    enum_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (enum_id, position)
);

CREATE INDEX IF NOT EXISTS idx_enum_constants_name ON enum_constants(name);

CREATE TABLE IF NOT EXISTS variables (
    symbol_id INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    is_const INTEGER NOT NULL,
    is_volatile INTEGER NOT NULL,
    initial_value TEXT
);

-- Macros are not symbols; file_id is NULL for command-line (builtin) macros
CREATE TABLE IF NOT EXISTS macros (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    file_id INTEGER REFERENCES files(id) ON DELETE CASCADE,
    line INTEGER NOT NULL,
    definition TEXT NOT NULL,
    is_function_like INTEGER NOT NULL,
    params TEXT,
    is_builtin INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_macros_name ON macros(name);
CREATE INDEX IF NOT EXISTS idx_macros_file ON macros(file_id);

-- Call sites; callee_id is NULL until the resolver links callee_name
CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caller_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    callee_name TEXT NOT NULL,
    callee_id INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    line INTEGER NOT NULL,
    column INTEGER NOT NULL,
    is_indirect INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_caller ON calls(caller_id);
CREATE INDEX IF NOT EXISTS idx_calls_callee ON calls(callee_id);
CREATE INDEX IF NOT EXISTS idx_calls_callee_name ON calls(callee_name);
CREATE INDEX IF NOT EXISTS idx_calls_unresolved ON calls(callee_id) WHERE callee_id IS NULL;

-- Classified uses of symbols
-- symbol_id is NULL while pending; symbol_name/symbol_kind drive resolution
CREATE TABLE IF NOT EXISTS refs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol_id INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
    symbol_name TEXT NOT NULL,
    symbol_kind TEXT NOT NULL,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    line INTEGER NOT NULL,
    column INTEGER NOT NULL,
    kind TEXT NOT NULL,
    context_function_id INTEGER REFERENCES symbols(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_refs_symbol ON refs(symbol_id);
CREATE INDEX IF NOT EXISTS idx_refs_file ON refs(file_id);
CREATE INDEX IF NOT EXISTS idx_refs_unresolved ON refs(symbol_id) WHERE symbol_id IS NULL;

CREATE TABLE IF NOT EXISTS includes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    included_path TEXT NOT NULL,
    resolved_path TEXT,
    line INTEGER NOT NULL,
    is_system INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_includes_file ON includes(file_id);
CREATE INDEX IF NOT EXISTS idx_includes_resolved ON includes(resolved_path);

CREATE TABLE IF NOT EXISTS docs (
    symbol_id INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
    raw_comment TEXT NOT NULL,
    brief TEXT,
    detailed TEXT,
    return_doc TEXT
);

CREATE TABLE IF NOT EXISTS param_docs (
    symbol_id INTEGER NOT NULL REFERENCES docs(symbol_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    direction TEXT,
    PRIMARY KEY (symbol_id, position)
);

CREATE TABLE IF NOT EXISTS source_cache (
    file_id INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
    content TEXT NOT NULL
);
";

/// Tables of the index, in dependency order (parents first).
pub(crate) const TABLES: &[&str] = &[
    "files",
    "extraction_meta",
    "symbols",
    "functions",
    "parameters",
    "locals",
    "types",
    "fields",
    "enum_constants",
    "variables",
    "macros",
    "calls",
    "refs",
    "includes",
    "docs",
    "param_docs",
    "source_cache",
];
