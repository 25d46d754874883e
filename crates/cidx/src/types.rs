//! Domain types for the C source index.
//!
//! - **Entities**: `IndexedFile`, `Symbol`, `Macro`, `CallSite`, `Reference`,
//!   `Include` and the detail rows hanging off symbols (stored in database)
//! - **Results**: `BuildReport`, `IndexStats`, `CallTree` (query and build results)
//!
//! Every enum stored in the database has an `as_str` form; the matching
//! parser lives in `db::helpers` and rejects unknown values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::IndexError;

// ============================================================================
// Strongly-typed ID wrappers
// ============================================================================

/// Row id in the `symbols` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub i64);

impl SymbolId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for SymbolId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Row id in the `files` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl FileId {
    /// Extract the raw i64 value.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for FileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kinds of named program entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Function declaration or definition
    Function,
    /// File-scope variable
    Variable,
    /// `struct` definition
    Struct,
    /// `union` definition
    Union,
    /// `enum` definition
    Enum,
    /// `typedef` name
    Typedef,
    /// Enumerator inside an `enum`
    EnumConstant,
    /// Preprocessor macro
    Macro,
}

impl SymbolKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Typedef => "typedef",
            Self::EnumConstant => "enum_constant",
            Self::Macro => "macro",
        }
    }
}

/// C storage class specifier of a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// No explicit storage class
    #[default]
    None,
    /// `static`
    Static,
    /// `extern`
    Extern,
    /// `register`
    Register,
}

impl StorageClass {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Static => "static",
            Self::Extern => "extern",
            Self::Register => "register",
        }
    }
}

/// Linkage of a declared name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Visible to other translation units
    External,
    /// Visible only inside its translation unit (`static`)
    Internal,
    /// Block-scope names, tags and typedefs
    #[default]
    None,
}

impl Linkage {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::None => "none",
        }
    }
}

/// How a symbol is used at a reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Value is read
    Read,
    /// Left operand of an assignment
    Write,
    /// Operand of unary `&`
    Addr,
    /// Callee of a direct call
    Call,
    /// Type name used in a declaration, cast or `sizeof`
    TypeRef,
}

impl ReferenceKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Addr => "addr",
            Self::Call => "call",
            Self::TypeRef => "type_ref",
        }
    }
}

impl std::str::FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "addr" => Ok(Self::Addr),
            "call" => Ok(Self::Call),
            "type_ref" => Ok(Self::TypeRef),
            other => Err(format!(
                "unknown reference kind '{other}' (expected read, write, addr, call, type_ref)"
            )),
        }
    }
}

/// Kind recorded in a `TypeDetail` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// `struct`
    Struct,
    /// `union`
    Union,
    /// `enum`
    Enum,
    /// `typedef`
    Typedef,
}

impl TypeKind {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Typedef => "typedef",
        }
    }

    /// The symbol kind a type of this kind is stored under.
    #[must_use]
    pub fn symbol_kind(&self) -> SymbolKind {
        match self {
            Self::Struct => SymbolKind::Struct,
            Self::Union => SymbolKind::Union,
            Self::Enum => SymbolKind::Enum,
            Self::Typedef => SymbolKind::Typedef,
        }
    }
}

/// Direction tag of a documented parameter (`[in]`, `[out]`, `[in,out]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDirection {
    /// `[in]`
    In,
    /// `[out]`
    Out,
    /// `[in,out]`
    InOut,
}

impl ParamDirection {
    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "in,out",
        }
    }

    /// Parse the text between the brackets of a direction tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let compact: String = tag.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.to_ascii_lowercase().as_str() {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            "in,out" | "out,in" | "inout" => Some(Self::InOut),
            _ => None,
        }
    }
}

// ============================================================================
// Positions
// ============================================================================

/// A range in source code (1-indexed lines and columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl Span {
    /// Create a new span. Returns `None` if the end precedes the start.
    #[must_use]
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Option<Self> {
        if end_line < start_line || (end_line == start_line && end_column < start_column) {
            return None;
        }
        Some(Self {
            start_line,
            start_column,
            end_line,
            end_column,
        })
    }

    /// A one-character range, always valid.
    #[must_use]
    pub fn point(line: u32, column: u32) -> Self {
        Self {
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column + 1,
        }
    }

    /// First line of the range.
    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Column on the first line.
    #[must_use]
    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    /// Last line of the range.
    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Column on the last line.
    #[must_use]
    pub fn end_column(&self) -> u32 {
        self.end_column
    }
}

// ============================================================================
// Stored entities
// ============================================================================

/// A file tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedFile {
    /// Database ID
    pub id: FileId,
    /// Workspace-relative path, or absolute when outside the workspace
    pub path: PathBuf,
    /// Modification time in nanoseconds since the Unix epoch (0 if unknown)
    pub mtime_ns: i64,
    /// Size in bytes (0 if unknown)
    pub size_bytes: u64,
    /// xxh3 hash of the file contents, absent when the file could not be read
    pub content_hash: Option<u64>,
    /// When the file was last extracted (nanoseconds since the Unix epoch)
    pub indexed_at: i64,
}

/// A named, located program entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    /// Database ID
    pub id: SymbolId,
    /// Owning file
    pub file_id: FileId,
    /// Path of the owning file
    pub file_path: PathBuf,
    /// Symbol name
    pub name: String,
    /// Kind of entity
    pub kind: SymbolKind,
    /// Start line (1-indexed)
    pub line: u32,
    /// Start column (1-indexed)
    pub column: u32,
    /// Full extent, when known
    pub span: Option<Span>,
    /// Definition rather than a declaration
    pub is_definition: bool,
    /// Declared `static`
    pub is_static: bool,
    /// Storage class specifier
    pub storage_class: StorageClass,
    /// Linkage of the name
    pub linkage: Linkage,
}

/// A function symbol joined with its detail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    /// The function's symbol
    pub symbol: Symbol,
    /// Rendered return type (`int`, `const char *`)
    pub return_type: String,
    /// Rendered declaration, e.g. `int add(int a, int b)`
    pub signature: String,
    /// Takes `...`
    pub is_variadic: bool,
    /// Declared `inline`
    pub is_inline: bool,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    /// Zero-based position
    pub position: u32,
    /// Parameter name (`param{i}` when unnamed)
    pub name: String,
    /// Rendered type
    pub type_name: String,
}

/// A variable declared inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Local {
    /// Variable name
    pub name: String,
    /// Rendered type
    pub type_name: String,
    /// Declaration line
    pub line: u32,
    /// Number of enclosing compound statements (function body is 1)
    pub scope_depth: u32,
}

/// A struct, union, enum or typedef joined with its detail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDefinition {
    /// The type's symbol
    pub symbol: Symbol,
    /// Kind of type
    pub kind: TypeKind,
    /// Fully chased target type (typedefs only)
    pub underlying_type: Option<String>,
    /// `sizeof`, when computable
    pub size_bytes: Option<u64>,
    /// `_Alignof`, when computable
    pub alignment: Option<u64>,
    /// Declared without a tag
    pub is_anonymous: bool,
}

/// A struct or union member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Zero-based declaration order
    pub position: u32,
    /// Member name (`field{position}` when unnamed)
    pub name: String,
    /// Rendered type
    pub type_name: String,
    /// Offset from the start of the aggregate, in bits
    pub offset_bits: Option<u64>,
    /// Storage size in bits
    pub size_bits: Option<u64>,
    /// Declared with a bit width
    pub is_bitfield: bool,
    /// Declared bit width
    pub bitfield_width: Option<u32>,
}

impl Field {
    /// Offset in whole bytes, truncating sub-byte bitfield positions.
    #[must_use]
    pub fn offset_bytes(&self) -> Option<u64> {
        self.offset_bits.map(|bits| bits / 8)
    }
}

/// An enumerator with its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumConstant {
    /// Zero-based declaration order
    pub position: u32,
    /// Enumerator name
    pub name: String,
    /// Integer value
    pub value: i64,
}

/// A file-scope variable joined with its detail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// The variable's symbol
    pub symbol: Symbol,
    /// Rendered type
    pub type_name: String,
    /// `const`-qualified
    pub is_const: bool,
    /// `volatile`-qualified
    pub is_volatile: bool,
    /// Initializer source text
    pub initial_value: Option<String>,
}

/// A preprocessor macro definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Macro {
    /// Database ID
    pub id: i64,
    /// Macro name
    pub name: String,
    /// Defining file, absent for builtins
    pub file_path: Option<PathBuf>,
    /// Line of the `#define` (0 for builtins)
    pub line: u32,
    /// Replacement list
    pub definition: String,
    /// Takes arguments
    pub is_function_like: bool,
    /// Ordered parameter names for function-like macros
    pub params: Option<Vec<String>>,
    /// Defined on the command line rather than in a file
    pub is_builtin: bool,
}

/// A call from one function to a named callee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// Calling function
    pub caller_id: SymbolId,
    /// Name of the calling function
    pub caller_name: String,
    /// Name of the callee as written
    pub callee_name: String,
    /// Resolved callee definition, `None` while unresolved
    pub callee_id: Option<SymbolId>,
    /// File containing the call
    pub file_path: PathBuf,
    /// Call line
    pub line: u32,
    /// Call column
    pub column: u32,
    /// Call goes through a pointer, parameter or field
    pub is_indirect: bool,
}

/// A classified use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Referenced symbol
    pub symbol_id: SymbolId,
    /// Referenced symbol's name
    pub symbol_name: String,
    /// File containing the use
    pub file_path: PathBuf,
    /// Use line
    pub line: u32,
    /// Use column
    pub column: u32,
    /// How the symbol is used
    pub kind: ReferenceKind,
    /// Name of the function containing the use
    pub context_function: Option<String>,
}

/// An `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Include {
    /// Including file
    pub file_path: PathBuf,
    /// Path as written between the quotes or brackets
    pub included_path: String,
    /// Absolute path the include resolved to
    pub resolved_path: Option<String>,
    /// Directive line
    pub line: u32,
    /// Classified as a system header
    pub is_system: bool,
}

/// A documented parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDoc {
    /// Parameter name
    pub name: String,
    /// Description text
    pub description: String,
    /// Direction tag, when present
    pub direction: Option<ParamDirection>,
}

/// A parsed documentation comment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Documentation {
    /// Comment text as written
    pub raw_comment: String,
    /// Brief description
    pub brief: Option<String>,
    /// Detailed description
    pub detailed: Option<String>,
    /// Return value description
    pub return_doc: Option<String>,
    /// Documented parameters, in order
    pub params: Vec<ParamDoc>,
}

/// Where a type name shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSite {
    /// A `type_ref` cross-reference (declaration, cast, `sizeof`)
    Reference,
    /// Type of a file-scope variable
    Variable,
    /// Type of a function parameter
    Parameter,
    /// Type of a struct or union member
    Field,
}

/// One use of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeUsage {
    /// What kind of construct uses the type
    pub site: UsageSite,
    /// Name of the variable, parameter or field; the type itself for references
    pub name: String,
    /// Function or aggregate owning a parameter or field, or the function
    /// containing a reference
    pub owner: Option<String>,
    /// Declared type text, absent for references
    pub type_name: Option<String>,
    /// File of the use
    pub file_path: PathBuf,
    /// Line of the use
    pub line: u32,
}

/// Where a name is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Definition {
    /// A symbol (definition, or declaration when no definition exists)
    Symbol(Symbol),
    /// A macro
    Macro(Macro),
}

impl Definition {
    /// Defined name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Symbol(symbol) => &symbol.name,
            Self::Macro(mac) => &mac.name,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// A node of a bounded call tree.
///
/// A `truncated` node stands in for a subtree that was cut off at the depth
/// limit or because its name already appears on the path from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTree {
    /// Function name
    pub name: String,
    /// Callees, in call order
    pub calls: Vec<CallTree>,
    /// Sentinel leaf
    pub truncated: bool,
}

/// Lifecycle state of a file relative to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// Never indexed
    Unknown,
    /// Indexed and up to date
    Indexed,
    /// Indexed, but changed on disk since
    Stale,
    /// Indexed, but gone from disk
    Removed,
}

/// Outcome of a build or update batch.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Files successfully walked
    pub files_processed: usize,
    /// Files with a per-file error that prevented or limited extraction
    pub files_failed: usize,
    /// Files purged because they no longer exist
    pub files_removed: usize,
    /// Rows inserted, by table name
    pub rows_inserted: BTreeMap<&'static str, usize>,
    /// Call sites linked by the resolver in this batch
    pub calls_resolved: usize,
    /// Call sites still unresolved after the batch
    pub calls_unresolved: usize,
    /// Per-file errors
    pub errors: Vec<IndexError>,
    /// Wall-clock time of the batch
    pub duration: Duration,
}

impl BuildReport {
    /// Add per-table counts from one file's extraction.
    pub fn add_rows(&mut self, counts: &BTreeMap<&'static str, usize>) {
        for (table, count) in counts {
            *self.rows_inserted.entry(table).or_insert(0) += count;
        }
    }

    /// Total rows inserted across tables.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.rows_inserted.values().sum()
    }
}

/// Row counts of the index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Rows per table
    pub tables: BTreeMap<String, usize>,
    /// `extraction_meta` key/value pairs
    pub meta: BTreeMap<String, String>,
}
