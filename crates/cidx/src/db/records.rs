//! Owned rows produced by extraction, waiting to be written for one file.
//!
//! Symbols are addressed by their position in [`FileExtraction::symbols`]
//! until the store assigns database ids inside the file's transaction.

use std::path::PathBuf;

use crate::types::{
    Documentation, EnumConstant, Field, Linkage, Local, Parameter, ReferenceKind, Span,
    StorageClass, SymbolKind, TypeKind,
};

/// Position of a symbol within [`FileExtraction::symbols`].
pub type LocalSymbol = usize;

/// Registry data for the file being stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Workspace-relative path, or absolute when outside the workspace
    pub path: PathBuf,
    /// Modification time in nanoseconds since the Unix epoch (0 if unknown)
    pub mtime_ns: i64,
    /// Size in bytes (0 if unknown)
    pub size_bytes: u64,
    /// xxh3 of the contents, absent when the file could not be read
    pub content_hash: Option<u64>,
}

/// Data required to insert a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolData {
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
    pub column: u32,
    pub span: Option<Span>,
    pub is_definition: bool,
    pub storage_class: StorageClass,
    pub linkage: Linkage,
}

impl SymbolData {
    /// Whether the symbol was declared `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.storage_class == StorageClass::Static
    }
}

/// Function detail with its parameters and locals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionData {
    pub symbol: LocalSymbol,
    pub return_type: String,
    pub signature: String,
    pub is_variadic: bool,
    pub is_inline: bool,
    pub parameters: Vec<Parameter>,
    pub locals: Vec<Local>,
}

/// Type detail with its fields or enumerators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeData {
    pub symbol: LocalSymbol,
    pub kind: TypeKind,
    pub underlying_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub alignment: Option<u64>,
    pub is_anonymous: bool,
    pub fields: Vec<Field>,
    pub enum_constants: Vec<EnumConstant>,
}

/// Variable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableData {
    pub symbol: LocalSymbol,
    pub type_name: String,
    pub is_const: bool,
    pub is_volatile: bool,
    pub initial_value: Option<String>,
}

/// A macro definition. Builtins are stored without an owning file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroData {
    pub name: String,
    pub line: u32,
    pub definition: String,
    pub is_function_like: bool,
    pub params: Option<Vec<String>>,
    pub is_builtin: bool,
}

/// A call recorded by callee name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    pub caller: LocalSymbol,
    pub callee_name: String,
    pub line: u32,
    pub column: u32,
    pub is_indirect: bool,
}

/// A classified use, linked to its target symbol by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceData {
    pub symbol_name: String,
    pub symbol_kind: SymbolKind,
    pub line: u32,
    pub column: u32,
    pub kind: ReferenceKind,
    pub context_function: Option<LocalSymbol>,
}

/// An `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeData {
    pub included_path: String,
    pub resolved_path: Option<String>,
    pub line: u32,
    pub is_system: bool,
}

/// Parsed documentation attached to a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocData {
    pub symbol: LocalSymbol,
    pub doc: Documentation,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileExtraction {
    pub symbols: Vec<SymbolData>,
    pub functions: Vec<FunctionData>,
    pub types: Vec<TypeData>,
    pub variables: Vec<VariableData>,
    pub macros: Vec<MacroData>,
    pub calls: Vec<CallData>,
    pub references: Vec<ReferenceData>,
    pub includes: Vec<IncludeData>,
    pub docs: Vec<DocData>,
}

impl FileExtraction {
    /// Append a symbol and return its local handle.
    pub fn push_symbol(&mut self, symbol: SymbolData) -> LocalSymbol {
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }
}
