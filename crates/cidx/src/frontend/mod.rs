//! The C front end: source text in, cursor tree out.
//!
//! The extractors never see tree-sitter directly. They consume a neutral,
//! owned cursor model in the style of a compiler front end's AST API: every
//! [`Cursor`] has a kind, a spelling, a location and extent, an optional type
//! and referenced declaration, and children. A [`TranslationUnit`] adds the
//! preprocessing record (macro definitions, inclusion directives),
//! diagnostics, and a [`TypeTable`] answering typedef, size, alignment and
//! offset queries.
//!
//! ## Module Structure
//!
//! - `c` - [`TreeSitterFrontend`], lowering tree-sitter-c syntax trees
//! - `ctype` - structural C types and their spelling
//! - `layout` - type table and LP64 layout rules
//! - `lex` - preprocessing tokens
//! - `consteval` - integer constant expressions

mod c;
mod consteval;
pub mod ctype;
pub mod layout;
pub mod lex;
mod tree_sitter_utils;

pub use c::TreeSitterFrontend;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compile_db::CompileCommand;
use crate::types::{Linkage, Span, StorageClass};
use ctype::{CType, TypeNode};
use layout::TypeTable;
use lex::Token;

/// Why a file produced no translation unit at all.
#[derive(Debug, Error)]
pub enum ParseFailure {
    /// The source could not be read
    #[error("cannot read source: {0}")]
    Io(#[from] std::io::Error),

    /// The source is not UTF-8
    #[error("source is not valid UTF-8")]
    Encoding,

    /// The parser gave up without a tree
    #[error("parser produced no syntax tree")]
    NoTree,
}

/// Turns one source file plus its compiler arguments into a translation unit.
pub trait Frontend {
    /// Parse `source_path` as compiled by `command`.
    fn parse(
        &mut self,
        source_path: &Path,
        command: &CompileCommand,
    ) -> Result<TranslationUnit, ParseFailure>;
}

/// Index into a translation unit's file table. The main file is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileRef(pub u32);

impl FileRef {
    /// The file being compiled.
    pub const MAIN: Self = Self(0);
}

/// A point in a source file (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// File containing the point
    pub file: FileRef,
    /// Line
    pub line: u32,
    /// Column
    pub column: u32,
}

/// Kinds of cursors produced by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    /// Root of the tree
    TranslationUnit,
    /// Function declaration or definition
    FunctionDecl,
    /// Function parameter
    ParmDecl,
    /// Variable, global or local
    VarDecl,
    /// Struct or union member
    FieldDecl,
    /// `struct`
    StructDecl,
    /// `union`
    UnionDecl,
    /// `enum`
    EnumDecl,
    /// Enumerator
    EnumConstantDecl,
    /// `typedef`
    TypedefDecl,
    /// `{ ... }` block
    CompoundStmt,
    /// Function call
    CallExpr,
    /// Use of a declared name in an expression
    DeclRefExpr,
    /// Use of a type name
    TypeRef,
    /// Prefix or postfix unary operator
    UnaryOperator,
    /// Binary operator, including plain `=`
    BinaryOperator,
    /// `+=`, `<<=` and friends
    CompoundAssignOperator,
    /// `a.b` or `a->b`
    MemberRefExpr,
    /// `( expr )`
    ParenExpr,
    /// Any other expression
    UnexposedExpr,
    /// Any other statement
    UnexposedStmt,
}

/// Summary of the declaration a name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclRef {
    /// Declared name
    pub name: String,
    /// Kind of the declaring cursor
    pub kind: CursorKind,
    /// Linkage of the declaration; block-scope names have none
    pub linkage: Linkage,
}

impl DeclRef {
    /// Create a declaration summary.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: CursorKind, linkage: Linkage) -> Self {
        Self {
            name: name.into(),
            kind,
            linkage,
        }
    }
}

/// Declaration attributes; meaningful only on declaration cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclAttrs {
    /// Definition rather than declaration
    pub is_definition: bool,
    /// Storage class specifier
    pub storage_class: StorageClass,
    /// Linkage
    pub linkage: Linkage,
    /// `inline` specifier present
    pub is_inline: bool,
    /// Documentation comment directly above the declaration
    pub raw_comment: Option<String>,
    /// Bitfield width of a field
    pub bit_width: Option<u32>,
    /// Value of an enumerator
    pub enum_value: Option<i64>,
    /// Initializer source text of a variable
    pub initializer: Option<String>,
    /// Stable hash of the declaring node
    pub hash: u64,
}

/// A node of the lowered syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Node kind
    pub kind: CursorKind,
    /// Declared or referenced name, empty when there is none
    pub spelling: String,
    /// Position of the name (or of the node when unnamed)
    pub location: SourceLocation,
    /// Full range of the node
    pub extent: Span,
    /// Declared type of declarations, result type of calls when known
    pub ty: Option<CType>,
    /// Declaration a reference, call or type use resolves to
    pub referenced: Option<DeclRef>,
    /// Operator token of operator cursors
    pub operator: Option<String>,
    /// Declaration attributes
    pub decl: DeclAttrs,
    /// Children in source order
    pub children: Vec<Cursor>,
}

impl Cursor {
    /// A cursor with no type, reference or children.
    #[must_use]
    pub fn new(
        kind: CursorKind,
        spelling: impl Into<String>,
        location: SourceLocation,
        extent: Span,
    ) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            location,
            extent,
            ty: None,
            referenced: None,
            operator: None,
            decl: DeclAttrs::default(),
            children: Vec::new(),
        }
    }

    /// Whether this cursor declares something a definition can exist for.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.decl.is_definition
    }
}

/// A `#define` in the preprocessing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    /// Macro name
    pub name: String,
    /// Position of the name
    pub location: SourceLocation,
    /// Directive text starting at the name
    pub text: String,
    /// Tokens of `text`, with byte offsets into it
    pub tokens: Vec<Token>,
}

/// An `#include` in the preprocessing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionDirective {
    /// Path as written
    pub spelling: String,
    /// Written with angle brackets
    pub is_angled: bool,
    /// Position of the directive
    pub location: SourceLocation,
    /// File the include resolved to
    pub resolved: Option<PathBuf>,
    /// Resolved through a system include directory
    pub in_system_dir: bool,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Suspicious but parseable
    Warning,
    /// Part of the file could not be parsed
    Error,
}

/// A problem reported while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How bad it is
    pub severity: Severity,
    /// What went wrong
    pub message: String,
    /// Where
    pub location: SourceLocation,
}

/// A parsed translation unit.
#[derive(Debug)]
pub struct TranslationUnit {
    files: Vec<PathBuf>,
    root: Cursor,
    diagnostics: Vec<Diagnostic>,
    macros: Vec<MacroDefinition>,
    inclusions: Vec<InclusionDirective>,
    types: TypeTable,
}

impl TranslationUnit {
    /// Assemble a translation unit. The first file is the main file.
    #[must_use]
    pub fn new(
        files: Vec<PathBuf>,
        root: Cursor,
        diagnostics: Vec<Diagnostic>,
        macros: Vec<MacroDefinition>,
        inclusions: Vec<InclusionDirective>,
        types: TypeTable,
    ) -> Self {
        Self {
            files,
            root,
            diagnostics,
            macros,
            inclusions,
            types,
        }
    }

    /// Root cursor.
    #[must_use]
    pub fn root(&self) -> &Cursor {
        &self.root
    }

    /// Path of a file of this unit.
    #[must_use]
    pub fn file_path(&self, file: FileRef) -> Option<&Path> {
        self.files.get(file.0 as usize).map(PathBuf::as_path)
    }

    /// Whether a location lies in the main file.
    #[must_use]
    pub fn is_main_file(&self, location: &SourceLocation) -> bool {
        location.file == FileRef::MAIN
    }

    /// Diagnostics of all parsed files.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Error diagnostics located in the main file.
    pub fn main_file_errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error && d.location.file == FileRef::MAIN)
    }

    /// Macro definitions of all parsed files, in source order.
    #[must_use]
    pub fn macro_definitions(&self) -> &[MacroDefinition] {
        &self.macros
    }

    /// Include directives of all parsed files, in source order.
    #[must_use]
    pub fn inclusion_directives(&self) -> &[InclusionDirective] {
        &self.inclusions
    }

    /// Type table of the unit.
    #[must_use]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// `sizeof` a type, when computable.
    #[must_use]
    pub fn size_of(&self, ty: &CType) -> Option<u64> {
        self.types.size_of(ty)
    }

    /// `_Alignof` a type, when computable.
    #[must_use]
    pub fn align_of(&self, ty: &CType) -> Option<u64> {
        self.types.align_of(ty)
    }

    /// Offset in bits and storage size in bits of the `index`-th field of a
    /// record type.
    #[must_use]
    pub fn field_layout(&self, record: &CType, index: usize) -> (Option<u64>, Option<u64>) {
        let TypeNode::Record(kind, name) = &record.node else {
            return (None, None);
        };
        self.types
            .record_layout(*kind, name)
            .map_or((None, None), |layout| {
                (
                    layout.offsets_bits.get(index).copied().flatten(),
                    layout.sizes_bits.get(index).copied().flatten(),
                )
            })
    }
}

/// Name given to an aggregate declared without a tag.
#[must_use]
pub fn anonymous_name(keyword: &str, hash: u64) -> String {
    format!("<anonymous_{keyword}_{hash:016x}>")
}

/// Options shared by every parse.
#[derive(Debug, Clone)]
pub struct FrontendOptions {
    /// Directories whose headers are system headers (never parsed)
    pub system_include_dirs: Vec<PathBuf>,
    /// How deep project headers are followed
    pub max_include_depth: usize,
}
