//! AST walker: turns a translation unit into the rows of one file.
//!
//! The walker visits the top-level cursors of the main file only; cursors
//! that came from included headers are there so names resolve, and are
//! indexed when the header itself is the extraction target. Each cursor kind
//! has a dedicated extractor:
//!
//! - `functions` - prototypes and definitions, parameters, locals, calls
//! - `variables` - file-scope variables
//! - `aggregates` - structs, unions, enums and their members
//! - `typedefs` - typedef names with their fully chased target
//! - `preprocessor` - macro definitions and include directives
//! - `references` - classification of identifier and type uses
//! - `docs` - documentation comment parsing
//!
//! Traversal state (the current function, its locals, the ancestor stack)
//! lives in the [`Walker`] and is threaded through the recursion; nothing is
//! global, so independent walks can run side by side.

mod aggregates;
pub mod docs;
mod functions;
mod preprocessor;
mod references;
mod typedefs;
mod variables;

pub use docs::parse_doc_comment;
pub use references::classify;

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::compile_db::CompileCommand;
use crate::db::{DocData, FileExtraction, Index, LocalSymbol, SymbolData};
use crate::error::{Error, IndexError};
use crate::frontend::{Cursor, CursorKind, TranslationUnit};
use crate::types::{Linkage, StorageClass, SymbolKind};

/// Knobs for a walk.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Maximum typedef hops followed before giving up
    pub typedef_chain_limit: usize,
}

/// Rows extracted from one file, plus the problems met along the way.
#[derive(Debug, Default)]
pub struct Extracted {
    /// Rows ready for the store
    pub extraction: FileExtraction,
    /// Per-file problems that did not stop extraction
    pub errors: Vec<IndexError>,
}

/// Walk the main file of `tu`.
///
/// `path` is the file's registry path, used in error reports. The index is
/// consulted for typedefs declared in files indexed earlier.
#[must_use]
pub fn extract_file(
    tu: &TranslationUnit,
    path: &Path,
    command: &CompileCommand,
    index: &Index,
    options: ExtractOptions,
) -> Extracted {
    let mut walker = Walker::new(tu, path, index, options);
    walker.walk_top_level();
    walker.extract_macros();
    walker.extract_builtin_macros(command);
    walker.extract_includes();

    trace!(
        path = %path.display(),
        symbols = walker.out.symbols.len(),
        references = walker.out.references.len(),
        "Walked file"
    );
    Extracted {
        extraction: walker.out,
        errors: walker.errors,
    }
}

/// Per-function traversal state.
struct FunctionScope {
    symbol: LocalSymbol,
    collect_body: bool,
    locals: Vec<crate::types::Local>,
}

impl FunctionScope {
    fn new(symbol: LocalSymbol, collect_body: bool) -> Self {
        Self {
            symbol,
            collect_body,
            locals: Vec::new(),
        }
    }
}

/// Depth-first walker over one translation unit.
pub(crate) struct Walker<'a> {
    tu: &'a TranslationUnit,
    path: &'a Path,
    index: &'a Index,
    options: ExtractOptions,
    out: FileExtraction,
    errors: Vec<IndexError>,
}

impl<'a> Walker<'a> {
    fn new(tu: &'a TranslationUnit, path: &'a Path, index: &'a Index, options: ExtractOptions) -> Self {
        Self {
            tu,
            path,
            index,
            options,
            out: FileExtraction::default(),
            errors: Vec::new(),
        }
    }

    fn walk_top_level(&mut self) {
        let tu = self.tu;
        for cursor in &tu.root().children {
            if !tu.is_main_file(&cursor.location) {
                continue;
            }
            self.dispatch(cursor);
        }
    }

    /// Hand a declaration cursor to its extractor.
    fn dispatch(&mut self, cursor: &'a Cursor) {
        match cursor.kind {
            CursorKind::FunctionDecl => self.extract_function(cursor),
            CursorKind::VarDecl => self.extract_global(cursor),
            CursorKind::StructDecl | CursorKind::UnionDecl => self.extract_record(cursor),
            CursorKind::EnumDecl => self.extract_enum(cursor),
            CursorKind::TypedefDecl => self.extract_typedef(cursor),
            _ => {}
        }
    }

    /// Add a symbol for a declaration cursor, with its documentation.
    fn push_declaration(&mut self, cursor: &Cursor, name: &str, kind: SymbolKind) -> LocalSymbol {
        let symbol = self.out.push_symbol(SymbolData {
            name: name.to_string(),
            kind,
            line: cursor.location.line,
            column: cursor.location.column,
            span: Some(cursor.extent),
            is_definition: cursor.decl.is_definition,
            storage_class: cursor.decl.storage_class,
            linkage: cursor.decl.linkage,
        });
        self.attach_doc(symbol, cursor);
        symbol
    }

    /// Add a symbol that has no storage class or linkage of its own (tags,
    /// typedefs, enumerators).
    fn push_type_symbol(&mut self, cursor: &Cursor, name: &str, kind: SymbolKind) -> LocalSymbol {
        let symbol = self.out.push_symbol(SymbolData {
            name: name.to_string(),
            kind,
            line: cursor.location.line,
            column: cursor.location.column,
            span: Some(cursor.extent),
            is_definition: true,
            storage_class: StorageClass::None,
            linkage: Linkage::None,
        });
        self.attach_doc(symbol, cursor);
        symbol
    }

    fn attach_doc(&mut self, symbol: LocalSymbol, cursor: &Cursor) {
        if let Some(raw) = cursor.decl.raw_comment.as_deref() {
            self.out.docs.push(DocData {
                symbol,
                doc: parse_doc_comment(raw),
            });
        }
    }

    fn database_error(&mut self, error: &Error) {
        self.errors
            .push(IndexError::database_error(PathBuf::from(self.path), error));
    }
}
