//! # Cidx: Incremental Source Index for C
//!
//! Cidx walks C translation units and keeps a `SQLite` index of their
//! symbols, types, call graph, cross-references, macros and documentation.
//! The index is built once from a compile commands manifest and then kept
//! fresh by re-extracting only the files that changed.
//!
//! ## Design Philosophy
//!
//! - **Record now, link later** - calls and references are stored by name
//!   during the walk and linked to symbols once the whole batch is stored
//! - **File granularity** - a file's rows are replaced wholesale in one
//!   transaction, never patched
//! - **Failures stay local** - a file that cannot be parsed is reported and
//!   the batch carries on
//! - **Absent is not an error** - queries for unknown names return `None`
//!   or an empty list
//!
//! ## Quick Start
//!
//! ```no_run
//! use cidx::Cidx;
//! use std::path::Path;
//!
//! let mut cidx = Cidx::open(Path::new("/path/to/project"))?;
//!
//! // Index every file of compile_commands.json
//! let report = cidx.build()?;
//! println!("Indexed {} files", report.files_processed);
//!
//! // Walk the call graph
//! for call in cidx.get_callees("main")? {
//!     println!("main calls {}", call.callee_name);
//! }
//!
//! // Later: re-index only what changed on disk
//! let update = cidx.update_stale()?;
//! println!("{} files failed", update.files_failed);
//! # Ok::<(), cidx::Error>(())
//! ```

mod compile_db;
mod config;
mod db;
mod error;
mod expand;
mod extract;
mod frontend;
mod graph;
mod incremental;
mod registry;
mod resolver;
mod types;

pub use compile_db::{CompileCommand, CompileDatabase};
pub use config::{
    CIDX_DIR_NAME, CONFIG_FILE_NAME, CallResolution, Config, DEFAULT_MAX_INCLUDE_DEPTH,
    DEFAULT_TYPEDEF_CHAIN_LIMIT,
};
pub use error::{Error, IndexError, IndexErrorKind, Result};
pub use extract::parse_doc_comment;
pub use graph::CallGraph;
pub use types::{
    BuildReport, CallSite, CallTree, Definition, Documentation, EnumConstant, Field, FileId,
    FileState, Function, Include, IndexStats, IndexedFile, Linkage, Local, Macro, ParamDirection,
    ParamDoc, Parameter, Reference, ReferenceKind, Span, StorageClass, Symbol, SymbolId,
    SymbolKind, TypeDefinition, TypeKind, TypeUsage, UsageSite, Variable,
};

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use db::{Index, normalize_path};
use frontend::{FrontendOptions, TreeSitterFrontend};
use incremental::Pipeline;
use registry::FileRegistry;

/// Incremental C source index and query interface.
///
/// `Cidx` owns the index database of one workspace, the front end used to
/// parse its files, and the file registry. Indexing methods take `&mut self`;
/// queries take `&self` and only read committed data.
pub struct Cidx {
    workspace_root: PathBuf,
    config: Config,
    index: Index,
    registry: FileRegistry,
    frontend: TreeSitterFrontend,
}

#[allow(clippy::missing_errors_doc)]
impl Cidx {
    /// Open the index of a workspace, reading `.cidx/config.yaml` when
    /// present.
    pub fn open(workspace_root: &Path) -> Result<Self> {
        let config = Config::load_or_default(workspace_root)?;
        Self::with_config(workspace_root, config)
    }

    /// Open the index of a workspace with an explicit configuration.
    pub fn with_config(workspace_root: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let workspace_root = workspace_root.canonicalize().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("workspace root not found: {}", workspace_root.display()),
            ))
        })?;

        let index = Index::open(&config.database_path(&workspace_root))?;
        let frontend = TreeSitterFrontend::new(FrontendOptions {
            system_include_dirs: config.system_include_dirs.clone(),
            max_include_depth: config.max_include_depth,
        })?;

        Ok(Self {
            registry: FileRegistry::new(workspace_root.clone()),
            workspace_root,
            config,
            index,
            frontend,
        })
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the index database.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.index.path()
    }

    // === Indexing ===

    /// Rebuild the index from scratch: every manifest entry is walked, then
    /// calls and references are linked.
    pub fn build(&mut self) -> Result<BuildReport> {
        let start = Instant::now();
        let manifest = self.manifest()?;
        info!(files = manifest.len(), "Building index");

        self.index.clear_all()?;
        self.registry.clear();

        let mut report = BuildReport::default();
        let mut pipeline = self.pipeline();
        for command in manifest.entries() {
            pipeline.index_file(&command.source_path(), command, &mut report)?;
        }
        pipeline.finish(&mut report)?;
        self.index.analyze()?;

        report.duration = start.elapsed();
        info!(
            processed = report.files_processed,
            failed = report.files_failed,
            rows = report.total_rows(),
            duration_ms = report.duration.as_millis(),
            "Build complete"
        );
        Ok(report)
    }

    /// Re-index the given files, purging those that no longer exist, then
    /// re-run call resolution over the whole index.
    pub fn update(&mut self, files: &[PathBuf]) -> Result<BuildReport> {
        let start = Instant::now();
        let manifest = self.manifest()?;

        let mut report = BuildReport::default();
        self.pipeline().update(&manifest, files, &mut report)?;

        report.duration = start.elapsed();
        info!(
            processed = report.files_processed,
            failed = report.files_failed,
            removed = report.files_removed,
            duration_ms = report.duration.as_millis(),
            "Update complete"
        );
        Ok(report)
    }

    /// Re-index exactly the files [`Cidx::stale_files`] reports.
    pub fn update_stale(&mut self) -> Result<BuildReport> {
        let stale = self.stale_files()?;
        self.update(&stale)
    }

    /// Files needing re-indexing: manifest files that are new or changed,
    /// and indexed files that changed or disappeared.
    ///
    /// Paths are workspace-relative where possible.
    pub fn stale_files(&self) -> Result<Vec<PathBuf>> {
        let manifest = self.manifest()?;
        let candidates = incremental::candidates(&self.index, &self.registry, &manifest)?;
        let stale = self.registry.stale_files(&self.index, &candidates)?;
        Ok(stale
            .iter()
            .map(|path| self.registry.relative_path(path))
            .collect())
    }

    /// Where a file stands relative to the index.
    pub fn file_state(&self, path: &Path) -> Result<FileState> {
        incremental::file_state(&self.index, &self.registry, path)
    }

    /// Row counts per table and extraction metadata.
    pub fn stats(&self) -> Result<IndexStats> {
        self.index.stats()
    }

    /// Indexed files, by path.
    pub fn list_files(&self) -> Result<Vec<IndexedFile>> {
        self.index.list_files()
    }

    fn manifest(&self) -> Result<CompileDatabase> {
        CompileDatabase::load(&self.config.compile_commands_path(&self.workspace_root))
    }

    fn pipeline(&mut self) -> Pipeline<'_> {
        Pipeline {
            index: &self.index,
            registry: &mut self.registry,
            frontend: &mut self.frontend,
            config: &self.config,
        }
    }

    /// Path as stored in the index: workspace-relative for absolute paths
    /// inside the workspace, unchanged otherwise.
    fn stored_path(&self, path: &Path) -> String {
        if path.is_absolute() {
            normalize_path(&self.registry.relative_path(path))
        } else {
            normalize_path(path)
        }
    }

    // === Functions ===

    /// Functions with this exact name, definitions first.
    pub fn find_function(&self, name: &str) -> Result<Vec<Function>> {
        self.index.find_functions(name)
    }

    /// Rendered signature of a function, from its definition when there is
    /// one.
    pub fn get_function_signature(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .index
            .find_functions(name)?
            .into_iter()
            .next()
            .map(|f| f.signature))
    }

    /// Parameters of a function, by position.
    pub fn get_function_parameters(&self, name: &str) -> Result<Vec<Parameter>> {
        match self.index.find_functions(name)?.first() {
            Some(function) => self.index.function_parameters(function.symbol.id),
            None => Ok(vec![]),
        }
    }

    /// Locals of a function definition, in declaration order.
    pub fn get_function_locals(&self, name: &str) -> Result<Vec<Local>> {
        match self.index.function_definition(name)? {
            Some(function) => self.index.function_locals(function.symbol.id),
            None => Ok(vec![]),
        }
    }

    /// Function definitions in a file. Relative paths also match as a
    /// suffix (`util.c` finds `src/util.c`).
    pub fn list_functions_in_file(&self, path: &Path) -> Result<Vec<Function>> {
        self.index.functions_in_file(&self.stored_path(path))
    }

    /// Function definitions matching a SQL `LIKE` pattern (`%` and `_`).
    pub fn search_functions(&self, pattern: &str) -> Result<Vec<Function>> {
        self.index.search_functions(pattern)
    }

    /// Source text of a function definition, from the source cache or, when
    /// the file was not cached, from disk.
    pub fn extract_function_source(&self, name: &str) -> Result<Option<String>> {
        let Some(function) = self.index.function_definition(name)? else {
            return Ok(None);
        };
        let Some(span) = function.symbol.span else {
            return Ok(None);
        };

        let text = match self.index.cached_source(function.symbol.file_id)? {
            Some(text) => text,
            None => {
                let path = self.registry.absolute_path(&function.symbol.file_path);
                match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Cannot read function source");
                        return Ok(None);
                    }
                }
            }
        };

        let first = span.start_line().saturating_sub(1) as usize;
        let count = (span.end_line() - span.start_line()) as usize + 1;
        let lines: Vec<&str> = text.lines().skip(first).take(count).collect();
        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(lines.join("\n")))
    }

    /// Parsed documentation of a function. The first declaration carrying a
    /// comment wins, definitions first.
    pub fn get_function_doc(&self, name: &str) -> Result<Option<Documentation>> {
        for function in self.index.find_functions(name)? {
            if let Some(doc) = self.index.documentation(function.symbol.id)? {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    // === Call graph ===

    /// Calls made by a function's definition, in source order.
    pub fn get_callees(&self, function: &str) -> Result<Vec<CallSite>> {
        self.index.callees_of(function)
    }

    /// Call sites naming a function, resolved or not.
    pub fn get_callers(&self, function: &str) -> Result<Vec<CallSite>> {
        self.index.callers_of(function)
    }

    /// Every simple call path from `from` to `to` of at most `max_depth`
    /// hops. Empty when there is none.
    pub fn find_call_path(&self, from: &str, to: &str, max_depth: usize) -> Result<Vec<Vec<String>>> {
        graph::find_call_paths(&self.index, from, to, max_depth)
    }

    /// Callees of a function nested `depth` levels deep, or `None` when no
    /// function has this name.
    pub fn get_call_tree(&self, function: &str, depth: usize) -> Result<Option<CallTree>> {
        if self.index.find_functions(function)?.is_empty() {
            return Ok(None);
        }
        graph::call_tree(&self.index, function, depth).map(Some)
    }

    // === Types ===

    /// The first definition of a struct, union, enum or typedef.
    pub fn get_type_definition(&self, name: &str) -> Result<Option<TypeDefinition>> {
        Ok(self.index.type_definitions(name)?.into_iter().next())
    }

    /// Terminal type of a typedef, chased when it was indexed. `None` for
    /// names that are not typedefs.
    pub fn resolve_typedef(&self, name: &str) -> Result<Option<String>> {
        self.index.typedef_underlying(name)
    }

    /// Members of a struct or union, named by tag or by a typedef of it.
    pub fn get_struct_fields(&self, name: &str) -> Result<Vec<Field>> {
        match self.aggregate(name, &[TypeKind::Struct, TypeKind::Union])? {
            Some(ty) => self.index.type_fields(ty.symbol.id),
            None => Ok(vec![]),
        }
    }

    /// Byte offset of a member, truncated for bitfields.
    pub fn get_field_offset(&self, name: &str, field: &str) -> Result<Option<u64>> {
        Ok(self
            .get_struct_fields(name)?
            .into_iter()
            .find(|f| f.name == field)
            .and_then(|f| f.offset_bytes()))
    }

    /// Enumerators of an enum, named by tag or by a typedef of it.
    pub fn get_enum_values(&self, name: &str) -> Result<Vec<EnumConstant>> {
        match self.aggregate(name, &[TypeKind::Enum])? {
            Some(ty) => self.index.enum_constants(ty.symbol.id),
            None => Ok(vec![]),
        }
    }

    /// Every place a type name is used.
    pub fn find_type_usage(&self, name: &str) -> Result<Vec<TypeUsage>> {
        self.index.type_usages(name)
    }

    /// The type definition of one of `kinds` named directly or through a
    /// typedef whose terminal type is that aggregate.
    fn aggregate(&self, name: &str, kinds: &[TypeKind]) -> Result<Option<TypeDefinition>> {
        for ty in self.index.type_definitions(name)? {
            if kinds.contains(&ty.kind) {
                return Ok(Some(ty));
            }
            if ty.kind != TypeKind::Typedef {
                continue;
            }
            let Some(target) = ty.underlying_type.as_deref() else {
                continue;
            };
            let found = self
                .index
                .type_definitions(target)?
                .into_iter()
                .find(|t| kinds.contains(&t.kind));
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    // === Macros ===

    /// A macro's definition, file definitions before builtins.
    pub fn get_macro_definition(&self, name: &str) -> Result<Option<Macro>> {
        Ok(self.index.macro_definitions(name)?.into_iter().next())
    }

    /// Non-builtin macros matching a SQL `LIKE` pattern.
    pub fn search_macros(&self, pattern: &str) -> Result<Vec<Macro>> {
        self.index.search_macros(pattern)
    }

    /// Substitute `args` into a macro. `None` when the macro is unknown or
    /// the argument count does not fit a function-like macro.
    pub fn expand_macro(&self, name: &str, args: &[&str]) -> Result<Option<String>> {
        Ok(self
            .get_macro_definition(name)?
            .and_then(|mac| expand::expand(&mac, args)))
    }

    // === Symbols and references ===

    /// Linked uses of symbols with this name, optionally of one kind.
    pub fn find_references(&self, name: &str, kind: Option<ReferenceKind>) -> Result<Vec<Reference>> {
        self.index.find_references(name, kind)
    }

    /// Linked uses made from a file.
    pub fn references_in_file(&self, path: &Path) -> Result<Vec<Reference>> {
        self.index.references_in_file(&self.stored_path(path))
    }

    /// Where a name is defined: a symbol definition, else a declaration,
    /// else a macro.
    pub fn find_symbol_definition(&self, name: &str) -> Result<Option<Definition>> {
        if let Some(symbol) = self.index.symbols_named(name)?.into_iter().next() {
            return Ok(Some(Definition::Symbol(symbol)));
        }
        Ok(self.get_macro_definition(name)?.map(Definition::Macro))
    }

    /// File-scope variable definitions of a file.
    pub fn get_globals_in_file(&self, path: &Path) -> Result<Vec<Variable>> {
        self.index.globals_in_file(&self.stored_path(path))
    }

    // === Includes ===

    /// Headers included by a file; with `recursive`, also those included by
    /// indexed headers, transitively.
    pub fn get_includes(&self, path: &Path, recursive: bool) -> Result<Vec<String>> {
        self.index.include_closure(&self.stored_path(path), recursive)
    }

    /// Indexed files including a header.
    pub fn get_includers(&self, header: &str) -> Result<Vec<String>> {
        self.index.includers_of(header)
    }
}
