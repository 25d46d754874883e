//! Lowering of tree-sitter-c syntax trees into the cursor model.
//!
//! Files are lowered top to bottom. A project header is parsed and lowered
//! at the point of its `#include`, so declarations become visible in the
//! order a compiler would see them. Name lookup uses a block scope stack over
//! a file-scope table; typedefs, records and enumerators go into the unit's
//! [`TypeTable`]. Every branch of a preprocessor conditional is lowered.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use tree_sitter::{Node, Parser, Tree};

use super::consteval::{self, ConstEnv};
use super::ctype::{Builtin, CType, FunctionType, RecordKind, TypeNode};
use super::layout::{FieldDef, TypeTable};
use super::lex::{self, Token, TokenKind};
use super::tree_sitter_utils::{
    children_with_fields, named_children, node_hash, node_location, node_span, node_text,
};
use super::{
    Cursor, CursorKind, DeclRef, Diagnostic, FileRef, Frontend, FrontendOptions,
    InclusionDirective, MacroDefinition, ParseFailure, Severity, SourceLocation,
    TranslationUnit, anonymous_name,
};
use crate::compile_db::CompileCommand;
use crate::error::{Error, Result};
use crate::types::{Linkage, Span, StorageClass};

/// Object-like macros are expanded at most this deep inside constant
/// expressions.
const MAX_MACRO_DEPTH: usize = 16;

/// Front end built on the tree-sitter C grammar.
pub struct TreeSitterFrontend {
    parser: Parser,
    options: FrontendOptions,
}

impl TreeSitterFrontend {
    /// Create a front end with its own parser.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parser` if the C grammar cannot be loaded.
    pub fn new(options: FrontendOptions) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|e| Error::Parser(format!("failed to load C grammar: {e}")))?;
        Ok(Self { parser, options })
    }
}

impl Frontend for TreeSitterFrontend {
    fn parse(
        &mut self,
        source_path: &Path,
        command: &CompileCommand,
    ) -> std::result::Result<TranslationUnit, ParseFailure> {
        let source = read_source(source_path)?;
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or(ParseFailure::NoTree)?;

        let main_path = source_path
            .canonicalize()
            .unwrap_or_else(|_| source_path.to_path_buf());
        let mut lowerer = Lowerer::new(&mut self.parser, &self.options, command);
        lowerer.visited.insert(main_path.clone());
        lowerer.files.push(main_path.clone());

        let ctx = FileCtx {
            file: FileRef::MAIN,
            path: &main_path,
            source: &source,
            depth: 0,
        };
        let children = lowerer.lower_file(&ctx, &tree);
        trace!(
            file = %main_path.display(),
            headers = lowerer.files.len() - 1,
            "Lowered translation unit"
        );
        Ok(lowerer.finish(children, tree.root_node()))
    }
}

fn read_source(path: &Path) -> std::result::Result<String, ParseFailure> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| ParseFailure::Encoding)
}

/// The file currently being lowered.
struct FileCtx<'s> {
    file: FileRef,
    path: &'s Path,
    source: &'s str,
    depth: usize,
}

impl<'s> FileCtx<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        node_text(node, self.source)
    }

    fn loc(&self, node: Node<'_>) -> SourceLocation {
        node_location(node, self.file)
    }
}

struct MacroInfo {
    /// Replacement tokens of object-like macros
    body: Option<Vec<Token>>,
    function_like: bool,
}

/// Result of lowering declaration specifiers.
struct Specifiers {
    ty: CType,
    storage: StorageClass,
    is_inline: bool,
    /// Aggregates defined inside the specifiers
    tags: Vec<Cursor>,
    type_refs: Vec<Cursor>,
}

#[derive(Default)]
struct ParamList {
    params: Vec<ParamInfo>,
    variadic: bool,
    has_prototype: bool,
}

struct ParamInfo {
    name: Option<String>,
    location: SourceLocation,
    extent: Span,
    ty: CType,
    type_refs: Vec<Cursor>,
}

/// A declarator applied to its base type.
struct Declared<'t> {
    name: Option<String>,
    name_node: Option<Node<'t>>,
    ty: CType,
    params: Option<ParamList>,
}

struct FunctionParts {
    name: String,
    location: SourceLocation,
    ty: CType,
    storage: StorageClass,
    is_inline: bool,
    return_refs: Vec<Cursor>,
    params: ParamList,
}

struct Lowerer<'a> {
    parser: &'a mut Parser,
    options: &'a FrontendOptions,
    quote_dirs: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
    system_dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
    visited: HashSet<PathBuf>,
    types: TypeTable,
    globals: HashMap<String, DeclRef>,
    scopes: Vec<HashMap<String, DeclRef>>,
    macros: HashMap<String, MacroInfo>,
    macro_defs: Vec<MacroDefinition>,
    inclusions: Vec<InclusionDirective>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lowerer<'a> {
    fn new(parser: &'a mut Parser, options: &'a FrontendOptions, command: &CompileCommand) -> Self {
        let mut system_dirs = command.system_dirs();
        system_dirs.extend(options.system_include_dirs.iter().cloned());

        let macros = command
            .defines()
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    MacroInfo {
                        body: Some(lex::tokenize(&value)),
                        function_like: false,
                    },
                )
            })
            .collect();

        Self {
            parser,
            options,
            quote_dirs: command.quote_dirs(),
            include_dirs: command.include_dirs(),
            system_dirs,
            files: Vec::new(),
            visited: HashSet::new(),
            types: TypeTable::new(),
            globals: HashMap::new(),
            scopes: Vec::new(),
            macros,
            macro_defs: Vec::new(),
            inclusions: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn finish(self, children: Vec<Cursor>, root_node: Node<'_>) -> TranslationUnit {
        let spelling = self
            .files
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let location = SourceLocation {
            file: FileRef::MAIN,
            line: 1,
            column: 1,
        };
        let mut root = Cursor::new(
            CursorKind::TranslationUnit,
            spelling,
            location,
            node_span(root_node),
        );
        root.children = children;

        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|d| (d.location.file.0, d.location.line, d.location.column));

        TranslationUnit::new(
            self.files,
            root,
            diagnostics,
            self.macro_defs,
            self.inclusions,
            self.types,
        )
    }

    fn lower_file(&mut self, ctx: &FileCtx<'_>, tree: &Tree) -> Vec<Cursor> {
        let root = tree.root_node();
        if root.has_error() {
            self.collect_syntax_errors(root, ctx);
        }
        let mut out = Vec::new();
        self.lower_items(root, ctx, &mut out);
        out
    }

    fn collect_syntax_errors(&mut self, root: Node<'_>, ctx: &FileCtx<'_>) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() {
                let snippet: String = ctx.text(node).chars().take(40).collect();
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("syntax error near `{}`", snippet.trim()),
                    location: ctx.loc(node),
                });
                continue;
            }
            if node.is_missing() {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("expected `{}`", node.kind()),
                    location: ctx.loc(node),
                });
                continue;
            }
            if node.has_error() {
                let mut cursor = node.walk();
                stack.extend(node.children(&mut cursor));
            }
        }
    }

    // ------------------------------------------------------------------
    // File scope
    // ------------------------------------------------------------------

    fn lower_items(&mut self, container: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        for (field, child) in children_with_fields(container) {
            if !child.is_named() || matches!(field, Some("condition" | "name")) {
                continue;
            }
            match child.kind() {
                "function_definition" => self.lower_function_definition(child, ctx, out),
                "declaration" => self.lower_file_declaration(child, ctx, out),
                "type_definition" => self.lower_typedef(child, ctx, out),
                "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    self.lower_tag_declaration(child, ctx, out);
                }
                "preproc_include" => self.lower_include(child, ctx, out),
                "preproc_def" | "preproc_function_def" => self.record_macro(child, ctx),
                "preproc_call" => self.preproc_call(child, ctx),
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "linkage_specification" | "declaration_list" | "ERROR" => {
                    self.lower_items(child, ctx, out);
                }
                _ => {}
            }
        }
    }

    fn lower_function_definition(
        &mut self,
        node: Node<'_>,
        ctx: &FileCtx<'_>,
        out: &mut Vec<Cursor>,
    ) {
        let Specifiers {
            ty,
            storage,
            is_inline,
            tags,
            type_refs,
        } = self.specifiers(node, ctx);
        out.extend(tags);

        let declared = self.declare(ty, node.child_by_field_name("declarator"), ctx);
        let (Some(name), Some(params)) = (declared.name, declared.params) else {
            return;
        };
        if declared.ty.as_function().is_none() {
            return;
        }
        let location = declared
            .name_node
            .map_or_else(|| ctx.loc(node), |n| ctx.loc(n));

        self.globals.insert(
            name.clone(),
            DeclRef::new(&name, CursorKind::FunctionDecl, linkage_for(storage)),
        );

        let scope: HashMap<String, DeclRef> = params
            .params
            .iter()
            .filter_map(|p| p.name.as_ref())
            .map(|n| (n.clone(), DeclRef::new(n, CursorKind::ParmDecl, Linkage::None)))
            .collect();

        let mut cursor = function_cursor(
            FunctionParts {
                name,
                location,
                ty: declared.ty,
                storage,
                is_inline,
                return_refs: type_refs,
                params,
            },
            node_span(node),
            true,
        );
        cursor.decl.raw_comment = doc_comment(node, ctx);

        if let Some(body) = node.child_by_field_name("body") {
            self.scopes.push(scope);
            self.lower_body(body, ctx, &mut cursor.children);
            self.scopes.pop();
        }
        out.push(cursor);
    }

    fn lower_file_declaration(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let Specifiers {
            ty,
            storage,
            is_inline,
            tags,
            type_refs,
        } = self.specifiers(node, ctx);
        out.extend(tags);
        let raw_comment = doc_comment(node, ctx);
        let linkage = linkage_for(storage);
        let mut type_refs = Some(type_refs);

        for declarator in declarators(node) {
            let value = initializer(declarator);
            let declared = self.declare(ty.clone(), Some(declarator), ctx);
            let Some(name) = declared.name else {
                continue;
            };
            let location = declared
                .name_node
                .map_or_else(|| ctx.loc(declarator), |n| ctx.loc(n));

            if declared.ty.as_function().is_some() {
                self.globals
                    .entry(name.clone())
                    .or_insert_with(|| DeclRef::new(&name, CursorKind::FunctionDecl, linkage));
                let mut cursor = function_cursor(
                    FunctionParts {
                        name,
                        location,
                        ty: declared.ty,
                        storage,
                        is_inline,
                        return_refs: type_refs.take().unwrap_or_default(),
                        params: declared.params.unwrap_or_default(),
                    },
                    node_span(node),
                    false,
                );
                cursor.decl.raw_comment.clone_from(&raw_comment);
                out.push(cursor);
                continue;
            }

            self.globals.insert(
                name.clone(),
                DeclRef::new(&name, CursorKind::VarDecl, linkage),
            );
            let mut cursor = Cursor::new(CursorKind::VarDecl, name, location, node_span(node));
            cursor.ty = Some(declared.ty);
            cursor.decl.is_definition = !(storage == StorageClass::Extern && value.is_none());
            cursor.decl.storage_class = storage;
            cursor.decl.linkage = linkage;
            cursor.decl.raw_comment.clone_from(&raw_comment);
            cursor.decl.initializer = value.map(|v| ctx.text(v).to_string());
            cursor.children = type_refs.take().unwrap_or_default();
            if let Some(value) = value {
                self.lower_body(value, ctx, &mut cursor.children);
            }
            out.push(cursor);
        }
    }

    fn lower_typedef(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let Specifiers {
            ty, tags, type_refs, ..
        } = self.specifiers(node, ctx);
        out.extend(tags);
        let raw_comment = doc_comment(node, ctx);
        let mut type_refs = Some(type_refs);

        for declarator in declarators(node) {
            let declared = self.declare(ty.clone(), Some(declarator), ctx);
            let Some(name) = declared.name else {
                continue;
            };
            let location = declared
                .name_node
                .map_or_else(|| ctx.loc(declarator), |n| ctx.loc(n));
            self.types.add_typedef(&name, declared.ty.clone());

            let mut cursor = Cursor::new(CursorKind::TypedefDecl, name, location, node_span(node));
            cursor.ty = Some(declared.ty);
            cursor.decl.is_definition = true;
            cursor.decl.hash = node_hash(ctx.path, "typedef", declarator);
            cursor.decl.raw_comment.clone_from(&raw_comment);
            cursor.children = type_refs.take().unwrap_or_default();
            out.push(cursor);
        }
    }

    /// `struct foo { ... };` or `struct foo;` with no declarators.
    fn lower_tag_declaration(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let has_body = node.child_by_field_name("body").is_some();
        let name = node
            .child_by_field_name("name")
            .map(|n| (ctx.text(n).to_string(), ctx.loc(n)));
        let (ty, mut tags, _) = self.type_specifier(node, ctx);

        if has_body {
            if let Some(defined) = tags.first_mut() {
                defined.decl.raw_comment = doc_comment(node, ctx);
            }
            out.extend(tags);
        } else if let Some((name, location)) = name {
            let kind = match node.kind() {
                "struct_specifier" => CursorKind::StructDecl,
                "union_specifier" => CursorKind::UnionDecl,
                _ => CursorKind::EnumDecl,
            };
            let mut cursor = Cursor::new(kind, name, location, node_span(node));
            cursor.ty = Some(ty);
            out.push(cursor);
        }
    }

    // ------------------------------------------------------------------
    // Preprocessor
    // ------------------------------------------------------------------

    fn lower_include(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = ctx.text(path_node);
        let (spelling, is_angled) = match path_node.kind() {
            "string_literal" => (raw.trim_matches('"').to_string(), false),
            "system_lib_string" => (
                raw.trim_start_matches('<').trim_end_matches('>').to_string(),
                true,
            ),
            _ => return,
        };

        let including_dir = ctx.path.parent().unwrap_or_else(|| Path::new("."));
        let (resolved, in_system_dir) = self.resolve_include(including_dir, &spelling, is_angled);
        self.inclusions.push(InclusionDirective {
            spelling,
            is_angled,
            location: ctx.loc(node),
            resolved: resolved.clone(),
            in_system_dir,
        });

        let Some(resolved) = resolved else {
            return;
        };
        if in_system_dir || ctx.depth >= self.options.max_include_depth {
            return;
        }
        if !self.visited.insert(resolved.clone()) {
            return;
        }
        self.lower_header(&resolved, ctx.depth + 1, out);
    }

    fn resolve_include(
        &self,
        including_dir: &Path,
        spelled: &str,
        is_angled: bool,
    ) -> (Option<PathBuf>, bool) {
        let mut candidates: Vec<(&Path, bool)> = Vec::new();
        if !is_angled {
            candidates.push((including_dir, false));
            candidates.extend(self.quote_dirs.iter().map(|d| (d.as_path(), false)));
        }
        candidates.extend(self.include_dirs.iter().map(|d| (d.as_path(), false)));
        candidates.extend(self.system_dirs.iter().map(|d| (d.as_path(), true)));

        for (dir, is_system) in candidates {
            let path = dir.join(spelled);
            if path.is_file() {
                let path = path.canonicalize().unwrap_or(path);
                return (Some(path), is_system);
            }
        }
        (None, false)
    }

    fn lower_header(&mut self, path: &Path, depth: usize, out: &mut Vec<Cursor>) {
        let source = match read_source(path) {
            Ok(source) => source,
            Err(e) => {
                debug!(header = %path.display(), error = %e, "Skipping unreadable header");
                return;
            }
        };
        let Some(tree) = self.parser.parse(&source, None) else {
            return;
        };
        let file = FileRef(u32::try_from(self.files.len()).unwrap_or(u32::MAX));
        self.files.push(path.to_path_buf());

        let ctx = FileCtx {
            file,
            path,
            source: &source,
            depth,
        };
        let cursors = self.lower_file(&ctx, &tree);
        out.extend(cursors);
    }

    fn record_macro(&mut self, node: Node<'_>, ctx: &FileCtx<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = ctx.text(name_node).to_string();
        let text = ctx
            .source
            .get(name_node.start_byte()..node.end_byte())
            .unwrap_or_default()
            .trim_end()
            .to_string();
        let function_like = node.kind() == "preproc_function_def";
        let body = (!function_like).then(|| {
            node.child_by_field_name("value")
                .map(|v| lex::tokenize(ctx.text(v)))
                .unwrap_or_default()
        });

        self.macros.insert(
            name.clone(),
            MacroInfo {
                body,
                function_like,
            },
        );
        self.macro_defs.push(MacroDefinition {
            name,
            location: ctx.loc(name_node),
            tokens: lex::tokenize(&text),
            text,
        });
    }

    fn preproc_call(&mut self, node: Node<'_>, ctx: &FileCtx<'_>) {
        let directive = node.child_by_field_name("directive").map(|d| ctx.text(d));
        if directive != Some("#undef") {
            return;
        }
        if let Some(argument) = node.child_by_field_name("argument") {
            self.macros.remove(ctx.text(argument).trim());
        }
    }

    // ------------------------------------------------------------------
    // Types and declarators
    // ------------------------------------------------------------------

    fn specifiers(&mut self, node: Node<'_>, ctx: &FileCtx<'_>) -> Specifiers {
        let mut storage = StorageClass::None;
        let mut is_inline = false;
        let mut is_const = false;
        let mut is_volatile = false;

        for child in named_children(node) {
            match (child.kind(), ctx.text(child)) {
                ("storage_class_specifier", "static") => storage = StorageClass::Static,
                ("storage_class_specifier", "extern") => storage = StorageClass::Extern,
                ("storage_class_specifier", "register") => storage = StorageClass::Register,
                ("storage_class_specifier", "inline" | "__inline" | "__inline__") => {
                    is_inline = true;
                }
                ("type_qualifier", "const") => is_const = true,
                ("type_qualifier", "volatile") => is_volatile = true,
                _ => {}
            }
        }

        let (ty, tags, type_refs) = match node.child_by_field_name("type") {
            Some(spec) => self.type_specifier(spec, ctx),
            None => (CType::int(), Vec::new(), Vec::new()),
        };
        Specifiers {
            ty: ty.qualified(is_const, is_volatile),
            storage,
            is_inline,
            tags,
            type_refs,
        }
    }

    fn type_specifier(
        &mut self,
        node: Node<'_>,
        ctx: &FileCtx<'_>,
    ) -> (CType, Vec<Cursor>, Vec<Cursor>) {
        match node.kind() {
            "primitive_type" => {
                let name = ctx.text(node);
                let ty = Builtin::from_primitive(name).map_or_else(
                    || CType::new(TypeNode::Typedef(name.to_string())),
                    CType::builtin,
                );
                (ty, Vec::new(), Vec::new())
            }
            "sized_type_specifier" => {
                let (mut unsigned, mut signed, mut short, mut longs) = (false, false, false, 0);
                for (field, child) in children_with_fields(node) {
                    if field == Some("type") {
                        continue;
                    }
                    match ctx.text(child) {
                        "unsigned" => unsigned = true,
                        "signed" => signed = true,
                        "short" => short = true,
                        "long" => longs += 1,
                        _ => {}
                    }
                }
                let base = node.child_by_field_name("type").map(|t| ctx.text(t));
                let builtin = Builtin::from_modifiers(unsigned, signed, short, longs, base);
                (CType::builtin(builtin), Vec::new(), Vec::new())
            }
            "type_identifier" => {
                let name = ctx.text(node);
                let type_ref = type_ref(node, ctx, name, CursorKind::TypedefDecl);
                (
                    CType::new(TypeNode::Typedef(name.to_string())),
                    Vec::new(),
                    vec![type_ref],
                )
            }
            "struct_specifier" => self.record_specifier(node, RecordKind::Struct, ctx),
            "union_specifier" => self.record_specifier(node, RecordKind::Union, ctx),
            "enum_specifier" => self.enum_specifier(node, ctx),
            _ => (
                CType::new(TypeNode::Unknown(ctx.text(node).to_string())),
                Vec::new(),
                Vec::new(),
            ),
        }
    }

    fn record_specifier(
        &mut self,
        node: Node<'_>,
        kind: RecordKind,
        ctx: &FileCtx<'_>,
    ) -> (CType, Vec<Cursor>, Vec<Cursor>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| ctx.text(n).to_string());
        if let Some(body) = node.child_by_field_name("body") {
            let cursor = self.lower_record(node, body, kind, name, ctx);
            let ty = cursor.ty.clone().unwrap_or_else(CType::int);
            return (ty, vec![cursor], Vec::new());
        }
        match (name, node.child_by_field_name("name")) {
            (Some(name), Some(name_node)) => {
                let decl_kind = match kind {
                    RecordKind::Struct => CursorKind::StructDecl,
                    RecordKind::Union => CursorKind::UnionDecl,
                };
                let type_ref = type_ref(name_node, ctx, &name, decl_kind);
                (
                    CType::new(TypeNode::Record(kind, name)),
                    Vec::new(),
                    vec![type_ref],
                )
            }
            _ => (
                CType::new(TypeNode::Unknown(ctx.text(node).to_string())),
                Vec::new(),
                Vec::new(),
            ),
        }
    }

    fn lower_record(
        &mut self,
        node: Node<'_>,
        body: Node<'_>,
        kind: RecordKind,
        name: Option<String>,
        ctx: &FileCtx<'_>,
    ) -> Cursor {
        let keyword = kind.keyword();
        let hash = node_hash(ctx.path, keyword, node);
        let key = name.clone().unwrap_or_else(|| anonymous_name(keyword, hash));

        let mut children = Vec::new();
        let mut fields = Vec::new();
        self.lower_fields(body, ctx, &mut children, &mut fields);
        self.types.add_record(kind, &key, fields);

        let location = node
            .child_by_field_name("name")
            .map_or_else(|| ctx.loc(node), |n| ctx.loc(n));
        let cursor_kind = match kind {
            RecordKind::Struct => CursorKind::StructDecl,
            RecordKind::Union => CursorKind::UnionDecl,
        };
        let mut cursor = Cursor::new(cursor_kind, name.unwrap_or_default(), location, node_span(node));
        cursor.ty = Some(CType::new(TypeNode::Record(kind, key)));
        cursor.decl.is_definition = true;
        cursor.decl.hash = hash;
        cursor.children = children;
        cursor
    }

    fn lower_fields(
        &mut self,
        list: Node<'_>,
        ctx: &FileCtx<'_>,
        children: &mut Vec<Cursor>,
        fields: &mut Vec<FieldDef>,
    ) {
        for child in named_children(list) {
            match child.kind() {
                "field_declaration" => self.lower_field_declaration(child, ctx, children, fields),
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" => {
                    self.lower_fields(child, ctx, children, fields);
                }
                _ => {}
            }
        }
    }

    fn lower_field_declaration(
        &mut self,
        node: Node<'_>,
        ctx: &FileCtx<'_>,
        children: &mut Vec<Cursor>,
        fields: &mut Vec<FieldDef>,
    ) {
        let Specifiers {
            ty, tags, type_refs, ..
        } = self.specifiers(node, ctx);
        let raw_comment = doc_comment(node, ctx);
        let bit_width = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "bitfield_clause")
            .and_then(|clause| clause.named_child(0))
            .and_then(|width| self.eval_node(width, ctx))
            .and_then(|w| u32::try_from(w).ok());
        children.extend(tags);

        let declarators = declarators(node);
        if declarators.is_empty() {
            let anonymous_member =
                matches!(&ty.node, TypeNode::Record(_, name) if name.starts_with("<anonymous_"));
            if bit_width.is_none() && !anonymous_member {
                return;
            }
            let mut field = Cursor::new(CursorKind::FieldDecl, "", ctx.loc(node), node_span(node));
            field.ty = Some(ty.clone());
            field.decl.bit_width = bit_width;
            field.decl.raw_comment = raw_comment;
            field.children = type_refs;
            fields.push(FieldDef {
                name: None,
                ty,
                bit_width,
            });
            children.push(field);
            return;
        }

        let mut type_refs = Some(type_refs);
        for declarator in declarators {
            let declared = self.declare(ty.clone(), Some(declarator), ctx);
            let Some(name) = declared.name else {
                continue;
            };
            let location = declared
                .name_node
                .map_or_else(|| ctx.loc(declarator), |n| ctx.loc(n));
            let mut field =
                Cursor::new(CursorKind::FieldDecl, name.clone(), location, node_span(node));
            field.ty = Some(declared.ty.clone());
            field.decl.bit_width = bit_width;
            field.decl.raw_comment.clone_from(&raw_comment);
            field.children = type_refs.take().unwrap_or_default();
            fields.push(FieldDef {
                name: Some(name),
                ty: declared.ty,
                bit_width,
            });
            children.push(field);
        }
    }

    fn enum_specifier(
        &mut self,
        node: Node<'_>,
        ctx: &FileCtx<'_>,
    ) -> (CType, Vec<Cursor>, Vec<Cursor>) {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| ctx.text(n).to_string());

        let Some(body) = node.child_by_field_name("body") else {
            return match (name, name_node) {
                (Some(name), Some(name_node)) => {
                    let type_ref = type_ref(name_node, ctx, &name, CursorKind::EnumDecl);
                    (CType::new(TypeNode::Enum(name)), Vec::new(), vec![type_ref])
                }
                _ => (
                    CType::new(TypeNode::Unknown(ctx.text(node).to_string())),
                    Vec::new(),
                    Vec::new(),
                ),
            };
        };

        let hash = node_hash(ctx.path, "enum", node);
        let key = name.clone().unwrap_or_else(|| anonymous_name("enum", hash));
        let mut children = Vec::new();
        let mut next = 0i64;
        self.lower_enumerators(body, ctx, &mut children, &mut next);

        let location = name_node.map_or_else(|| ctx.loc(node), |n| ctx.loc(n));
        let ty = CType::new(TypeNode::Enum(key));
        let mut cursor = Cursor::new(
            CursorKind::EnumDecl,
            name.unwrap_or_default(),
            location,
            node_span(node),
        );
        cursor.ty = Some(ty.clone());
        cursor.decl.is_definition = true;
        cursor.decl.hash = hash;
        cursor.children = children;
        (ty, vec![cursor], Vec::new())
    }

    fn lower_enumerators(
        &mut self,
        list: Node<'_>,
        ctx: &FileCtx<'_>,
        out: &mut Vec<Cursor>,
        next: &mut i64,
    ) {
        for child in named_children(list) {
            match child.kind() {
                "enumerator" => {
                    let Some(name_node) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let name = ctx.text(name_node).to_string();
                    let value = child
                        .child_by_field_name("value")
                        .and_then(|v| self.eval_node(v, ctx))
                        .unwrap_or(*next);
                    *next = value.wrapping_add(1);

                    self.types.add_constant(&name, value);
                    self.declare_name(
                        &name,
                        DeclRef::new(&name, CursorKind::EnumConstantDecl, Linkage::None),
                    );

                    let mut cursor = Cursor::new(
                        CursorKind::EnumConstantDecl,
                        name,
                        ctx.loc(name_node),
                        node_span(child),
                    );
                    cursor.decl.enum_value = Some(value);
                    cursor.decl.is_definition = true;
                    cursor.decl.raw_comment = doc_comment(child, ctx);
                    out.push(cursor);
                }
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" => {
                    self.lower_enumerators(child, ctx, out, next);
                }
                _ => {}
            }
        }
    }

    /// Apply a declarator to `base`, innermost name last.
    fn declare<'t>(&mut self, base: CType, node: Option<Node<'t>>, ctx: &FileCtx<'_>) -> Declared<'t> {
        let mut declared = Declared {
            name: None,
            name_node: None,
            ty: base,
            params: None,
        };
        let mut current = node;

        while let Some(n) = current {
            match n.kind() {
                "identifier" | "field_identifier" | "type_identifier" | "primitive_type" => {
                    declared.name = Some(ctx.text(n).to_string());
                    declared.name_node = Some(n);
                    break;
                }
                "pointer_declarator" | "abstract_pointer_declarator" => {
                    let (is_const, is_volatile) = qualifiers(n, ctx);
                    declared.ty = declared.ty.pointer_to().qualified(is_const, is_volatile);
                    current = n.child_by_field_name("declarator");
                }
                "array_declarator" | "abstract_array_declarator" => {
                    let len = n
                        .child_by_field_name("size")
                        .and_then(|s| self.eval_node(s, ctx))
                        .and_then(|v| u64::try_from(v).ok());
                    declared.ty = CType::new(TypeNode::Array(Box::new(declared.ty), len));
                    current = n.child_by_field_name("declarator");
                }
                "function_declarator" | "abstract_function_declarator" => {
                    let list = self.parameters(n.child_by_field_name("parameters"), ctx);
                    let func = FunctionType {
                        ret: declared.ty,
                        params: list.params.iter().map(|p| p.ty.clone()).collect(),
                        variadic: list.variadic,
                        has_prototype: list.has_prototype,
                    };
                    declared.ty = CType::new(TypeNode::Function(Box::new(func)));
                    declared.params = Some(list);
                    current = n.child_by_field_name("declarator");
                }
                "init_declarator" => current = n.child_by_field_name("declarator"),
                "parenthesized_declarator"
                | "abstract_parenthesized_declarator"
                | "attributed_declarator" => {
                    current = named_children(n).into_iter().find(|c| {
                        !matches!(
                            c.kind(),
                            "type_qualifier" | "attribute_specifier" | "attribute_declaration"
                        )
                    });
                }
                _ => break,
            }
        }
        declared
    }

    fn parameters(&mut self, node: Option<Node<'_>>, ctx: &FileCtx<'_>) -> ParamList {
        let Some(node) = node else {
            return ParamList::default();
        };
        let mut list = ParamList::default();
        for (_, child) in children_with_fields(node) {
            match child.kind() {
                "parameter_declaration" => {
                    let Specifiers { ty, type_refs, .. } = self.specifiers(child, ctx);
                    let declared = self.declare(ty, child.child_by_field_name("declarator"), ctx);
                    let location = declared
                        .name_node
                        .map_or_else(|| ctx.loc(child), |n| ctx.loc(n));
                    list.params.push(ParamInfo {
                        name: declared.name,
                        location,
                        extent: node_span(child),
                        ty: declared.ty.decayed(),
                        type_refs,
                    });
                }
                "variadic_parameter" | "..." => list.variadic = true,
                _ => {}
            }
        }
        list.has_prototype = !list.params.is_empty() || list.variadic;

        let only_void = list.params.len() == 1
            && list.params[0].name.is_none()
            && list.params[0].ty.node == TypeNode::Builtin(Builtin::Void);
        if only_void {
            list.params.clear();
        }
        list
    }

    // ------------------------------------------------------------------
    // Function bodies
    // ------------------------------------------------------------------

    fn lower_body(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        match node.kind() {
            "compound_statement" => {
                self.scopes.push(HashMap::new());
                let mut children = Vec::new();
                for child in named_children(node) {
                    self.lower_body(child, ctx, &mut children);
                }
                self.scopes.pop();
                let mut cursor =
                    Cursor::new(CursorKind::CompoundStmt, "", ctx.loc(node), node_span(node));
                cursor.children = children;
                out.push(cursor);
            }
            "declaration" => self.lower_local_declaration(node, ctx, out),
            "type_definition" => {
                let mut discarded = Vec::new();
                self.lower_typedef(node, ctx, &mut discarded);
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                self.type_specifier(node, ctx);
            }
            "for_statement" => {
                self.scopes.push(HashMap::new());
                self.lower_generic(node, ctx, out);
                self.scopes.pop();
            }
            "preproc_def" | "preproc_function_def" => self.record_macro(node, ctx),
            "preproc_call" => self.preproc_call(node, ctx),
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef"
            | "ERROR" => {
                for (field, child) in children_with_fields(node) {
                    if child.is_named() && !matches!(field, Some("condition" | "name")) {
                        self.lower_body(child, ctx, out);
                    }
                }
            }
            "call_expression" => self.lower_call(node, ctx, out),
            "identifier" => out.push(self.decl_ref_expr(node, ctx)),
            "assignment_expression" => {
                let op = node.child_by_field_name("operator").map(|o| ctx.text(o));
                let kind = if op == Some("=") {
                    CursorKind::BinaryOperator
                } else {
                    CursorKind::CompoundAssignOperator
                };
                self.lower_operator(node, kind, ctx, out);
            }
            "binary_expression" => self.lower_operator(node, CursorKind::BinaryOperator, ctx, out),
            "unary_expression" | "pointer_expression" | "update_expression" => {
                self.lower_operator(node, CursorKind::UnaryOperator, ctx, out);
            }
            "field_expression" => {
                let field = node.child_by_field_name("field");
                let name = field.map(|f| ctx.text(f)).unwrap_or_default();
                let location = field.map_or_else(|| ctx.loc(node), |f| ctx.loc(f));
                let mut cursor =
                    Cursor::new(CursorKind::MemberRefExpr, name, location, node_span(node));
                cursor.referenced = Some(DeclRef::new(name, CursorKind::FieldDecl, Linkage::None));
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.lower_body(argument, ctx, &mut cursor.children);
                }
                out.push(cursor);
            }
            "parenthesized_expression" => {
                let mut cursor =
                    Cursor::new(CursorKind::ParenExpr, "", ctx.loc(node), node_span(node));
                for child in named_children(node) {
                    self.lower_body(child, ctx, &mut cursor.children);
                }
                out.push(cursor);
            }
            "type_descriptor" => {
                let Specifiers { type_refs, .. } = self.specifiers(node, ctx);
                out.extend(type_refs);
            }
            "function_definition" | "comment" | "number_literal" | "string_literal"
            | "char_literal" | "concatenated_string" | "true" | "false" | "null"
            | "field_identifier" | "statement_identifier" | "primitive_type"
            | "type_identifier" | "escape_sequence" | "string_content" => {}
            _ => self.lower_generic(node, ctx, out),
        }
    }

    /// Statements and expressions without a dedicated cursor kind. Nodes that
    /// lower to nothing are dropped.
    fn lower_generic(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let mut children = Vec::new();
        for child in named_children(node) {
            self.lower_body(child, ctx, &mut children);
        }
        if children.is_empty() {
            return;
        }
        let kind = if node.kind().ends_with("_statement") {
            CursorKind::UnexposedStmt
        } else {
            CursorKind::UnexposedExpr
        };
        let mut cursor = Cursor::new(kind, "", ctx.loc(node), node_span(node));
        cursor.children = children;
        out.push(cursor);
    }

    fn lower_operator(
        &mut self,
        node: Node<'_>,
        kind: CursorKind,
        ctx: &FileCtx<'_>,
        out: &mut Vec<Cursor>,
    ) {
        let mut cursor = Cursor::new(kind, "", ctx.loc(node), node_span(node));
        cursor.operator = node
            .child_by_field_name("operator")
            .map(|o| ctx.text(o).to_string());
        for (field, child) in children_with_fields(node) {
            if child.is_named() && field != Some("operator") {
                self.lower_body(child, ctx, &mut cursor.children);
            }
        }
        out.push(cursor);
    }

    fn lower_local_declaration(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let Specifiers {
            ty,
            storage,
            type_refs,
            ..
        } = self.specifiers(node, ctx);
        let mut type_refs = Some(type_refs);

        for declarator in declarators(node) {
            let value = initializer(declarator);
            let declared = self.declare(ty.clone(), Some(declarator), ctx);
            let Some(name) = declared.name else {
                continue;
            };
            if declared.ty.as_function().is_some() {
                self.declare_name(
                    &name,
                    DeclRef::new(&name, CursorKind::FunctionDecl, Linkage::External),
                );
                continue;
            }
            if storage == StorageClass::Extern {
                self.declare_name(&name, DeclRef::new(&name, CursorKind::VarDecl, Linkage::External));
                continue;
            }

            self.declare_name(&name, DeclRef::new(&name, CursorKind::VarDecl, Linkage::None));
            let location = declared
                .name_node
                .map_or_else(|| ctx.loc(declarator), |n| ctx.loc(n));
            let mut cursor = Cursor::new(CursorKind::VarDecl, name, location, node_span(node));
            cursor.ty = Some(declared.ty);
            cursor.decl.is_definition = true;
            cursor.decl.storage_class = storage;
            cursor.decl.initializer = value.map(|v| ctx.text(v).to_string());
            cursor.children = type_refs.take().unwrap_or_default();
            if let Some(value) = value {
                self.lower_body(value, ctx, &mut cursor.children);
            }
            out.push(cursor);
        }
    }

    fn lower_call(&mut self, node: Node<'_>, ctx: &FileCtx<'_>, out: &mut Vec<Cursor>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let arguments = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();

        if function.kind() == "identifier" {
            let name = ctx.text(function);
            let is_macro = self.lookup(name).is_none()
                && self.macros.get(name).is_some_and(|m| m.function_like);
            if is_macro {
                let mut cursor = Cursor::new(CursorKind::UnexposedExpr, name, ctx.loc(node), node_span(node));
                for argument in arguments {
                    self.lower_body(argument, ctx, &mut cursor.children);
                }
                out.push(cursor);
                return;
            }
        }

        let callee = self.callee(function, ctx);
        let spelling = callee.as_ref().map(|c| c.name.clone()).unwrap_or_default();
        let mut cursor = Cursor::new(CursorKind::CallExpr, spelling, ctx.loc(node), node_span(node));

        if function.kind() == "identifier" {
            let mut callee_ref = self.decl_ref_expr(function, ctx);
            if callee_ref.referenced.is_none() {
                callee_ref.referenced.clone_from(&callee);
            }
            cursor.children.push(callee_ref);
        } else {
            self.lower_body(function, ctx, &mut cursor.children);
        }
        cursor.referenced = callee;
        for argument in arguments {
            self.lower_body(argument, ctx, &mut cursor.children);
        }
        out.push(cursor);
    }

    /// The declaration a call goes through. Unknown plain names are treated
    /// as implicitly declared functions.
    fn callee(&self, function: Node<'_>, ctx: &FileCtx<'_>) -> Option<DeclRef> {
        match function.kind() {
            "identifier" => {
                let name = ctx.text(function);
                Some(self.lookup(name).unwrap_or_else(|| {
                    DeclRef::new(name, CursorKind::FunctionDecl, Linkage::External)
                }))
            }
            "field_expression" => function
                .child_by_field_name("field")
                .map(|f| DeclRef::new(ctx.text(f), CursorKind::FieldDecl, Linkage::None)),
            "parenthesized_expression" => function
                .named_child(0)
                .and_then(|inner| self.callee(inner, ctx)),
            "pointer_expression" => function
                .child_by_field_name("argument")
                .and_then(|inner| self.callee(inner, ctx)),
            _ => None,
        }
    }

    fn decl_ref_expr(&self, node: Node<'_>, ctx: &FileCtx<'_>) -> Cursor {
        let name = ctx.text(node);
        let mut cursor = Cursor::new(CursorKind::DeclRefExpr, name, ctx.loc(node), node_span(node));
        cursor.referenced = self.lookup(name);
        cursor
    }

    // ------------------------------------------------------------------
    // Scopes and constants
    // ------------------------------------------------------------------

    fn lookup(&self, name: &str) -> Option<DeclRef> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
    }

    fn declare_name(&mut self, name: &str, decl: DeclRef) {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.to_string(), decl),
            None => self.globals.insert(name.to_string(), decl),
        };
    }

    fn eval_node(&self, node: Node<'_>, ctx: &FileCtx<'_>) -> Option<i64> {
        let tokens = lex::tokenize(ctx.text(node));
        consteval::evaluate(
            &tokens,
            &EvalEnv {
                lowerer: self,
                depth: 0,
            },
        )
    }
}

struct EvalEnv<'l, 'a> {
    lowerer: &'l Lowerer<'a>,
    depth: usize,
}

impl ConstEnv for EvalEnv<'_, '_> {
    fn constant(&self, name: &str) -> Option<i64> {
        if let Some(value) = self.lowerer.types.constant(name) {
            return Some(value);
        }
        if self.depth >= MAX_MACRO_DEPTH {
            return None;
        }
        let body = self.lowerer.macros.get(name)?.body.as_ref()?;
        consteval::evaluate(
            body,
            &EvalEnv {
                lowerer: self.lowerer,
                depth: self.depth + 1,
            },
        )
    }

    fn is_type_name(&self, name: &str) -> bool {
        is_type_keyword(name) || self.lowerer.types.is_typedef(name)
    }

    fn sizeof_tokens(&self, tokens: &[Token]) -> Option<u64> {
        let ty = type_from_tokens(tokens)?;
        self.lowerer.types.size_of(&ty)
    }
}

fn is_type_keyword(name: &str) -> bool {
    matches!(
        name,
        "void"
            | "char"
            | "short"
            | "int"
            | "long"
            | "float"
            | "double"
            | "signed"
            | "unsigned"
            | "_Bool"
            | "const"
            | "volatile"
            | "struct"
            | "union"
            | "enum"
    )
}

/// A type name written as plain tokens, as inside `sizeof(...)`.
fn type_from_tokens(tokens: &[Token]) -> Option<CType> {
    let mut words = Vec::new();
    let mut pointers = 0;
    for token in tokens {
        match token.spelling.as_str() {
            "*" => pointers += 1,
            "const" | "volatile" => {}
            word if token.kind == TokenKind::Identifier => words.push(word),
            _ => return None,
        }
    }

    let mut ty = match words.as_slice() {
        ["struct", name] => CType::new(TypeNode::Record(RecordKind::Struct, (*name).to_string())),
        ["union", name] => CType::new(TypeNode::Record(RecordKind::Union, (*name).to_string())),
        ["enum", name] => CType::new(TypeNode::Enum((*name).to_string())),
        [single] => Builtin::from_primitive(single).map_or_else(
            || CType::new(TypeNode::Typedef((*single).to_string())),
            CType::builtin,
        ),
        many if many.iter().all(|w| is_type_keyword(w)) => {
            let base = many
                .iter()
                .copied()
                .find(|w| matches!(*w, "char" | "int" | "double" | "float"));
            CType::builtin(Builtin::from_modifiers(
                many.contains(&"unsigned"),
                many.contains(&"signed"),
                many.contains(&"short"),
                many.iter().filter(|w| **w == "long").count(),
                base,
            ))
        }
        _ => return None,
    };
    for _ in 0..pointers {
        ty = ty.pointer_to();
    }
    Some(ty)
}

fn function_cursor(parts: FunctionParts, extent: Span, is_definition: bool) -> Cursor {
    let mut cursor = Cursor::new(CursorKind::FunctionDecl, parts.name, parts.location, extent);
    cursor.ty = Some(parts.ty);
    cursor.decl.is_definition = is_definition;
    cursor.decl.storage_class = parts.storage;
    cursor.decl.linkage = linkage_for(parts.storage);
    cursor.decl.is_inline = parts.is_inline;
    cursor.children = parts.return_refs;
    for param in parts.params.params {
        let mut parm = Cursor::new(
            CursorKind::ParmDecl,
            param.name.unwrap_or_default(),
            param.location,
            param.extent,
        );
        parm.ty = Some(param.ty);
        parm.children = param.type_refs;
        cursor.children.push(parm);
    }
    cursor
}

fn type_ref(node: Node<'_>, ctx: &FileCtx<'_>, name: &str, kind: CursorKind) -> Cursor {
    let mut cursor = Cursor::new(CursorKind::TypeRef, name, ctx.loc(node), node_span(node));
    cursor.referenced = Some(DeclRef::new(name, kind, Linkage::None));
    cursor
}

fn linkage_for(storage: StorageClass) -> Linkage {
    if storage == StorageClass::Static {
        Linkage::Internal
    } else {
        Linkage::External
    }
}

fn declarators(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children_by_field_name("declarator", &mut cursor).collect()
}

fn initializer(declarator: Node<'_>) -> Option<Node<'_>> {
    if declarator.kind() == "init_declarator" {
        declarator.child_by_field_name("value")
    } else {
        None
    }
}

fn qualifiers(node: Node<'_>, ctx: &FileCtx<'_>) -> (bool, bool) {
    let mut is_const = false;
    let mut is_volatile = false;
    for child in named_children(node) {
        if child.kind() == "type_qualifier" {
            match ctx.text(child) {
                "const" => is_const = true,
                "volatile" => is_volatile = true,
                _ => {}
            }
        }
    }
    (is_const, is_volatile)
}

/// The documentation comment directly above a declaration: one `/** */` or
/// `/*! */` block, or a run of `///` or `//!` lines.
fn doc_comment(node: Node<'_>, ctx: &FileCtx<'_>) -> Option<String> {
    let mut parts = Vec::new();
    let mut next_row = node.start_position().row;
    let mut prev = node.prev_sibling();

    while let Some(comment) = prev {
        if comment.kind() != "comment" || comment.end_position().row + 1 < next_row {
            break;
        }
        let text = ctx.text(comment);
        if !is_doc_comment(text) {
            break;
        }
        parts.push(text);
        if text.starts_with("/*") {
            break;
        }
        next_row = comment.start_position().row;
        prev = comment.prev_sibling();
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("\n"))
}

fn is_doc_comment(text: &str) -> bool {
    let trailing = ["/**<", "/*!<", "///<", "//!<"];
    if trailing.iter().any(|t| text.starts_with(t)) {
        return false;
    }
    (text.starts_with("/**") && !text.starts_with("/**/"))
        || text.starts_with("/*!")
        || (text.starts_with("///") && !text.starts_with("////"))
        || text.starts_with("//!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse_files(files: &[(&str, &str)]) -> (TempDir, TranslationUnit) {
        let dir = TempDir::new().expect("should create temp dir");
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("should create parent dirs");
            }
            fs::write(&full, content).expect("should write file");
        }
        let main = dir.path().join(files[0].0);
        let command = CompileCommand::new(&main, dir.path(), Vec::new());
        let mut frontend = TreeSitterFrontend::new(FrontendOptions {
            system_include_dirs: Vec::new(),
            max_include_depth: 16,
        })
        .expect("grammar should load");
        let tu = frontend.parse(&main, &command).expect("should parse");
        (dir, tu)
    }

    fn find<'c>(cursor: &'c Cursor, kind: CursorKind, name: &str) -> Option<&'c Cursor> {
        if cursor.kind == kind && cursor.spelling == name {
            return Some(cursor);
        }
        cursor.children.iter().find_map(|c| find(c, kind, name))
    }

    fn find_all<'c>(cursor: &'c Cursor, kind: CursorKind, out: &mut Vec<&'c Cursor>) {
        if cursor.kind == kind {
            out.push(cursor);
        }
        for child in &cursor.children {
            find_all(child, kind, out);
        }
    }

    #[test]
    fn function_definition_has_typed_parameters() {
        let (_dir, tu) = parse_files(&[("a.c", "int add(int a, const char *s) { return a; }\n")]);
        let add = find(tu.root(), CursorKind::FunctionDecl, "add").expect("add");
        assert!(add.is_definition());
        assert_eq!(add.decl.linkage, Linkage::External);
        let func = add.ty.as_ref().and_then(CType::as_function).expect("function type");
        assert_eq!(func.ret.spelling(), "int");

        let params: Vec<_> = add
            .children
            .iter()
            .filter(|c| c.kind == CursorKind::ParmDecl)
            .map(|c| (c.spelling.as_str(), c.ty.as_ref().map(CType::spelling)))
            .collect();
        assert_eq!(
            params,
            vec![
                ("a", Some("int".to_string())),
                ("s", Some("const char *".to_string()))
            ]
        );
    }

    #[test]
    fn static_inline_functions_have_internal_linkage() {
        let (_dir, tu) = parse_files(&[("a.c", "static inline int sq(int x) { return x * x; }\n")]);
        let sq = find(tu.root(), CursorKind::FunctionDecl, "sq").expect("sq");
        assert_eq!(sq.decl.linkage, Linkage::Internal);
        assert!(sq.decl.is_inline);
    }

    #[test]
    fn calls_distinguish_direct_and_indirect_targets() {
        let source = r"
struct ops { int (*run)(void); };
int helper(void) { return 1; }
int go(struct ops *o, int (*cb)(void)) {
    helper();
    o->run();
    return cb();
}
";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let go = find(tu.root(), CursorKind::FunctionDecl, "go").expect("go");
        let mut calls = Vec::new();
        find_all(go, CursorKind::CallExpr, &mut calls);
        let kinds: Vec<_> = calls
            .iter()
            .map(|c| (c.spelling.as_str(), c.referenced.as_ref().map(|r| r.kind)))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("helper", Some(CursorKind::FunctionDecl)),
                ("run", Some(CursorKind::FieldDecl)),
                ("cb", Some(CursorKind::ParmDecl)),
            ]
        );
    }

    #[test]
    fn function_like_macro_invocation_is_not_a_call() {
        let source = "#define SQUARE(x) ((x) * (x))\nint f(int v) { return SQUARE(v); }\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let mut calls = Vec::new();
        find_all(tu.root(), CursorKind::CallExpr, &mut calls);
        assert!(calls.is_empty());
        assert_eq!(tu.macro_definitions().len(), 1);
        assert_eq!(tu.macro_definitions()[0].name, "SQUARE");
    }

    #[test]
    fn locals_shadow_globals() {
        let source = "int g;\nvoid f(void) { int g = 1; g = 2; }\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let f = find(tu.root(), CursorKind::FunctionDecl, "f").expect("f");
        let mut refs = Vec::new();
        find_all(f, CursorKind::DeclRefExpr, &mut refs);
        assert!(refs.iter().all(|r| r
            .referenced
            .as_ref()
            .is_some_and(|d| d.linkage == Linkage::None)));
    }

    #[test]
    fn struct_layout_and_anonymous_members() {
        let source = "struct point { char c; int x; };\ntypedef struct { int a; } anon_t;\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let point = find(tu.root(), CursorKind::StructDecl, "point").expect("point");
        let ty = point.ty.as_ref().expect("record type");
        assert_eq!(tu.size_of(ty), Some(8));
        assert_eq!(tu.field_layout(ty, 1), (Some(32), Some(32)));

        let typedef = find(tu.root(), CursorKind::TypedefDecl, "anon_t").expect("anon_t");
        let spelled = typedef.ty.as_ref().map(CType::spelling).unwrap_or_default();
        assert!(spelled.starts_with("struct <anonymous_struct_"), "{spelled}");
    }

    #[test]
    fn enumerators_use_macros_and_implicit_increments() {
        let source = "#define BASE 10\nenum color { RED = BASE, GREEN, BLUE = RED + 5 };\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let values: Vec<_> = ["RED", "GREEN", "BLUE"]
            .iter()
            .map(|n| {
                find(tu.root(), CursorKind::EnumConstantDecl, n)
                    .and_then(|c| c.decl.enum_value)
            })
            .collect();
        assert_eq!(values, vec![Some(10), Some(11), Some(15)]);
    }

    #[test]
    fn project_headers_are_inlined_at_the_include() {
        let (_dir, tu) = parse_files(&[
            ("main.c", "#include \"util.h\"\n#include <stdio.h>\nint run(void) { return util(); }\n"),
            ("util.h", "int util(void);\n"),
        ]);
        let util = find(tu.root(), CursorKind::FunctionDecl, "util").expect("util");
        assert_eq!(util.location.file, FileRef(1));
        assert!(!util.is_definition());

        let includes = tu.inclusion_directives();
        assert_eq!(includes.len(), 2);
        assert!(includes[0].resolved.is_some());
        assert!(includes[1].is_angled);
        assert!(includes[1].resolved.is_none());
    }

    #[test]
    fn syntax_errors_become_diagnostics() {
        let (_dir, tu) = parse_files(&[("a.c", "int ok(void) { return 0; }\nint broken( { \n")]);
        assert!(tu.main_file_errors().count() > 0);
        assert!(find(tu.root(), CursorKind::FunctionDecl, "ok").is_some());
    }

    #[test]
    fn doc_comments_attach_to_the_next_declaration() {
        let source = "/** Adds things. */\nint add(int a, int b);\n\n/* plain */\nint sub(int a, int b);\n/// one\n/// two\nint mul(int a, int b);\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let doc = |name: &str| {
            find(tu.root(), CursorKind::FunctionDecl, name).and_then(|c| c.decl.raw_comment.clone())
        };
        assert_eq!(doc("add").as_deref(), Some("/** Adds things. */"));
        assert_eq!(doc("sub"), None);
        assert_eq!(doc("mul").as_deref(), Some("/// one\n/// two"));
    }

    #[test]
    fn sizeof_in_array_lengths() {
        let source = "struct s { int a; long b; };\nchar buf[sizeof(struct s) * 2];\n";
        let (_dir, tu) = parse_files(&[("a.c", source)]);
        let buf = find(tu.root(), CursorKind::VarDecl, "buf").expect("buf");
        assert_eq!(buf.ty.as_ref().map(CType::spelling).as_deref(), Some("char [32]"));
    }
}
