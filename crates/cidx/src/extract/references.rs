//! Use-site traversal and reference classification.
//!
//! Every identifier that resolves to a file-scope entity (function, global
//! variable, enumerator) and every use of a tag or typedef name becomes a
//! reference recorded by name. Parameters, locals and fields are never
//! referenced: they have no symbol of their own.

use super::{FunctionScope, Walker};
use crate::db::{CallData, ReferenceData};
use crate::frontend::{Cursor, CursorKind, DeclRef};
use crate::types::{Linkage, Local, ReferenceKind, SymbolKind};

const ASSIGNMENT_OPERATORS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "|=", "&=", "^=", "<<=", ">>=",
];

/// How the identifier `cursor` is used, given its ancestors (innermost last).
///
/// Parentheses are transparent. The operand of unary `&` is taken by
/// address; the left operand of an assignment is written; anything else is
/// read.
#[must_use]
pub fn classify(cursor: &Cursor, ancestors: &[&Cursor]) -> ReferenceKind {
    let mut operand = cursor;
    for parent in ancestors.iter().rev() {
        match parent.kind {
            CursorKind::ParenExpr => operand = parent,
            CursorKind::UnaryOperator => {
                return if parent.operator.as_deref() == Some("&") {
                    ReferenceKind::Addr
                } else {
                    ReferenceKind::Read
                };
            }
            CursorKind::BinaryOperator | CursorKind::CompoundAssignOperator => {
                let is_left = parent
                    .children
                    .first()
                    .is_some_and(|first| std::ptr::eq(first, operand));
                let assigns = parent
                    .operator
                    .as_deref()
                    .is_some_and(|op| ASSIGNMENT_OPERATORS.contains(&op));
                return if is_left && assigns {
                    ReferenceKind::Write
                } else {
                    ReferenceKind::Read
                };
            }
            _ => return ReferenceKind::Read,
        }
    }
    ReferenceKind::Read
}

/// Symbol kind of an identifier's declaration, when it has a symbol.
fn value_symbol_kind(decl: &DeclRef) -> Option<SymbolKind> {
    match decl.kind {
        CursorKind::FunctionDecl => Some(SymbolKind::Function),
        CursorKind::VarDecl if decl.linkage != Linkage::None => Some(SymbolKind::Variable),
        CursorKind::EnumConstantDecl => Some(SymbolKind::EnumConstant),
        _ => None,
    }
}

/// Symbol kind of a type name's declaration.
fn type_symbol_kind(decl: &DeclRef) -> Option<SymbolKind> {
    match decl.kind {
        CursorKind::TypedefDecl => Some(SymbolKind::Typedef),
        CursorKind::StructDecl => Some(SymbolKind::Struct),
        CursorKind::UnionDecl => Some(SymbolKind::Union),
        CursorKind::EnumDecl => Some(SymbolKind::Enum),
        _ => None,
    }
}

impl<'a> Walker<'a> {
    /// Walk the subtree under `cursor`, recording references and, inside a
    /// function body, locals and calls.
    pub(super) fn walk_uses(
        &mut self,
        cursor: &'a Cursor,
        ancestors: &mut Vec<&'a Cursor>,
        mut function: Option<&mut FunctionScope>,
        depth: u32,
    ) {
        let mut child_depth = depth;
        let mut skip_first = false;

        match cursor.kind {
            CursorKind::CompoundStmt => child_depth += 1,
            CursorKind::VarDecl => {
                if let Some(scope) = function.as_deref_mut() {
                    record_local(scope, cursor, depth);
                }
            }
            CursorKind::CallExpr => {
                skip_first = self.record_call(cursor, function.as_deref());
            }
            CursorKind::DeclRefExpr => {
                if let Some(kind) = cursor.referenced.as_ref().and_then(value_symbol_kind) {
                    let use_kind = classify(cursor, ancestors);
                    self.push_reference(cursor, kind, use_kind, function.as_deref());
                }
            }
            CursorKind::TypeRef => {
                if let Some(kind) = cursor.referenced.as_ref().and_then(type_symbol_kind) {
                    self.push_reference(cursor, kind, ReferenceKind::TypeRef, function.as_deref());
                }
            }
            _ => {}
        }

        ancestors.push(cursor);
        for child in cursor.children.iter().skip(usize::from(skip_first)) {
            self.walk_uses(child, ancestors, function.as_deref_mut(), child_depth);
        }
        ancestors.pop();
    }

    /// Record a call site and, for a direct call, the `call` reference to the
    /// callee. Returns whether the callee child was consumed.
    fn record_call(&mut self, call: &Cursor, function: Option<&FunctionScope>) -> bool {
        if let Some(scope) = function.filter(|s| s.collect_body) {
            if !call.spelling.is_empty() {
                let is_indirect = call
                    .referenced
                    .as_ref()
                    .map_or(true, |decl| decl.kind != CursorKind::FunctionDecl);
                self.out.calls.push(CallData {
                    caller: scope.symbol,
                    callee_name: call.spelling.clone(),
                    line: call.location.line,
                    column: call.location.column,
                    is_indirect,
                });
            }
        }

        let Some(callee) = call.children.first() else {
            return false;
        };
        let is_direct = callee.kind == CursorKind::DeclRefExpr
            && callee
                .referenced
                .as_ref()
                .is_some_and(|decl| decl.kind == CursorKind::FunctionDecl);
        if is_direct {
            self.push_reference(callee, SymbolKind::Function, ReferenceKind::Call, function);
        }
        is_direct
    }

    fn push_reference(
        &mut self,
        cursor: &Cursor,
        symbol_kind: SymbolKind,
        kind: ReferenceKind,
        function: Option<&FunctionScope>,
    ) {
        self.out.references.push(ReferenceData {
            symbol_name: cursor.spelling.clone(),
            symbol_kind,
            line: cursor.location.line,
            column: cursor.location.column,
            kind,
            context_function: function.map(|scope| scope.symbol),
        });
    }
}

/// Keep the first declaration of each local name.
fn record_local(scope: &mut FunctionScope, cursor: &Cursor, depth: u32) {
    if !scope.collect_body || cursor.spelling.is_empty() {
        return;
    }
    if scope.locals.iter().any(|local| local.name == cursor.spelling) {
        return;
    }
    scope.locals.push(Local {
        name: cursor.spelling.clone(),
        type_name: cursor
            .ty
            .as_ref()
            .map(crate::frontend::ctype::CType::spelling)
            .unwrap_or_default(),
        line: cursor.location.line,
        scope_depth: depth,
    });
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::super::test_support::*;
    use super::*;
    use crate::frontend::{FileRef, SourceLocation};
    use crate::types::Span;

    fn at(column: u32) -> SourceLocation {
        SourceLocation {
            file: FileRef::MAIN,
            line: 1,
            column,
        }
    }

    fn node(kind: CursorKind, op: Option<&str>, children: Vec<Cursor>) -> Cursor {
        let mut cursor = Cursor::new(kind, "", at(1), Span::point(1, 1));
        cursor.operator = op.map(ToString::to_string);
        cursor.children = children;
        cursor
    }

    fn ident(name: &str, column: u32) -> Cursor {
        let mut cursor = Cursor::new(CursorKind::DeclRefExpr, name, at(column), Span::point(1, column));
        cursor.referenced = Some(DeclRef::new(name, CursorKind::VarDecl, Linkage::External));
        cursor
    }

    #[rstest]
    #[case(CursorKind::BinaryOperator, "=", ReferenceKind::Write, ReferenceKind::Read)]
    #[case(CursorKind::CompoundAssignOperator, "<<=", ReferenceKind::Write, ReferenceKind::Read)]
    #[case(CursorKind::BinaryOperator, "==", ReferenceKind::Read, ReferenceKind::Read)]
    fn assignment_writes_only_the_left_operand(
        #[case] kind: CursorKind,
        #[case] op: &str,
        #[case] left: ReferenceKind,
        #[case] right: ReferenceKind,
    ) {
        let expr = node(kind, Some(op), vec![ident("x", 1), ident("y", 5)]);

        assert_eq!(classify(&expr.children[0], &[&expr]), left);
        assert_eq!(classify(&expr.children[1], &[&expr]), right);
    }

    #[test]
    fn address_of_sees_through_parentheses() {
        let paren = node(CursorKind::ParenExpr, None, vec![ident("x", 3)]);
        let addr = node(CursorKind::UnaryOperator, Some("&"), vec![paren]);
        let paren = &addr.children[0];

        assert_eq!(classify(&paren.children[0], &[&addr, paren]), ReferenceKind::Addr);
    }

    #[test]
    fn dereference_and_bare_uses_are_reads() {
        let deref = node(CursorKind::UnaryOperator, Some("*"), vec![ident("p", 2)]);

        assert_eq!(classify(&deref.children[0], &[&deref]), ReferenceKind::Read);
        assert_eq!(classify(&ident("x", 1), &[]), ReferenceKind::Read);
    }

    fn refs(ex: &crate::db::FileExtraction, name: &str) -> Vec<ReferenceKind> {
        ex.references
            .iter()
            .filter(|r| r.symbol_name == name)
            .map(|r| r.kind)
            .collect()
    }

    #[test]
    fn references_from_a_function_body() {
        let out = extract(&[(
            "refs.c",
            "typedef struct point { int x; } point_t;\n\
             int total;\n\
             enum mode { FAST, SLOW };\n\
             static int step(int n) { return n + 1; }\n\
             int run(point_t *p) {\n\
                 int local = 0;\n\
                 total = step(local);\n\
                 total += FAST;\n\
                 int *alias = &total;\n\
                 (total) = sizeof(struct point) + p->x;\n\
                 return *alias;\n\
             }\n",
        )]);
        let ex = &out.extraction;

        assert_eq!(
            refs(ex, "total"),
            vec![
                ReferenceKind::Write,
                ReferenceKind::Write,
                ReferenceKind::Addr,
                ReferenceKind::Write
            ]
        );
        assert_eq!(refs(ex, "step"), vec![ReferenceKind::Call]);
        assert_eq!(refs(ex, "FAST"), vec![ReferenceKind::Read]);
        assert!(refs(ex, "local").is_empty(), "locals have no symbol");
        assert!(refs(ex, "n").is_empty(), "parameters have no symbol");
        assert!(refs(ex, "point_t").contains(&ReferenceKind::TypeRef));
        assert!(refs(ex, "point").contains(&ReferenceKind::TypeRef));

        let run = ex.symbols.iter().position(|s| s.name == "run");
        let step_ref = ex.references.iter().find(|r| r.symbol_name == "step");
        assert_eq!(step_ref.and_then(|r| r.context_function), run);
    }

    #[test]
    fn file_scope_references_have_no_context() {
        let out = extract(&[(
            "globals.c",
            "int base = 4;\nint *ptr = &base;\n",
        )]);

        let reference = &out.extraction.references[0];
        assert_eq!(reference.symbol_name, "base");
        assert_eq!(reference.kind, ReferenceKind::Addr);
        assert_eq!(reference.context_function, None);
    }
}
