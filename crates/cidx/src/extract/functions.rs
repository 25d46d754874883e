//! Function prototypes and definitions.

use super::{FunctionScope, Walker};
use crate::db::FunctionData;
use crate::frontend::ctype::FunctionType;
use crate::frontend::{Cursor, CursorKind};
use crate::types::{Parameter, SymbolKind};

impl<'a> Walker<'a> {
    pub(super) fn extract_function(&mut self, cursor: &'a Cursor) {
        let Some(func) = cursor.ty.as_ref().and_then(|ty| ty.as_function()) else {
            return;
        };

        let parameters = parameters(cursor, func);
        let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
        let return_type = func.ret.spelling();
        let signature = render_signature(
            &return_type,
            &cursor.spelling,
            &func.parameter_spelling(Some(names.as_slice())),
        );

        let symbol = self.push_declaration(cursor, &cursor.spelling, SymbolKind::Function);

        let mut scope = FunctionScope::new(symbol, cursor.is_definition());
        let mut ancestors = vec![cursor];
        for child in &cursor.children {
            self.walk_uses(child, &mut ancestors, Some(&mut scope), 0);
        }

        self.out.functions.push(FunctionData {
            symbol,
            return_type,
            signature,
            is_variadic: func.variadic,
            is_inline: cursor.decl.is_inline,
            parameters,
            locals: scope.locals,
        });
    }
}

/// Parameters in declaration order. Unnamed ones are called `param{i}`.
fn parameters(cursor: &Cursor, func: &FunctionType) -> Vec<Parameter> {
    let declared: Vec<&Cursor> = cursor
        .children
        .iter()
        .filter(|c| c.kind == CursorKind::ParmDecl)
        .collect();

    func.params
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let parm = declared.get(i);
            let name = parm
                .map(|p| p.spelling.as_str())
                .filter(|name| !name.is_empty())
                .map_or_else(|| format!("param{i}"), ToString::to_string);
            let type_name = parm
                .and_then(|p| p.ty.as_ref())
                .unwrap_or(ty)
                .spelling();
            Parameter {
                position: u32::try_from(i).unwrap_or(u32::MAX),
                name,
                type_name,
            }
        })
        .collect()
}

/// `int add(int a, int b)`, `char *dup(const char *s)`.
fn render_signature(return_type: &str, name: &str, params: &str) -> String {
    if return_type.ends_with('*') {
        format!("{return_type}{name}({params})")
    } else {
        format!("{return_type} {name}({params})")
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::Linkage;

    #[test]
    fn definition_with_parameters_and_signature() {
        let out = extract(&[("math.c", "int add(int a, int b) { return a + b; }\n")]);
        let ex = &out.extraction;

        assert_eq!(ex.functions.len(), 1);
        let add = &ex.functions[0];
        assert_eq!(add.return_type, "int");
        assert_eq!(add.signature, "int add(int a, int b)");
        let params: Vec<_> = add.parameters.iter().map(|p| (p.position, p.name.as_str())).collect();
        assert_eq!(params, vec![(0, "a"), (1, "b")]);
        let symbol = &ex.symbols[add.symbol];
        assert!(symbol.is_definition);
        assert_eq!(symbol.linkage, Linkage::External);
    }

    #[test]
    fn prototypes_render_void_unnamed_and_variadic_parameters() {
        let out = extract(&[(
            "proto.c",
            "void reset(void);\nint log_msg(const char *fmt, ...);\nchar *dup(const char *);\nstatic inline int twice(int x) { return 2 * x; }\n",
        )]);
        let ex = &out.extraction;
        let signature = |name: &str| {
            ex.functions
                .iter()
                .find(|f| ex.symbols[f.symbol].name == name)
                .map(|f| f.signature.clone())
        };

        assert_eq!(signature("reset").as_deref(), Some("void reset(void)"));
        assert_eq!(
            signature("log_msg").as_deref(),
            Some("int log_msg(const char *fmt, ...)")
        );
        assert_eq!(
            signature("dup").as_deref(),
            Some("char *dup(const char *param0)")
        );

        let reset = ex.functions.iter().find(|f| ex.symbols[f.symbol].name == "reset");
        assert!(reset.is_some_and(|f| f.parameters.is_empty()));
        assert!(!ex.symbols[reset.map_or(0, |f| f.symbol)].is_definition);

        let twice = ex.functions.iter().find(|f| ex.symbols[f.symbol].name == "twice");
        assert!(twice.is_some_and(|f| f.is_inline));
        let variadic = ex.functions.iter().find(|f| ex.symbols[f.symbol].name == "log_msg");
        assert!(variadic.is_some_and(|f| f.is_variadic));
        let twice_symbol = twice.map(|f| &ex.symbols[f.symbol]);
        assert!(twice_symbol.is_some_and(|s| s.is_static() && s.linkage == Linkage::Internal));
    }

    #[test]
    fn locals_keep_first_declaration_with_scope_depth() {
        let out = extract(&[(
            "locals.c",
            "int f(int n) {\n  int i = 0;\n  {\n    int j = 1;\n    int i = 2;\n  }\n  return i + n;\n}\n",
        )]);
        let locals = &out.extraction.functions[0].locals;

        let summary: Vec<_> = locals
            .iter()
            .map(|l| (l.name.as_str(), l.line, l.scope_depth))
            .collect();
        assert_eq!(summary, vec![("i", 2, 1), ("j", 4, 2)]);
        assert_eq!(locals[0].type_name, "int");
    }

    #[test]
    fn calls_record_callee_names_and_indirection() {
        let out = extract(&[(
            "calls.c",
            "struct ops { void (*run)(void); };\n\
             void target(void);\n\
             void go(struct ops *o, void (*cb)(void)) {\n\
                 target();\n\
                 cb();\n\
                 o->run();\n\
                 undeclared(1);\n\
             }\n",
        )]);
        let calls: Vec<_> = out
            .extraction
            .calls
            .iter()
            .map(|c| (c.callee_name.as_str(), c.is_indirect))
            .collect();

        assert_eq!(
            calls,
            vec![
                ("target", false),
                ("cb", true),
                ("run", true),
                ("undeclared", false)
            ]
        );
        assert!(out.extraction.calls.iter().all(|c| c.caller == 2));
    }
}
