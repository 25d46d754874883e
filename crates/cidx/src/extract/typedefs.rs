//! Typedef names and their fully chased target types.
//!
//! The chase happens once, here, so `resolve_typedef` is a single lookup.
//! Each typedef hop is looked up in the translation unit first and then in
//! the index, whose stored targets are already terminal. Typedefs nested
//! inside pointers, arrays and function types are chased too.

use std::path::PathBuf;

use tracing::warn;

use super::Walker;
use crate::db::TypeData;
use crate::error::{IndexError, IndexErrorKind, Result};
use crate::frontend::ctype::{CType, FunctionType, TypeNode};
use crate::frontend::Cursor;
use crate::types::{SymbolKind, TypeKind};

/// Typedef chasing state for one declaration.
struct Chase<'w, 'a> {
    walker: &'w Walker<'a>,
    hops: usize,
    exhausted: bool,
}

impl Chase<'_, '_> {
    fn canonical(&mut self, ty: &CType) -> Result<CType> {
        let node = match &ty.node {
            TypeNode::Typedef(name) => {
                if self.hops >= self.walker.options.typedef_chain_limit {
                    self.exhausted = true;
                    return Ok(ty.clone());
                }
                let target = match self.walker.tu.types().typedef_target(name) {
                    Some(target) => target.clone(),
                    None => match self.walker.index.typedef_underlying(name)? {
                        Some(text) => CType::new(TypeNode::Unknown(text)),
                        None => return Ok(ty.clone()),
                    },
                };
                self.hops += 1;
                return self.canonical(&target.qualified(ty.is_const, ty.is_volatile));
            }
            TypeNode::Pointer(inner) => TypeNode::Pointer(Box::new(self.canonical(inner)?)),
            TypeNode::Array(inner, len) => TypeNode::Array(Box::new(self.canonical(inner)?), *len),
            TypeNode::Function(func) => {
                let params = func
                    .params
                    .iter()
                    .map(|p| self.canonical(p))
                    .collect::<Result<Vec<_>>>()?;
                TypeNode::Function(Box::new(FunctionType {
                    ret: self.canonical(&func.ret)?,
                    params,
                    variadic: func.variadic,
                    has_prototype: func.has_prototype,
                }))
            }
            TypeNode::Builtin(_) | TypeNode::Record(..) | TypeNode::Enum(_) | TypeNode::Unknown(_) => {
                return Ok(ty.clone());
            }
        };
        Ok(CType {
            node,
            is_const: ty.is_const,
            is_volatile: ty.is_volatile,
        })
    }
}

impl<'a> Walker<'a> {
    pub(super) fn extract_typedef(&mut self, cursor: &'a Cursor) {
        let Some(target) = cursor.ty.as_ref() else {
            return;
        };

        let (chased, exhausted) = {
            let mut chase = Chase {
                walker: self,
                hops: 0,
                exhausted: false,
            };
            let chased = chase.canonical(target);
            (chased, chase.exhausted)
        };
        let underlying = match chased {
            Ok(ty) => ty,
            Err(e) => {
                self.database_error(&e);
                target.clone()
            }
        };
        if exhausted {
            let limit = self.options.typedef_chain_limit;
            warn!(
                path = %self.path.display(),
                typedef = %cursor.spelling,
                limit,
                "Typedef chain too deep, storing the last type reached"
            );
            self.errors.push(IndexError::new(
                PathBuf::from(self.path),
                IndexErrorKind::TypedefChainTooDeep,
                format!("typedef '{}' exceeds {limit} hops", cursor.spelling),
            ));
        }

        let symbol = self.push_type_symbol(cursor, &cursor.spelling, SymbolKind::Typedef);
        self.out.types.push(TypeData {
            symbol,
            kind: TypeKind::Typedef,
            underlying_type: Some(underlying.spelling()),
            size_bytes: self.tu.size_of(target),
            alignment: self.tu.align_of(target),
            is_anonymous: false,
            fields: Vec::new(),
            enum_constants: Vec::new(),
        });

        let mut ancestors = vec![cursor];
        for child in &cursor.children {
            self.walk_uses(child, &mut ancestors, None, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::super::test_support::*;
    use super::super::{extract_file, ExtractOptions};
    use crate::compile_db::CompileCommand;
    use crate::db::{FileMeta, Index};
    use crate::error::IndexErrorKind;
    use crate::frontend::{Frontend, FrontendOptions, TreeSitterFrontend};

    fn underlying(out: &super::super::Extracted, name: &str) -> Option<String> {
        let ex = &out.extraction;
        ex.types
            .iter()
            .find(|t| ex.symbols[t.symbol].name == name)
            .and_then(|t| t.underlying_type.clone())
    }

    #[test]
    fn chains_resolve_to_the_terminal_type() {
        let out = extract(&[(
            "t.c",
            "typedef unsigned int u32;\ntypedef u32 id_t;\ntypedef const id_t *id_ptr;\ntypedef struct node node_t;\ntypedef int (*cmp_fn)(const u32 *, const u32 *);\n",
        )]);

        assert_eq!(underlying(&out, "u32").as_deref(), Some("unsigned int"));
        assert_eq!(underlying(&out, "id_t").as_deref(), Some("unsigned int"));
        assert_eq!(underlying(&out, "id_ptr").as_deref(), Some("const unsigned int *"));
        assert_eq!(underlying(&out, "node_t").as_deref(), Some("struct node"));
        assert_eq!(
            underlying(&out, "cmp_fn").as_deref(),
            Some("int (*)(const unsigned int *, const unsigned int *)")
        );
        assert!(out.errors.is_empty());
    }

    #[test]
    fn typedefs_from_earlier_files_come_from_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let first = extract_with(&dir, &index, &[("a.c", "typedef unsigned long word;\n")], &[]);
        index
            .store_file_extraction(
                &FileMeta {
                    path: "a.c".into(),
                    mtime_ns: 1,
                    size_bytes: 1,
                    content_hash: None,
                },
                &first.extraction,
                None,
            )
            .unwrap();

        // `word` is unknown to b.c's front end; the tree still names it.
        let out = extract_with(&dir, &index, &[("b.c", "typedef word handle;\n")], &[]);

        assert_eq!(underlying(&out, "handle").as_deref(), Some("unsigned long"));
    }

    #[test]
    fn chains_longer_than_the_limit_are_reported() {
        let mut source = String::from("typedef int t0;\n");
        for i in 1..=6 {
            let _ = writeln!(source, "typedef t{} t{i};", i - 1);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.c");
        std::fs::write(&path, &source).unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let command = CompileCommand::new(&path, dir.path(), Vec::new());
        let tu = TreeSitterFrontend::new(FrontendOptions {
            system_include_dirs: Vec::new(),
            max_include_depth: 4,
        })
        .unwrap()
        .parse(&path, &command)
        .unwrap();

        let out = extract_file(
            &tu,
            std::path::Path::new("deep.c"),
            &command,
            &index,
            ExtractOptions {
                typedef_chain_limit: 5,
            },
        );

        assert_eq!(underlying(&out, "t5").as_deref(), Some("int"));
        assert_eq!(underlying(&out, "t6").as_deref(), Some("t0"));
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, IndexErrorKind::TypedefChainTooDeep);
    }
}
