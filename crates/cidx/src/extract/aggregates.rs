//! Structs, unions and enums.
//!
//! Only defining occurrences are indexed. A tag declared without a body
//! (`struct node;`) is skipped; its definition, wherever it is, is the
//! symbol other files link to.

use super::Walker;
use crate::db::TypeData;
use crate::frontend::ctype::{RecordKind, TypeNode};
use crate::frontend::{Cursor, CursorKind};
use crate::types::{EnumConstant, Field, SymbolKind, TypeKind};

impl<'a> Walker<'a> {
    pub(super) fn extract_record(&mut self, cursor: &'a Cursor) {
        if !cursor.is_definition() {
            return;
        }
        let Some(ty) = cursor.ty.as_ref() else {
            return;
        };
        let TypeNode::Record(record_kind, name) = &ty.node else {
            return;
        };
        let kind = match record_kind {
            RecordKind::Struct => TypeKind::Struct,
            RecordKind::Union => TypeKind::Union,
        };

        let symbol = self.push_type_symbol(cursor, name, kind.symbol_kind());
        let tu = self.tu;

        let mut fields = Vec::new();
        let mut ancestors = vec![cursor];
        for child in &cursor.children {
            match child.kind {
                CursorKind::FieldDecl => {
                    let position = fields.len();
                    let (offset_bits, size_bits) = tu.field_layout(ty, position);
                    let position = u32::try_from(position).unwrap_or(u32::MAX);
                    fields.push(Field {
                        position,
                        name: if child.spelling.is_empty() {
                            format!("field{position}")
                        } else {
                            child.spelling.clone()
                        },
                        type_name: child.ty.as_ref().map(|t| t.spelling()).unwrap_or_default(),
                        offset_bits,
                        size_bits,
                        is_bitfield: child.decl.bit_width.is_some(),
                        bitfield_width: child.decl.bit_width,
                    });
                    for type_ref in &child.children {
                        self.walk_uses(type_ref, &mut ancestors, None, 0);
                    }
                }
                CursorKind::StructDecl | CursorKind::UnionDecl | CursorKind::EnumDecl => {
                    self.dispatch(child);
                }
                _ => {}
            }
        }

        self.out.types.push(TypeData {
            symbol,
            kind,
            underlying_type: None,
            size_bytes: tu.size_of(ty),
            alignment: tu.align_of(ty),
            is_anonymous: cursor.spelling.is_empty(),
            fields,
            enum_constants: Vec::new(),
        });
    }

    pub(super) fn extract_enum(&mut self, cursor: &'a Cursor) {
        if !cursor.is_definition() {
            return;
        }
        let Some(ty) = cursor.ty.as_ref() else {
            return;
        };
        let TypeNode::Enum(name) = &ty.node else {
            return;
        };

        let symbol = self.push_type_symbol(cursor, name, SymbolKind::Enum);
        let mut enum_constants = Vec::new();
        for child in &cursor.children {
            if child.kind != CursorKind::EnumConstantDecl {
                continue;
            }
            self.push_type_symbol(child, &child.spelling, SymbolKind::EnumConstant);
            enum_constants.push(EnumConstant {
                position: u32::try_from(enum_constants.len()).unwrap_or(u32::MAX),
                name: child.spelling.clone(),
                value: child.decl.enum_value.unwrap_or_default(),
            });
        }

        self.out.types.push(TypeData {
            symbol,
            kind: TypeKind::Enum,
            underlying_type: None,
            size_bytes: self.tu.size_of(ty),
            alignment: self.tu.align_of(ty),
            is_anonymous: cursor.spelling.is_empty(),
            fields: Vec::new(),
            enum_constants,
        });
    }
}
