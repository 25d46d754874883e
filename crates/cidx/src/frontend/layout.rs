//! Type table of a translation unit and LP64 layout rules.
//!
//! The table knows every typedef, record and enum the front end saw (main
//! file and parsed headers) plus the typedefs of the standard headers, and
//! answers size, alignment and field offset queries the way an LP64 System V
//! compiler lays structures out, bitfields included.

use std::collections::HashMap;

use super::ctype::{Builtin, CType, RecordKind, TypeNode};

/// Nesting limit when laying out records that contain records.
const MAX_LAYOUT_DEPTH: usize = 64;

/// Typedefs provided by `<stddef.h>`, `<stdint.h>` and friends, which the
/// front end does not parse.
const STANDARD_TYPEDEFS: &[(&str, Builtin)] = &[
    ("size_t", Builtin::ULong),
    ("ssize_t", Builtin::Long),
    ("ptrdiff_t", Builtin::Long),
    ("intptr_t", Builtin::Long),
    ("uintptr_t", Builtin::ULong),
    ("intmax_t", Builtin::Long),
    ("uintmax_t", Builtin::ULong),
    ("off_t", Builtin::Long),
    ("wchar_t", Builtin::Int),
    ("char8_t", Builtin::UChar),
    ("char16_t", Builtin::UShort),
    ("char32_t", Builtin::UInt),
    ("int8_t", Builtin::SChar),
    ("int16_t", Builtin::Short),
    ("int32_t", Builtin::Int),
    ("int64_t", Builtin::Long),
    ("uint8_t", Builtin::UChar),
    ("uint16_t", Builtin::UShort),
    ("uint32_t", Builtin::UInt),
    ("uint64_t", Builtin::ULong),
    ("max_align_t", Builtin::LongDouble),
];

/// A member of a record as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Member name, `None` for unnamed bitfields and anonymous members
    pub name: Option<String>,
    /// Declared type
    pub ty: CType,
    /// Bit width for bitfields
    pub bit_width: Option<u32>,
}

/// Computed placement of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// `sizeof` in bytes, `None` when a member has unknown size
    pub size: Option<u64>,
    /// Alignment in bytes
    pub align: Option<u64>,
    /// Offset of each field in bits, parallel to the field list
    pub offsets_bits: Vec<Option<u64>>,
    /// Storage size of each field in bits
    pub sizes_bits: Vec<Option<u64>>,
}

/// Everything known about named types in one translation unit.
#[derive(Debug, Default)]
pub struct TypeTable {
    typedefs: HashMap<String, CType>,
    records: HashMap<(RecordKind, String), Vec<FieldDef>>,
    constants: HashMap<String, i64>,
}

impl TypeTable {
    /// An empty table that already knows the standard typedefs.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self::default();
        for (name, builtin) in STANDARD_TYPEDEFS {
            table
                .typedefs
                .insert((*name).to_string(), CType::builtin(*builtin));
        }
        table
    }

    /// Record a typedef. Later definitions replace earlier ones.
    pub fn add_typedef(&mut self, name: &str, ty: CType) {
        self.typedefs.insert(name.to_string(), ty);
    }

    /// Record a complete struct or union.
    pub fn add_record(&mut self, kind: RecordKind, name: &str, fields: Vec<FieldDef>) {
        self.records.insert((kind, name.to_string()), fields);
    }

    /// Record the value of an enumerator.
    pub fn add_constant(&mut self, name: &str, value: i64) {
        self.constants.insert(name.to_string(), value);
    }

    /// The type a typedef name stands for, one hop.
    #[must_use]
    pub fn typedef_target(&self, name: &str) -> Option<&CType> {
        self.typedefs.get(name)
    }

    /// Whether `name` is a typedef known to this translation unit.
    #[must_use]
    pub fn is_typedef(&self, name: &str) -> bool {
        self.typedefs.contains_key(name)
    }

    /// Value of an enumerator.
    #[must_use]
    pub fn constant(&self, name: &str) -> Option<i64> {
        self.constants.get(name).copied()
    }

    /// `sizeof(ty)` in bytes.
    #[must_use]
    pub fn size_of(&self, ty: &CType) -> Option<u64> {
        self.layout_of(ty, 0).map(|(size, _)| size)
    }

    /// `_Alignof(ty)` in bytes.
    #[must_use]
    pub fn align_of(&self, ty: &CType) -> Option<u64> {
        self.layout_of(ty, 0).map(|(_, align)| align)
    }

    /// Layout of a complete record, `None` if the record is unknown.
    #[must_use]
    pub fn record_layout(&self, kind: RecordKind, name: &str) -> Option<RecordLayout> {
        self.compute_record(kind, name, 0)
    }

    fn layout_of(&self, ty: &CType, depth: usize) -> Option<(u64, u64)> {
        if depth > MAX_LAYOUT_DEPTH {
            return None;
        }
        match &ty.node {
            TypeNode::Builtin(b) => b.layout(),
            TypeNode::Pointer(_) => Some((8, 8)),
            TypeNode::Array(elem, len) => {
                let (size, align) = self.layout_of(elem, depth + 1)?;
                Some((size * len.unwrap_or(0), align))
            }
            TypeNode::Function(_) | TypeNode::Unknown(_) => None,
            TypeNode::Enum(_) => Some((4, 4)),
            TypeNode::Typedef(name) => {
                let target = self.typedefs.get(name)?;
                self.layout_of(target, depth + 1)
            }
            TypeNode::Record(kind, name) => {
                let layout = self.compute_record(*kind, name, depth + 1)?;
                Some((layout.size?, layout.align?))
            }
        }
    }

    fn compute_record(&self, kind: RecordKind, name: &str, depth: usize) -> Option<RecordLayout> {
        if depth > MAX_LAYOUT_DEPTH {
            return None;
        }
        let fields = self.records.get(&(kind, name.to_string()))?;

        let mut offsets_bits = Vec::with_capacity(fields.len());
        let mut sizes_bits = Vec::with_capacity(fields.len());
        let mut cursor_bits: Option<u64> = Some(0);
        let mut extent_bits: Option<u64> = Some(0);
        let mut record_align: u64 = 1;

        for field in fields {
            let Some((size, align)) = self.layout_of(&field.ty, depth + 1) else {
                offsets_bits.push(None);
                sizes_bits.push(field.bit_width.map(u64::from));
                cursor_bits = None;
                extent_bits = None;
                continue;
            };
            let unit_bits = size * 8;
            let align_bits = align * 8;

            let offset = match (kind, field.bit_width) {
                (RecordKind::Union, _) => Some(0),
                (RecordKind::Struct, Some(0)) => cursor_bits.map(|c| align_up(c, align_bits)),
                (RecordKind::Struct, Some(width)) => cursor_bits.map(|c| {
                    let width = u64::from(width);
                    let straddles = unit_bits > 0 && c / unit_bits != (c + width - 1) / unit_bits;
                    if straddles {
                        align_up(c, align_bits)
                    } else {
                        c
                    }
                }),
                (RecordKind::Struct, None) => cursor_bits.map(|c| align_up(c, align_bits)),
            };

            let storage_bits = match field.bit_width {
                Some(width) => u64::from(width),
                None => unit_bits,
            };
            // Zero-width bitfields only realign; they are not members.
            if field.bit_width != Some(0) {
                record_align = record_align.max(align);
            }

            offsets_bits.push(offset);
            sizes_bits.push(Some(storage_bits));

            if kind == RecordKind::Struct {
                cursor_bits = offset.map(|o| o + storage_bits);
                extent_bits = cursor_bits;
            } else {
                extent_bits = extent_bits.map(|e| e.max(storage_bits));
            }
        }

        let size = extent_bits.map(|bits| align_up(bits, record_align * 8) / 8);
        Some(RecordLayout {
            size,
            align: Some(record_align),
            offsets_bits,
            sizes_bits,
        })
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn field(name: &str, ty: CType) -> FieldDef {
        FieldDef {
            name: Some(name.to_string()),
            ty,
            bit_width: None,
        }
    }

    fn bits(name: &str, ty: CType, width: u32) -> FieldDef {
        FieldDef {
            name: Some(name.to_string()),
            ty,
            bit_width: Some(width),
        }
    }

    #[test]
    fn struct_members_are_padded_to_alignment() {
        let mut table = TypeTable::new();
        table.add_record(
            RecordKind::Struct,
            "s",
            vec![
                field("c", CType::builtin(Builtin::Char)),
                field("i", CType::int()),
                field("d", CType::builtin(Builtin::Double)),
            ],
        );

        let layout = table.record_layout(RecordKind::Struct, "s").expect("layout");
        assert_eq!(layout.offsets_bits, vec![Some(0), Some(32), Some(64)]);
        assert_eq!(layout.size, Some(16));
        assert_eq!(layout.align, Some(8));
    }

    #[test]
    fn union_size_is_largest_member() {
        let mut table = TypeTable::new();
        table.add_record(
            RecordKind::Union,
            "u",
            vec![
                field("c", CType::builtin(Builtin::Char)),
                field("l", CType::builtin(Builtin::Long)),
            ],
        );
        let layout = table.record_layout(RecordKind::Union, "u").expect("layout");
        assert_eq!(layout.offsets_bits, vec![Some(0), Some(0)]);
        assert_eq!(layout.size, Some(8));
    }

    #[test]
    fn bitfields_pack_until_they_straddle_a_unit() {
        let mut table = TypeTable::new();
        table.add_record(
            RecordKind::Struct,
            "flags",
            vec![
                bits("a", CType::builtin(Builtin::UInt), 3),
                bits("b", CType::builtin(Builtin::UInt), 30),
                bits("c", CType::builtin(Builtin::UInt), 2),
            ],
        );
        let layout = table.record_layout(RecordKind::Struct, "flags").expect("layout");
        assert_eq!(layout.offsets_bits, vec![Some(0), Some(32), Some(62)]);
        assert_eq!(layout.sizes_bits, vec![Some(3), Some(30), Some(2)]);
        assert_eq!(layout.size, Some(8));
    }

    #[test]
    fn nested_records_and_typedefs_resolve() {
        let mut table = TypeTable::new();
        table.add_record(
            RecordKind::Struct,
            "inner",
            vec![field("x", CType::builtin(Builtin::Short))],
        );
        table.add_typedef(
            "inner_t",
            CType::new(TypeNode::Record(RecordKind::Struct, "inner".into())),
        );
        table.add_record(
            RecordKind::Struct,
            "outer",
            vec![
                field("c", CType::builtin(Builtin::Char)),
                field("in", CType::new(TypeNode::Typedef("inner_t".into()))),
            ],
        );
        let layout = table.record_layout(RecordKind::Struct, "outer").expect("layout");
        assert_eq!(layout.offsets_bits, vec![Some(0), Some(16)]);
        assert_eq!(layout.size, Some(4));
    }

    #[test]
    fn unknown_member_type_leaves_size_unknown() {
        let mut table = TypeTable::new();
        table.add_record(
            RecordKind::Struct,
            "opaque",
            vec![
                field("a", CType::int()),
                field("b", CType::new(TypeNode::Typedef("mystery_t".into()))),
            ],
        );
        let layout = table.record_layout(RecordKind::Struct, "opaque").expect("layout");
        assert_eq!(layout.offsets_bits, vec![Some(0), None]);
        assert_eq!(layout.size, None);
    }

    #[rstest]
    #[case("uint8_t", 1)]
    #[case("uint32_t", 4)]
    #[case("size_t", 8)]
    #[case("int64_t", 8)]
    fn standard_typedefs_have_lp64_sizes(#[case] name: &str, #[case] size: u64) {
        let table = TypeTable::new();
        let ty = CType::new(TypeNode::Typedef(name.to_string()));
        assert_eq!(table.size_of(&ty), Some(size));
    }
}
