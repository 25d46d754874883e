//! Structural C types and their C spelling.
//!
//! Types are built from declaration specifiers plus a declarator and printed
//! back the way a compiler front end prints them: `const char *`,
//! `int (*)(int, char *)`, `unsigned int [4]`.

/// Arithmetic and `void` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `void`
    Void,
    /// `_Bool`
    Bool,
    /// `char`
    Char,
    /// `signed char`
    SChar,
    /// `unsigned char`
    UChar,
    /// `short`
    Short,
    /// `unsigned short`
    UShort,
    /// `int`
    Int,
    /// `unsigned int`
    UInt,
    /// `long`
    Long,
    /// `unsigned long`
    ULong,
    /// `long long`
    LongLong,
    /// `unsigned long long`
    ULongLong,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `long double`
    LongDouble,
}

impl Builtin {
    /// C spelling.
    #[must_use]
    pub fn spelling(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "_Bool",
            Self::Char => "char",
            Self::SChar => "signed char",
            Self::UChar => "unsigned char",
            Self::Short => "short",
            Self::UShort => "unsigned short",
            Self::Int => "int",
            Self::UInt => "unsigned int",
            Self::Long => "long",
            Self::ULong => "unsigned long",
            Self::LongLong => "long long",
            Self::ULongLong => "unsigned long long",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
        }
    }

    /// Size and alignment in bytes on an LP64 target. `void` has neither.
    #[must_use]
    pub fn layout(self) -> Option<(u64, u64)> {
        match self {
            Self::Void => None,
            Self::Bool | Self::Char | Self::SChar | Self::UChar => Some((1, 1)),
            Self::Short | Self::UShort => Some((2, 2)),
            Self::Int | Self::UInt | Self::Float => Some((4, 4)),
            Self::Long | Self::ULong | Self::LongLong | Self::ULongLong | Self::Double => {
                Some((8, 8))
            }
            Self::LongDouble => Some((16, 16)),
        }
    }

    /// Map a single-word primitive type name.
    #[must_use]
    pub fn from_primitive(name: &str) -> Option<Self> {
        match name {
            "void" => Some(Self::Void),
            "_Bool" | "bool" => Some(Self::Bool),
            "char" => Some(Self::Char),
            "short" => Some(Self::Short),
            "int" | "signed" => Some(Self::Int),
            "unsigned" => Some(Self::UInt),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// Combine `signed`/`unsigned`/`short`/`long` modifiers with a base word.
    #[must_use]
    pub fn from_modifiers(
        unsigned: bool,
        signed: bool,
        short: bool,
        longs: usize,
        base: Option<&str>,
    ) -> Self {
        match base {
            Some("char") if unsigned => Self::UChar,
            Some("char") if signed => Self::SChar,
            Some("char") => Self::Char,
            Some("double") if longs > 0 => Self::LongDouble,
            Some("double") => Self::Double,
            Some("float") => Self::Float,
            _ if short => {
                if unsigned {
                    Self::UShort
                } else {
                    Self::Short
                }
            }
            _ if longs >= 2 => {
                if unsigned {
                    Self::ULongLong
                } else {
                    Self::LongLong
                }
            }
            _ if longs == 1 => {
                if unsigned {
                    Self::ULong
                } else {
                    Self::Long
                }
            }
            _ if unsigned => Self::UInt,
            _ => Self::Int,
        }
    }
}

/// `struct` or `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `struct`
    Struct,
    /// `union`
    Union,
}

impl RecordKind {
    /// Keyword spelling.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
        }
    }
}

/// A function type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Return type
    pub ret: CType,
    /// Parameter types, after array and function decay
    pub params: Vec<CType>,
    /// Ends in `...`
    pub variadic: bool,
    /// Declared with a parameter list (`f(void)` rather than `f()`)
    pub has_prototype: bool,
}

/// Shape of a type, without top-level qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    /// Arithmetic type or `void`
    Builtin(Builtin),
    /// Pointer to the inner type
    Pointer(Box<CType>),
    /// Array of the inner type, with its length when known
    Array(Box<CType>, Option<u64>),
    /// Function type
    Function(Box<FunctionType>),
    /// `struct`/`union` by tag
    Record(RecordKind, String),
    /// `enum` by tag
    Enum(String),
    /// Typedef name
    Typedef(String),
    /// Anything the front end cannot model, kept as written
    Unknown(String),
}

/// A possibly qualified C type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CType {
    /// Shape
    pub node: TypeNode,
    /// `const`
    pub is_const: bool,
    /// `volatile`
    pub is_volatile: bool,
}

impl CType {
    /// An unqualified type.
    #[must_use]
    pub fn new(node: TypeNode) -> Self {
        Self {
            node,
            is_const: false,
            is_volatile: false,
        }
    }

    /// An unqualified builtin.
    #[must_use]
    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(TypeNode::Builtin(builtin))
    }

    /// `int`, the type of things the front end could not type.
    #[must_use]
    pub fn int() -> Self {
        Self::builtin(Builtin::Int)
    }

    /// Pointer to `self`.
    #[must_use]
    pub fn pointer_to(self) -> Self {
        Self::new(TypeNode::Pointer(Box::new(self)))
    }

    /// Add qualifiers to this type.
    #[must_use]
    pub fn qualified(mut self, is_const: bool, is_volatile: bool) -> Self {
        self.is_const |= is_const;
        self.is_volatile |= is_volatile;
        self
    }

    /// Parameter adjustment: arrays become pointers, functions become
    /// pointers to functions.
    #[must_use]
    pub fn decayed(self) -> Self {
        match self.node {
            TypeNode::Array(elem, _) => (*elem).pointer_to(),
            TypeNode::Function(_) => self.pointer_to(),
            _ => self,
        }
    }

    /// The function type, if this is one.
    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.node {
            TypeNode::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The type as it would be printed without a declarator.
    #[must_use]
    pub fn spelling(&self) -> String {
        self.spell_with("")
    }

    /// Print the type around a declarator, e.g. `int (*cb)(int)` for `cb`.
    #[must_use]
    pub fn spell_with(&self, declarator: &str) -> String {
        match &self.node {
            TypeNode::Pointer(pointee) => {
                let mut inner = String::from("*");
                let quals = self.qualifier_words();
                inner.push_str(&quals.join(" "));
                if !declarator.is_empty() {
                    if !quals.is_empty() {
                        inner.push(' ');
                    }
                    inner.push_str(declarator);
                }
                if matches!(pointee.node, TypeNode::Array(..) | TypeNode::Function(_)) {
                    inner = format!("({inner})");
                }
                pointee.spell_with(&inner)
            }
            TypeNode::Array(elem, len) => {
                let len = len.map(|n| n.to_string()).unwrap_or_default();
                elem.spell_with(&format!("{declarator}[{len}]"))
            }
            TypeNode::Function(func) => {
                let params = func.parameter_spelling(None);
                func.ret.spell_with(&format!("{declarator}({params})"))
            }
            _ => {
                let mut out = self.qualifier_words().join(" ");
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&self.base_name());
                if !declarator.is_empty() {
                    out.push(' ');
                    out.push_str(declarator);
                }
                out
            }
        }
    }

    fn qualifier_words(&self) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.is_const {
            words.push("const");
        }
        if self.is_volatile {
            words.push("volatile");
        }
        words
    }

    fn base_name(&self) -> String {
        match &self.node {
            TypeNode::Builtin(b) => b.spelling().to_string(),
            TypeNode::Record(kind, name) => format!("{} {name}", kind.keyword()),
            TypeNode::Enum(name) => format!("enum {name}"),
            TypeNode::Typedef(name) | TypeNode::Unknown(name) => name.clone(),
            TypeNode::Pointer(_) | TypeNode::Array(..) | TypeNode::Function(_) => self.spelling(),
        }
    }
}

impl FunctionType {
    /// The text between a function's parentheses.
    ///
    /// With `names`, each parameter is printed around its name.
    #[must_use]
    pub fn parameter_spelling(&self, names: Option<&[String]>) -> String {
        let mut parts: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| match names.and_then(|n| n.get(i)) {
                Some(name) => ty.spell_with(name),
                None => ty.spelling(),
            })
            .collect();
        if self.variadic {
            parts.push("...".to_string());
        }
        if parts.is_empty() && self.has_prototype {
            return "void".to_string();
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(ret: CType, params: Vec<CType>, variadic: bool) -> CType {
        CType::new(TypeNode::Function(Box::new(FunctionType {
            ret,
            params,
            variadic,
            has_prototype: true,
        })))
    }

    #[test]
    fn pointer_to_const_char() {
        let ty = CType::builtin(Builtin::Char).qualified(true, false).pointer_to();
        assert_eq!(ty.spelling(), "const char *");
        assert_eq!(ty.spell_with("name"), "const char *name");
    }

    #[test]
    fn const_pointer_keeps_qualifier_after_star() {
        let ty = CType::builtin(Builtin::Int).pointer_to().qualified(true, false);
        assert_eq!(ty.spelling(), "int *const");
        assert_eq!(ty.spell_with("p"), "int *const p");
    }

    #[test]
    fn function_pointer_is_parenthesized() {
        let ty = func(
            CType::int(),
            vec![CType::int(), CType::builtin(Builtin::Char).pointer_to()],
            false,
        )
        .pointer_to();
        assert_eq!(ty.spelling(), "int (*)(int, char *)");
        assert_eq!(ty.spell_with("cb"), "int (*cb)(int, char *)");
    }

    #[test]
    fn arrays_and_pointers_to_arrays() {
        let arr = CType::new(TypeNode::Array(Box::new(CType::int()), Some(4)));
        assert_eq!(arr.spelling(), "int [4]");
        assert_eq!(arr.spell_with("a"), "int a[4]");
        assert_eq!(arr.pointer_to().spelling(), "int (*)[4]");
    }

    #[test]
    fn empty_prototype_prints_void() {
        let ty = func(CType::builtin(Builtin::Void), Vec::new(), false);
        assert_eq!(ty.spelling(), "void (void)");
        let variadic = func(CType::int(), vec![CType::int()], true);
        assert_eq!(variadic.spell_with("f"), "int f(int, ...)");
    }

    #[test]
    fn modifier_combinations() {
        assert_eq!(
            Builtin::from_modifiers(true, false, false, 0, Some("int")),
            Builtin::UInt
        );
        assert_eq!(Builtin::from_modifiers(true, false, false, 2, None), Builtin::ULongLong);
        assert_eq!(
            Builtin::from_modifiers(false, false, false, 1, Some("double")),
            Builtin::LongDouble
        );
        assert_eq!(
            Builtin::from_modifiers(false, true, false, 0, Some("char")),
            Builtin::SChar
        );
        assert_eq!(Builtin::from_modifiers(false, false, true, 0, None), Builtin::Short);
    }

    #[test]
    fn decay_turns_arrays_into_pointers() {
        let arr = CType::new(TypeNode::Array(Box::new(CType::builtin(Builtin::Char)), None));
        assert_eq!(arr.decayed().spelling(), "char *");
    }
}
