use std::collections::HashMap;
use std::fmt;

use crate::frontend::ast::ChanDir;

pub type TypeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    /// Predeclared type names; `byte` and `rune` are aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" | "rune" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" | "byte" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "uintptr" => Self::Uintptr,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "complex64" => Self::Complex64,
            "complex128" => Self::Complex128,
            "string" => Self::String,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::String => "string",
            Self::UnsafePointer => "unsafe.Pointer",
            Self::UntypedBool => "untyped bool",
            Self::UntypedInt => "untyped int",
            Self::UntypedRune => "untyped rune",
            Self::UntypedFloat => "untyped float",
            Self::UntypedComplex => "untyped complex",
            Self::UntypedString => "untyped string",
            Self::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            Self::UntypedBool
                | Self::UntypedInt
                | Self::UntypedRune
                | Self::UntypedFloat
                | Self::UntypedComplex
                | Self::UntypedString
                | Self::UntypedNil
        )
    }

    /// The type an untyped constant takes when it needs one.
    pub fn default_kind(self) -> Self {
        match self {
            Self::UntypedBool => Self::Bool,
            Self::UntypedInt => Self::Int,
            Self::UntypedRune => Self::Int32,
            Self::UntypedFloat => Self::Float64,
            Self::UntypedComplex => Self::Complex128,
            Self::UntypedString => Self::String,
            other => other,
        }
    }

    fn untyped_rank(self) -> u8 {
        match self {
            Self::UntypedInt => 1,
            Self::UntypedRune => 2,
            Self::UntypedFloat => 3,
            Self::UntypedComplex => 4,
            _ => 0,
        }
    }
}

/// A defined type. `id` is `None` for `error` and for types of packages
/// that were not loaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub namespace: String,
    pub name: String,
    pub id: Option<TypeId>,
    /// Right-hand side of a type declared inside a function body. Such types
    /// have no name outside their function.
    pub local: Option<Box<Type>>,
}

impl NamedType {
    pub fn qualified(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn is_error(&self) -> bool {
        self.namespace.is_empty() && self.name == "error" && self.id.is_none() && self.local.is_none()
    }

    /// Declared in a package that was not loaded; nothing is known about it.
    pub fn is_opaque(&self) -> bool {
        self.id.is_none() && self.local.is_none() && !self.is_error()
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
    pub tag: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    pub sig: Signature,
}

/// A function signature. For variadic signatures the last parameter is a slice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

impl Signature {
    /// Type of the parameter receiving argument `pos`, spreading the variadic tail.
    pub fn param_type_at(&self, pos: usize, spread: bool) -> Option<Type> {
        let last = self.params.len().checked_sub(1)?;
        if self.variadic && pos >= last {
            if spread {
                return (pos == last).then(|| self.params[last].clone());
            }
            return match &self.params[last] {
                Type::Slice(elem) => Some((**elem).clone()),
                other => Some(other.clone()),
            };
        }
        self.params.get(pos).cloned()
    }

    pub fn result_type(&self) -> Option<Type> {
        match self.results.len() {
            0 => None,
            1 => Some(self.results[0].clone()),
            _ => Some(Type::Tuple(self.results.clone())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(BasicKind),
    Named(NamedType),
    Pointer(Box<Type>),
    Array(Box<Type>, u64),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Signature(Signature),
    Struct(Vec<Field>),
    Tuple(Vec<Type>),
    /// Methods sorted by name with embedded interfaces flattened.
    Interface(Vec<Method>),
    /// A type expression that could not be resolved.
    Invalid,
}

impl Type {
    pub fn error() -> Type {
        Type::Named(NamedType {
            namespace: String::new(),
            name: "error".to_string(),
            id: None,
            local: None,
        })
    }

    pub fn error_underlying() -> Type {
        Type::Interface(vec![Method {
            name: "Error".to_string(),
            sig: Signature {
                params: Vec::new(),
                results: vec![Type::Basic(BasicKind::String)],
                variadic: false,
            },
        }])
    }

    pub fn empty_interface() -> Type {
        Type::Interface(Vec::new())
    }

    pub fn named(&self) -> Option<&NamedType> {
        match self {
            Type::Named(named) => Some(named),
            _ => None,
        }
    }

    pub fn is_untyped_nil(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::UntypedNil))
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(kind) if kind.is_untyped())
    }

    /// Untyped constants become their default type; everything else is unchanged.
    pub fn defaulted(self) -> Type {
        match self {
            Type::Basic(kind) => Type::Basic(kind.default_kind()),
            other => other,
        }
    }

    /// The wider of two untyped constant kinds, as in `1 + 2.0`.
    pub fn untyped_join(a: BasicKind, b: BasicKind) -> BasicKind {
        if a.untyped_rank() >= b.untyped_rank() {
            a
        } else {
            b
        }
    }

    pub fn contains_invalid(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Basic(_) | Type::Named(_) => false,
            Type::Pointer(elem) | Type::Array(elem, _) | Type::Slice(elem) | Type::Chan(_, elem) => {
                elem.contains_invalid()
            }
            Type::Map(key, value) => key.contains_invalid() || value.contains_invalid(),
            Type::Signature(sig) => sig
                .params
                .iter()
                .chain(&sig.results)
                .any(Type::contains_invalid),
            Type::Struct(fields) => fields.iter().any(|f| f.ty.contains_invalid()),
            Type::Tuple(items) => items.iter().any(Type::contains_invalid),
            Type::Interface(methods) => methods.iter().any(|m| {
                m.sig
                    .params
                    .iter()
                    .chain(&m.sig.results)
                    .any(Type::contains_invalid)
            }),
        }
    }

    /// Whether a type declared inside a function body occurs anywhere in the type.
    pub fn contains_local(&self) -> bool {
        match self {
            Type::Named(named) => named.is_local(),
            Type::Invalid | Type::Basic(_) => false,
            Type::Pointer(elem) | Type::Array(elem, _) | Type::Slice(elem) | Type::Chan(_, elem) => {
                elem.contains_local()
            }
            Type::Map(key, value) => key.contains_local() || value.contains_local(),
            Type::Signature(sig) => sig.params.iter().chain(&sig.results).any(Type::contains_local),
            Type::Struct(fields) => fields.iter().any(|f| f.ty.contains_local()),
            Type::Tuple(items) => items.iter().any(Type::contains_local),
            Type::Interface(methods) => methods
                .iter()
                .any(|m| m.sig.params.iter().chain(&m.sig.results).any(Type::contains_local)),
        }
    }

    /// Type-identity string: named types are namespace-qualified.
    pub fn identity(&self) -> String {
        self.pretty().to_string()
    }

    #[inline]
    pub fn pretty(&self) -> TypePretty<'_> {
        TypePretty(self)
    }

    /// Renders the type as Go source, asking `qualify` for each named type's prefix.
    pub fn render_with(&self, qualify: &mut dyn FnMut(&NamedType) -> Option<String>) -> String {
        let mut out = String::new();
        write_type(self, &mut out, qualify);
        out
    }
}

pub struct TypePretty<'a>(pub &'a Type);

impl fmt::Display for TypePretty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut qualify = |named: &NamedType| {
            (!named.namespace.is_empty()).then(|| named.namespace.clone())
        };
        f.write_str(&self.0.render_with(&mut qualify))
    }
}

fn write_type(ty: &Type, out: &mut String, qualify: &mut dyn FnMut(&NamedType) -> Option<String>) {
    match ty {
        Type::Basic(kind) => out.push_str(kind.name()),
        Type::Named(named) => {
            if let Some(prefix) = qualify(named) {
                out.push_str(&prefix);
                out.push('.');
            }
            out.push_str(&named.name);
        }
        Type::Pointer(elem) => {
            out.push('*');
            write_type(elem, out, qualify);
        }
        Type::Array(elem, len) => {
            out.push_str(&format!("[{}]", len));
            write_type(elem, out, qualify);
        }
        Type::Slice(elem) => {
            out.push_str("[]");
            write_type(elem, out, qualify);
        }
        Type::Map(key, value) => {
            out.push_str("map[");
            write_type(key, out, qualify);
            out.push(']');
            write_type(value, out, qualify);
        }
        Type::Chan(dir, elem) => {
            out.push_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            });
            // chan (<-chan T) must keep its parentheses
            let needs_parens = *dir == ChanDir::Both && matches!(**elem, Type::Chan(ChanDir::Recv, _));
            if needs_parens {
                out.push('(');
            }
            write_type(elem, out, qualify);
            if needs_parens {
                out.push(')');
            }
        }
        Type::Signature(sig) => {
            out.push_str("func");
            write_signature(sig, out, qualify);
        }
        Type::Struct(fields) => {
            out.push_str("struct{");
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                if !field.embedded {
                    out.push_str(&field.name);
                    out.push(' ');
                }
                write_type(&field.ty, out, qualify);
                if let Some(tag) = &field.tag {
                    out.push_str(&format!(" {:?}", tag));
                }
            }
            out.push('}');
        }
        Type::Tuple(items) => {
            out.push('(');
            write_list(items, out, qualify);
            out.push(')');
        }
        Type::Interface(methods) => {
            out.push_str("interface{");
            for (i, method) in methods.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                out.push_str(&method.name);
                write_signature(&method.sig, out, qualify);
            }
            out.push('}');
        }
        Type::Invalid => out.push_str("invalid type"),
    }
}

fn write_list(items: &[Type], out: &mut String, qualify: &mut dyn FnMut(&NamedType) -> Option<String>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_type(item, out, qualify);
    }
}

fn write_signature(sig: &Signature, out: &mut String, qualify: &mut dyn FnMut(&NamedType) -> Option<String>) {
    out.push('(');
    for (i, param) in sig.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let is_last = i + 1 == sig.params.len();
        match param {
            Type::Slice(elem) if sig.variadic && is_last => {
                out.push_str("...");
                write_type(elem, out, qualify);
            }
            other => write_type(other, out, qualify),
        }
    }
    out.push(')');
    match sig.results.as_slice() {
        [] => {}
        [single] if !matches!(single, Type::Tuple(_)) => {
            out.push(' ');
            write_type(single, out, qualify);
        }
        many => {
            out.push_str(" (");
            write_list(many, out, qualify);
            out.push(')');
        }
    }
}

/// A package-level (or function-local) defined type.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub named: NamedType,
    /// The resolved right-hand side of the declaration; may itself be named.
    pub rhs: Type,
}

#[derive(Clone, Debug, Default)]
pub struct TypeDefs {
    defs: Vec<TypeDef>,
    by_name: HashMap<(String, String), TypeId>,
}

impl TypeDefs {
    /// Registers a new defined type whose right-hand side is resolved later.
    pub fn declare(&mut self, namespace: &str, name: &str) -> TypeId {
        let id = self.defs.len();
        let named = NamedType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            id: Some(id),
            local: None,
        };
        self.defs.push(TypeDef {
            named,
            rhs: Type::Invalid,
        });
        self.by_name
            .entry((namespace.to_string(), name.to_string()))
            .or_insert(id);
        id
    }

    pub fn set_rhs(&mut self, id: TypeId, rhs: Type) {
        if let Some(def) = self.defs.get_mut(id) {
            def.rhs = rhs;
        }
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.defs.get(id)
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<TypeId> {
        self.by_name
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }

    pub fn named_type(&self, id: TypeId) -> Option<Type> {
        self.defs.get(id).map(|def| Type::Named(def.named.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Follows named types to their underlying type. Opaque named types and
    /// declaration cycles yield `None`.
    pub fn underlying(&self, ty: &Type) -> Option<Type> {
        let mut cur = ty.clone();
        let mut steps = 0;
        loop {
            match cur {
                Type::Named(named) => {
                    if named.is_error() {
                        return Some(Type::error_underlying());
                    }
                    if let Some(rhs) = named.local {
                        cur = *rhs;
                        continue;
                    }
                    steps += 1;
                    if steps > self.defs.len() {
                        return None;
                    }
                    let def = self.defs.get(named.id?)?;
                    cur = def.rhs.clone();
                }
                Type::Invalid => return None,
                other => return Some(other),
            }
        }
    }

    pub fn is_interface(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Some(Type::Interface(_)))
    }
}
