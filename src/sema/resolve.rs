use crate::frontend::ast::{ArrayLen, BinaryOp, Expr, ExprKind, FuncTypeExpr, InterfaceElem, TypeExpr, TypeExprKind};
use crate::frontend::parser::parse_int_lit;

use super::types::{BasicKind, Field, Method, NamedType, Signature, Type, TypeDefs};
use super::{FileId, ImportTarget, Member, Package, SourceFile};

const MAX_ALIAS_DEPTH: usize = 32;

/// Type names visible in a function body, consulted before package scope.
pub trait LocalTypes {
    fn local_type(&self, name: &str) -> Option<Type>;
}

pub struct NoLocals;

impl LocalTypes for NoLocals {
    fn local_type(&self, _name: &str) -> Option<Type> {
        None
    }
}

pub const NO_LOCALS: &NoLocals = &NoLocals;

/// Turns syntactic type expressions into semantic types in the context of one file.
pub struct Resolver<'a> {
    packages: &'a [Package],
    files: &'a [SourceFile],
    types: &'a TypeDefs,
}

impl<'a> Resolver<'a> {
    pub fn new(packages: &'a [Package], files: &'a [SourceFile], types: &'a TypeDefs) -> Self {
        Resolver { packages, files, types }
    }

    pub fn resolve(&self, file: FileId, ty: &TypeExpr, locals: &dyn LocalTypes) -> Type {
        self.resolve_in(file, ty, locals, 0)
    }

    pub fn resolve_signature(&self, file: FileId, sig: &FuncTypeExpr, locals: &dyn LocalTypes) -> Signature {
        self.signature_in(file, sig, locals, 0)
    }

    fn resolve_in(&self, file: FileId, ty: &TypeExpr, locals: &dyn LocalTypes, depth: usize) -> Type {
        let elem = |inner: &TypeExpr| Box::new(self.resolve_in(file, inner, locals, depth));
        match &ty.kind {
            TypeExprKind::Name(ident) => self
                .name_in(file, &ident.name, locals, depth)
                .unwrap_or(Type::Invalid),
            TypeExprKind::Qualified { package, name } => self
                .qualified_in(file, &package.name, &name.name, depth)
                .unwrap_or(Type::Invalid),
            TypeExprKind::Pointer(inner) => Type::Pointer(elem(inner)),
            TypeExprKind::Slice(inner) => Type::Slice(elem(inner)),
            TypeExprKind::Array { len, elem: inner } => match array_len(len) {
                Some(n) => Type::Array(elem(inner), n),
                None => Type::Invalid,
            },
            TypeExprKind::Map { key, value } => Type::Map(elem(key), elem(value)),
            TypeExprKind::Chan { dir, elem: inner } => Type::Chan(*dir, elem(inner)),
            TypeExprKind::Func(sig) => Type::Signature(self.signature_in(file, sig, locals, depth)),
            TypeExprKind::Struct(fields) => {
                let mut out = Vec::new();
                for field in fields {
                    let field_ty = self.resolve_in(file, &field.ty, locals, depth);
                    if field.embedded {
                        out.push(Field {
                            name: embedded_name(&field.ty).to_string(),
                            ty: field_ty,
                            embedded: true,
                            tag: field.tag.clone(),
                        });
                        continue;
                    }
                    for name in &field.names {
                        out.push(Field {
                            name: name.name.clone(),
                            ty: field_ty.clone(),
                            embedded: false,
                            tag: field.tag.clone(),
                        });
                    }
                }
                Type::Struct(out)
            }
            TypeExprKind::Interface(elems) => {
                let mut methods: Vec<Method> = Vec::new();
                for elem in elems {
                    match elem {
                        InterfaceElem::Method { name, sig } => methods.push(Method {
                            name: name.name.clone(),
                            sig: self.signature_in(file, sig, locals, depth),
                        }),
                        InterfaceElem::Embedded(inner) => {
                            let embedded = self.resolve_in(file, inner, locals, depth);
                            if let Some(Type::Interface(inner_methods)) = self.types.underlying(&embedded) {
                                methods.extend(inner_methods);
                            }
                        }
                    }
                }
                methods.sort_by(|a, b| a.name.cmp(&b.name));
                methods.dedup_by(|a, b| a.name == b.name);
                Type::Interface(methods)
            }
        }
    }

    fn signature_in(&self, file: FileId, sig: &FuncTypeExpr, locals: &dyn LocalTypes, depth: usize) -> Signature {
        let flatten = |groups: &[crate::frontend::ast::ParamGroup]| {
            let mut out = Vec::new();
            for group in groups {
                let ty = self.resolve_in(file, &group.ty, locals, depth);
                let count = group.names.len().max(1);
                out.extend(std::iter::repeat(ty).take(count));
            }
            out
        };
        let mut params = flatten(&sig.params);
        if sig.is_variadic {
            if let Some(last) = params.pop() {
                params.push(Type::Slice(Box::new(last)));
            }
        }
        Signature {
            params,
            results: flatten(&sig.results),
            variadic: sig.is_variadic,
        }
    }

    fn name_in(&self, file: FileId, name: &str, locals: &dyn LocalTypes, depth: usize) -> Option<Type> {
        if let Some(ty) = locals.local_type(name) {
            return Some(ty);
        }
        let package = &self.packages[self.files.get(file)?.package];
        if let Some(ty) = self.member_type(package, name, depth) {
            return Some(ty);
        }
        universe_type(name)
    }

    fn qualified_in(&self, file: FileId, pkg: &str, name: &str, depth: usize) -> Option<Type> {
        match self.files.get(file)?.import_named(pkg)? {
            ImportTarget::Loaded(pid) => self.member_type(&self.packages[*pid], name, depth),
            ImportTarget::Opaque(path) if path == "unsafe" && name == "Pointer" => {
                Some(Type::Basic(BasicKind::UnsafePointer))
            }
            ImportTarget::Opaque(path) => Some(Type::Named(NamedType {
                namespace: path.clone(),
                name: name.to_string(),
                id: None,
                local: None,
            })),
        }
    }

    fn member_type(&self, package: &Package, name: &str, depth: usize) -> Option<Type> {
        match package.scope.get(name)? {
            Member::Type(id) => self.types.named_type(*id),
            Member::Alias { file, expr } if depth < MAX_ALIAS_DEPTH => {
                Some(self.resolve_in(*file, expr, NO_LOCALS, depth + 1))
            }
            _ => None,
        }
    }
}

/// Predeclared type names.
pub fn universe_type(name: &str) -> Option<Type> {
    match name {
        "error" => Some(Type::error()),
        "any" => Some(Type::empty_interface()),
        _ => BasicKind::from_name(name).map(Type::Basic),
    }
}

/// Field name introduced by an embedded field: the type name without qualifier or pointer.
pub fn embedded_name(ty: &TypeExpr) -> &str {
    match &ty.kind {
        TypeExprKind::Name(ident) => &ident.name,
        TypeExprKind::Qualified { name, .. } => &name.name,
        TypeExprKind::Pointer(inner) => embedded_name(inner),
        _ => "",
    }
}

fn array_len(len: &ArrayLen) -> Option<u64> {
    match len {
        ArrayLen::Lit(n) => Some(*n),
        ArrayLen::Ellipsis => None,
        ArrayLen::Expr(expr) => const_int(expr),
    }
}

/// Evaluates integer constant expressions built from literals.
pub fn const_int(expr: &Expr) -> Option<u64> {
    match &expr.kind {
        ExprKind::Int(text) => parse_int_lit(text),
        ExprKind::Paren(inner) => const_int(inner),
        ExprKind::Binary { op, left, right } => {
            let (l, r) = (const_int(left)?, const_int(right)?);
            match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Div => l.checked_div(r),
                BinaryOp::Rem => l.checked_rem(r),
                BinaryOp::Shl => u32::try_from(r).ok().and_then(|r| l.checked_shl(r)),
                BinaryOp::Shr => u32::try_from(r).ok().and_then(|r| l.checked_shr(r)),
                BinaryOp::BitAnd => Some(l & r),
                BinaryOp::BitOr => Some(l | r),
                BinaryOp::BitXor => Some(l ^ r),
                BinaryOp::BitClear => Some(l & !r),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::sema::{Program, SourceInput};
    use crate::sema::types::Type;
    use std::path::PathBuf;

    fn load(source: &str) -> Program {
        Program::load(
            vec![SourceInput {
                path: PathBuf::from("p/p.go"),
                source: source.to_string(),
            }],
            "+tsgen typevar",
        )
        .expect("load")
    }

    fn underlying_of(program: &Program, name: &str) -> Type {
        let id = program.types.lookup("p", name).expect("declared");
        let named = program.types.named_type(id).expect("named");
        program.types.underlying(&named).expect("underlying")
    }

    #[test]
    fn resolves_composite_shapes_and_aliases() {
        let program = load(
            "package p\nimport \"io\"\ntype Alias = map[string][]*io.Reader\ntype S struct {\n\tio.Writer\n\ta, b Alias\n\tc [2 * 4]chan<- int\n}\n",
        );
        assert_eq!(
            underlying_of(&program, "S").identity(),
            "struct{io.Writer; a map[string][]*io.Reader; b map[string][]*io.Reader; c [8]chan<- int}"
        );
    }

    #[test]
    fn flattens_embedded_interfaces_sorted() {
        let program = load(
            "package p\ntype R interface{ Read() int }\ntype RW interface {\n\tWrite(s string)\n\tR\n}\n",
        );
        match underlying_of(&program, "RW") {
            Type::Interface(methods) => {
                let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, vec!["Read", "Write"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn variadic_signatures_end_in_a_slice() {
        let program = load("package p\nfunc F(format string, args ...any) {}\n");
        let sig = &program.funcs[0].sig;
        assert!(sig.variadic);
        assert_eq!(
            Type::Signature(sig.clone()).identity(),
            "func(string, ...interface{})"
        );
    }

    #[test]
    fn self_referential_aliases_do_not_loop() {
        let program = load("package p\ntype A = B\ntype B = A\ntype T struct{ x A }\n");
        assert!(underlying_of(&program, "T").contains_invalid());
    }
}
