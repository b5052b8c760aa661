// Purpose: Static typing of function bodies in one walk with a lexical scope stack.
// Inputs/Outputs: Takes a loaded program and a function id; records resolved calls with argument types, plus functions used as values.
// Invariants: Type errors are never reported; whatever cannot be typed stays unknown.

use std::collections::HashMap;

use crate::frontend::ast::{
    ArrayLen, Block, Expr, ExprKind, FuncTypeExpr, Ident, KeyedElement, ParamGroup, Stmt, TypeExpr,
    TypeExprKind, TypeSwitchStmt, UnaryOp, VarSpec,
};
use crate::frontend::ast::{BinaryOp, Span};

use super::resolve::{const_int, universe_type, LocalTypes, NO_LOCALS};
use super::types::{BasicKind, NamedType, Signature, Type};
use super::{FileId, FuncId, ImportTarget, Member, PackageId, Program};

/// One statically resolved call.
#[derive(Clone, Debug)]
pub struct CallSite {
    /// More than one when the callee is a variable bound to several functions.
    pub callees: Vec<FuncId>,
    /// Static type of each argument; `None` when unknown.
    pub args: Vec<Option<Type>>,
    /// The call passes its last argument with `...`.
    pub spread: bool,
    pub span: Span,
}

#[derive(Clone, Debug, Default)]
pub struct FuncFacts {
    /// In source order of the call expressions.
    pub calls: Vec<CallSite>,
    /// Functions used as values rather than called.
    pub refs: Vec<FuncId>,
}

/// Computes the call facts of one declared function, closures included.
pub fn check_function(program: &Program, func: FuncId) -> FuncFacts {
    let (Some(info), Some(decl)) = (program.funcs.get(func), program.func_decl(func)) else {
        return FuncFacts::default();
    };
    let mut checker = Checker::new(program, info.file);
    checker.push_scope();
    if let (Some(recv), Some(name)) = (info.recv, decl.recv.as_ref().and_then(|r| r.name.as_ref())) {
        if let Some(named) = program.types.named_type(recv.type_id) {
            let ty = if recv.pointer {
                Type::Pointer(Box::new(named))
            } else {
                named
            };
            checker.bind_var(name, Some(ty), Vec::new());
        }
    }
    checker.bind_signature(&decl.sig, &info.sig);
    if let Some(body) = &decl.body {
        checker.stmts(&body.stmts);
    }
    checker.facts
}

/// Static types of the names a package-level `var` or `const` spec declares.
pub fn value_spec_types(program: &Program, file: FileId, spec: &VarSpec, is_const: bool) -> Vec<Option<Type>> {
    let mut checker = Checker::new(program, file);
    checker.spec_types(spec, is_const).into_iter().map(|(ty, _)| ty).collect()
}

#[derive(Clone, Debug)]
enum Local {
    Var { ty: Option<Type>, funcs: Vec<FuncId> },
    Type(Type),
}

struct Scopes<'s>(&'s [HashMap<String, Local>]);

impl LocalTypes for Scopes<'_> {
    fn local_type(&self, name: &str) -> Option<Type> {
        self.0.iter().rev().find_map(|scope| scope.get(name)).and_then(|local| match local {
            Local::Type(ty) => Some(ty.clone()),
            Local::Var { .. } => None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "append" => Builtin::Append,
            "cap" => Builtin::Cap,
            "clear" => Builtin::Clear,
            "close" => Builtin::Close,
            "complex" => Builtin::Complex,
            "copy" => Builtin::Copy,
            "delete" => Builtin::Delete,
            "imag" => Builtin::Imag,
            "len" => Builtin::Len,
            "make" => Builtin::Make,
            "max" => Builtin::Max,
            "min" => Builtin::Min,
            "new" => Builtin::New,
            "panic" => Builtin::Panic,
            "print" => Builtin::Print,
            "println" => Builtin::Println,
            "real" => Builtin::Real,
            "recover" => Builtin::Recover,
            _ => return None,
        };
        Some(builtin)
    }
}

#[derive(Clone, Debug)]
enum Operand {
    Value(Option<Type>),
    Func { ty: Option<Type>, targets: Vec<FuncId> },
    TypeName(Type),
    Package(ImportTarget),
    Builtin(Builtin),
    /// `pkg.Name` of a package that was not loaded: a type or a value.
    OpaqueMember(NamedType),
    /// Result of a call with no results.
    Void,
}

impl Operand {
    fn ty(&self) -> Option<Type> {
        match self {
            Operand::Value(ty) | Operand::Func { ty, .. } => ty.clone(),
            _ => None,
        }
    }

    fn funcs(&self) -> Vec<FuncId> {
        match self {
            Operand::Func { targets, .. } => targets.clone(),
            _ => Vec::new(),
        }
    }
}

enum Selection {
    Field(Type),
    Method(FuncId),
    InterfaceMethod(Signature),
}

struct Checker<'a> {
    program: &'a Program,
    file: FileId,
    package: PackageId,
    scopes: Vec<HashMap<String, Local>>,
    facts: FuncFacts,
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program, file: FileId) -> Self {
        let package = program.files.get(file).map(|f| f.package).unwrap_or_default();
        Checker {
            program,
            file,
            package,
            scopes: Vec::new(),
            facts: FuncFacts::default(),
        }
    }

    // ---- scopes ----

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind_var(&mut self, name: &Ident, ty: Option<Type>, funcs: Vec<FuncId>) {
        if name.name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), Local::Var { ty, funcs });
        }
    }

    fn bind_type(&mut self, name: &Ident, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), Local::Type(ty));
        }
    }

    /// Adds functions to what an existing local variable may hold.
    fn widen_var(&mut self, name: &str, more: Vec<FuncId>) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(Local::Var { funcs, .. }) = scope.get_mut(name) {
                for f in more {
                    if !funcs.contains(&f) {
                        funcs.push(f);
                    }
                }
                return;
            }
            if scope.contains_key(name) {
                return;
            }
        }
    }

    fn bind_signature(&mut self, syntax: &FuncTypeExpr, sig: &Signature) {
        for (name, ty) in syntax.param_names().into_iter().zip(&sig.params) {
            if let Some(name) = name {
                self.bind_var(name, Some(ty.clone()), Vec::new());
            }
        }
        for (name, ty) in group_names(&syntax.results).into_iter().zip(&sig.results) {
            if let Some(name) = name {
                self.bind_var(name, Some(ty.clone()), Vec::new());
            }
        }
    }

    fn resolve_type(&self, ty: &TypeExpr) -> Type {
        self.program
            .resolver()
            .resolve(self.file, ty, &Scopes(&self.scopes))
    }

    // ---- statements ----

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, block: &Block) {
        self.push_scope();
        self.stmts(&block.stmts);
        self.pop_scope();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(spec) => {
                let bound = self.spec_types(spec, false);
                for (name, (ty, funcs)) in spec.names.iter().zip(bound) {
                    self.bind_var(name, ty, funcs);
                }
            }
            Stmt::Const(spec) => {
                let bound = self.spec_types(spec, true);
                for (name, (ty, _)) in spec.names.iter().zip(bound) {
                    self.bind_var(name, ty, Vec::new());
                }
            }
            Stmt::Type(decl) => {
                let rhs = self.resolve_type(&decl.ty);
                let ty = if decl.is_alias {
                    rhs
                } else {
                    Type::Named(NamedType {
                        namespace: String::new(),
                        name: decl.name.name.clone(),
                        id: None,
                        local: Some(Box::new(rhs)),
                    })
                };
                self.bind_type(&decl.name, ty);
            }
            Stmt::ShortVar { names, values, .. } => {
                let bound = self.assign_types(values, names.len(), true);
                for (name, (ty, funcs)) in names.iter().zip(bound) {
                    self.bind_var(name, ty, funcs);
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                let values: Vec<Operand> = rhs.iter().map(|e| self.expr(e, None)).collect();
                for target in lhs {
                    self.expr(target, None);
                }
                if lhs.len() == values.len() {
                    for (target, value) in lhs.iter().zip(values) {
                        let funcs = value.funcs();
                        if let (ExprKind::Ident(name), false) = (&target.kind, funcs.is_empty()) {
                            self.widen_var(name, funcs);
                        }
                    }
                }
            }
            Stmt::IncDec { expr, .. } | Stmt::Expr { expr, .. } => {
                self.expr(expr, None);
            }
            Stmt::Send { chan, value, .. } => {
                self.expr(chan, None);
                self.expr(value, None);
            }
            Stmt::Return { results, .. } => {
                for result in results {
                    self.expr(result, None);
                }
            }
            Stmt::Branch { .. } | Stmt::Empty { .. } => {}
            Stmt::Block(block) => self.block(block),
            Stmt::If {
                init,
                cond,
                then_block,
                else_branch,
                ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(cond, None);
                self.block(then_block);
                if let Some(other) = else_branch {
                    self.stmt(other);
                }
                self.pop_scope();
            }
            Stmt::For {
                init, cond, post, body, ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond, None);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
                self.pop_scope();
            }
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                ..
            } => {
                let ranged = self.expr(expr, None).ty();
                let (key_ty, value_ty) = ranged.map(|t| self.range_types(&t)).unwrap_or((None, None));
                self.push_scope();
                for (target, ty) in [(key, key_ty), (value, value_ty)] {
                    let Some(target) = target else { continue };
                    match (&target.kind, *define) {
                        (ExprKind::Ident(name), true) => {
                            let ident = Ident {
                                name: name.clone(),
                                span: target.span.clone(),
                            };
                            self.bind_var(&ident, ty, Vec::new());
                        }
                        _ => {
                            self.expr(target, None);
                        }
                    }
                }
                self.block(body);
                self.pop_scope();
            }
            Stmt::Switch {
                init, tag, clauses, ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag, None);
                }
                for clause in clauses {
                    for expr in clause.exprs.iter().flatten() {
                        self.expr(expr, None);
                    }
                    self.push_scope();
                    self.stmts(&clause.body);
                    self.pop_scope();
                }
                self.pop_scope();
            }
            Stmt::TypeSwitch(sw) => self.type_switch(sw),
            Stmt::Select { clauses, .. } => {
                for clause in clauses {
                    self.push_scope();
                    if let Some(comm) = &clause.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&clause.body);
                    self.pop_scope();
                }
            }
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => {
                self.expr(call, None);
            }
            Stmt::Labeled { stmt, .. } => self.stmt(stmt),
        }
    }

    fn type_switch(&mut self, sw: &TypeSwitchStmt) {
        self.push_scope();
        if let Some(init) = &sw.init {
            self.stmt(init);
        }
        let subject = self.expr(&sw.subject, None).ty();
        for clause in &sw.clauses {
            self.push_scope();
            if let Some(binding) = &sw.binding {
                let ty = match clause.types.as_deref() {
                    Some([single]) if !is_nil_type(single) => Some(self.resolve_type(single)),
                    _ => subject.clone(),
                };
                self.bind_var(binding, ty, Vec::new());
            }
            self.stmts(&clause.body);
            self.pop_scope();
        }
        self.pop_scope();
    }

    /// Types of the names of a `var`/`const` spec, with function targets.
    fn spec_types(&mut self, spec: &VarSpec, is_const: bool) -> Vec<(Option<Type>, Vec<FuncId>)> {
        match &spec.ty {
            Some(ty) => {
                let declared = self.resolve_type(ty);
                let funcs: Vec<Vec<FuncId>> = spec
                    .values
                    .iter()
                    .map(|value| self.expr(value, Some(&declared)).funcs())
                    .collect();
                (0..spec.names.len())
                    .map(|i| (Some(declared.clone()), funcs.get(i).cloned().unwrap_or_default()))
                    .collect()
            }
            None => self.assign_types(&spec.values, spec.names.len(), !is_const),
        }
    }

    /// Types for `n` names assigned from `values`, including comma-ok forms.
    fn assign_types(&mut self, values: &[Expr], n: usize, default: bool) -> Vec<(Option<Type>, Vec<FuncId>)> {
        let settle = |ty: Option<Type>| -> Option<Type> {
            let ty = ty?;
            if ty.is_untyped_nil() {
                return None;
            }
            Some(if default { ty.defaulted() } else { ty })
        };
        if values.len() == n {
            return values
                .iter()
                .map(|value| {
                    let operand = self.expr(value, None);
                    (settle(operand.ty()), operand.funcs())
                })
                .collect();
        }
        let unknown = vec![(None, Vec::new()); n];
        let [value] = values else {
            for value in values {
                self.expr(value, None);
            }
            return unknown;
        };
        let comma_ok = matches!(
            &strip_parens(value).kind,
            ExprKind::Index { .. } | ExprKind::TypeAssert { ty: Some(_), .. } | ExprKind::Unary { op: UnaryOp::Recv, .. }
        );
        match self.expr(value, None).ty() {
            Some(Type::Tuple(items)) if items.len() == n => {
                items.into_iter().map(|t| (settle(Some(t)), Vec::new())).collect()
            }
            Some(ty) if comma_ok && n == 2 => vec![
                (settle(Some(ty)), Vec::new()),
                (Some(Type::Basic(BasicKind::Bool)), Vec::new()),
            ],
            _ => unknown,
        }
    }

    fn range_types(&self, ranged: &Type) -> (Option<Type>, Option<Type>) {
        let int = Some(Type::Basic(BasicKind::Int));
        let under = match ranged {
            Type::Pointer(elem) => match self.program.types.underlying(elem) {
                Some(Type::Array(elem, _)) => return (int, Some(*elem)),
                _ => return (None, None),
            },
            other => self.program.types.underlying(other),
        };
        match under {
            Some(Type::Slice(elem)) | Some(Type::Array(elem, _)) => (int, Some(*elem)),
            Some(Type::Map(key, value)) => (Some(*key), Some(*value)),
            Some(Type::Chan(_, elem)) => (Some(*elem), None),
            Some(Type::Basic(kind)) if matches!(kind, BasicKind::String | BasicKind::UntypedString) => {
                (int, Some(Type::Basic(BasicKind::Int32)))
            }
            Some(Type::Basic(kind)) if kind.is_untyped() => (Some(Type::Basic(kind.default_kind())), None),
            Some(Type::Basic(_)) => (Some(ranged.clone()), None),
            Some(Type::Signature(sig)) => match sig.params.first().and_then(|p| self.program.types.underlying(p)) {
                Some(Type::Signature(yield_sig)) => {
                    let mut params = yield_sig.params.into_iter();
                    (params.next(), params.next())
                }
                _ => (None, None),
            },
            _ => (None, None),
        }
    }

    // ---- expressions ----

    fn expr(&mut self, expr: &Expr, hint: Option<&Type>) -> Operand {
        self.operand(expr, hint, false)
    }

    fn value_type(&mut self, expr: &Expr) -> Option<Type> {
        self.expr(expr, None).ty()
    }

    fn operand(&mut self, expr: &Expr, hint: Option<&Type>, callee: bool) -> Operand {
        match &expr.kind {
            ExprKind::Ident(name) => self.ident(name, callee),
            ExprKind::Int(_) => Operand::Value(Some(Type::Basic(BasicKind::UntypedInt))),
            ExprKind::Float(_) => Operand::Value(Some(Type::Basic(BasicKind::UntypedFloat))),
            ExprKind::Imag(_) => Operand::Value(Some(Type::Basic(BasicKind::UntypedComplex))),
            ExprKind::Char(_) => Operand::Value(Some(Type::Basic(BasicKind::UntypedRune))),
            ExprKind::String(_) => Operand::Value(Some(Type::Basic(BasicKind::UntypedString))),
            ExprKind::CompositeLit { ty, elems } => {
                let lit_ty = match ty {
                    Some(ty) => Some(self.composite_type(ty, elems)),
                    None => hint.cloned(),
                };
                match lit_ty {
                    // Elided `&T` element of a `[]*T` literal.
                    Some(Type::Pointer(inner)) if ty.is_none() => {
                        self.elements(&inner, elems);
                        Operand::Value(Some(Type::Pointer(inner)))
                    }
                    Some(lit_ty) => {
                        self.elements(&lit_ty, elems);
                        Operand::Value(Some(lit_ty))
                    }
                    None => {
                        for elem in elems {
                            if let Some(key) = &elem.key {
                                self.expr(key, None);
                            }
                            self.expr(&elem.value, None);
                        }
                        Operand::Value(None)
                    }
                }
            }
            ExprKind::FuncLit { sig, body } => {
                let resolved = self.program.resolver().resolve_signature(self.file, sig, &Scopes(&self.scopes));
                self.push_scope();
                self.bind_signature(sig, &resolved);
                self.stmts(&body.stmts);
                self.pop_scope();
                Operand::Value(Some(Type::Signature(resolved)))
            }
            ExprKind::Type(ty) => Operand::TypeName(self.resolve_type(ty)),
            ExprKind::Paren(inner) => self.operand(inner, hint, callee),
            ExprKind::Selector { base, field } => self.selector(base, field, callee),
            ExprKind::Index { base, index } => {
                let base_op = self.expr(base, None);
                self.expr(index, None);
                match base_op {
                    Operand::TypeName(_) => Operand::Value(None),
                    other => Operand::Value(other.ty().and_then(|t| self.index_type(&t))),
                }
            }
            ExprKind::Slice { base, low, high, max } => {
                let base_ty = self.value_type(base);
                for bound in [low, high, max].into_iter().flatten() {
                    self.expr(bound, None);
                }
                Operand::Value(base_ty.and_then(|t| self.slice_type(&t)))
            }
            ExprKind::TypeAssert { base, ty } => {
                self.expr(base, None);
                Operand::Value(ty.as_ref().map(|ty| self.resolve_type(ty)))
            }
            ExprKind::Call {
                callee,
                args,
                has_ellipsis,
            } => self.call(expr, callee, args, *has_ellipsis),
            ExprKind::Star(inner) => match self.expr(inner, None) {
                Operand::TypeName(ty) => Operand::TypeName(Type::Pointer(Box::new(ty))),
                Operand::OpaqueMember(named) => {
                    Operand::TypeName(Type::Pointer(Box::new(Type::Named(named))))
                }
                other => {
                    let elem = other
                        .ty()
                        .and_then(|t| self.program.types.underlying(&t))
                        .and_then(|t| match t {
                            Type::Pointer(elem) => Some(*elem),
                            _ => None,
                        });
                    Operand::Value(elem)
                }
            },
            ExprKind::Unary { op, expr: inner } => {
                let inner_ty = self.operand(inner, hint_elem(hint, *op).as_ref(), false).ty();
                let ty = match op {
                    UnaryOp::Addr => inner_ty.map(|t| Type::Pointer(Box::new(t))),
                    UnaryOp::Recv => inner_ty
                        .and_then(|t| self.program.types.underlying(&t))
                        .and_then(|t| match t {
                            Type::Chan(_, elem) => Some(*elem),
                            _ => None,
                        }),
                    UnaryOp::Not | UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => inner_ty,
                };
                Operand::Value(ty)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.value_type(left);
                let r = self.value_type(right);
                Operand::Value(binary_type(*op, l, r))
            }
        }
    }

    fn ident(&mut self, name: &str, callee: bool) -> Operand {
        for scope in self.scopes.iter().rev() {
            match scope.get(name) {
                Some(Local::Var { ty, funcs }) if !funcs.is_empty() => {
                    return Operand::Func {
                        ty: ty.clone(),
                        targets: funcs.clone(),
                    }
                }
                Some(Local::Var { ty, .. }) => return Operand::Value(ty.clone()),
                Some(Local::Type(ty)) => return Operand::TypeName(ty.clone()),
                None => {}
            }
        }
        let program = self.program;
        if let Some(target) = program.files.get(self.file).and_then(|f| f.import_named(name)) {
            return Operand::Package(target.clone());
        }
        if let Some(operand) = self.member(self.package, name, callee) {
            return operand;
        }
        match name {
            "true" | "false" => Operand::Value(Some(Type::Basic(BasicKind::UntypedBool))),
            "nil" => Operand::Value(Some(Type::Basic(BasicKind::UntypedNil))),
            "iota" => Operand::Value(Some(Type::Basic(BasicKind::UntypedInt))),
            _ => match Builtin::from_name(name) {
                Some(builtin) => Operand::Builtin(builtin),
                None => universe_type(name).map_or(Operand::Value(None), Operand::TypeName),
            },
        }
    }

    /// A package-level name of a loaded package.
    fn member(&mut self, package: PackageId, name: &str, callee: bool) -> Option<Operand> {
        let program = self.program;
        let operand = match program.packages.get(package)?.scope.get(name)? {
            Member::Type(id) => Operand::TypeName(program.types.named_type(*id)?),
            Member::Alias { file, expr } => Operand::TypeName(program.resolver().resolve(*file, expr, NO_LOCALS)),
            Member::Func(id) => {
                if !callee {
                    self.facts.refs.push(*id);
                }
                Operand::Func {
                    ty: Some(Type::Signature(program.funcs[*id].sig.clone())),
                    targets: vec![*id],
                }
            }
            Member::Var(ty) | Member::Const(ty) => Operand::Value(ty.clone()),
        };
        Some(operand)
    }

    fn selector(&mut self, base: &Expr, field: &Ident, callee: bool) -> Operand {
        let name = field.name.as_str();
        match self.operand(base, None, false) {
            Operand::Package(ImportTarget::Loaded(pid)) => {
                self.member(pid, name, callee).unwrap_or(Operand::Value(None))
            }
            Operand::Package(ImportTarget::Opaque(path)) => Operand::OpaqueMember(NamedType {
                namespace: path,
                name: name.to_string(),
                id: None,
                local: None,
            }),
            Operand::TypeName(ty) => {
                // Method expression `T.M`; the receiver becomes the first argument.
                if let Some(Selection::Method(id)) = self.select(&ty, name, 0) {
                    self.facts.refs.push(id);
                }
                Operand::Value(None)
            }
            other => match other.ty().and_then(|t| self.select(&t, name, 0)) {
                Some(Selection::Field(ty)) => Operand::Value(Some(ty)),
                Some(Selection::Method(id)) => {
                    if !callee {
                        self.facts.refs.push(id);
                    }
                    Operand::Func {
                        ty: Some(Type::Signature(self.program.funcs[id].sig.clone())),
                        targets: vec![id],
                    }
                }
                Some(Selection::InterfaceMethod(sig)) => Operand::Func {
                    ty: Some(Type::Signature(sig)),
                    targets: Vec::new(),
                },
                None => Operand::Value(None),
            },
        }
    }

    /// Field or method `name` of `ty`, searching embedded fields breadth-last.
    fn select(&self, ty: &Type, name: &str, depth: usize) -> Option<Selection> {
        if depth > 4 {
            return None;
        }
        let base = match ty {
            Type::Pointer(elem) => elem.as_ref(),
            other => other,
        };
        if let Some(id) = base.named().and_then(|n| n.id) {
            if let Some(&method) = self.program.methods.get(&(id, name.to_string())) {
                return Some(Selection::Method(method));
            }
        }
        match self.program.types.underlying(base)? {
            Type::Struct(fields) => {
                if let Some(field) = fields.iter().find(|f| f.name == name) {
                    return Some(Selection::Field(field.ty.clone()));
                }
                fields
                    .iter()
                    .filter(|f| f.embedded)
                    .find_map(|f| self.select(&f.ty, name, depth + 1))
            }
            Type::Interface(methods) => methods
                .into_iter()
                .find(|m| m.name == name)
                .map(|m| Selection::InterfaceMethod(m.sig)),
            _ => None,
        }
    }

    fn call(&mut self, call: &Expr, callee: &Expr, args: &[Expr], has_ellipsis: bool) -> Operand {
        match self.operand(callee, None, true) {
            Operand::TypeName(ty) => {
                for arg in args {
                    self.expr(arg, None);
                }
                Operand::Value(Some(ty))
            }
            Operand::Builtin(builtin) => self.builtin(builtin, args),
            Operand::Func { ty, targets } => {
                // Recorded before the arguments so sites stay in source order.
                let site = (!targets.is_empty()).then(|| {
                    self.facts.calls.push(CallSite {
                        callees: targets,
                        args: Vec::new(),
                        spread: has_ellipsis,
                        span: call.span.clone(),
                    });
                    self.facts.calls.len() - 1
                });
                let mut arg_types: Vec<Option<Type>> = args.iter().map(|arg| self.value_type(arg)).collect();
                if let [Some(Type::Tuple(items))] = arg_types.as_slice() {
                    arg_types = items.iter().cloned().map(Some).collect();
                }
                if let Some(idx) = site {
                    self.facts.calls[idx].args = arg_types;
                }
                self.call_result(ty)
            }
            other => {
                for arg in args {
                    self.expr(arg, None);
                }
                match other.ty() {
                    Some(ty) => self.call_result(Some(ty)),
                    None => Operand::Value(None),
                }
            }
        }
    }

    fn call_result(&self, callee_ty: Option<Type>) -> Operand {
        match callee_ty.and_then(|t| self.program.types.underlying(&t)) {
            Some(Type::Signature(sig)) => match sig.result_type() {
                Some(ty) => Operand::Value(Some(ty)),
                None => Operand::Void,
            },
            _ => Operand::Value(None),
        }
    }

    fn builtin(&mut self, builtin: Builtin, args: &[Expr]) -> Operand {
        let mut types = Vec::with_capacity(args.len());
        for arg in args {
            let operand = self.expr(arg, None);
            types.push(match operand {
                Operand::TypeName(ty) => Some(ty),
                Operand::OpaqueMember(named) => Some(Type::Named(named)),
                other => other.ty(),
            });
        }
        let first = types.first().cloned().flatten();
        let ty = match builtin {
            Builtin::Make | Builtin::Append => first,
            Builtin::New => first.map(|t| Type::Pointer(Box::new(t))),
            Builtin::Len | Builtin::Cap | Builtin::Copy => Some(Type::Basic(BasicKind::Int)),
            Builtin::Recover => Some(Type::empty_interface()),
            Builtin::Complex => Some(Type::Basic(BasicKind::Complex128)),
            Builtin::Real | Builtin::Imag => Some(Type::Basic(BasicKind::Float64)),
            Builtin::Min | Builtin::Max => types
                .into_iter()
                .flatten()
                .reduce(|acc, next| binary_type(BinaryOp::Add, Some(acc), Some(next)).unwrap_or(Type::Invalid)),
            Builtin::Clear
            | Builtin::Close
            | Builtin::Delete
            | Builtin::Panic
            | Builtin::Print
            | Builtin::Println => return Operand::Void,
        };
        Operand::Value(ty)
    }

    fn composite_type(&self, ty: &TypeExpr, elems: &[KeyedElement]) -> Type {
        match &ty.kind {
            TypeExprKind::Array {
                len: ArrayLen::Ellipsis,
                elem,
            } => match ellipsis_len(elems) {
                Some(len) => Type::Array(Box::new(self.resolve_type(elem)), len),
                None => Type::Invalid,
            },
            _ => self.resolve_type(ty),
        }
    }

    fn elements(&mut self, lit_ty: &Type, elems: &[KeyedElement]) {
        match self.program.types.underlying(lit_ty) {
            Some(Type::Slice(elem)) | Some(Type::Array(elem, _)) => {
                for e in elems {
                    if let Some(key) = &e.key {
                        self.expr(key, None);
                    }
                    self.expr(&e.value, Some(&elem));
                }
            }
            Some(Type::Map(key_ty, value_ty)) => {
                for e in elems {
                    if let Some(key) = &e.key {
                        self.expr(key, Some(&key_ty));
                    }
                    self.expr(&e.value, Some(&value_ty));
                }
            }
            Some(Type::Struct(fields)) => {
                for (i, e) in elems.iter().enumerate() {
                    let field_ty = match e.key.as_ref().map(|k| &k.kind) {
                        Some(ExprKind::Ident(name)) => fields.iter().find(|f| &f.name == name),
                        _ => fields.get(i),
                    }
                    .map(|f| f.ty.clone());
                    self.expr(&e.value, field_ty.as_ref());
                }
            }
            _ => {
                for e in elems {
                    self.expr(&e.value, None);
                }
            }
        }
    }

    fn index_type(&self, base: &Type) -> Option<Type> {
        match self.program.types.underlying(base)? {
            Type::Slice(elem) | Type::Array(elem, _) => Some(*elem),
            Type::Map(_, value) => Some(*value),
            Type::Pointer(elem) => match self.program.types.underlying(&elem)? {
                Type::Array(elem, _) => Some(*elem),
                _ => None,
            },
            Type::Basic(BasicKind::String) | Type::Basic(BasicKind::UntypedString) => {
                Some(Type::Basic(BasicKind::Uint8))
            }
            _ => None,
        }
    }

    fn slice_type(&self, base: &Type) -> Option<Type> {
        match self.program.types.underlying(base)? {
            Type::Slice(_) | Type::Basic(BasicKind::String) => Some(base.clone()),
            Type::Basic(BasicKind::UntypedString) => Some(Type::Basic(BasicKind::String)),
            Type::Array(elem, _) => Some(Type::Slice(elem)),
            Type::Pointer(elem) => match self.program.types.underlying(&elem)? {
                Type::Array(elem, _) => Some(Type::Slice(elem)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Hint for the operand of `&` in an elided composite literal element.
fn hint_elem(hint: Option<&Type>, op: UnaryOp) -> Option<Type> {
    match (hint, op) {
        (Some(Type::Pointer(elem)), UnaryOp::Addr) => Some((**elem).clone()),
        _ => None,
    }
}

fn binary_type(op: BinaryOp, left: Option<Type>, right: Option<Type>) -> Option<Type> {
    match op {
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            Some(Type::Basic(BasicKind::UntypedBool))
        }
        BinaryOp::Shl | BinaryOp::Shr => left,
        _ => match (left, right) {
            (Some(Type::Basic(l)), Some(Type::Basic(r))) if l.is_untyped() && r.is_untyped() => {
                Some(Type::Basic(Type::untyped_join(l, r)))
            }
            (Some(l), r) if l.is_untyped() => r.or(Some(l)),
            (l, _) => l,
        },
    }
}

fn strip_parens(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Paren(inner) => strip_parens(inner),
        _ => expr,
    }
}

fn is_nil_type(ty: &TypeExpr) -> bool {
    matches!(&ty.kind, TypeExprKind::Name(ident) if ident.name == "nil")
}

/// Names of result parameters, one entry per result.
fn group_names(groups: &[ParamGroup]) -> Vec<Option<&Ident>> {
    let mut out = Vec::new();
    for group in groups {
        if group.names.is_empty() {
            out.push(None);
        } else {
            out.extend(group.names.iter().map(Some));
        }
    }
    out
}

/// Length of a `[...]T` literal: one past the highest index, where a keyed
/// element restarts the running index at its key. `None` if a key is not a
/// constant integer.
fn ellipsis_len(elems: &[KeyedElement]) -> Option<u64> {
    let mut next = 0u64;
    let mut len = 0u64;
    for e in elems {
        let index = match &e.key {
            Some(key) => const_int(key)?,
            None => next,
        };
        next = index.checked_add(1)?;
        len = len.max(next);
    }
    Some(len)
}

#[cfg(test)]
mod tests {
    use super::{check_function, FuncFacts};
    use crate::sema::{Program, SourceInput};
    use std::path::PathBuf;

    fn facts_of(source: &str, func: &str) -> (Program, FuncFacts) {
        let program = Program::load(
            vec![SourceInput {
                path: PathBuf::from("p/main.go"),
                source: source.to_string(),
            }],
            "+tsgen typevar",
        )
        .expect("load");
        let id = program
            .funcs
            .iter()
            .position(|f| f.name == func)
            .expect("function");
        let facts = check_function(&program, id);
        (program, facts)
    }

    fn arg_identities(facts: &FuncFacts) -> Vec<Vec<String>> {
        facts
            .calls
            .iter()
            .map(|site| {
                site.args
                    .iter()
                    .map(|a| a.as_ref().map_or("?".to_string(), |t| t.identity()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn types_arguments_of_direct_calls() {
        let (_, facts) = facts_of(
            "package main\n\nimport \"io\"\n\ntype foo struct{}\n\nfunc f(x interface{}) {}\n\nfunc main() {\n\tvar r io.Reader\n\tm := map[string][]io.Reader{\"a\": {r}}\n\tf(m)\n\tf(map[int]bool{})\n\tf([]chan<- *foo{})\n\tf(func(i int) (bool, error) { return false, nil })\n\tf(1)\n\tf(nil)\n}\n",
            "main",
        );
        assert_eq!(
            arg_identities(&facts),
            vec![
                vec!["map[string][]io.Reader".to_string()],
                vec!["map[int]bool".to_string()],
                vec!["[]chan<- *main.foo".to_string()],
                vec!["func(int) (bool, error)".to_string()],
                vec!["untyped int".to_string()],
                vec!["untyped nil".to_string()],
            ]
        );
    }

    #[test]
    fn ellipsis_arrays_count_up_to_the_highest_key() {
        let (_, facts) = facts_of(
            r#"package main

func f(x interface{}) {}

func main() {
	f([...]int{5: 1})
	f([...]string{"a", 3: "b", "c"})
	f([...]int{4: 1, 1: 2})
	f([...]int{})
}
"#,
            "main",
        );
        assert_eq!(
            arg_identities(&facts),
            vec![
                vec!["[6]int".to_string()],
                vec!["[5]string".to_string()],
                vec!["[5]int".to_string()],
                vec!["[0]int".to_string()],
            ]
        );
    }

    #[test]
    fn follows_function_values_and_methods() {
        let (program, facts) = facts_of(
            "package main\n\ntype s struct{ n int }\n\nfunc (v *s) get() int { return v.n }\n\nfunc a(x interface{}) {}\nfunc b(x interface{}) {}\n\nfunc main() {\n\tg := a\n\tif true {\n\t\tg = b\n\t}\n\tg(\"x\")\n\tv := &s{}\n\tn := v.get()\n\ta(n)\n\th := v.get\n\t_ = h\n}\n",
            "main",
        );
        let name = |id: usize| program.funcs[id].name.clone();
        let callees: Vec<Vec<String>> = facts
            .calls
            .iter()
            .map(|site| site.callees.iter().map(|&id| name(id)).collect())
            .collect();
        assert_eq!(
            callees,
            vec![vec!["a", "b"], vec!["get"], vec!["a"]]
                .into_iter()
                .map(|v| v.into_iter().map(String::from).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
        assert_eq!(arg_identities(&facts)[2], vec!["int".to_string()]);
        let refs: Vec<String> = facts.refs.iter().map(|&id| name(id)).collect();
        assert_eq!(refs, vec!["a", "b", "get"]);
    }

    #[test]
    fn types_comma_ok_range_and_closures() {
        let (_, facts) = facts_of(
            "package main\n\nfunc f(x interface{}) {}\n\nfunc main() {\n\tm := map[string]float64{}\n\tv, ok := m[\"k\"]\n\tfor i, c := range \"go\" {\n\t\tf(i)\n\t\tf(c)\n\t}\n\tdo := func() {\n\t\tf(v)\n\t}\n\tdo()\n\tf(ok)\n\tf(make([]string, 0))\n\tf(new(int))\n}\n",
            "main",
        );
        let got: Vec<String> = arg_identities(&facts)
            .into_iter()
            .filter_map(|args| args.into_iter().next())
            .collect();
        assert_eq!(
            got,
            vec!["int", "int32", "float64", "bool", "[]string", "*int"]
        );
    }

    #[test]
    fn spreads_tuple_arguments() {
        let (_, facts) = facts_of(
            "package main\n\nfunc pair() (int, string) { return 0, \"\" }\n\nfunc f(a interface{}, b interface{}) {}\n\nfunc main() {\n\tf(pair())\n}\n",
            "main",
        );
        assert_eq!(arg_identities(&facts)[1], vec!["int".to_string(), "string".to_string()]);
    }
}
