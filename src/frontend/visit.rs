// Purpose: Read-only traversal over statements, expressions and type expressions.
// Inputs/Outputs: Implementors override the hooks they need; each `walk_*` function keeps descending.
// Gotchas: An overriding hook must call its `walk_*` counterpart or the subtree is skipped.

use super::ast::*;

pub trait Visit {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_type(&mut self, ty: &TypeExpr) {
        walk_type(self, ty);
    }

    /// An identifier used as a value, e.g. `x` in `f(x)` or `T` in `T(x)`.
    fn visit_value_ident(&mut self, _expr: &Expr, _name: &str) {}

    /// An unqualified type name, e.g. `T` in `[]T`.
    fn visit_type_name(&mut self, _ident: &Ident) {}
}

pub fn walk_block<V: Visit + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
}

fn walk_var_spec<V: Visit + ?Sized>(v: &mut V, spec: &VarSpec) {
    if let Some(ty) = &spec.ty {
        v.visit_type(ty);
    }
    for value in &spec.values {
        v.visit_expr(value);
    }
}

pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Var(spec) | Stmt::Const(spec) => walk_var_spec(v, spec),
        Stmt::Type(decl) => v.visit_type(&decl.ty),
        Stmt::ShortVar { values, .. } => {
            for value in values {
                v.visit_expr(value);
            }
        }
        Stmt::Assign { lhs, rhs, .. } => {
            for expr in lhs.iter().chain(rhs) {
                v.visit_expr(expr);
            }
        }
        Stmt::IncDec { expr, .. } | Stmt::Expr { expr, .. } => v.visit_expr(expr),
        Stmt::Send { chan, value, .. } => {
            v.visit_expr(chan);
            v.visit_expr(value);
        }
        Stmt::Return { results, .. } => {
            for expr in results {
                v.visit_expr(expr);
            }
        }
        Stmt::Branch { .. } | Stmt::Empty { .. } => {}
        Stmt::Block(block) => v.visit_block(block),
        Stmt::If {
            init,
            cond,
            then_block,
            else_branch,
            ..
        } => {
            if let Some(init) = init {
                v.visit_stmt(init);
            }
            v.visit_expr(cond);
            v.visit_block(then_block);
            if let Some(else_branch) = else_branch {
                v.visit_stmt(else_branch);
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            if let Some(init) = init {
                v.visit_stmt(init);
            }
            if let Some(cond) = cond {
                v.visit_expr(cond);
            }
            if let Some(post) = post {
                v.visit_stmt(post);
            }
            v.visit_block(body);
        }
        Stmt::Range {
            key,
            value,
            expr,
            body,
            ..
        } => {
            for var in key.iter().chain(value.iter()) {
                v.visit_expr(var);
            }
            v.visit_expr(expr);
            v.visit_block(body);
        }
        Stmt::Switch {
            init,
            tag,
            clauses,
            ..
        } => {
            if let Some(init) = init {
                v.visit_stmt(init);
            }
            if let Some(tag) = tag {
                v.visit_expr(tag);
            }
            for clause in clauses {
                for expr in clause.exprs.iter().flatten() {
                    v.visit_expr(expr);
                }
                for stmt in &clause.body {
                    v.visit_stmt(stmt);
                }
            }
        }
        Stmt::TypeSwitch(sw) => {
            if let Some(init) = &sw.init {
                v.visit_stmt(init);
            }
            v.visit_expr(&sw.subject);
            for clause in &sw.clauses {
                walk_type_case_clause(v, clause);
            }
        }
        Stmt::Select { clauses, .. } => {
            for clause in clauses {
                if let Some(comm) = &clause.comm {
                    v.visit_stmt(comm);
                }
                for stmt in &clause.body {
                    v.visit_stmt(stmt);
                }
            }
        }
        Stmt::Go { call, .. } | Stmt::Defer { call, .. } => v.visit_expr(call),
        Stmt::Labeled { stmt, .. } => v.visit_stmt(stmt),
    }
}

pub fn walk_type_case_clause<V: Visit + ?Sized>(v: &mut V, clause: &TypeCaseClause) {
    for ty in clause.types.iter().flatten() {
        v.visit_type(ty);
    }
    for stmt in &clause.body {
        v.visit_stmt(stmt);
    }
}

pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Ident(name) => v.visit_value_ident(expr, name),
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Imag(_)
        | ExprKind::Char(_)
        | ExprKind::String(_) => {}
        ExprKind::CompositeLit { ty, elems } => {
            if let Some(ty) = ty {
                v.visit_type(ty);
            }
            for elem in elems {
                if let Some(key) = &elem.key {
                    v.visit_expr(key);
                }
                v.visit_expr(&elem.value);
            }
        }
        ExprKind::FuncLit { sig, body } => {
            walk_signature(v, sig);
            v.visit_block(body);
        }
        ExprKind::Type(ty) => v.visit_type(ty),
        ExprKind::Paren(inner) | ExprKind::Star(inner) => v.visit_expr(inner),
        ExprKind::Unary { expr: inner, .. } => v.visit_expr(inner),
        // field names are not identifier uses
        ExprKind::Selector { base, .. } => v.visit_expr(base),
        ExprKind::Index { base, index } => {
            v.visit_expr(base);
            v.visit_expr(index);
        }
        ExprKind::Slice {
            base,
            low,
            high,
            max,
        } => {
            v.visit_expr(base);
            for part in [low, high, max].into_iter().flatten() {
                v.visit_expr(part);
            }
        }
        ExprKind::TypeAssert { base, ty } => {
            v.visit_expr(base);
            if let Some(ty) = ty {
                v.visit_type(ty);
            }
        }
        ExprKind::Call { callee, args, .. } => {
            v.visit_expr(callee);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
    }
}

pub fn walk_signature<V: Visit + ?Sized>(v: &mut V, sig: &FuncTypeExpr) {
    for group in sig.params.iter().chain(&sig.results) {
        v.visit_type(&group.ty);
    }
}

pub fn walk_type<V: Visit + ?Sized>(v: &mut V, ty: &TypeExpr) {
    match &ty.kind {
        TypeExprKind::Name(ident) => v.visit_type_name(ident),
        TypeExprKind::Qualified { .. } => {}
        TypeExprKind::Pointer(elem) | TypeExprKind::Slice(elem) => v.visit_type(elem),
        TypeExprKind::Array { len, elem } => {
            if let ArrayLen::Expr(expr) = len {
                v.visit_expr(expr);
            }
            v.visit_type(elem);
        }
        TypeExprKind::Map { key, value } => {
            v.visit_type(key);
            v.visit_type(value);
        }
        TypeExprKind::Chan { elem, .. } => v.visit_type(elem),
        TypeExprKind::Func(sig) => walk_signature(v, sig),
        TypeExprKind::Struct(fields) => {
            for field in fields {
                v.visit_type(&field.ty);
            }
        }
        TypeExprKind::Interface(elems) => {
            for elem in elems {
                match elem {
                    InterfaceElem::Method { sig, .. } => walk_signature(v, sig),
                    InterfaceElem::Embedded(ty) => v.visit_type(ty),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{walk_type_case_clause, Visit};
    use crate::frontend::ast::*;
    use crate::frontend::parse_source;

    #[derive(Default)]
    struct Names {
        types: Vec<String>,
        values: Vec<String>,
    }

    impl Visit for Names {
        fn visit_value_ident(&mut self, _expr: &Expr, name: &str) {
            self.values.push(name.to_string());
        }

        fn visit_type_name(&mut self, ident: &Ident) {
            self.types.push(ident.name.clone());
        }
    }

    #[test]
    fn separates_type_and_value_identifiers() {
        let src = "package p\nfunc f(x interface{}) {\n\tswitch y := x.(type) {\n\tcase map[string]T:\n\t\tvar out []T\n\t\tfmt.Println(T(len(y)), out, s.T)\n\t}\n}\n";
        let (file, _) = parse_source(src, 0).expect("parse");
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        let Stmt::TypeSwitch(sw) = &func.body.as_ref().expect("body").stmts[0] else {
            panic!("expected type switch");
        };
        let mut names = Names::default();
        walk_type_case_clause(&mut names, &sw.clauses[0]);
        assert_eq!(names.types, vec!["string", "T", "T"]);
        assert_eq!(names.values, vec!["fmt", "T", "len", "y", "out", "s"]);
    }
}
