use crate::error::SkipReason;
use crate::frontend::ast::{ExprKind, TypeCaseClause, TypeExpr, TypeExprKind, TypeSwitchStmt};
use crate::sema::resolve::NO_LOCALS;
use crate::sema::types::Type;
use crate::sema::{FileId, Program};
use crate::unify::{Bindings, Unifier, UnsupportedPattern};

/// One single-pattern arm: the pattern and the clause it came from.
#[derive(Debug)]
pub struct Template<'f> {
    pub pattern: Type,
    pub clause: &'f TypeCaseClause,
}

/// A type switch prepared for expansion.
#[derive(Debug)]
pub struct DispatchStmt<'f> {
    pub node: &'f TypeSwitchStmt,
    /// Name of the identifier being switched on.
    pub subject: String,
    /// In source order, which is match priority.
    pub templates: Vec<Template<'f>>,
    /// Identities of listed types that contain no placeholder. The switch
    /// already handles these, so they are never added again.
    pub handled: Vec<String>,
}

impl<'f> DispatchStmt<'f> {
    pub fn new(program: &Program, file: FileId, node: &'f TypeSwitchStmt) -> Result<Self, SkipReason> {
        let subject = match &node.subject.kind {
            ExprKind::Ident(name) => name.clone(),
            _ => return Err(SkipReason::UnsupportedSubject),
        };
        let templates = extract_templates(program, file, node);
        if templates.is_empty() {
            return Err(SkipReason::NoTemplates);
        }
        let resolver = program.resolver();
        let mut handled = Vec::new();
        for ty in node.clauses.iter().filter_map(|c| c.types.as_ref()).flatten() {
            if is_nil(ty) {
                continue;
            }
            let resolved = resolver.resolve(file, ty, NO_LOCALS);
            if !resolved.contains_invalid() && !program.placeholders.occurs_in(&resolved) {
                let identity = resolved.identity();
                if !handled.contains(&identity) {
                    handled.push(identity);
                }
            }
        }
        Ok(DispatchStmt {
            node,
            subject,
            templates,
            handled,
        })
    }

    /// First template in source order whose pattern matches `concrete`.
    pub fn find_match(
        &self,
        unifier: &Unifier<'_>,
        concrete: &Type,
    ) -> Result<Option<(&Template<'f>, Bindings)>, UnsupportedPattern> {
        for template in &self.templates {
            if let Some(bindings) = unifier.matches(&template.pattern, concrete)? {
                return Ok(Some((template, bindings)));
            }
        }
        Ok(None)
    }
}

/// Arms listing exactly one type, in source order. `case nil:` is not a template.
pub fn extract_templates<'f>(program: &Program, file: FileId, node: &'f TypeSwitchStmt) -> Vec<Template<'f>> {
    let resolver = program.resolver();
    node.clauses
        .iter()
        .filter_map(|clause| match clause.types.as_deref() {
            Some([single]) if !is_nil(single) => Some(Template {
                pattern: resolver.resolve(file, single, NO_LOCALS),
                clause,
            }),
            _ => None,
        })
        .collect()
}

fn is_nil(ty: &TypeExpr) -> bool {
    matches!(&ty.kind, TypeExprKind::Name(ident) if ident.name == "nil")
}

#[cfg(test)]
mod tests {
    use super::DispatchStmt;
    use crate::error::SkipReason;
    use crate::frontend::ast::{Decl, Stmt, TypeSwitchStmt};
    use crate::sema::{Program, SourceInput};
    use std::path::PathBuf;

    fn load(body: &str) -> Program {
        let source = format!(
            "package p\n\ntype T interface{{}}\n\nfunc f(v interface{{}}) {{\n{}\n}}\n",
            body
        );
        Program::load(
            vec![SourceInput {
                path: PathBuf::from("p/p.go"),
                source,
            }],
            "+tsgen typevar",
        )
        .expect("load")
    }

    fn switch_of(program: &Program) -> &TypeSwitchStmt {
        let Some(Decl::Func(decl)) = program.files[0].ast.decls.get(1) else {
            panic!("expected func");
        };
        match decl.body.as_ref().map(|b| &b.stmts[0]) {
            Some(Stmt::TypeSwitch(sw)) => sw,
            other => panic!("expected type switch, got {:?}", other),
        }
    }

    #[test]
    fn keeps_single_pattern_arms_in_order() {
        let program = load(
            "\tswitch x := v.(type) {\n\tcase int, string:\n\tcase nil:\n\tcase []T:\n\t\t_ = x\n\tcase bool:\n\tcase map[T]int:\n\tdefault:\n\t}",
        );
        let dispatch = DispatchStmt::new(&program, 0, switch_of(&program)).expect("dispatch");
        assert_eq!(dispatch.subject, "v");
        let patterns: Vec<String> = dispatch.templates.iter().map(|t| t.pattern.identity()).collect();
        assert_eq!(patterns, vec!["[]p.T", "bool", "map[p.T]int"]);
        assert_eq!(dispatch.handled, vec!["int", "string", "bool"]);
    }

    #[test]
    fn rejects_switches_it_cannot_expand() {
        let program = load("\tswitch v.(type) {\n\tcase int, string:\n\tdefault:\n\t}");
        assert_eq!(
            DispatchStmt::new(&program, 0, switch_of(&program)).err(),
            Some(SkipReason::NoTemplates)
        );
        let program = load("\tswitch (v).(type) {\n\tcase []T:\n\t}");
        assert_eq!(
            DispatchStmt::new(&program, 0, switch_of(&program)).err(),
            Some(SkipReason::UnsupportedSubject)
        );
    }
}
