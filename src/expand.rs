// Purpose: Instantiate matching templates for inferred types and splice the new arms into the source text.
// Inputs/Outputs: Takes a prepared type switch, concrete types and the file text; returns arm texts and text edits.
// Invariants: Templates are never modified; every arm is a substituted copy of its clause's source text.
// Gotchas: Renderings that would re-associate in value position (`*T(x)`, `<-chan T(x)`) are parenthesized.

use std::collections::{BTreeSet, HashSet};

use log::{debug, warn};

use crate::frontend::ast::{Expr, Ident, Span, TypeCaseClause, TypeExpr, TypeExprKind, TypeSwitchStmt};
use crate::frontend::visit::{walk_type, walk_type_case_clause, Visit};
use crate::sema::types::{NamedType, Type};
use crate::sema::{FileId, ImportTarget, Program};
use crate::template::DispatchStmt;
use crate::unify::{Bindings, Unifier, UnsupportedPattern};

/// An insertion into a file's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub text: String,
}

/// Applies insertions; equal offsets keep their order.
pub fn apply_edits(source: &str, edits: &[Edit]) -> String {
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by_key(|&i| (edits[i].offset, i));
    let mut out = String::with_capacity(source.len() + edits.iter().map(|e| e.text.len()).sum::<usize>());
    let mut cursor = 0;
    for i in order {
        let offset = edits[i].offset.min(source.len());
        out.push_str(&source[cursor..offset]);
        out.push_str(&edits[i].text);
        cursor = offset;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Renders types as Go source valid inside one file, collecting the imports
/// that rendering requires.
pub struct TypeRenderer<'a> {
    program: &'a Program,
    file: FileId,
    missing_imports: BTreeSet<String>,
}

impl<'a> TypeRenderer<'a> {
    pub fn new(program: &'a Program, file: FileId) -> Self {
        TypeRenderer {
            program,
            file,
            missing_imports: BTreeSet::new(),
        }
    }

    pub fn render(&mut self, ty: &Type) -> String {
        let mut qualify = |named: &NamedType| self.qualifier(named);
        ty.render_with(&mut qualify)
    }

    /// Import paths the rendered types need but the file does not import.
    pub fn missing_imports(&self) -> &BTreeSet<String> {
        &self.missing_imports
    }

    fn qualifier(&mut self, named: &NamedType) -> Option<String> {
        if named.is_error() || named.is_local() {
            return None;
        }
        let program = self.program;
        let file = &program.files[self.file];
        let imported = file.ast.imports.iter().zip(&file.imports).find(|(_, target)| match target {
            ImportTarget::Loaded(pid) => named.id.is_some() && program.packages[*pid].key == named.namespace,
            ImportTarget::Opaque(path) => named.id.is_none() && *path == named.namespace,
        });
        if let Some((spec, _)) = imported {
            return match spec.local_name() {
                "." => None,
                "_" => Some(self.require_import(named)),
                local => Some(local.to_string()),
            };
        }
        if named.id.is_some() && program.packages[file.package].key == named.namespace {
            return None;
        }
        Some(self.require_import(named))
    }

    fn require_import(&mut self, named: &NamedType) -> String {
        if named.id.is_none() {
            self.missing_imports.insert(named.namespace.clone());
            return named.namespace.rsplit('/').next().unwrap_or(&named.namespace).to_string();
        }
        let Some(package) = self.program.packages.iter().find(|p| p.key == named.namespace) else {
            return named.namespace.clone();
        };
        if let Some(path) = &package.import_path {
            self.missing_imports.insert(path.clone());
        }
        package.name.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    Type,
    /// Element of a bidirectional channel type.
    ChanElem,
    Value,
}

/// Occurrences of bound placeholder names in a clause.
struct Occurrences<'b> {
    bindings: &'b Bindings,
    hits: Vec<(Span, String, Position)>,
    chan_elems: HashSet<usize>,
}

impl Visit for Occurrences<'_> {
    fn visit_type(&mut self, ty: &TypeExpr) {
        if let TypeExprKind::Chan { elem, .. } = &ty.kind {
            if let TypeExprKind::Name(ident) = &elem.kind {
                self.chan_elems.insert(ident.span.start);
            }
        }
        walk_type(self, ty);
    }

    fn visit_value_ident(&mut self, expr: &Expr, name: &str) {
        if self.bindings.contains_key(name) {
            self.hits.push((expr.span.clone(), name.to_string(), Position::Value));
        }
    }

    fn visit_type_name(&mut self, ident: &Ident) {
        if self.bindings.contains_key(&ident.name) {
            let position = if self.chan_elems.contains(&ident.span.start) {
                Position::ChanElem
            } else {
                Position::Type
            };
            self.hits.push((ident.span.clone(), ident.name.clone(), position));
        }
    }
}

/// Copies `clause`'s source text with every bound placeholder identifier
/// replaced by its rendered concrete type.
pub fn instantiate(source: &str, clause: &TypeCaseClause, bindings: &Bindings, renderer: &mut TypeRenderer<'_>) -> String {
    let mut occurrences = Occurrences {
        bindings,
        hits: Vec::new(),
        chan_elems: HashSet::new(),
    };
    walk_type_case_clause(&mut occurrences, clause);
    let mut hits = occurrences.hits;
    hits.sort_by_key(|(span, _, _)| span.start);
    hits.dedup_by_key(|(span, _, _)| span.start);

    let base = clause.span.start;
    let text = &source[base..clause.span.end];
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, name, position) in hits {
        let Some(ty) = bindings.get(&name) else { continue };
        let rendered = renderer.render(ty);
        let (start, end) = (span.start - base, span.end - base);
        out.push_str(&text[cursor..start]);
        if needs_parens(ty, &rendered, position) {
            out.push('(');
            out.push_str(&rendered);
            out.push(')');
        } else {
            out.push_str(&rendered);
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn needs_parens(ty: &Type, rendered: &str, position: Position) -> bool {
    match position {
        Position::Type => false,
        Position::ChanElem => rendered.starts_with("<-"),
        Position::Value => {
            rendered.starts_with('*')
                || rendered.starts_with("<-")
                || matches!(ty, Type::Signature(sig) if sig.results.is_empty())
        }
    }
}

/// One new arm, with the concrete type it handles.
#[derive(Clone, Debug)]
pub struct Arm {
    pub concrete: String,
    pub template: usize,
    pub bindings: Bindings,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct Expansion {
    /// In discovery order.
    pub arms: Vec<Arm>,
    /// Types no template matched.
    pub dropped: Vec<String>,
    /// Types skipped because the switch already has an arm for them.
    pub already_handled: Vec<String>,
}

/// Instantiates the first matching template for each distinct concrete type.
pub fn expand(
    dispatch: &DispatchStmt<'_>,
    concrete: &[Type],
    unifier: &Unifier<'_>,
    source: &str,
    renderer: &mut TypeRenderer<'_>,
) -> Result<Expansion, UnsupportedPattern> {
    let mut seen: HashSet<String> = dispatch.handled.iter().cloned().collect();
    let mut expansion = Expansion::default();
    for ty in concrete {
        let identity = ty.identity();
        if dispatch.handled.contains(&identity) && !expansion.already_handled.contains(&identity) {
            debug!("{} already has an arm", identity);
            expansion.already_handled.push(identity.clone());
        }
        if !seen.insert(identity.clone()) {
            continue;
        }
        let Some((template, bindings)) = dispatch.find_match(unifier, ty)? else {
            warn!("no template matches {}; dropped", identity);
            expansion.dropped.push(identity);
            continue;
        };
        let index = dispatch
            .templates
            .iter()
            .position(|t| std::ptr::eq(t, template))
            .unwrap_or_default();
        debug!(
            "{} matched to {} -> {}",
            identity,
            template.pattern.pretty(),
            format_bindings(&bindings)
        );
        let text = instantiate(source, template.clause, &bindings, renderer);
        expansion.arms.push(Arm {
            concrete: identity,
            template: index,
            bindings,
            text,
        });
    }
    Ok(expansion)
}

pub fn format_bindings(bindings: &Bindings) -> String {
    let parts: Vec<String> = bindings
        .iter()
        .map(|(name, ty)| format!("{}={}", name, ty.pretty()))
        .collect();
    format!("[{}]", parts.join(" "))
}

/// The edit placing `arms` ahead of the switch's existing clauses, the most
/// recently discovered first.
pub fn arms_edit(source: &str, sw: &TypeSwitchStmt, arms: &[Arm]) -> Option<Edit> {
    let first = sw.clauses.first()?;
    if arms.is_empty() {
        return None;
    }
    let start = first.span.start;
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let indent = &source[line_start..start];
    let own_line = line_start > sw.lbrace.end && indent.chars().all(|c| c == ' ' || c == '\t');
    let mut text = String::new();
    if own_line {
        for arm in arms.iter().rev() {
            text.push_str(indent);
            text.push_str(&arm.text);
            text.push('\n');
        }
        Some(Edit {
            offset: line_start,
            text,
        })
    } else {
        for arm in arms.iter().rev() {
            text.push_str(&arm.text);
            text.push_str("; ");
        }
        Some(Edit { offset: start, text })
    }
}

/// Import declarations for `paths`, placed after the file's import block.
pub fn imports_edit(program: &Program, file: FileId, paths: &BTreeSet<String>) -> Option<Edit> {
    if paths.is_empty() {
        return None;
    }
    let ast = &program.files[file].ast;
    let lead = if ast.imports.is_empty() { "\n\n" } else { "\n" };
    let text: String = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let sep = if i == 0 { lead } else { "\n" };
            format!("{}import {:?}", sep, path)
        })
        .collect();
    Some(Edit {
        offset: ast.header_end,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::{apply_edits, arms_edit, expand, Edit, TypeRenderer};
    use crate::frontend::ast::{Decl, Stmt, TypeSwitchStmt};
    use crate::sema::types::Type;
    use crate::sema::{Member, Program, SourceInput};
    use crate::template::DispatchStmt;
    use crate::unify::Unifier;
    use indoc::indoc;
    use std::path::PathBuf;

    fn load(files: &[(&str, &str)]) -> Program {
        let inputs = files
            .iter()
            .map(|(path, source)| SourceInput {
                path: PathBuf::from(path),
                source: source.to_string(),
            })
            .collect();
        Program::load(inputs, "+tsgen typevar").expect("load")
    }

    fn first_switch(program: &Program, file: usize) -> &TypeSwitchStmt {
        for decl in &program.files[file].ast.decls {
            if let Decl::Func(func) = decl {
                for stmt in &func.body.as_ref().expect("body").stmts {
                    if let Stmt::TypeSwitch(sw) = stmt {
                        return sw;
                    }
                }
            }
        }
        panic!("no type switch");
    }

    fn var_type(program: &Program, pkg: usize, name: &str) -> Type {
        match program.packages[pkg].scope.get(name) {
            Some(Member::Var(Some(ty))) => ty.clone(),
            other => panic!("no type for {}: {:?}", name, other),
        }
    }

    fn expand_with(program: &Program, file: usize, types: &[Type]) -> String {
        let sw = first_switch(program, file);
        let dispatch = DispatchStmt::new(program, file, sw).expect("dispatch");
        let unifier = Unifier::new(&program.placeholders);
        let source = &program.files[file].source;
        let mut renderer = TypeRenderer::new(program, file);
        let expansion = expand(&dispatch, types, &unifier, source, &mut renderer).expect("expand");
        let edit = arms_edit(source, sw, &expansion.arms).expect("edit");
        apply_edits(source, &[edit])
    }

    #[test]
    fn substitutes_types_and_values_with_parens_where_needed() {
        let program = load(&[(
            "p/p.go",
            indoc! {"
                package p

                type T interface{}

                var (
                \tptr *int
                \tcallback func(int)
                \trecv <-chan int
                )

                func f(v interface{}) {
                \tswitch x := v.(type) {
                \tcase []T:
                \t\tvar c chan T
                \t\t_ = T(x[0])
                \t\t_ = c
                \t}
                }
            "},
        )]);
        let types: Vec<Type> = ["ptr", "callback", "recv"]
            .iter()
            .map(|name| Type::Slice(Box::new(var_type(&program, 0, name))))
            .collect();
        let out = expand_with(&program, 0, &types);
        assert_eq!(
            out,
            indoc! {"
                package p

                type T interface{}

                var (
                \tptr *int
                \tcallback func(int)
                \trecv <-chan int
                )

                func f(v interface{}) {
                \tswitch x := v.(type) {
                \tcase []<-chan int:
                \t\tvar c chan (<-chan int)
                \t\t_ = (<-chan int)(x[0])
                \t\t_ = c
                \tcase []func(int):
                \t\tvar c chan func(int)
                \t\t_ = (func(int))(x[0])
                \t\t_ = c
                \tcase []*int:
                \t\tvar c chan *int
                \t\t_ = (*int)(x[0])
                \t\t_ = c
                \tcase []T:
                \t\tvar c chan T
                \t\t_ = T(x[0])
                \t\t_ = c
                \t}
                }
            "}
        );
    }

    #[test]
    fn inline_clauses_get_semicolon_separators() {
        let program = load(&[(
            "p/p.go",
            "package p\n\ntype T interface{}\n\nvar n int\n\nfunc f(v interface{}) {\n\tswitch v.(type) { case *T: _ = 1 }\n}\n",
        )]);
        let ty = Type::Pointer(Box::new(var_type(&program, 0, "n")));
        let out = expand_with(&program, 0, &[ty]);
        assert!(
            out.contains("switch v.(type) { case *int: _ = 1; case *T: _ = 1 }"),
            "{}",
            out
        );
    }

    #[test]
    fn qualifies_foreign_types_and_requests_imports() {
        let program = load(&[
            ("lib/lib.go", "package lib\n\ntype Item struct{}\n"),
            (
                "app/app.go",
                "package app\n\nimport (\n\t\"example.com/lib\"\n\t\"io\"\n)\n\nvar r io.Reader\nvar items []lib.Item\n",
            ),
            (
                "app/sw.go",
                "package app\n\ntype T interface{}\n\nfunc f(v interface{}) {\n\tswitch v.(type) {\n\tcase []T:\n\t}\n}\n",
            ),
        ]);
        let item = var_type(&program, 1, "items");
        let reader = var_type(&program, 1, "r");
        let mut renderer = TypeRenderer::new(&program, 2);
        assert_eq!(renderer.render(&item), "[]lib.Item");
        assert_eq!(renderer.render(&reader), "io.Reader");
        let missing: Vec<&str> = renderer.missing_imports().iter().map(String::as_str).collect();
        assert_eq!(missing, vec!["example.com/lib", "io"]);

        let mut in_app = TypeRenderer::new(&program, 1);
        assert_eq!(in_app.render(&reader), "io.Reader");
        assert!(in_app.missing_imports().is_empty());
    }

    #[test]
    fn edits_at_equal_offsets_keep_their_order() {
        let edits = vec![
            Edit {
                offset: 1,
                text: "b".to_string(),
            },
            Edit {
                offset: 0,
                text: "<".to_string(),
            },
            Edit {
                offset: 1,
                text: "c".to_string(),
            },
        ];
        assert_eq!(apply_edits("ad", &edits), "<abcd");
    }
}
