use std::collections::HashMap;

use crate::frontend::ast::{CommentGroup, TypeDecl};

use super::types::{NamedType, Type, TypeId};
use super::Program;

pub const DEFAULT_MARKER: &str = "+tsgen typevar";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderReason {
    /// An all-caps name declared as the empty interface.
    UpperCaseEmptyInterface,
    /// Carries the marker comment.
    Annotated,
}

/// Which declared types act as type variables in templates.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderIndex {
    by_type: HashMap<TypeId, PlaceholderReason>,
}

impl PlaceholderIndex {
    pub fn build(program: &Program, marker: &str) -> Self {
        let mut by_type = HashMap::new();
        for (id, decl) in program.type_decls() {
            let Some(named) = program.types.named_type(id) else {
                continue;
            };
            let name = &decl.name.name;
            let empty = matches!(program.types.underlying(&named), Some(Type::Interface(m)) if m.is_empty());
            if empty && *name == name.to_uppercase() {
                by_type.insert(id, PlaceholderReason::UpperCaseEmptyInterface);
            } else if is_annotated(decl, marker) {
                by_type.insert(id, PlaceholderReason::Annotated);
            }
        }
        PlaceholderIndex { by_type }
    }

    pub fn reason(&self, named: &NamedType) -> Option<PlaceholderReason> {
        self.by_type.get(&named.id?).copied()
    }

    pub fn is_placeholder(&self, named: &NamedType) -> bool {
        self.reason(named).is_some()
    }

    /// True when any named type inside `ty` is a placeholder.
    pub fn occurs_in(&self, ty: &Type) -> bool {
        match ty {
            Type::Named(named) => self.is_placeholder(named),
            Type::Basic(_) | Type::Invalid => false,
            Type::Pointer(elem) | Type::Array(elem, _) | Type::Slice(elem) | Type::Chan(_, elem) => {
                self.occurs_in(elem)
            }
            Type::Map(key, value) => self.occurs_in(key) || self.occurs_in(value),
            Type::Signature(sig) => sig.params.iter().chain(&sig.results).any(|t| self.occurs_in(t)),
            Type::Struct(fields) => fields.iter().any(|f| self.occurs_in(&f.ty)),
            Type::Tuple(items) => items.iter().any(|t| self.occurs_in(t)),
            Type::Interface(methods) => methods
                .iter()
                .any(|m| m.sig.params.iter().chain(&m.sig.results).any(|t| self.occurs_in(t))),
        }
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

fn is_annotated(decl: &TypeDecl, marker: &str) -> bool {
    [&decl.group_doc, &decl.doc, &decl.line_comment]
        .into_iter()
        .flatten()
        .any(|group| has_marker(group, marker))
}

pub fn has_marker(group: &CommentGroup, marker: &str) -> bool {
    group.lines().any(|line| line.starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::{PlaceholderReason, DEFAULT_MARKER};
    use crate::sema::{Program, SourceInput};
    use std::path::PathBuf;

    fn reasons(source: &str) -> Vec<(String, Option<PlaceholderReason>)> {
        let program = Program::load(
            vec![SourceInput {
                path: PathBuf::from("p/p.go"),
                source: source.to_string(),
            }],
            DEFAULT_MARKER,
        )
        .expect("load");
        program
            .types
            .iter()
            .map(|def| (def.named.name.clone(), program.placeholders.reason(&def.named)))
            .collect()
    }

    #[test]
    fn classifies_type_variables() {
        let got = reasons(
            "package p\n\ntype T interface{}\ntype S any\ntype Lower interface{}\ntype R interface{ Read() }\n\n// NumT is a number.\n// +tsgen typevar\ntype NumT interface{}\n\ntype Key int // +tsgen typevar\n\n// +tsgen typevar\ntype (\n\tElem struct{}\n)\n",
        );
        assert_eq!(
            got,
            vec![
                ("T".to_string(), Some(PlaceholderReason::UpperCaseEmptyInterface)),
                ("S".to_string(), Some(PlaceholderReason::UpperCaseEmptyInterface)),
                ("Lower".to_string(), None),
                ("R".to_string(), None),
                ("NumT".to_string(), Some(PlaceholderReason::Annotated)),
                ("Key".to_string(), Some(PlaceholderReason::Annotated)),
                ("Elem".to_string(), Some(PlaceholderReason::Annotated)),
            ]
        );
    }
}
