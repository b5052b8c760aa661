use std::collections::BTreeMap;

use thiserror::Error;

use crate::sema::placeholder::PlaceholderIndex;
use crate::sema::types::{Field, Signature, Type};

/// Placeholder name to the concrete type it stands for.
pub type Bindings = BTreeMap<String, Type>;

/// The pattern contains a shape the matcher has no rule for.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unsupported pattern shape `{shape}`")]
pub struct UnsupportedPattern {
    pub shape: String,
}

pub struct Unifier<'a> {
    placeholders: &'a PlaceholderIndex,
}

impl<'a> Unifier<'a> {
    pub fn new(placeholders: &'a PlaceholderIndex) -> Self {
        Unifier { placeholders }
    }

    /// Matches with fresh bindings, returning them on success.
    pub fn matches(&self, pattern: &Type, concrete: &Type) -> Result<Option<Bindings>, UnsupportedPattern> {
        let mut bindings = Bindings::new();
        Ok(self.unify(pattern, concrete, &mut bindings)?.then_some(bindings))
    }

    /// Extends `bindings` while matching. On `Ok(false)` the bindings are
    /// partial and must be discarded.
    ///
    /// A placeholder seen twice must bind the same type both times.
    pub fn unify(&self, pattern: &Type, concrete: &Type, bindings: &mut Bindings) -> Result<bool, UnsupportedPattern> {
        match pattern {
            Type::Named(named) if self.placeholders.is_placeholder(named) => {
                match bindings.get(&named.name) {
                    Some(bound) => Ok(bound.identity() == concrete.identity()),
                    None => {
                        bindings.insert(named.name.clone(), concrete.clone());
                        Ok(true)
                    }
                }
            }
            Type::Named(_) => Ok(matches!(concrete, Type::Named(_)) && pattern.identity() == concrete.identity()),
            Type::Basic(kind) => Ok(matches!(concrete, Type::Basic(other) if other == kind)),
            Type::Pointer(elem) => match concrete {
                Type::Pointer(other) => self.unify(elem, other, bindings),
                _ => Ok(false),
            },
            Type::Slice(elem) => match concrete {
                Type::Slice(other) => self.unify(elem, other, bindings),
                _ => Ok(false),
            },
            Type::Array(elem, len) => match concrete {
                Type::Array(other, other_len) if len == other_len => self.unify(elem, other, bindings),
                _ => Ok(false),
            },
            Type::Chan(dir, elem) => match concrete {
                Type::Chan(other_dir, other) if dir == other_dir => self.unify(elem, other, bindings),
                _ => Ok(false),
            },
            Type::Map(key, value) => match concrete {
                Type::Map(other_key, other_value) => {
                    Ok(self.unify(key, other_key, bindings)? && self.unify(value, other_value, bindings)?)
                }
                _ => Ok(false),
            },
            Type::Signature(sig) => match concrete {
                Type::Signature(other) => self.unify_signature(sig, other, bindings),
                _ => Ok(false),
            },
            Type::Struct(fields) => match concrete {
                Type::Struct(other) => self.unify_fields(fields, other, bindings),
                _ => Ok(false),
            },
            Type::Tuple(items) => match concrete {
                Type::Tuple(other) => self.unify_all(items, other, bindings),
                _ => Ok(false),
            },
            Type::Interface(_) => Ok(matches!(concrete, Type::Interface(_)) && pattern.identity() == concrete.identity()),
            Type::Invalid => Err(UnsupportedPattern {
                shape: pattern.identity(),
            }),
        }
    }

    fn unify_signature(&self, sig: &Signature, other: &Signature, bindings: &mut Bindings) -> Result<bool, UnsupportedPattern> {
        if sig.variadic != other.variadic {
            return Ok(false);
        }
        Ok(self.unify_all(&sig.params, &other.params, bindings)?
            && self.unify_all(&sig.results, &other.results, bindings)?)
    }

    /// Field names are ignored; fields match by position.
    fn unify_fields(&self, fields: &[Field], other: &[Field], bindings: &mut Bindings) -> Result<bool, UnsupportedPattern> {
        if fields.len() != other.len() {
            return Ok(false);
        }
        for (field, concrete) in fields.iter().zip(other) {
            if !self.unify(&field.ty, &concrete.ty, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn unify_all(&self, items: &[Type], other: &[Type], bindings: &mut Bindings) -> Result<bool, UnsupportedPattern> {
        if items.len() != other.len() {
            return Ok(false);
        }
        for (item, concrete) in items.iter().zip(other) {
            if !self.unify(item, concrete, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bindings, Unifier, UnsupportedPattern};
    use crate::sema::types::Type;
    use crate::sema::{Program, SourceInput};
    use std::path::PathBuf;

    const DECLS: &str = "package p\n\nimport \"io\"\n\ntype T interface{}\ntype S interface{}\ntype foo struct{}\n\nvar (\n";

    /// Loads `name type` pairs as package variables and returns their types.
    fn types_of(vars: &[(&str, &str)]) -> (Program, Vec<Type>) {
        let mut source = DECLS.to_string();
        for (name, ty) in vars {
            source.push_str(&format!("\t{} {}\n", name, ty));
        }
        source.push_str(")\n\nvar _ io.Reader\n");
        let program = Program::load(
            vec![SourceInput {
                path: PathBuf::from("p/p.go"),
                source,
            }],
            "+tsgen typevar",
        )
        .expect("load");
        let types = vars
            .iter()
            .map(|(name, _)| match program.packages[0].scope.get(*name) {
                Some(crate::sema::Member::Var(Some(ty))) => ty.clone(),
                other => panic!("no type for {}: {:?}", name, other),
            })
            .collect();
        (program, types)
    }

    fn bound(bindings: &Bindings) -> Vec<(String, String)> {
        bindings.iter().map(|(k, v)| (k.clone(), v.identity())).collect()
    }

    fn pair(pattern: &str, concrete: &str) -> Result<Option<Vec<(String, String)>>, UnsupportedPattern> {
        let (program, types) = types_of(&[("pat", pattern), ("con", concrete)]);
        let unifier = Unifier::new(&program.placeholders);
        Ok(unifier.matches(&types[0], &types[1])?.map(|b| bound(&b)))
    }

    fn binds(pattern: &str, concrete: &str) -> Vec<(String, String)> {
        pair(pattern, concrete)
            .expect("supported")
            .unwrap_or_else(|| panic!("{} should match {}", pattern, concrete))
    }

    fn rejects(pattern: &str, concrete: &str) {
        assert_eq!(pair(pattern, concrete).expect("supported"), None, "{} vs {}", pattern, concrete);
    }

    fn b(name: &str, ty: &str) -> (String, String) {
        (name.to_string(), ty.to_string())
    }

    #[test]
    fn binds_placeholders_inside_composites() {
        assert_eq!(binds("map[string]T", "map[string][]io.Reader"), vec![b("T", "[]io.Reader")]);
        assert_eq!(binds("map[T]bool", "map[int]bool"), vec![b("T", "int")]);
        assert_eq!(binds("[]chan<- T", "[]chan<- *foo"), vec![b("T", "*p.foo")]);
        assert_eq!(binds("*T", "*struct{}"), vec![b("T", "struct{}")]);
        assert_eq!(binds("[3]T", "[3]string"), vec![b("T", "string")]);
        assert_eq!(
            binds("func(T) (S, error)", "func(bool) (io.Reader, error)"),
            vec![b("S", "io.Reader"), b("T", "bool")]
        );
        assert_eq!(
            binds("func(T) (S, error)", "func(int) (bool, error)"),
            vec![b("S", "bool"), b("T", "int")]
        );
    }

    #[test]
    fn struct_fields_match_by_position() {
        assert_eq!(binds("struct{ a T }", "struct{ b int }"), vec![b("T", "int")]);
        rejects("struct{ a T }", "struct{ a int; b int }");
    }

    #[test]
    fn wrapper_kinds_never_cross() {
        rejects("[]T", "map[int]int");
        rejects("*T", "[]int");
        rejects("[3]T", "[4]int");
        rejects("chan T", "chan<- int");
        rejects("func(T)", "func(int) bool");
        rejects("func(...T)", "func([]int)");
        rejects("map[string]T", "map[int]int");
    }

    #[test]
    fn concrete_parts_must_be_identical() {
        rejects("[]int", "[]int64");
        rejects("[]foo", "[]struct{}");
        assert_eq!(binds("[]foo", "[]foo"), Vec::new());
        rejects("interface{ Read() }", "interface{}");
        assert_eq!(binds("error", "error"), Vec::new());
    }

    #[test]
    fn repeated_placeholder_must_agree() {
        assert_eq!(binds("map[T]T", "map[int]int"), vec![b("T", "int")]);
        rejects("map[T]T", "map[int]string");
    }

    #[test]
    fn unresolvable_pattern_is_reported() {
        let err = pair("[]missing.Thing", "[]int").expect_err("must be unsupported");
        assert_eq!(err.shape, "invalid type");
    }
}
