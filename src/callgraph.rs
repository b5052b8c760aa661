// Purpose: Whole-program call graph built once per rewrite pass.
// Inputs/Outputs: Takes the loaded program and an optional entry package; answers edges-into and argument-type queries.
// Invariants: Only calls inside functions reachable from the roots produce edges; edge order is caller id then site order.
// Gotchas: Interface method calls are not resolved, so types that only flow through them are missed.

use std::collections::VecDeque;

use log::debug;

use crate::error::GenError;
use crate::sema::check::{check_function, CallSite, FuncFacts};
use crate::sema::types::Type;
use crate::sema::{FuncId, PackageId, Program};

const TEST_PREFIXES: [&str; 4] = ["Test", "Benchmark", "Example", "Fuzz"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallEdge {
    pub caller: FuncId,
    pub callee: FuncId,
    /// Index into the caller's call sites.
    pub site: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootKind {
    Main,
    TestMain,
}

#[derive(Debug)]
pub struct CallGraph {
    facts: Vec<FuncFacts>,
    reachable: Vec<bool>,
    edges: Vec<CallEdge>,
    roots: Vec<FuncId>,
    root_kind: RootKind,
}

impl CallGraph {
    pub fn build(program: &Program, entry: Option<&str>) -> Result<CallGraph, GenError> {
        let package = match entry {
            Some(name) => program
                .package_by_name(name)
                .ok_or_else(|| GenError::UnknownEntry(name.to_string()))?,
            None if program.packages.is_empty() => return Err(GenError::NoPackages),
            None => 0,
        };
        let (root_kind, roots) = select_roots(program, package)?;
        let facts: Vec<FuncFacts> = (0..program.funcs.len())
            .map(|id| check_function(program, id))
            .collect();

        let mut reachable = vec![false; program.funcs.len()];
        let mut queue: VecDeque<FuncId> = roots.iter().copied().collect();
        while let Some(func) = queue.pop_front() {
            if std::mem::replace(&mut reachable[func], true) {
                continue;
            }
            let f = &facts[func];
            let next = f.calls.iter().flat_map(|site| site.callees.iter()).chain(&f.refs);
            queue.extend(next.copied().filter(|&id| !reachable[id]));
        }

        let mut edges = Vec::new();
        for (caller, f) in facts.iter().enumerate() {
            if !reachable[caller] {
                continue;
            }
            for (site, call) in f.calls.iter().enumerate() {
                edges.extend(call.callees.iter().map(|&callee| CallEdge { caller, callee, site }));
            }
        }
        debug!(
            "call graph rooted at {} function(s) of package {} ({:?}): {} reachable, {} edge(s)",
            roots.len(),
            program.packages[package].name,
            root_kind,
            reachable.iter().filter(|r| **r).count(),
            edges.len()
        );
        Ok(CallGraph {
            facts,
            reachable,
            edges,
            roots,
            root_kind,
        })
    }

    pub fn edges_into(&self, func: FuncId) -> impl Iterator<Item = &CallEdge> + '_ {
        self.edges.iter().filter(move |edge| edge.callee == func)
    }

    pub fn site(&self, edge: &CallEdge) -> Option<&CallSite> {
        self.facts.get(edge.caller)?.calls.get(edge.site)
    }

    pub fn is_reachable(&self, func: FuncId) -> bool {
        self.reachable.get(func).copied().unwrap_or(false)
    }

    pub fn roots(&self) -> &[FuncId] {
        &self.roots
    }

    pub fn root_kind(&self) -> RootKind {
        self.root_kind
    }

    /// Static type of argument `pos` when the call wraps a concrete value into
    /// the callee's interface-typed parameter.
    pub fn wrapped_argument_type(&self, program: &Program, edge: &CallEdge, pos: usize) -> Option<Type> {
        let site = self.site(edge)?;
        let param = program.funcs.get(edge.callee)?.sig.param_type_at(pos, site.spread)?;
        if !program.types.is_interface(&param) {
            return None;
        }
        let arg = site.args.get(pos)?.as_ref()?;
        if arg.is_untyped_nil() || arg.contains_invalid() {
            return None;
        }
        if arg.contains_local() {
            // no spelling of it is valid in another function
            debug!("{} declares its type locally; not a dispatch candidate", arg.pretty());
            return None;
        }
        let arg = arg.clone().defaulted();
        match &arg {
            Type::Named(named) if named.is_opaque() => None,
            _ if program.types.is_interface(&arg) => None,
            _ => Some(arg),
        }
    }
}

fn select_roots(program: &Program, package: PackageId) -> Result<(RootKind, Vec<FuncId>), GenError> {
    let top_level = |id: &FuncId| program.funcs[*id].recv.is_none();
    let inits = (0..program.funcs.len()).filter(|id| top_level(id) && program.funcs[*id].name == "init");
    let main = (0..program.funcs.len())
        .find(|id| top_level(id) && program.funcs[*id].package == package && program.funcs[*id].name == "main");
    if let Some(main) = main {
        return Ok((RootKind::Main, std::iter::once(main).chain(inits).collect()));
    }

    // External test packages share the directory of the package under test.
    let dir = &program.packages[package].dir;
    let tests: Vec<FuncId> = (0..program.funcs.len())
        .filter(|id| {
            let info = &program.funcs[*id];
            top_level(id) && program.packages[info.package].dir == *dir && is_test_func(&info.name)
        })
        .collect();
    if tests.is_empty() {
        return Err(GenError::NoEntryPoint(program.packages[package].name.clone()));
    }
    Ok((RootKind::TestMain, tests.into_iter().chain(inits).collect()))
}

/// `TestXxx`, `BenchmarkXxx`, `ExampleXxx`, `FuzzXxx`, where `Xxx` does not
/// start with a lower-case letter.
pub fn is_test_func(name: &str) -> bool {
    TEST_PREFIXES.iter().any(|prefix| match name.strip_prefix(prefix) {
        Some(rest) => !rest.starts_with(|c: char| c.is_lowercase()),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::{is_test_func, CallGraph, RootKind};
    use crate::error::GenError;
    use crate::sema::{Program, SourceInput};
    use std::path::PathBuf;

    fn program(files: &[(&str, &str)]) -> Program {
        let inputs = files
            .iter()
            .map(|(path, source)| SourceInput {
                path: PathBuf::from(path),
                source: source.to_string(),
            })
            .collect();
        Program::load(inputs, "+tsgen typevar").expect("load")
    }

    fn func(program: &Program, name: &str) -> usize {
        program.funcs.iter().position(|f| f.name == name).expect("function")
    }

    #[test]
    fn only_reachable_callers_contribute_edges() {
        let p = program(&[(
            "m/main.go",
            "package main\n\nfunc sink(x interface{}) {}\n\nfunc helper() { sink(1.5) }\n\nfunc dead() { sink(\"no\") }\n\nfunc init() { sink(true) }\n\nfunc main() {\n\tsink(1)\n\th := helper\n\th()\n}\n",
        )]);
        let graph = CallGraph::build(&p, None).expect("graph");
        assert_eq!(graph.root_kind(), RootKind::Main);
        assert!(!graph.is_reachable(func(&p, "dead")));
        let sink = func(&p, "sink");
        let got: Vec<String> = graph
            .edges_into(sink)
            .filter_map(|edge| graph.wrapped_argument_type(&p, edge, 0))
            .map(|t| t.identity())
            .collect();
        assert_eq!(got, vec!["float64", "bool", "int"]);
    }

    #[test]
    fn falls_back_to_test_functions() {
        let p = program(&[
            ("e/e.go", "package e\n\nfunc f(x interface{}) {}\n"),
            ("e/e_test.go", "package e\n\nimport \"testing\"\n\nfunc TestF(t *testing.T) { f(1) }\n"),
        ]);
        let graph = CallGraph::build(&p, None).expect("graph");
        assert_eq!(graph.root_kind(), RootKind::TestMain);
        assert_eq!(graph.roots(), &[func(&p, "TestF")]);
    }

    #[test]
    fn missing_roots_are_fatal() {
        let p = program(&[("e/e.go", "package e\n\nfunc f(x interface{}) {}\n")]);
        assert!(matches!(CallGraph::build(&p, None), Err(GenError::NoEntryPoint(name)) if name == "e"));
        assert!(matches!(CallGraph::build(&p, Some("nope")), Err(GenError::UnknownEntry(_))));
    }

    #[test]
    fn skips_arguments_that_are_not_wrapped() {
        let p = program(&[(
            "m/main.go",
            "package main\n\nimport \"io\"\n\ntype R interface{ Read() }\n\nfunc sink(x interface{}, n int, rest ...interface{}) {}\n\nfunc main() {\n\tvar r R\n\tvar w io.Writer\n\tvar any interface{}\n\tsink(r, 1)\n\tsink(w, 2)\n\tsink(any, 3)\n\tsink(nil, 4, \"a\", 'b')\n\tsink(5, 6, []interface{}{}...)\n}\n",
        )]);
        let graph = CallGraph::build(&p, None).expect("graph");
        let sink = func(&p, "sink");
        let at = |pos: usize| -> Vec<String> {
            graph
                .edges_into(sink)
                .filter_map(|edge| graph.wrapped_argument_type(&p, edge, pos))
                .map(|t| t.identity())
                .collect()
        };
        assert_eq!(at(0), vec!["int"]);
        assert!(at(1).is_empty());
        assert_eq!(at(2), vec!["string"]);
        assert_eq!(at(3), vec!["int32"]);
    }

    #[test]
    fn recognizes_test_function_names() {
        assert!(is_test_func("TestFoo"));
        assert!(is_test_func("Test"));
        assert!(is_test_func("Example_suffix"));
        assert!(!is_test_func("Testify"));
        assert!(!is_test_func("helper"));
    }
}
