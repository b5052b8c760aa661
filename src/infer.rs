use std::collections::HashMap;

use log::debug;

use crate::callgraph::CallGraph;
use crate::error::SkipReason;
use crate::frontend::ast::{FuncDecl, Stmt};
use crate::frontend::suggest::did_you_mean;
use crate::sema::types::Type;
use crate::sema::{FuncId, Program};

/// Ordinal of parameter `name` among the declared parameters.
pub fn param_position(decl: &FuncDecl, name: &str) -> Option<usize> {
    decl.sig
        .param_names()
        .iter()
        .position(|param| param.map_or(false, |ident| ident.name == name))
}

/// Fails when `subject` is declared in the body before the switch at
/// `stmt_index`, or by the switch's own init statement.
pub fn check_subject_scope(body: &[Stmt], stmt_index: usize, subject: &str) -> Result<(), SkipReason> {
    let declares = |stmt: &Stmt| match stmt {
        Stmt::Var(spec) | Stmt::Const(spec) => spec.names.iter().any(|n| n.name == subject),
        Stmt::ShortVar { names, .. } => names.iter().any(|n| n.name == subject),
        Stmt::Type(decl) => decl.name.name == subject,
        _ => false,
    };
    let earlier = body.iter().take(stmt_index).any(|stmt| declares(stmt));
    let in_init = match body.get(stmt_index) {
        Some(Stmt::TypeSwitch(sw)) => sw.init.as_deref().map_or(false, |init| declares(init)),
        _ => false,
    };
    if earlier || in_init {
        return Err(SkipReason::ScopeMismatch(subject.to_string()));
    }
    Ok(())
}

/// Resolves `subject` to a parameter position of `decl`.
pub fn subject_param(decl: &FuncDecl, subject: &str) -> Result<usize, SkipReason> {
    param_position(decl, subject).ok_or_else(|| {
        let names: Vec<String> = decl
            .sig
            .param_names()
            .into_iter()
            .flatten()
            .map(|ident| ident.name.clone())
            .collect();
        SkipReason::ParamNotFound {
            name: subject.to_string(),
            hint: did_you_mean(subject, &names),
        }
    })
}

/// Memoized per (function, parameter position) over one call graph.
pub struct TypeInference<'a> {
    program: &'a Program,
    graph: &'a CallGraph,
    cache: HashMap<(FuncId, usize), Vec<Type>>,
}

impl<'a> TypeInference<'a> {
    pub fn new(program: &'a Program, graph: &'a CallGraph) -> Self {
        TypeInference {
            program,
            graph,
            cache: HashMap::new(),
        }
    }

    /// Distinct wrapped argument types at `pos`, in edge order.
    pub fn argument_types(&mut self, func: FuncId, pos: usize) -> &[Type] {
        let (program, graph) = (self.program, self.graph);
        self.cache.entry((func, pos)).or_insert_with(|| {
            let mut out: Vec<Type> = Vec::new();
            for edge in graph.edges_into(func) {
                let Some(ty) = graph.wrapped_argument_type(program, edge, pos) else {
                    continue;
                };
                debug!(
                    "argument type: {} (from {})",
                    ty.pretty(),
                    program.funcs[edge.caller].name
                );
                if !out.iter().any(|seen| seen.identity() == ty.identity()) {
                    out.push(ty);
                }
            }
            out
        })
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
