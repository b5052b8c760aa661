// Purpose: Drive one expansion pass: load sources, build the call graph, rewrite every type switch, emit files.
// Inputs/Outputs: Takes source inputs plus options; produces per-switch reports and routes file contents to a target.
// Invariants: All outputs are computed before the first write, so a fatal error leaves every file untouched.
// Gotchas: Only top-level type switches of function bodies are considered; nested switches stay as written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::callgraph::CallGraph;
use crate::error::{GenError, SkipReason};
use crate::expand::{apply_edits, arms_edit, expand, imports_edit, Edit, TypeRenderer};
use crate::frontend::ast::{Decl, FuncDecl, Stmt, TypeSwitchStmt};
use crate::infer::{check_subject_scope, subject_param, TypeInference};
use crate::sema::placeholder::DEFAULT_MARKER;
use crate::sema::{FileId, Program, SourceInput};
use crate::template::DispatchStmt;
use crate::unify::Unifier;

#[derive(Clone, Debug)]
pub struct Options {
    /// Package whose entry points root the call graph; the first loaded package otherwise.
    pub main: Option<String>,
    pub marker: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            main: None,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Loaded inputs plus the files the user named.
#[derive(Debug, Default)]
pub struct SourceSet {
    pub inputs: Vec<SourceInput>,
    pub targets: BTreeSet<PathBuf>,
}

/// Reads every `.go` file in the directory of each path. Named files come
/// first in argument order; their siblings follow sorted by name.
pub fn collect_sources(paths: &[PathBuf]) -> Result<SourceSet, GenError> {
    let mut named = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = go_files_in(path)?;
            named.extend(entries);
            push_unique(&mut dirs, path.clone());
            continue;
        }
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let normalized = match path.file_name() {
            Some(name) => dir.join(name),
            None => path.clone(),
        };
        push_unique(&mut named, normalized);
        push_unique(&mut dirs, dir);
    }

    let mut ordered = named.clone();
    for dir in &dirs {
        for sibling in go_files_in(dir)? {
            push_unique(&mut ordered, sibling);
        }
    }
    if ordered.is_empty() {
        return Err(GenError::NoPackages);
    }

    let mut inputs = Vec::with_capacity(ordered.len());
    for path in ordered {
        let source = fs::read_to_string(&path).map_err(|source| GenError::Io {
            path: path.clone(),
            source,
        })?;
        inputs.push(SourceInput { path, source });
    }
    Ok(SourceSet {
        inputs,
        targets: named.into_iter().collect(),
    })
}

fn go_files_in(dir: &Path) -> Result<Vec<PathBuf>, GenError> {
    let io_err = |source| GenError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "go") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    if !list.contains(&path) {
        list.push(path);
    }
}

/// How far a type switch got before it was expanded or skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unprocessed,
    TemplatesExtracted,
    TypesInferred,
    Expanded,
}

#[derive(Clone, Debug)]
pub struct RewriteReport {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    /// Enclosing function.
    pub function: String,
    pub stage: Stage,
    pub skipped: Option<SkipReason>,
    /// Concrete types that received a new arm, in discovery order.
    pub arms_added: Vec<String>,
    pub dropped: Vec<String>,
    /// Concrete types an existing arm already covers.
    pub already_handled: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileOutput {
    pub path: PathBuf,
    pub contents: String,
    pub changed: bool,
}

/// Decides which files are emitted and where they go.
pub trait FileTarget {
    fn accepts(&self, path: &Path) -> bool;
    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()>;
    /// Whether files without new arms are emitted too.
    fn writes_unchanged(&self) -> bool {
        true
    }
}

/// Prints accepted files to standard output.
pub struct StdoutTarget {
    targets: BTreeSet<PathBuf>,
}

impl StdoutTarget {
    pub fn new(targets: BTreeSet<PathBuf>) -> Self {
        StdoutTarget { targets }
    }
}

impl FileTarget for StdoutTarget {
    fn accepts(&self, path: &Path) -> bool {
        self.targets.contains(path)
    }

    fn write(&mut self, _path: &Path, contents: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        out.write_all(contents.as_bytes())?;
        out.flush()
    }
}

/// Rewrites accepted files on disk, leaving unchanged ones alone.
pub struct InPlaceTarget {
    targets: BTreeSet<PathBuf>,
}

impl InPlaceTarget {
    pub fn new(targets: BTreeSet<PathBuf>) -> Self {
        InPlaceTarget { targets }
    }
}

impl FileTarget for InPlaceTarget {
    fn accepts(&self, path: &Path) -> bool {
        self.targets.contains(path)
    }

    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn writes_unchanged(&self) -> bool {
        false
    }
}

/// Collects outputs in memory. Accepts everything unless restricted.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    pub only: Option<BTreeSet<PathBuf>>,
    pub outputs: BTreeMap<PathBuf, String>,
}

impl FileTarget for MemoryTarget {
    fn accepts(&self, path: &Path) -> bool {
        self.only.as_ref().map_or(true, |only| only.contains(path))
    }

    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        self.outputs.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

/// One analysed program, ready to expand.
pub struct Gen {
    program: Program,
    graph: CallGraph,
}

impl Gen {
    pub fn from_sources(inputs: Vec<SourceInput>, options: Options) -> Result<Gen, GenError> {
        let program = Program::load(inputs, &options.marker)?;
        let graph = CallGraph::build(&program, options.main.as_deref())?;
        Ok(Gen { program, graph })
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    /// Rewrites every accepted file, then hands the results to `target`.
    pub fn expand(&self, target: &mut dyn FileTarget) -> Result<Vec<RewriteReport>, GenError> {
        let (outputs, reports) = self.rewrite(|path| target.accepts(path));
        for output in &outputs {
            if !output.changed && !target.writes_unchanged() {
                continue;
            }
            target
                .write(&output.path, &output.contents)
                .map_err(|source| GenError::Io {
                    path: output.path.clone(),
                    source,
                })?;
        }
        Ok(reports)
    }

    /// Computes the new contents of every file `accepts` admits, in
    /// package then file order. Nothing is written.
    pub fn rewrite(&self, accepts: impl Fn(&Path) -> bool) -> (Vec<FileOutput>, Vec<RewriteReport>) {
        let mut inference = TypeInference::new(&self.program, &self.graph);
        let unifier = Unifier::new(&self.program.placeholders);
        let mut outputs = Vec::new();
        let mut reports = Vec::new();
        for package in &self.program.packages {
            for &file in &package.files {
                if !accepts(&self.program.files[file].path) {
                    continue;
                }
                outputs.push(self.rewrite_file(file, &mut inference, &unifier, &mut reports));
            }
        }
        debug!(
            "{} file(s) rewritten, {} type switch(es) seen, {} parameter(s) inferred",
            outputs.iter().filter(|o| o.changed).count(),
            reports.len(),
            inference.cached()
        );
        (outputs, reports)
    }

    fn rewrite_file(
        &self,
        file: FileId,
        inference: &mut TypeInference<'_>,
        unifier: &Unifier<'_>,
        reports: &mut Vec<RewriteReport>,
    ) -> FileOutput {
        let source_file = &self.program.files[file];
        let mut edits: Vec<Edit> = Vec::new();
        let mut imports = BTreeSet::new();
        for (decl_index, decl) in source_file.ast.decls.iter().enumerate() {
            let Decl::Func(func) = decl else {
                continue;
            };
            let Some(body) = &func.body else {
                continue;
            };
            for (stmt_index, stmt) in body.stmts.iter().enumerate() {
                let Stmt::TypeSwitch(node) = stmt else {
                    continue;
                };
                let site = SwitchSite {
                    file,
                    decl_index,
                    func,
                    body: &body.stmts,
                    stmt_index,
                    node,
                };
                let mut report = RewriteReport {
                    path: source_file.path.clone(),
                    line: node.span.line,
                    column: node.span.column,
                    function: func.name.name.clone(),
                    stage: Stage::Unprocessed,
                    skipped: None,
                    arms_added: Vec::new(),
                    dropped: Vec::new(),
                    already_handled: Vec::new(),
                };
                match self.rewrite_switch(&site, inference, unifier, &mut report, &mut imports) {
                    Ok(edit) => edits.extend(edit),
                    Err(reason) => {
                        let hint = match &reason {
                            SkipReason::ParamNotFound { hint: Some(hint), .. } => format!(" ({})", hint),
                            _ => String::new(),
                        };
                        warn!(
                            "{}:{}:{}: type switch skipped: {}{}",
                            source_file.display_path(),
                            report.line,
                            report.column,
                            reason,
                            hint
                        );
                        report.skipped = Some(reason);
                    }
                }
                reports.push(report);
            }
        }
        edits.extend(imports_edit(&self.program, file, &imports));
        let contents = apply_edits(&source_file.source, &edits);
        FileOutput {
            path: source_file.path.clone(),
            changed: contents != source_file.source,
            contents,
        }
    }

    fn rewrite_switch(
        &self,
        site: &SwitchSite<'_>,
        inference: &mut TypeInference<'_>,
        unifier: &Unifier<'_>,
        report: &mut RewriteReport,
        imports: &mut BTreeSet<String>,
    ) -> Result<Option<Edit>, SkipReason> {
        let program = &self.program;
        let source_file = &program.files[site.file];
        let dispatch = DispatchStmt::new(program, site.file, site.node)?;
        report.stage = Stage::TemplatesExtracted;
        debug!(
            "{}:{}:{}: {} template(s) on `{}` in {}",
            source_file.display_path(),
            report.line,
            report.column,
            dispatch.templates.len(),
            dispatch.subject,
            report.function
        );

        check_subject_scope(site.body, site.stmt_index, &dispatch.subject)?;
        let position = subject_param(site.func, &dispatch.subject)?;
        let func = program
            .func_at(site.file, site.decl_index)
            .ok_or(SkipReason::UnknownFunction)?;
        let concrete = inference.argument_types(func, position).to_vec();
        report.stage = Stage::TypesInferred;
        if !self.graph.is_reachable(func) {
            debug!(
                "{}:{}:{}: {} is unreachable from the entry points",
                source_file.display_path(),
                report.line,
                report.column,
                report.function
            );
        }

        let mut renderer = TypeRenderer::new(program, site.file);
        let expansion = expand(&dispatch, &concrete, unifier, &source_file.source, &mut renderer)
            .map_err(|err| SkipReason::UnsupportedPattern(err.shape))?;
        report.stage = Stage::Expanded;
        imports.extend(renderer.missing_imports().iter().cloned());
        report.arms_added = expansion.arms.iter().map(|arm| arm.concrete.clone()).collect();
        report.dropped = expansion.dropped;
        report.already_handled = expansion.already_handled;
        Ok(arms_edit(&source_file.source, site.node, &expansion.arms))
    }
}

struct SwitchSite<'f> {
    file: FileId,
    decl_index: usize,
    func: &'f FuncDecl,
    body: &'f [Stmt],
    stmt_index: usize,
    node: &'f TypeSwitchStmt,
}

#[cfg(test)]
mod tests {
    use super::{collect_sources, Gen, MemoryTarget, Options, Stage};
    use crate::error::SkipReason;
    use crate::sema::SourceInput;
    use indoc::indoc;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn input(path: &str, source: &str) -> SourceInput {
        SourceInput {
            path: PathBuf::from(path),
            source: source.to_string(),
        }
    }

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time drift")
            .as_nanos();
        std::env::temp_dir().join(format!("tsgen-{}-{}-{}", prefix, std::process::id(), nonce))
    }

    const PROGRAM: &str = indoc! {"
        package main

        type T interface{}

        func show(v interface{}) string {
        \tswitch x := v.(type) {
        \tcase *T:
        \t\t_ = x
        \t\treturn \"ptr\"
        \t}
        \treturn \"\"
        }

        func main() {
        \tn := 1
        \tshow(&n)
        \tshow(&n)
        \tshow(\"s\")
        }
    "};

    #[test]
    fn expands_and_reports_each_switch() {
        let gen = Gen::from_sources(vec![input("m/main.go", PROGRAM)], Options::default()).expect("gen");
        let mut target = MemoryTarget::default();
        let reports = gen.expand(&mut target).expect("expand");

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.function, "show");
        assert_eq!(report.stage, Stage::Expanded);
        assert_eq!(report.arms_added, vec!["*int".to_string()]);
        assert_eq!(report.dropped, vec!["string".to_string()]);

        let out = &target.outputs[&PathBuf::from("m/main.go")];
        assert!(
            out.contains("\tcase *int:\n\t\t_ = x\n\t\treturn \"ptr\"\n\tcase *T:"),
            "unexpected output:\n{}",
            out
        );
    }

    #[test]
    fn skipped_switch_leaves_the_file_alone() {
        let source = PROGRAM.replace("switch x := v.(type)", "switch x := w.(type)");
        let gen = Gen::from_sources(vec![input("m/main.go", &source)], Options::default()).expect("gen");
        let (outputs, reports) = gen.rewrite(|_| true);
        assert!(!outputs[0].changed);
        assert_eq!(outputs[0].contents, source);
        assert_eq!(reports[0].stage, Stage::TemplatesExtracted);
        assert!(matches!(
            &reports[0].skipped,
            Some(SkipReason::ParamNotFound { name, .. }) if name == "w"
        ));
    }

    #[test]
    fn unknown_entry_package_is_fatal() {
        let err = Gen::from_sources(
            vec![input("m/main.go", PROGRAM)],
            Options {
                main: Some("nope".to_string()),
                ..Options::default()
            },
        )
        .err()
        .expect("unknown entry");
        assert_eq!(err.to_string(), "entry package `nope` is not among the loaded packages");
    }

    #[test]
    fn unaccepted_files_are_not_emitted() {
        let gen = Gen::from_sources(vec![input("m/main.go", PROGRAM)], Options::default()).expect("gen");
        let mut target = MemoryTarget {
            only: Some(Default::default()),
            ..MemoryTarget::default()
        };
        let reports = gen.expand(&mut target).expect("expand");
        assert!(reports.is_empty());
        assert!(target.outputs.is_empty());
    }

    #[test]
    fn collects_named_files_first_then_siblings() {
        let dir = temp_dir("collect");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("b.go"), "package p\n").expect("write b");
        fs::write(dir.join("a.go"), "package p\n").expect("write a");
        fs::write(dir.join("c_test.go"), "package p\n").expect("write c");
        fs::write(dir.join("notes.txt"), "ignored").expect("write txt");

        let set = collect_sources(&[dir.join("b.go")]).expect("collect");
        let names: Vec<String> = set
            .inputs
            .iter()
            .map(|i| i.path.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.go", "a.go", "c_test.go"]);
        assert_eq!(set.targets.len(), 1);
        assert!(set.targets.contains(&dir.join("b.go")));

        let _ = fs::remove_dir_all(&dir);
    }
}
