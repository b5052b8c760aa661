// Purpose: Load Go files into one program model shared by inference and rewriting.
// Inputs/Outputs: Takes source texts with paths; produces packages, type table, functions and placeholders.
// Invariants: Package, file and function ids follow first-seen file order and declaration order.
// Gotchas: Imports of packages that were not loaded resolve to opaque named types keyed by import path.

pub mod check;
pub mod placeholder;
pub mod resolve;
pub mod types;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::GenError;
use crate::frontend::ast::{Decl, FileAst, FuncDecl, TypeDecl, TypeExpr, TypeExprKind, VarSpec};
use crate::frontend::parse_source;
use placeholder::PlaceholderIndex;
use resolve::{Resolver, NO_LOCALS};
use types::{Signature, Type, TypeDefs, TypeId};

pub type FileId = usize;
pub type PackageId = usize;
pub type FuncId = usize;

/// One input file as read from disk.
#[derive(Clone, Debug)]
pub struct SourceInput {
    pub path: PathBuf,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportTarget {
    Loaded(PackageId),
    /// Not loaded; carries the import path.
    Opaque(String),
}

#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub ast: FileAst,
    pub package: PackageId,
    /// Parallel to `ast.imports`.
    pub imports: Vec<ImportTarget>,
}

impl SourceFile {
    pub fn import_named(&self, local: &str) -> Option<&ImportTarget> {
        self.ast
            .imports
            .iter()
            .zip(&self.imports)
            .find(|(spec, _)| spec.local_name() == local)
            .map(|(_, target)| target)
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Clone, Debug)]
pub enum Member {
    Type(TypeId),
    Alias { file: FileId, expr: TypeExpr },
    Func(FuncId),
    Var(Option<Type>),
    Const(Option<Type>),
}

#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub dir: PathBuf,
    /// Known once some loaded file imports this package.
    pub import_path: Option<String>,
    /// Namespace of the package's defined types. The package name unless
    /// another loaded package shares it.
    pub key: String,
    pub files: Vec<FileId>,
    pub scope: HashMap<String, Member>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecvInfo {
    pub type_id: TypeId,
    pub pointer: bool,
}

#[derive(Debug)]
pub struct FuncInfo {
    pub package: PackageId,
    pub file: FileId,
    /// Index into the file's top-level declarations.
    pub decl: usize,
    pub name: String,
    pub recv: Option<RecvInfo>,
    pub sig: Signature,
}

#[derive(Debug)]
pub struct Program {
    pub files: Vec<SourceFile>,
    pub packages: Vec<Package>,
    pub types: TypeDefs,
    pub funcs: Vec<FuncInfo>,
    pub methods: HashMap<(TypeId, String), FuncId>,
    pub placeholders: PlaceholderIndex,
    /// Type id of each non-alias type declaration, keyed by (file, decl index).
    decl_types: HashMap<(FileId, usize), TypeId>,
}

impl Program {
    /// Parses and indexes every input. Any parse error aborts the load.
    pub fn load(inputs: Vec<SourceInput>, marker: &str) -> Result<Program, GenError> {
        if inputs.is_empty() {
            return Err(GenError::NoPackages);
        }

        let mut files = Vec::with_capacity(inputs.len());
        let mut packages: Vec<Package> = Vec::new();
        let mut next_expr_id = 0;
        for input in inputs {
            let (ast, next) = parse_source(&input.source, next_expr_id).map_err(|diags| GenError::Parse {
                rendered: diags.render(&input.path.display().to_string(), &input.source),
                path: input.path.clone(),
            })?;
            next_expr_id = next;
            let dir = input.path.parent().map(Path::to_path_buf).unwrap_or_default();
            let package = match packages
                .iter()
                .position(|p| p.dir == dir && p.name == ast.package.name)
            {
                Some(id) => id,
                None => {
                    packages.push(Package {
                        name: ast.package.name.clone(),
                        dir,
                        import_path: None,
                        key: String::new(),
                        files: Vec::new(),
                        scope: HashMap::new(),
                    });
                    packages.len() - 1
                }
            };
            let file_id = files.len();
            packages[package].files.push(file_id);
            files.push(SourceFile {
                path: input.path,
                source: input.source,
                ast,
                package,
                imports: Vec::new(),
            });
        }

        link_imports(&mut files, &mut packages);
        assign_package_keys(&mut packages);

        let mut program = Program {
            files,
            packages,
            types: TypeDefs::default(),
            funcs: Vec::new(),
            methods: HashMap::new(),
            placeholders: PlaceholderIndex::default(),
            decl_types: HashMap::new(),
        };
        program.declare_members();
        program.resolve_type_decls();
        program.resolve_funcs();
        program.resolve_values();
        program.placeholders = PlaceholderIndex::build(&program, marker);
        debug!(
            "loaded {} package(s), {} file(s), {} type(s), {} function(s), {} placeholder(s)",
            program.packages.len(),
            program.files.len(),
            program.types.len(),
            program.funcs.len(),
            program.placeholders.len()
        );
        Ok(program)
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.packages, &self.files, &self.types)
    }

    pub fn func_decl(&self, func: FuncId) -> Option<&FuncDecl> {
        let info = self.funcs.get(func)?;
        match self.files.get(info.file)?.ast.decls.get(info.decl)? {
            Decl::Func(decl) => Some(decl),
            _ => None,
        }
    }

    /// The function declared at `decl` in `file`, if it is one.
    pub fn func_at(&self, file: FileId, decl: usize) -> Option<FuncId> {
        self.funcs.iter().position(|f| f.file == file && f.decl == decl)
    }

    pub fn package_by_name(&self, name: &str) -> Option<PackageId> {
        self.packages.iter().position(|p| p.name == name)
    }

    /// Every type declaration of every file with its type id, in file order.
    pub fn type_decls(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> + '_ {
        self.files.iter().enumerate().flat_map(move |(file_id, file)| {
            file.ast
                .decls
                .iter()
                .enumerate()
                .filter_map(move |(idx, decl)| match decl {
                    Decl::Type(td) => self.decl_types.get(&(file_id, idx)).map(|id| (*id, td)),
                    _ => None,
                })
        })
    }

    fn declare_members(&mut self) {
        for file_id in 0..self.files.len() {
            let pkg = self.files[file_id].package;
            let namespace = self.packages[pkg].key.clone();
            for (decl_idx, decl) in self.files[file_id].ast.decls.iter().enumerate() {
                match decl {
                    Decl::Type(td) => {
                        let member = if td.is_alias {
                            Member::Alias {
                                file: file_id,
                                expr: td.ty.clone(),
                            }
                        } else {
                            let id = self.types.declare(&namespace, &td.name.name);
                            self.decl_types.insert((file_id, decl_idx), id);
                            Member::Type(id)
                        };
                        self.packages[pkg]
                            .scope
                            .entry(td.name.name.clone())
                            .or_insert(member);
                    }
                    Decl::Func(fd) => {
                        let id = self.funcs.len();
                        self.funcs.push(FuncInfo {
                            package: pkg,
                            file: file_id,
                            decl: decl_idx,
                            name: fd.name.name.clone(),
                            recv: None,
                            sig: Signature::default(),
                        });
                        if fd.recv.is_none() && fd.name.name != "init" {
                            self.packages[pkg]
                                .scope
                                .entry(fd.name.name.clone())
                                .or_insert(Member::Func(id));
                        }
                    }
                    Decl::Var(spec) => declare_values(&mut self.packages[pkg], spec, false),
                    Decl::Const(spec) => declare_values(&mut self.packages[pkg], spec, true),
                }
            }
        }
    }

    fn resolve_type_decls(&mut self) {
        // Two rounds so embedded interfaces see their definitions' right-hand sides.
        for _ in 0..2 {
            let resolved: Vec<(TypeId, Type)> = {
                let resolver = self.resolver();
                self.decl_types
                    .iter()
                    .filter_map(|(&(file_id, idx), &id)| match self.files[file_id].ast.decls.get(idx) {
                        Some(Decl::Type(td)) => Some((id, resolver.resolve(file_id, &td.ty, NO_LOCALS))),
                        _ => None,
                    })
                    .collect()
            };
            for (id, rhs) in resolved {
                self.types.set_rhs(id, rhs);
            }
        }
    }

    fn resolve_funcs(&mut self) {
        let resolved: Vec<(Signature, Option<RecvInfo>)> = {
            let resolver = self.resolver();
            self.funcs
                .iter()
                .map(|info| {
                    let Some(Decl::Func(decl)) = self.files[info.file].ast.decls.get(info.decl) else {
                        return (Signature::default(), None);
                    };
                    let sig = resolver.resolve_signature(info.file, &decl.sig, NO_LOCALS);
                    let recv = decl
                        .recv
                        .as_ref()
                        .and_then(|recv| receiver_base(&recv.ty))
                        .and_then(|(name, pointer)| {
                            match self.packages[info.package].scope.get(name) {
                                Some(Member::Type(type_id)) => Some(RecvInfo {
                                    type_id: *type_id,
                                    pointer,
                                }),
                                _ => None,
                            }
                        });
                    (sig, recv)
                })
                .collect()
        };
        for (id, (sig, recv)) in resolved.into_iter().enumerate() {
            self.funcs[id].sig = sig;
            self.funcs[id].recv = recv;
            if let Some(recv) = recv {
                let name = self.funcs[id].name.clone();
                self.methods.entry((recv.type_id, name)).or_insert(id);
            }
        }
    }

    /// Gives package-level variables and constants their static types.
    fn resolve_values(&mut self) {
        // Initializers may refer to values declared later in the package.
        for _ in 0..2 {
            let mut updates: Vec<(PackageId, String, Option<Type>, bool)> = Vec::new();
            for (file_id, file) in self.files.iter().enumerate() {
                let mut prev_const: Option<Type> = None;
                for decl in &file.ast.decls {
                    let (spec, is_const) = match decl {
                        Decl::Var(spec) => (spec, false),
                        Decl::Const(spec) => (spec, true),
                        _ => continue,
                    };
                    let types = check::value_spec_types(self, file_id, spec, is_const);
                    for (i, name) in spec.names.iter().enumerate() {
                        let mut ty = types.get(i).cloned().flatten();
                        if is_const && spec.ty.is_none() && spec.values.is_empty() {
                            // implicit repetition of the previous constant spec
                            ty = prev_const.clone();
                        }
                        if is_const {
                            prev_const = ty.clone();
                        }
                        updates.push((file.package, name.name.clone(), ty, is_const));
                    }
                }
            }
            for (pkg, name, ty, is_const) in updates {
                let member = if is_const {
                    Member::Const(ty)
                } else {
                    Member::Var(ty)
                };
                if let Some(slot) = self.packages[pkg].scope.get_mut(&name) {
                    if matches!(slot, Member::Var(_) | Member::Const(_)) {
                        *slot = member;
                    }
                }
            }
        }
    }
}

fn declare_values(package: &mut Package, spec: &VarSpec, is_const: bool) {
    for name in &spec.names {
        if name.name == "_" {
            continue;
        }
        let member = if is_const {
            Member::Const(None)
        } else {
            Member::Var(None)
        };
        package.scope.entry(name.name.clone()).or_insert(member);
    }
}

/// `T` or `*T` receiver type name.
fn receiver_base(ty: &TypeExpr) -> Option<(&str, bool)> {
    match &ty.kind {
        TypeExprKind::Name(ident) => Some((&ident.name, false)),
        TypeExprKind::Pointer(inner) => match &inner.kind {
            TypeExprKind::Name(ident) => Some((&ident.name, true)),
            _ => None,
        },
        _ => None,
    }
}

/// Points each import at the loaded package whose directory shares the
/// longest run of trailing path segments with it, then at one whose
/// package name is the last segment.
fn link_imports(files: &mut [SourceFile], packages: &mut [Package]) {
    for file in files.iter_mut() {
        let mut targets = Vec::with_capacity(file.ast.imports.len());
        for spec in &file.ast.imports {
            let segments: Vec<&str> = spec.path.split('/').filter(|s| !s.is_empty()).collect();
            let last = segments.last().copied().unwrap_or(spec.path.as_str());
            let by_dir = packages
                .iter()
                .enumerate()
                .filter(|(pid, p)| *pid != file.package && !p.name.ends_with("_test"))
                .map(|(pid, p)| (pid, shared_suffix(&segments, &p.dir)))
                .filter(|&(_, shared)| shared > 0)
                .fold(None, |best: Option<(PackageId, usize)>, (pid, shared)| match best {
                    Some((_, top)) if top >= shared => best,
                    _ => Some((pid, shared)),
                })
                .map(|(pid, _)| pid);
            let by_name = || {
                packages
                    .iter()
                    .enumerate()
                    .position(|(pid, p)| pid != file.package && p.name == last)
            };
            match by_dir.or_else(by_name) {
                Some(pid) => {
                    if packages[pid].import_path.is_none() {
                        packages[pid].import_path = Some(spec.path.clone());
                    }
                    targets.push(ImportTarget::Loaded(pid));
                }
                None => targets.push(ImportTarget::Opaque(spec.path.clone())),
            }
        }
        file.imports = targets;
    }
}

/// Number of trailing import path segments equal to trailing components of `dir`.
fn shared_suffix(segments: &[&str], dir: &Path) -> usize {
    let components: Vec<&str> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    segments
        .iter()
        .rev()
        .zip(components.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Packages that share a name are told apart by import path, else by directory.
fn assign_package_keys(packages: &mut [Package]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in packages.iter() {
        *counts.entry(p.name.clone()).or_default() += 1;
    }
    for p in packages.iter_mut() {
        p.key = if counts.get(&p.name).copied().unwrap_or(0) > 1 {
            p.import_path
                .clone()
                .unwrap_or_else(|| p.dir.to_string_lossy().replace('\\', "/"))
        } else {
            p.name.clone()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{ImportTarget, Member, Program, SourceInput};
    use crate::sema::types::{BasicKind, Type};
    use std::path::PathBuf;

    fn input(path: &str, source: &str) -> SourceInput {
        SourceInput {
            path: PathBuf::from(path),
            source: source.to_string(),
        }
    }

    #[test]
    fn groups_files_into_packages_by_dir_and_name() {
        let program = Program::load(
            vec![
                input("a/x.go", "package a\nfunc F() {}\n"),
                input("a/y.go", "package a\nfunc G() {}\n"),
                input("a/x_test.go", "package a_test\nfunc TestF() {}\n"),
                input("b/z.go", "package b\nimport \"example.com/a\"\nimport \"io\"\nvar _ = a.F\nvar r io.Reader\n"),
            ],
            "+tsgen typevar",
        )
        .expect("load");
        assert_eq!(program.packages.len(), 3);
        assert_eq!(program.packages[0].files, vec![0, 1]);
        assert_eq!(program.packages[1].name, "a_test");
        assert_eq!(
            program.files[3].imports,
            vec![ImportTarget::Loaded(0), ImportTarget::Opaque("io".to_string())]
        );
        assert_eq!(program.packages[0].import_path.as_deref(), Some("example.com/a"));
        match program.packages[2].scope.get("r") {
            Some(Member::Var(Some(ty))) => assert_eq!(ty.identity(), "io.Reader"),
            other => panic!("unexpected member {:?}", other),
        }
    }

    #[test]
    fn registers_methods_and_value_types() {
        let program = Program::load(
            vec![input(
                "p/p.go",
                "package p\ntype foo struct{}\nfunc (f *foo) Bar(x int) string { return \"\" }\nconst (\n\tA = 1\n\tB\n)\nvar s = []string{}\n",
            )],
            "+tsgen typevar",
        )
        .expect("load");
        let type_id = program.types.lookup("p", "foo").expect("foo");
        let method = program.methods.get(&(type_id, "Bar".to_string())).expect("method");
        let info = &program.funcs[*method];
        assert!(info.recv.expect("recv").pointer);
        assert_eq!(info.sig.params, vec![Type::Basic(BasicKind::Int)]);
        match program.packages[0].scope.get("B") {
            Some(Member::Const(Some(Type::Basic(BasicKind::UntypedInt)))) => {}
            other => panic!("unexpected member {:?}", other),
        }
        match program.packages[0].scope.get("s") {
            Some(Member::Var(Some(ty))) => assert_eq!(ty.identity(), "[]string"),
            other => panic!("unexpected member {:?}", other),
        }
    }

    #[test]
    fn parse_errors_abort_the_load() {
        let err = Program::load(vec![input("p/p.go", "package p\nfunc (\n")], "+tsgen typevar")
            .expect_err("must fail");
        assert!(err.to_string().contains("p/p.go"), "{}", err);
    }

    #[test]
    fn imports_prefer_the_longest_directory_suffix() {
        let program = Program::load(
            vec![
                input("a/model/m.go", "package model\ntype Item struct{}\n"),
                input("b/model/m.go", "package model\ntype Item struct{}\n"),
                input("app/main.go", "package main\nimport \"example.com/b/model\"\nvar _ model.Item\n"),
            ],
            "+tsgen typevar",
        )
        .expect("load");
        assert_eq!(program.files[2].imports, vec![ImportTarget::Loaded(1)]);
        assert_eq!(program.packages[1].key, "example.com/b/model");
        assert_eq!(program.packages[0].key, "a/model");
        assert_eq!(program.packages[2].key, "main");
        let a = program.types.lookup("a/model", "Item").expect("a item");
        let b = program.types.lookup("example.com/b/model", "Item").expect("b item");
        assert_ne!(a, b);
    }

    #[test]
    fn loads_unicode_identifiers() {
        let program = Program::load(
            vec![input("u/u.go", "package u\nvar π = 3.14\nfunc f() {\n\tcafé := 1\n\t_ = café\n}\n")],
            "+tsgen typevar",
        )
        .expect("load");
        match program.packages[0].scope.get("π") {
            Some(Member::Var(Some(Type::Basic(BasicKind::Float64)))) => {}
            other => panic!("unexpected member {:?}", other),
        }
    }
}
