#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Comment {
    /// Raw text including the `//` or `/* */` markers.
    pub text: String,
    pub span: Span,
}

#[derive(Clone, Debug, Default)]
pub struct CommentGroup {
    pub list: Vec<Comment>,
}

impl CommentGroup {
    /// Comment bodies with markers and surrounding whitespace stripped.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.list.iter().map(|c| strip_comment_markers(&c.text))
    }
}

pub fn strip_comment_markers(text: &str) -> &str {
    let body = if let Some(rest) = text.strip_prefix("//") {
        rest
    } else if let Some(rest) = text.strip_prefix("/*") {
        rest.strip_suffix("*/").unwrap_or(rest)
    } else {
        text
    };
    body.trim()
}

#[derive(Clone, Debug)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FileAst {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    /// End offset of the last import declaration, or of the package clause.
    pub header_end: usize,
    pub decls: Vec<Decl>,
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub alias: Option<Ident>,
    pub path: String,
    pub span: Span,
}

impl ImportSpec {
    /// The name the importing file uses to refer to the package.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Decl {
    Type(TypeDecl),
    Func(FuncDecl),
    Var(VarSpec),
    Const(VarSpec),
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub is_alias: bool,
    /// Doc comment of the enclosing `type ( ... )` group, if any.
    pub group_doc: Option<CommentGroup>,
    pub doc: Option<CommentGroup>,
    pub line_comment: Option<CommentGroup>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub sig: FuncTypeExpr,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug)]
pub struct FuncTypeExpr {
    pub params: Vec<ParamGroup>,
    pub results: Vec<ParamGroup>,
    pub is_variadic: bool,
    pub span: Span,
}

impl FuncTypeExpr {
    /// Declared parameter names in ordinal order; unnamed parameters yield `None`.
    pub fn param_names(&self) -> Vec<Option<&Ident>> {
        let mut out = Vec::new();
        for group in &self.params {
            if group.names.is_empty() {
                out.push(None);
            } else {
                out.extend(group.names.iter().map(Some));
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct ParamGroup {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Clone, Debug)]
pub enum TypeExprKind {
    Name(Ident),
    Qualified { package: Ident, name: Ident },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: ArrayLen, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func(FuncTypeExpr),
    Struct(Vec<FieldDecl>),
    Interface(Vec<InterfaceElem>),
}

#[derive(Clone, Debug)]
pub enum ArrayLen {
    Lit(u64),
    Ellipsis,
    Expr(Box<Expr>),
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub embedded: bool,
    pub tag: Option<String>,
}

#[derive(Clone, Debug)]
pub enum InterfaceElem {
    Method { name: Ident, sig: FuncTypeExpr },
    Embedded(TypeExpr),
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

pub type ExprId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    BitClearAssign,
    ShlAssign,
    ShrAssign,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Var(VarSpec),
    Const(VarSpec),
    Type(TypeDecl),
    ShortVar {
        names: Vec<Ident>,
        values: Vec<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        span: Span,
    },
    IncDec {
        expr: Expr,
        inc: bool,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    Send {
        chan: Expr,
        value: Expr,
        span: Span,
    },
    Return {
        results: Vec<Expr>,
        span: Span,
    },
    Branch {
        kind: BranchKind,
        label: Option<Ident>,
        span: Span,
    },
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then_block: Block,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        span: Span,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        body: Block,
        span: Span,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
        span: Span,
    },
    TypeSwitch(TypeSwitchStmt),
    Select {
        clauses: Vec<CommClause>,
        span: Span,
    },
    Go {
        call: Expr,
        span: Span,
    },
    Defer {
        call: Expr,
        span: Span,
    },
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
        span: Span,
    },
    Empty {
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::Var(spec) | Stmt::Const(spec) => &spec.span,
            Stmt::Type(decl) => &decl.span,
            Stmt::Block(block) => &block.span,
            Stmt::TypeSwitch(sw) => &sw.span,
            Stmt::ShortVar { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::IncDec { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Send { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Branch { span, .. }
            | Stmt::If { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Range { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Select { span, .. }
            | Stmt::Go { span, .. }
            | Stmt::Defer { span, .. }
            | Stmt::Labeled { span, .. }
            | Stmt::Empty { span } => span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypeSwitchStmt {
    pub init: Option<Box<Stmt>>,
    /// `x` in `switch x := y.(type)`.
    pub binding: Option<Ident>,
    /// `y` in `switch x := y.(type)`.
    pub subject: Expr,
    /// Source text span of the guard, `x := y.(type)` or `y.(type)`.
    pub guard_span: Span,
    pub lbrace: Span,
    pub clauses: Vec<TypeCaseClause>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TypeCaseClause {
    /// `None` for the `default` arm.
    pub types: Option<Vec<TypeExpr>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CaseClause {
    pub exprs: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CommClause {
    /// `None` for the `default` arm.
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Ident(String),
    Int(String),
    Float(String),
    Imag(String),
    Char(char),
    String(String),
    CompositeLit {
        ty: Option<TypeExpr>,
        elems: Vec<KeyedElement>,
    },
    FuncLit {
        sig: FuncTypeExpr,
        body: Block,
    },
    /// A type in value position, e.g. the first argument of `make`.
    Type(TypeExpr),
    Paren(Box<Expr>),
    Selector {
        base: Box<Expr>,
        field: Ident,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    /// `ty` is `None` for the `.(type)` guard form.
    TypeAssert {
        base: Box<Expr>,
        ty: Option<TypeExpr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        has_ellipsis: bool,
    },
    /// Pointer indirection or, in type context, a pointer type.
    Star(Box<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Clone, Debug)]
pub struct KeyedElement {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Addr,
    Recv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    BitClear,
    Shl,
    Shr,
}
