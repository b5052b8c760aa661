use super::ast::*;
use super::diagnostic::Diagnostics;
use super::lexer::{Keyword, Lexed, Symbol, Token, TokenKind};

enum ParamEntry {
    Bare(Ident),
    Named(Ident, TypeExpr),
    Unnamed(TypeExpr),
}

enum ForHeader {
    Infinite,
    Cond(Expr),
    Clauses {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
    },
}

struct ParsedGroup {
    group: CommentGroup,
    first_line: usize,
    first_start: usize,
    end_line: usize,
    /// The group starts on a line that already holds code.
    trailing: bool,
}

pub struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    pub diags: Diagnostics,
    next_expr_id: ExprId,
    allow_struct_lit: bool,
    comments: Vec<Comment>,
    groups: Vec<ParsedGroup>,
    last_end: usize,
    last_line: usize,
}

impl Parser {
    pub fn new(lexed: Lexed) -> Self {
        Self::new_with_expr_id(lexed, 0)
    }

    pub fn new_with_expr_id(lexed: Lexed, next_expr_id: ExprId) -> Self {
        let Lexed {
            mut tokens,
            comments,
        } = lexed;
        if tokens.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span {
                    start: 0,
                    end: 0,
                    line: 1,
                    column: 1,
                },
            });
        }
        let groups = group_comments(&comments, &tokens);
        Self {
            tokens,
            idx: 0,
            diags: Diagnostics::default(),
            next_expr_id,
            allow_struct_lit: true,
            comments,
            groups,
            last_end: 0,
            last_line: 1,
        }
    }

    pub fn next_expr_id(&self) -> ExprId {
        self.next_expr_id
    }

    fn new_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = self.next_expr_id;
        self.next_expr_id += 1;
        Expr { id, kind, span }
    }

    fn with_struct_lit<T>(&mut self, allow: bool, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let prev = self.allow_struct_lit;
        self.allow_struct_lit = allow;
        let out = f(self);
        self.allow_struct_lit = prev;
        out
    }

    pub fn parse_file(&mut self) -> Option<FileAst> {
        self.consume_semis();
        self.expect_keyword(Keyword::Package)?;
        let package = self.expect_ident()?;
        let mut header_end = self.last_end;
        self.consume_semis();
        let mut imports = Vec::new();
        while self.at_keyword(Keyword::Import) {
            self.parse_import_decl(&mut imports)?;
            header_end = self.last_end;
            self.consume_semis();
        }
        let mut decls = Vec::new();
        while !self.at_eof() {
            let before = self.idx;
            let ok = match self.peek().kind {
                TokenKind::Keyword(Keyword::Func) => match self.parse_func_decl() {
                    Some(func) => {
                        decls.push(Decl::Func(func));
                        true
                    }
                    None => false,
                },
                TokenKind::Keyword(Keyword::Type) => match self.parse_type_decls() {
                    Some(types) => {
                        decls.extend(types.into_iter().map(Decl::Type));
                        true
                    }
                    None => false,
                },
                TokenKind::Keyword(Keyword::Var) => match self.parse_value_decls() {
                    Some(specs) => {
                        decls.extend(specs.into_iter().map(Decl::Var));
                        true
                    }
                    None => false,
                },
                TokenKind::Keyword(Keyword::Const) => match self.parse_value_decls() {
                    Some(specs) => {
                        decls.extend(specs.into_iter().map(Decl::Const));
                        true
                    }
                    None => false,
                },
                TokenKind::Keyword(Keyword::Import) => {
                    self.error_here("imports must appear before other declarations");
                    false
                }
                _ => {
                    self.error_here("expected declaration");
                    false
                }
            };
            if !ok {
                self.recover(before);
            }
            self.consume_semis();
        }
        Some(FileAst {
            package,
            imports,
            header_end,
            decls,
            comments: self.comments.clone(),
        })
    }

    fn parse_import_decl(&mut self, out: &mut Vec<ImportSpec>) -> Option<()> {
        self.bump();
        if self.at_symbol(Symbol::LParen) {
            self.bump();
            loop {
                self.consume_semis();
                if self.at_symbol(Symbol::RParen) || self.at_eof() {
                    break;
                }
                out.push(self.parse_import_spec()?);
            }
            self.expect_symbol(Symbol::RParen)?;
        } else {
            out.push(self.parse_import_spec()?);
        }
        Some(())
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let start = self.peek().span.clone();
        let alias = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let tok = self.bump();
                Some(Ident {
                    name,
                    span: tok.span,
                })
            }
            TokenKind::Symbol(Symbol::Dot) => {
                let tok = self.bump();
                Some(Ident {
                    name: ".".to_string(),
                    span: tok.span,
                })
            }
            _ => None,
        };
        let path = match self.peek().kind.clone() {
            TokenKind::StringLit(path) => {
                self.bump();
                path
            }
            _ => {
                self.error_here("expected import path");
                return None;
            }
        };
        Some(ImportSpec {
            alias,
            path,
            span: self.finish(&start),
        })
    }

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let start = self.bump().span;
        let recv = if self.at_symbol(Symbol::LParen) {
            let (mut groups, _) = self.parse_param_list()?;
            if groups.len() != 1 {
                self.diags
                    .push("method must have exactly one receiver", Some(start.clone()));
                return None;
            }
            let group = groups.remove(0);
            Some(Receiver {
                name: group.names.into_iter().next(),
                ty: group.ty,
            })
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.at_symbol(Symbol::LBracket) {
            self.error_here("type parameters are not supported");
            return None;
        }
        let sig = self.parse_signature(&start)?;
        let body = if self.at_symbol(Symbol::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(FuncDecl {
            recv,
            name,
            sig,
            body,
            span: self.finish(&start),
        })
    }

    fn parse_type_decls(&mut self) -> Option<Vec<TypeDecl>> {
        let kw = self.bump();
        let decl_doc = self.doc_before(kw.span.line);
        let mut out = Vec::new();
        if self.at_symbol(Symbol::LParen) {
            self.bump();
            loop {
                self.consume_semis();
                if self.at_symbol(Symbol::RParen) || self.at_eof() {
                    break;
                }
                let spec_doc = self.doc_before(self.peek().span.line);
                out.push(self.parse_type_spec(decl_doc.clone(), spec_doc)?);
            }
            self.expect_symbol(Symbol::RParen)?;
        } else {
            out.push(self.parse_type_spec(None, decl_doc)?);
        }
        Some(out)
    }

    fn parse_type_spec(
        &mut self,
        group_doc: Option<CommentGroup>,
        doc: Option<CommentGroup>,
    ) -> Option<TypeDecl> {
        let name = self.expect_ident()?;
        if self.at_symbol(Symbol::LBracket) && self.peek_is_ident_at(1) && self.peek_is_ident_at(2) {
            self.error_here("type parameters are not supported");
            return None;
        }
        let is_alias = if self.at_symbol(Symbol::Eq) {
            self.bump();
            true
        } else {
            false
        };
        let ty = self.parse_type()?;
        let span = self.finish(&name.span);
        let line_comment = self.line_comment_after(span.start, self.last_line);
        Some(TypeDecl {
            name,
            ty,
            is_alias,
            group_doc,
            doc,
            line_comment,
            span,
        })
    }

    fn parse_value_decls(&mut self) -> Option<Vec<VarSpec>> {
        self.bump();
        let mut out = Vec::new();
        if self.at_symbol(Symbol::LParen) {
            self.bump();
            loop {
                self.consume_semis();
                if self.at_symbol(Symbol::RParen) || self.at_eof() {
                    break;
                }
                out.push(self.parse_value_spec()?);
            }
            self.expect_symbol(Symbol::RParen)?;
        } else {
            out.push(self.parse_value_spec()?);
        }
        Some(out)
    }

    fn parse_value_spec(&mut self) -> Option<VarSpec> {
        let start = self.peek().span.clone();
        let mut names = vec![self.expect_ident()?];
        while self.at_symbol(Symbol::Comma) {
            self.bump();
            names.push(self.expect_ident()?);
        }
        let ty = if !self.at_symbol(Symbol::Eq) && self.at_type_start() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.at_symbol(Symbol::Eq) {
            self.bump();
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Some(VarSpec {
            names,
            ty,
            values,
            span: self.finish(&start),
        })
    }

    // ---- types ----

    fn at_type_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Ident(_)
                | TokenKind::Keyword(Keyword::Map)
                | TokenKind::Keyword(Keyword::Chan)
                | TokenKind::Keyword(Keyword::Func)
                | TokenKind::Keyword(Keyword::Struct)
                | TokenKind::Keyword(Keyword::Interface)
                | TokenKind::Symbol(Symbol::Star)
                | TokenKind::Symbol(Symbol::LBracket)
                | TokenKind::Symbol(Symbol::LParen)
                | TokenKind::Symbol(Symbol::Arrow)
        )
    }

    pub fn parse_type(&mut self) -> Option<TypeExpr> {
        let start = self.peek().span.clone();
        let kind = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let tok = self.bump();
                let first = Ident {
                    name,
                    span: tok.span,
                };
                if self.at_symbol(Symbol::Dot) {
                    self.bump();
                    let name = self.expect_ident()?;
                    TypeExprKind::Qualified {
                        package: first,
                        name,
                    }
                } else {
                    TypeExprKind::Name(first)
                }
            }
            TokenKind::Symbol(Symbol::Star) => {
                self.bump();
                TypeExprKind::Pointer(Box::new(self.parse_type()?))
            }
            TokenKind::Symbol(Symbol::LParen) => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect_symbol(Symbol::RParen)?;
                return Some(TypeExpr {
                    kind: inner.kind,
                    span: self.finish(&start),
                });
            }
            TokenKind::Symbol(Symbol::LBracket) => {
                self.bump();
                if self.at_symbol(Symbol::RBracket) {
                    self.bump();
                    TypeExprKind::Slice(Box::new(self.parse_type()?))
                } else if self.at_symbol(Symbol::Ellipsis) {
                    self.bump();
                    self.expect_symbol(Symbol::RBracket)?;
                    TypeExprKind::Array {
                        len: ArrayLen::Ellipsis,
                        elem: Box::new(self.parse_type()?),
                    }
                } else {
                    let len_expr = self.with_struct_lit(true, |p| p.parse_expr())?;
                    self.expect_symbol(Symbol::RBracket)?;
                    let len = match &len_expr.kind {
                        ExprKind::Int(text) => match parse_int_lit(text) {
                            Some(n) => ArrayLen::Lit(n),
                            None => ArrayLen::Expr(Box::new(len_expr)),
                        },
                        _ => ArrayLen::Expr(Box::new(len_expr)),
                    };
                    TypeExprKind::Array {
                        len,
                        elem: Box::new(self.parse_type()?),
                    }
                }
            }
            TokenKind::Keyword(Keyword::Map) => {
                self.bump();
                self.expect_symbol(Symbol::LBracket)?;
                let key = self.parse_type()?;
                self.expect_symbol(Symbol::RBracket)?;
                let value = self.parse_type()?;
                TypeExprKind::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            TokenKind::Keyword(Keyword::Chan) => {
                self.bump();
                let dir = if self.at_symbol(Symbol::Arrow) {
                    self.bump();
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                TypeExprKind::Chan {
                    dir,
                    elem: Box::new(self.parse_type()?),
                }
            }
            TokenKind::Symbol(Symbol::Arrow) => {
                self.bump();
                self.expect_keyword(Keyword::Chan)?;
                TypeExprKind::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(self.parse_type()?),
                }
            }
            TokenKind::Keyword(Keyword::Func) => {
                self.bump();
                TypeExprKind::Func(self.parse_signature(&start)?)
            }
            TokenKind::Keyword(Keyword::Struct) => {
                self.bump();
                TypeExprKind::Struct(self.parse_struct_fields()?)
            }
            TokenKind::Keyword(Keyword::Interface) => {
                self.bump();
                TypeExprKind::Interface(self.parse_interface_elems()?)
            }
            _ => {
                self.error_here("expected type");
                return None;
            }
        };
        Some(TypeExpr {
            kind,
            span: self.finish(&start),
        })
    }

    fn parse_signature(&mut self, start: &Span) -> Option<FuncTypeExpr> {
        let (params, is_variadic) = self.parse_param_list()?;
        let results = if self.at_symbol(Symbol::LParen) {
            let (results, variadic) = self.parse_param_list()?;
            if variadic {
                self.diags
                    .push("results cannot be variadic", Some(start.clone()));
                return None;
            }
            results
        } else if self.at_type_start() {
            vec![ParamGroup {
                names: Vec::new(),
                ty: self.parse_type()?,
            }]
        } else {
            Vec::new()
        };
        Some(FuncTypeExpr {
            params,
            results,
            is_variadic,
            span: self.finish(start),
        })
    }

    fn parse_param_list(&mut self) -> Option<(Vec<ParamGroup>, bool)> {
        let open = self.expect_symbol(Symbol::LParen)?;
        let mut entries = Vec::new();
        let mut variadic = false;
        while !self.at_symbol(Symbol::RParen) && !self.at_eof() {
            if variadic {
                self.error_here("can only use ... with final parameter");
                return None;
            }
            entries.push(self.parse_param_entry(&mut variadic)?);
            if self.at_symbol(Symbol::Comma) {
                self.bump();
                self.consume_semis();
            } else {
                break;
            }
        }
        self.consume_semis();
        self.expect_symbol(Symbol::RParen)?;

        let named = entries.iter().any(|e| matches!(e, ParamEntry::Named(..)));
        let mut groups = Vec::new();
        if named {
            let mut pending = Vec::new();
            for entry in entries {
                match entry {
                    ParamEntry::Bare(ident) => pending.push(ident),
                    ParamEntry::Named(ident, ty) => {
                        pending.push(ident);
                        groups.push(ParamGroup {
                            names: std::mem::take(&mut pending),
                            ty,
                        });
                    }
                    ParamEntry::Unnamed(ty) => {
                        self.diags
                            .push("mixed named and unnamed parameters", Some(ty.span));
                        return None;
                    }
                }
            }
            if !pending.is_empty() {
                self.diags
                    .push("mixed named and unnamed parameters", Some(open));
                return None;
            }
        } else {
            for entry in entries {
                let ty = match entry {
                    ParamEntry::Bare(ident) => TypeExpr {
                        span: ident.span.clone(),
                        kind: TypeExprKind::Name(ident),
                    },
                    ParamEntry::Unnamed(ty) | ParamEntry::Named(_, ty) => ty,
                };
                groups.push(ParamGroup {
                    names: Vec::new(),
                    ty,
                });
            }
        }
        Some((groups, variadic))
    }

    fn parse_param_entry(&mut self, variadic: &mut bool) -> Option<ParamEntry> {
        if self.at_symbol(Symbol::Ellipsis) {
            self.bump();
            *variadic = true;
            return Some(ParamEntry::Unnamed(self.parse_type()?));
        }
        if let TokenKind::Ident(name) = self.peek().kind.clone() {
            match self.peek_kind_at(1) {
                Some(TokenKind::Symbol(Symbol::Comma)) | Some(TokenKind::Symbol(Symbol::RParen)) => {
                    let tok = self.bump();
                    return Some(ParamEntry::Bare(Ident {
                        name,
                        span: tok.span,
                    }));
                }
                Some(TokenKind::Symbol(Symbol::Dot)) => {}
                _ => {
                    let tok = self.bump();
                    let ident = Ident {
                        name,
                        span: tok.span,
                    };
                    if self.at_symbol(Symbol::Ellipsis) {
                        self.bump();
                        *variadic = true;
                    }
                    let ty = self.parse_type()?;
                    return Some(ParamEntry::Named(ident, ty));
                }
            }
        }
        Some(ParamEntry::Unnamed(self.parse_type()?))
    }

    fn parse_struct_fields(&mut self) -> Option<Vec<FieldDecl>> {
        self.expect_symbol(Symbol::LBrace)?;
        let mut fields = Vec::new();
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RBrace) || self.at_eof() {
                break;
            }
            fields.push(self.parse_field_decl()?);
        }
        self.expect_symbol(Symbol::RBrace)?;
        Some(fields)
    }

    fn parse_field_decl(&mut self) -> Option<FieldDecl> {
        let embedded = match &self.peek().kind {
            TokenKind::Symbol(Symbol::Star) => true,
            TokenKind::Ident(_) => matches!(
                self.peek_kind_at(1),
                Some(TokenKind::Symbol(Symbol::Dot))
                    | Some(TokenKind::Symbol(Symbol::Semi))
                    | Some(TokenKind::Symbol(Symbol::RBrace))
                    | Some(TokenKind::StringLit(_))
            ),
            _ => {
                self.error_here("expected field declaration");
                return None;
            }
        };
        let (names, ty) = if embedded {
            (Vec::new(), self.parse_type()?)
        } else {
            let mut names = vec![self.expect_ident()?];
            while self.at_symbol(Symbol::Comma) {
                self.bump();
                names.push(self.expect_ident()?);
            }
            (names, self.parse_type()?)
        };
        let tag = match self.peek().kind.clone() {
            TokenKind::StringLit(tag) => {
                self.bump();
                Some(tag)
            }
            _ => None,
        };
        Some(FieldDecl {
            names,
            ty,
            embedded,
            tag,
        })
    }

    fn parse_interface_elems(&mut self) -> Option<Vec<InterfaceElem>> {
        self.expect_symbol(Symbol::LBrace)?;
        let mut elems = Vec::new();
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RBrace) || self.at_eof() {
                break;
            }
            let is_method = matches!(self.peek().kind, TokenKind::Ident(_))
                && self.peek_is_symbol_at(1, Symbol::LParen);
            if is_method {
                let name = self.expect_ident()?;
                let sig = self.parse_signature(&name.span.clone())?;
                elems.push(InterfaceElem::Method { name, sig });
            } else {
                if self.at_symbol(Symbol::Tilde) {
                    self.bump();
                }
                elems.push(InterfaceElem::Embedded(self.parse_type()?));
                while self.at_symbol(Symbol::Pipe) {
                    self.bump();
                    if self.at_symbol(Symbol::Tilde) {
                        self.bump();
                    }
                    elems.push(InterfaceElem::Embedded(self.parse_type()?));
                }
            }
        }
        self.expect_symbol(Symbol::RBrace)?;
        Some(elems)
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Option<Block> {
        let start = self.expect_symbol(Symbol::LBrace)?;
        let stmts = self.with_struct_lit(true, |p| Some(p.parse_stmt_list()))?;
        self.expect_symbol(Symbol::RBrace)?;
        Some(Block {
            stmts,
            span: self.finish(&start),
        })
    }

    fn parse_stmt_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RBrace)
                || self.at_eof()
                || self.at_keyword(Keyword::Case)
                || self.at_keyword(Keyword::Default)
            {
                break;
            }
            let before = self.idx;
            if !self.parse_stmt_into(&mut stmts) {
                self.recover(before);
            }
        }
        stmts
    }

    fn parse_stmt_into(&mut self, out: &mut Vec<Stmt>) -> bool {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Var) => match self.parse_value_decls() {
                Some(specs) => {
                    out.extend(specs.into_iter().map(Stmt::Var));
                    true
                }
                None => false,
            },
            TokenKind::Keyword(Keyword::Const) => match self.parse_value_decls() {
                Some(specs) => {
                    out.extend(specs.into_iter().map(Stmt::Const));
                    true
                }
                None => false,
            },
            TokenKind::Keyword(Keyword::Type) => match self.parse_type_decls() {
                Some(types) => {
                    out.extend(types.into_iter().map(Stmt::Type));
                    true
                }
                None => false,
            },
            _ => match self.parse_stmt() {
                Some(stmt) => {
                    out.push(stmt);
                    true
                }
                None => false,
            },
        }
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        let start = self.peek().span.clone();
        match self.peek().kind.clone() {
            TokenKind::Keyword(Keyword::Return) => {
                self.bump();
                let results = if self.at_symbol(Symbol::Semi) || self.at_symbol(Symbol::RBrace) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                Some(Stmt::Return {
                    results,
                    span: self.finish(&start),
                })
            }
            TokenKind::Keyword(kw @ (Keyword::Break | Keyword::Continue | Keyword::Goto | Keyword::Fallthrough)) => {
                self.bump();
                let kind = match kw {
                    Keyword::Break => BranchKind::Break,
                    Keyword::Continue => BranchKind::Continue,
                    Keyword::Goto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if kind != BranchKind::Fallthrough
                    && matches!(self.peek().kind, TokenKind::Ident(_))
                {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                Some(Stmt::Branch {
                    kind,
                    label,
                    span: self.finish(&start),
                })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_stmt(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_stmt(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_stmt(),
            TokenKind::Keyword(Keyword::Select) => self.parse_select_stmt(),
            TokenKind::Keyword(Keyword::Go) => {
                self.bump();
                let call = self.parse_expr()?;
                Some(Stmt::Go {
                    call,
                    span: self.finish(&start),
                })
            }
            TokenKind::Keyword(Keyword::Defer) => {
                self.bump();
                let call = self.parse_expr()?;
                Some(Stmt::Defer {
                    call,
                    span: self.finish(&start),
                })
            }
            TokenKind::Symbol(Symbol::LBrace) => self.parse_block().map(Stmt::Block),
            TokenKind::Symbol(Symbol::Semi) => Some(Stmt::Empty { span: start }),
            TokenKind::Ident(_) if self.peek_is_symbol_at(1, Symbol::Colon) => {
                let label = self.expect_ident()?;
                self.bump();
                self.consume_semis();
                let stmt = if self.at_symbol(Symbol::RBrace) {
                    Stmt::Empty {
                        span: self.peek().span.clone(),
                    }
                } else {
                    self.parse_stmt()?
                };
                Some(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                    span: self.finish(&start),
                })
            }
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_simple_stmt(&mut self) -> Option<Stmt> {
        let start = self.peek().span.clone();
        let lhs = self.parse_expr_list()?;
        self.finish_simple_stmt(lhs, start)
    }

    fn finish_simple_stmt(&mut self, mut lhs: Vec<Expr>, start: Span) -> Option<Stmt> {
        if self.at_symbol(Symbol::Define) {
            self.bump();
            let values = self.parse_expr_list()?;
            let mut names = Vec::with_capacity(lhs.len());
            for expr in lhs {
                match expr.kind {
                    ExprKind::Ident(name) => names.push(Ident {
                        name,
                        span: expr.span,
                    }),
                    _ => {
                        self.diags
                            .push("non-name on left side of :=", Some(expr.span));
                        return None;
                    }
                }
            }
            return Some(Stmt::ShortVar {
                names,
                values,
                span: self.finish(&start),
            });
        }
        if let Some(op) = self.peek_assign_op() {
            self.bump();
            let rhs = self.parse_expr_list()?;
            return Some(Stmt::Assign {
                op,
                lhs,
                rhs,
                span: self.finish(&start),
            });
        }
        if lhs.len() != 1 {
            self.error_here("expected := or = after expression list");
            return None;
        }
        let expr = lhs.remove(0);
        if self.at_symbol(Symbol::Inc) || self.at_symbol(Symbol::Dec) {
            let inc = self.at_symbol(Symbol::Inc);
            self.bump();
            return Some(Stmt::IncDec {
                expr,
                inc,
                span: self.finish(&start),
            });
        }
        if self.at_symbol(Symbol::Arrow) {
            self.bump();
            let value = self.parse_expr()?;
            return Some(Stmt::Send {
                chan: expr,
                value,
                span: self.finish(&start),
            });
        }
        Some(Stmt::Expr {
            expr,
            span: self.finish(&start),
        })
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.bump().span;
        let (init, cond) = self.with_struct_lit(false, |p| {
            let first = p.parse_simple_stmt()?;
            if p.at_symbol(Symbol::Semi) {
                p.bump();
                let cond = p.parse_expr()?;
                Some((Some(Box::new(first)), cond))
            } else {
                match first {
                    Stmt::Expr { expr, .. } => Some((None, expr)),
                    other => {
                        p.diags
                            .push("expected condition in if statement", Some(other.span().clone()));
                        None
                    }
                }
            }
        })?;
        let then_block = self.parse_block()?;
        let else_branch = if self.at_keyword(Keyword::Else) {
            self.bump();
            if self.at_keyword(Keyword::If) {
                Some(Box::new(self.parse_if_stmt()?))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block()?)))
            }
        } else {
            None
        };
        Some(Stmt::If {
            init,
            cond,
            then_block,
            else_branch,
            span: self.finish(&start),
        })
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.bump().span;
        let header = self.with_struct_lit(false, |p| p.parse_for_header())?;
        let body = self.parse_block()?;
        let span = self.finish(&start);
        Some(match header {
            ForHeader::Infinite => Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                span,
            },
            ForHeader::Cond(cond) => Stmt::For {
                init: None,
                cond: Some(cond),
                post: None,
                body,
                span,
            },
            ForHeader::Clauses { init, cond, post } => Stmt::For {
                init,
                cond,
                post,
                body,
                span,
            },
            ForHeader::Range {
                key,
                value,
                define,
                expr,
            } => Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                span,
            },
        })
    }

    fn parse_for_header(&mut self) -> Option<ForHeader> {
        if self.at_symbol(Symbol::LBrace) {
            return Some(ForHeader::Infinite);
        }
        if self.at_keyword(Keyword::Range) {
            self.bump();
            let expr = self.parse_expr()?;
            return Some(ForHeader::Range {
                key: None,
                value: None,
                define: false,
                expr,
            });
        }
        let init = if self.at_symbol(Symbol::Semi) {
            None
        } else {
            let start = self.peek().span.clone();
            let lhs = self.parse_expr_list()?;
            let is_range_assign = (self.at_symbol(Symbol::Define) || self.at_symbol(Symbol::Eq))
                && matches!(self.peek_kind_at(1), Some(TokenKind::Keyword(Keyword::Range)));
            if is_range_assign {
                let define = self.at_symbol(Symbol::Define);
                self.bump();
                self.bump();
                let expr = self.parse_expr()?;
                let mut vars = lhs.into_iter();
                return Some(ForHeader::Range {
                    key: vars.next(),
                    value: vars.next(),
                    define,
                    expr,
                });
            }
            Some(self.finish_simple_stmt(lhs, start)?)
        };
        if self.at_symbol(Symbol::LBrace) {
            return match init {
                None => Some(ForHeader::Infinite),
                Some(Stmt::Expr { expr, .. }) => Some(ForHeader::Cond(expr)),
                Some(other) => {
                    self.diags
                        .push("expected for loop condition", Some(other.span().clone()));
                    None
                }
            };
        }
        self.expect_symbol(Symbol::Semi)?;
        let cond = if self.at_symbol(Symbol::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_symbol(Symbol::Semi)?;
        let post = if self.at_symbol(Symbol::LBrace) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        Some(ForHeader::Clauses {
            init: init.map(Box::new),
            cond,
            post,
        })
    }

    fn parse_switch_stmt(&mut self) -> Option<Stmt> {
        let start = self.bump().span;
        let (init, header) = self.with_struct_lit(false, |p| {
            if p.at_symbol(Symbol::LBrace) {
                return Some((None, None));
            }
            let first = if p.at_symbol(Symbol::Semi) {
                None
            } else {
                Some(p.parse_simple_stmt()?)
            };
            if p.at_symbol(Symbol::Semi) {
                p.bump();
                let header = if p.at_symbol(Symbol::LBrace) {
                    None
                } else {
                    Some(p.parse_simple_stmt()?)
                };
                Some((first.map(Box::new), header))
            } else {
                Some((None, first))
            }
        })?;

        if let Some((binding, subject, guard_span)) = self.split_type_switch_guard(header.as_ref()) {
            let lbrace = self.expect_symbol(Symbol::LBrace)?;
            let mut clauses = Vec::new();
            loop {
                self.consume_semis();
                if self.at_symbol(Symbol::RBrace) || self.at_eof() {
                    break;
                }
                clauses.push(self.parse_type_case_clause()?);
            }
            self.expect_symbol(Symbol::RBrace)?;
            return Some(Stmt::TypeSwitch(TypeSwitchStmt {
                init,
                binding,
                subject,
                guard_span,
                lbrace,
                clauses,
                span: self.finish(&start),
            }));
        }

        let tag = match header {
            None => None,
            Some(Stmt::Expr { expr, .. }) => Some(expr),
            Some(other) => {
                self.diags
                    .push("expected switch expression", Some(other.span().clone()));
                return None;
            }
        };
        self.expect_symbol(Symbol::LBrace)?;
        let mut clauses = Vec::new();
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RBrace) || self.at_eof() {
                break;
            }
            let clause_start = self.peek().span.clone();
            let exprs = if self.at_keyword(Keyword::Case) {
                self.bump();
                Some(self.parse_expr_list()?)
            } else if self.at_keyword(Keyword::Default) {
                self.bump();
                None
            } else {
                self.error_here("expected case or default");
                return None;
            };
            self.expect_symbol(Symbol::Colon)?;
            let body = self.parse_stmt_list();
            clauses.push(CaseClause {
                exprs,
                body,
                span: self.finish(&clause_start),
            });
        }
        self.expect_symbol(Symbol::RBrace)?;
        Some(Stmt::Switch {
            init,
            tag,
            clauses,
            span: self.finish(&start),
        })
    }

    /// Recognizes `x := y.(type)` and `y.(type)` switch headers.
    fn split_type_switch_guard(&self, header: Option<&Stmt>) -> Option<(Option<Ident>, Expr, Span)> {
        match header? {
            Stmt::ShortVar {
                names,
                values,
                span,
            } if names.len() == 1 && values.len() == 1 => match &values[0].kind {
                ExprKind::TypeAssert { base, ty: None } => {
                    Some((Some(names[0].clone()), (**base).clone(), span.clone()))
                }
                _ => None,
            },
            Stmt::Expr { expr, span } => match &expr.kind {
                ExprKind::TypeAssert { base, ty: None } => Some((None, (**base).clone(), span.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_type_case_clause(&mut self) -> Option<TypeCaseClause> {
        let start = self.peek().span.clone();
        let types = if self.at_keyword(Keyword::Case) {
            self.bump();
            let mut types = vec![self.parse_type()?];
            while self.at_symbol(Symbol::Comma) {
                self.bump();
                self.consume_semis();
                types.push(self.parse_type()?);
            }
            Some(types)
        } else if self.at_keyword(Keyword::Default) {
            self.bump();
            None
        } else {
            self.error_here("expected case or default");
            return None;
        };
        self.expect_symbol(Symbol::Colon)?;
        let body = self.parse_stmt_list();
        Some(TypeCaseClause {
            types,
            body,
            span: self.finish(&start),
        })
    }

    fn parse_select_stmt(&mut self) -> Option<Stmt> {
        let start = self.bump().span;
        self.expect_symbol(Symbol::LBrace)?;
        let mut clauses = Vec::new();
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RBrace) || self.at_eof() {
                break;
            }
            let clause_start = self.peek().span.clone();
            let comm = if self.at_keyword(Keyword::Case) {
                self.bump();
                Some(Box::new(self.parse_simple_stmt()?))
            } else if self.at_keyword(Keyword::Default) {
                self.bump();
                None
            } else {
                self.error_here("expected case or default");
                return None;
            };
            self.expect_symbol(Symbol::Colon)?;
            let body = self.parse_stmt_list();
            clauses.push(CommClause {
                comm,
                body,
                span: self.finish(&clause_start),
            });
        }
        self.expect_symbol(Symbol::RBrace)?;
        Some(Stmt::Select {
            clauses,
            span: self.finish(&start),
        })
    }

    // ---- expressions ----

    fn parse_expr_list(&mut self) -> Option<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.at_symbol(Symbol::Comma) {
            self.bump();
            exprs.push(self.parse_expr()?);
        }
        Some(exprs)
    }

    pub fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_binary_expr(1)
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> Option<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let (prec, op) = match self.peek_binary_op() {
                Some(pair) => pair,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.bump();
            let right = self.parse_binary_expr(prec + 1)?;
            let span = left.span.to(&right.span);
            left = self.new_expr(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Some(left)
    }

    fn parse_unary_expr(&mut self) -> Option<Expr> {
        let start = self.peek().span.clone();
        let op = match self.peek().kind {
            TokenKind::Symbol(Symbol::Plus) => UnaryOp::Plus,
            TokenKind::Symbol(Symbol::Minus) => UnaryOp::Neg,
            TokenKind::Symbol(Symbol::Bang) => UnaryOp::Not,
            TokenKind::Symbol(Symbol::Caret) => UnaryOp::BitNot,
            TokenKind::Symbol(Symbol::Amp) => UnaryOp::Addr,
            TokenKind::Symbol(Symbol::Arrow) => {
                if matches!(self.peek_kind_at(1), Some(TokenKind::Keyword(Keyword::Chan))) {
                    let ty = self.parse_type()?;
                    let span = ty.span.clone();
                    return Some(self.new_expr(ExprKind::Type(ty), span));
                }
                UnaryOp::Recv
            }
            TokenKind::Symbol(Symbol::Star) => {
                self.bump();
                let inner = self.parse_unary_expr()?;
                let span = self.finish(&start);
                return Some(self.new_expr(ExprKind::Star(Box::new(inner)), span));
            }
            _ => return self.parse_postfix_expr(),
        };
        self.bump();
        let expr = self.parse_unary_expr()?;
        let span = self.finish(&start);
        Some(self.new_expr(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn parse_postfix_expr(&mut self) -> Option<Expr> {
        let start = self.peek().span.clone();
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.at_symbol(Symbol::Dot) {
                self.bump();
                if self.at_symbol(Symbol::LParen) {
                    self.bump();
                    let ty = if self.at_keyword(Keyword::Type) {
                        self.bump();
                        None
                    } else {
                        Some(self.parse_type()?)
                    };
                    self.expect_symbol(Symbol::RParen)?;
                    let span = self.finish(&start);
                    expr = self.new_expr(
                        ExprKind::TypeAssert {
                            base: Box::new(expr),
                            ty,
                        },
                        span,
                    );
                } else {
                    let field = self.expect_ident()?;
                    let span = self.finish(&start);
                    expr = self.new_expr(
                        ExprKind::Selector {
                            base: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
            } else if self.at_symbol(Symbol::LBracket) {
                self.bump();
                expr = self.with_struct_lit(true, |p| p.parse_index_or_slice(expr, &start))?;
            } else if self.at_symbol(Symbol::LParen) {
                self.bump();
                let (args, has_ellipsis) = self.with_struct_lit(true, |p| p.parse_call_args())?;
                let span = self.finish(&start);
                expr = self.new_expr(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        has_ellipsis,
                    },
                    span,
                );
            } else if self.at_symbol(Symbol::LBrace) && self.allow_struct_lit {
                let Some(ty) = expr_as_type_name(&expr) else {
                    break;
                };
                expr = self.parse_composite_lit(Some(ty), &start)?;
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_index_or_slice(&mut self, base: Expr, start: &Span) -> Option<Expr> {
        let low = if self.at_symbol(Symbol::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let kind = if self.at_symbol(Symbol::Colon) {
            self.bump();
            let high = if self.at_symbol(Symbol::RBracket) || self.at_symbol(Symbol::Colon) {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            let max = if self.at_symbol(Symbol::Colon) {
                self.bump();
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            ExprKind::Slice {
                base: Box::new(base),
                low,
                high,
                max,
            }
        } else {
            match low {
                Some(index) => ExprKind::Index {
                    base: Box::new(base),
                    index,
                },
                None => {
                    self.error_here("expected index expression");
                    return None;
                }
            }
        };
        self.expect_symbol(Symbol::RBracket)?;
        let span = self.finish(start);
        Some(self.new_expr(kind, span))
    }

    fn parse_call_args(&mut self) -> Option<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut has_ellipsis = false;
        loop {
            self.consume_semis();
            if self.at_symbol(Symbol::RParen) || self.at_eof() {
                break;
            }
            args.push(self.parse_expr()?);
            if self.at_symbol(Symbol::Ellipsis) {
                self.bump();
                has_ellipsis = true;
            }
            if self.at_symbol(Symbol::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.consume_semis();
        self.expect_symbol(Symbol::RParen)?;
        Some((args, has_ellipsis))
    }

    fn parse_primary_expr(&mut self) -> Option<Expr> {
        let start = self.peek().span.clone();
        let kind = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                ExprKind::Ident(name)
            }
            TokenKind::IntLit(text) => {
                self.bump();
                ExprKind::Int(text)
            }
            TokenKind::FloatLit(text) => {
                self.bump();
                ExprKind::Float(text)
            }
            TokenKind::ImagLit(text) => {
                self.bump();
                ExprKind::Imag(text)
            }
            TokenKind::CharLit(ch) => {
                self.bump();
                ExprKind::Char(ch)
            }
            TokenKind::StringLit(value) => {
                self.bump();
                ExprKind::String(value)
            }
            TokenKind::Symbol(Symbol::LParen) => {
                self.bump();
                let inner = self.with_struct_lit(true, |p| p.parse_expr())?;
                self.expect_symbol(Symbol::RParen)?;
                ExprKind::Paren(Box::new(inner))
            }
            TokenKind::Symbol(Symbol::LBracket)
            | TokenKind::Keyword(Keyword::Map)
            | TokenKind::Keyword(Keyword::Struct) => {
                let ty = self.parse_type()?;
                if self.at_symbol(Symbol::LBrace) {
                    return self.parse_composite_lit(Some(ty), &start);
                }
                ExprKind::Type(ty)
            }
            TokenKind::Keyword(Keyword::Func) => {
                self.bump();
                let sig = self.parse_signature(&start)?;
                if self.at_symbol(Symbol::LBrace) {
                    let body = self.parse_block()?;
                    ExprKind::FuncLit { sig, body }
                } else {
                    ExprKind::Type(TypeExpr {
                        span: sig.span.clone(),
                        kind: TypeExprKind::Func(sig),
                    })
                }
            }
            TokenKind::Keyword(Keyword::Chan) | TokenKind::Keyword(Keyword::Interface) => {
                ExprKind::Type(self.parse_type()?)
            }
            _ => {
                self.error_here("expected expression");
                return None;
            }
        };
        let span = self.finish(&start);
        Some(self.new_expr(kind, span))
    }

    fn parse_composite_lit(&mut self, ty: Option<TypeExpr>, start: &Span) -> Option<Expr> {
        self.expect_symbol(Symbol::LBrace)?;
        let elems = self.with_struct_lit(true, |p| {
            let mut elems = Vec::new();
            loop {
                p.consume_semis();
                if p.at_symbol(Symbol::RBrace) || p.at_eof() {
                    break;
                }
                let first = p.parse_element()?;
                let elem = if p.at_symbol(Symbol::Colon) {
                    p.bump();
                    KeyedElement {
                        key: Some(first),
                        value: p.parse_element()?,
                    }
                } else {
                    KeyedElement {
                        key: None,
                        value: first,
                    }
                };
                elems.push(elem);
                if p.at_symbol(Symbol::Comma) {
                    p.bump();
                } else {
                    break;
                }
            }
            p.consume_semis();
            Some(elems)
        })?;
        self.expect_symbol(Symbol::RBrace)?;
        let span = self.finish(start);
        Some(self.new_expr(ExprKind::CompositeLit { ty, elems }, span))
    }

    /// A composite literal element; inner literals may elide their type.
    fn parse_element(&mut self) -> Option<Expr> {
        if self.at_symbol(Symbol::LBrace) {
            let start = self.peek().span.clone();
            return self.parse_composite_lit(None, &start);
        }
        self.parse_expr()
    }

    // ---- comments ----

    fn doc_before(&self, line: usize) -> Option<CommentGroup> {
        self.groups
            .iter()
            .find(|g| !g.trailing && g.end_line + 1 == line)
            .map(|g| g.group.clone())
    }

    fn line_comment_after(&self, offset: usize, line: usize) -> Option<CommentGroup> {
        self.groups
            .iter()
            .find(|g| g.trailing && g.first_line == line && g.first_start >= offset)
            .map(|g| g.group.clone())
    }

    // ---- token helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + offset).map(|t| &t.kind)
    }

    fn peek_is_symbol_at(&self, offset: usize, symbol: Symbol) -> bool {
        matches!(self.peek_kind_at(offset), Some(TokenKind::Symbol(sym)) if *sym == symbol)
    }

    fn peek_is_ident_at(&self, offset: usize) -> bool {
        matches!(self.peek_kind_at(offset), Some(TokenKind::Ident(_)))
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.idx += 1;
            // inserted semicolons are zero-width and do not extend node spans
            if token.span.end > token.span.start {
                self.last_end = token.span.end;
                self.last_line = token.span.line;
            }
        }
        token
    }

    fn finish(&self, start: &Span) -> Span {
        Span {
            start: start.start,
            end: self.last_end.max(start.start),
            line: start.line,
            column: start.column,
        }
    }

    fn recover(&mut self, before: usize) {
        if self.idx == before {
            self.bump();
        }
        while !(self.at_symbol(Symbol::Semi) || self.at_symbol(Symbol::RBrace) || self.at_eof()) {
            self.bump();
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn at_symbol(&self, symbol: Symbol) -> bool {
        matches!(&self.peek().kind, TokenKind::Symbol(sym) if *sym == symbol)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(kw) if *kw == keyword)
    }

    fn consume_semis(&mut self) {
        while self.at_symbol(Symbol::Semi) {
            self.bump();
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> Option<Span> {
        if self.at_symbol(symbol) {
            Some(self.bump().span)
        } else {
            self.error_here(&format!("expected {:?}", symbol));
            None
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Option<Span> {
        if self.at_keyword(keyword) {
            Some(self.bump().span)
        } else {
            self.error_here(&format!("expected `{}`", format!("{:?}", keyword).to_lowercase()));
            None
        }
    }

    fn expect_ident(&mut self) -> Option<Ident> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let tok = self.bump();
                Some(Ident {
                    name,
                    span: tok.span,
                })
            }
            _ => {
                self.error_here("expected identifier");
                None
            }
        }
    }

    fn peek_span(&self) -> Option<Span> {
        Some(self.peek().span.clone())
    }

    fn error_here(&mut self, message: &str) {
        self.diags.push(message, self.peek_span());
    }

    fn peek_binary_op(&self) -> Option<(u8, BinaryOp)> {
        let op = match self.peek().kind {
            TokenKind::Symbol(Symbol::OrOr) => (1, BinaryOp::Or),
            TokenKind::Symbol(Symbol::AndAnd) => (2, BinaryOp::And),
            TokenKind::Symbol(Symbol::EqEq) => (3, BinaryOp::Eq),
            TokenKind::Symbol(Symbol::NotEq) => (3, BinaryOp::NotEq),
            TokenKind::Symbol(Symbol::Lt) => (3, BinaryOp::Lt),
            TokenKind::Symbol(Symbol::Lte) => (3, BinaryOp::Lte),
            TokenKind::Symbol(Symbol::Gt) => (3, BinaryOp::Gt),
            TokenKind::Symbol(Symbol::Gte) => (3, BinaryOp::Gte),
            TokenKind::Symbol(Symbol::Plus) => (4, BinaryOp::Add),
            TokenKind::Symbol(Symbol::Minus) => (4, BinaryOp::Sub),
            TokenKind::Symbol(Symbol::Pipe) => (4, BinaryOp::BitOr),
            TokenKind::Symbol(Symbol::Caret) => (4, BinaryOp::BitXor),
            TokenKind::Symbol(Symbol::Star) => (5, BinaryOp::Mul),
            TokenKind::Symbol(Symbol::Slash) => (5, BinaryOp::Div),
            TokenKind::Symbol(Symbol::Percent) => (5, BinaryOp::Rem),
            TokenKind::Symbol(Symbol::Shl) => (5, BinaryOp::Shl),
            TokenKind::Symbol(Symbol::Shr) => (5, BinaryOp::Shr),
            TokenKind::Symbol(Symbol::Amp) => (5, BinaryOp::BitAnd),
            TokenKind::Symbol(Symbol::AmpCaret) => (5, BinaryOp::BitClear),
            _ => return None,
        };
        Some(op)
    }

    fn peek_assign_op(&self) -> Option<AssignOp> {
        match self.peek().kind {
            TokenKind::Symbol(Symbol::Eq) => Some(AssignOp::Assign),
            TokenKind::Symbol(Symbol::PlusEq) => Some(AssignOp::AddAssign),
            TokenKind::Symbol(Symbol::MinusEq) => Some(AssignOp::SubAssign),
            TokenKind::Symbol(Symbol::StarEq) => Some(AssignOp::MulAssign),
            TokenKind::Symbol(Symbol::SlashEq) => Some(AssignOp::DivAssign),
            TokenKind::Symbol(Symbol::PercentEq) => Some(AssignOp::RemAssign),
            TokenKind::Symbol(Symbol::AmpEq) => Some(AssignOp::BitAndAssign),
            TokenKind::Symbol(Symbol::PipeEq) => Some(AssignOp::BitOrAssign),
            TokenKind::Symbol(Symbol::CaretEq) => Some(AssignOp::BitXorAssign),
            TokenKind::Symbol(Symbol::AmpCaretEq) => Some(AssignOp::BitClearAssign),
            TokenKind::Symbol(Symbol::ShlEq) => Some(AssignOp::ShlAssign),
            TokenKind::Symbol(Symbol::ShrEq) => Some(AssignOp::ShrAssign),
            _ => None,
        }
    }
}

/// `T{...}` and `pkg.T{...}` literal types written as expressions.
fn expr_as_type_name(expr: &Expr) -> Option<TypeExpr> {
    let kind = match &expr.kind {
        ExprKind::Ident(name) => TypeExprKind::Name(Ident {
            name: name.clone(),
            span: expr.span.clone(),
        }),
        ExprKind::Selector { base, field } => match &base.kind {
            ExprKind::Ident(pkg) => TypeExprKind::Qualified {
                package: Ident {
                    name: pkg.clone(),
                    span: base.span.clone(),
                },
                name: field.clone(),
            },
            _ => return None,
        },
        _ => return None,
    };
    Some(TypeExpr {
        kind,
        span: expr.span.clone(),
    })
}

pub fn parse_int_lit(text: &str) -> Option<u64> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        u64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

fn comment_end_line(comment: &Comment) -> usize {
    comment.span.line + comment.text.matches('\n').count()
}

/// Groups adjacent comments the way Go does: a blank line, an intervening
/// token, or a preceding trailing comment starts a new group.
fn group_comments(comments: &[Comment], tokens: &[Token]) -> Vec<ParsedGroup> {
    let real_token_between = |from: usize, to: usize| {
        let first = tokens.partition_point(|t| t.span.start < from);
        tokens[first..]
            .iter()
            .take_while(|t| t.span.start < to)
            .any(|t| t.span.end > t.span.start)
    };
    let after_code = |comment: &Comment| {
        let idx = tokens.partition_point(|t| t.span.start < comment.span.start);
        tokens[..idx]
            .iter()
            .rev()
            .find(|t| t.span.end > t.span.start)
            .is_some_and(|t| t.span.line == comment.span.line)
    };

    let mut groups: Vec<ParsedGroup> = Vec::new();
    for comment in comments {
        let joins = match groups.last() {
            Some(group) => {
                let prev = group.group.list.last();
                let prev_is_trailing = group.trailing && group.group.list.len() == 1;
                comment.span.line <= group.end_line + 1
                    && !prev_is_trailing
                    && !after_code(comment)
                    && prev.is_some_and(|p| !real_token_between(p.span.end, comment.span.start))
            }
            None => false,
        };
        if joins {
            if let Some(group) = groups.last_mut() {
                group.end_line = comment_end_line(comment);
                group.group.list.push(comment.clone());
            }
        } else {
            groups.push(ParsedGroup {
                group: CommentGroup {
                    list: vec![comment.clone()],
                },
                first_line: comment.span.line,
                first_start: comment.span.start,
                end_line: comment_end_line(comment),
                trailing: after_code(comment),
            });
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::frontend::ast::*;
    use crate::frontend::lexer::Lexer;

    fn parse(src: &str) -> FileAst {
        let mut parser = Parser::new(Lexer::new(src).lex());
        let file = parser.parse_file().expect("parse");
        assert!(
            parser.diags.is_empty(),
            "unexpected diagnostics: {:?}",
            parser.diags.items
        );
        file
    }

    fn func<'a>(file: &'a FileAst, name: &str) -> &'a FuncDecl {
        file.decls
            .iter()
            .find_map(|d| match d {
                Decl::Func(f) if f.name.name == name => Some(f),
                _ => None,
            })
            .expect("function")
    }

    #[test]
    fn parses_type_switch_with_binding() {
        let src = "package p\n\nfunc f(x interface{}) {\n\tswitch v := x.(type) {\n\tcase []T:\n\t\t_ = v\n\tcase map[string]T, int:\n\tdefault:\n\t}\n}\n";
        let file = parse(src);
        let body = func(&file, "f").body.as_ref().expect("body");
        let Stmt::TypeSwitch(sw) = &body.stmts[0] else {
            panic!("expected type switch, got {:?}", body.stmts[0]);
        };
        assert_eq!(sw.binding.as_ref().map(|b| b.name.as_str()), Some("v"));
        assert!(matches!(sw.subject.kind, ExprKind::Ident(ref n) if n == "x"));
        assert_eq!(sw.clauses.len(), 3);
        assert_eq!(sw.clauses[1].types.as_ref().map(|t| t.len()), Some(2));
        assert!(sw.clauses[2].types.is_none());
        assert_eq!(&src[sw.clauses[0].span.start..sw.clauses[0].span.end], "case []T:\n\t\t_ = v");
    }

    #[test]
    fn groups_parameter_names_by_type() {
        let file = parse("package p\nfunc f(a, b int, c ...string) (n int, err error) { return }\n");
        let sig = &func(&file, "f").sig;
        let names: Vec<_> = sig
            .param_names()
            .into_iter()
            .map(|n| n.map(|i| i.name.clone()))
            .collect();
        assert_eq!(names, vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]);
        assert!(sig.is_variadic);
        assert_eq!(sig.results.len(), 2);
    }

    #[test]
    fn unnamed_parameters_are_types() {
        let file = parse("package p\nvar f func(int, string) (bool, error)\n");
        let Decl::Var(spec) = &file.decls[0] else {
            panic!("expected var");
        };
        let Some(TypeExpr {
            kind: TypeExprKind::Func(sig),
            ..
        }) = &spec.ty
        else {
            panic!("expected func type");
        };
        assert_eq!(sig.params.len(), 2);
        assert!(sig.params.iter().all(|g| g.names.is_empty()));
    }

    #[test]
    fn attaches_doc_and_trailing_comments() {
        let src = "package p\n\n// +tsgen typevar\ntype NumT float64\n\ntype (\n\tA interface{} // +tsgen typevar\n\t// B doc\n\tB int\n)\n";
        let file = parse(src);
        let types: Vec<&TypeDecl> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Type(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(types.len(), 3);
        let doc: Vec<_> = types[0].doc.as_ref().expect("doc").lines().collect();
        assert_eq!(doc, vec!["+tsgen typevar"]);
        let trailing: Vec<_> = types[1]
            .line_comment
            .as_ref()
            .expect("line comment")
            .lines()
            .collect();
        assert_eq!(trailing, vec!["+tsgen typevar"]);
        assert!(types[1].doc.is_none());
        let b_doc: Vec<_> = types[2].doc.as_ref().expect("b doc").lines().collect();
        assert_eq!(b_doc, vec!["B doc"]);
    }

    #[test]
    fn composite_literals_disabled_in_headers() {
        let src = "package p\nfunc f(x T) {\n\tif x == y {\n\t}\n\tfor _, v := range []int{1, 2} {\n\t\t_ = v\n\t}\n\t_ = T{A: 1}\n}\n";
        let file = parse(src);
        let body = func(&file, "f").body.as_ref().expect("body");
        assert!(matches!(body.stmts[0], Stmt::If { .. }));
        assert!(matches!(body.stmts[1], Stmt::Range { define: true, .. }));
        let Stmt::Assign { rhs, .. } = &body.stmts[2] else {
            panic!("expected assignment");
        };
        assert!(matches!(rhs[0].kind, ExprKind::CompositeLit { .. }));
    }

    #[test]
    fn parses_make_with_channel_type_argument() {
        let file = parse("package p\nfunc f() {\n\tg(make([]chan<- *foo, 0), map[int]bool{}, func(int) (bool, error) { return false, nil })\n}\n");
        let body = func(&file, "f").body.as_ref().expect("body");
        let Stmt::Expr { expr, .. } = &body.stmts[0] else {
            panic!("expected call");
        };
        let ExprKind::Call { args, .. } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
        assert!(matches!(args[2].kind, ExprKind::FuncLit { .. }));
    }

    #[test]
    fn reports_syntax_errors() {
        let mut parser = Parser::new(Lexer::new("package p\nfunc f( {\n").lex());
        let _ = parser.parse_file();
        assert!(!parser.diags.is_empty());
    }
}
