use super::ast::{Comment, Span};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    IntLit(String),
    FloatLit(String),
    ImagLit(String),
    StringLit(String),
    CharLit(char),
    Unknown(char),
    Keyword(Keyword),
    Symbol(Symbol),
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Keyword {
    Package,
    Import,
    Type,
    Func,
    Var,
    Const,
    Struct,
    Interface,
    Map,
    Chan,
    If,
    Else,
    For,
    Range,
    Switch,
    Case,
    Default,
    Select,
    Return,
    Break,
    Continue,
    Goto,
    Fallthrough,
    Go,
    Defer,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Symbol {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Ellipsis,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    AmpCaret,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    AmpCaretEq,
    ShlEq,
    ShrEq,
    AndAnd,
    OrOr,
    Arrow,
    Inc,
    Dec,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Define,
    Bang,
    Tilde,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokens plus the comments the lexer skipped over.
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

pub struct Lexer<'a> {
    bytes: &'a [u8],
    idx: usize,
    line: usize,
    col: usize,
    prev_can_insert_semi: bool,
    pending_semi: bool,
    comments: Vec<Comment>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            bytes: src.as_bytes(),
            idx: 0,
            line: 1,
            col: 1,
            prev_can_insert_semi: false,
            pending_semi: false,
            comments: Vec::new(),
        }
    }

    pub fn lex_all(self) -> Vec<Token> {
        self.lex().tokens
    }

    pub fn lex(mut self) -> Lexed {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Lexed {
            tokens,
            comments: self.comments,
        }
    }

    fn inserted_semi(&self) -> Token {
        Token {
            kind: TokenKind::Symbol(Symbol::Semi),
            span: Span {
                start: self.idx,
                end: self.idx,
                line: self.line,
                column: self.col,
            },
        }
    }

    fn next_token(&mut self) -> Token {
        if self.pending_semi {
            self.pending_semi = false;
            return self.inserted_semi();
        }
        self.skip_whitespace_and_comments();
        if self.pending_semi {
            self.pending_semi = false;
            return self.inserted_semi();
        }
        let start = self.idx;
        let (line, column) = (self.line, self.col);
        if self.idx >= self.bytes.len() {
            if self.prev_can_insert_semi {
                self.prev_can_insert_semi = false;
                return self.inserted_semi();
            }
            return Token {
                kind: TokenKind::Eof,
                span: Span {
                    start,
                    end: start,
                    line,
                    column,
                },
            };
        }
        let ch = self.peek_char();
        let kind = if is_ident_start(self.peek_utf8().0) {
            let ident = self.read_ident();
            keyword_from_str(&ident)
                .map(TokenKind::Keyword)
                .unwrap_or(TokenKind::Ident(ident))
        } else if ch.is_ascii_digit() || (ch == '.' && self.peek_next_char().is_ascii_digit()) {
            self.read_number()
        } else {
            match ch {
                '"' => TokenKind::StringLit(self.read_string()),
                '`' => TokenKind::StringLit(self.read_raw_string()),
                '\'' => TokenKind::CharLit(self.read_char_lit()),
                _ => self.read_symbol(ch),
            }
        };
        let end = self.idx;
        self.prev_can_insert_semi = can_insert_semi_after(&kind);
        Token {
            kind,
            span: Span {
                start,
                end,
                line,
                column,
            },
        }
    }

    fn read_symbol(&mut self, ch: char) -> TokenKind {
        self.advance();
        let sym = match ch {
            '(' => Symbol::LParen,
            ')' => Symbol::RParen,
            '{' => Symbol::LBrace,
            '}' => Symbol::RBrace,
            '[' => Symbol::LBracket,
            ']' => Symbol::RBracket,
            ',' => Symbol::Comma,
            ';' => Symbol::Semi,
            '~' => Symbol::Tilde,
            ':' => self.pick('=', Symbol::Define, Symbol::Colon),
            '.' => {
                if self.peek_char() == '.' && self.peek_next_char() == '.' {
                    self.advance();
                    self.advance();
                    Symbol::Ellipsis
                } else {
                    Symbol::Dot
                }
            }
            '+' => {
                if self.eat('+') {
                    Symbol::Inc
                } else {
                    self.pick('=', Symbol::PlusEq, Symbol::Plus)
                }
            }
            '-' => {
                if self.eat('-') {
                    Symbol::Dec
                } else {
                    self.pick('=', Symbol::MinusEq, Symbol::Minus)
                }
            }
            '*' => self.pick('=', Symbol::StarEq, Symbol::Star),
            '/' => self.pick('=', Symbol::SlashEq, Symbol::Slash),
            '%' => self.pick('=', Symbol::PercentEq, Symbol::Percent),
            '^' => self.pick('=', Symbol::CaretEq, Symbol::Caret),
            '=' => self.pick('=', Symbol::EqEq, Symbol::Eq),
            '!' => self.pick('=', Symbol::NotEq, Symbol::Bang),
            '&' => {
                if self.eat('&') {
                    Symbol::AndAnd
                } else if self.eat('^') {
                    self.pick('=', Symbol::AmpCaretEq, Symbol::AmpCaret)
                } else {
                    self.pick('=', Symbol::AmpEq, Symbol::Amp)
                }
            }
            '|' => {
                if self.eat('|') {
                    Symbol::OrOr
                } else {
                    self.pick('=', Symbol::PipeEq, Symbol::Pipe)
                }
            }
            '<' => {
                if self.eat('-') {
                    Symbol::Arrow
                } else if self.eat('<') {
                    self.pick('=', Symbol::ShlEq, Symbol::Shl)
                } else {
                    self.pick('=', Symbol::Lte, Symbol::Lt)
                }
            }
            '>' => {
                if self.eat('>') {
                    self.pick('=', Symbol::ShrEq, Symbol::Shr)
                } else {
                    self.pick('=', Symbol::Gte, Symbol::Gt)
                }
            }
            _ => return TokenKind::Unknown(ch),
        };
        TokenKind::Symbol(sym)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek_char() == ch {
            self.advance();
            true
        } else {
            false
        }
    }

    fn pick(&mut self, next: char, yes: Symbol, no: Symbol) -> Symbol {
        if self.eat(next) {
            yes
        } else {
            no
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            if self.idx >= self.bytes.len() {
                return;
            }
            let ch = self.peek_char();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    if self.prev_can_insert_semi {
                        self.prev_can_insert_semi = false;
                        self.pending_semi = true;
                        return;
                    }
                }
                '/' if self.peek_next_char() == '/' => {
                    let (start, line, column) = (self.idx, self.line, self.col);
                    while self.idx < self.bytes.len() && self.peek_char() != '\n' {
                        self.advance();
                    }
                    self.push_comment(start, line, column);
                }
                '/' if self.peek_next_char() == '*' => {
                    let (start, line, column) = (self.idx, self.line, self.col);
                    self.advance();
                    self.advance();
                    let mut saw_newline = false;
                    while self.idx < self.bytes.len() {
                        if self.peek_char() == '*' && self.peek_next_char() == '/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.peek_char() == '\n' {
                            saw_newline = true;
                        }
                        self.advance();
                    }
                    self.push_comment(start, line, column);
                    // A general comment spanning lines acts like a newline.
                    if saw_newline && self.prev_can_insert_semi {
                        self.prev_can_insert_semi = false;
                        self.pending_semi = true;
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn push_comment(&mut self, start: usize, line: usize, column: usize) {
        let text = String::from_utf8_lossy(&self.bytes[start..self.idx]).into_owned();
        self.comments.push(Comment {
            text,
            span: Span {
                start,
                end: self.idx,
                line,
                column,
            },
        });
    }

    fn read_string(&mut self) -> String {
        self.advance(); // opening quote
        let mut s = String::new();
        while self.idx < self.bytes.len() {
            let ch = self.peek_char();
            if ch == '"' || ch == '\n' {
                self.advance();
                break;
            }
            if ch == '\\' {
                self.advance();
                s.push(self.read_escape());
            } else {
                s.push(self.read_utf8_char());
            }
        }
        s
    }

    fn read_raw_string(&mut self) -> String {
        self.advance();
        let start = self.idx;
        while self.idx < self.bytes.len() && self.peek_char() != '`' {
            self.advance();
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.idx]).replace('\r', "");
        if self.idx < self.bytes.len() {
            self.advance();
        }
        raw
    }

    fn read_char_lit(&mut self) -> char {
        self.advance();
        let ch = if self.peek_char() == '\\' {
            self.advance();
            self.read_escape()
        } else {
            self.read_utf8_char()
        };
        if self.peek_char() == '\'' {
            self.advance();
        }
        ch
    }

    fn read_escape(&mut self) -> char {
        let esc = self.peek_char();
        self.advance();
        match esc {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    if let Some(d) = self.peek_char().to_digit(8) {
                        value = value * 8 + d;
                        self.advance();
                    }
                }
                char::from_u32(value).unwrap_or('\u{fffd}')
            }
            'x' => self.read_hex_escape(2),
            'u' => self.read_hex_escape(4),
            'U' => self.read_hex_escape(8),
            _ => esc,
        }
    }

    fn read_hex_escape(&mut self, digits: usize) -> char {
        let mut value = 0u32;
        for _ in 0..digits {
            match self.peek_char().to_digit(16) {
                Some(d) => {
                    value = value.wrapping_mul(16).wrapping_add(d);
                    self.advance();
                }
                None => break,
            }
        }
        char::from_u32(value).unwrap_or('\u{fffd}')
    }

    fn read_utf8_char(&mut self) -> char {
        let rest = &self.bytes[self.idx..];
        let width = utf8_width(rest.first().copied().unwrap_or(0)).min(rest.len()).max(1);
        let ch = std::str::from_utf8(&rest[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('\u{fffd}');
        for _ in 0..width {
            self.advance();
        }
        ch
    }

    /// The char at the cursor and its width in bytes; invalid UTF-8 reads as U+FFFD.
    fn peek_utf8(&self) -> (char, usize) {
        let rest = &self.bytes[self.idx.min(self.bytes.len())..];
        let Some(&first) = rest.first() else {
            return ('\0', 0);
        };
        let width = utf8_width(first).min(rest.len());
        let ch = std::str::from_utf8(&rest[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('\u{fffd}');
        (ch, width)
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        loop {
            let (ch, width) = self.peek_utf8();
            if width == 0 || !is_ident_continue(ch) {
                break;
            }
            ident.push(ch);
            for _ in 0..width {
                self.advance();
            }
        }
        ident
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.idx;
        let mut is_float = false;
        if self.peek_char() == '0' && matches!(self.peek_next_char(), 'x' | 'X') {
            self.advance();
            self.advance();
            self.read_while(|c| c.is_ascii_hexdigit() || c == '_');
            if self.peek_char() == '.' {
                is_float = true;
                self.advance();
                self.read_while(|c| c.is_ascii_hexdigit() || c == '_');
            }
            if matches!(self.peek_char(), 'p' | 'P') {
                is_float = true;
                self.advance();
                if matches!(self.peek_char(), '+' | '-') {
                    self.advance();
                }
                self.read_while(|c| c.is_ascii_digit() || c == '_');
            }
        } else if self.peek_char() == '0' && matches!(self.peek_next_char(), 'b' | 'B' | 'o' | 'O') {
            self.advance();
            self.advance();
            self.read_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.read_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek_char() == '.' && self.peek_next_char() != '.' {
                is_float = true;
                self.advance();
                self.read_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek_char(), 'e' | 'E') {
                is_float = true;
                self.advance();
                if matches!(self.peek_char(), '+' | '-') {
                    self.advance();
                }
                self.read_while(|c| c.is_ascii_digit());
            }
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.idx]).into_owned();
        if self.peek_char() == 'i' {
            self.advance();
            return TokenKind::ImagLit(text);
        }
        if is_float {
            TokenKind::FloatLit(text)
        } else {
            TokenKind::IntLit(text)
        }
    }

    fn read_while<F>(&mut self, f: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let mut s = String::new();
        while self.idx < self.bytes.len() {
            let ch = self.peek_char();
            if !f(ch) {
                break;
            }
            s.push(ch);
            self.advance();
        }
        s
    }

    fn advance(&mut self) {
        if self.idx >= self.bytes.len() {
            return;
        }
        let byte = self.bytes[self.idx];
        self.idx += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if byte & 0xC0 != 0x80 {
            self.col += 1;
        }
    }

    fn peek_char(&self) -> char {
        self.bytes.get(self.idx).copied().unwrap_or(b'\0') as char
    }

    fn peek_next_char(&self) -> char {
        self.bytes.get(self.idx + 1).copied().unwrap_or(b'\0') as char
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

fn keyword_from_str(ident: &str) -> Option<Keyword> {
    let kw = match ident {
        "package" => Keyword::Package,
        "import" => Keyword::Import,
        "type" => Keyword::Type,
        "func" => Keyword::Func,
        "var" => Keyword::Var,
        "const" => Keyword::Const,
        "struct" => Keyword::Struct,
        "interface" => Keyword::Interface,
        "map" => Keyword::Map,
        "chan" => Keyword::Chan,
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "for" => Keyword::For,
        "range" => Keyword::Range,
        "switch" => Keyword::Switch,
        "case" => Keyword::Case,
        "default" => Keyword::Default,
        "select" => Keyword::Select,
        "return" => Keyword::Return,
        "break" => Keyword::Break,
        "continue" => Keyword::Continue,
        "goto" => Keyword::Goto,
        "fallthrough" => Keyword::Fallthrough,
        "go" => Keyword::Go,
        "defer" => Keyword::Defer,
        _ => return None,
    };
    Some(kw)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn can_insert_semi_after(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Ident(_)
        | TokenKind::IntLit(_)
        | TokenKind::FloatLit(_)
        | TokenKind::ImagLit(_)
        | TokenKind::StringLit(_)
        | TokenKind::CharLit(_) => true,
        TokenKind::Keyword(Keyword::Return)
        | TokenKind::Keyword(Keyword::Break)
        | TokenKind::Keyword(Keyword::Continue)
        | TokenKind::Keyword(Keyword::Fallthrough) => true,
        TokenKind::Symbol(Symbol::RParen)
        | TokenKind::Symbol(Symbol::RBracket)
        | TokenKind::Symbol(Symbol::RBrace)
        | TokenKind::Symbol(Symbol::Inc)
        | TokenKind::Symbol(Symbol::Dec) => true,
        _ => false,
    }
}
