// Purpose: Frontend module hub that turns Go source text into a span-annotated AST.
// Inputs/Outputs: `parse_source` takes one file's text and returns its AST or diagnostics.
// Invariants: Spans are byte offsets into the exact text given; rewrites splice by them.
// Gotchas: Expression ids must stay unique across every file of one program load.

pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod suggest;
pub mod visit;

use ast::{ExprId, FileAst};
use diagnostic::Diagnostics;
use lexer::Lexer;
use parser::Parser;

/// Parses one file, numbering expressions from `next_expr_id`.
///
/// Returns the AST together with the next unused expression id.
pub fn parse_source(source: &str, next_expr_id: ExprId) -> Result<(FileAst, ExprId), Diagnostics> {
    let mut parser = Parser::new_with_expr_id(Lexer::new(source).lex(), next_expr_id);
    let file = parser.parse_file();
    match file {
        Some(file) if parser.diags.is_empty() => Ok((file, parser.next_expr_id())),
        _ => {
            if parser.diags.is_empty() {
                parser.diags.push("could not parse file", None);
            }
            Err(parser.diags)
        }
    }
}
