use super::ast::Span;

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.items.push(Diagnostic::new(message, span));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders every diagnostic against `source`, one block per item.
    pub fn render(&self, path: &str, source: &str) -> String {
        self.items
            .iter()
            .map(|diag| format_diagnostic(diag, path, source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn format_diagnostic(diag: &Diagnostic, path: &str, source: &str) -> String {
    match &diag.span {
        Some(span) => {
            let line_text = source
                .lines()
                .nth(span.line.saturating_sub(1))
                .unwrap_or("");
            format!(
                "{}:{}:{}: error: {}\n  {}\n  {}^",
                path,
                span.line,
                span.column,
                diag.message,
                line_text,
                " ".repeat(span.column.saturating_sub(1))
            )
        }
        None => format!("{}: error: {}", path, diag.message),
    }
}

#[cfg(test)]
mod tests {
    use super::{Diagnostic, Diagnostics};
    use crate::frontend::ast::Span;

    #[test]
    fn renders_caret_under_column() {
        let mut diags = Diagnostics::default();
        diags.push(
            "expected type",
            Some(Span {
                start: 14,
                end: 15,
                line: 2,
                column: 5,
            }),
        );
        diags.items.push(Diagnostic::new("could not parse file", None));
        let out = diags.render("a.go", "package p\nvar x = \n");
        assert_eq!(
            out,
            "a.go:2:5: error: expected type\n  var x = \n      ^\na.go: error: could not parse file"
        );
    }
}
