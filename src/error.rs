use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a whole rewrite pass. No file is written when one occurs.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}:\n{rendered}", path.display())]
    Parse { path: PathBuf, rendered: String },

    #[error("entry package `{0}` is not among the loaded packages")]
    UnknownEntry(String),

    #[error("package `{0}` has no main function and no test functions to root the call graph")]
    NoEntryPoint(String),

    #[error("no Go source files to load")]
    NoPackages,
}

/// Why one type switch was left untouched. Never escapes its statement.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("type switch has no single-pattern arms")]
    NoTemplates,

    #[error("type switch subject is not a plain identifier")]
    UnsupportedSubject,

    #[error("`{0}` is declared in the function body, not as a parameter")]
    ScopeMismatch(String),

    #[error("`{name}` is not a parameter of the enclosing function")]
    ParamNotFound { name: String, hint: Option<String> },

    #[error("unsupported pattern shape `{0}`")]
    UnsupportedPattern(String),

    #[error("enclosing function is not part of the loaded program")]
    UnknownFunction,
}
