// Purpose: Define the crate's module surface: Go frontend, program model, and the type switch expander.
// Inputs/Outputs: Exposes the pipeline for the binary and integration tests.
// Invariants: The library never installs a logger; only the CLI does.

pub mod callgraph;
pub mod cli;
pub mod config;
pub mod error;
pub mod expand;
pub mod frontend;
pub mod infer;
pub mod pipeline;
pub mod sema;
pub mod template;
pub mod unify;

pub use error::{GenError, SkipReason};
pub use pipeline::{Gen, Options};
