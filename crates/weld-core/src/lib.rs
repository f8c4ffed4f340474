//! Shared types for the weld build orchestrator.
//!
//! Every other crate in the workspace depends on this one for diagnostics,
//! source positions, and the top-level error enum. Nothing here depends on
//! any notion of a file cache, a bundler, or a language service.

pub mod diagnostics;
pub mod error;
pub mod position;

pub use diagnostics::{Diagnostic, DiagnosticCategory};
pub use error::WeldError;
pub use position::{Position, Range};
