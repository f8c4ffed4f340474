//! The library-level error enum.
//!
//! Fatal errors (config, build) bubble out as `Err`; everything else the
//! spec calls non-fatal is represented as a [`crate::Diagnostic`] instead and
//! never appears here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeldError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("build failed: {0}")]
    Build(String),

    #[error("macro error in {file}: {message}")]
    Macro { file: PathBuf, message: String },

    #[error("inline evaluation error in {file}: {message}")]
    InlineEval { file: PathBuf, message: String },

    #[error("cannot resolve '{specifier}' from {from}")]
    Resolution { specifier: String, from: PathBuf },
}
