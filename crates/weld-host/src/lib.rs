//! The incremental file-snapshot cache and language-service host adapter.
//!
//! [`FileCache`] is the mtime-gated content store backing everything else in
//! the workspace. [`LanguageHost`] wraps it with the bookkeeping a
//! TypeScript-compatible language service needs (tracked file set, compiler
//! options, module resolution, path-alias rewriting). [`LanguageService`] is
//! the trait contract for that external language service itself.

pub mod alias;
pub mod file_cache;
pub mod language_host;
pub mod language_service;
pub mod resolve;

pub use file_cache::{FileCache, FileSnapshot};
pub use language_host::{CompilerOptions, LanguageHost};
pub use language_service::{EmitOutput, LanguageService, OutputFile, PassthroughLanguageService};
