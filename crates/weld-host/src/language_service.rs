//! The `LanguageService` contract consumed by `weld-graph`'s `GraphModel`,
//! `Emitter`, and `Bundler` (§6 of SPEC_FULL.md).
//!
//! This crate is an external collaborator per the spec: the real
//! TypeScript-compatible checker that would implement it is out of scope.
//! [`PassthroughLanguageService`] is the minimal concrete implementation
//! used everywhere in this workspace — it treats already-tracked source as
//! its own declaration text, which is sufficient to drive the declaration
//! graph/bundler/emitter since they only need statement-level import/export
//! shape, not real type inference.

use std::path::{Path, PathBuf};

use weld_core::Diagnostic;

use crate::language_host::LanguageHost;

/// One file produced by an emit.
#[derive(Clone, Debug)]
pub struct OutputFile {
    pub name: PathBuf,
    pub text: String,
}

/// Result of `get_emit_output`.
#[derive(Clone, Debug, Default)]
pub struct EmitOutput {
    pub emit_skipped: bool,
    pub output_files: Vec<OutputFile>,
}

pub trait LanguageService: Send + Sync {
    fn source_file_exists(&self, path: &Path) -> bool;
    fn is_source_file_from_external_library(&self, path: &Path) -> bool;
    fn get_emit_output(&self, path: &Path, emit_only_dts_files: bool, host: &LanguageHost) -> EmitOutput;
    fn get_semantic_diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
    fn get_syntactic_diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
    fn get_suggestion_diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
    fn dispose(&self);
}

/// Treats tracked source text as already being valid declaration text. Real
/// type-stripping is the job of the out-of-scope language service; this
/// implementation exists so `weld-graph` has something to call in tests and
/// in the default build path.
#[derive(Default)]
pub struct PassthroughLanguageService;

impl LanguageService for PassthroughLanguageService {
    fn source_file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_source_file_from_external_library(&self, path: &Path) -> bool {
        path.components().any(|c| c.as_os_str() == "node_modules")
    }

    fn get_emit_output(&self, path: &Path, _emit_only_dts_files: bool, host: &LanguageHost) -> EmitOutput {
        let Some(snapshot) = host.script_snapshot(path) else {
            return EmitOutput { emit_skipped: true, output_files: Vec::new() };
        };
        let Some(text) = snapshot.content else {
            return EmitOutput { emit_skipped: true, output_files: Vec::new() };
        };
        let out_name = with_dts_extension(path);
        EmitOutput {
            emit_skipped: false,
            output_files: vec![OutputFile { name: out_name, text }],
        }
    }

    fn get_semantic_diagnostics(&self, _path: &Path) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn get_syntactic_diagnostics(&self, _path: &Path) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn get_suggestion_diagnostics(&self, _path: &Path) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn dispose(&self) {}
}

fn with_dts_extension(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{stem}.d.ts"))
}
