//! Per-file declaration emission with alias resolution and output
//! deduplication across rebuilds (SPEC_FULL.md §4.4).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use weld_host::LanguageHost;
use weld_host::language_service::LanguageService;

/// Process-global, append-only map from output path to the source version
/// last emitted there. Global (not per-`Emitter`) so variants sharing a
/// language service don't redundantly re-emit each other's work.
static EMITTED_VERSIONS: Lazy<Mutex<FxHashMap<PathBuf, u32>>> = Lazy::new(|| Mutex::new(FxHashMap::default()));

pub struct Emitter<'a> {
    language_service: &'a dyn LanguageService,
}

impl<'a> Emitter<'a> {
    #[must_use]
    pub fn new(language_service: &'a dyn LanguageService) -> Self {
        Self { language_service }
    }

    /// Emit declarations for every tracked, non-declaration, non-external
    /// file known to the host, skipping files whose version already matches
    /// what's recorded for their computed output path.
    pub fn emit(&self, host: &mut LanguageHost, out_dir: Option<&Path>) -> std::io::Result<Vec<PathBuf>> {
        let resolved_out_dir = self.resolve_out_dir(host, out_dir);
        std::fs::create_dir_all(&resolved_out_dir)?;

        let mut written = Vec::new();
        for source in host.script_file_names() {
            if is_declaration_file(&source) || self.language_service.is_source_file_from_external_library(&source) {
                continue;
            }
            if !self.language_service.source_file_exists(&source) {
                trace!(path = %source.display(), "emit: source file missing, skip");
                continue;
            }

            let output_path = output_path_for(&source, host.current_dir(), &resolved_out_dir);
            let version = host.script_version(&source);

            {
                let guard = EMITTED_VERSIONS.lock().unwrap();
                if guard.get(&output_path) == Some(&version) {
                    trace!(path = %source.display(), "emit: version unchanged, skip");
                    continue;
                }
            }

            let emit = self.language_service.get_emit_output(&source, true, host);
            if emit.emit_skipped {
                warn!(path = %source.display(), "emit: emit skipped by language service");
                continue;
            }
            let Some(output) = emit.output_files.into_iter().next() else { continue };

            let rewritten = host.resolve_aliases(&output.text, &source, Some(".d.ts"));
            std::fs::write(&output_path, rewritten)?;
            written.push(output_path.clone());

            let mut guard = EMITTED_VERSIONS.lock().unwrap();
            guard.insert(output_path, version);
        }
        Ok(written)
    }

    fn resolve_out_dir(&self, host: &LanguageHost, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            return dir.to_path_buf();
        }
        if let Some(dir) = &host.compiler_options().out_dir {
            return host.current_dir().join(dir);
        }
        host.current_dir().join("dist")
    }
}

fn is_declaration_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".d.ts")
}

fn output_path_for(source: &Path, root_dir: &Path, out_dir: &Path) -> PathBuf {
    let rel = source.strip_prefix(root_dir).unwrap_or(source);
    let mut out = out_dir.join(rel);
    out.set_extension("d.ts");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use weld_host::language_host::CompilerOptions;
    use weld_host::language_service::PassthroughLanguageService;

    #[test]
    fn emit_writes_dts_for_tracked_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("a.ts");
        std::fs::write(&src, "export const a = 1;\n").unwrap();

        let mut host = LanguageHost::new(CompilerOptions::default(), dir.path().to_path_buf());
        host.touch_file(&src);

        let service = PassthroughLanguageService;
        let emitter = Emitter::new(&service);
        let out_dir = dir.path().join("dist");
        let written = emitter.emit(&mut host, Some(&out_dir)).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].exists());
    }

    #[test]
    fn emit_skips_declaration_and_external_library_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let dts = dir.path().join("a.d.ts");
        std::fs::write(&dts, "export const a: number;\n").unwrap();
        let node_modules = dir.path().join("node_modules/pkg.ts");
        std::fs::create_dir_all(node_modules.parent().unwrap()).unwrap();
        std::fs::write(&node_modules, "export const p = 1;\n").unwrap();

        let mut host = LanguageHost::new(CompilerOptions::default(), dir.path().to_path_buf());
        host.touch_file(&dts);
        host.touch_file(&node_modules);

        let service = PassthroughLanguageService;
        let emitter = Emitter::new(&service);
        let out_dir = dir.path().join("dist");
        let written = emitter.emit(&mut host, Some(&out_dir)).unwrap();
        assert!(written.is_empty());
    }
}
