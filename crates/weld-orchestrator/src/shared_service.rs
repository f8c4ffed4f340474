//! `SharedLanguageServiceEntry` — a language service instance shared by
//! every variant whose tsconfig resolves to the same path, refcounted with
//! explicit acquire/release (SPEC_FULL.md §4.8, §5 "Shared-resource
//! policy").
//!
//! Explicit refcounting over `Arc`'s implicit drop-based counting because
//! disposal must be deterministic and observable — a variant must be able
//! to tell whether releasing its handle actually disposed the service (the
//! hot-reload scenario in §8 asserts on exactly this).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use weld_host::language_service::LanguageService;

struct Entry {
    service: Arc<dyn LanguageService>,
    refcount: usize,
}

/// Keyed by absolute tsconfig path.
#[derive(Default)]
pub struct SharedLanguageServiceRegistry {
    entries: DashMap<PathBuf, Entry>,
}

impl SharedLanguageServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the service for `tsconfig_path`, creating it via `factory`
    /// if this is the first acquirer, and bumping its refcount.
    pub fn acquire(&self, tsconfig_path: &Path, factory: impl FnOnce() -> Arc<dyn LanguageService>) -> Arc<dyn LanguageService> {
        let mut entry = self
            .entries
            .entry(tsconfig_path.to_path_buf())
            .or_insert_with(|| Entry { service: factory(), refcount: 0 });
        entry.refcount += 1;
        Arc::clone(&entry.service)
    }

    /// Release a handle previously obtained via [`Self::acquire`]. Disposes
    /// and removes the entry when the refcount reaches zero. Returns
    /// whether this call was the one that disposed the service.
    ///
    /// # Panics
    /// Panics if `tsconfig_path` has no tracked entry — calling this
    /// without a matching `acquire` is a programming error.
    pub fn release(&self, tsconfig_path: &Path) -> bool {
        let disposed = {
            let mut entry = self.entries.get_mut(tsconfig_path).expect("release() without a matching acquire()");
            entry.refcount = entry.refcount.saturating_sub(1);
            entry.refcount == 0
        };
        if disposed {
            if let Some((_, entry)) = self.entries.remove(tsconfig_path) {
                entry.service.dispose();
            }
        }
        disposed
    }

    #[must_use]
    pub fn refcount(&self, tsconfig_path: &Path) -> usize {
        self.entries.get(tsconfig_path).map(|e| e.refcount).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use weld_host::language_host::LanguageHost;
    use weld_host::language_service::{EmitOutput, OutputFile};

    struct DisposeTrackingService(Arc<AtomicBool>);

    impl LanguageService for DisposeTrackingService {
        fn source_file_exists(&self, _path: &Path) -> bool {
            true
        }
        fn is_source_file_from_external_library(&self, _path: &Path) -> bool {
            false
        }
        fn get_emit_output(&self, _path: &Path, _emit_only_dts_files: bool, _host: &LanguageHost) -> EmitOutput {
            EmitOutput { emit_skipped: true, output_files: Vec::<OutputFile>::new() }
        }
        fn get_semantic_diagnostics(&self, _path: &Path) -> Vec<weld_core::Diagnostic> {
            Vec::new()
        }
        fn get_syntactic_diagnostics(&self, _path: &Path) -> Vec<weld_core::Diagnostic> {
            Vec::new()
        }
        fn get_suggestion_diagnostics(&self, _path: &Path) -> Vec<weld_core::Diagnostic> {
            Vec::new()
        }
        fn dispose(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn refcount_reaches_zero_only_after_matching_releases() {
        let registry = SharedLanguageServiceRegistry::new();
        let disposed = Arc::new(AtomicBool::new(false));
        let tsconfig = PathBuf::from("a.json");

        let d = Arc::clone(&disposed);
        let _first = registry.acquire(&tsconfig, || Arc::new(DisposeTrackingService(d)));
        let _second = registry.acquire(&tsconfig, || unreachable!("factory must not run on the second acquire"));
        assert_eq!(registry.refcount(&tsconfig), 2);

        assert!(!registry.release(&tsconfig));
        assert!(!disposed.load(Ordering::SeqCst));
        assert!(registry.release(&tsconfig));
        assert!(disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn hot_reload_disposes_old_tsconfig_and_attaches_new() {
        let registry = SharedLanguageServiceRegistry::new();
        let a_disposed = Arc::new(AtomicBool::new(false));
        let b_disposed = Arc::new(AtomicBool::new(false));
        let a_path = PathBuf::from("a.json");
        let b_path = PathBuf::from("b.json");

        let a = Arc::clone(&a_disposed);
        let _service = registry.acquire(&a_path, || Arc::new(DisposeTrackingService(a)));
        assert!(registry.release(&a_path));
        assert!(a_disposed.load(Ordering::SeqCst));

        let b = Arc::clone(&b_disposed);
        let _service = registry.acquire(&b_path, || Arc::new(DisposeTrackingService(b)));
        assert_eq!(registry.refcount(&b_path), 1);
        assert!(!b_disposed.load(Ordering::SeqCst));
    }
}
