//! `GraphNode` and its import/export data model (SPEC_FULL.md §3).

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

/// External imports/exports split by clause kind, matching the spec's
/// `named: map<module, list<specifier>>`, `default: map<module, localName>`,
/// `namespace: map<localName, module>` tripartition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalImports {
    pub named: FxHashMap<String, Vec<String>>,
    pub default: FxHashMap<String, String>,
    pub namespace: FxHashMap<String, String>,
}

/// Internal (same-project) export bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InternalExports {
    /// `export * from './mod'` targets.
    pub star: Vec<PathBuf>,
    /// Directly-exported names (`export const x`, `export class X`, ...).
    pub exports: Vec<String>,
    /// `export * as ns from './mod'` — exported name to source module.
    pub namespace: FxHashMap<String, PathBuf>,
}

/// External export bookkeeping — same tripartition as [`ExternalImports`]
/// but targeting modules outside the project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalExports {
    pub star: Vec<String>,
    pub exports: FxHashMap<String, Vec<String>>,
    pub namespace: FxHashMap<String, String>,
}

/// The result of scanning one source file's emitted declaration text.
#[derive(Clone, Debug, Default)]
pub struct GraphNode {
    pub path: PathBuf,
    /// The snapshot version this node was scanned at; a node is only valid
    /// for scans where the file's current snapshot version still matches.
    pub version: u32,
    /// Declaration text with all import/export statements removed and
    /// export modifiers stripped.
    pub cleaned_text: String,
    pub internal_deps: FxHashSet<PathBuf>,
    pub external_imports: ExternalImports,
    pub internal_exports: InternalExports,
    pub external_exports: ExternalExports,
}

impl GraphNode {
    #[must_use]
    pub fn new(path: PathBuf, version: u32) -> Self {
        Self { path, version, ..Default::default() }
    }
}
