//! `GraphModel::scan` — per-file dependency/import/export analysis over a
//! source file's emitted declaration text (SPEC_FULL.md §4.3).

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use swc_core::common::Spanned;
use swc_core::ecma::ast::{
    Decl, ExportSpecifier, ImportSpecifier, ModuleDecl, ModuleExportName, ModuleItem,
};
use tracing::debug;

use weld_host::LanguageHost;
use weld_host::language_service::LanguageService;

use crate::node::GraphNode;
use crate::parse::{ParsedModule, parse_typescript};

/// Holds the independent `GraphNode` cache (separate from the `FileCache`
/// the host owns).
#[derive(Default)]
pub struct GraphModel {
    cache: FxHashMap<PathBuf, GraphNode>,
}

impl GraphModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `source` and return its `GraphNode`, reusing the cached node if
    /// the file's snapshot version hasn't changed.
    pub fn scan(&mut self, source: &Path, language_service: &dyn LanguageService, host: &mut LanguageHost) -> GraphNode {
        let version = host.script_version(source);
        if let Some(cached) = self.cache.get(source) {
            if cached.version == version {
                return cached.clone();
            }
        }

        let node = self.scan_uncached(source, version, language_service, host);
        self.cache.insert(source.to_path_buf(), node.clone());
        node
    }

    fn scan_uncached(&mut self, source: &Path, version: u32, language_service: &dyn LanguageService, host: &mut LanguageHost) -> GraphNode {
        let mut node = GraphNode::new(source.to_path_buf(), version);

        if !language_service.source_file_exists(source) {
            debug!(path = %source.display(), "scan: source file missing, empty node");
            return node;
        }

        let emit = language_service.get_emit_output(source, true, host);
        let Some(output) = emit.output_files.into_iter().next() else {
            debug!(path = %source.display(), "scan: emit produced no output, empty node");
            return node;
        };

        let parsed = match parse_typescript(&output.text, &source.to_string_lossy(), true) {
            Ok(p) => p,
            Err(err) => {
                debug!(path = %source.display(), %err, "scan: parse failed, treating as opaque text");
                node.cleaned_text = output.text;
                return node;
            }
        };

        let mut kept_spans: Vec<(usize, usize)> = Vec::new();
        let mut default_import_aliases: Vec<String> = Vec::new();
        let mut renamed_aliases: FxHashMap<String, String> = FxHashMap::default();

        for item in &parsed.module.body {
            match item {
                ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                    self.handle_import(import, source, host, &mut node, &mut default_import_aliases, &mut renamed_aliases);
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export_all)) => {
                    let specifier = export_all.src.value.to_string();
                    if let Some(target) = host.resolve_module_file_name(&specifier, source) {
                        node.internal_deps.insert(target.clone());
                        node.internal_exports.star.push(target);
                    } else {
                        node.external_exports.star.push(specifier);
                    }
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => {
                    self.handle_export_named(named, source, host, &mut node);
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export_decl)) => {
                    if let Some(names) = exported_decl_names(&export_decl.decl) {
                        node.internal_exports.exports.extend(names);
                    }
                    // Export-modifier statements are kept, with the `export`
                    // keyword stripped from the slice we retain.
                    let range = parsed.span_range(export_decl.span());
                    let text = parsed.span_text(export_decl.span());
                    let stripped_start = strip_leading_export(text);
                    kept_spans.push((range.start + stripped_start, range.end));
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(d)) => {
                    node.internal_exports.exports.push("default".to_string());
                    let range = parsed.span_range(d.span());
                    kept_spans.push((range.start, range.end));
                }
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(d)) => {
                    node.internal_exports.exports.push("default".to_string());
                    let range = parsed.span_range(d.span());
                    kept_spans.push((range.start, range.end));
                }
                ModuleItem::Stmt(stmt) => {
                    let range = parsed.span_range(stmt_span(stmt));
                    kept_spans.push(range);
                }
                _ => {}
            }
        }

        node.cleaned_text = assemble_cleaned_text(&parsed, &kept_spans, &default_import_aliases, &renamed_aliases);
        node
    }

    fn handle_import(
        &self,
        import: &swc_core::ecma::ast::ImportDecl,
        source: &Path,
        host: &mut LanguageHost,
        node: &mut GraphNode,
        default_import_aliases: &mut Vec<String>,
        renamed_aliases: &mut FxHashMap<String, String>,
    ) {
        let specifier = import.src.value.to_string();
        let internal_target = host.resolve_module_file_name(&specifier, source);

        if import.specifiers.is_empty() {
            // Side-effect import: `import './mod'`.
            if let Some(target) = &internal_target {
                node.internal_deps.insert(target.clone());
            } else {
                node.external_imports.namespace.insert(String::new(), specifier);
            }
            return;
        }

        if let Some(target) = &internal_target {
            node.internal_deps.insert(target.clone());
        }

        for spec in &import.specifiers {
            match spec {
                ImportSpecifier::Default(d) => {
                    let local = d.local.sym.to_string();
                    if internal_target.is_none() {
                        node.external_imports.default.insert(specifier.clone(), local.clone());
                    }
                    default_import_aliases.push(local);
                }
                ImportSpecifier::Namespace(ns) => {
                    let local = ns.local.sym.to_string();
                    if internal_target.is_none() {
                        node.external_imports.namespace.insert(local, specifier.clone());
                    }
                }
                ImportSpecifier::Named(named) => {
                    let local = named.local.sym.to_string();
                    let imported = named
                        .imported
                        .as_ref()
                        .map(module_export_name_to_string)
                        .unwrap_or_else(|| local.clone());
                    if imported != local {
                        renamed_aliases.insert(local.clone(), imported.clone());
                    }
                    if internal_target.is_none() {
                        node.external_imports
                            .named
                            .entry(specifier.clone())
                            .or_default()
                            .push(imported);
                    }
                }
            }
        }
    }

    fn handle_export_named(
        &self,
        named: &swc_core::ecma::ast::NamedExport,
        source: &Path,
        host: &mut LanguageHost,
        node: &mut GraphNode,
    ) {
        let Some(src) = &named.src else {
            // `export { a, b as c }` without a module specifier re-exports
            // already-in-scope local bindings; treated as direct exports.
            for spec in &named.specifiers {
                if let ExportSpecifier::Named(n) = spec {
                    let exported = n
                        .exported
                        .as_ref()
                        .map(module_export_name_to_string)
                        .unwrap_or_else(|| module_export_name_to_string(&n.orig));
                    node.internal_exports.exports.push(exported);
                }
            }
            return;
        };

        let specifier = src.value.to_string();
        let internal_target = host.resolve_module_file_name(&specifier, source);

        for spec in &named.specifiers {
            match spec {
                ExportSpecifier::Named(n) => {
                    let exported = n
                        .exported
                        .as_ref()
                        .map(module_export_name_to_string)
                        .unwrap_or_else(|| module_export_name_to_string(&n.orig));
                    if let Some(target) = &internal_target {
                        node.internal_deps.insert(target.clone());
                        node.internal_exports.exports.push(exported);
                    } else {
                        node.external_exports.exports.entry(specifier.clone()).or_default().push(exported);
                    }
                }
                ExportSpecifier::Namespace(n) => {
                    let name = module_export_name_to_string(&n.name);
                    if let Some(target) = &internal_target {
                        node.internal_deps.insert(target.clone());
                        node.internal_exports.namespace.insert(name, target.clone());
                    } else {
                        node.external_exports.namespace.insert(name, specifier.clone());
                    }
                }
                ExportSpecifier::Default(_) => {}
            }
        }
    }
}

fn module_export_name_to_string(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

fn exported_decl_names(decl: &Decl) -> Option<Vec<String>> {
    use swc_core::ecma::ast::Pat;
    match decl {
        Decl::Class(c) => Some(vec![c.ident.sym.to_string()]),
        Decl::Fn(f) => Some(vec![f.ident.sym.to_string()]),
        Decl::TsInterface(i) => Some(vec![i.id.sym.to_string()]),
        Decl::TsTypeAlias(t) => Some(vec![t.id.sym.to_string()]),
        Decl::TsEnum(e) => Some(vec![e.id.sym.to_string()]),
        Decl::TsModule(m) => {
            use swc_core::ecma::ast::TsModuleName;
            match &m.id {
                TsModuleName::Ident(i) => Some(vec![i.sym.to_string()]),
                TsModuleName::Str(s) => Some(vec![s.value.to_string()]),
            }
        }
        Decl::Var(v) => Some(
            v.decls
                .iter()
                .filter_map(|d| match &d.name {
                    Pat::Ident(ident) => Some(ident.id.sym.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn strip_leading_export(text: &str) -> usize {
    let trimmed = text.trim_start();
    let leading_ws = text.len() - trimmed.len();
    if let Some(rest) = trimmed.strip_prefix("export") {
        let rest_trimmed = rest.trim_start();
        leading_ws + (rest.len() - rest_trimmed.len()) + "export".len()
    } else {
        0
    }
}

fn stmt_span(stmt: &swc_core::ecma::ast::Stmt) -> swc_core::common::Span {
    use swc_core::common::Spanned;
    stmt.span()
}

fn assemble_cleaned_text(
    parsed: &ParsedModule,
    kept_spans: &[(usize, usize)],
    default_import_aliases: &[String],
    renamed_aliases: &FxHashMap<String, String>,
) -> String {
    let mut sorted = kept_spans.to_vec();
    sorted.sort_by_key(|(start, _)| *start);

    let mut out = String::new();
    for (start, end) in sorted {
        if start >= end || end > parsed.source.len() {
            continue;
        }
        let mut slice = parsed.source[start..end].to_string();
        for alias in default_import_aliases {
            let needle = format!("{alias}.");
            if slice.contains(&needle) {
                slice = replace_word_prefix(&slice, alias);
            }
        }
        for (local, canonical) in renamed_aliases {
            slice = replace_word(&slice, local, canonical);
        }
        out.push_str(slice.trim_end());
        out.push_str(";\n");
    }
    out
}

/// Replace `alias.` immediately before an identifier with nothing (e.g.
/// `foo.bar` -> `bar`), only at word boundaries.
fn replace_word_prefix(text: &str, alias: &str) -> String {
    let needle = format!("{alias}.");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(&needle) {
        let boundary_ok = idx == 0
            || !rest[..idx]
                .chars()
                .next_back()
                .map(|c| c.is_alphanumeric() || c == '_' || c == '$')
                .unwrap_or(false);
        out.push_str(&rest[..idx]);
        if boundary_ok {
            // drop the "alias." prefix
        } else {
            out.push_str(&needle);
        }
        rest = &rest[idx + needle.len()..];
    }
    out.push_str(rest);
    out
}

fn replace_word(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(from) {
        let before_ok = idx == 0
            || !rest[..idx]
                .chars()
                .next_back()
                .map(|c| c.is_alphanumeric() || c == '_' || c == '$')
                .unwrap_or(false);
        let after_idx = idx + from.len();
        let after_ok = after_idx >= rest.len()
            || !rest[after_idx..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_' || c == '$')
                .unwrap_or(false);
        out.push_str(&rest[..idx]);
        if before_ok && after_ok {
            out.push_str(to);
        } else {
            out.push_str(from);
        }
        rest = &rest[after_idx..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use weld_host::language_host::CompilerOptions;
    use weld_host::language_service::PassthroughLanguageService;

    #[test]
    fn scan_drops_import_export_keywords_from_cleaned_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "import { x } from './b';\nexport const y = 1;\n").unwrap();

        let mut host = LanguageHost::new(CompilerOptions::default(), dir.path().to_path_buf());
        host.touch_file(&file);
        let service = PassthroughLanguageService;
        let mut model = GraphModel::new();
        let node = model.scan(&file, &service, &mut host);

        assert!(!node.cleaned_text.contains("import"));
        assert!(!node.cleaned_text.contains("export"));
        assert!(node.internal_exports.exports.contains(&"y".to_string()));
    }

    #[test]
    fn scan_is_cached_by_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "export const y = 1;\n").unwrap();

        let mut host = LanguageHost::new(CompilerOptions::default(), dir.path().to_path_buf());
        host.touch_file(&file);
        let service = PassthroughLanguageService;
        let mut model = GraphModel::new();
        let first = model.scan(&file, &service, &mut host);
        let second = model.scan(&file, &service, &mut host);
        assert_eq!(first.version, second.version);
        assert_eq!(first.cleaned_text, second.cleaned_text);
    }
}
