//! Declaration bundling: DFS over internal deps from entry points, flatten
//! namespaces, dedupe external imports, assemble a single artifact
//! (SPEC_FULL.md §4.5).

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use weld_host::LanguageHost;
use weld_host::language_service::LanguageService;

use crate::model::GraphModel;
use crate::node::GraphNode;

const BUNDLE_HEADER: &str = "// Generated by weld — do not edit directly.\n";

pub struct Bundler<'a> {
    language_service: &'a dyn LanguageService,
}

impl<'a> Bundler<'a> {
    #[must_use]
    pub fn new(language_service: &'a dyn LanguageService) -> Self {
        Self { language_service }
    }

    /// Bundle every entry point in `entry_points` (output name -> source
    /// path) into `{out_dir}/{output_name}.d.ts`.
    pub fn emit(
        &self,
        entry_points: &FxHashMap<String, PathBuf>,
        out_dir: &Path,
        graph: &mut GraphModel,
        host: &mut LanguageHost,
    ) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();
        for (output_name, entry) in entry_points {
            let artifact = self.bundle_for(entry, graph, host);
            let mut path = out_dir.join(output_name);
            if path.extension().is_none() {
                path.set_extension("d.ts");
            } else {
                let file_name = format!("{output_name}.d.ts");
                path = out_dir.join(file_name);
            }
            std::fs::write(&path, artifact)?;
            written.push(path);
        }
        Ok(written)
    }

    /// DFS over `entry`'s internal dependency graph, producing one bundled
    /// `.d.ts` artifact.
    #[must_use]
    pub fn bundle_for(&self, entry: &Path, graph: &mut GraphModel, host: &mut LanguageHost) -> String {
        let entry_node = graph.scan(entry, self.language_service, host);

        let mut visited: FxHashSet<PathBuf> = FxHashSet::default();
        let mut export_list: Vec<GraphNode> = vec![entry_node.clone()];
        let mut dependency_list: Vec<GraphNode> = vec![entry_node.clone()];
        let mut queue: Vec<PathBuf> = entry_node.internal_deps.iter().cloned().collect();
        let mut star_export_modules: FxHashSet<PathBuf> = entry_node.internal_exports.star.iter().cloned().collect();

        while let Some(path) = queue.pop() {
            if visited.contains(&path) {
                continue;
            }
            visited.insert(path.clone());
            let node = graph.scan(&path, self.language_service, host);
            dependency_list.push(node.clone());

            if star_export_modules.contains(&path) {
                export_list.push(node.clone());
                star_export_modules.extend(node.internal_exports.star.iter().cloned());
            }

            for dep in &node.internal_deps {
                if !visited.contains(dep) {
                    queue.push(dep.clone());
                }
            }
        }

        let mut body = String::new();
        for node in dependency_list.iter().skip(1) {
            body.push_str(&node.cleaned_text);
        }
        body.push_str(&entry_node.cleaned_text);

        let (import_statements, supporting, export_names, external_reexports) =
            self.assemble_artifact(&dependency_list, &export_list, host.current_dir());

        let mut out = String::new();
        out.push_str(BUNDLE_HEADER);
        out.push_str(&import_statements);
        out.push('\n');
        out.push_str(&supporting);
        out.push('\n');
        out.push_str(&body);
        if !export_names.is_empty() {
            let mut sorted: Vec<_> = export_names.into_iter().collect();
            sorted.sort();
            sorted.dedup();
            out.push_str(&format!("export {{ {} }};\n", sorted.join(", ")));
        }
        out.push_str(&external_reexports);
        out
    }

    fn assemble_artifact(
        &self,
        dependency_list: &[GraphNode],
        export_list: &[GraphNode],
        _root_dir: &Path,
    ) -> (String, String, FxHashSet<String>, String) {
        // Aggregate external imports across all dependencies: at most one
        // default name per module (first wins), a deduped+sorted set of
        // named specifiers, a map of namespace aliases.
        let mut default_by_module: FxHashMap<String, String> = FxHashMap::default();
        let mut named_by_module: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        let mut namespace_by_alias: FxHashMap<String, String> = FxHashMap::default();

        for node in dependency_list {
            for (module, local) in &node.external_imports.default {
                default_by_module.entry(module.clone()).or_insert_with(|| local.clone());
            }
            for (module, names) in &node.external_imports.named {
                named_by_module.entry(module.clone()).or_default().extend(names.iter().cloned());
            }
            for (alias, module) in &node.external_imports.namespace {
                if alias.is_empty() {
                    continue;
                }
                namespace_by_alias.entry(alias.clone()).or_insert_with(|| module.clone());
            }
        }

        let mut modules: FxHashSet<String> = default_by_module.keys().cloned().collect();
        modules.extend(named_by_module.keys().cloned());
        let mut import_statements = String::new();
        let mut sorted_modules: Vec<_> = modules.into_iter().collect();
        sorted_modules.sort();
        for module in sorted_modules {
            let default = default_by_module.get(&module);
            let named = named_by_module.get(&module);
            let mut clause_parts = Vec::new();
            if let Some(default_name) = default {
                clause_parts.push(default_name.clone());
            }
            if let Some(names) = named {
                let mut sorted_names: Vec<_> = names.iter().cloned().collect();
                sorted_names.sort();
                sorted_names.dedup();
                if !sorted_names.is_empty() {
                    clause_parts.push(format!("{{ {} }}", sorted_names.join(", ")));
                }
            }
            if !clause_parts.is_empty() {
                import_statements.push_str(&format!("import {} from \"{module}\";\n", clause_parts.join(", ")));
            }
        }
        for (alias, module) in &namespace_by_alias {
            import_statements.push_str(&format!("import * as {alias} from \"{module}\";\n"));
        }

        // Namespace flattening is recursive with its own visited set to
        // break cycles defensively.
        let mut supporting = String::new();
        let mut export_names: FxHashSet<String> = FxHashSet::default();
        let mut flatten_visited: FxHashSet<PathBuf> = FxHashSet::default();

        for node in export_list {
            export_names.extend(node.internal_exports.exports.iter().cloned());
            for (name, target_path) in &node.internal_exports.namespace {
                let members = flatten_namespace(target_path, dependency_list, &mut flatten_visited);
                supporting.push_str(&format!(
                    "const {name} = {{ {} }};\n",
                    members.join(", ")
                ));
                export_names.insert(name.clone());
            }
        }

        let mut external_reexports = String::new();
        for node in export_list {
            for module in &node.external_exports.star {
                external_reexports.push_str(&format!("export * from \"{module}\";\n"));
            }
            for (module, names) in &node.external_exports.exports {
                let mut sorted_names: Vec<_> = names.clone();
                sorted_names.sort();
                sorted_names.dedup();
                external_reexports.push_str(&format!(
                    "export {{ {} }} from \"{module}\";\n",
                    sorted_names.join(", ")
                ));
            }
            for (name, module) in &node.external_exports.namespace {
                external_reexports.push_str(&format!("export * as {name} from \"{module}\";\n"));
            }
        }

        (import_statements, supporting, export_names, external_reexports)
    }
}

/// Recursively collect the exported member names reachable through a
/// namespace re-export target, breaking cycles with `visited`.
fn flatten_namespace(target: &Path, dependency_list: &[GraphNode], visited: &mut FxHashSet<PathBuf>) -> Vec<String> {
    if visited.contains(target) {
        return Vec::new();
    }
    visited.insert(target.to_path_buf());

    let Some(target_node) = dependency_list.iter().find(|n| n.path == target) else {
        return Vec::new();
    };

    let mut members: Vec<String> = target_node.internal_exports.exports.clone();
    for nested_target in target_node.internal_exports.namespace.values() {
        members.extend(flatten_namespace(nested_target, dependency_list, visited));
    }
    members.sort();
    members.dedup();
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use weld_host::language_host::CompilerOptions;
    use weld_host::language_service::PassthroughLanguageService;

    #[test]
    fn bundle_star_reexport_dedupes_and_drops_internal_imports() {
        let dir = tempfile::TempDir::new().unwrap();
        let utils = dir.path().join("utils.ts");
        std::fs::write(&utils, "export const a = 1;\nexport const b = 2;\n").unwrap();
        let index = dir.path().join("index.ts");
        std::fs::write(&index, "export * from './utils';\n").unwrap();

        let mut host = LanguageHost::new(CompilerOptions::default(), dir.path().to_path_buf());
        host.touch_file(&index);
        host.touch_file(&utils);

        let service = PassthroughLanguageService;
        let mut graph = GraphModel::new();
        let bundler = Bundler::new(&service);
        let artifact = bundler.bundle_for(&index, &mut graph, &mut host);

        assert!(artifact.contains("export { a, b };"));
        assert!(!artifact.contains("import"));
        // exactly one export statement
        assert_eq!(artifact.matches("export {").count(), 1);
    }
}
