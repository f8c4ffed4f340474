//! The adapter exposing the tracked file set, snapshots, versions, module
//! resolution, and path-alias rewriting to the language service.

use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::debug;

use crate::alias::{build_alias_regex, resolve_aliases as rewrite_aliases};
use crate::file_cache::{FileCache, FileSnapshot};
use crate::resolve::resolve_relative_specifier;

/// The subset of `tsconfig.json`'s `compilerOptions` this host cares about.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompilerOptions {
    #[serde(default)]
    pub paths: FxHashMap<String, Vec<String>>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub declaration: bool,
    #[serde(default)]
    pub out_dir: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
}

pub struct LanguageHost {
    file_cache: FileCache,
    tracked_set: FxHashSet<PathBuf>,
    compiler_options: CompilerOptions,
    alias_regex: Option<Regex>,
    resolution_cache: FxHashMap<(String, PathBuf), Option<PathBuf>>,
    current_dir: PathBuf,
}

impl LanguageHost {
    #[must_use]
    pub fn new(compiler_options: CompilerOptions, current_dir: PathBuf) -> Self {
        let alias_regex = build_alias_regex(&compiler_options.paths);
        Self {
            file_cache: FileCache::new(),
            tracked_set: FxHashSet::default(),
            compiler_options,
            alias_regex,
            resolution_cache: FxHashMap::default(),
            current_dir,
        }
    }

    pub fn touch_file(&mut self, path: impl AsRef<Path>) -> FileSnapshot {
        let abs = self.file_cache.resolve(path.as_ref());
        self.tracked_set.insert(abs.clone());
        self.file_cache.touch(abs)
    }

    pub fn touch_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.touch_file(path);
        }
    }

    /// Replace compiler options; regenerates the alias regex and clears the
    /// resolution cache (a stale cache keyed by the old `paths` would
    /// silently miss newly-aliased specifiers).
    pub fn set_options(&mut self, options: CompilerOptions) {
        self.alias_regex = build_alias_regex(&options.paths);
        self.resolution_cache.clear();
        self.compiler_options = options;
    }

    #[must_use]
    pub fn compiler_options(&self) -> &CompilerOptions {
        &self.compiler_options
    }

    #[must_use]
    pub fn has_script_snapshot(&self, path: &Path) -> bool {
        self.tracked_set.contains(path)
    }

    #[must_use]
    pub fn script_file_names(&self) -> Vec<PathBuf> {
        self.tracked_set.iter().cloned().collect()
    }

    #[must_use]
    pub fn script_version(&self, path: &Path) -> u32 {
        self.file_cache.get_snapshot(path).map_or(0, |s| s.version)
    }

    #[must_use]
    pub fn script_snapshot(&self, path: &Path) -> Option<FileSnapshot> {
        self.file_cache.get_snapshot(path)
    }

    pub fn file_cache_mut(&mut self) -> &mut FileCache {
        &mut self.file_cache
    }

    #[must_use]
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Resolve a module specifier relative to `containing_file`, memoized
    /// per `(specifier, containing_file)` pair.
    pub fn resolve_module_file_name(&mut self, specifier: &str, containing_file: &Path) -> Option<PathBuf> {
        let key = (specifier.to_string(), containing_file.to_path_buf());
        if let Some(cached) = self.resolution_cache.get(&key) {
            return cached.clone();
        }
        let resolved = resolve_relative_specifier(specifier, containing_file);
        debug!(specifier, from = %containing_file.display(), resolved = ?resolved, "resolve_module_file_name");
        self.resolution_cache.insert(key, resolved.clone());
        resolved
    }

    /// Rewrite any alias-matching specifier in `text` to a relative path
    /// targeting its resolved file, substituting `extension_override` for
    /// the original extension when given. Unresolvable specifiers are
    /// preserved unchanged.
    pub fn resolve_aliases(&mut self, text: &str, from_file: &Path, extension_override: Option<&str>) -> String {
        let Some(regex) = self.alias_regex.clone() else {
            return text.to_string();
        };
        let base_url = self.compiler_options.base_url.clone();
        let current_dir = self.current_dir.clone();
        let from_dir = from_file.parent().map(Path::to_path_buf).unwrap_or_default();
        rewrite_aliases(text, &regex, extension_override, |spec| {
            let alias_target = self.alias_target(spec)?;
            let abs_target = base_url
                .as_ref()
                .map(|b| current_dir.join(b).join(&alias_target))
                .unwrap_or_else(|| current_dir.join(&alias_target));
            Some(relative_specifier(&from_dir, &abs_target))
        })
    }

    /// Substitute a matched alias prefix (e.g. `@app/*`) for its mapped
    /// target prefix (e.g. `./src/*`), applied to one concrete specifier.
    fn alias_target(&self, specifier: &str) -> Option<String> {
        for (alias, targets) in &self.compiler_options.paths {
            let alias_prefix = alias.trim_end_matches("/*");
            if specifier.starts_with(alias_prefix) {
                let suffix = &specifier[alias_prefix.len()..];
                let suffix = suffix.strip_prefix('/').unwrap_or(suffix);
                if let Some(target) = targets.first() {
                    let target_prefix = target.trim_end_matches("/*");
                    return Some(if suffix.is_empty() {
                        target_prefix.to_string()
                    } else {
                        format!("{target_prefix}/{suffix}")
                    });
                }
            }
        }
        None
    }
}

fn relative_specifier(from_dir: &Path, target: &Path) -> String {
    let mut from_components: Vec<_> = from_dir.components().collect();
    let mut target_components: Vec<_> = target.components().collect();

    let mut common = 0;
    while common < from_components.len()
        && common < target_components.len()
        && from_components[common] == target_components[common]
    {
        common += 1;
    }
    from_components.drain(..common);
    target_components.drain(..common);

    let mut rel = String::new();
    for _ in &from_components {
        rel.push_str("../");
    }
    if rel.is_empty() {
        rel.push_str("./");
    }
    let tail: Vec<String> = target_components.iter().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    rel.push_str(&tail.join("/"));
    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_aliases_rewrites_to_relative_path() {
        let mut opts = CompilerOptions::default();
        opts.paths.insert("@app/*".into(), vec!["src/*".into()]);
        opts.base_url = Some(".".into());
        let mut host = LanguageHost::new(opts, PathBuf::from("/proj"));

        let text = "import { a } from \"@app/utils\";\n";
        let out = host.resolve_aliases(text, Path::new("/proj/src/nested/file.ts"), Some(".d.ts"));
        assert!(out.contains("from \"../utils.d.ts\""), "got: {out}");
    }

    #[test]
    fn resolve_module_file_name_is_memoized() {
        let mut host = LanguageHost::new(CompilerOptions::default(), PathBuf::from("/proj"));
        let containing = Path::new("/proj/src/a.ts");
        let first = host.resolve_module_file_name("./b", containing);
        let second = host.resolve_module_file_name("./b", containing);
        assert_eq!(first, second);
    }
}
