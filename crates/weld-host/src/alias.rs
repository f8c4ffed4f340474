//! Path-alias regex construction and import/export specifier rewriting.

use regex::Regex;
use rustc_hash::FxHashMap;

/// Build the regex matching an import/export statement whose quoted
/// specifier starts with any of the configured `paths` aliases.
///
/// Trailing `/*` is stripped from each alias before escaping; the resulting
/// alternation matches an optional `type ` keyword, an optional `… from `
/// clause, and a required quoted specifier.
#[must_use]
pub fn build_alias_regex(paths: &FxHashMap<String, Vec<String>>) -> Option<Regex> {
    if paths.is_empty() {
        return None;
    }
    let mut alternatives: Vec<String> = paths
        .keys()
        .map(|alias| regex::escape(alias.trim_end_matches("/*")))
        .collect();
    alternatives.sort();
    alternatives.dedup();
    let alias_alt = alternatives.join("|");
    let pattern = format!(
        r#"(?P<stmt>(?:import|export)\s+(?:type\s+)?(?:[^'"]*?\s+from\s+)?)(?P<quote>['"])(?P<spec>(?:{alias_alt})[^'"]*)(?P=quote)"#
    );
    Regex::new(&pattern).ok()
}

/// Rewrite any alias-matching specifier in `text` to a relative path
/// targeting `resolved`, optionally substituting the extension. Specifiers
/// that don't match any configured alias are preserved unchanged.
///
/// `resolver` maps a matched specifier to its resolved relative replacement
/// (already relative to the importing file); when it returns `None` for a
/// match, the original specifier is preserved — alias rewriting never
/// fabricates a resolution the caller can't vouch for.
pub fn resolve_aliases(
    text: &str,
    alias_regex: &Regex,
    extension_override: Option<&str>,
    mut resolver: impl FnMut(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in alias_regex.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let spec = caps.name("spec").unwrap().as_str();
        let Some(mut replacement) = resolver(spec) else {
            continue;
        };
        if let Some(ext) = extension_override {
            strip_known_extension(&mut replacement);
            replacement.push_str(ext);
        }
        out.push_str(&text[last_end..whole.start()]);
        out.push_str(&caps["stmt"]);
        let quote = &caps["quote"];
        out.push_str(quote);
        out.push_str(&replacement);
        out.push_str(quote);
        last_end = whole.end();
    }
    out.push_str(&text[last_end..]);
    out
}

fn strip_known_extension(s: &mut String) {
    for ext in [".d.ts", ".tsx", ".ts", ".jsx", ".js"] {
        if let Some(stripped) = s.strip_suffix(ext) {
            *s = stripped.to_string();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> FxHashMap<String, Vec<String>> {
        let mut m = FxHashMap::default();
        m.insert("@app/*".to_string(), vec!["./src/*".to_string()]);
        m
    }

    #[test]
    fn rewrites_matching_alias_and_leaves_others() {
        let regex = build_alias_regex(&paths()).unwrap();
        let text = "import { x } from \"@app/utils\";\nimport { y } from \"lodash\";\n";
        let out = resolve_aliases(text, &regex, Some(".d.ts"), |spec| {
            if spec.starts_with("@app/") {
                Some(format!("./{}", spec.trim_start_matches("@app/")))
            } else {
                None
            }
        });
        assert!(out.contains("from \"./utils.d.ts\""));
        assert!(out.contains("from \"lodash\""));
    }

    #[test]
    fn idempotent_rewriting() {
        let regex = build_alias_regex(&paths()).unwrap();
        let text = "import { x } from \"@app/utils\";\n";
        let rewrite = |t: &str| {
            resolve_aliases(t, &regex, Some(".d.ts"), |spec| {
                spec.starts_with("@app/")
                    .then(|| format!("./{}", spec.trim_start_matches("@app/")))
            })
        };
        let once = rewrite(text);
        // Second pass: the alias regex no longer matches the relative
        // specifier produced by the first pass, so it's preserved verbatim.
        let regex2 = build_alias_regex(&paths()).unwrap();
        let twice = resolve_aliases(&once, &regex2, Some(".d.ts"), |spec| {
            spec.starts_with("@app/")
                .then(|| format!("./{}", spec.trim_start_matches("@app/")))
        });
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_paths_yields_no_regex() {
        assert!(build_alias_regex(&FxHashMap::default()).is_none());
    }
}
