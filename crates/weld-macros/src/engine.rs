//! `MacroEngine`: ties call-site detection, `$$ifdef`/`$$ifndef` guard
//! evaluation, and `$$inline` sandboxed substitution into one textual
//! transform per file (SPEC_FULL.md §4.6).

use std::path::Path;

use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::{Decl, ModuleItem, Stmt};

use weld_core::Diagnostic;
use weld_graph::parse::{ParsedModule, parse_script};

use crate::call_site::{self, CallSiteContext, MacroCallSite, MacroKind};
use crate::inline::{self, InlineTranspiler, SwcInlineTranspiler};
use crate::state::{MacroState, Replacement};

pub struct MacroEngine {
    defines: FxHashMap<String, JsonValue>,
    transpiler: Box<dyn InlineTranspiler>,
}

impl MacroEngine {
    #[must_use]
    pub fn new(defines: FxHashMap<String, JsonValue>) -> Self {
        Self { defines, transpiler: Box::new(SwcInlineTranspiler) }
    }

    #[must_use]
    pub fn with_transpiler(defines: FxHashMap<String, JsonValue>, transpiler: Box<dyn InlineTranspiler>) -> Self {
        Self { defines, transpiler }
    }

    /// Run the analysis + transform phases for a single file (the spec's
    /// `onLoad` hook body). Disabled-macro tracking is scoped to this file:
    /// a name defined and disabled here only suppresses references within
    /// the same source text, matching how each call is independently
    /// transformed inside its own `onLoad` invocation.
    pub fn transform(&self, path: &Path, source: &str) -> (String, MacroState) {
        let mut state = MacroState::new();
        let path_display = path.display().to_string();

        let parsed = match parse_script(source, &path_display, false) {
            Ok(parsed) => parsed,
            Err(message) => {
                state.errors.push(Diagnostic::error(message).with_file(path.to_path_buf()));
                return (source.to_string(), state);
            }
        };

        let scan = call_site::scan(&parsed.module);
        if scan.call_sites.is_empty() {
            return (source.to_string(), state);
        }
        state.files_with_macros.insert(path.to_path_buf());

        for site in &scan.call_sites {
            if site.arg_count != site.kind.expected_arity() {
                state.errors.push(
                    Diagnostic::error(format!("Invalid macro call: {} with {} arguments", site.kind.name(), site.arg_count))
                        .with_file(path.to_path_buf()),
                );
                continue;
            }

            match site.kind {
                MacroKind::Ifdef | MacroKind::Ifndef => self.handle_guard(site, &parsed, path, &mut state),
                MacroKind::Inline => self.handle_inline(site, &parsed, path, &mut state),
            }
        }

        // Step 5: any remaining identifier/call-expression reference to a
        // name that ended up disabled, not already inside a recorded
        // replacement, becomes the literal `undefined`.
        if !state.disabled_macro_names.is_empty() {
            for ident in &scan.ident_refs {
                if !state.disabled_macro_names.contains(&ident.name) {
                    continue;
                }
                let span = ident.call_span.unwrap_or(ident.span);
                let range = parsed.span_range(span);
                if state.replacement_info.iter().any(|r| spans_overlap(r.start, r.end, range.start, range.end)) {
                    continue;
                }
                state.replacement_info.push(Replacement { start: range.start, end: range.end, text: "undefined".to_string() });
            }
        }

        let output = state.apply(source);
        (output, state)
    }

    fn handle_guard(&self, site: &MacroCallSite, parsed: &ParsedModule, path: &Path, state: &mut MacroState) {
        let name_arg = parsed.span_text(site.args[0]);
        let name_text = name_arg.trim_matches(|c| c == '"' || c == '\'').to_string();
        let value_text = parsed.span_text(site.args[1]).to_string();

        let truthy = self.defines.get(&name_text).is_some_and(is_truthy);
        let active = match site.kind {
            MacroKind::Ifdef => truthy,
            MacroKind::Ifndef => !truthy,
            MacroKind::Inline => unreachable!("handle_guard is only dispatched for ifdef/ifndef"),
        };

        match &site.context {
            CallSiteContext::VariableInit { var_decl_span, binding_name } => {
                if active {
                    let replacement_text = function_like_wrap(binding_name, &value_text)
                        .unwrap_or_else(|| format!("const {binding_name} = {};", value_text.trim()));
                    let range = parsed.span_range(*var_decl_span);
                    state.replacement_info.push(Replacement { start: range.start, end: range.end, text: replacement_text });
                } else {
                    state.disabled_macro_names.insert(binding_name.clone());
                    let range = parsed.span_range(site.call_span);
                    state.replacement_info.push(Replacement { start: range.start, end: range.end, text: "undefined".to_string() });
                }
            }
            CallSiteContext::ExprStatement { stmt_span } => {
                let range = parsed.span_range(*stmt_span);
                let text = if active { format!("{};", value_text.trim()) } else { "undefined;".to_string() };
                state.replacement_info.push(Replacement { start: range.start, end: range.end, text });
            }
        }
    }

    fn handle_inline(&self, site: &MacroCallSite, parsed: &ParsedModule, path: &Path, state: &mut MacroState) {
        let arg_text = parsed.span_text(site.args[0]).trim().to_string();
        let resolved = resolve_inline_argument(&arg_text, parsed, path, state);
        let macro_line = parsed.line_of(site.call_span.lo);

        let rendered = match inline::evaluate_inline(self.transpiler.as_ref(), &resolved, path, macro_line) {
            Ok(text) => text,
            Err(diagnostic) => {
                state.errors.push(diagnostic);
                "undefined".to_string()
            }
        };

        match &site.context {
            CallSiteContext::VariableInit { var_decl_span, binding_name } => {
                let range = parsed.span_range(*var_decl_span);
                state.replacement_info.push(Replacement {
                    start: range.start,
                    end: range.end,
                    text: format!("const {binding_name} = {rendered};"),
                });
            }
            CallSiteContext::ExprStatement { stmt_span } => {
                let range = parsed.span_range(*stmt_span);
                state.replacement_info.push(Replacement { start: range.start, end: range.end, text: format!("{rendered};") });
            }
        }
    }
}

/// `$$inline(ident)` resolves to the body of a same-file function
/// declaration named `ident`; anything else (an inline arrow/function
/// expression, a literal) is used as-is.
fn resolve_inline_argument(arg_text: &str, parsed: &ParsedModule, path: &Path, state: &mut MacroState) -> String {
    if !is_plain_identifier(arg_text) {
        return arg_text.to_string();
    }
    for item in &parsed.module.body {
        if let ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) = item {
            if f.ident.sym.as_ref() == arg_text {
                let params_text = match (f.function.params.first(), f.function.params.last()) {
                    (Some(first), Some(last)) => {
                        parsed.span_text(Span { lo: first.span().lo, hi: last.span().hi }).to_string()
                    }
                    _ => String::new(),
                };
                let body_text = f.function.body.as_ref().map(|b| parsed.span_text(b.span)).unwrap_or("{}");
                return format!("function {}({params_text}) {body_text}", f.ident.sym);
            }
        }
    }
    state.warnings.push(
        Diagnostic::warning(format!("$$inline: could not find a function declaration named '{arg_text}'")).with_file(path.to_path_buf()),
    );
    arg_text.to_string()
}

fn is_plain_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

fn spans_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start < b_end && b_start < a_end
}

/// Best-effort textual conversion of an arrow/function expression's source
/// text into a named function declaration. Kept at the text-slicing level
/// to stay consistent with the rest of this workspace's span-based
/// approach rather than re-printing through a full AST codegen pass for a
/// single expression.
fn function_like_wrap(name: &str, value_text: &str) -> Option<String> {
    let trimmed = value_text.trim();
    if let Some(arrow_pos) = find_top_level_arrow(trimmed) {
        let params = trimmed[..arrow_pos].trim();
        let body = trimmed[arrow_pos + 2..].trim();
        let params_text = if params.starts_with('(') { params.to_string() } else { format!("({params})") };
        return Some(if body.starts_with('{') {
            format!("function {name}{params_text} {body}")
        } else {
            format!("function {name}{params_text} {{ return {body}; }}")
        });
    }
    if let Some(rest) = trimmed.strip_prefix("function") {
        let rest = rest.trim_start();
        let paren = rest.find('(')?;
        let tail = &rest[paren..];
        return Some(format!("function {name}{tail}"));
    }
    None
}

/// Find the `=>` introducing an arrow function's body, tracking paren
/// depth so default-parameter parens don't confuse the search.
fn find_top_level_arrow(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b'=' if depth <= 0 && bytes[i + 1] == b'>' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(defines: &[(&str, JsonValue)]) -> MacroEngine {
        MacroEngine::new(defines.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect())
    }

    #[test]
    fn ifdef_truthy_expands_to_named_function() {
        let e = engine(&[("DEBUG", JsonValue::Bool(true))]);
        let (out, state) = e.transform(Path::new("a.ts"), "const $$debug = $$ifdef(\"DEBUG\", () => console.log);");
        assert!(out.contains("function $$debug()"), "{out}");
        assert!(!state.disabled_macro_names.contains("$$debug"));
    }

    #[test]
    fn ifdef_falsy_disables_name_and_blanks_both_sites() {
        let e = engine(&[("DEBUG", JsonValue::Bool(false))]);
        let (out, state) =
            e.transform(Path::new("a.ts"), "const $$log = $$ifdef(\"DEBUG\", () => console.log); $$log(\"hi\");");
        assert!(state.disabled_macro_names.contains("$$log"));
        assert_eq!(out.matches("undefined").count(), 2, "{out}");
    }

    #[test]
    fn untouched_file_bypasses_transform() {
        let e = engine(&[]);
        let (out, state) = e.transform(Path::new("a.ts"), "const x = 1;\n");
        assert_eq!(out, "const x = 1;\n");
        assert!(state.files_with_macros.is_empty());
    }

    #[test]
    fn inline_numeric_expression_is_evaluated_at_build_time() {
        let e = engine(&[]);
        let (out, state) = e.transform(Path::new("a.ts"), "const x = $$inline(() => 1 + 2);");
        assert!(out.contains("const x = 3;"), "{out}");
        assert!(state.errors.is_empty(), "{:?}", state.errors);
    }

    #[test]
    fn arity_violation_is_recorded_as_error() {
        let e = engine(&[]);
        let (_out, state) = e.transform(Path::new("a.ts"), "const x = $$inline(1, 2);");
        assert!(state.errors.iter().any(|d| d.message.contains("Invalid macro call")));
    }
}
