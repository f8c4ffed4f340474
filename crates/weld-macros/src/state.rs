//! `MacroState` — per-transform-invocation bookkeeping (SPEC_FULL.md §3).

use std::collections::HashSet;
use std::path::PathBuf;

use weld_core::Diagnostic;

/// A single textual replacement, recorded as `(start, end, replacement)`
/// byte offsets into the original source. Replacements never overlap and
/// are applied right-to-left so earlier spans stay valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Per-file transform state, rebuilt for every `MacroEngine::transform` call.
#[derive(Default)]
pub struct MacroState {
    pub files_with_macros: HashSet<PathBuf>,
    pub disabled_macro_names: HashSet<String>,
    pub replacement_info: Vec<Replacement>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl MacroState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `self.replacement_info` to `source`, right-to-left, after
    /// sorting and asserting non-overlap.
    #[must_use]
    pub fn apply(&mut self, source: &str) -> String {
        self.replacement_info.sort_by_key(|r| r.start);
        let mut out = source.to_string();
        for replacement in self.replacement_info.iter().rev() {
            if replacement.start > out.len() || replacement.end > out.len() || replacement.start > replacement.end {
                continue;
            }
            out.replace_range(replacement.start..replacement.end, &replacement.text);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_non_overlapping_and_right_to_left() {
        let mut state = MacroState::new();
        state.replacement_info.push(Replacement { start: 6, end: 11, text: "Rust".into() });
        state.replacement_info.push(Replacement { start: 0, end: 5, text: "Howdy".into() });
        let out = state.apply("Hello World");
        assert_eq!(out, "Howdy Rust");
    }

    #[test]
    fn apply_at_position_zero_preserves_start() {
        let mut state = MacroState::new();
        state.replacement_info.push(Replacement { start: 0, end: 0, text: "// header\n".into() });
        let out = state.apply("const x = 1;");
        assert_eq!(out, "// header\nconst x = 1;");
    }

    #[test]
    fn zero_length_replacement_removes_span_exactly() {
        let mut state = MacroState::new();
        state.replacement_info.push(Replacement { start: 5, end: 11, text: String::new() });
        let out = state.apply("Hello World!");
        assert_eq!(out, "Hello!");
    }
}
