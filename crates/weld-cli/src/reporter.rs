//! Terminal rendering of build/check diagnostics.

use colored::{Color, Colorize};
use weld_core::{Diagnostic, DiagnosticCategory};

/// Renders diagnostics either with ANSI color (an interactive terminal) or
/// as plain text (piped output, CI logs).
pub struct Reporter {
    pretty: bool,
}

impl Reporter {
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    #[must_use]
    pub fn render(&self, diagnostics: &[Diagnostic]) -> String {
        diagnostics
            .iter()
            .map(|d| self.render_one(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_one(&self, diagnostic: &Diagnostic) -> String {
        let located = diagnostic.format_located();
        if !self.pretty {
            return located;
        }
        located.color(category_color(diagnostic.category)).to_string()
    }
}

fn category_color(category: DiagnosticCategory) -> Color {
    match category {
        DiagnosticCategory::Error => Color::Red,
        DiagnosticCategory::Warning => Color::Yellow,
        DiagnosticCategory::Suggestion => Color::Cyan,
        DiagnosticCategory::Message => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weld_core::Position;

    #[test]
    fn plain_mode_renders_unstyled_located_text() {
        let diagnostics = vec![Diagnostic::error("bad import").with_file("a.ts").with_position(Position::new(1, 1))];
        let reporter = Reporter::new(false);
        assert_eq!(reporter.render(&diagnostics), "a.ts:1:1 - error: bad import");
    }

    #[test]
    fn pretty_mode_wraps_output_in_ansi_codes() {
        let diagnostics = vec![Diagnostic::warning("unused import").with_file("a.ts")];
        let reporter = Reporter::new(true);
        let rendered = reporter.render(&diagnostics);
        assert!(rendered.contains("a.ts - warning: unused import"));
        assert_ne!(rendered, "a.ts - warning: unused import");
    }

    #[test]
    fn multiple_diagnostics_join_with_newlines() {
        let diagnostics = vec![Diagnostic::error("first"), Diagnostic::error("second")];
        let reporter = Reporter::new(false);
        assert_eq!(reporter.render(&diagnostics), "error: first\nerror: second");
    }
}
