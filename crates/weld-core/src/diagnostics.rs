//! Diagnostic types shared by every build-time subsystem.
//!
//! Modeled after the taxonomy in the error-handling design: every non-fatal
//! failure (a macro arity error, an inline-eval runtime error, a type-check
//! warning) is surfaced as one of these rather than propagated as a hard
//! error.

use std::path::PathBuf;

use serde::Serialize;

use crate::position::Position;

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
    Message,
}

/// A single diagnostic message, optionally located in a source file.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            message: message.into(),
            file: None,
            position: None,
            code: None,
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Warning,
            message: message.into(),
            file: None,
            position: None,
            code: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.category, DiagnosticCategory::Error)
    }

    /// Demote an error-category diagnostic to a warning in place. Used when
    /// `types.failOnError == false`.
    pub fn demote_to_warning(&mut self) {
        if matches!(self.category, DiagnosticCategory::Error) {
            self.category = DiagnosticCategory::Warning;
        }
    }

    /// Render as `file:line:column - category: message`, falling back
    /// gracefully when location information is missing.
    #[must_use]
    pub fn format_located(&self) -> String {
        let category = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        };
        match (&self.file, &self.position) {
            (Some(file), Some(pos)) => format!(
                "{}:{}:{} - {}: {}",
                file.display(),
                pos.line,
                pos.column,
                category,
                self.message
            ),
            (Some(file), None) => format!("{} - {}: {}", file.display(), category, self.message),
            _ => format!("{category}: {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demote_to_warning_only_affects_errors() {
        let mut warn = Diagnostic::warning("already a warning");
        warn.demote_to_warning();
        assert!(matches!(warn.category, DiagnosticCategory::Warning));

        let mut err = Diagnostic::error("boom");
        err.demote_to_warning();
        assert!(matches!(err.category, DiagnosticCategory::Warning));
    }

    #[test]
    fn format_located_falls_back_without_position() {
        let d = Diagnostic::error("bad").with_file("a.ts");
        assert_eq!(d.format_located(), "a.ts - error: bad");
    }

    #[test]
    fn format_located_with_full_location() {
        let d = Diagnostic::error("bad")
            .with_file("a.ts")
            .with_position(Position::new(3, 4));
        assert_eq!(d.format_located(), "a.ts:3:4 - error: bad");
    }
}
