//! Thin wrapper around `swc_ecma_parser` for statement-level work on
//! declaration text.
//!
//! Neither `GraphModel` nor `MacroEngine` need a full type checker — both
//! only walk top-level statements and slice the original source by span, so
//! this module exposes just enough to do that without re-emitting text
//! through `swc_ecma_codegen` (which would require threading comments and
//! source maps through for no benefit here).

use swc_core::common::{BytePos, FileName, SourceMap, sync::Lrc};
use swc_core::ecma::ast::Module;
use swc_core::ecma::parser::{EsConfig, Parser, StringInput, Syntax, TsConfig, lexer::Lexer};

/// A parsed module plus enough bookkeeping to slice the original source by
/// span.
pub struct ParsedModule {
    pub module: Module,
    pub source: String,
    base: BytePos,
}

impl ParsedModule {
    /// Byte range of `span` within the original source text, clamped to
    /// the text's bounds (a defensively-written parser can still hand back
    /// spans from recovered-error nodes that don't line up perfectly).
    #[must_use]
    pub fn span_range(&self, span: swc_core::common::Span) -> std::ops::Range<usize> {
        let lo = span.lo.0.saturating_sub(self.base.0) as usize;
        let hi = span.hi.0.saturating_sub(self.base.0) as usize;
        lo.min(self.source.len())..hi.min(self.source.len())
    }

    #[must_use]
    pub fn span_text(&self, span: swc_core::common::Span) -> &str {
        &self.source[self.span_range(span)]
    }

    /// 0-indexed line number containing an absolute `BytePos` (not an
    /// offset into `source`) — used to compute a macro's source line
    /// offset for sandboxed-eval stack remapping.
    #[must_use]
    pub fn line_of(&self, pos: BytePos) -> u32 {
        let offset = pos.0.saturating_sub(self.base.0) as usize;
        let offset = offset.min(self.source.len());
        self.source[..offset].matches('\n').count() as u32
    }
}

/// Parse `source` as TypeScript (declaration-aware: `dts` allows ambient
/// `declare` forms to round-trip) from the file at `path` (used only for
/// diagnostics, not touched on disk).
pub fn parse_typescript(source: &str, path_display: &str, is_declaration: bool) -> Result<ParsedModule, String> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(path_display.to_string()).into(), source.to_string());
    let base = fm.start_pos;

    let syntax = Syntax::Typescript(TsConfig {
        tsx: false,
        dts: is_declaration,
        decorators: true,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: false,
    });
    let lexer = Lexer::new(syntax, Default::default(), StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|e| format!("parse error in {path_display}: {e:?}"))?;

    Ok(ParsedModule { module, source: source.to_string(), base })
}

/// Parse `source` as plain ES/JSX (used by the macro engine, which scans
/// ordinary `.ts`/`.tsx` source, not emitted declarations).
pub fn parse_script(source: &str, path_display: &str, jsx: bool) -> Result<ParsedModule, String> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(path_display.to_string()).into(), source.to_string());
    let base = fm.start_pos;

    let syntax = if jsx {
        Syntax::Es(EsConfig { jsx: true, ..Default::default() })
    } else {
        Syntax::Typescript(TsConfig { tsx: false, dts: false, decorators: true, no_early_errors: true, disallow_ambiguous_jsx_like: false })
    };
    let lexer = Lexer::new(syntax, Default::default(), StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|e| format!("parse error in {path_display}: {e:?}"))?;

    Ok(ParsedModule { module, source: source.to_string(), base })
}
