//! AST walking: macro call-site detection (SPEC_FULL.md §4.6).
//!
//! A macro call site is either a variable statement whose initializer
//! (possibly wrapped in a cast or invoked as an IIFE) is a `$$…` call, or a
//! bare expression-statement call. Detection is kept independent of
//! replacement/evaluation — this module only locates spans and arguments;
//! `engine.rs` decides what to do with them.

use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{Visit, VisitWith};

pub const MACRO_IFDEF: &str = "$$ifdef";
pub const MACRO_IFNDEF: &str = "$$ifndef";
pub const MACRO_INLINE: &str = "$$inline";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacroKind {
    Ifdef,
    Ifndef,
    Inline,
}

impl MacroKind {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            MACRO_IFDEF => Some(Self::Ifdef),
            MACRO_IFNDEF => Some(Self::Ifndef),
            MACRO_INLINE => Some(Self::Inline),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ifdef => MACRO_IFDEF,
            Self::Ifndef => MACRO_IFNDEF,
            Self::Inline => MACRO_INLINE,
        }
    }

    #[must_use]
    pub fn expected_arity(self) -> usize {
        match self {
            Self::Ifdef | Self::Ifndef => 2,
            Self::Inline => 1,
        }
    }
}

/// Where a macro call site was found, and the binding name it defines (if
/// any — only variable-initializer sites define a name).
#[derive(Debug)]
pub enum CallSiteContext {
    /// `const NAME = $$macro(...)`.
    VariableInit { var_decl_span: Span, binding_name: String },
    /// `$$macro(...);` as a bare expression statement.
    ExprStatement { stmt_span: Span },
}

#[derive(Debug)]
pub struct MacroCallSite {
    pub kind: MacroKind,
    pub call_span: Span,
    pub arg_count: usize,
    pub args: Vec<Span>,
    pub context: CallSiteContext,
}

/// A plain (non-macro) reference to an identifier, collected so the engine
/// can later replace references to disabled macro names.
#[derive(Debug)]
pub struct IdentReference {
    pub name: String,
    pub span: Span,
    /// `true` if this identifier is the callee of a call expression — the
    /// whole call expression span is then the replacement target.
    pub call_span: Option<Span>,
}

#[derive(Default)]
pub struct CallSiteScan {
    pub call_sites: Vec<MacroCallSite>,
    pub ident_refs: Vec<IdentReference>,
}

pub fn scan(module: &Module) -> CallSiteScan {
    let mut visitor = Collector::default();
    module.visit_with(&mut visitor);
    visitor.result
}

#[derive(Default)]
struct Collector {
    result: CallSiteScan,
}

/// Strip `(expr)`, `expr as T`, and `expr!`-style wrappers, and unwrap a
/// zero-arg IIFE (`(macroCall())()`) down to the inner macro call, per the
/// spec's "possibly wrapped in a cast or invoked as an IIFE" note.
fn unwrap_to_macro_call(expr: &Expr) -> Option<&CallExpr> {
    match expr {
        Expr::Paren(p) => unwrap_to_macro_call(&p.expr),
        Expr::TsAs(a) => unwrap_to_macro_call(&a.expr),
        Expr::TsConstAssertion(a) => unwrap_to_macro_call(&a.expr),
        Expr::TsNonNull(a) => unwrap_to_macro_call(&a.expr),
        Expr::Call(call) => {
            if is_macro_callee(call) {
                return Some(call);
            }
            // IIFE: `(macroCall())()` — zero-arg invocation of the macro's
            // own result is not itself a macro call; unwrap if the callee
            // is a macro call directly.
            if call.args.is_empty() {
                if let Callee::Expr(inner) = &call.callee {
                    return unwrap_to_macro_call(inner);
                }
            }
            None
        }
        _ => None,
    }
}

fn is_macro_callee(call: &CallExpr) -> bool {
    matches!(&call.callee, Callee::Expr(e) if matches!(&**e, Expr::Ident(id) if MacroKind::from_name(&id.sym).is_some()))
}

fn macro_kind_of(call: &CallExpr) -> Option<MacroKind> {
    if let Callee::Expr(e) = &call.callee {
        if let Expr::Ident(id) = &**e {
            return MacroKind::from_name(&id.sym);
        }
    }
    None
}

impl Visit for Collector {
    fn visit_var_decl(&mut self, node: &VarDecl) {
        for decl in &node.decls {
            if let (Pat::Ident(binding), Some(init)) = (&decl.name, &decl.init) {
                if let Some(call) = unwrap_to_macro_call(init) {
                    if let Some(kind) = macro_kind_of(call) {
                        self.result.call_sites.push(MacroCallSite {
                            kind,
                            call_span: call.span(),
                            arg_count: call.args.len(),
                            args: call.args.iter().map(|a| a.span()).collect(),
                            context: CallSiteContext::VariableInit {
                                var_decl_span: node.span(),
                                binding_name: binding.id.sym.to_string(),
                            },
                        });
                        continue;
                    }
                }
            }
            // Keep walking non-macro initializers for nested call sites.
            decl.visit_children_with(self);
        }
    }

    fn visit_expr_stmt(&mut self, node: &ExprStmt) {
        if let Some(call) = unwrap_to_macro_call(&node.expr) {
            if let Some(kind) = macro_kind_of(call) {
                self.result.call_sites.push(MacroCallSite {
                    kind,
                    call_span: call.span(),
                    arg_count: call.args.len(),
                    args: call.args.iter().map(|a| a.span()).collect(),
                    context: CallSiteContext::ExprStatement { stmt_span: node.span() },
                });
                return;
            }
        }
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &CallExpr) {
        if let Callee::Expr(e) = &node.callee {
            if let Expr::Ident(id) = &**e {
                if MacroKind::from_name(&id.sym).is_none() {
                    self.result.ident_refs.push(IdentReference {
                        name: id.sym.to_string(),
                        span: id.span(),
                        call_span: Some(node.span()),
                    });
                }
            }
        }
        node.visit_children_with(self);
    }

    fn visit_ident(&mut self, node: &Ident) {
        self.result.ident_refs.push(IdentReference { name: node.sym.to_string(), span: node.span(), call_span: None });
    }
}
