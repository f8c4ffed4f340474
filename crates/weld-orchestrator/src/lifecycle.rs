//! `LifecycleHub` — ordered per-hook-kind handler registration, producing a
//! `BundlePlugin` the bundler consumes (SPEC_FULL.md §4.7, §6's "bundler
//! plugin contract").
//!
//! Grounded in the pack's plugin-driver shape (a struct holding one
//! `Vec<Box<dyn Fn...>>` per hook kind, handlers invoked in registration
//! order with results concatenated) rather than anything in the teacher,
//! which has no plugin system of its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use weld_core::Diagnostic;

pub type HookId = u64;

#[derive(Clone, Debug, Default)]
pub struct HookResult {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl HookResult {
    pub fn extend(&mut self, other: HookResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[derive(Clone, Debug)]
pub struct LoadArgs {
    pub path: std::path::PathBuf,
    pub loader: String,
    pub contents: String,
}

#[derive(Clone, Debug, Default)]
pub struct LoadResult {
    pub contents: Option<String>,
    pub loader: Option<String>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

type OnStartHandler = Arc<dyn Fn() -> HookResult + Send + Sync>;
type OnLoadHandler = Arc<dyn Fn(&LoadArgs) -> Option<LoadResult> + Send + Sync>;
type OnEndHandler = Arc<dyn Fn(&HookResult) -> HookResult + Send + Sync>;
type OnSuccessHandler = Arc<dyn Fn(&HookResult) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LifecycleHub {
    next_id: Arc<AtomicU64>,
    on_start: Vec<(HookId, OnStartHandler)>,
    on_load: Vec<(HookId, OnLoadHandler)>,
    on_end: Vec<(HookId, OnEndHandler)>,
    on_success: Vec<(HookId, OnSuccessHandler)>,
}

impl LifecycleHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> HookId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn on_start(&mut self, handler: impl Fn() -> HookResult + Send + Sync + 'static) -> HookId {
        let id = self.allocate_id();
        self.on_start.push((id, Arc::new(handler)));
        id
    }

    pub fn on_load(&mut self, handler: impl Fn(&LoadArgs) -> Option<LoadResult> + Send + Sync + 'static) -> HookId {
        let id = self.allocate_id();
        self.on_load.push((id, Arc::new(handler)));
        id
    }

    pub fn on_end(&mut self, handler: impl Fn(&HookResult) -> HookResult + Send + Sync + 'static) -> HookId {
        let id = self.allocate_id();
        self.on_end.push((id, Arc::new(handler)));
        id
    }

    pub fn on_success(&mut self, handler: impl Fn(&HookResult) + Send + Sync + 'static) -> HookId {
        let id = self.allocate_id();
        self.on_success.push((id, Arc::new(handler)));
        id
    }

    /// Produce the consumable plugin object. Cloned cheaply (handler lists
    /// are `Arc`-backed) so the bundler can own its copy independently of
    /// further hub mutation.
    #[must_use]
    pub fn create(&self) -> BundlePlugin {
        BundlePlugin {
            on_start: self.on_start.iter().map(|(_, h)| Arc::clone(h)).collect(),
            on_load: self.on_load.iter().map(|(_, h)| Arc::clone(h)).collect(),
            on_end: self.on_end.iter().map(|(_, h)| Arc::clone(h)).collect(),
            on_success: self.on_success.iter().map(|(_, h)| Arc::clone(h)).collect(),
        }
    }
}

/// The plugin object the bundler drives. Handler execution within one hook
/// kind is sequential in registration order; results are concatenated.
#[derive(Clone, Default)]
pub struct BundlePlugin {
    on_start: Vec<OnStartHandler>,
    on_load: Vec<OnLoadHandler>,
    on_end: Vec<OnEndHandler>,
    on_success: Vec<OnSuccessHandler>,
}

impl BundlePlugin {
    #[must_use]
    pub fn run_on_start(&self) -> HookResult {
        let mut aggregate = HookResult::default();
        for handler in &self.on_start {
            aggregate.extend(handler());
        }
        aggregate
    }

    /// First handler to return `Some(..)` wins, matching the spec's
    /// "onLoad handlers ... optionally return ... or nothing" semantics —
    /// registration order decides which plugin claims a module.
    #[must_use]
    pub fn run_on_load(&self, args: &LoadArgs) -> Option<LoadResult> {
        for handler in &self.on_load {
            if let Some(result) = handler(args) {
                return Some(result);
            }
        }
        None
    }

    #[must_use]
    pub fn run_on_end(&self, build_result: &HookResult) -> HookResult {
        let mut aggregate = HookResult::default();
        for handler in &self.on_end {
            aggregate.extend(handler(build_result));
        }
        aggregate
    }

    pub fn run_on_success(&self, build_result: &HookResult) {
        for handler in &self.on_success {
            handler(build_result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_start_handlers_run_in_registration_order_and_aggregate() {
        let mut hub = LifecycleHub::new();
        hub.on_start(|| HookResult { errors: vec![Diagnostic::error("a")], warnings: vec![] });
        hub.on_start(|| HookResult { errors: vec![Diagnostic::error("b")], warnings: vec![] });
        let plugin = hub.create();
        let result = plugin.run_on_start();
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].message, "a");
        assert_eq!(result.errors[1].message, "b");
    }

    #[test]
    fn on_load_stops_at_first_claiming_handler() {
        let mut hub = LifecycleHub::new();
        hub.on_load(|_args| None);
        hub.on_load(|_args| Some(LoadResult { contents: Some("claimed".into()), ..Default::default() }));
        hub.on_load(|_args| Some(LoadResult { contents: Some("unreachable".into()), ..Default::default() }));
        let plugin = hub.create();
        let args = LoadArgs { path: "a.ts".into(), loader: "ts".into(), contents: String::new() };
        let result = plugin.run_on_load(&args).unwrap();
        assert_eq!(result.contents.as_deref(), Some("claimed"));
    }
}
