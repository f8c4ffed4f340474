//! Variant orchestration: reactive configuration, the lifecycle/plugin
//! hub, the `BundleBackend` external-bundler contract, the refcounted
//! shared language service registry, and `VariantOrchestrator` itself
//! (SPEC_FULL.md §4.7-4.9).

pub mod bundle_backend;
pub mod config;
pub mod lifecycle;
pub mod reactive;
pub mod shared_service;
pub mod variant;

pub use bundle_backend::{BuildOptions, BundleBackend, BundleResult, Metafile, PluginDiagnostic, SwcBundleBackend, TranspileOptions};
pub use config::{BannerValue, BuildConfig, BundleFormat, DeclarationOption, EsbuildOptions, LifecycleConfig, Platform, ServeOptions, TypesOption, VariantBuild};
pub use lifecycle::{BundlePlugin, HookId, HookResult, LifecycleHub, LoadArgs, LoadResult};
pub use reactive::{ReactiveConfig, Unsubscribe};
pub use shared_service::SharedLanguageServiceRegistry;
pub use variant::{BuildOutcome, VariantOrchestrator};
