//! Configuration shapes accepted by `VariantOrchestrator` (SPEC_FULL.md §6).
//!
//! This crate never reads a config file itself — it accepts an
//! already-parsed [`BuildConfig`] plus a [`crate::reactive::ReactiveConfig`]
//! channel of further changes.

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// `true | false | { failOnError: bool }`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TypesOption {
    Enabled(bool),
    Detailed { #[serde(default = "default_true")] fail_on_error: bool },
}

impl TypesOption {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    #[must_use]
    pub fn fail_on_error(&self) -> bool {
        match self {
            Self::Enabled(_) => true,
            Self::Detailed { fail_on_error } => *fail_on_error,
        }
    }
}

/// `true | false | { bundle: bool, outDir: string }`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeclarationOption {
    Enabled(bool),
    Detailed {
        #[serde(default = "default_true")]
        bundle: bool,
        #[serde(default)]
        out_dir: Option<String>,
    },
}

impl DeclarationOption {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    #[must_use]
    pub fn bundle(&self) -> bool {
        match self {
            Self::Enabled(_) => true,
            Self::Detailed { bundle, .. } => *bundle,
        }
    }

    #[must_use]
    pub fn out_dir(&self) -> Option<&str> {
        match self {
            Self::Enabled(_) => None,
            Self::Detailed { out_dir, .. } => out_dir.as_deref(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Node,
    Browser,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EsbuildOptions {
    #[serde(default)]
    pub entry_points: FxHashMap<String, String>,
    pub outdir: String,
    #[serde(default = "default_true")]
    pub bundle: bool,
    #[serde(default)]
    pub minify: bool,
    #[serde(default)]
    pub format: BundleFormat,
    #[serde(default = "default_platform")]
    pub platform: Platform,
    #[serde(default)]
    pub loader: FxHashMap<String, String>,
    pub tsconfig: String,
}

fn default_platform() -> Platform {
    Platform::Neutral
}

/// A banner/footer value: either a fixed string, or (modeled, since a real
/// function value can't cross the config boundary) a reference by name to
/// a registered generator invoked with `(name, user_argv)`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BannerValue {
    Text(String),
    Generator { generator: String },
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub on_start: Vec<String>,
    #[serde(default)]
    pub on_resolve: Vec<String>,
    #[serde(default)]
    pub on_load: Vec<String>,
    #[serde(default)]
    pub on_end: Vec<String>,
    #[serde(default)]
    pub on_success: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VariantBuild {
    pub esbuild: EsbuildOptions,
    #[serde(default)]
    pub types: Option<TypesOption>,
    #[serde(default)]
    pub declaration: Option<DeclarationOption>,
    #[serde(default)]
    pub define: FxHashMap<String, serde_json::Value>,
    #[serde(default)]
    pub banner: FxHashMap<String, BannerValue>,
    #[serde(default)]
    pub footer: FxHashMap<String, BannerValue>,
    #[serde(default)]
    pub lifecycle: Option<LifecycleConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServeOptions {
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BuildConfig {
    pub common: VariantBuild,
    #[serde(default)]
    pub variants: FxHashMap<String, VariantBuild>,
    #[serde(default)]
    pub user_argv: serde_json::Value,
    #[serde(default)]
    pub serve: Option<ServeOptions>,
}

impl BuildConfig {
    /// Merge `common` into `variant_name`'s overrides — variant fields win,
    /// collection fields (`define`/`banner`/`footer`) are combined with
    /// variant entries taking precedence on key collision.
    #[must_use]
    pub fn merged(&self, variant_name: &str) -> Option<VariantBuild> {
        let variant = self.variants.get(variant_name)?;
        let mut merged = self.common.clone();
        merged.esbuild = variant.esbuild.clone();
        if variant.types.is_some() {
            merged.types = variant.types.clone();
        }
        if variant.declaration.is_some() {
            merged.declaration = variant.declaration.clone();
        }
        merged.define.extend(variant.define.clone());
        merged.banner.extend(variant.banner.clone());
        merged.footer.extend(variant.footer.clone());
        if variant.lifecycle.is_some() {
            merged.lifecycle = variant.lifecycle.clone();
        }
        Some(merged)
    }
}
