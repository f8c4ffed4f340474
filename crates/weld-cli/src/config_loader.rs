//! Bridges [`crate::args::CliArgs`] to an in-memory
//! [`weld_orchestrator::config::BuildConfig`]: load the config file if one
//! is given, otherwise synthesize a single `default` variant from CLI
//! flags and the pre-resolved positional entry-point paths.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use weld_orchestrator::config::{BuildConfig, EsbuildOptions, Platform, TypesOption, VariantBuild};

use crate::args::CliArgs;

const DEFAULT_VARIANT: &str = "default";

/// Reads `path` (defaulting to `weld.config.json` in `cwd`) if it exists,
/// and layers CLI overrides on top. Entry points given on the command line
/// always replace `esbuild.entryPoints` for every variant, since they name
/// what the user is asking to build *right now*; this crate never expands
/// globs itself — by the time a path reaches here it is already resolved.
pub fn load(args: &CliArgs, cwd: &Path) -> anyhow::Result<BuildConfig> {
    let config_path = args.config.clone().unwrap_or_else(|| cwd.join("weld.config.json"));
    let mut config = if config_path.exists() {
        let text = std::fs::read_to_string(&config_path)?;
        serde_json::from_str(&text)?
    } else {
        default_config(args, cwd)
    };

    if !args.entry_points.is_empty() {
        let entry_points = resolve_entry_points(&args.entry_points, cwd);
        config.common.esbuild.entry_points = entry_points.clone();
        for variant in config.variants.values_mut() {
            variant.esbuild.entry_points = entry_points.clone();
        }
    }

    apply_flag_overrides(&mut config, args);
    Ok(config)
}

fn default_config(args: &CliArgs, cwd: &Path) -> BuildConfig {
    let entry_points = resolve_entry_points(&args.entry_points, cwd);
    let tsconfig = args.tsconfig.clone().unwrap_or_else(|| cwd.join("tsconfig.json"));
    let outdir = args.outdir.clone().unwrap_or_else(|| cwd.join("dist"));

    let variant = VariantBuild {
        esbuild: EsbuildOptions {
            entry_points,
            outdir: outdir.display().to_string(),
            bundle: args.bundle,
            minify: args.minify,
            format: weld_orchestrator::config::BundleFormat::default(),
            platform: args.platform.map(|p| p.to_platform()).unwrap_or(Platform::Neutral),
            loader: FxHashMap::default(),
            tsconfig: tsconfig.display().to_string(),
        },
        types: None,
        declaration: None,
        define: FxHashMap::default(),
        banner: FxHashMap::default(),
        footer: FxHashMap::default(),
        lifecycle: None,
    };

    let mut variants = FxHashMap::default();
    variants.insert(DEFAULT_VARIANT.to_string(), variant.clone());

    BuildConfig { common: variant, variants, user_argv: serde_json::Value::Null, serve: None }
}

fn apply_flag_overrides(config: &mut BuildConfig, args: &CliArgs) {
    for variant in std::iter::once(&mut config.common).chain(config.variants.values_mut()) {
        if args.bundle {
            variant.esbuild.bundle = true;
        }
        if args.minify {
            variant.esbuild.minify = true;
        }
        if let Some(outdir) = &args.outdir {
            variant.esbuild.outdir = outdir.display().to_string();
        }
        if let Some(tsconfig) = &args.tsconfig {
            variant.esbuild.tsconfig = tsconfig.display().to_string();
        }
        if let Some(platform) = args.platform {
            variant.esbuild.platform = platform.to_platform();
        }
        if args.type_check {
            variant.types = Some(TypesOption::Detailed { fail_on_error: args.fail_on_error });
        }
        if args.declaration {
            variant.declaration = Some(weld_orchestrator::config::DeclarationOption::Enabled(true));
        }
    }
}

/// Builds an `entryPoints` map keyed by each path's extension-stripped path
/// relative to `cwd`, mirroring the shape esbuild's own `entryPoints`
/// object takes. Paths are resolved against `cwd` if not already absolute.
fn resolve_entry_points(paths: &[PathBuf], cwd: &Path) -> FxHashMap<String, String> {
    paths
        .iter()
        .map(|path| {
            let absolute = if path.is_absolute() { path.clone() } else { cwd.join(path) };
            let relative = absolute.strip_prefix(cwd).unwrap_or(&absolute);
            let key = relative.with_extension("").display().to_string();
            (key, absolute.display().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn default_config_builds_single_variant_from_outdir_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.ts"), "export const x = 1;").unwrap();

        let args = CliArgs::parse_from(["weld", "--outdir", "out", "index.ts"]);
        let config = load(&args, dir.path()).expect("load should synthesize a default config");

        assert_eq!(config.variants.len(), 1);
        let variant = config.variants.get(DEFAULT_VARIANT).expect("default variant present");
        assert!(variant.esbuild.outdir.ends_with("out"));
        assert_eq!(variant.esbuild.entry_points.len(), 1);
    }

    #[test]
    fn type_check_flag_enables_types_with_requested_fail_on_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.ts"), "export const x = 1;").unwrap();

        let args = CliArgs::parse_from(["weld", "--type-check", "--fail-on-error", "index.ts"]);
        let config = load(&args, dir.path()).unwrap();

        let types = config.common.types.expect("types should be set");
        assert!(types.fail_on_error());
    }
}
