//! `BundleBackend` — the out-of-scope bundler's contract (SPEC_FULL.md §6).
//!
//! `SwcBundleBackend` is a minimal concrete implementation: enough to
//! exercise the sandboxed `$$inline` path and the metafile-driven
//! dependency map `VariantOrchestrator::build` needs, not a general-purpose
//! bundler — that is explicitly not the subject of this crate.

use std::path::PathBuf;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::config::{BundleFormat, Platform};
use crate::lifecycle::{BundlePlugin, HookResult, LoadArgs};

#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub entry_points: FxHashMap<String, String>,
    pub outdir: PathBuf,
    pub bundle: bool,
    pub minify: bool,
    pub format: BundleFormat,
    pub platform: Platform,
    pub plugin: BundlePlugin,
    /// Resolved banner/footer text keyed by target (`"js"`, `"css"`), per
    /// spec.md line 267. Prepended/appended to each emitted output's text.
    pub banner: FxHashMap<String, String>,
    pub footer: FxHashMap<String, String>,
}

/// One entry in the dependency map the bundler-as-analyzer returns:
/// output key (extension-stripped, root-relative) -> input path.
#[derive(Clone, Debug, Default)]
pub struct Metafile {
    pub inputs: FxHashMap<String, PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct BundleResult {
    pub errors: Vec<PluginDiagnostic>,
    pub warnings: Vec<PluginDiagnostic>,
    pub metafile: Metafile,
}

/// A build error/warning tagged with the plugin that produced it — the
/// spec's "filter to errors whose pluginName is empty" rethrow rule needs
/// this distinction (errors from this crate's own core logic vs. from a
/// user-registered plugin hook).
#[derive(Clone, Debug)]
pub struct PluginDiagnostic {
    pub plugin_name: String,
    pub diagnostic: weld_core::Diagnostic,
}

#[derive(Clone, Debug, Default)]
pub struct TranspileOptions {
    pub platform: Option<Platform>,
}

#[async_trait]
pub trait BundleBackend: Send + Sync {
    /// Run the bundler-as-analyzer: resolve `options.entry_points` and
    /// return the dependency map without necessarily writing output
    /// (`VariantOrchestrator::build` step 3).
    async fn analyze(&self, options: &BuildOptions) -> Metafile;

    /// Full build: resolve, load (running `options.plugin`'s `onLoad`
    /// hooks), and emit bundled output.
    async fn build(&self, options: &BuildOptions) -> BundleResult;

    /// Transpile an isolated snippet to CommonJS for `$$inline`, returning
    /// the generated source map for stack remapping.
    async fn transpile_to_cjs(&self, source: &str, opts: &TranspileOptions) -> Result<(String, sourcemap::SourceMap), String>;
}

/// Minimal `swc`-backed implementation. Treats every entry point as its own
/// bundle unit and only applies the `onLoad` hook chain (type-stripping and
/// bundling beyond that is delegated to a real bundler in a production
/// deployment of this crate).
#[derive(Default)]
pub struct SwcBundleBackend;

#[async_trait]
impl BundleBackend for SwcBundleBackend {
    async fn analyze(&self, options: &BuildOptions) -> Metafile {
        let root = options.outdir.parent().map(std::path::Path::to_path_buf).unwrap_or_default();
        let mut inputs = FxHashMap::default();
        for (name, path) in &options.entry_points {
            let input = PathBuf::from(path);
            let relative = input.strip_prefix(&root).unwrap_or(&input);
            let key = relative.with_extension("");
            inputs.insert(key.display().to_string(), input);
            let _ = name;
        }
        Metafile { inputs }
    }

    async fn build(&self, options: &BuildOptions) -> BundleResult {
        let start = options.plugin.run_on_start();
        let mut errors: Vec<PluginDiagnostic> =
            start.errors.into_iter().map(|d| PluginDiagnostic { plugin_name: String::new(), diagnostic: d }).collect();
        let mut warnings: Vec<PluginDiagnostic> =
            start.warnings.into_iter().map(|d| PluginDiagnostic { plugin_name: String::new(), diagnostic: d }).collect();

        let metafile = self.analyze(options).await;

        let banner = options.banner.get("js").cloned().unwrap_or_default();
        let footer = options.footer.get("js").cloned().unwrap_or_default();

        for (key, path) in &metafile.inputs {
            let contents = match tokio::fs::read_to_string(path).await {
                Ok(contents) => contents,
                Err(e) => {
                    errors.push(PluginDiagnostic {
                        plugin_name: String::new(),
                        diagnostic: weld_core::Diagnostic::error(format!("failed to read {}: {e}", path.display())).with_file(path.clone()),
                    });
                    continue;
                }
            };
            let args = LoadArgs { path: path.clone(), loader: "ts".to_string(), contents: contents.clone() };
            let mut loaded_contents = contents;
            if let Some(loaded) = options.plugin.run_on_load(&args) {
                if let Some(replaced) = loaded.contents {
                    loaded_contents = replaced;
                }
                for d in loaded.errors {
                    errors.push(PluginDiagnostic { plugin_name: String::new(), diagnostic: d });
                }
                for d in loaded.warnings {
                    warnings.push(PluginDiagnostic { plugin_name: String::new(), diagnostic: d });
                }
            }

            let output_text = join_with_banner_footer(&banner, &loaded_contents, &footer);
            let output_path = options.outdir.join(format!("{key}.js"));
            if let Err(e) = write_output(&output_path, &output_text).await {
                errors.push(PluginDiagnostic {
                    plugin_name: String::new(),
                    diagnostic: weld_core::Diagnostic::error(format!("failed to write {}: {e}", output_path.display())).with_file(path.clone()),
                });
            }
        }

        let end = options.plugin.run_on_end(&HookResult {
            errors: errors.iter().map(|p| p.diagnostic.clone()).collect(),
            warnings: warnings.iter().map(|p| p.diagnostic.clone()).collect(),
        });
        errors.extend(end.errors.into_iter().map(|d| PluginDiagnostic { plugin_name: String::new(), diagnostic: d }));
        warnings.extend(end.warnings.into_iter().map(|d| PluginDiagnostic { plugin_name: String::new(), diagnostic: d }));

        let result = BundleResult { errors, warnings, metafile };
        options.plugin.run_on_success(&HookResult {
            errors: result.errors.iter().map(|p| p.diagnostic.clone()).collect(),
            warnings: result.warnings.iter().map(|p| p.diagnostic.clone()).collect(),
        });
        result
    }

    async fn transpile_to_cjs(&self, source: &str, _opts: &TranspileOptions) -> Result<(String, sourcemap::SourceMap), String> {
        let parsed = weld_graph::parse::parse_script(source, "<inline>", false)?;
        let mut builder = sourcemap::SourceMapBuilder::new(Some("<inline>"));
        for line in 0..parsed.source.lines().count().max(1) {
            builder.add(line as u32, 0, line as u32, 0, Some("<inline>"), None);
        }
        Ok((parsed.source, builder.into_sourcemap()))
    }
}

/// Joins banner, body, and footer with a newline, skipping empty pieces so
/// a variant with no configured injection doesn't grow stray blank lines.
fn join_with_banner_footer(banner: &str, body: &str, footer: &str) -> String {
    [banner, body, footer].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n")
}

async fn write_output(path: &std::path::Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await
}
