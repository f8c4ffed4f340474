//! Top-level orchestration: load config, construct one `VariantOrchestrator`
//! per variant sharing a registry/host/backend/macro engine, run the first
//! build, and (in watch mode) keep rebuilding as files change.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use tracing::{error, info, warn};

use weld_host::language_host::{CompilerOptions, LanguageHost};
use weld_host::language_service::{LanguageService, PassthroughLanguageService};
use weld_macros::MacroEngine;
use weld_orchestrator::bundle_backend::SwcBundleBackend;
use weld_orchestrator::config::BuildConfig;
use weld_orchestrator::reactive::ReactiveConfig;
use weld_orchestrator::variant::VariantOrchestrator;

use crate::args::CliArgs;
use crate::reporter::Reporter;
use crate::watch::{Debouncer, WatchFilter};

const DEBOUNCE_DELAY: Duration = Duration::from_millis(150);

/// Owns every variant for one invocation of the `weld` binary.
pub struct Driver {
    variants: BTreeMap<String, Arc<Mutex<VariantOrchestrator>>>,
    config_channel: ReactiveConfig<BuildConfig>,
    reporter: Reporter,
    cwd: PathBuf,
}

impl Driver {
    pub fn new(args: &CliArgs, cwd: PathBuf) -> anyhow::Result<Self> {
        let config = crate::config_loader::load(args, &cwd)?;
        let config_channel = ReactiveConfig::new(config.clone());

        let registry = Arc::new(weld_orchestrator::shared_service::SharedLanguageServiceRegistry::new());
        let host = Arc::new(Mutex::new(LanguageHost::new(CompilerOptions::default(), cwd.clone())));
        let backend = Arc::new(SwcBundleBackend);
        let macro_engine = Arc::new(MacroEngine::new(rustc_hash::FxHashMap::default()));

        let mut variants = BTreeMap::new();
        for (name, _) in &config.variants {
            let Some(merged) = config.merged(name) else { continue };
            let service_factory = || -> Arc<dyn LanguageService> { Arc::new(PassthroughLanguageService) };
            let orchestrator = VariantOrchestrator::new(
                name.clone(),
                Arc::clone(&registry),
                Arc::clone(&host),
                Arc::clone(&backend),
                Arc::clone(&macro_engine),
                service_factory,
                merged,
                config.user_argv.clone(),
            );
            let handle = Arc::new(Mutex::new(orchestrator));
            VariantOrchestrator::attach_to(&handle, &config_channel);
            variants.insert(name.clone(), handle);
        }

        Ok(Self { variants, config_channel, reporter: Reporter::new(atty_is_tty()), cwd })
    }

    /// Runs `build()` on every variant once, reporting diagnostics. Returns
    /// `true` if every variant built without fatal errors.
    pub async fn build_all(&self) -> anyhow::Result<bool> {
        let mut all_ok = true;
        for (name, handle) in &self.variants {
            let outcome = {
                let mut orchestrator = handle.lock().expect("VariantOrchestrator mutex poisoned");
                orchestrator.build().await
            };
            match outcome {
                Ok(outcome) => {
                    if !outcome.warnings.is_empty() {
                        println!("{}", self.reporter.render(&outcome.warnings));
                    }
                    if outcome.has_errors() {
                        println!("{}", self.reporter.render(&outcome.errors));
                        all_ok = false;
                    } else {
                        info!(variant = %name, "build succeeded");
                    }
                }
                Err(err) => {
                    error!(variant = %name, error = %err, "build failed");
                    all_ok = false;
                }
            }
        }
        Ok(all_ok)
    }

    /// Watches the current directory for changes and rebuilds affected
    /// variants after a quiet period, never starting a second build on a
    /// variant whose previous one hasn't resolved yet.
    pub async fn watch(&self) -> anyhow::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })?;
        watcher.watch(&self.cwd, RecursiveMode::Recursive)?;

        let explicit: Option<FxHashSet<PathBuf>> = None;
        let exclude_dirs = self.output_dirs();
        let filter = WatchFilter::new(explicit, exclude_dirs, None);
        let mut debouncer = Debouncer::new(DEBOUNCE_DELAY);

        info!("watching for changes; press ctrl-c to exit");
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let now = Instant::now();
                    for path in event.paths {
                        if filter.should_record(&path) {
                            debouncer.record_at(now, path);
                        }
                    }
                }
                () = tokio::time::sleep(Duration::from_millis(50)) => {}
            }

            if let Some(changed) = debouncer.flush_ready(Instant::now()) {
                info!(count = changed.len(), "rebuilding after file change");
                if let Err(err) = self.build_all().await {
                    warn!(error = %err, "rebuild failed");
                }
            }
        }
        Ok(())
    }

    /// Pushes a full config replacement through the shared channel; every
    /// attached variant re-derives its merged config via `select()`.
    pub fn push_config(&self, config: BuildConfig) -> Result<(), String> {
        self.config_channel.next(config)
    }

    fn output_dirs(&self) -> Vec<PathBuf> {
        let config = self.config_channel.value();
        config
            .variants
            .values()
            .map(|variant| self.cwd.join(&variant.esbuild.outdir))
            .collect()
    }
}

fn atty_is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}
