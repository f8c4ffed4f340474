//! Watch-mode primitives: event coalescing and a path filter deciding
//! which filesystem events are worth waking the build for.
//!
//! Neither primitive talks to `notify` directly — [`Driver`](crate::driver::Driver)
//! owns the actual watcher and feeds raw paths through these two.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

/// Coalesces a burst of change events into one flush, resetting its timer
/// on every new event (SPEC_FULL.md §5 "the watch loop avoids starting a
/// new build ... until the previous one resolves" — debouncing is the first
/// half of that; the driver's own in-flight check is the second).
pub struct Debouncer {
    delay: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: FxHashSet::default(), last_event: None }
    }

    pub fn record_at(&mut self, now: Instant, path: PathBuf) {
        self.pending.insert(path);
        self.last_event = Some(now);
    }

    /// Returns the accumulated path set once `delay` has elapsed since the
    /// last recorded event, draining and resetting the debouncer. Returns
    /// `None` while still within the quiet period, or with nothing pending.
    pub fn flush_ready(&mut self, now: Instant) -> Option<FxHashSet<PathBuf>> {
        let last = self.last_event?;
        if self.pending.is_empty() || now < last + self.delay {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending))
    }
}

/// Decides whether a raw filesystem event path is worth recording into the
/// [`Debouncer`]: output directories, `node_modules`, and this crate's own
/// last-emitted declaration files are never interesting; everything else is
/// gated by an optional explicit allow-list and the resolved tsconfig path.
pub struct WatchFilter {
    explicit: Option<FxHashSet<PathBuf>>,
    exclude_dirs: Vec<PathBuf>,
    project_config: Option<PathBuf>,
    last_emitted: FxHashSet<PathBuf>,
}

impl WatchFilter {
    #[must_use]
    pub fn new(explicit: Option<FxHashSet<PathBuf>>, exclude_dirs: Vec<PathBuf>, project_config: Option<PathBuf>) -> Self {
        Self { explicit, exclude_dirs, project_config, last_emitted: FxHashSet::default() }
    }

    pub fn set_last_emitted(&mut self, paths: Vec<PathBuf>) {
        self.last_emitted = paths.into_iter().collect();
    }

    #[must_use]
    pub fn should_record(&self, path: &Path) -> bool {
        if self.last_emitted.contains(path) {
            return false;
        }
        if self.is_excluded(path) {
            return false;
        }
        if is_named_tsconfig(path) {
            return match &self.project_config {
                Some(configured) => path == configured,
                None => true,
            };
        }
        match &self.explicit {
            Some(allowed) => allowed.contains(path),
            None => true,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            return true;
        }
        self.exclude_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

fn is_named_tsconfig(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some("tsconfig.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_flushes_after_delay() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let now = Instant::now();

        debouncer.record_at(now, PathBuf::from("src/a.ts"));
        assert!(debouncer.flush_ready(now + Duration::from_millis(99)).is_none());

        let flushed = debouncer.flush_ready(now + Duration::from_millis(101)).expect("should flush after delay");
        assert_eq!(flushed.len(), 1);
        assert!(flushed.contains(&PathBuf::from("src/a.ts")));
    }

    #[test]
    fn debouncer_resets_timer_on_new_event() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let now = Instant::now();

        debouncer.record_at(now, PathBuf::from("src/a.ts"));
        debouncer.record_at(now + Duration::from_millis(50), PathBuf::from("src/b.ts"));

        assert!(debouncer.flush_ready(now + Duration::from_millis(120)).is_none());

        let flushed = debouncer.flush_ready(now + Duration::from_millis(160)).expect("should flush after last event delay");
        assert_eq!(flushed.len(), 2);
    }

    #[test]
    fn watch_filter_ignores_outputs_and_excludes() {
        let base_dir = PathBuf::from("/project");
        let out_dir = base_dir.join("dist");

        let explicit = base_dir.join("src/index.ts");
        let other = base_dir.join("src/other.ts");
        let node_module = base_dir.join("node_modules/pkg/index.ts");
        let output_js = out_dir.join("index.js");
        let tsconfig = base_dir.join("tsconfig.json");

        let mut explicit_set = FxHashSet::default();
        explicit_set.insert(explicit.clone());

        let filter = WatchFilter::new(Some(explicit_set), vec![out_dir], None);

        assert!(filter.should_record(&explicit));
        assert!(!filter.should_record(&other));
        assert!(!filter.should_record(&node_module));
        assert!(!filter.should_record(&output_js));
        assert!(filter.should_record(&tsconfig));
    }

    #[test]
    fn watch_filter_respects_emitted_files() {
        let emitted = PathBuf::from("/project/types/index.d.ts");
        let mut filter = WatchFilter::new(None, Vec::new(), None);
        filter.set_last_emitted(vec![emitted.clone()]);
        assert!(!filter.should_record(&emitted));
    }

    #[test]
    fn watch_filter_records_project_config() {
        let config = PathBuf::from("/project/configs/tsconfig.build.json");
        let other_config = PathBuf::from("/project/tsconfig.json");

        let filter = WatchFilter::new(None, Vec::new(), Some(config.clone()));

        assert!(filter.should_record(&config));
        assert!(!filter.should_record(&other_config));
    }
}
