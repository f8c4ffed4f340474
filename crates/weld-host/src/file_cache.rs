//! Mtime-gated content snapshots keyed by normalized absolute path.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::resolve::normalize_abs_path;

/// A versioned, immutable view of a file's textual contents at a known
/// mtime. `version > 0` with `content.is_none()` means the file was tracked
/// and then became unreadable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    pub version: u32,
    pub mtime: u64,
    pub content: Option<String>,
}

impl FileSnapshot {
    fn zero() -> Self {
        Self { version: 0, mtime: 0, content: None }
    }
}

fn mtime_as_u64(mtime: SystemTime) -> u64 {
    mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// The exclusive owner of all [`FileSnapshot`]s. `resolve` is memoized by the
/// raw input string (first call wins); all other state is keyed by the
/// resolved absolute path.
#[derive(Default)]
pub struct FileCache {
    snapshots: FxHashMap<PathBuf, FileSnapshot>,
    resolved: HashMap<String, PathBuf>,
    /// Test/diagnostic hook: counts actual filesystem reads performed by
    /// `touch`, so the "no re-read when mtime is unchanged" property can be
    /// verified without mocking the filesystem.
    read_count: u64,
}

impl FileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `path` to an absolute, forward-slash form. Idempotent;
    /// cached by the input string.
    pub fn resolve(&mut self, path: impl AsRef<Path>) -> PathBuf {
        let key = path.as_ref().to_string_lossy().into_owned();
        if let Some(existing) = self.resolved.get(&key) {
            return existing.clone();
        }
        let abs = normalize_abs_path(path.as_ref());
        self.resolved.insert(key, abs.clone());
        abs
    }

    /// Non-mutating lookup; does not resolve or touch.
    #[must_use]
    pub fn get_snapshot(&self, abs_path: &Path) -> Option<FileSnapshot> {
        self.snapshots.get(abs_path).cloned()
    }

    /// The hot path: resolve, stat, and read the file if its mtime changed
    /// since the last observation. Always returns an owned copy.
    pub fn touch(&mut self, path: impl AsRef<Path>) -> FileSnapshot {
        let abs = self.resolve(path);
        let previous = self.snapshots.get(&abs).cloned().unwrap_or_else(FileSnapshot::zero);

        let stat_result = std::fs::metadata(&abs).and_then(|meta| meta.modified());

        let next = match stat_result {
            Ok(observed_mtime) => {
                let observed = mtime_as_u64(observed_mtime);
                if observed == previous.mtime && previous.version > 0 {
                    trace!(path = %abs.display(), version = previous.version, "touch: unchanged mtime, skip read");
                    previous
                } else {
                    // Scoped block: the file descriptor closes on every exit
                    // path, including the early-return on error below.
                    let read_result = {
                        match std::fs::File::open(&abs) {
                            Ok(mut file) => {
                                let mut buf = String::new();
                                file.read_to_string(&mut buf).map(|_| buf)
                            }
                            Err(e) => Err(e),
                        }
                    };
                    match read_result {
                        Ok(text) => {
                            self.read_count += 1;
                            trace!(path = %abs.display(), "touch: read file");
                            FileSnapshot {
                                version: previous.version + 1,
                                mtime: observed,
                                content: if text.is_empty() { None } else { Some(text) },
                            }
                        }
                        Err(_) => self.io_failure(&previous),
                    }
                }
            }
            Err(_) => self.io_failure(&previous),
        };

        self.snapshots.insert(abs, next.clone());
        next
    }

    /// Step 5 of `touch`: on I/O failure, bump version only if the file was
    /// previously known to exist; a never-seen file stays at version 0.
    fn io_failure(&self, previous: &FileSnapshot) -> FileSnapshot {
        if previous.content.is_some() || previous.version > 0 {
            FileSnapshot { version: previous.version + 1, mtime: 0, content: None }
        } else {
            FileSnapshot::zero()
        }
    }

    /// Return the existing snapshot if present, else touch.
    pub fn get_or_touch(&mut self, path: impl AsRef<Path>) -> FileSnapshot {
        let abs = self.resolve(path.as_ref());
        if let Some(existing) = self.snapshots.get(&abs) {
            return existing.clone();
        }
        self.touch(path)
    }

    #[must_use]
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.snapshots.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.resolved.clear();
        self.read_count = 0;
    }

    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.read_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn set_mtime(path: &Path, when: SystemTime) {
        let file = std::fs::File::open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn touch_is_idempotent_without_mtime_change() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "export const a = 1;").unwrap();

        let mut cache = FileCache::new();
        let first = cache.touch(&file);
        for _ in 0..9 {
            let again = cache.touch(&file);
            assert_eq!(again.version, first.version);
        }
        assert_eq!(cache.read_count(), 1);
    }

    #[test]
    fn touch_bumps_version_on_mtime_change() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "export const a = 1;").unwrap();

        let mut cache = FileCache::new();
        let first = cache.touch(&file);
        assert_eq!(first.version, 1);

        set_mtime(&file, UNIX_EPOCH + Duration::from_secs(1_000_000));
        fs::write(&file, "export const a = 2;").unwrap();
        let second = cache.touch(&file);
        assert!(second.version > first.version);
        assert_eq!(cache.read_count(), 2);
    }

    #[test]
    fn never_seen_missing_file_stays_at_version_zero() {
        let mut cache = FileCache::new();
        let snap = cache.touch("/does/not/exist.ts");
        assert_eq!(snap.version, 0);
        assert!(snap.content.is_none());
    }

    #[test]
    fn previously_tracked_file_becoming_unreadable_bumps_version() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "export const a = 1;").unwrap();

        let mut cache = FileCache::new();
        let first = cache.touch(&file);
        assert_eq!(first.version, 1);

        fs::remove_file(&file).unwrap();
        let second = cache.touch(&file);
        assert_eq!(second.version, first.version + 1);
        assert_eq!(second.mtime, 0);
        assert!(second.content.is_none());
    }

    #[test]
    fn empty_file_has_no_content_but_version_one() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("empty.ts");
        fs::write(&file, "").unwrap();

        let mut cache = FileCache::new();
        let snap = cache.touch(&file);
        assert_eq!(snap.version, 1);
        assert!(snap.content.is_none());
    }

    #[test]
    fn single_character_file_has_length_one_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("one.ts");
        fs::write(&file, "x").unwrap();

        let mut cache = FileCache::new();
        let snap = cache.touch(&file);
        assert_eq!(snap.content.as_deref().map(str::len), Some(1));
    }

    #[test]
    fn get_or_touch_reuses_existing_snapshot() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "export const a = 1;").unwrap();

        let mut cache = FileCache::new();
        let first = cache.get_or_touch(&file);
        assert_eq!(cache.read_count(), 1);
        let second = cache.get_or_touch(&file);
        assert_eq!(first.version, second.version);
        assert_eq!(cache.read_count(), 1);
    }
}
