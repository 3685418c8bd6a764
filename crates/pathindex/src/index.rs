//! The path index: a write-through cache of the snapshot file mapping
//! relative path keys to short codes and back.
//!
//! All operations take the same mutex. Mutating operations persist the full
//! snapshot before releasing it, so two workers can never both decide to
//! insert the same path and a prune cannot interleave with a registration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::code::{fingerprint, Fingerprinter, ShortCode};
use crate::error::Result;
use crate::relpath::relative_key;
use crate::snapshot::{load_snapshot, write_snapshot, Snapshot};

/// Outcome of registering a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Code assigned to `path`.
    pub code: ShortCode,
    /// Key the code is stored under. Differs from `requested` when the
    /// fingerprint of `requested` collided with another entry.
    pub path: String,
    /// Path the caller asked for.
    pub requested: String,
    /// Whether collision disambiguation produced `path`.
    pub disambiguated: bool,
}

/// Point-in-time view of the index for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub entries: usize,
    pub aliases: usize,
    pub snapshot_path: PathBuf,
    /// Error from the most recent failed save, cleared by the next success.
    pub last_save_error: Option<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    maps: Snapshot,
    /// Stored key -> requested path, the inverse of `maps.aliases`.
    targets: HashMap<String, String>,
    last_save_error: Option<String>,
}

impl IndexState {
    fn new(maps: Snapshot) -> Self {
        let targets = maps
            .aliases
            .iter()
            .map(|(requested, stored)| (stored.clone(), requested.clone()))
            .collect();
        Self {
            maps,
            targets,
            last_save_error: None,
        }
    }

    /// Requested path behind a stored key, or the key itself.
    fn target_of<'a>(&'a self, stored: &'a str) -> &'a str {
        self.targets.get(stored).map_or(stored, String::as_str)
    }
}

/// Bidirectional path/short-code index shared by all request handlers.
#[derive(Debug)]
pub struct PathIndex {
    base: PathBuf,
    snapshot_path: PathBuf,
    fingerprint: Fingerprinter,
    state: Mutex<IndexState>,
}

impl PathIndex {
    /// Opens the index for `base`, loading `snapshot_path` if it holds a
    /// readable snapshot. Never fails: a missing or corrupt snapshot starts
    /// an empty index.
    pub fn open(base: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let snapshot_path = snapshot_path.into();
        let maps = load_snapshot(&snapshot_path).unwrap_or_default();
        log::info!(
            "path index for {} opened with {} entries from {}",
            base.display(),
            maps.file_map.len(),
            snapshot_path.display()
        );
        Self {
            base,
            snapshot_path,
            fingerprint,
            state: Mutex::new(IndexState::new(maps)),
        }
    }

    /// Replaces the fingerprint function used for new registrations.
    pub fn with_fingerprinter(mut self, fingerprint: Fingerprinter) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Returns the code for `path`, registering it if needed.
    pub fn code_for(&self, path: &str) -> ShortCode {
        self.register(path).code
    }

    /// Returns the code for an absolute path under the base directory.
    pub fn code_for_path(&self, full: &Path) -> Result<ShortCode> {
        let key = relative_key(&self.base, full)?;
        Ok(self.code_for(&key))
    }

    /// Registers `path` and reports which key the code was stored under.
    ///
    /// Already-known paths (including paths that were disambiguated on an
    /// earlier call) return their existing code without touching the
    /// snapshot. A new path whose fingerprint is taken by a different key
    /// gets `_<entry count>` appended and is fingerprinted again until a
    /// free code turns up. A suffixed key is never one that names another
    /// path, whether indexed or present on disk.
    pub fn register(&self, path: &str) -> Registration {
        let mut state = self.state.lock();

        // A stored key held for another requested path is not `path`'s entry.
        let owned = !state.targets.contains_key(path);
        if let Some(code) = state.maps.path_map.get(path).filter(|_| owned) {
            return Registration {
                code: code.clone(),
                path: path.to_string(),
                requested: path.to_string(),
                disambiguated: false,
            };
        }
        if let Some(stored) = state.maps.aliases.get(path) {
            if let Some(code) = state.maps.path_map.get(stored) {
                return Registration {
                    code: code.clone(),
                    path: stored.clone(),
                    requested: path.to_string(),
                    disambiguated: true,
                };
            }
        }

        let mut candidate = path.to_string();
        let code = loop {
            let code = (self.fingerprint)(&candidate);
            let taken = state.maps.file_map.contains_key(&code)
                || state.maps.path_map.contains_key(&candidate)
                || (candidate != path
                    && (state.maps.aliases.contains_key(&candidate)
                        || self.base.join(&candidate).exists()));
            if !taken {
                break code;
            }
            log::debug!("short code {code} for {candidate} is taken; disambiguating");
            candidate = format!("{candidate}_{}", state.maps.file_map.len());
        };

        state.maps.file_map.insert(code.clone(), candidate.clone());
        state.maps.path_map.insert(candidate.clone(), code.clone());
        let disambiguated = candidate != path;
        if disambiguated {
            state
                .maps
                .aliases
                .insert(path.to_string(), candidate.clone());
            state.targets.insert(candidate.clone(), path.to_string());
        }
        self.persist(&mut state);

        Registration {
            code,
            path: candidate,
            requested: path.to_string(),
            disambiguated,
        }
    }

    /// Returns the key stored under `code`.
    pub fn path_for(&self, code: &ShortCode) -> Option<String> {
        self.state.lock().maps.file_map.get(code).cloned()
    }

    /// Returns the on-disk relative path `code` stands for.
    ///
    /// This equals [`path_for`](Self::path_for) except for disambiguated
    /// entries, where it is the path originally requested.
    pub fn target_for(&self, code: &ShortCode) -> Option<String> {
        let state = self.state.lock();
        let stored = state.maps.file_map.get(code)?;
        Some(state.target_of(stored).to_string())
    }

    /// Removes entries whose target no longer exists under the base
    /// directory. Returns the number of removed entries.
    pub fn prune_stale(&self) -> usize {
        let base = self.base.clone();
        self.prune_stale_with(|target| base.join(target).exists())
    }

    /// Removes entries whose target fails `exists`, persisting the index if
    /// anything was removed.
    pub fn prune_stale_with<F>(&self, mut exists: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let stale: Vec<(ShortCode, String)> = state
            .maps
            .file_map
            .iter()
            .filter(|(_, stored)| !exists(state.target_of(stored)))
            .map(|(code, stored)| (code.clone(), stored.clone()))
            .collect();
        if stale.is_empty() {
            return 0;
        }

        for (code, stored) in &stale {
            state.maps.file_map.remove(code);
            state.maps.path_map.remove(stored);
            if let Some(requested) = state.targets.remove(stored) {
                state.maps.aliases.remove(&requested);
            }
        }

        log::info!("pruned {} stale index entries", stale.len());
        self.persist(state);
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().maps.file_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.state.lock();
        IndexStatus {
            entries: state.maps.file_map.len(),
            aliases: state.maps.aliases.len(),
            snapshot_path: self.snapshot_path.clone(),
            last_save_error: state.last_save_error.clone(),
        }
    }

    /// Copy of the current maps, as they would be written to disk.
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().maps.clone()
    }

    /// Writes the snapshot while the caller still holds the lock. Failures
    /// are logged and recorded; the in-memory maps stay authoritative.
    fn persist(&self, state: &mut IndexState) {
        match write_snapshot(&self.snapshot_path, &state.maps) {
            Ok(()) => state.last_save_error = None,
            Err(error) => {
                log::warn!(
                    "failed to save index snapshot to {}: {}",
                    self.snapshot_path.display(),
                    error
                );
                state.last_save_error = Some(error.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SNAPSHOT_FILE_NAME;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const FIXED: &str = "0000000000000000";

    /// Every unsuffixed path fingerprints to the same code.
    fn colliding(path: &str) -> ShortCode {
        if path.contains('_') {
            fingerprint(path)
        } else {
            ShortCode::parse(FIXED).unwrap()
        }
    }

    fn open(dir: &TempDir) -> PathIndex {
        PathIndex::open(dir.path(), dir.path().join(SNAPSHOT_FILE_NAME))
    }

    fn touch(dir: &TempDir, rel: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn code_for_registers_and_resolves() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);

        let code = index.code_for("docs/report.pdf");
        assert_eq!(code, fingerprint("docs/report.pdf"));
        assert_eq!(index.path_for(&code).as_deref(), Some("docs/report.pdf"));
        assert_eq!(index.target_for(&code).as_deref(), Some("docs/report.pdf"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn code_for_is_idempotent_and_skips_saving() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        let first = index.code_for("a.txt");

        fs::remove_file(index.snapshot_path()).expect("remove snapshot");
        let second = index.code_for("a.txt");

        assert_eq!(first, second);
        assert!(!index.snapshot_path().exists());
    }

    #[test]
    fn every_registration_is_durable() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        let code = index.code_for("music/track.flac");

        let reopened = open(&dir);
        assert_eq!(
            reopened.path_for(&code).as_deref(),
            Some("music/track.flac")
        );
    }

    #[test]
    fn snapshot_round_trip_reproduces_pairs() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir).with_fingerprinter(colliding);
        for path in ["a", "b", "c/d", "e f.txt"] {
            index.code_for(path);
        }

        let reopened = open(&dir);
        assert_eq!(reopened.snapshot(), index.snapshot());
    }

    #[test]
    fn distinct_paths_get_distinct_codes() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        let paths: Vec<String> = (0..200).map(|i| format!("dir{}/file{i}.bin", i % 7)).collect();

        let codes: HashSet<ShortCode> = paths.iter().map(|p| index.code_for(p)).collect();
        assert_eq!(codes.len(), paths.len());
        for path in &paths {
            let code = index.code_for(path);
            assert_eq!(index.path_for(&code).as_deref(), Some(path.as_str()));
        }
    }

    #[test]
    fn collision_stores_second_path_under_suffixed_key() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir).with_fingerprinter(colliding);

        let first = index.register("one.txt");
        let second = index.register("two.txt");

        assert!(!first.disambiguated);
        assert_eq!(first.path, "one.txt");
        assert!(second.disambiguated);
        assert_eq!(second.requested, "two.txt");
        assert_eq!(second.path, "two.txt_1");
        assert_ne!(first.code, second.code);

        assert_eq!(index.path_for(&first.code).as_deref(), Some("one.txt"));
        assert_eq!(index.path_for(&second.code).as_deref(), Some("two.txt_1"));
        assert_eq!(index.target_for(&second.code).as_deref(), Some("two.txt"));
    }

    #[test]
    fn real_path_equal_to_suffixed_key_gets_its_own_code() {
        let dir = tempdir().expect("tempdir");
        touch(&dir, "one.txt");
        touch(&dir, "two.txt");
        let index = open(&dir).with_fingerprinter(colliding);
        index.code_for("one.txt");
        let second = index.register("two.txt");
        assert_eq!(second.path, "two.txt_1");
        touch(&dir, "two.txt_1");

        let real = index.register("two.txt_1");
        assert_ne!(real.code, second.code);
        assert!(real.disambiguated);
        assert_eq!(index.target_for(&real.code).as_deref(), Some("two.txt_1"));
        assert_eq!(index.target_for(&second.code).as_deref(), Some("two.txt"));
        assert_eq!(index.code_for("two.txt_1"), real.code);
        assert_eq!(index.prune_stale(), 0);

        let reopened = open(&dir).with_fingerprinter(colliding);
        assert_eq!(reopened.code_for("two.txt_1"), real.code);
        assert_eq!(reopened.code_for("two.txt"), second.code);
    }

    #[test]
    fn suffixed_key_skips_names_present_on_disk() {
        let dir = tempdir().expect("tempdir");
        touch(&dir, "two.txt_1");
        let index = open(&dir).with_fingerprinter(colliding);
        index.code_for("one.txt");

        let second = index.register("two.txt");
        assert!(second.disambiguated);
        assert_ne!(second.path, "two.txt_1");

        let real = index.register("two.txt_1");
        assert!(!real.disambiguated);
        assert_ne!(real.code, second.code);
        assert_eq!(index.path_for(&real.code).as_deref(), Some("two.txt_1"));
    }

    #[test]
    fn disambiguated_path_keeps_its_code() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir).with_fingerprinter(colliding);
        index.code_for("one.txt");
        let second = index.code_for("two.txt");

        assert_eq!(index.code_for("two.txt"), second);
        assert_eq!(index.len(), 2);

        let reopened = open(&dir).with_fingerprinter(colliding);
        assert_eq!(reopened.code_for("two.txt"), second);
    }

    #[test]
    fn prune_removes_vanished_entries() {
        let dir = tempdir().expect("tempdir");
        touch(&dir, "docs/report.pdf");
        touch(&dir, "keep.txt");
        let index = open(&dir);
        let gone = index.code_for("docs/report.pdf");
        let kept = index.code_for("keep.txt");

        fs::remove_file(dir.path().join("docs/report.pdf")).unwrap();
        assert_eq!(index.prune_stale(), 1);

        assert!(index.path_for(&gone).is_none());
        assert_eq!(index.path_for(&kept).as_deref(), Some("keep.txt"));
        assert!(!index.snapshot().path_map.contains_key("docs/report.pdf"));
        assert!(open(&dir).path_for(&gone).is_none());
    }

    #[test]
    fn prune_without_changes_does_not_save() {
        let dir = tempdir().expect("tempdir");
        touch(&dir, "keep.txt");
        let index = open(&dir);
        index.code_for("keep.txt");
        fs::remove_file(index.snapshot_path()).unwrap();

        assert_eq!(index.prune_stale(), 0);
        assert!(!index.snapshot_path().exists());
    }

    #[test]
    fn prune_checks_requested_path_of_disambiguated_entries() {
        let dir = tempdir().expect("tempdir");
        touch(&dir, "one.txt");
        touch(&dir, "two.txt");
        let index = open(&dir).with_fingerprinter(colliding);
        index.code_for("one.txt");
        let second = index.code_for("two.txt");

        assert_eq!(index.prune_stale(), 0);
        assert_eq!(index.target_for(&second).as_deref(), Some("two.txt"));

        fs::remove_file(dir.path().join("two.txt")).unwrap();
        assert_eq!(index.prune_stale(), 1);
        assert!(index.path_for(&second).is_none());
        assert_eq!(index.status().aliases, 0);
    }

    #[test]
    fn prune_with_external_check() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        index.code_for("a");
        index.code_for("b");
        index.code_for("c");

        let removed = index.prune_stale_with(|target| target == "b");
        assert_eq!(removed, 2);
        assert_eq!(index.len(), 1);
        assert!(index.snapshot().is_consistent());
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"not json").unwrap();
        let index = open(&dir);
        assert!(index.is_empty());

        index.code_for("fresh.txt");
        assert_eq!(open(&dir).len(), 1);
    }

    #[test]
    fn deleted_snapshot_is_recreated_on_next_mutation() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        let known = index.code_for("known.txt");
        fs::remove_file(index.snapshot_path()).unwrap();

        assert_eq!(index.code_for("known.txt"), known);
        index.code_for("new.txt");

        let reopened = open(&dir);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.code_for("known.txt"), known);
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let index = PathIndex::open(dir.path(), blocker.join(SNAPSHOT_FILE_NAME));

        let code = index.code_for("a.txt");
        assert_eq!(index.path_for(&code).as_deref(), Some("a.txt"));
        assert!(index.status().last_save_error.is_some());
    }

    #[test]
    fn code_for_path_uses_relative_key() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);
        let code = index
            .code_for_path(&dir.path().join("sub").join("x.txt"))
            .expect("code");
        assert_eq!(index.path_for(&code).as_deref(), Some("sub/x.txt"));
        assert!(index.code_for_path(Path::new("/elsewhere/x.txt")).is_err());
    }

    #[test]
    fn concurrent_registration_of_same_path_inserts_once() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);

        let codes: Vec<ShortCode> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| index.code_for("shared/path.txt")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(codes.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn concurrent_registration_and_prune_stay_consistent() {
        let dir = tempdir().expect("tempdir");
        let index = open(&dir);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let index = &index;
                scope.spawn(move || {
                    for i in 0..25 {
                        index.code_for(&format!("w{worker}/f{i}"));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..10 {
                    index.prune_stale_with(|target| !target.ends_with('3'));
                }
            });
        });

        let snapshot = index.snapshot();
        assert!(snapshot.is_consistent());
        assert_eq!(open(&dir).snapshot(), snapshot);
    }
}
