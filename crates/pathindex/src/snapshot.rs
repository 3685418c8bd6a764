//! Snapshot persistence - whole-index read/write.
//!
//! The snapshot is a single pretty-printed JSON document holding both
//! directions of the mapping. Every save rewrites the whole document through
//! a temp file in the same directory followed by an atomic rename, so a
//! reader sees either the previous snapshot or the new one, never a torn
//! write.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::code::ShortCode;
use crate::error::{IndexError, Result};

/// Default snapshot file name inside the index directory.
pub const SNAPSHOT_FILE_NAME: &str = ".file_index.json";

/// Whether `candidate` is the snapshot at `snapshot` or one of the temp files
/// written next to it during a save.
pub fn is_snapshot_file(snapshot: &Path, candidate: &Path) -> bool {
    if candidate == snapshot {
        return true;
    }
    let (Some(name), Some(candidate_name)) = (
        snapshot.file_name().and_then(|name| name.to_str()),
        candidate.file_name().and_then(|name| name.to_str()),
    ) else {
        return false;
    };
    candidate.parent() == snapshot.parent() && candidate_name.starts_with(name)
}

// ---------------------------------------------------------------------------
// Persistent format
// ---------------------------------------------------------------------------

/// Serialized form of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Short code -> stored path key.
    #[serde(default)]
    pub file_map: BTreeMap<ShortCode, String>,
    /// Stored path key -> short code.
    #[serde(default)]
    pub path_map: BTreeMap<String, ShortCode>,
    /// Requested path -> disambiguated path key it was stored under.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
}

impl Snapshot {
    /// Whether `file_map` and `path_map` are exact inverses.
    pub fn is_consistent(&self) -> bool {
        self.file_map.len() == self.path_map.len()
            && self
                .file_map
                .iter()
                .all(|(code, path)| self.path_map.get(path) == Some(code))
    }

    /// Rebuilds `path_map` from `file_map`, which is treated as authoritative.
    ///
    /// When two codes claim the same path only the first (in code order) is
    /// kept. Aliases pointing at dropped keys are removed.
    fn repair(&mut self) {
        let mut path_map: BTreeMap<String, ShortCode> = BTreeMap::new();
        self.file_map.retain(|code, path| {
            if path_map.contains_key(path.as_str()) {
                return false;
            }
            path_map.insert(path.clone(), code.clone());
            true
        });
        self.path_map = path_map;
        let path_map = &self.path_map;
        self.aliases
            .retain(|_, stored| path_map.contains_key(stored.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

/// Loads the snapshot at `path`.
///
/// A missing, unreadable or malformed file yields `None`; the caller starts
/// with an empty index. Inconsistent maps are repaired rather than rejected.
pub fn load_snapshot(path: &Path) -> Option<Snapshot> {
    let input = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            log::debug!("no index snapshot at {}", path.display());
            return None;
        }
        Err(error) => {
            log::warn!("index snapshot read failed for {}: {}", path.display(), error);
            return None;
        }
    };

    let mut snapshot: Snapshot = match serde_json::from_reader(BufReader::new(input)) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            log::warn!(
                "index snapshot decode failed for {}: {}",
                path.display(),
                error
            );
            return None;
        }
    };

    if !snapshot.is_consistent() {
        log::warn!(
            "index snapshot {} has mismatched maps ({} codes, {} paths); rebuilding path map",
            path.display(),
            snapshot.file_map.len(),
            snapshot.path_map.len()
        );
        snapshot.repair();
    }

    log::debug!(
        "loaded index snapshot from {} ({} entries)",
        path.display(),
        snapshot.file_map.len()
    );

    Some(snapshot)
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

/// Writes `snapshot` to `path`, replacing any previous file atomically.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Temp names start with the snapshot name so listings can hide them.
    let prefix = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| SNAPSHOT_FILE_NAME.into());
    let tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    {
        let mut output = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut output, snapshot)
            .map_err(|error| IndexError::Serialization(error.to_string()))?;
        output.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|error| IndexError::Io(error.error))?;

    log::debug!(
        "wrote index snapshot to {} ({} entries)",
        path.display(),
        snapshot.file_map.len()
    );

    Ok(())
}
