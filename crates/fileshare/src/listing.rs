//! Directory listings annotated with short codes.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use pathindex::{
    is_snapshot_file, relative_key, resolve_under, IndexError, PathIndex, ShortCode,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// One row of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Lowercased extension including the dot; empty for folders.
    pub extension: String,
    /// Path relative to the served directory.
    pub path: String,
    pub short_code: ShortCode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Listed directory relative to the served directory; empty for the root.
    pub current_path: String,
    pub items: Vec<ListingEntry>,
}

/// Lists `dir` (relative to the index base) after pruning stale entries.
///
/// Folders come first, ordered by lowercase name. Files follow, grouped by
/// media category and then ordered by lowercase name. Entries whose names
/// are not valid UTF-8 are left out.
pub fn list_directory(index: &PathIndex, dir: &str) -> Result<Listing, IndexError> {
    let base = index.base();
    let full = resolve_under(base, dir)?;
    if !full.is_dir() {
        return Err(IndexError::NotFound(dir.to_string()));
    }
    let current_path = relative_key(base, &full)?;

    index.prune_stale();

    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(&full)? {
        let entry = entry?;
        let path = entry.path();
        if is_snapshot_file(index.snapshot_path(), &path) {
            continue;
        }
        let rel = match relative_key(base, &path) {
            Ok(rel) => rel,
            Err(IndexError::NonUtf8(path)) => {
                tracing::warn!("skipping entry with non UTF-8 name: {}", path.display());
                continue;
            }
            Err(error) => return Err(error),
        };
        // Follows symlinks so linked folders are browsable.
        if path.is_dir() {
            folders.push((path, rel));
        } else if path.is_file() {
            files.push((path, rel));
        }
    }

    folders.sort_by_cached_key(|(path, _)| lowercase_name(path));
    files.sort_by(|(a, _), (b, _)| compare_files(a, b));

    let mut items = Vec::with_capacity(folders.len() + files.len());
    for (path, rel) in folders {
        items.push(entry_for(index, &path, rel, EntryKind::Folder));
    }
    for (path, rel) in files {
        items.push(entry_for(index, &path, rel, EntryKind::File));
    }

    tracing::debug!(dir = %current_path, entries = items.len(), "listed directory");
    Ok(Listing {
        current_path,
        items,
    })
}

fn entry_for(index: &PathIndex, path: &Path, rel: String, kind: EntryKind) -> ListingEntry {
    let extension = match kind {
        EntryKind::Folder => String::new(),
        EntryKind::File => extension_of(path),
    };
    ListingEntry {
        name: file_name(path),
        kind,
        extension,
        short_code: index.code_for(&rel),
        path: rel,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn lowercase_name(path: &Path) -> String {
    file_name(path).to_lowercase()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn compare_files(a: &Path, b: &Path) -> Ordering {
    file_category(a)
        .cmp(&file_category(b))
        .then_with(|| lowercase_name(a).cmp(&lowercase_name(b)))
}

/// Display group for a file: video, image, audio, document, everything else.
pub fn file_category(path: &Path) -> u8 {
    let Some(mime) = mime_guess::from_path(path).first() else {
        return 6;
    };
    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("video", _) => 1,
        ("image", _) => 2,
        ("audio", _) => 3,
        ("application", "pdf")
        | ("text", "plain")
        | ("application", "vnd.openxmlformats-officedocument.wordprocessingml.document") => 4,
        _ => 6,
    }
}
