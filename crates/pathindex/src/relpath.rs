//! Conversion between absolute paths under the served directory and the
//! forward-slash keys stored in the index.

use std::path::{Component, Path, PathBuf};

use crate::error::{IndexError, Result};

/// Returns the index key for `full`, which must live under `base`.
///
/// Segments are joined with `/` regardless of platform and keep their case.
/// The base directory itself maps to the empty string. Segments that are not
/// valid UTF-8 have no key.
pub fn relative_key(base: &Path, full: &Path) -> Result<String> {
    let stripped = full
        .strip_prefix(base)
        .map_err(|_| IndexError::OutsideBase(full.to_path_buf()))?;

    let mut segments = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) => segments.push(segment),
                None => return Err(IndexError::NonUtf8(full.to_path_buf())),
            },
            Component::CurDir => {}
            _ => return Err(IndexError::OutsideBase(full.to_path_buf())),
        }
    }
    Ok(segments.join("/"))
}

/// Joins a client-supplied relative path onto `base`.
///
/// Rejects parent, root and prefix components so the result can never point
/// outside `base`. Empty input resolves to `base`.
pub fn resolve_under(base: &Path, rel: &str) -> Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(IndexError::Traversal(rel.to_string()));
            }
        }
    }
    Ok(resolved)
}
