//! Persistent bidirectional index between relative paths and short codes.
//!
//! This crate provides the state behind short links into a served directory:
//! - Deterministic fixed-width short codes derived from path keys
//! - A mutex-guarded code <-> path map with collision disambiguation
//! - Lazy pruning of entries whose files have vanished
//! - Whole-snapshot JSON persistence with atomic replace

pub mod code;
pub mod error;
pub mod index;
pub mod relpath;
pub mod snapshot;

// Re-export main types
pub use code::{fingerprint, Fingerprinter, InvalidShortCode, ShortCode, CODE_LEN};
pub use error::{IndexError, Result};
pub use index::{IndexStatus, PathIndex, Registration};
pub use relpath::{relative_key, resolve_under};
pub use snapshot::{
    is_snapshot_file, load_snapshot, write_snapshot, Snapshot, SNAPSHOT_FILE_NAME,
};
