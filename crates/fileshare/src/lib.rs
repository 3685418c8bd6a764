//! HTTP front end for a [`pathindex::PathIndex`]: directory listings
//! annotated with short codes, short link resolution and file streaming.

pub mod config;
pub mod listing;
pub mod server;

pub use crate::config::{ConfigError, ServerConfig};
pub use crate::listing::{list_directory, EntryKind, Listing, ListingEntry};
pub use crate::server::{Server, ServerError};
