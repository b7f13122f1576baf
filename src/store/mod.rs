//! Object store contract and the filesystem-backed implementation
//!
//! The core only depends on [`ObjectStore`]; [`FsObjectStore`] is the store the
//! binary runs against.

mod client;
mod fs;

pub use client::{ObjectStore, StoredObject};
pub use fs::{FsObjectStore, SignedUrlConfig};
