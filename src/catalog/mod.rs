//! Client-side view of the object store
//!
//! The catalog is rebuilt from the store on every refresh; entries only
//! disappear after the store confirms a deletion.

mod catalog;
mod resolver;
mod stats;

pub use catalog::FileCatalog;
pub use resolver::{AllOrNothingResolver, UrlResolver};
pub use stats::{CatalogEntry, CatalogStats};
