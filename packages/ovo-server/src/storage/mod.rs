//! The concurrent collection and its background TTL cleaner.

pub mod cleaner;
pub mod collection;

pub use cleaner::Cleaner;
pub use collection::{ConcurrentCollection, DashMapCollection};
