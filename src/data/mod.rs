//! Data retrieval.
//!
//! - `source`: HTTP / file sources and the ordered fallback chain
//! - `cache`: TTL cache that owns the sources and the parsed catalog

pub mod cache;
pub mod source;

pub use cache::*;
pub use source::*;
