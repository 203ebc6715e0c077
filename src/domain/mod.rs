//! Domain Layer
//!
//! Port traits that separate the cache orchestration from the concrete
//! key-value store and upstream API.

pub mod ports;

pub use ports::*;
