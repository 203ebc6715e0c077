//! API Module
//!
//! HTTP surface of the gateway: the inventory read endpoint, the cache
//! administration endpoint and liveness/readiness probes.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
