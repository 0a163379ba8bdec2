//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **overpass**: reqwest POST client for Overpass mirrors
//! - **cache**: capability-scoped filesystem tier for the query cache
//! - **geocoder**: reqwest client for Nominatim place search
//! - **notices**: tracing-backed notice sink
//!
//! Adapters are thin translators between domain types and transport
//! representations. They contain no retry or caching policy.

pub mod cache;
pub mod geocoder;
pub mod notices;
pub mod overpass;
