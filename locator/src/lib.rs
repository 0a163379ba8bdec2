//! Transit stop locator library.
//!
//! Resilient Overpass acquisition with caching, single-flight viewport
//! loading, and a background region crawl feeding a searchable index.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
