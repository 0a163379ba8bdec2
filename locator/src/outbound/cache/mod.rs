//! Durable cache tier adapters.

mod fs_tier;

pub use fs_tier::FsCacheTier;
