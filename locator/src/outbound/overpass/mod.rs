//! Overpass outbound adapters.
//!
//! This module provides a thin HTTP implementation of the `OverpassSource`
//! port.

mod http_source;

pub use http_source::{DEFAULT_REQUEST_TIMEOUT, OverpassHttpSource};
