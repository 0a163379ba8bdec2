//! Driven port for free-text place lookup.
//!
//! Used only as a search fallback when no indexed stop matches.

use async_trait::async_trait;

use super::define_port_error;

/// WGS84 point returned by a place lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

define_port_error! {
    /// Errors surfaced by place lookup adapters.
    pub enum PlaceGeocoderError {
        /// Network transport failed or the service answered with an error.
        Unavailable { message: String } => "place lookup unavailable: {message}",
        /// The response could not be decoded into coordinates.
        Decode { message: String } => "place lookup response invalid: {message}",
    }
}

/// Port resolving free text to the single best matching point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaceGeocoder: Send + Sync {
    /// Resolve `text`, returning `None` when nothing matches.
    async fn locate(&self, text: &str) -> Result<Option<GeoPoint>, PlaceGeocoderError>;
}
