//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_key;
mod durable_cache_tier;
mod notice_sink;
mod overpass_source;
mod place_geocoder;

pub use cache_key::{CACHE_KEY_NAMESPACE, QueryCacheKey};
#[cfg(test)]
pub use durable_cache_tier::MockDurableCacheTier;
pub use durable_cache_tier::{CachedPayload, DurableCacheError, DurableCacheTier};
#[cfg(test)]
pub use notice_sink::MockNoticeSink;
pub use notice_sink::{Notice, NoticeSink};
#[cfg(test)]
pub use overpass_source::MockOverpassSource;
pub use overpass_source::{OverpassSource, OverpassSourceError};
#[cfg(test)]
pub use place_geocoder::MockPlaceGeocoder;
pub use place_geocoder::{GeoPoint, PlaceGeocoder, PlaceGeocoderError};
