//! Place geocoding adapters.

mod dto;
mod nominatim;

pub use nominatim::{DEFAULT_NOMINATIM_URL, NominatimGeocoder, NominatimIdentity};
