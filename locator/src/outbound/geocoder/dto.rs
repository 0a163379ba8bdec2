//! DTOs for decoding Nominatim search responses.
//!
//! Nominatim returns coordinates as strings; they are parsed into a
//! [`GeoPoint`] in one pass.

use serde::Deserialize;

use crate::domain::ports::GeoPoint;

#[derive(Debug, Deserialize)]
pub(super) struct PlaceDto {
    pub(super) lat: String,
    pub(super) lon: String,
}

impl PlaceDto {
    pub(super) fn into_point(self) -> Result<GeoPoint, String> {
        let lat = parse_coordinate("lat", &self.lat)?;
        let lng = parse_coordinate("lon", &self.lon)?;
        Ok(GeoPoint { lat, lng })
    }
}

fn parse_coordinate(field: &str, raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("place {field} `{raw}` is not a finite number"))
}
