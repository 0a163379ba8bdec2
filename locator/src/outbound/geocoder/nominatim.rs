//! Reqwest-backed Nominatim place lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use url::Url;

use super::dto::PlaceDto;
use crate::domain::ports::{GeoPoint, PlaceGeocoder, PlaceGeocoderError};

/// Public Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = concat!("stop-locator/", env!("CARGO_PKG_VERSION"));
const DEFAULT_ACCEPT_LANGUAGE: &str = "vi";

/// Outbound identity and result restriction for Nominatim requests.
pub struct NominatimIdentity {
    /// HTTP user-agent; Nominatim's usage policy requires one.
    pub user_agent: String,
    /// Preferred language for result names.
    pub accept_language: String,
    /// Comma-separated ISO 3166-1 country codes results are limited to.
    pub country_codes: String,
}

impl Default for NominatimIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_owned(),
            country_codes: "vn".to_owned(),
        }
    }
}

/// Place geocoder issuing one `GET` search per lookup.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: Url,
    identity: NominatimIdentity,
}

impl NominatimGeocoder {
    /// Build a geocoder against `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        identity: NominatimIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            identity,
        })
    }

    fn search_url(&self, text: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("limit", "1")
            .append_pair("countrycodes", &self.identity.country_codes)
            .append_pair("q", text);
        url
    }
}

#[async_trait]
impl PlaceGeocoder for NominatimGeocoder {
    async fn locate(&self, text: &str) -> Result<Option<GeoPoint>, PlaceGeocoderError> {
        let response = self
            .client
            .get(self.search_url(text))
            .header(USER_AGENT, self.identity.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, self.identity.accept_language.as_str())
            .send()
            .await
            .map_err(|error| PlaceGeocoderError::unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaceGeocoderError::unavailable(format!(
                "status {}",
                status.as_u16()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|error| PlaceGeocoderError::unavailable(error.to_string()))?;
        parse_first_place(body.as_ref())
    }
}

fn parse_first_place(body: &[u8]) -> Result<Option<GeoPoint>, PlaceGeocoderError> {
    let places: Vec<PlaceDto> = serde_json::from_slice(body).map_err(|error| {
        PlaceGeocoderError::decode(format!("invalid Nominatim JSON payload: {error}"))
    })?;
    places
        .into_iter()
        .next()
        .map(PlaceDto::into_point)
        .transpose()
        .map_err(PlaceGeocoderError::decode)
}

#[cfg(test)]
mod tests {
    //! Request shaping and response decoding without network access.
    use super::*;
    use rstest::rstest;

    #[test]
    fn search_url_restricts_country_and_limit() {
        let geocoder = NominatimGeocoder::new(
            Url::parse(DEFAULT_NOMINATIM_URL).expect("url"),
            Duration::from_secs(5),
            NominatimIdentity::default(),
        )
        .expect("client builds");

        let url = geocoder.search_url("Chợ Bến Thành & co");
        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            [
                ("format".to_owned(), "json".to_owned()),
                ("limit".to_owned(), "1".to_owned()),
                ("countrycodes".to_owned(), "vn".to_owned()),
                ("q".to_owned(), "Chợ Bến Thành & co".to_owned()),
            ]
        );
    }

    #[test]
    fn first_result_coordinates_are_parsed_from_strings() {
        let body = br#"[
            { "place_id": 1, "lat": "10.7721", "lon": "106.6983", "display_name": "Ben Thanh" },
            { "place_id": 2, "lat": "0", "lon": "0" }
        ]"#;
        assert_eq!(
            parse_first_place(body).expect("decodes"),
            Some(GeoPoint {
                lat: 10.7721,
                lng: 106.6983
            })
        );
    }

    #[test]
    fn empty_results_are_not_errors() {
        assert_eq!(parse_first_place(b"[]").expect("decodes"), None);
    }

    #[rstest]
    #[case::not_json(&b"<html>busy</html>"[..])]
    #[case::bad_number(&br#"[{ "lat": "north", "lon": "106.7" }]"#[..])]
    #[case::missing_field(&br#"[{ "lat": "10.7" }]"#[..])]
    fn malformed_bodies_are_decode_errors(#[case] body: &[u8]) {
        let error = parse_first_place(body).expect_err("decode should fail");
        assert!(matches!(error, PlaceGeocoderError::Decode { .. }));
    }
}
