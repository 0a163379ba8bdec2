//! Locator configuration loaded via OrthoConfig.
//!
//! Accessors fall back to the defaults below, so an empty environment yields
//! a working configuration for the Ho Chi Minh City metro region.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::domain::{
    DEFAULT_MIN_ZOOM, DEFAULT_QUERY_TIMEOUT_SECONDS, DEFAULT_RETRY_BUDGET, GeoRect, GeoRectError,
    PrefetchConfig,
};
use crate::outbound::geocoder::DEFAULT_NOMINATIM_URL;
use crate::outbound::overpass::DEFAULT_REQUEST_TIMEOUT;

/// Public Overpass mirrors used when none are configured.
pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.nchc.org.tw/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];
/// Metro bounding box as `south,west,north,east`.
pub const DEFAULT_REGION: &str = "10.3,106.35,11.2,107.05";
const DEFAULT_COUNTRY_CODES: &str = "vn";
/// Prefetch tile size in degrees.
pub const DEFAULT_GRID_STEP: f64 = 0.3;

/// Errors raised when settings values are malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    /// An endpoint entry is not an absolute URL.
    #[error("invalid Overpass endpoint `{value}`: {message}")]
    InvalidEndpoint {
        /// Offending entry.
        value: String,
        /// Parser message.
        message: String,
    },
    /// The endpoint list is present but empty.
    #[error("endpoint list must name at least one Overpass mirror")]
    NoEndpoints,
    /// The region is not a valid bounding box.
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] GeoRectError),
    /// The geocoder URL is not an absolute URL.
    #[error("invalid geocoder URL `{value}`: {message}")]
    InvalidGeocoderUrl {
        /// Offending value.
        value: String,
        /// Parser message.
        message: String,
    },
}

/// Comma-separated setting given either as one string or as a list.
///
/// Environment values containing commas arrive pre-split; config files may
/// use either form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommaList {
    /// A single, possibly comma-separated, string.
    Text(String),
    /// Entries that may themselves contain commas.
    Items(Vec<String>),
}

impl CommaList {
    /// Trimmed, non-empty entries in order.
    pub fn entries(&self) -> Vec<&str> {
        let raw: &[String] = match self {
            Self::Text(text) => std::slice::from_ref(text),
            Self::Items(items) => items,
        };
        raw.iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect()
    }

    /// Entries rejoined with commas.
    pub fn joined(&self) -> String {
        self.entries().join(",")
    }
}

/// Configuration values for the stop locator.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "STOP_LOCATOR")]
pub struct LocatorSettings {
    /// Overpass mirror URLs, rotated round-robin.
    #[ortho_config(skip_cli)]
    pub endpoints: Option<CommaList>,
    /// Directory for the durable cache tier; unset keeps the cache in memory.
    pub cache_dir: Option<PathBuf>,
    /// Region of interest as `south,west,north,east`.
    #[ortho_config(skip_cli)]
    pub region: Option<CommaList>,
    /// Prefetch tile size in degrees.
    #[ortho_config(default = 0.3)]
    pub grid_step: f64,
    /// Prefetch tiles fetched per batch.
    pub concurrency: Option<usize>,
    /// Retries after the first attempt of each query.
    pub retry_budget: Option<u32>,
    /// Client-side HTTP timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Server-side Overpass timeout directive in seconds.
    pub query_timeout_secs: Option<u32>,
    /// User-agent sent to Overpass and Nominatim.
    pub user_agent: Option<String>,
    /// Nominatim search endpoint.
    pub geocoder_url: Option<String>,
    /// Country codes place lookups are restricted to.
    #[ortho_config(skip_cli)]
    pub country_codes: Option<CommaList>,
    /// Minimum zoom level for viewport loading.
    pub min_zoom: Option<u8>,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            endpoints: None,
            cache_dir: None,
            region: None,
            grid_step: DEFAULT_GRID_STEP,
            concurrency: None,
            retry_budget: None,
            request_timeout_secs: None,
            query_timeout_secs: None,
            user_agent: None,
            geocoder_url: None,
            country_codes: None,
            min_zoom: None,
        }
    }
}

impl LocatorSettings {
    /// Configured mirrors, or the public defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] for unparsable or empty endpoint lists.
    pub fn endpoints(&self) -> Result<Vec<Url>, SettingsError> {
        let Some(raw) = self.endpoints.as_ref() else {
            return DEFAULT_ENDPOINTS
                .iter()
                .map(|value| parse_endpoint(value))
                .collect();
        };
        let endpoints = raw
            .entries()
            .into_iter()
            .map(parse_endpoint)
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(SettingsError::NoEndpoints);
        }
        Ok(endpoints)
    }

    /// Region of interest, defaulting to the metro box.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidRegion`] when the text is not a valid
    /// bounding box.
    pub fn region(&self) -> Result<GeoRect, SettingsError> {
        let Some(raw) = self.region.as_ref() else {
            return Ok(GeoRect::parse(DEFAULT_REGION)?);
        };
        Ok(GeoRect::parse(&raw.joined())?)
    }

    /// Crawl tunables assembled from the prefetch-related fields.
    pub fn prefetch_config(&self) -> PrefetchConfig {
        let defaults = PrefetchConfig::default();
        PrefetchConfig {
            step: self.grid_step,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            retry_budget: self.retry_budget(),
            query_timeout_seconds: self.query_timeout_secs(),
            ..defaults
        }
    }

    /// Retries after the first attempt, defaulting to [`DEFAULT_RETRY_BUDGET`].
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget.unwrap_or(DEFAULT_RETRY_BUDGET)
    }

    /// Client-side HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs)
    }

    /// Server-side `[timeout:N]` directive for stop queries.
    pub fn query_timeout_secs(&self) -> u32 {
        self.query_timeout_secs
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECONDS)
    }

    /// User-agent override; adapters keep their own default when unset.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Nominatim search endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidGeocoderUrl`] for malformed URLs.
    pub fn geocoder_url(&self) -> Result<Url, SettingsError> {
        let value = self.geocoder_url.as_deref().unwrap_or(DEFAULT_NOMINATIM_URL);
        Url::parse(value).map_err(|error| SettingsError::InvalidGeocoderUrl {
            value: value.to_owned(),
            message: error.to_string(),
        })
    }

    /// Country codes for place lookups.
    pub fn country_codes(&self) -> String {
        self.country_codes
            .as_ref()
            .map_or_else(|| DEFAULT_COUNTRY_CODES.to_owned(), CommaList::joined)
    }

    /// Minimum zoom at which viewports are loaded.
    pub fn min_zoom(&self) -> u8 {
        self.min_zoom.unwrap_or(DEFAULT_MIN_ZOOM)
    }
}

fn parse_endpoint(value: &str) -> Result<Url, SettingsError> {
    Url::parse(value).map_err(|error| SettingsError::InvalidEndpoint {
        value: value.to_owned(),
        message: error.to_string(),
    })
}
