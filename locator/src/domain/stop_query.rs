//! Overpass query text for transit stops and decoding of its results.
//!
//! The query selects nodes tagged as bus stops or public-transport platforms
//! inside a bounding box and asks for immediate results only (`out body`,
//! no recursion). Results are decoded from the cached JSON document into
//! [`Station`] records in one pass.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::{GeoRect, Station, StationId};

/// Default server-side timeout directive, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECONDS: u32 = 25;

/// Name used for stops without any name tag.
pub const UNNAMED_STOP: &str = "unnamed stop";

const STOP_TAGS: [(&str, &str); 2] = [("highway", "bus_stop"), ("public_transport", "platform")];
const NAME_KEYS: [&str; 3] = ["name", "name:vi", "name:en"];

/// Build the stop query for `rect`.
///
/// # Examples
///
/// ```
/// use stop_locator::domain::{GeoRect, build_stop_query};
///
/// let rect = GeoRect::new(10.77, 106.69, 10.78, 106.70)?;
/// let query = build_stop_query(&rect, 25);
/// assert!(query.starts_with("[out:json][timeout:25];"));
/// assert!(query.contains(r#"node["highway"="bus_stop"](10.770000,106.690000,10.780000,106.700000);"#));
/// # Ok::<(), stop_locator::domain::GeoRectError>(())
/// ```
pub fn build_stop_query(rect: &GeoRect, timeout_seconds: u32) -> String {
    let bbox = rect.overpass_bbox();
    let lines = STOP_TAGS
        .iter()
        .map(|(key, value)| format!("  node{}{bbox};", tag_selector(key, value)))
        .collect::<Vec<_>>();
    format!(
        "[out:json][timeout:{timeout}];\n(\n{lines}\n);\nout body;",
        timeout = timeout_seconds.max(1),
        lines = lines.join("\n"),
    )
}

fn tag_selector(key: &str, value: &str) -> String {
    format!("[\"{}\"=\"{}\"]", escape_quoted(key), escape_quoted(value))
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}

#[derive(Debug, Deserialize)]
struct OverpassDocumentDto {
    #[serde(default)]
    elements: Vec<OverpassElementDto>,
}

#[derive(Debug, Deserialize)]
struct OverpassElementDto {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl OverpassElementDto {
    fn into_station(self) -> Option<Station> {
        if self.element_type != "node" {
            return None;
        }
        let (Some(lat), Some(lng)) = (self.lat, self.lon) else {
            return None;
        };
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        let name = NAME_KEYS
            .iter()
            .find_map(|key| self.tags.get(*key).filter(|name| !name.trim().is_empty()))
            .cloned()
            .unwrap_or_else(|| UNNAMED_STOP.to_owned());
        Some(Station {
            id: StationId::new(self.id),
            name,
            lat,
            lng,
        })
    }
}

/// Decode an Overpass JSON document into stations.
///
/// Non-node elements and nodes without finite coordinates are skipped. A
/// missing `elements` list decodes as empty.
///
/// # Errors
///
/// Returns the decode message when the document shape is invalid (for
/// example an element without a numeric `id`).
pub fn stations_from_document(document: &Value) -> Result<Vec<Station>, String> {
    let decoded = OverpassDocumentDto::deserialize(document)
        .map_err(|error| format!("invalid Overpass JSON payload: {error}"))?;
    Ok(decoded
        .elements
        .into_iter()
        .filter_map(OverpassElementDto::into_station)
        .collect())
}
