//! Namespaced, whitespace-normalised cache key for Overpass query results.
use std::fmt;

/// Namespace prefixed to every query cache key.
pub const CACHE_KEY_NAMESPACE: &str = "osm_cache_";

/// Cache key derived from raw query text.
///
/// Runs of whitespace collapse to a single space and the result is trimmed,
/// so two queries that differ only in layout share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryCacheKey(String);

impl QueryCacheKey {
    /// Normalise `query` into a cache key.
    pub fn from_query(query: &str) -> Self {
        let normalised = query.split_whitespace().collect::<Vec<_>>().join(" ");
        Self(format!("{CACHE_KEY_NAMESPACE}{normalised}"))
    }

    /// Borrow the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for QueryCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for QueryCacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    //! Validates key normalisation.
    use super::QueryCacheKey;
    use rstest::rstest;

    #[rstest]
    #[case("node(1);out;", "osm_cache_node(1);out;")]
    #[case("  node(1);\n\n   out;  ", "osm_cache_node(1); out;")]
    #[case("\t[out:json]\t\t(\r\n node );", "osm_cache_[out:json] ( node );")]
    fn key_collapses_and_trims_whitespace(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(QueryCacheKey::from_query(query).as_str(), expected);
    }

    #[test]
    fn layout_variants_share_a_key() {
        let compact = QueryCacheKey::from_query("(node[\"highway\"=\"bus_stop\"](1,2,3,4);); out body;");
        let indented = QueryCacheKey::from_query(
            "\n    (\n      node[\"highway\"=\"bus_stop\"](1,2,3,4);\n    );\n    out body;",
        );
        assert_ne!(compact, indented, "bracket spacing is significant");
        let reindented = QueryCacheKey::from_query(
            "  (node[\"highway\"=\"bus_stop\"](1,2,3,4););\n\n out   body;",
        );
        assert_eq!(compact, reindented);
    }
}
