//! Geographic rectangles, viewport keys, and tile partitioning.
//!
//! A [`GeoRect`] is always valid once constructed: finite WGS84 bounds with
//! `south < north` and `west < east`. Tiles produced by [`GeoRect::tiles`]
//! share edges exactly, so their union covers the parent without gaps.

use std::fmt;

use thiserror::Error;

/// Upper bound on the number of tiles produced by one partition.
pub const MAX_TILES: usize = 10_000;

/// Axis-aligned WGS84 bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRect {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

/// Validation errors returned when constructing a [`GeoRect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeoRectError {
    /// At least one bound is NaN or infinite.
    #[error("bounding box must contain finite coordinates")]
    NonFinite,
    /// Latitudes fall outside `[-90, 90]` or longitudes outside `[-180, 180]`.
    #[error("bounding box lies outside WGS84 ranges")]
    OutOfRange,
    /// `south >= north` or `west >= east`.
    #[error("bounding box must satisfy south < north and west < east")]
    Inverted,
    /// Text form did not contain four comma-separated numbers.
    #[error("bounding box must be four comma-separated numbers: south,west,north,east")]
    Malformed,
}

/// Errors returned by [`GeoRect::tiles`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TilingError {
    /// The step is not a positive finite number.
    #[error("tile step must be a positive finite number of degrees, got {0}")]
    InvalidStep(f64),
    /// The partition would exceed [`MAX_TILES`].
    #[error("tiling would produce {0} tiles, more than the allowed maximum")]
    TooManyTiles(usize),
}

impl GeoRect {
    /// Build a rectangle from `south, west, north, east` bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use stop_locator::domain::GeoRect;
    ///
    /// let rect = GeoRect::new(10.3, 106.35, 11.2, 107.05)?;
    /// assert!(rect.contains_point(10.776, 106.7));
    /// # Ok::<(), stop_locator::domain::GeoRectError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`GeoRectError`] when the bounds are non-finite, out of range,
    /// or inverted.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, GeoRectError> {
        if [south, west, north, east].iter().any(|value| !value.is_finite()) {
            return Err(GeoRectError::NonFinite);
        }
        let lat_range = -90.0..=90.0;
        let lng_range = -180.0..=180.0;
        if !lat_range.contains(&south)
            || !lat_range.contains(&north)
            || !lng_range.contains(&west)
            || !lng_range.contains(&east)
        {
            return Err(GeoRectError::OutOfRange);
        }
        if south >= north || west >= east {
            return Err(GeoRectError::Inverted);
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Parse `south,west,north,east` text.
    ///
    /// # Errors
    ///
    /// Returns [`GeoRectError::Malformed`] for the wrong arity or non-numeric
    /// values, otherwise the errors of [`GeoRect::new`].
    pub fn parse(raw: &str) -> Result<Self, GeoRectError> {
        let values = raw
            .split(',')
            .map(str::trim)
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| GeoRectError::Malformed)?;
        match values.as_slice() {
            [south, west, north, east] => Self::new(*south, *west, *north, *east),
            _ => Err(GeoRectError::Malformed),
        }
    }

    /// Southern bound (minimum latitude).
    pub const fn south(&self) -> f64 {
        self.south
    }

    /// Western bound (minimum longitude).
    pub const fn west(&self) -> f64 {
        self.west
    }

    /// Northern bound (maximum latitude).
    pub const fn north(&self) -> f64 {
        self.north
    }

    /// Eastern bound (maximum longitude).
    pub const fn east(&self) -> f64 {
        self.east
    }

    /// Whether the point lies inside the rectangle, edges included.
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lng)
    }

    /// Whether the two rectangles overlap with non-zero area.
    pub fn intersects(&self, other: &Self) -> bool {
        let south = self.south.max(other.south);
        let west = self.west.max(other.west);
        let north = self.north.min(other.north);
        let east = self.east.min(other.east);
        south < north && west < east
    }

    /// Quantised key used to detect material viewport changes.
    pub fn view_key(&self) -> ViewKey {
        ViewKey(format!(
            "{:.4},{:.4},{:.4},{:.4}",
            self.south, self.west, self.north, self.east
        ))
    }

    /// Overpass bounding-box fragment `(south,west,north,east)` at six decimals.
    pub fn overpass_bbox(&self) -> String {
        format!(
            "({:.6},{:.6},{:.6},{:.6})",
            self.south, self.west, self.north, self.east
        )
    }

    /// Partition the rectangle into a row-major grid of tiles no larger than
    /// `step` degrees on either side, up to a relative slack of
    /// [`GRID_SLACK`]: a span within `GRID_SLACK * step` of a whole number of
    /// steps is not given an extra sliver row or column, so the last tile may
    /// exceed `step` by at most that amount.
    ///
    /// Rows run south to north and, within a row, tiles run west to east.
    /// The last row and column are clipped to the rectangle's bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use stop_locator::domain::GeoRect;
    ///
    /// let metro = GeoRect::new(10.3, 106.35, 11.2, 107.05)?;
    /// let tiles = metro.tiles(0.3)?;
    /// assert_eq!(tiles.len(), 9);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`TilingError`] when `step` is not positive and finite, or when
    /// the grid would exceed [`MAX_TILES`].
    pub fn tiles(&self, step: f64) -> Result<Vec<Self>, TilingError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(TilingError::InvalidStep(step));
        }
        let rows = grid_edges(self.south, self.north, step)?;
        let cols = grid_edges(self.west, self.east, step)?;
        let total = (rows.len() - 1).saturating_mul(cols.len() - 1);
        if total > MAX_TILES {
            return Err(TilingError::TooManyTiles(total));
        }

        let mut tiles = Vec::with_capacity(total);
        for lat in rows.windows(2) {
            for lng in cols.windows(2) {
                if let ([south, north], [west, east]) = (lat, lng) {
                    tiles.push(Self {
                        south: *south,
                        west: *west,
                        north: *north,
                        east: *east,
                    });
                }
            }
        }
        Ok(tiles)
    }
}

impl fmt::Display for GeoRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.south, self.west, self.north, self.east
        )
    }
}

/// Fraction of a step absorbed before an extra grid cell is opened.
pub const GRID_SLACK: f64 = 1e-9;

/// Edge coordinates from `start` to `end` in `step` increments, ending
/// exactly at `end`.
fn grid_edges(start: f64, end: f64, step: f64) -> Result<Vec<f64>, TilingError> {
    // 0.9 / 0.3 must yield three cells, not four.
    let cells = ((end - start) / step - GRID_SLACK).ceil().max(1.0);
    if cells > MAX_TILES as f64 {
        return Err(TilingError::TooManyTiles(MAX_TILES.saturating_add(1)));
    }
    let count = cells as usize;
    let mut edges = (0..count)
        .map(|index| start + step * index as f64)
        .collect::<Vec<_>>();
    edges.push(end);
    Ok(edges)
}

/// Quantised viewport identity (bounds rounded to four decimals).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey(String);

impl ViewKey {
    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    //! Geometry validation, keys, and tiling coverage.
    use super::*;
    use rstest::{fixture, rstest};

    const EPSILON: f64 = 1e-9;

    #[fixture]
    fn metro() -> GeoRect {
        GeoRect::new(10.3, 106.35, 11.2, 107.05).expect("metro bounds are valid")
    }

    #[rstest]
    #[case::non_finite(f64::NAN, 106.0, 11.0, 107.0, GeoRectError::NonFinite)]
    #[case::latitude_range(-91.0, 106.0, 11.0, 107.0, GeoRectError::OutOfRange)]
    #[case::longitude_range(10.0, 106.0, 11.0, 181.0, GeoRectError::OutOfRange)]
    #[case::inverted_latitude(11.0, 106.0, 10.0, 107.0, GeoRectError::Inverted)]
    #[case::degenerate_longitude(10.0, 106.0, 11.0, 106.0, GeoRectError::Inverted)]
    fn rejects_invalid_bounds(
        #[case] south: f64,
        #[case] west: f64,
        #[case] north: f64,
        #[case] east: f64,
        #[case] expected: GeoRectError,
    ) {
        assert_eq!(GeoRect::new(south, west, north, east), Err(expected));
    }

    #[rstest]
    #[case("10.3,106.35,11.2,107.05", true)]
    #[case(" 10.3 , 106.35 , 11.2 , 107.05 ", true)]
    #[case("10.3,106.35,11.2", false)]
    #[case("10.3,106.35,11.2,abc", false)]
    fn parses_comma_separated_bounds(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(GeoRect::parse(raw).is_ok(), ok, "input: {raw}");
    }

    #[rstest]
    fn intersection_requires_positive_overlap(metro: GeoRect) {
        let inside = GeoRect::new(10.7, 106.6, 10.8, 106.7).expect("valid");
        let touching = GeoRect::new(11.2, 106.6, 11.3, 106.7).expect("valid");
        let far = GeoRect::new(21.0, 105.8, 21.1, 105.9).expect("valid");
        assert!(metro.intersects(&inside));
        assert!(!metro.intersects(&touching), "shared edge has no area");
        assert!(!metro.intersects(&far));
    }

    #[rstest]
    fn view_key_ignores_sub_quantum_pans() {
        let a = GeoRect::new(10.77601, 106.70001, 10.78, 106.71).expect("valid");
        let b = GeoRect::new(10.77604, 106.70004, 10.78, 106.71).expect("valid");
        let c = GeoRect::new(10.7770, 106.7000, 10.78, 106.71).expect("valid");
        assert_eq!(a.view_key(), b.view_key());
        assert_ne!(a.view_key(), c.view_key());
        assert_eq!(a.view_key().as_str(), "10.7760,106.7000,10.7800,106.7100");
    }

    #[rstest]
    fn overpass_bbox_uses_six_decimals(metro: GeoRect) {
        assert_eq!(
            metro.overpass_bbox(),
            "(10.300000,106.350000,11.200000,107.050000)"
        );
    }

    #[rstest]
    fn metro_partitions_into_three_by_three(metro: GeoRect) {
        let tiles = metro.tiles(0.3).expect("tiling succeeds");
        assert_eq!(tiles.len(), 9);

        let first = tiles.first().expect("first tile");
        assert!((first.south() - 10.3).abs() < EPSILON);
        assert!((first.west() - 106.35).abs() < EPSILON);

        let second = tiles.get(1).expect("second tile");
        assert!(
            (second.south() - first.south()).abs() < EPSILON,
            "row-major: second tile shares the first row"
        );
        assert!(second.west() > first.west());

        let last = tiles.last().expect("last tile");
        assert_eq!(last.north(), 11.2, "last row clipped to the region");
        assert_eq!(last.east(), 107.05, "last column clipped to the region");
        assert!(last.east() - last.west() < 0.3);
    }

    #[rstest]
    #[case(0.3)]
    #[case(0.25)]
    #[case(0.07)]
    #[case(5.0)]
    fn tiles_cover_region_without_gaps(metro: GeoRect, #[case] step: f64) {
        let tiles = metro.tiles(step).expect("tiling succeeds");

        let mut area = 0.0;
        for tile in &tiles {
            assert!(tile.north() - tile.south() <= step + EPSILON);
            assert!(tile.east() - tile.west() <= step + EPSILON);
            assert!(tile.south() >= metro.south() && tile.north() <= metro.north());
            assert!(tile.west() >= metro.west() && tile.east() <= metro.east());
            area += (tile.north() - tile.south()) * (tile.east() - tile.west());
        }
        let expected = (metro.north() - metro.south()) * (metro.east() - metro.west());
        assert!((area - expected).abs() < 1e-6, "union area must match region");

        for pair in tiles.windows(2) {
            let [left, right] = pair else { continue };
            if left.south() == right.south() {
                assert_eq!(left.east(), right.west(), "adjacent tiles share an edge");
            }
        }
    }

    #[rstest]
    #[case::float_noise(0.9000000001)]
    #[case::just_past_slack(0.9000001)]
    fn last_tile_stays_within_slack(#[case] north: f64) {
        let rect = GeoRect::new(0.0, 0.0, north, 0.3).expect("valid rect");
        let tiles = rect.tiles(0.3).expect("tiling succeeds");
        let last = tiles.last().expect("at least one tile");
        assert!(last.north() - last.south() <= 0.3 * (1.0 + GRID_SLACK) + f64::EPSILON);
        assert_eq!(last.north(), north);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.3)]
    #[case(f64::NAN)]
    fn rejects_invalid_steps(metro: GeoRect, #[case] step: f64) {
        assert!(matches!(
            metro.tiles(step),
            Err(TilingError::InvalidStep(_))
        ));
    }

    #[rstest]
    fn rejects_runaway_grids(metro: GeoRect) {
        assert!(matches!(
            metro.tiles(0.0001),
            Err(TilingError::TooManyTiles(_))
        ));
    }
}
