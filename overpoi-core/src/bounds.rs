//! Validated geographic search rectangles.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`, matching
//! the convention used by [`geo`].

use std::fmt;

use geo::{Coord, Intersects, Rect};
use thiserror::Error;

/// Kilometres spanned by one degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Axis-aligned search rectangle selected by the user.
///
/// # Examples
/// ```
/// use overpoi_core::GeoBounds;
///
/// # fn main() -> Result<(), overpoi_core::BoundsError> {
/// let bounds = GeoBounds::new(51.50, -0.13, 51.52, -0.10)?;
/// assert!(bounds.area_km2() > 0.0);
/// assert_eq!(bounds.to_string(), "51.5,-0.13,51.52,-0.1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GeoBounds {
    rect: Rect<f64>,
}

/// Errors returned by [`GeoBounds::new`] and [`GeoBounds::ensure_within`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoundsError {
    /// A coordinate was NaN or infinite.
    #[error("bounding box coordinates must be finite")]
    NonFinite,
    /// A latitude fell outside `-90..=90`.
    #[error("latitude {value} is outside -90..=90")]
    LatitudeOutOfRange {
        /// Offending latitude.
        value: f64,
    },
    /// A longitude fell outside `-180..=180`.
    #[error("longitude {value} is outside -180..=180")]
    LongitudeOutOfRange {
        /// Offending longitude.
        value: f64,
    },
    /// South was not strictly below north.
    #[error("south ({south}) must be below north ({north})")]
    InvertedLatitudes {
        /// Southern edge.
        south: f64,
        /// Northern edge.
        north: f64,
    },
    /// West was not strictly left of east.
    #[error("west ({west}) must be left of east ({east})")]
    InvertedLongitudes {
        /// Western edge.
        west: f64,
        /// Eastern edge.
        east: f64,
    },
    /// The rectangle covers more ground than the configured policy allows.
    #[error("bounding box covers {area_km2:.3} km², above the {max_km2:.3} km² limit")]
    TooLarge {
        /// Approximate area of the rectangle.
        area_km2: f64,
        /// Configured maximum.
        max_km2: f64,
    },
}

impl GeoBounds {
    /// Validate and construct a rectangle from its four edges.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError`] when a coordinate is not finite, out of range,
    /// or when the edges are inverted or degenerate.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, BoundsError> {
        if ![south, west, north, east].iter().all(|value| value.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        if let Some(value) = [south, north]
            .into_iter()
            .find(|lat| !(-90.0..=90.0).contains(lat))
        {
            return Err(BoundsError::LatitudeOutOfRange { value });
        }
        if let Some(value) = [west, east]
            .into_iter()
            .find(|lon| !(-180.0..=180.0).contains(lon))
        {
            return Err(BoundsError::LongitudeOutOfRange { value });
        }
        if south >= north {
            return Err(BoundsError::InvertedLatitudes { south, north });
        }
        if west >= east {
            return Err(BoundsError::InvertedLongitudes { west, east });
        }
        Ok(Self {
            rect: Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north }),
        })
    }

    /// Southern edge in degrees.
    #[must_use]
    pub fn south(&self) -> f64 {
        self.rect.min().y
    }

    /// Western edge in degrees.
    #[must_use]
    pub fn west(&self) -> f64 {
        self.rect.min().x
    }

    /// Northern edge in degrees.
    #[must_use]
    pub fn north(&self) -> f64 {
        self.rect.max().y
    }

    /// Eastern edge in degrees.
    #[must_use]
    pub fn east(&self) -> f64 {
        self.rect.max().x
    }

    /// The rectangle as a [`geo::Rect`].
    #[must_use]
    pub const fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// Centre of the rectangle.
    #[must_use]
    pub fn center(&self) -> Coord<f64> {
        self.rect.center()
    }

    /// Whether `location` lies inside or on the edge of the rectangle.
    #[must_use]
    pub fn contains(&self, location: &Coord<f64>) -> bool {
        self.rect.intersects(location)
    }

    /// Approximate area in square kilometres.
    ///
    /// Uses an equirectangular projection around the middle latitude, which
    /// is accurate enough for the small areas this tool is used with.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "area approximation scales degree spans into kilometres"
    )]
    pub fn area_km2(&self) -> f64 {
        let mid_lat = (self.south() + self.north()) / 2.0;
        let height_km = (self.north() - self.south()) * KM_PER_DEGREE;
        let width_km = (self.east() - self.west()) * KM_PER_DEGREE * mid_lat.to_radians().cos();
        height_km * width_km
    }

    /// Reject rectangles whose area exceeds `max_km2`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::TooLarge`] when the area is above the limit.
    pub fn ensure_within(&self, max_km2: f64) -> Result<(), BoundsError> {
        let area_km2 = self.area_km2();
        if area_km2 > max_km2 {
            return Err(BoundsError::TooLarge { area_km2, max_km2 });
        }
        Ok(())
    }
}

/// Formats the rectangle in Overpass order: `south,west,north,east`.
impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.south(),
            self.west(),
            self.north(),
            self.east()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[expect(clippy::float_arithmetic, reason = "tests compare floating point values")]
    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1.0e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[rstest]
    fn accessors_follow_constructor_order() {
        let bounds = GeoBounds::new(1.0, 2.0, 3.0, 4.0).expect("valid bounds");
        assert_close(bounds.south(), 1.0);
        assert_close(bounds.west(), 2.0);
        assert_close(bounds.north(), 3.0);
        assert_close(bounds.east(), 4.0);
    }

    #[rstest]
    #[case(1.0, 0.0, 1.0, 1.0)]
    #[case(2.0, 0.0, 1.0, 1.0)]
    fn rejects_inverted_latitudes(
        #[case] south: f64,
        #[case] west: f64,
        #[case] north: f64,
        #[case] east: f64,
    ) {
        let err = GeoBounds::new(south, west, north, east).expect_err("inverted");
        assert!(matches!(err, BoundsError::InvertedLatitudes { .. }));
    }

    #[rstest]
    fn rejects_inverted_longitudes() {
        let err = GeoBounds::new(0.0, 1.0, 1.0, 1.0).expect_err("degenerate");
        assert!(matches!(err, BoundsError::InvertedLongitudes { .. }));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn rejects_non_finite(#[case] value: f64) {
        let err = GeoBounds::new(0.0, 0.0, value, 1.0).expect_err("non-finite");
        assert_eq!(err, BoundsError::NonFinite);
    }

    #[rstest]
    fn rejects_out_of_range_coordinates() {
        let lat = GeoBounds::new(-91.0, 0.0, 0.0, 1.0).expect_err("latitude");
        assert!(matches!(lat, BoundsError::LatitudeOutOfRange { .. }));
        let lon = GeoBounds::new(0.0, 0.0, 1.0, 181.0).expect_err("longitude");
        assert!(matches!(lon, BoundsError::LongitudeOutOfRange { .. }));
    }

    #[rstest]
    #[expect(clippy::float_arithmetic, reason = "builds a 2 km square at the equator")]
    fn equatorial_square_has_expected_area() {
        let side = 2.0 / KM_PER_DEGREE;
        let bounds = GeoBounds::new(-side / 2.0, 0.0, side / 2.0, side).expect("valid bounds");
        assert_close(bounds.area_km2(), 4.0);
    }

    #[rstest]
    fn area_shrinks_away_from_the_equator() {
        let equator = GeoBounds::new(0.0, 0.0, 0.01, 0.01).expect("valid bounds");
        let north = GeoBounds::new(60.0, 0.0, 60.01, 0.01).expect("valid bounds");
        assert!(north.area_km2() < equator.area_km2());
    }

    #[rstest]
    fn ensure_within_reports_area() {
        let bounds = GeoBounds::new(0.0, 0.0, 1.0, 1.0).expect("valid bounds");
        let err = bounds.ensure_within(100.0).expect_err("too large");
        match err {
            BoundsError::TooLarge { area_km2, max_km2 } => {
                assert!(area_km2 > 12_000.0);
                assert_close(max_km2, 100.0);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[rstest]
    fn contains_includes_edges() {
        let bounds = GeoBounds::new(0.0, 0.0, 1.0, 1.0).expect("valid bounds");
        assert!(bounds.contains(&Coord { x: 1.0, y: 0.5 }));
        assert!(!bounds.contains(&Coord { x: 1.5, y: 0.5 }));
    }
}
