//! Builders shared by unit and behaviour tests across the workspace.

use geo::Coord;

use crate::{CategoryId, ElementKind, GeoBounds, KM_PER_DEGREE, PoiRecord};

/// A square search area centred on the equator covering `area_km2`.
///
/// # Panics
///
/// Panics when `area_km2` does not yield a valid rectangle.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "derives the square's side in degrees from its area"
)]
#[expect(clippy::expect_used, reason = "test helper fails fast on bad input")]
pub fn equatorial_square(area_km2: f64) -> GeoBounds {
    let side = area_km2.sqrt() / KM_PER_DEGREE;
    GeoBounds::new(-side / 2.0, 0.0, side / 2.0, side).expect("positive area yields valid bounds")
}

/// An untagged node record for `category`.
#[must_use]
pub fn node(id: u64, category: &str, lon: f64, lat: f64) -> PoiRecord {
    PoiRecord::with_empty_tags(
        id,
        ElementKind::Node,
        CategoryId::from(category),
        Coord { x: lon, y: lat },
    )
}
