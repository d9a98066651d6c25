//! Count, area and density figures per category.
//!
//! Density is measured against the *searched* area rather than the spread
//! of the returned records: it answers "how many POIs per square kilometre
//! did this search find".

use std::fmt;
use std::sync::Arc;

use geo::{Coord, Rect};

use crate::render::LayerDirective;
use crate::{CatalogError, CategoryCatalog, CategoryId, CategoryResultSet, GeoBounds, PoiRecord};

/// Areas below this are treated as zero when computing densities.
pub const MIN_AREA_EPSILON_KM2: f64 = 1.0e-9;

/// Derived figures for one category and one search area.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CategoryStatistics {
    /// Category the figures describe.
    pub category: CategoryId,
    /// Number of records.
    pub count: usize,
    /// Area of the search rectangle.
    pub area_km2: f64,
    /// `count / area_km2`; `0.0` without records and `f64::INFINITY` when
    /// records exist but the area is effectively zero.
    pub density_per_km2: f64,
    /// Extent of the returned records, `None` when there are none.
    pub bounds: Option<Rect<f64>>,
}

impl CategoryStatistics {
    /// Compute statistics for `result` within `search_bounds`.
    ///
    /// # Examples
    /// ```
    /// use overpoi_core::{CategoryId, CategoryResultSet, CategoryStatistics, GeoBounds};
    ///
    /// # fn main() -> Result<(), overpoi_core::BoundsError> {
    /// let bounds = GeoBounds::new(0.0, 0.0, 0.01, 0.01)?;
    /// let empty = CategoryResultSet::fetched(CategoryId::from("school"), Vec::new());
    /// let stats = CategoryStatistics::compute(&empty, &bounds);
    /// assert_eq!(stats.count, 0);
    /// assert_eq!(stats.density_per_km2, 0.0);
    /// assert!(stats.bounds.is_none());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn compute(result: &CategoryResultSet, search_bounds: &GeoBounds) -> Self {
        Self::from_parts(
            result.category().clone(),
            result.len(),
            search_bounds.area_km2(),
            record_extent(result.records()),
        )
    }

    /// Build statistics from a literal count and area.
    #[must_use]
    pub fn from_parts(
        category: CategoryId,
        count: usize,
        area_km2: f64,
        bounds: Option<Rect<f64>>,
    ) -> Self {
        Self {
            category,
            count,
            area_km2,
            density_per_km2: density(count, area_km2),
            bounds,
        }
    }

    /// Whether the density is a finite number.
    #[must_use]
    pub fn density_is_defined(&self) -> bool {
        self.density_per_km2.is_finite()
    }
}

impl fmt::Display for CategoryStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {:.3} km², ",
            self.count, self.category, self.area_km2
        )?;
        if self.density_is_defined() {
            write!(f, "{:.2} POIs/km²", self.density_per_km2)
        } else {
            f.write_str("density undefined")
        }
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "density is a float ratio of a bounded record count"
)]
fn density(count: usize, area_km2: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    if area_km2 < MIN_AREA_EPSILON_KM2 {
        return f64::INFINITY;
    }
    count as f64 / area_km2
}

fn record_extent(records: &[PoiRecord]) -> Option<Rect<f64>> {
    records
        .iter()
        .map(|record| record.location)
        .fold(None, |extent: Option<Rect<f64>>, location| {
            Some(extent.map_or_else(
                || Rect::new(location, location),
                |existing| include(existing, location),
            ))
        })
}

fn include(existing: Rect<f64>, location: Coord<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: existing.min().x.min(location.x),
            y: existing.min().y.min(location.y),
        },
        Coord {
            x: existing.max().x.max(location.x),
            y: existing.max().y.max(location.y),
        },
    )
}

/// Computes statistics and render directives against a shared catalogue.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use overpoi_core::{CategoryCatalog, CategoryId, CategoryResultSet, GeoBounds, StatisticsCalculator};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let calculator = StatisticsCalculator::new(Arc::new(CategoryCatalog::standard()));
/// let bounds = GeoBounds::new(0.0, 0.0, 0.01, 0.01)?;
/// let result = CategoryResultSet::fetched(CategoryId::from("school"), Vec::new());
/// let directive = calculator.layer_directive(&result, &bounds)?;
/// assert!(directive.show_labels);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StatisticsCalculator {
    catalog: Arc<CategoryCatalog>,
}

impl StatisticsCalculator {
    /// Bind a calculator to `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self { catalog }
    }

    /// Compute statistics for one result set.
    #[must_use]
    pub fn compute(&self, result: &CategoryResultSet, search_bounds: &GeoBounds) -> CategoryStatistics {
        CategoryStatistics::compute(result, search_bounds)
    }

    /// Combine statistics, label decision and style for one result set.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCategory`] when the result set's
    /// category is not part of the catalogue.
    pub fn layer_directive(
        &self,
        result: &CategoryResultSet,
        search_bounds: &GeoBounds,
    ) -> Result<LayerDirective, CatalogError> {
        let definition = self.catalog.require(result.category())?;
        Ok(LayerDirective::new(
            definition,
            self.compute(result, search_bounds),
        ))
    }

    /// Directives for several result sets, in the given order.
    ///
    /// # Errors
    ///
    /// Fails on the first category missing from the catalogue.
    pub fn layer_directives<'a, I>(
        &self,
        results: I,
        search_bounds: &GeoBounds,
    ) -> Result<Vec<LayerDirective>, CatalogError>
    where
        I: IntoIterator<Item = &'a CategoryResultSet>,
    {
        results
            .into_iter()
            .map(|result| self.layer_directive(result, search_bounds))
            .collect()
    }
}
