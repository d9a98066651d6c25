//! Overpass QL query construction.
//!
//! Queries are plain text and fully determined by their inputs, so building
//! one never touches the network. Batch queries interleave a `make` marker
//! element before each category's statements; the parser uses those markers
//! to attribute features back to categories.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use overpoi_core::{BoundsError, CategoryCatalog, CategoryDefinition, CategoryId, GeoBounds};
use thiserror::Error;

/// Selections of this many categories or more are fetched in one request.
pub const BATCH_THRESHOLD: usize = 3;

/// Server and client timeout for a single-category request.
pub const INDIVIDUAL_TIMEOUT: Duration = Duration::from_secs(25);

/// Server and client timeout for a combined request.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest search area accepted unless configured otherwise.
pub const DEFAULT_MAX_AREA_KM2: f64 = 100.0;

/// Element type emitted by the batch marker statement.
pub(crate) const GROUP_MARKER: &str = "overpoi_group";

/// Tag on the marker element naming the category that follows.
pub(crate) const GROUP_TAG: &str = "category";

/// How a selection is turned into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// One combined request for every category.
    Batch,
    /// One request per category.
    Individual,
}

impl AcquisitionMode {
    /// Pick the mode for a selection of `count` categories.
    ///
    /// # Examples
    /// ```
    /// use overpoi_data::AcquisitionMode;
    ///
    /// assert_eq!(AcquisitionMode::for_category_count(2), AcquisitionMode::Individual);
    /// assert_eq!(AcquisitionMode::for_category_count(3), AcquisitionMode::Batch);
    /// ```
    #[must_use]
    pub const fn for_category_count(count: usize) -> Self {
        if count >= BATCH_THRESHOLD {
            Self::Batch
        } else {
            Self::Individual
        }
    }

    /// Timeout applied to requests in this mode.
    #[must_use]
    pub const fn timeout(self) -> Duration {
        match self {
            Self::Batch => BATCH_TIMEOUT,
            Self::Individual => INDIVIDUAL_TIMEOUT,
        }
    }

    /// Lower-case name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Individual => "individual",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ready-to-send query together with what it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassQuery {
    /// Mode the query was built for.
    pub mode: AcquisitionMode,
    /// Categories covered, in request order.
    pub categories: Vec<CategoryId>,
    /// Overpass QL text.
    pub text: String,
    /// Client-side timeout matching the `[timeout:..]` setting.
    pub timeout: Duration,
}

/// Errors raised before any request is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// No categories were selected.
    #[error("no categories selected")]
    EmptySelection,
    /// A selected id is missing from the catalogue.
    #[error("category '{id}' at position {position} is not in the catalogue")]
    InvalidCategory {
        /// Unknown id.
        id: CategoryId,
        /// Index in the selection.
        position: usize,
    },
    /// The same id was selected twice.
    #[error("category '{id}' is selected more than once")]
    DuplicateCategory {
        /// Repeated id.
        id: CategoryId,
    },
    /// The search area is rejected by policy.
    #[error("invalid bounding box: {0}")]
    InvalidBounds(#[from] BoundsError),
}

/// Builds Overpass queries against a shared catalogue.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use overpoi_core::{CategoryCatalog, CategoryId, GeoBounds};
/// use overpoi_data::{AcquisitionMode, QueryBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = QueryBuilder::new(Arc::new(CategoryCatalog::standard()));
/// let bounds = GeoBounds::new(51.50, -0.13, 51.52, -0.10)?;
/// let queries = builder.build(&bounds, &[CategoryId::from("school")], AcquisitionMode::Individual)?;
/// assert_eq!(queries.len(), 1);
/// assert!(queries[0].text.starts_with("[out:json][timeout:25];"));
/// assert!(queries[0].text.contains(r#"nwr["amenity"="school"](51.5,-0.13,51.52,-0.1);"#));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    catalog: Arc<CategoryCatalog>,
    max_area_km2: f64,
}

impl QueryBuilder {
    /// Create a builder with the default area limit.
    #[must_use]
    pub const fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self {
            catalog,
            max_area_km2: DEFAULT_MAX_AREA_KM2,
        }
    }

    /// Override the largest accepted search area.
    #[must_use]
    pub const fn with_max_area_km2(mut self, max_area_km2: f64) -> Self {
        self.max_area_km2 = max_area_km2;
        self
    }

    /// The catalogue queries are resolved against.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<CategoryCatalog> {
        &self.catalog
    }

    /// Configured area limit.
    #[must_use]
    pub const fn max_area_km2(&self) -> f64 {
        self.max_area_km2
    }

    /// Check a selection without building anything.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::build`].
    pub fn validate(&self, bounds: &GeoBounds, categories: &[CategoryId]) -> Result<(), QueryError> {
        self.resolve(bounds, categories).map(|_| ())
    }

    /// Build the queries for `categories` in `mode`.
    ///
    /// Individual mode yields one query per category in selection order;
    /// batch mode yields exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptySelection`] for an empty selection,
    /// [`QueryError::InvalidCategory`] or [`QueryError::DuplicateCategory`]
    /// for a bad id, and [`QueryError::InvalidBounds`] when the area is above
    /// the configured limit.
    pub fn build(
        &self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
        mode: AcquisitionMode,
    ) -> Result<Vec<OverpassQuery>, QueryError> {
        match mode {
            AcquisitionMode::Batch => Ok(vec![self.build_batch(bounds, categories)?]),
            AcquisitionMode::Individual => self.build_individual(bounds, categories),
        }
    }

    /// Build one combined query covering every category.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::build`].
    pub fn build_batch(
        &self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
    ) -> Result<OverpassQuery, QueryError> {
        let definitions = self.resolve(bounds, categories)?;
        Ok(batch_query(bounds, &definitions))
    }

    /// Build one query per category, in selection order.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::build`].
    pub fn build_individual(
        &self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
    ) -> Result<Vec<OverpassQuery>, QueryError> {
        let definitions = self.resolve(bounds, categories)?;
        Ok(definitions
            .into_iter()
            .map(|definition| individual_query(bounds, definition))
            .collect())
    }

    fn resolve<'a>(
        &'a self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
    ) -> Result<Vec<&'a CategoryDefinition>, QueryError> {
        if categories.is_empty() {
            return Err(QueryError::EmptySelection);
        }
        let mut seen = HashSet::with_capacity(categories.len());
        let definitions = categories
            .iter()
            .enumerate()
            .map(|(position, id)| {
                let definition = self.catalog.get(id).ok_or_else(|| {
                    QueryError::InvalidCategory {
                        id: id.clone(),
                        position,
                    }
                })?;
                if !seen.insert(id) {
                    return Err(QueryError::DuplicateCategory { id: id.clone() });
                }
                Ok(definition)
            })
            .collect::<Result<Vec<_>, _>>()?;
        bounds.ensure_within(self.max_area_km2)?;
        Ok(definitions)
    }
}

fn header(timeout: Duration) -> String {
    format!("[out:json][timeout:{}];\n", timeout.as_secs())
}

fn push_selection(text: &mut String, bounds: &GeoBounds, definition: &CategoryDefinition) {
    text.push_str(&format!("nwr{}({bounds});\n", definition.upstream_filter));
    text.push_str("out center tags;\n");
}

fn individual_query(bounds: &GeoBounds, definition: &CategoryDefinition) -> OverpassQuery {
    let mut text = header(INDIVIDUAL_TIMEOUT);
    push_selection(&mut text, bounds, definition);
    OverpassQuery {
        mode: AcquisitionMode::Individual,
        categories: vec![definition.id.clone()],
        text,
        timeout: INDIVIDUAL_TIMEOUT,
    }
}

fn batch_query(bounds: &GeoBounds, definitions: &[&CategoryDefinition]) -> OverpassQuery {
    let mut text = header(BATCH_TIMEOUT);
    for definition in definitions {
        text.push_str(&format!(
            "make {GROUP_MARKER} {GROUP_TAG}=\"{}\";\nout;\n",
            definition.id
        ));
        push_selection(&mut text, bounds, definition);
    }
    OverpassQuery {
        mode: AcquisitionMode::Batch,
        categories: definitions.iter().map(|def| def.id.clone()).collect(),
        text,
        timeout: BATCH_TIMEOUT,
    }
}
