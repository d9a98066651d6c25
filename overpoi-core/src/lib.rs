//! Core domain types for the overpoi acquisition pipeline.
//!
//! The crate holds the pieces that do not touch the network: validated
//! search rectangles, the category catalogue, POI records and per-category
//! results, and the statistics and labelling rules applied to them.
//! Constructors return `Result` to surface invalid input early.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bounds;
pub mod catalog;
pub mod label;
/// POI records and their upstream tags.
pub mod poi;
pub mod render;
pub mod result;
pub mod statistics;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use bounds::{BoundsError, GeoBounds, KM_PER_DEGREE};
pub use catalog::{CatalogError, CategoryCatalog, CategoryDefinition, CategoryGroup, CategoryId};
pub use label::{LABEL_DENSITY_THRESHOLD, LABEL_MIN_AREA_KM2, should_label};
pub use poi::{ElementKind, PoiRecord, Tags};
pub use render::LayerDirective;
pub use result::{CategoryResultSet, FailureKind, FailureReason, FetchStatus, RequestScope};
pub use statistics::{CategoryStatistics, MIN_AREA_EPSILON_KM2, StatisticsCalculator};
