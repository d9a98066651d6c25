//! Facade crate for the overpoi acquisition pipeline.
//!
//! This crate re-exports the core domain types and, behind the `acquire`
//! feature, the Overpass query, transport and orchestration layer.

#![forbid(unsafe_code)]

pub use overpoi_core::{
    BoundsError, CatalogError, CategoryCatalog, CategoryDefinition, CategoryGroup, CategoryId,
    CategoryResultSet, CategoryStatistics, ElementKind, FailureKind, FailureReason, FetchStatus,
    GeoBounds, LayerDirective, PoiRecord, RequestScope, StatisticsCalculator, Tags,
    should_label,
};

#[cfg(feature = "acquire")]
pub use overpoi_data::{
    AcquisitionEvent, AcquisitionMode, AcquisitionOrchestrator, AcquisitionReport,
    HttpOverpassTransport, HttpTransportConfig, OverpassTransport, QueryBuilder, QueryError,
    RetryPolicy, RetryingTransport, Sleeper, TokioSleeper, TransportError, UpstreamUnavailable,
};
