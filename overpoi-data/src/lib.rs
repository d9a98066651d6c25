//! Network-facing half of the overpoi pipeline.
//!
//! Responsibilities:
//! - Build Overpass QL queries for a bounding box and a category selection.
//! - Deliver queries over HTTP with bounded, backed-off retries.
//! - Parse Overpass JSON into [`overpoi_core::PoiRecord`]s per category.
//! - Orchestrate a whole acquisition run in batch or individual mode.
//!
//! Boundaries:
//! - Domain rules (bounds, catalogue, statistics) live in `overpoi-core`.
//! - The wire call and the clock sit behind traits so tests never touch the
//!   network or wait on wall-clock time.
//!
//! Invariants:
//! - Requests are issued one at a time.
//! - Every requested category ends up with exactly one result set.

#![forbid(unsafe_code)]

pub mod acquire;
pub mod parse;
pub mod query;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

pub use acquire::{
    AcquisitionEvent, AcquisitionOrchestrator, AcquisitionReport, INTER_REQUEST_DELAY,
};
pub use parse::{Attribution, ParseError, ParsedCategory, ParsedResponse, parse_response};
pub use query::{
    AcquisitionMode, BATCH_THRESHOLD, BATCH_TIMEOUT, DEFAULT_MAX_AREA_KM2, INDIVIDUAL_TIMEOUT,
    OverpassQuery, QueryBuilder, QueryError,
};
pub use transport::{
    AttemptOutcome, BACKOFF_BASE, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, Delivery, DeliveryError,
    HttpOverpassTransport, HttpTransportConfig, MAX_ATTEMPTS, OverpassTransport, RetryPolicy,
    RetryState, RetryingTransport, Sleeper, TokioSleeper, TransportBuildError, TransportError,
    UpstreamUnavailable,
};
