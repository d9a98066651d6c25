//! Error types emitted by the overpoi CLI.
//!
//! Keep this error type reasonably small: most helpers return
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use overpoi_core::{BoundsError, CatalogError};
use overpoi_data::{QueryError, TransportBuildError};
use thiserror::Error;

/// Errors emitted by the overpoi CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The bounding box options do not describe a valid rectangle.
    #[error("invalid bounding box: {0}")]
    InvalidBounds(#[from] BoundsError),
    /// The category selection or search area was rejected before any request.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A category in the results is missing from the catalogue.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The HTTP transport could not be constructed.
    #[error("failed to build Overpass transport for {endpoint:?}: {source}")]
    BuildTransport {
        endpoint: String,
        #[source]
        source: TransportBuildError,
    },
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Creating or writing an export file failed.
    #[error("failed to write export to {path:?}: {source}")]
    WriteExport {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Serialising the GeoJSON export failed.
    #[error("failed to serialise GeoJSON for {path:?}: {source}")]
    SerialiseGeoJson {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
