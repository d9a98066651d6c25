//! Acquire command implementation for the overpoi CLI.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use log::{debug, info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use overpoi_core::{
    CategoryCatalog, CategoryId, CategoryResultSet, FetchStatus, GeoBounds, LayerDirective,
    StatisticsCalculator,
};
use overpoi_data::{
    AcquisitionEvent, AcquisitionOrchestrator, AcquisitionReport, DEFAULT_ENDPOINT,
    DEFAULT_MAX_AREA_KM2, DEFAULT_USER_AGENT, HttpOverpassTransport, HttpTransportConfig,
    OverpassTransport, Sleeper, TokioSleeper,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::export::{write_csv, write_geojson};
use crate::{
    ARG_CATEGORY, ARG_CSV, ARG_EAST, ARG_ENDPOINT, ARG_FALLBACK, ARG_GEOJSON, ARG_MAX_AREA_KM2,
    ARG_NORTH, ARG_SOUTH, ARG_USER_AGENT, ARG_WEST, CliError, ENV_CATEGORY, ENV_EAST, ENV_NORTH,
    ENV_SOUTH, ENV_WEST,
};

/// CLI arguments for the `acquire` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Download points of interest for a bounding box from the \
                 Overpass API. Three or more categories are fetched with one \
                 batch query, fewer with one query each. Options can come \
                 from CLI flags, configuration files, or environment \
                 variables.",
    about = "Acquire points of interest for a bounding box"
)]
#[ortho_config(prefix = "OVERPOI")]
pub(crate) struct AcquireArgs {
    /// Southern edge of the search area in degrees.
    #[arg(long = ARG_SOUTH, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) south: Option<f64>,
    /// Western edge of the search area in degrees.
    #[arg(long = ARG_WEST, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) west: Option<f64>,
    /// Northern edge of the search area in degrees.
    #[arg(long = ARG_NORTH, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) north: Option<f64>,
    /// Eastern edge of the search area in degrees.
    #[arg(long = ARG_EAST, value_name = "deg", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) east: Option<f64>,
    /// Category id to acquire; repeat or comma-separate for several.
    #[arg(long = ARG_CATEGORY, value_name = "id", value_delimiter = ',')]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) category: Vec<String>,
    /// Overpass interpreter URL.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// User-Agent header sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Largest accepted search area in km².
    #[arg(long = ARG_MAX_AREA_KM2, value_name = "km2")]
    #[serde(default)]
    pub(crate) max_area_km2: Option<f64>,
    /// Retry a failed batch request as individual requests.
    #[arg(long = ARG_FALLBACK)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) fallback: bool,
    /// Write the records as a GeoJSON FeatureCollection.
    #[arg(long = ARG_GEOJSON, value_name = "path")]
    #[serde(default)]
    pub(crate) geojson: Option<Utf8PathBuf>,
    /// Write the records as CSV.
    #[arg(long = ARG_CSV, value_name = "path")]
    #[serde(default)]
    pub(crate) csv: Option<Utf8PathBuf>,
}

impl AcquireArgs {
    pub(crate) fn into_config(self) -> Result<AcquireConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AcquireConfig::try_from(merged)
    }
}

/// Resolved `acquire` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AcquireConfig {
    /// Search area.
    pub(crate) bounds: GeoBounds,
    /// Distinct category ids in first-seen order.
    pub(crate) categories: Vec<CategoryId>,
    /// Overpass interpreter URL.
    pub(crate) endpoint: String,
    /// User-Agent header value.
    pub(crate) user_agent: String,
    /// Largest accepted search area in km².
    pub(crate) max_area_km2: f64,
    /// Whether a failed batch is retried individually.
    pub(crate) fallback: bool,
    /// Optional GeoJSON export path.
    pub(crate) geojson: Option<Utf8PathBuf>,
    /// Optional CSV export path.
    pub(crate) csv: Option<Utf8PathBuf>,
}

impl TryFrom<AcquireArgs> for AcquireConfig {
    type Error = CliError;

    fn try_from(args: AcquireArgs) -> Result<Self, Self::Error> {
        let south = require(args.south, ARG_SOUTH, ENV_SOUTH)?;
        let west = require(args.west, ARG_WEST, ENV_WEST)?;
        let north = require(args.north, ARG_NORTH, ENV_NORTH)?;
        let east = require(args.east, ARG_EAST, ENV_EAST)?;
        let bounds = GeoBounds::new(south, west, north, east)?;

        let categories = distinct_categories(&args.category);
        if categories.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_CATEGORY,
                env: ENV_CATEGORY,
            });
        }

        Ok(Self {
            bounds,
            categories,
            endpoint: args.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            user_agent: args
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            max_area_km2: args.max_area_km2.unwrap_or(DEFAULT_MAX_AREA_KM2),
            fallback: args.fallback,
            geojson: args.geojson,
            csv: args.csv,
        })
    }
}

fn require(value: Option<f64>, field: &'static str, env: &'static str) -> Result<f64, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

/// Trim ids, skip blanks and keep the first occurrence of each.
fn distinct_categories(raw: &[String]) -> Vec<CategoryId> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(*id))
        .map(CategoryId::from)
        .collect()
}

/// Builds the Overpass transport for the current invocation.
pub(super) trait TransportBuilder {
    fn build(&self, config: &AcquireConfig) -> Result<Arc<dyn OverpassTransport>, CliError>;
}

pub(super) struct HttpTransportBuilder;

impl TransportBuilder for HttpTransportBuilder {
    fn build(&self, config: &AcquireConfig) -> Result<Arc<dyn OverpassTransport>, CliError> {
        let http_config = HttpTransportConfig::new(config.endpoint.clone())
            .with_user_agent(config.user_agent.clone());
        let transport = HttpOverpassTransport::with_config(http_config).map_err(|source| {
            CliError::BuildTransport {
                endpoint: config.endpoint.clone(),
                source,
            }
        })?;
        Ok(Arc::new(transport))
    }
}

pub(super) fn run_acquire(args: AcquireArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let cancel = CancellationToken::new();
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(async {
        tokio::spawn(cancel_on_interrupt(cancel.clone()));
        run_acquire_with(args, &HttpTransportBuilder, TokioSleeper, &cancel, &mut stdout).await
    })?;
    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupted; finishing with the categories fetched so far");
            cancel.cancel();
        }
        Err(error) => debug!("cannot listen for interrupts: {error}"),
    }
}

/// Resolve configuration, acquire, print the layer summary and write exports.
pub(super) async fn run_acquire_with<S>(
    args: AcquireArgs,
    builder: &dyn TransportBuilder,
    sleeper: S,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<AcquisitionReport, CliError>
where
    S: Sleeper + 'static,
{
    let config = args.into_config()?;
    execute_acquire(&config, builder, sleeper, cancel, writer).await
}

pub(super) async fn execute_acquire<S>(
    config: &AcquireConfig,
    builder: &dyn TransportBuilder,
    sleeper: S,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<AcquisitionReport, CliError>
where
    S: Sleeper + 'static,
{
    let catalog = Arc::new(CategoryCatalog::standard());
    let transport = builder.build(config)?;
    let (sender, receiver) = mpsc::unbounded_channel();
    let orchestrator = AcquisitionOrchestrator::new(Arc::clone(&catalog), transport, sleeper)
        .with_max_area_km2(config.max_area_km2)
        .with_individual_fallback(config.fallback)
        .with_progress(sender);

    let acquisition = async move {
        let report = orchestrator
            .acquire(&config.bounds, &config.categories, cancel)
            .await;
        // Closes the progress channel so the logger below can finish.
        drop(orchestrator);
        report
    };
    let (report, ()) = tokio::join!(acquisition, log_progress(receiver));
    let report = report?;

    let directives = StatisticsCalculator::new(Arc::clone(&catalog))
        .layer_directives(&report.results, &config.bounds)?;
    write_summary(writer, &report, &directives).map_err(CliError::WriteOutput)?;

    if let Some(path) = &config.geojson {
        write_geojson(path, &report.results, &catalog)?;
        info!("wrote GeoJSON to {path}");
    }
    if let Some(path) = &config.csv {
        write_csv(path, &report.results)?;
        info!("wrote CSV to {path}");
    }
    Ok(report)
}

async fn log_progress(mut events: UnboundedReceiver<AcquisitionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AcquisitionEvent::Started { mode, categories } => {
                info!("requesting {categories} categories in {mode} mode");
            }
            AcquisitionEvent::CategoryFinished {
                category,
                records,
                status,
            } => match status.reason() {
                Some(reason) => info!("{category}: {records} records ({reason})"),
                None => info!("{category}: {records} records"),
            },
            AcquisitionEvent::FallingBack { reason } => {
                warn!("batch request failed ({reason}); retrying each category on its own");
            }
            AcquisitionEvent::Finished { mode, failed } => {
                debug!("{mode} run finished with {failed} failed categories");
            }
        }
    }
}

/// Print one line per layer followed by run totals.
pub(crate) fn write_summary(
    writer: &mut dyn Write,
    report: &AcquisitionReport,
    directives: &[LayerDirective],
) -> std::io::Result<()> {
    match &report.batch_failure {
        Some(reason) if report.used_fallback() => {
            writeln!(writer, "mode: {} (batch failed: {reason})", report.mode)?;
        }
        _ => writeln!(writer, "mode: {}", report.mode)?,
    }
    for (result, directive) in report.results.iter().zip(directives) {
        writeln!(
            writer,
            "{} | labels {} | {}",
            directive.statistics,
            if directive.show_labels { "on" } else { "off" },
            describe_status(result)
        )?;
    }
    if report.unattributed > 0 || report.ambiguous > 0 || report.skipped_elements > 0 {
        writeln!(
            writer,
            "dropped features: {} unattributed, {} ambiguous, {} unreadable",
            report.unattributed, report.ambiguous, report.skipped_elements
        )?;
    }
    writeln!(
        writer,
        "{} records, {} of {} categories failed",
        report.record_count(),
        report.failed_count(),
        report.results.len()
    )
}

fn describe_status(result: &CategoryResultSet) -> String {
    match result.fetch_status() {
        FetchStatus::Ok => "ok".to_owned(),
        FetchStatus::PartialFailure(reason) => {
            format!("partial, {} dropped: {reason}", result.dropped())
        }
        FetchStatus::Failed(reason) => format!("failed: {reason}"),
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<AcquireConfig, CliError> {
    let merged = AcquireArgs::merge_from_layers(layers).map_err(CliError::from)?;
    AcquireConfig::try_from(merged)
}
