//! End-to-end acquisition runs.
//!
//! The orchestrator validates the selection, picks batch or individual mode,
//! sends the queries one at a time through a [`RetryingTransport`], parses
//! the responses and aggregates one [`CategoryResultSet`] per requested
//! category.
//!
//! Failure isolation differs by mode: an individual request failing only
//! affects its own category, while a failed batch request fails every
//! category with the same reason.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use overpoi_core::{
    CategoryCatalog, CategoryId, CategoryResultSet, FailureKind, FailureReason, GeoBounds,
    RequestScope,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::parse::{Attribution, ParseError, ParsedCategory, parse_response};
use crate::query::{AcquisitionMode, OverpassQuery, QueryBuilder, QueryError};
use crate::transport::{
    DeliveryError, OverpassTransport, RetryPolicy, RetryingTransport, Sleeper,
};

mod report;

pub use report::{AcquisitionEvent, AcquisitionReport};

/// Pause between consecutive requests of one run.
pub const INTER_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// Runs acquisitions against one transport and catalogue.
///
/// Runs are `&self`-only and share no mutable state, so one orchestrator
/// can serve several runs.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use overpoi_core::{CategoryCatalog, CategoryId, GeoBounds};
/// use overpoi_data::AcquisitionOrchestrator;
/// use overpoi_data::test_support::{RecordingSleeper, StubTransport, block_on_for_tests};
/// use tokio_util::sync::CancellationToken;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = StubTransport::always(Ok(r#"{"elements": []}"#.to_owned()));
/// let orchestrator = AcquisitionOrchestrator::new(
///     Arc::new(CategoryCatalog::standard()),
///     transport,
///     RecordingSleeper::default(),
/// );
/// let bounds = GeoBounds::new(51.50, -0.13, 51.52, -0.10)?;
/// let selection = [CategoryId::from("school")];
/// let report = block_on_for_tests(orchestrator.acquire(&bounds, &selection, &CancellationToken::new()))?;
/// assert_eq!(report.results.len(), 1);
/// assert!(report.results[0].fetch_status().is_ok());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AcquisitionOrchestrator<T, S> {
    queries: QueryBuilder,
    transport: RetryingTransport<T, S>,
    individual_fallback: bool,
    progress: Option<UnboundedSender<AcquisitionEvent>>,
}

impl<T, S> AcquisitionOrchestrator<T, S>
where
    T: OverpassTransport,
    S: Sleeper,
{
    /// Create an orchestrator with default limits and no fallback.
    pub fn new(catalog: Arc<CategoryCatalog>, transport: T, sleeper: S) -> Self {
        Self {
            queries: QueryBuilder::new(catalog),
            transport: RetryingTransport::new(transport, sleeper),
            individual_fallback: false,
            progress: None,
        }
    }

    /// Override the largest accepted search area.
    #[must_use]
    pub fn with_max_area_km2(mut self, max_area_km2: f64) -> Self {
        self.queries = self.queries.with_max_area_km2(max_area_km2);
        self
    }

    /// Rerun a failed batch as individual requests.
    #[must_use]
    pub fn with_individual_fallback(mut self, enabled: bool) -> Self {
        self.individual_fallback = enabled;
        self
    }

    /// Send progress events to `sender`.
    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<AcquisitionEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.transport = self.transport.with_policy(policy);
        self
    }

    /// Query builder used for validation and query text.
    pub const fn query_builder(&self) -> &QueryBuilder {
        &self.queries
    }

    /// Acquire `categories` within `bounds`, choosing the mode from the
    /// selection size.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the selection or bounds are invalid; no
    /// request is made in that case. Upstream failures are reported per
    /// category in the returned report instead.
    pub async fn acquire(
        &self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
        cancel: &CancellationToken,
    ) -> Result<AcquisitionReport, QueryError> {
        let mode = AcquisitionMode::for_category_count(categories.len());
        self.acquire_with_mode(bounds, categories, mode, cancel)
            .await
    }

    /// Acquire `categories` within `bounds` in an explicit mode.
    ///
    /// # Errors
    ///
    /// See [`Self::acquire`].
    pub async fn acquire_with_mode(
        &self,
        bounds: &GeoBounds,
        categories: &[CategoryId],
        mode: AcquisitionMode,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionReport, QueryError> {
        self.queries.validate(bounds, categories)?;
        info!(
            "acquiring {} categories within {bounds} in {mode} mode",
            categories.len()
        );
        self.emit(AcquisitionEvent::Started {
            mode,
            categories: categories.len(),
        });

        let report = match mode {
            AcquisitionMode::Individual => {
                let queries = self.queries.build_individual(bounds, categories)?;
                self.run_individual(categories, queries, cancel).await
            }
            AcquisitionMode::Batch => {
                let query = self.queries.build_batch(bounds, categories)?;
                let batch = self.run_batch(query, cancel).await;
                self.maybe_fall_back(batch, bounds, categories, cancel)
                    .await?
            }
        };

        info!(
            "acquisition finished: {} records, {} of {} categories failed",
            report.record_count(),
            report.failed_count(),
            report.results.len()
        );
        self.emit(AcquisitionEvent::Finished {
            mode: report.mode,
            failed: report.failed_count(),
        });
        Ok(report)
    }

    async fn run_individual(
        &self,
        categories: &[CategoryId],
        queries: Vec<OverpassQuery>,
        cancel: &CancellationToken,
    ) -> AcquisitionReport {
        let mut results = Vec::with_capacity(queries.len());
        let mut skipped_elements = 0;
        for (position, (category, query)) in categories.iter().zip(queries).enumerate() {
            let proceed = position == 0 || self.pause(cancel).await;
            let result = if proceed && !cancel.is_cancelled() {
                let (result, skipped) = self.fetch_one(category, &query, cancel).await;
                skipped_elements += skipped;
                result
            } else {
                CategoryResultSet::failed(
                    category.clone(),
                    cancelled_reason(RequestScope::Individual),
                )
            };
            self.finished(&result);
            results.push(result);
        }
        let mut report = AcquisitionReport::new(AcquisitionMode::Individual, results);
        report.skipped_elements = skipped_elements;
        report
    }

    async fn fetch_one(
        &self,
        category: &CategoryId,
        query: &OverpassQuery,
        cancel: &CancellationToken,
    ) -> (CategoryResultSet, usize) {
        let scope = RequestScope::Individual;
        let delivery = match self
            .transport
            .send_until(&query.text, query.timeout, cancel)
            .await
        {
            Ok(delivery) => delivery,
            Err(error) => {
                let failed =
                    CategoryResultSet::failed(category.clone(), delivery_reason(&error, scope));
                return (failed, 0);
            }
        };
        debug!(
            "received {} bytes for '{category}' after {} attempt(s)",
            delivery.body.len(),
            delivery.attempts
        );
        match parse_response(&delivery.body, &Attribution::Single(category.clone())) {
            Ok(parsed) => {
                let result = parsed.categories.into_iter().next().map_or_else(
                    || CategoryResultSet::fetched(category.clone(), Vec::new()),
                    |parsed_category| category_result(parsed_category, scope),
                );
                (result, parsed.skipped_elements)
            }
            Err(error) => {
                warn!("response for '{category}' could not be parsed: {error}");
                let failed =
                    CategoryResultSet::failed(category.clone(), parse_reason(&error, scope));
                (failed, 0)
            }
        }
    }

    async fn run_batch(&self, query: OverpassQuery, cancel: &CancellationToken) -> AcquisitionReport {
        let scope = RequestScope::Batch;
        let categories = query.categories;
        let outcome = self
            .transport
            .send_until(&query.text, query.timeout, cancel)
            .await;

        let failure = match outcome {
            Err(error) => delivery_reason(&error, scope),
            Ok(_) if cancel.is_cancelled() => cancelled_reason(scope),
            Ok(delivery) => {
                match parse_response(&delivery.body, &Attribution::Grouped(categories.clone())) {
                    Ok(parsed) => {
                        let results: Vec<_> = parsed
                            .categories
                            .into_iter()
                            .map(|parsed_category| category_result(parsed_category, scope))
                            .collect();
                        results.iter().for_each(|result| self.finished(result));
                        let mut report = AcquisitionReport::new(AcquisitionMode::Batch, results);
                        report.unattributed = parsed.unattributed;
                        report.ambiguous = parsed.ambiguous;
                        report.skipped_elements = parsed.skipped_elements;
                        return report;
                    }
                    Err(error) => parse_reason(&error, scope),
                }
            }
        };

        warn!("batch request failed for all {} categories: {failure}", categories.len());
        let results: Vec<_> = categories
            .into_iter()
            .map(|category| CategoryResultSet::failed(category, failure.clone()))
            .collect();
        results.iter().for_each(|result| self.finished(result));
        let mut report = AcquisitionReport::new(AcquisitionMode::Batch, results);
        if failure.is_batch_wide() {
            report.batch_failure = Some(failure);
        }
        report
    }

    async fn maybe_fall_back(
        &self,
        batch: AcquisitionReport,
        bounds: &GeoBounds,
        categories: &[CategoryId],
        cancel: &CancellationToken,
    ) -> Result<AcquisitionReport, QueryError> {
        let Some(reason) = batch.batch_failure.clone() else {
            return Ok(batch);
        };
        if !self.individual_fallback || cancel.is_cancelled() {
            return Ok(batch);
        }
        warn!("falling back to individual requests after batch failure: {reason}");
        self.emit(AcquisitionEvent::FallingBack {
            reason: reason.clone(),
        });
        if !self.pause(cancel).await {
            return Ok(batch);
        }
        let queries = self.queries.build_individual(bounds, categories)?;
        let mut report = self.run_individual(categories, queries, cancel).await;
        report.batch_failure = Some(reason);
        Ok(report)
    }

    /// Wait out the inter-request delay; `false` when cancelled meanwhile.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.transport.sleeper().sleep(INTER_REQUEST_DELAY) => !cancel.is_cancelled(),
        }
    }

    fn finished(&self, result: &CategoryResultSet) {
        if let Some(reason) = result.fetch_status().reason() {
            info!("category '{}': {reason}", result.category());
        }
        self.emit(AcquisitionEvent::CategoryFinished {
            category: result.category().clone(),
            records: result.len(),
            status: result.fetch_status().clone(),
        });
    }

    fn emit(&self, event: AcquisitionEvent) {
        if let Some(sender) = &self.progress {
            if sender.send(event).is_err() {
                debug!("progress receiver dropped");
            }
        }
    }
}

fn category_result(parsed: ParsedCategory, scope: RequestScope) -> CategoryResultSet {
    let dropped = parsed.dropped();
    if dropped == 0 {
        return CategoryResultSet::fetched(parsed.category, parsed.records);
    }
    let kind = if parsed.ambiguous > 0 {
        FailureKind::AmbiguousAttribution
    } else if parsed.malformed > 0 {
        FailureKind::MalformedResponse
    } else {
        FailureKind::UnlocatedFeatures
    };
    let parts: Vec<String> = [
        (parsed.ambiguous, "matching several categories"),
        (parsed.malformed, "unreadable"),
        (parsed.unlocated, "without a location"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, what)| format!("{count} feature(s) {what}"))
    .collect();
    CategoryResultSet::partial(
        parsed.category,
        parsed.records,
        FailureReason::new(kind, scope, format!("{} dropped", parts.join(" and "))),
        dropped,
    )
}

fn delivery_reason(error: &DeliveryError, scope: RequestScope) -> FailureReason {
    match error {
        DeliveryError::Unavailable(unavailable) => FailureReason::new(
            FailureKind::UpstreamUnavailable,
            scope,
            unavailable.to_string(),
        ),
        DeliveryError::Cancelled { .. } => cancelled_reason(scope),
    }
}

fn parse_reason(error: &ParseError, scope: RequestScope) -> FailureReason {
    let kind = match error {
        ParseError::Malformed { .. } => FailureKind::MalformedResponse,
        ParseError::UpstreamRemark { .. } => FailureKind::UpstreamUnavailable,
    };
    FailureReason::new(kind, scope, error.to_string())
}

fn cancelled_reason(scope: RequestScope) -> FailureReason {
    FailureReason::new(FailureKind::Cancelled, scope, "cancelled before completion")
}
