//! Per-category outcome of an acquisition run.
//!
//! Every requested category yields exactly one [`CategoryResultSet`], so
//! callers never need to check for a missing entry. Failures carry a
//! display-ready reason and record whether they hit the whole batch or a
//! single request.

use std::fmt;

use crate::{CategoryId, PoiRecord};

/// What went wrong for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum FailureKind {
    /// The endpoint failed after exhausting retries, or rejected the query.
    UpstreamUnavailable,
    /// The response could not be interpreted.
    MalformedResponse,
    /// The run was cancelled before this category was fetched.
    Cancelled,
    /// Some features matched several requested categories and were dropped.
    AmbiguousAttribution,
    /// Some features had no usable location and were dropped.
    UnlocatedFeatures,
}

/// Which request a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum RequestScope {
    /// The single combined request covering every category.
    Batch,
    /// The request dedicated to one category.
    Individual,
}

/// Explanation attached to a non-`Ok` [`FetchStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FailureReason {
    /// Failure classification.
    pub kind: FailureKind,
    /// Request the failure belongs to.
    pub scope: RequestScope,
    /// Message suitable for display.
    pub message: String,
}

impl FailureReason {
    /// Describe a failure.
    pub fn new(kind: FailureKind, scope: RequestScope, message: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            message: message.into(),
        }
    }

    /// Whether the failure affected every category of a batch request.
    #[must_use]
    pub fn is_batch_wide(&self) -> bool {
        self.scope == RequestScope::Batch
            && matches!(
                self.kind,
                FailureKind::UpstreamUnavailable | FailureKind::MalformedResponse
            )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Fetch outcome for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "status", content = "reason", rename_all = "snake_case")
)]
pub enum FetchStatus {
    /// All returned features were kept.
    Ok,
    /// Records are usable but some features were dropped.
    PartialFailure(FailureReason),
    /// No records could be obtained.
    Failed(FailureReason),
}

impl FetchStatus {
    /// Whether the status is [`FetchStatus::Ok`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether the status is [`FetchStatus::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The attached reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Ok => None,
            Self::PartialFailure(reason) | Self::Failed(reason) => Some(reason),
        }
    }
}

/// Records fetched for one category, with their fetch status.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use overpoi_core::{CategoryId, CategoryResultSet, ElementKind, PoiRecord};
///
/// let school = CategoryId::from("school");
/// let record = PoiRecord::with_empty_tags(1, ElementKind::Node, school.clone(), Coord { x: 0.0, y: 0.0 });
/// let result = CategoryResultSet::fetched(school, vec![record]);
/// assert!(result.fetch_status().is_ok());
/// assert_eq!(result.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CategoryResultSet {
    category: CategoryId,
    records: Vec<PoiRecord>,
    fetch_status: FetchStatus,
    dropped: usize,
}

impl CategoryResultSet {
    /// A successful fetch.
    #[must_use]
    pub const fn fetched(category: CategoryId, records: Vec<PoiRecord>) -> Self {
        Self {
            category,
            records,
            fetch_status: FetchStatus::Ok,
            dropped: 0,
        }
    }

    /// A fetch that kept `records` but dropped `dropped` features.
    #[must_use]
    pub const fn partial(
        category: CategoryId,
        records: Vec<PoiRecord>,
        reason: FailureReason,
        dropped: usize,
    ) -> Self {
        Self {
            category,
            records,
            fetch_status: FetchStatus::PartialFailure(reason),
            dropped,
        }
    }

    /// A failed fetch without records.
    #[must_use]
    pub const fn failed(category: CategoryId, reason: FailureReason) -> Self {
        Self {
            category,
            records: Vec::new(),
            fetch_status: FetchStatus::Failed(reason),
            dropped: 0,
        }
    }

    /// Requested category.
    #[must_use]
    pub const fn category(&self) -> &CategoryId {
        &self.category
    }

    /// Records in upstream order.
    #[must_use]
    pub fn records(&self) -> &[PoiRecord] {
        &self.records
    }

    /// Fetch status.
    #[must_use]
    pub const fn fetch_status(&self) -> &FetchStatus {
        &self.fetch_status
    }

    /// Features dropped for this category.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take ownership of the records.
    #[must_use]
    pub fn into_records(self) -> Vec<PoiRecord> {
        self.records
    }
}
