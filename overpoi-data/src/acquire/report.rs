//! Outcome of an acquisition run and the progress events emitted on the way.

use std::collections::HashMap;

use overpoi_core::{CategoryId, CategoryResultSet, FailureReason, FetchStatus};

use crate::query::AcquisitionMode;

/// Result sets for one run, one per requested category.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AcquisitionReport {
    /// Mode that produced `results`.
    pub mode: AcquisitionMode,
    /// Result sets in request order.
    pub results: Vec<CategoryResultSet>,
    /// Failure of the batch request, also set when a fallback ran after it.
    pub batch_failure: Option<FailureReason>,
    /// Batch features that matched no requested category.
    pub unattributed: usize,
    /// Batch features that matched more than one requested category.
    pub ambiguous: usize,
    /// Unreadable elements that could not be charged to any category.
    pub skipped_elements: usize,
}

impl AcquisitionReport {
    pub(crate) const fn new(mode: AcquisitionMode, results: Vec<CategoryResultSet>) -> Self {
        Self {
            mode,
            results,
            batch_failure: None,
            unattributed: 0,
            ambiguous: 0,
            skipped_elements: 0,
        }
    }

    /// Result set for `category`.
    #[must_use]
    pub fn get(&self, category: &CategoryId) -> Option<&CategoryResultSet> {
        self.results
            .iter()
            .find(|result| result.category() == category)
    }

    /// Number of categories whose fetch failed outright.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.fetch_status().is_failed())
            .count()
    }

    /// Total records across all categories.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.results.iter().map(CategoryResultSet::len).sum()
    }

    /// Whether the results come from an individual rerun of a failed batch.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.mode == AcquisitionMode::Individual && self.batch_failure.is_some()
    }

    /// Key the result sets by category.
    #[must_use]
    pub fn into_map(self) -> HashMap<CategoryId, CategoryResultSet> {
        self.results
            .into_iter()
            .map(|result| (result.category().clone(), result))
            .collect()
    }
}

/// Progress notifications sent while a run is under way.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// Validation passed and the first request is about to be made.
    Started {
        /// Chosen mode.
        mode: AcquisitionMode,
        /// Number of categories requested.
        categories: usize,
    },
    /// A category's result set is final for the current mode.
    CategoryFinished {
        /// Category concerned.
        category: CategoryId,
        /// Records kept.
        records: usize,
        /// Fetch status.
        status: FetchStatus,
    },
    /// The batch request failed and the selection is rerun individually.
    FallingBack {
        /// Why the batch failed.
        reason: FailureReason,
    },
    /// The run is over.
    Finished {
        /// Mode of the reported results.
        mode: AcquisitionMode,
        /// Categories that failed outright.
        failed: usize,
    },
}
