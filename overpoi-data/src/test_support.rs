//! Deterministic doubles for the network and the clock.
//!
//! [`StubTransport`] replays scripted responses without touching the
//! network and [`RecordingSleeper`] returns immediately while noting each
//! requested delay. Both can share a [`Timeline`] so tests can assert the
//! exact interleaving of requests and pauses.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::query::{GROUP_MARKER, GROUP_TAG};
use crate::transport::{OverpassTransport, Sleeper, TransportError};

/// One observable step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    /// A query was posted.
    Request {
        /// Query text.
        query: String,
        /// Timeout passed with the query.
        timeout: Duration,
    },
    /// A delay was requested.
    Sleep(Duration),
}

/// Shared, ordered log of requests and sleeps.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Arc<Mutex<Vec<TimelineEntry>>>,
}

impl Timeline {
    fn push(&self, entry: TimelineEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of every entry in order.
    #[must_use]
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requested delays in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Sleep(duration) => Some(duration),
                TimelineEntry::Request { .. } => None,
            })
            .collect()
    }

    /// Posted queries with their timeouts, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, Duration)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Request { query, timeout } => Some((query, timeout)),
                TimelineEntry::Sleep(_) => None,
            })
            .collect()
    }
}

type StubResponse = Result<String, TransportError>;

/// Stub [`OverpassTransport`] replaying scripted responses.
///
/// Clones share their script, call counter and timeline.
#[derive(Debug, Clone)]
pub struct StubTransport {
    script: Arc<Mutex<VecDeque<StubResponse>>>,
    repeat: Option<StubResponse>,
    calls: Arc<AtomicU32>,
    timeline: Timeline,
    cancel_on_post: Option<CancellationToken>,
}

impl StubTransport {
    /// Return `responses` in order, then fail with a network error.
    pub fn scripted(responses: impl IntoIterator<Item = StubResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into_iter().collect())),
            repeat: None,
            calls: Arc::new(AtomicU32::new(0)),
            timeline: Timeline::default(),
            cancel_on_post: None,
        }
    }

    /// Return `response` for every call.
    #[must_use]
    pub fn always(response: StubResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::scripted([])
        }
    }

    /// Record requests on `timeline`.
    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    /// Cancel `token` once each response has been produced.
    #[must_use]
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_post = Some(token);
        self
    }

    /// Number of calls to [`OverpassTransport::post`] so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Timeline the stub records on.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn next_response(&self) -> StubResponse {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| {
                Err(TransportError::Network {
                    url: "stub://overpass".to_owned(),
                    message: "stub script exhausted".to_owned(),
                })
            })
    }
}

#[async_trait]
impl OverpassTransport for StubTransport {
    async fn post(&self, query: &str, timeout: Duration) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeline.push(TimelineEntry::Request {
            query: query.to_owned(),
            timeout,
        });
        let response = self.next_response();
        if let Some(token) = &self.cancel_on_post {
            token.cancel();
        }
        response
    }
}

/// [`Sleeper`] that returns immediately and records each delay.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    timeline: Timeline,
    cancel_on_sleep: Option<CancellationToken>,
}

impl RecordingSleeper {
    /// Record delays on `timeline`.
    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    /// Cancel `token` whenever a delay is requested.
    #[must_use]
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_sleep = Some(token);
        self
    }

    /// Timeline the sleeper records on.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.timeline.push(TimelineEntry::Sleep(duration));
        if let Some(token) = &self.cancel_on_sleep {
            token.cancel();
        }
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics when the runtime cannot be built.
pub fn block_on_for_tests<F>(future: F) -> F::Output
where
    F: Future,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(future)
}

/// A tagless Overpass node element.
#[must_use]
pub fn node_element(id: u64, lon: f64, lat: f64) -> Value {
    json!({"type": "node", "id": id, "lat": lat, "lon": lon})
}

/// An Overpass way element reduced to its centre.
#[must_use]
pub fn way_element(id: u64, lon: f64, lat: f64) -> Value {
    json!({"type": "way", "id": id, "center": {"lat": lat, "lon": lon}})
}

/// The marker element a batch query emits before `category`'s features.
#[must_use]
pub fn marker_element(id: u64, category: &str) -> Value {
    json!({"type": GROUP_MARKER, "id": id, "tags": {GROUP_TAG: category}})
}

/// Wrap elements in an Overpass JSON document.
#[must_use]
pub fn response(elements: &[Value]) -> String {
    json!({"version": 0.6, "generator": "stub", "elements": elements}).to_string()
}
