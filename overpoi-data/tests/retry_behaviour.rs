//! Behavioural tests for retrying delivery of a single query.

use std::cell::RefCell;
use std::time::Duration;

use overpoi_data::test_support::{
    RecordingSleeper, StubTransport, Timeline, block_on_for_tests, response,
};
use overpoi_data::{
    Delivery, DeliveryError, INDIVIDUAL_TIMEOUT, RetryingTransport, TransportError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type Outcome = Result<Delivery, DeliveryError>;

#[fixture]
fn upstream() -> RefCell<Option<StubTransport>> {
    RefCell::new(None)
}

#[fixture]
fn timeline() -> Timeline {
    Timeline::default()
}

#[fixture]
fn outcome() -> RefCell<Option<Outcome>> {
    RefCell::new(None)
}

fn http(status: u16) -> TransportError {
    TransportError::Http {
        url: "stub://overpass".to_owned(),
        status,
        message: String::new(),
    }
}

fn assert_unavailable_after(outcome: &RefCell<Option<Outcome>>, expected: u32) {
    match outcome.borrow().as_ref().expect("query must be delivered") {
        Err(DeliveryError::Unavailable(error)) => assert_eq!(error.attempts, expected),
        other => panic!("expected the upstream to be unavailable, got {other:?}"),
    }
}

#[given("an upstream failing twice with 504 before answering")]
fn flaky_upstream(#[from(upstream)] upstream: &RefCell<Option<StubTransport>>) {
    *upstream.borrow_mut() = Some(StubTransport::scripted([
        Err(http(504)),
        Err(http(504)),
        Ok(response(&[])),
    ]));
}

#[given("an upstream that always answers 503")]
fn unavailable_upstream(#[from(upstream)] upstream: &RefCell<Option<StubTransport>>) {
    *upstream.borrow_mut() = Some(StubTransport::always(Err(http(503))));
}

#[given("an upstream rejecting the query with 400")]
fn rejecting_upstream(#[from(upstream)] upstream: &RefCell<Option<StubTransport>>) {
    *upstream.borrow_mut() = Some(StubTransport::always(Err(http(400))));
}

#[when("a query is delivered")]
fn deliver(
    #[from(upstream)] upstream: &RefCell<Option<StubTransport>>,
    #[from(timeline)] timeline: &Timeline,
    #[from(outcome)] outcome: &RefCell<Option<Outcome>>,
) {
    let stub = upstream
        .borrow()
        .clone()
        .expect("upstream must be configured")
        .with_timeline(timeline.clone());
    let transport =
        RetryingTransport::new(stub, RecordingSleeper::default().with_timeline(timeline.clone()));
    let result = block_on_for_tests(transport.send("[out:json];", INDIVIDUAL_TIMEOUT));
    *outcome.borrow_mut() = Some(result);
}

#[then("delivery succeeds after 3 attempts")]
fn succeeds_after_three(#[from(outcome)] outcome: &RefCell<Option<Outcome>>) {
    let guard = outcome.borrow();
    let delivery = guard
        .as_ref()
        .expect("query must be delivered")
        .as_ref()
        .expect("delivery should succeed");
    assert_eq!(delivery.attempts, 3);
    assert_eq!(delivery.retries(), 2);
}

#[then("the backoff delays were 1 and 2 seconds")]
fn doubling_backoff(#[from(timeline)] timeline: &Timeline) {
    assert_eq!(
        timeline.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[then("delivery fails as upstream unavailable after 3 attempts")]
fn unavailable_after_three(#[from(outcome)] outcome: &RefCell<Option<Outcome>>) {
    assert_unavailable_after(outcome, 3);
}

#[then("delivery fails as upstream unavailable after 1 attempt")]
fn unavailable_after_one(#[from(outcome)] outcome: &RefCell<Option<Outcome>>) {
    assert_unavailable_after(outcome, 1);
}

#[then("no backoff delay was requested")]
fn no_backoff(#[from(timeline)] timeline: &Timeline) {
    assert!(timeline.sleeps().is_empty());
    assert_eq!(timeline.requests().len(), 1);
}

#[scenario(path = "tests/features/retry.feature", index = 0)]
fn recovering_after_transient_failures(
    upstream: RefCell<Option<StubTransport>>,
    timeline: Timeline,
    outcome: RefCell<Option<Outcome>>,
) {
    let _ = (upstream, timeline, outcome);
}

#[scenario(path = "tests/features/retry.feature", index = 1)]
fn giving_up_after_three_attempts(
    upstream: RefCell<Option<StubTransport>>,
    timeline: Timeline,
    outcome: RefCell<Option<Outcome>>,
) {
    let _ = (upstream, timeline, outcome);
}

#[scenario(path = "tests/features/retry.feature", index = 2)]
fn not_retrying_rejected_query(
    upstream: RefCell<Option<StubTransport>>,
    timeline: Timeline,
    outcome: RefCell<Option<Outcome>>,
) {
    let _ = (upstream, timeline, outcome);
}
