//! Behavioural tests for the label policy.

use std::cell::{Cell, RefCell};

use overpoi_core::{CategoryStatistics, should_label};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[fixture]
fn statistics() -> RefCell<Option<CategoryStatistics>> {
    RefCell::new(None)
}

#[fixture]
fn decision() -> Cell<Option<bool>> {
    Cell::new(None)
}

fn schools(count: usize, area_km2: f64) -> CategoryStatistics {
    CategoryStatistics::from_parts("school".into(), count, area_km2, None)
}

#[given("a search area of 0.005 km² containing 50 schools")]
fn tiny_dense_area(#[from(statistics)] statistics: &RefCell<Option<CategoryStatistics>>) {
    *statistics.borrow_mut() = Some(schools(50, 0.005));
}

#[given("a search area of 1 km² containing 15 schools")]
fn dense_area(#[from(statistics)] statistics: &RefCell<Option<CategoryStatistics>>) {
    *statistics.borrow_mut() = Some(schools(15, 1.0));
}

#[given("a search area of 1 km² containing 5 schools")]
fn sparse_area(#[from(statistics)] statistics: &RefCell<Option<CategoryStatistics>>) {
    *statistics.borrow_mut() = Some(schools(5, 1.0));
}

#[when("the label decision is made")]
fn decide(
    #[from(statistics)] statistics: &RefCell<Option<CategoryStatistics>>,
    #[from(decision)] decision: &Cell<Option<bool>>,
) {
    let guard = statistics.borrow();
    let stats = guard.as_ref().expect("statistics must be prepared");
    decision.set(Some(should_label(stats)));
}

#[then("labels are enabled")]
fn labels_enabled(#[from(decision)] decision: &Cell<Option<bool>>) {
    assert_eq!(decision.get(), Some(true), "expected labels to be enabled");
}

#[then("labels are disabled")]
fn labels_disabled(#[from(decision)] decision: &Cell<Option<bool>>) {
    assert_eq!(decision.get(), Some(false), "expected labels to be disabled");
}

#[scenario(path = "tests/features/label_policy.feature", index = 0)]
fn labelling_tiny_areas(
    statistics: RefCell<Option<CategoryStatistics>>,
    decision: Cell<Option<bool>>,
) {
    let _ = (statistics, decision);
}

#[scenario(path = "tests/features/label_policy.feature", index = 1)]
fn hiding_dense_labels(
    statistics: RefCell<Option<CategoryStatistics>>,
    decision: Cell<Option<bool>>,
) {
    let _ = (statistics, decision);
}

#[scenario(path = "tests/features/label_policy.feature", index = 2)]
fn labelling_sparse_layers(
    statistics: RefCell<Option<CategoryStatistics>>,
    decision: Cell<Option<bool>>,
) {
    let _ = (statistics, decision);
}
