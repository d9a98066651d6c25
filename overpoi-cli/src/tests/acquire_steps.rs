//! Behaviour-driven step definitions driving the acquire CLI scenarios.

use crate::acquire::run_acquire_with;
use super::helpers::{StubTransportBuilder, bounding_box_args};
use super::*;
use camino::Utf8PathBuf;
use overpoi_data::AcquisitionReport;
use overpoi_data::test_support::{RecordingSleeper, block_on_for_tests};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct AcquireWorld {
    _tmp: TempDir,
    root: Utf8PathBuf,
    builder: RefCell<Option<StubTransportBuilder>>,
    cli_args: RefCell<Vec<String>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<AcquisitionReport, CliError>>>,
}

impl AcquireWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _tmp: tmp,
            root,
            builder: RefCell::new(None),
            cli_args: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn geojson_path(&self) -> Utf8PathBuf {
        self.root.join("exports/pois.geojson")
    }

    fn csv_path(&self) -> Utf8PathBuf {
        self.root.join("exports/pois.csv")
    }

    fn stdout(&self) -> String {
        String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8")
    }

    fn expect_error<F>(&self, check: F)
    where
        F: FnOnce(&CliError),
    {
        let borrowed = self.result.borrow();
        let error = borrowed
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect_err("expected error");
        check(error);
    }

    fn request_count(&self) -> u32 {
        self.builder
            .borrow()
            .as_ref()
            .expect("upstream configured")
            .stub
            .calls()
    }
}

#[fixture]
fn world() -> AcquireWorld {
    AcquireWorld::new()
}

#[given("the Overpass API answers every query with two features")]
fn upstream_with_two_features(#[from(world)] world: &AcquireWorld) {
    world
        .builder
        .replace(Some(StubTransportBuilder::two_features()));
}

#[given("I pass a bounding box and the categories \"{categories}\"")]
fn bounding_box_and_categories(#[from(world)] world: &AcquireWorld, categories: String) {
    let mut args = world.cli_args.borrow_mut();
    args.extend(bounding_box_args());
    args.extend([format!("--{ARG_CATEGORY}"), categories]);
}

#[given("I pass only a bounding box")]
fn only_bounding_box(#[from(world)] world: &AcquireWorld) {
    world.cli_args.borrow_mut().extend(bounding_box_args());
}

#[given("I pass a bounding box with south above north")]
fn inverted_bounding_box(#[from(world)] world: &AcquireWorld) {
    world.cli_args.borrow_mut().extend([
        "--south=0.01".to_owned(),
        "--west=0".to_owned(),
        "--north=0".to_owned(),
        "--east=0.01".to_owned(),
        format!("--{ARG_CATEGORY}=school"),
    ]);
}

#[given("I request GeoJSON and CSV exports")]
fn request_exports(#[from(world)] world: &AcquireWorld) {
    world.cli_args.borrow_mut().extend([
        format!("--{ARG_GEOJSON}"),
        world.geojson_path().into_string(),
        format!("--{ARG_CSV}"),
        world.csv_path().into_string(),
    ]);
}

#[when("I run the acquire command")]
fn run_acquire_command(#[from(world)] world: &AcquireWorld) {
    let mut invocation = vec!["overpoi".to_owned(), "acquire".to_owned()];
    invocation.extend(world.cli_args.borrow().iter().cloned());
    let builder = world
        .builder
        .borrow()
        .clone()
        .expect("upstream configured");
    let outcome = Cli::try_parse_from(invocation)
        .map_err(CliError::from)
        .and_then(|cli| match cli.command {
            Command::Acquire(args) => {
                let mut buffer = world.stdout.borrow_mut();
                block_on_for_tests(run_acquire_with(
                    args,
                    &builder,
                    RecordingSleeper::default(),
                    &CancellationToken::new(),
                    &mut *buffer,
                ))
            }
            Command::Categories => panic!("expected acquire command"),
        });
    world.result.replace(Some(outcome));
}

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &AcquireWorld) {
    let borrowed = world.result.borrow();
    let outcome = borrowed.as_ref().expect("result recorded");
    if let Err(error) = outcome {
        panic!("expected success, found {error:?}");
    }
}

#[then("the summary reports individual mode")]
fn summary_reports_individual(#[from(world)] world: &AcquireWorld) {
    let stdout = world.stdout();
    assert!(
        stdout.starts_with("mode: individual\n"),
        "unexpected summary: {stdout}"
    );
}

#[then("the summary lists 2 labelled layers")]
fn summary_lists_layers(#[from(world)] world: &AcquireWorld) {
    let stdout = world.stdout();
    let layers: Vec<&str> = stdout
        .lines()
        .filter(|line| line.contains(" | labels "))
        .collect();
    assert_eq!(layers.len(), 2, "unexpected summary: {stdout}");
    assert!(layers.iter().all(|line| line.contains("labels on | ok")));
    assert!(layers[0].starts_with("2 school:"));
    assert!(layers[1].starts_with("2 hospital:"));
    assert!(stdout.ends_with("4 records, 0 of 2 categories failed\n"));
}

#[then("both export files hold 2 records")]
fn exports_hold_records(#[from(world)] world: &AcquireWorld) {
    let geojson = std::fs::read_to_string(world.geojson_path().as_std_path()).expect("geojson");
    let collection: serde_json::Value = serde_json::from_str(&geojson).expect("valid GeoJSON");
    let features = collection["features"].as_array().expect("features array");
    assert_eq!(features.len(), 2);

    let csv = std::fs::read_to_string(world.csv_path().as_std_path()).expect("csv");
    assert_eq!(csv.lines().count(), 3, "header plus one row per record");
}

#[then("the CLI reports that the \"category\" option is missing")]
fn reports_missing_category(#[from(world)] world: &AcquireWorld) {
    world.expect_error(|error| match error {
        CliError::MissingArgument { field, env } => {
            assert_eq!(*field, ARG_CATEGORY);
            assert_eq!(*env, ENV_CATEGORY);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    });
}

#[then("the CLI reports an invalid bounding box")]
fn reports_invalid_bounds(#[from(world)] world: &AcquireWorld) {
    world.expect_error(|error| match error {
        CliError::InvalidBounds(_) => {}
        other => panic!("expected InvalidBounds, found {other:?}"),
    });
}

#[then("no request was sent")]
fn no_request_sent(#[from(world)] world: &AcquireWorld) {
    assert_eq!(world.request_count(), 0);
}

macro_rules! register_acquire_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/acquire_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: AcquireWorld) {
            let _ = world;
        }
    };
}

register_acquire_scenario!(
    acquiring_two_categories,
    "acquiring two categories within a bounding box"
);
register_acquire_scenario!(exporting_records, "exporting records to GeoJSON and CSV");
register_acquire_scenario!(
    rejecting_missing_categories,
    "rejecting a command without categories"
);
register_acquire_scenario!(
    rejecting_inverted_bounds,
    "rejecting an inverted bounding box"
);
