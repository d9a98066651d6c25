//! Test helpers standing in for the Overpass API.

use std::sync::Arc;

use overpoi_data::OverpassTransport;
use overpoi_data::test_support::{StubTransport, node_element, response};

use crate::acquire::{AcquireConfig, TransportBuilder};
use super::*;

/// Hands out clones of one stub so tests can inspect its calls afterwards.
#[derive(Debug, Clone)]
pub(super) struct StubTransportBuilder {
    pub(super) stub: StubTransport,
}

impl StubTransportBuilder {
    /// Answer every query with the same two nodes.
    pub(super) fn two_features() -> Self {
        let body = response(&[node_element(1, 0.004, 0.004), node_element(2, 0.006, 0.006)]);
        Self {
            stub: StubTransport::always(Ok(body)),
        }
    }
}

impl TransportBuilder for StubTransportBuilder {
    fn build(&self, _config: &AcquireConfig) -> Result<Arc<dyn OverpassTransport>, CliError> {
        Ok(Arc::new(self.stub.clone()))
    }
}

/// Bounding box flags for a square of roughly 1.2 km².
pub(super) fn bounding_box_args() -> Vec<String> {
    [
        ("--south", "0"),
        ("--west", "0"),
        ("--north", "0.01"),
        ("--east", "0.01"),
    ]
    .into_iter()
    .flat_map(|(flag, value)| [flag.to_owned(), value.to_owned()])
    .collect()
}
