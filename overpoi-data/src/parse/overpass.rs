//! Overpass JSON response types.
//!
//! Only the fields the parser reads are modelled. Elements stay as raw
//! [`serde_json::Value`]s at the top level so one malformed element cannot
//! spoil the whole response.
//!
//! See: <https://wiki.openstreetmap.org/wiki/Overpass_API/Output_Formats#JSON>

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Top-level Overpass JSON document.
#[derive(Debug, Deserialize)]
pub(crate) struct OverpassResponse {
    /// Result elements in output order.
    pub elements: Vec<Value>,
    /// Server remark, set when the query hit a runtime problem.
    #[serde(default)]
    pub remark: Option<String>,
}

impl OverpassResponse {
    /// The remark when it reports a failed query.
    pub fn runtime_error(&self) -> Option<&str> {
        self.remark
            .as_deref()
            .filter(|remark| remark.contains("runtime error"))
    }
}

/// Just the remark, for inspecting a body without decoding its elements.
#[derive(Debug, Deserialize)]
pub(crate) struct RemarkOnly {
    #[serde(default)]
    pub remark: Option<String>,
}

/// Whether a runtime error means the server ran out of time or memory.
pub(crate) fn is_overload(remark: &str) -> bool {
    remark.contains("timed out") || remark.contains("out of memory")
}

/// One element as emitted by `out center tags` or a `make` statement.
///
/// Only `type` must be well formed. Every other field reads as `None` when
/// it is missing or has the wrong shape, so a broken `center` still leaves
/// `bounds` and `geometry` available.
#[derive(Debug, Deserialize)]
pub(crate) struct RawElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub center: Option<LatLon>,
    #[serde(default, deserialize_with = "lenient")]
    pub bounds: Option<RawBounds>,
    /// Member geometry; Overpass emits `null` for members outside the
    /// output set.
    #[serde(default, deserialize_with = "lenient")]
    pub geometry: Option<Vec<Value>>,
    #[serde(default)]
    pub tags: Value,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Read one geometry member, ignoring `null` and malformed points.
    pub fn from_member(member: &Value) -> Option<Self> {
        Self::deserialize(member).ok()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) struct RawBounds {
    pub minlat: f64,
    pub minlon: f64,
    pub maxlat: f64,
    pub maxlon: f64,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialise_node_and_way() {
        let json = r#"{
            "version": 0.6,
            "elements": [
                {"type": "node", "id": 1, "lat": 51.5, "lon": -0.1, "tags": {"name": "A"}},
                {"type": "way", "id": 2, "center": {"lat": 51.6, "lon": -0.2}}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(json).expect("should deserialise");
        assert_eq!(response.elements.len(), 2);
        assert!(response.remark.is_none());

        let way: RawElement =
            serde_json::from_value(response.elements[1].clone()).expect("way element");
        assert_eq!(way.kind, "way");
        assert_eq!(way.id, Some(2));
        assert!(way.tags.is_null());
        let center = way.center.expect("center present");
        assert_eq!(center.lat, 51.6);
    }

    #[test]
    fn runtime_remarks_are_detected() {
        let json = r#"{
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 3 after 61 seconds."
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).expect("should deserialise");
        assert!(response.runtime_error().is_some());
    }

    #[test]
    fn informational_remarks_are_ignored() {
        let json = r#"{"elements": [], "remark": "runtime remark: Timeout is adjusted."}"#;
        let response: OverpassResponse = serde_json::from_str(json).expect("should deserialise");
        assert!(response.runtime_error().is_none());
    }

    #[test]
    fn malformed_fields_read_as_absent() {
        let value = serde_json::json!({
            "type": "way",
            "id": "12",
            "lat": "51.51",
            "center": {"lat": 51.5},
            "bounds": {"minlat": 0.0, "minlon": 0.0, "maxlat": 1.0, "maxlon": 1.0},
            "geometry": "none"
        });
        let way: RawElement = serde_json::from_value(value).expect("type is enough");
        assert!(way.id.is_none());
        assert!(way.lat.is_none());
        assert!(way.center.is_none());
        assert!(way.geometry.is_none());
        assert!(way.bounds.is_some());
    }

    #[test]
    fn overload_remarks_are_recognised() {
        assert!(is_overload("runtime error: Query timed out in \"query\" at line 3"));
        assert!(is_overload("runtime error: Query ran out of memory in \"query\""));
        assert!(!is_overload("runtime error: Unknown type \"amenity\""));
    }

    #[test]
    fn missing_elements_is_an_error() {
        let outcome = serde_json::from_str::<OverpassResponse>(r#"{"remark": "nothing"}"#);
        assert!(outcome.is_err());
    }
}
