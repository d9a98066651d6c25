//! Overpass JSON to [`PoiRecord`]s.
//!
//! Nodes carry their own coordinates; ways and relations are reduced to a
//! representative point: the server-computed `center`, else the centre of
//! their `bounds`, else the centroid of their `geometry`. Features are keyed
//! by element kind and id and kept in first-seen order.
//!
//! For batch responses each `overpoi_group` marker element switches the
//! category that following features are attributed to. A feature that is
//! never preceded by a requested marker is unattributed; one that appears
//! under several markers is ambiguous. Both are dropped and counted.
//!
//! Elements that cannot be read as a feature at all (not an object, no
//! usable id) are counted as malformed against the category they appeared
//! under, or as skipped when there is none. Nothing is dropped silently.

use std::collections::HashMap;

use geo::{Centroid, Coord, MultiPoint, Point, Rect};
use log::warn;
use overpoi_core::{CategoryId, ElementKind, PoiRecord, Tags};
use serde_json::Value;
use thiserror::Error;

use crate::query::{GROUP_MARKER, GROUP_TAG};

mod overpass;

use overpass::{LatLon, OverpassResponse, RawBounds, RawElement, RemarkOnly, is_overload};

/// How features in a response map to categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Every feature belongs to one category.
    Single(CategoryId),
    /// Features follow group markers for these categories.
    Grouped(Vec<CategoryId>),
}

impl Attribution {
    fn categories(&self) -> &[CategoryId] {
        match self {
            Self::Single(category) => std::slice::from_ref(category),
            Self::Grouped(categories) => categories,
        }
    }
}

/// Records and drop counts for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCategory {
    /// Category the records were attributed to.
    pub category: CategoryId,
    /// Located records in first-seen order.
    pub records: Vec<PoiRecord>,
    /// Features attributed here but dropped for lacking a location.
    pub unlocated: usize,
    /// Features that matched this and at least one other category.
    pub ambiguous: usize,
    /// Elements under this category that could not be read as features.
    pub malformed: usize,
}

impl ParsedCategory {
    fn empty(category: CategoryId) -> Self {
        Self {
            category,
            records: Vec::new(),
            unlocated: 0,
            ambiguous: 0,
            malformed: 0,
        }
    }

    /// Features dropped for this category.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.unlocated + self.ambiguous + self.malformed
    }
}

/// Parsed response, one entry per requested category in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResponse {
    /// Per-category records.
    pub categories: Vec<ParsedCategory>,
    /// Features that appeared under no requested group.
    pub unattributed: usize,
    /// Features that appeared under more than one group.
    pub ambiguous: usize,
    /// Elements that could not be read and belong to no requested category.
    pub skipped_elements: usize,
}

impl ParsedResponse {
    /// Entry for `category`, if it was requested.
    #[must_use]
    pub fn get(&self, category: &CategoryId) -> Option<&ParsedCategory> {
        self.categories
            .iter()
            .find(|parsed| &parsed.category == category)
    }
}

/// Errors that make a whole response unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The body is not JSON or lacks an `elements` array.
    #[error("malformed Overpass response: {message}")]
    Malformed {
        /// Decoder message.
        message: String,
    },
    /// Overpass accepted the query but failed while running it.
    #[error("Overpass reported a failure: {remark}")]
    UpstreamRemark {
        /// Server remark.
        remark: String,
    },
}

/// The remark of a body whose query ran out of time or memory upstream.
///
/// Such a response arrives with status 200 but says nothing about the data;
/// the same query may succeed once the server is less busy.
pub(crate) fn overload_remark(raw: &str) -> Option<String> {
    if !raw.contains("runtime error") {
        return None;
    }
    let RemarkOnly { remark } = serde_json::from_str(raw).ok()?;
    remark.filter(|remark| remark.contains("runtime error") && is_overload(remark))
}

/// A feature collected during the first pass.
struct Pending {
    kind: ElementKind,
    id: u64,
    location: Option<Coord<f64>>,
    tags: Tags,
    categories: Vec<CategoryId>,
}

/// Parse an Overpass JSON body.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] when the body is not JSON or has no
/// `elements` array, and [`ParseError::UpstreamRemark`] when the server
/// reports a runtime error.
///
/// # Examples
/// ```
/// use overpoi_core::CategoryId;
/// use overpoi_data::{Attribution, parse_response};
///
/// let body = r#"{"elements": [
///     {"type": "node", "id": 1, "lat": 51.5, "lon": -0.1, "tags": {"name": "St Mary's"}},
///     {"type": "way", "id": 2, "center": {"lat": 51.6, "lon": -0.2}}
/// ]}"#;
/// let school = CategoryId::from("school");
/// let parsed = parse_response(body, &Attribution::Single(school.clone()))?;
/// let records = &parsed.get(&school).expect("requested").records;
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].name(), "St Mary's");
/// assert!(records[1].tags.is_empty());
/// # Ok::<(), overpoi_data::ParseError>(())
/// ```
pub fn parse_response(raw: &str, attribution: &Attribution) -> Result<ParsedResponse, ParseError> {
    let response: OverpassResponse =
        serde_json::from_str(raw).map_err(|err| ParseError::Malformed {
            message: err.to_string(),
        })?;
    if let Some(remark) = response.runtime_error() {
        return Err(ParseError::UpstreamRemark {
            remark: remark.to_owned(),
        });
    }

    let requested = attribution.categories();
    let mut current = match attribution {
        Attribution::Single(category) => Some(category.clone()),
        Attribution::Grouped(_) => None,
    };
    let mut pending: Vec<Pending> = Vec::new();
    let mut index: HashMap<(ElementKind, u64), usize> = HashMap::new();
    let mut malformed: HashMap<CategoryId, usize> = HashMap::new();
    let mut skipped_elements = 0;

    for value in response.elements {
        let element = match serde_json::from_value::<RawElement>(value) {
            Ok(element) => element,
            Err(error) => {
                warn!("unreadable Overpass element: {error}");
                count_malformed(current.as_ref(), &mut malformed, &mut skipped_elements);
                continue;
            }
        };
        if element.kind == GROUP_MARKER {
            if let Attribution::Grouped(_) = attribution {
                current = marker_category(&element, requested);
            }
            continue;
        }
        let Some(kind) = ElementKind::from_upstream(&element.kind) else {
            warn!("skipping Overpass element of type '{}'", element.kind);
            skipped_elements += 1;
            continue;
        };
        let Some(id) = element.id else {
            warn!("{kind} element without a usable id");
            count_malformed(current.as_ref(), &mut malformed, &mut skipped_elements);
            continue;
        };
        let position = *index.entry((kind, id)).or_insert_with(|| {
            pending.push(Pending {
                kind,
                id,
                location: locate(&element),
                tags: tags_of(&element.tags),
                categories: Vec::new(),
            });
            pending.len() - 1
        });
        if let (Some(category), Some(feature)) = (&current, pending.get_mut(position)) {
            if !feature.categories.contains(category) {
                feature.categories.push(category.clone());
            }
        }
    }

    let mut parsed = attribute(pending, requested, skipped_elements);
    for entry in &mut parsed.categories {
        entry.malformed = malformed.get(&entry.category).copied().unwrap_or_default();
    }
    Ok(parsed)
}

/// Charge an unreadable element to the current category, if any.
fn count_malformed(
    current: Option<&CategoryId>,
    malformed: &mut HashMap<CategoryId, usize>,
    skipped_elements: &mut usize,
) {
    match current {
        Some(category) => *malformed.entry(category.clone()).or_default() += 1,
        None => *skipped_elements += 1,
    }
}

fn attribute(
    pending: Vec<Pending>,
    requested: &[CategoryId],
    skipped_elements: usize,
) -> ParsedResponse {
    let mut parsed = ParsedResponse {
        categories: requested.iter().cloned().map(ParsedCategory::empty).collect(),
        skipped_elements,
        ..ParsedResponse::default()
    };
    let slot: HashMap<&CategoryId, usize> = requested
        .iter()
        .enumerate()
        .map(|(position, category)| (category, position))
        .collect();

    for feature in pending {
        match feature.categories.as_slice() {
            [] => {
                warn!(
                    "dropping {} {}: not attributable to a requested category",
                    feature.kind, feature.id
                );
                parsed.unattributed += 1;
            }
            [category] => {
                let Some(entry) = slot
                    .get(category)
                    .and_then(|position| parsed.categories.get_mut(*position))
                else {
                    continue;
                };
                match feature.location {
                    Some(location) => entry.records.push(PoiRecord::new(
                        feature.id,
                        feature.kind,
                        category.clone(),
                        location,
                        feature.tags,
                    )),
                    None => {
                        warn!("dropping {} {}: no usable location", feature.kind, feature.id);
                        entry.unlocated += 1;
                    }
                }
            }
            several => {
                warn!(
                    "dropping {} {}: matches {} categories",
                    feature.kind,
                    feature.id,
                    several.len()
                );
                parsed.ambiguous += 1;
                for category in several {
                    if let Some(entry) = slot
                        .get(category)
                        .and_then(|position| parsed.categories.get_mut(*position))
                    {
                        entry.ambiguous += 1;
                    }
                }
            }
        }
    }
    parsed
}

fn marker_category(element: &RawElement, requested: &[CategoryId]) -> Option<CategoryId> {
    let name = element.tags.get(GROUP_TAG).and_then(Value::as_str)?;
    let found = requested.iter().find(|category| category.as_str() == name);
    if found.is_none() {
        warn!("ignoring group marker for unrequested category '{name}'");
    }
    found.cloned()
}

fn tags_of(value: &Value) -> Tags {
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|text| (key.clone(), text.to_owned())))
                .collect()
        })
        .unwrap_or_default()
}

fn locate(element: &RawElement) -> Option<Coord<f64>> {
    if let (Some(lat), Some(lon)) = (element.lat, element.lon) {
        return Some(Coord { x: lon, y: lat });
    }
    element
        .center
        .map(coord_of)
        .or_else(|| element.bounds.map(bounds_center))
        .or_else(|| element.geometry.as_deref().and_then(geometry_centroid))
}

const fn coord_of(point: LatLon) -> Coord<f64> {
    Coord {
        x: point.lon,
        y: point.lat,
    }
}

fn bounds_center(bounds: RawBounds) -> Coord<f64> {
    Rect::new(
        Coord {
            x: bounds.minlon,
            y: bounds.minlat,
        },
        Coord {
            x: bounds.maxlon,
            y: bounds.maxlat,
        },
    )
    .center()
}

fn geometry_centroid(geometry: &[Value]) -> Option<Coord<f64>> {
    let points: Vec<Point<f64>> = geometry
        .iter()
        .filter_map(LatLon::from_member)
        .map(|point| Point::from(coord_of(point)))
        .collect();
    MultiPoint::new(points).centroid().map(Coord::from)
}
