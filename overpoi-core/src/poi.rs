use std::collections::HashMap;
use std::fmt;

use geo::Coord;

use crate::CategoryId;

/// OpenStreetMap-style key/value tags.
pub type Tags = HashMap<String, String>;

/// Name reported for features without a `name` tag.
pub const UNNAMED: &str = "Unnamed";

/// Tag keys consulted, in order, to describe what a feature is.
const TYPE_KEYS: [&str; 7] = [
    "amenity", "shop", "tourism", "railway", "power", "man_made", "landuse",
];

/// Upstream element type a record was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ElementKind {
    /// A single point.
    Node,
    /// A polyline or closed area.
    Way,
    /// A grouping of other elements, e.g. a multipolygon.
    Relation,
}

impl ElementKind {
    /// Parse the upstream type name (`node`, `way` or `relation`).
    ///
    /// # Examples
    /// ```
    /// use overpoi_core::ElementKind;
    ///
    /// assert_eq!(ElementKind::from_upstream("way"), Some(ElementKind::Way));
    /// assert_eq!(ElementKind::from_upstream("area"), None);
    /// ```
    #[must_use]
    pub fn from_upstream(name: &str) -> Option<Self> {
        match name {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }

    /// Return the upstream type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located feature returned for one requested category.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`. Ways and
/// relations are reduced to a representative point before a record is
/// created.
///
/// # Examples
/// ```
/// use std::collections::HashMap;
/// use geo::Coord;
/// use overpoi_core::{CategoryId, ElementKind, PoiRecord};
///
/// let poi = PoiRecord::new(
///     7,
///     ElementKind::Node,
///     CategoryId::from("school"),
///     Coord { x: 13.4, y: 52.5 },
///     HashMap::from([("name".into(), "Grundschule".into())]),
/// );
///
/// assert_eq!(poi.name(), "Grundschule");
/// assert_eq!(poi.latitude(), 52.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoiRecord {
    /// Upstream feature id, unique per [`ElementKind`].
    pub id: u64,
    /// Upstream element type.
    pub kind: ElementKind,
    /// Category the record was fetched for.
    pub category: CategoryId,
    /// Representative point.
    pub location: Coord<f64>,
    /// Upstream tags, empty when the source supplied none.
    pub tags: Tags,
}

impl PoiRecord {
    /// Construct a record.
    pub fn new(
        id: u64,
        kind: ElementKind,
        category: CategoryId,
        location: Coord<f64>,
        tags: Tags,
    ) -> Self {
        Self {
            id,
            kind,
            category,
            location,
            tags,
        }
    }

    /// Construct a record without tags.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use overpoi_core::{ElementKind, PoiRecord};
    ///
    /// let poi = PoiRecord::with_empty_tags(1, ElementKind::Node, "cafe".into(), Coord { x: 0.0, y: 0.0 });
    /// assert!(poi.tags.is_empty());
    /// assert_eq!(poi.name(), "Unnamed");
    /// ```
    pub fn with_empty_tags(
        id: u64,
        kind: ElementKind,
        category: CategoryId,
        location: Coord<f64>,
    ) -> Self {
        Self::new(id, kind, category, location, Tags::new())
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.x
    }

    /// Look up a single tag.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// The `name` tag, or [`UNNAMED`].
    #[must_use]
    pub fn name(&self) -> &str {
        self.tag("name").unwrap_or(UNNAMED)
    }

    /// The value of the first descriptive key present, or `unknown`.
    ///
    /// # Examples
    /// ```
    /// use std::collections::HashMap;
    /// use geo::Coord;
    /// use overpoi_core::{ElementKind, PoiRecord};
    ///
    /// let poi = PoiRecord::new(
    ///     1,
    ///     ElementKind::Node,
    ///     "gas_station".into(),
    ///     Coord { x: 0.0, y: 0.0 },
    ///     HashMap::from([("amenity".into(), "fuel".into())]),
    /// );
    /// assert_eq!(poi.poi_type(), "fuel");
    /// ```
    #[must_use]
    pub fn poi_type(&self) -> &str {
        TYPE_KEYS
            .iter()
            .find_map(|key| self.tag(key))
            .unwrap_or("unknown")
    }

    /// Full address when tagged, else the street.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.first_tag(&["addr:full", "addr:street"])
    }

    /// Phone number.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.first_tag(&["phone", "contact:phone"])
    }

    /// Website URL.
    #[must_use]
    pub fn website(&self) -> Option<&str> {
        self.first_tag(&["website", "contact:website"])
    }

    /// Opening hours in OSM syntax.
    #[must_use]
    pub fn opening_hours(&self) -> Option<&str> {
        self.tag("opening_hours")
    }

    fn first_tag(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.tag(key))
    }
}
