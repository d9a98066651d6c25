//! Registry of downloadable POI categories.
//!
//! The catalogue is built once at start-up and shared read-only. Each
//! category maps to an Overpass tag filter and a classification group that
//! drives styling downstream.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Marker colour used for categories without a dedicated colour.
pub const DEFAULT_COLOR: &str = "#95a5a6";

/// Identifier of a catalogue category, such as `school` or `gas_station`.
///
/// # Examples
/// ```
/// use overpoi_core::CategoryId;
///
/// let id = CategoryId::from("school");
/// assert_eq!(id.as_str(), "school");
/// assert_eq!(id.to_string(), "school");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CategoryId(String);

impl CategoryId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for CategoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Classification used to style a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CategoryGroup {
    /// Sites that pose a hazard, e.g. factories and fuel stations.
    RiskZone,
    /// Places where vulnerable people gather, e.g. schools and hospitals.
    Vulnerable,
    /// Everything else.
    Unclassified,
}

impl CategoryGroup {
    /// Return the group as a lowercase `&str`.
    ///
    /// # Examples
    /// ```
    /// use overpoi_core::CategoryGroup;
    ///
    /// assert_eq!(CategoryGroup::RiskZone.as_str(), "risk_zone");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RiskZone => "risk_zone",
            Self::Vulnerable => "vulnerable",
            Self::Unclassified => "unclassified",
        }
    }

    const fn marker_size(self) -> f32 {
        match self {
            Self::RiskZone => 4.0,
            Self::Vulnerable | Self::Unclassified => 3.0,
        }
    }

    const fn outline_width(self) -> f32 {
        match self {
            Self::RiskZone => 1.0,
            Self::Vulnerable | Self::Unclassified => 0.8,
        }
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one category.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CategoryDefinition {
    /// Catalogue key.
    pub id: CategoryId,
    /// Human-readable name, e.g. `gas station`.
    pub label: String,
    /// Overpass tag filter, e.g. `["amenity"="fuel"]`.
    pub upstream_filter: String,
    /// Styling group.
    pub group: CategoryGroup,
    /// Marker fill colour as a hex string.
    pub display_color: String,
    /// Marker diameter in millimetres.
    pub marker_size: f32,
    /// Marker outline width in millimetres.
    pub outline_width: f32,
}

impl CategoryDefinition {
    /// Describe a category with the default style for its group.
    ///
    /// # Examples
    /// ```
    /// use overpoi_core::{CategoryDefinition, CategoryGroup};
    ///
    /// let def = CategoryDefinition::new(
    ///     "school",
    ///     "school",
    ///     r#"["amenity"="school"]"#,
    ///     CategoryGroup::Vulnerable,
    /// );
    /// assert_eq!(def.display_color, "#95a5a6");
    /// assert_eq!(def.marker_size, 3.0);
    /// ```
    pub fn new(
        id: impl Into<CategoryId>,
        label: impl Into<String>,
        upstream_filter: impl Into<String>,
        group: CategoryGroup,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            upstream_filter: upstream_filter.into(),
            group,
            display_color: DEFAULT_COLOR.to_owned(),
            marker_size: group.marker_size(),
            outline_width: group.outline_width(),
        }
    }

    /// Override the marker colour.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.display_color = color.into();
        self
    }
}

/// Errors raised while building or querying a [`CategoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The id is not registered.
    #[error("unknown category '{id}'")]
    UnknownCategory {
        /// Requested id.
        id: CategoryId,
    },
    /// Two definitions share an id.
    #[error("category '{id}' is defined more than once")]
    DuplicateCategory {
        /// Repeated id.
        id: CategoryId,
    },
    /// A definition carries no upstream filter.
    #[error("category '{id}' has an empty upstream filter")]
    EmptyFilter {
        /// Offending id.
        id: CategoryId,
    },
}

/// Immutable lookup of category definitions, in registration order.
///
/// # Examples
/// ```
/// use overpoi_core::{CategoryCatalog, CategoryGroup, CategoryId};
///
/// let catalog = CategoryCatalog::standard();
/// let school = catalog.get(&CategoryId::from("school")).expect("registered");
/// assert_eq!(school.group, CategoryGroup::Vulnerable);
/// assert!(catalog.get(&CategoryId::from("volcano")).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCatalog {
    definitions: Vec<CategoryDefinition>,
    index: HashMap<CategoryId, usize>,
}

impl CategoryCatalog {
    /// Build a catalogue from explicit definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateCategory`] when two definitions share
    /// an id and [`CatalogError::EmptyFilter`] when a filter is blank.
    pub fn new<I>(definitions: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = CategoryDefinition>,
    {
        let definitions: Vec<_> = definitions.into_iter().collect();
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            if definition.upstream_filter.trim().is_empty() {
                return Err(CatalogError::EmptyFilter {
                    id: definition.id.clone(),
                });
            }
            if index.insert(definition.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateCategory {
                    id: definition.id.clone(),
                });
            }
        }
        Ok(Self { definitions, index })
    }

    /// The built-in catalogue of risk zones, vulnerable sites and common
    /// amenities.
    #[must_use]
    pub fn standard() -> Self {
        let definitions = standard_definitions();
        let index = definitions
            .iter()
            .enumerate()
            .map(|(position, def)| (def.id.clone(), position))
            .collect();
        Self { definitions, index }
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: &CategoryId) -> Option<&CategoryDefinition> {
        self.index
            .get(id)
            .and_then(|position| self.definitions.get(*position))
    }

    /// Look up a definition, failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCategory`] when `id` is not registered.
    pub fn require(&self, id: &CategoryId) -> Result<&CategoryDefinition, CatalogError> {
        self.get(id)
            .ok_or_else(|| CatalogError::UnknownCategory { id: id.clone() })
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &CategoryId) -> bool {
        self.index.contains_key(id)
    }

    /// Iterate over definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.definitions.iter()
    }

    /// Number of registered categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalogue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn standard_definitions() -> Vec<CategoryDefinition> {
    use CategoryGroup::{RiskZone, Unclassified, Vulnerable};

    let entries: [(&str, &str, &str, CategoryGroup, Option<&str>); 26] = [
        ("factory", "factory", r#"["man_made"="works"]"#, RiskZone, Some("#e83971")),
        ("gas_station", "gas station", r#"["amenity"="fuel"]"#, RiskZone, Some("#e17911")),
        ("power_plant", "power plant", r#"["power"="plant"]"#, RiskZone, Some("#e64a19")),
        ("power_substation", "power substation", r#"["power"="substation"]"#, RiskZone, Some("#cd6b21")),
        ("railway_station", "railway station", r#"["railway"="station"]"#, RiskZone, Some("#ede77a")),
        ("railway_halt", "railway halt", r#"["railway"="halt"]"#, RiskZone, Some("#f0ce24")),
        ("waterworks", "waterworks", r#"["man_made"="water_works"]"#, RiskZone, Some("#c62828")),
        ("wastewater_plant", "wastewater plant", r#"["man_made"="wastewater_plant"]"#, RiskZone, Some("#9c0202")),
        ("industrial_zone", "industrial zone", r#"["landuse"="industrial"]"#, RiskZone, Some("#de4b48")),
        ("school", "school", r#"["amenity"="school"]"#, Vulnerable, Some("#38bfec")),
        ("kindergarten", "kindergarten", r#"["amenity"="kindergarten"]"#, Vulnerable, Some("#7677b4")),
        ("hospital", "hospital", r#"["amenity"="hospital"]"#, Vulnerable, Some("#0d47a1")),
        ("clinic", "clinic", r#"["amenity"="clinic"]"#, Vulnerable, Some("#1e88e5")),
        ("nursing_home", "nursing home", r#"["amenity"="nursing_home"]"#, Vulnerable, Some("#2e7d32")),
        ("social_facility", "social facility", r#"["amenity"="social_facility"]"#, Vulnerable, Some("#6be571")),
        ("childcare", "childcare", r#"["amenity"="childcare"]"#, Vulnerable, Some("#8a4a9d")),
        ("community_centre", "community centre", r#"["amenity"="community_centre"]"#, Vulnerable, Some("#66d12d")),
        ("restaurant", "restaurant", r#"["amenity"="restaurant"]"#, Unclassified, None),
        ("cafe", "cafe", r#"["amenity"="cafe"]"#, Unclassified, None),
        ("bank", "bank", r#"["amenity"="bank"]"#, Unclassified, None),
        ("atm", "atm", r#"["amenity"="atm"]"#, Unclassified, None),
        ("pharmacy", "pharmacy", r#"["amenity"="pharmacy"]"#, Unclassified, None),
        ("supermarket", "supermarket", r#"["shop"="supermarket"]"#, Unclassified, None),
        ("mall", "mall", r#"["shop"="mall"]"#, Unclassified, None),
        ("bus_station", "bus station", r#"["amenity"="bus_station"]"#, Unclassified, None),
        ("hotel", "hotel", r#"["tourism"="hotel"]"#, Unclassified, None),
    ];

    entries
        .into_iter()
        .map(|(id, label, filter, group, color)| {
            let definition = CategoryDefinition::new(id, label, filter, group);
            match color {
                Some(color) => definition.with_color(color),
                None => definition,
            }
        })
        .collect()
}
