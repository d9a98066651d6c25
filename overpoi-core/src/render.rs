//! Per-layer instructions handed to the external renderer.

use crate::{CategoryDefinition, CategoryGroup, CategoryStatistics, should_label};

/// Everything the renderer needs to draw one category layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LayerDirective {
    /// Layer title, e.g. `gas station (12)`.
    pub layer_name: String,
    /// Figures for the layer.
    pub statistics: CategoryStatistics,
    /// Whether features get text labels.
    pub show_labels: bool,
    /// Styling group.
    pub group: CategoryGroup,
    /// Marker fill colour.
    pub color: String,
    /// Marker diameter in millimetres.
    pub marker_size: f32,
    /// Marker outline width in millimetres.
    pub outline_width: f32,
}

impl LayerDirective {
    /// Derive the directive for `definition` from its statistics.
    #[must_use]
    pub fn new(definition: &CategoryDefinition, statistics: CategoryStatistics) -> Self {
        Self {
            layer_name: format!("{} ({})", definition.label, statistics.count),
            show_labels: should_label(&statistics),
            statistics,
            group: definition.group,
            color: definition.display_color.clone(),
            marker_size: definition.marker_size,
            outline_width: definition.outline_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategoryCatalog;

    #[test]
    fn directive_copies_style_and_decides_labels() {
        let catalog = CategoryCatalog::standard();
        let definition = catalog.require(&"gas_station".into()).expect("registered");
        let stats = CategoryStatistics::from_parts("gas_station".into(), 30, 2.0, None);
        let directive = LayerDirective::new(definition, stats);
        assert_eq!(directive.layer_name, "gas station (30)");
        assert_eq!(directive.color, "#e17911");
        assert_eq!(directive.group, CategoryGroup::RiskZone);
        assert!(!directive.show_labels);
    }
}
