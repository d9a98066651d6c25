//! Decide whether a category layer shows text labels.
//!
//! Dense layers become unreadable with labels, so labels are only enabled
//! below a fixed density. Very small search areas always label: a handful
//! of POIs in a few hundred square metres produces a meaningless density.

use crate::CategoryStatistics;

/// Densities at or above this many POIs per km² disable labels.
pub const LABEL_DENSITY_THRESHOLD: f64 = 10.0;

/// Search areas below this many km² always label.
pub const LABEL_MIN_AREA_KM2: f64 = 0.01;

/// Decide whether to label the layer described by `stats`.
///
/// # Examples
/// ```
/// use overpoi_core::{CategoryStatistics, should_label};
///
/// let sparse = CategoryStatistics::from_parts("school".into(), 5, 1.0, None);
/// let dense = CategoryStatistics::from_parts("school".into(), 15, 1.0, None);
/// let tiny = CategoryStatistics::from_parts("school".into(), 50, 0.005, None);
/// assert!(should_label(&sparse));
/// assert!(!should_label(&dense));
/// assert!(should_label(&tiny));
/// ```
#[must_use]
pub fn should_label(stats: &CategoryStatistics) -> bool {
    if stats.area_km2 < LABEL_MIN_AREA_KM2 {
        return true;
    }
    if !stats.density_is_defined() {
        return true;
    }
    stats.density_per_km2 < LABEL_DENSITY_THRESHOLD
}
