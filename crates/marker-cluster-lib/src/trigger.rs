//! Decides whether a settled camera warrants a recompute

use crate::CameraPosition;
use crate::runtime::lock_mutex;
use std::sync::Mutex;

/// Whether `new_zoom` differs from the zoom of the last triggered recompute
///
/// With no previous zoom every position counts as a change.
pub fn zoom_changed(previous: Option<f64>, new_zoom: f64) -> bool {
    previous.is_none_or(|previous| previous != new_zoom)
}

/// Zoom debounce for algorithms that only care about zoom changes
///
/// Only the zoom of the last triggering position is retained; pan, tilt and bearing
/// changes at the same zoom are suppressed unless the algorithm asks to be
/// re-clustered on every movement.
#[derive(Debug, Default)]
pub struct TriggerPolicy {
    previous_zoom: Mutex<Option<f64>>,
}

impl TriggerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `position` needs a recompute and remember its zoom if so
    pub fn should_recompute(&self, always_recluster: bool, position: &CameraPosition) -> bool {
        let mut previous = lock_mutex(&self.previous_zoom, "trigger");
        if always_recluster || zoom_changed(*previous, position.zoom) {
            *previous = Some(position.zoom);
            true
        } else {
            tracing::trace!(zoom = position.zoom, "Camera idle without zoom change; skipping");
            false
        }
    }

    /// Zoom of the last position that triggered a recompute
    pub fn previous_zoom(&self) -> Option<f64> {
        *lock_mutex(&self.previous_zoom, "trigger")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn at(lon: f64, lat: f64, zoom: f64) -> CameraPosition {
        CameraPosition::new(Point::new(lon, lat), zoom)
    }

    #[test]
    fn test_zoom_changed() {
        assert!(zoom_changed(None, 3.0));
        assert!(zoom_changed(Some(3.0), 3.5));
        assert!(!zoom_changed(Some(3.0), 3.0));
    }

    #[test]
    fn test_debounces_same_zoom() {
        let policy = TriggerPolicy::new();
        assert!(policy.should_recompute(false, &at(0.0, 0.0, 10.0)));
        // Pan only
        assert!(!policy.should_recompute(false, &at(5.0, 5.0, 10.0)));
        assert!(policy.should_recompute(false, &at(5.0, 5.0, 11.0)));
        assert_eq!(policy.previous_zoom(), Some(11.0));
    }

    #[test]
    fn test_orientation_changes_are_suppressed() {
        let policy = TriggerPolicy::new();
        let position = at(0.0, 0.0, 7.0);
        assert!(policy.should_recompute(false, &position));
        assert!(!policy.should_recompute(false, &position.with_orientation(45.0, 90.0)));
    }

    #[test]
    fn test_always_recluster_ignores_zoom() {
        let policy = TriggerPolicy::new();
        for _ in 0..3 {
            assert!(policy.should_recompute(true, &at(0.0, 0.0, 4.0)));
        }
        assert_eq!(policy.previous_zoom(), Some(4.0));
    }

    #[test]
    fn test_fractional_zoom_counts_as_change() {
        let policy = TriggerPolicy::new();
        assert!(policy.should_recompute(false, &at(0.0, 0.0, 4.0)));
        assert!(policy.should_recompute(false, &at(0.0, 0.0, 4.25)));
    }
}
