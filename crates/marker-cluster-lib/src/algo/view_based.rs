//! Distance-based clustering restricted to what the camera shows
//!
//! Only items inside the visible area can seed a cluster, so every pan changes the
//! result and the algorithm asks to be re-clustered on each camera movement.

use crate::algo::{Algorithm, NonHierarchicalDistanceBasedAlgorithm, ScreenBasedAlgorithm};
use crate::geometry::{LatLng, discrete_zoom, to_world_point, world_units_per_pixel};
use crate::quadtree::QuadItem;
use crate::{CameraPosition, ClusterItem, ClusterSet, Result};
use geo::{Coord, Rect};

/// Screen-based variant of [`NonHierarchicalDistanceBasedAlgorithm`]
#[derive(Debug, Clone)]
pub struct NonHierarchicalViewBasedAlgorithm<T> {
    algorithm: NonHierarchicalDistanceBasedAlgorithm<T>,
    view_width: u32,
    view_height: u32,
    /// Last observed camera target; nothing is visible before the first camera change
    map_center: Option<LatLng>,
}

impl<T: ClusterItem> NonHierarchicalViewBasedAlgorithm<T> {
    /// Create an empty algorithm for a screen of `view_width` x `view_height` pixels
    pub fn new(view_width: u32, view_height: u32) -> Self {
        Self {
            algorithm: NonHierarchicalDistanceBasedAlgorithm::new(),
            view_width,
            view_height,
            map_center: None,
        }
    }

    /// Update the screen size after a resize
    pub fn update_view_size(&mut self, view_width: u32, view_height: u32) {
        self.view_width = view_width;
        self.view_height = view_height;
    }

    /// World-space rectangle visible at a discrete zoom, unwrapped
    ///
    /// The x range may extend past `[0, 1]` when the view straddles the antimeridian.
    fn visible_bounds(&self, zoom: i32) -> Option<Rect<f64>> {
        let center = to_world_point(self.map_center?);
        let unit = world_units_per_pixel(zoom);
        let half_width = self.view_width as f64 * unit / 2.0;
        let half_height = self.view_height as f64 * unit / 2.0;
        Some(Rect::new(
            Coord {
                x: center.x() - half_width,
                y: center.y() - half_height,
            },
            Coord {
                x: center.x() + half_width,
                y: center.y() + half_height,
            },
        ))
    }

    /// Items that may seed a cluster at `zoom`
    fn visible_items(&self, zoom: i32) -> Vec<&QuadItem<T>> {
        let Some(bounds) = self.visible_bounds(zoom) else {
            return Vec::new();
        };
        let (min, max) = (bounds.min(), bounds.max());
        let quadtree = self.algorithm.quadtree();

        let mut items = Vec::new();
        // Handle wrapping around the antimeridian
        if min.x < 0.0 {
            items.extend(quadtree.search(Rect::new(
                Coord {
                    x: min.x + 1.0,
                    y: min.y,
                },
                Coord { x: 1.0, y: max.y },
            )));
        }
        if max.x > 1.0 {
            items.extend(quadtree.search(Rect::new(
                Coord { x: 0.0, y: min.y },
                Coord {
                    x: max.x - 1.0,
                    y: max.y,
                },
            )));
        }
        items.extend(quadtree.search(bounds));
        items
    }
}

impl<T: ClusterItem> Algorithm<T> for NonHierarchicalViewBasedAlgorithm<T> {
    fn add_item(&mut self, item: T) -> Result<()> {
        self.algorithm.add_item(item)
    }

    fn add_items(&mut self, items: Vec<T>) -> Result<()> {
        self.algorithm.add_items(items)
    }

    fn remove_item(&mut self, item: &T) -> Result<()> {
        self.algorithm.remove_item(item)
    }

    fn clear_items(&mut self) -> Result<()> {
        self.algorithm.clear_items()
    }

    fn items(&self) -> Vec<T> {
        self.algorithm.items()
    }

    fn item_count(&self) -> usize {
        self.algorithm.item_count()
    }

    fn clusters(&self, zoom: f64) -> Result<ClusterSet<T>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("view_based::clusters");

        let discrete = discrete_zoom(zoom);
        let candidates = self.visible_items(discrete);
        let clusters = self.algorithm.cluster_candidates(candidates, discrete);
        Ok(ClusterSet::new(zoom, clusters))
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.algorithm.max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&mut self, max_distance: u32) {
        self.algorithm
            .set_max_distance_between_clustered_items(max_distance);
    }
}

impl<T: ClusterItem> ScreenBasedAlgorithm<T> for NonHierarchicalViewBasedAlgorithm<T> {
    fn should_recluster_on_map_movement(&self) -> bool {
        true
    }

    fn on_camera_change(&mut self, position: &CameraPosition) {
        self.map_center = Some(position.target);
    }
}
