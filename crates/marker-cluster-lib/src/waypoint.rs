//! GPX waypoints as cluster items

use crate::{ClusterItem, LatLng, Result};
use rayon::prelude::*;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// A named or anonymous GPX point
///
/// Identity is the `id` assigned at load time, so two points at the same position stay
/// distinct items.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaypointItem {
    pub id: u64,
    pub name: Option<String>,
    pub position: LatLng,
}

impl PartialEq for WaypointItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WaypointItem {}

impl Hash for WaypointItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ClusterItem for WaypointItem {
    fn position(&self) -> LatLng {
        self.position
    }
}

fn is_valid_position(point: LatLng) -> bool {
    point.x().is_finite()
        && point.y().is_finite()
        && (-180.0..=180.0).contains(&point.x())
        && (-90.0..=90.0).contains(&point.y())
}

/// Collect every waypoint, route point and track point of `gpx`
///
/// Ids are assigned sequentially starting at `first_id`. Points with invalid
/// coordinates are skipped.
pub fn load_waypoints(gpx: &gpx::Gpx, first_id: u64) -> Vec<WaypointItem> {
    #[cfg(feature = "profiling")]
    profiling::scope!("waypoint::load_waypoints");

    let points = gpx
        .waypoints
        .iter()
        .chain(gpx.routes.iter().flat_map(|route| route.points.iter()))
        .chain(
            gpx.tracks
                .iter()
                .flat_map(|track| track.segments.iter())
                .flat_map(|segment| segment.points.iter()),
        );

    let mut items = Vec::new();
    for waypoint in points {
        let position = waypoint.point();
        if !is_valid_position(position) {
            tracing::warn!(
                "Skipping point with invalid coordinates: ({}, {})",
                position.y(),
                position.x()
            );
            continue;
        }
        items.push(WaypointItem {
            id: first_id + items.len() as u64,
            name: waypoint.name.clone(),
            position,
        });
    }
    items
}

/// Parse GPX files in parallel and collect their points as items
///
/// Ids are unique across all files, in the order the paths are given.
pub fn load_waypoints_from_files<P: AsRef<Path> + Send + Sync>(
    paths: Vec<P>,
) -> Result<Vec<WaypointItem>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("waypoint::load_waypoints_from_files");

    let parsed: Result<Vec<gpx::Gpx>> = paths
        .par_iter()
        .map(|path| {
            let file = std::fs::File::open(path.as_ref())?;
            let reader = std::io::BufReader::new(file);
            Ok(gpx::read(reader)?)
        })
        .collect();

    let mut items = Vec::new();
    for gpx in parsed? {
        let loaded = load_waypoints(&gpx, items.len() as u64);
        items.extend(loaded);
    }
    tracing::info!(files = paths.len(), items = items.len(), "Loaded GPX points");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterError;
    use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

    fn create_test_gpx() -> Gpx {
        let mut gpx = Gpx {
            version: GpxVersion::Gpx11,
            ..Default::default()
        };

        let mut summit = Waypoint::new(geo::Point::new(-3.0, 53.0));
        summit.name = Some("Summit".to_string());
        gpx.waypoints.push(summit);

        let mut track = Track::default();
        let mut segment = TrackSegment::default();
        for i in 0..10 {
            segment.points.push(Waypoint::new(geo::Point::new(
                -0.1278 + i as f64 * 0.001,
                51.5074 + i as f64 * 0.001,
            )));
        }
        track.segments.push(segment);
        gpx.tracks.push(track);
        gpx
    }

    #[test]
    fn test_load_waypoints() {
        let items = load_waypoints(&create_test_gpx(), 0);
        assert_eq!(items.len(), 11);
        assert_eq!(items[0].name.as_deref(), Some("Summit"));
        assert_eq!(items[0].position(), geo::Point::new(-3.0, 53.0));
        let ids: Vec<u64> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_points_are_skipped() {
        let mut gpx = Gpx::default();
        gpx.waypoints.push(Waypoint::new(geo::Point::new(0.0, 95.0)));
        gpx.waypoints.push(Waypoint::new(geo::Point::new(f64::NAN, 0.0)));
        gpx.waypoints.push(Waypoint::new(geo::Point::new(10.0, 10.0)));
        let items = load_waypoints(&gpx, 7);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 7);
    }

    #[test]
    fn test_identity_is_the_id() {
        let a = WaypointItem {
            id: 1,
            name: None,
            position: geo::Point::new(0.0, 0.0),
        };
        let b = WaypointItem {
            id: 2,
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_eq!(
            a,
            WaypointItem {
                name: Some("renamed".to_string()),
                ..a.clone()
            }
        );
    }

    #[test]
    fn test_load_from_files() {
        let dir = std::env::temp_dir().join(format!("marker-cluster-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.join(format!("track-{i}.gpx"));
                let file = std::fs::File::create(&path).unwrap();
                gpx::write(&create_test_gpx(), file).unwrap();
                path
            })
            .collect();

        let items = load_waypoints_from_files(paths).unwrap();
        assert_eq!(items.len(), 33);
        let mut ids: Vec<u64> = items.iter().map(|item| item.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 33);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_waypoints_from_files(vec!["/nonexistent/missing.gpx"]);
        assert!(matches!(result, Err(ClusterError::Io(_))));
    }
}
