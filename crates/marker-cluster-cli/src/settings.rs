use clap::{Parser, ValueEnum};
use marker_cluster_lib::Config;
use std::path::PathBuf;

/// Which clustering algorithm the run starts with
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// Plain distance-based clustering
    Distance,
    /// Distance-based clustering behind a per-zoom cache (the library default)
    Precaching,
    /// Distance-based clustering of the visible area only
    ViewBased,
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Marker Cluster - replays camera movements against the cluster coordinator and logs every delivered cluster set
pub struct Settings {
    /// GPX files whose waypoints and track points become markers
    #[clap(short, long, value_name = "FILE")]
    pub gpx_files: Vec<PathBuf>,

    /// Number of synthetic markers to generate when no GPX file is given
    #[clap(short, long, default_value = "1000")]
    pub synthetic_items: usize,

    /// Comma-separated zoom levels, one camera-idle event each
    #[clap(short, long, value_delimiter = ',', default_value = "3,6,9,12,12,15")]
    pub zooms: Vec<f64>,

    /// Move the camera target between camera-idle events
    #[clap(long, default_value = "false")]
    pub pan: bool,

    /// Latitude of the initial camera target (and of the synthetic markers)
    #[clap(long, default_value = "51.5074", allow_hyphen_values = true)]
    pub center_lat: f64,

    /// Longitude of the initial camera target (and of the synthetic markers)
    #[clap(long, default_value = "-0.1278", allow_hyphen_values = true)]
    pub center_lon: f64,

    /// Clustering algorithm
    #[clap(short, long, value_enum, default_value = "precaching")]
    pub algorithm: AlgorithmKind,

    /// Maximum distance between clustered markers, in screen pixels
    #[clap(long, default_value = "100")]
    pub max_distance: u32,

    /// Screen width in pixels used by the view-based algorithm
    #[clap(long, default_value = "1920")]
    pub screen_width: u32,

    /// Screen height in pixels used by the view-based algorithm
    #[clap(long, default_value = "1080")]
    pub screen_height: u32,

    /// How long to wait for each recompute before moving on, in milliseconds
    #[clap(long, default_value = "5000")]
    pub timeout_ms: u64,
}

impl Settings {
    /// Library configuration derived from these settings
    pub fn config(&self) -> Config {
        Config {
            max_distance_between_clustered_items: self.max_distance,
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            ..Config::default()
        }
    }
}
