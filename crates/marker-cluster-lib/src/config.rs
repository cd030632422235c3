//! Configuration for the clustering core

use crate::algo::DEFAULT_MAX_DISTANCE_AT_ZOOM;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tunables used to build the default algorithm stack
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Maximum distance, in screen pixels at 256 px tiles, between items that end up in
    /// the same cluster. Default: 100
    pub max_distance_between_clustered_items: u32,
    /// Number of zoom levels the pre-caching decorator keeps. Default: 5
    pub precache_capacity: usize,
    /// Screen width in pixels, used by view-based algorithms. Default: 1920
    pub screen_width: u32,
    /// Screen height in pixels, used by view-based algorithms. Default: 1080
    pub screen_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_distance_between_clustered_items: DEFAULT_MAX_DISTANCE_AT_ZOOM,
            precache_capacity: 5,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_distance_between_clustered_items, 100);
        assert_eq!(config.precache_capacity, 5);
        assert_eq!((config.screen_width, config.screen_height), (1920, 1080));
    }
}
