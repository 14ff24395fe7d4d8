use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// Pipeline configuration.
///
/// Defaults match the production setup; `CACHE_ROOT`, `BULK_SIZE`,
/// `BULK_RES` and `CALC_RES` can be overridden from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReachmapConfig {
    /// Root directory for traveltime and opportunity archives.
    pub cache_root: PathBuf,
    /// Number of starts expanded per parallel sub-batch.
    pub batch_size: usize,
    /// H3 resolution of the bulk cells (unit of work).
    pub bulk_resolution: u8,
    /// H3 resolution of the calculation cells (one start each).
    pub calc_resolution: u8,
    /// Web-Mercator zoom level of the pixel grid.
    pub pixel_zoom: u8,
    /// Centroids farther than this from the network do not snap.
    pub max_snap_distance_m: f64,
}

impl Default for ReachmapConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            batch_size: 50,
            bulk_resolution: 6,
            calc_resolution: 10,
            pixel_zoom: 12,
            max_snap_distance_m: 300.0,
        }
    }
}

impl ReachmapConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = env::var("CACHE_ROOT") {
            config.cache_root = PathBuf::from(root);
        }
        if let Some(size) = read_env_var("BULK_SIZE") {
            config.batch_size = size;
        }
        if let Some(res) = read_env_var("BULK_RES") {
            config.bulk_resolution = res;
        }
        if let Some(res) = read_env_var("CALC_RES") {
            config.calc_resolution = res;
        }
        config
    }
}

fn read_env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ReachmapConfig::default();
        assert_eq!(config.batch_size, 50);
        assert!(config.calc_resolution > config.bulk_resolution);
    }
}
