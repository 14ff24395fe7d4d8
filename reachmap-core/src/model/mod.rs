//! Core data model: grids, networks, POIs and matrix archives.

pub mod grid;
pub mod matrices;
pub mod network;
pub mod poi;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use grid::{BulkCell, BulkPlan, PixelExtent, StudyArea};
pub use matrices::{OpportunityMatrix, RaggedArray, TraveltimeMatrix};
pub use network::{Edge, EdgeList, RoutingGraph};
pub use poi::Poi;

/// Active mobility travel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Walking,
    Cycling,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }

    /// Default speed at the API boundary, in km/h.
    pub fn default_speed_kmh(self) -> f64 {
        match self {
            Self::Walking => 5.0,
            Self::Cycling => 15.0,
        }
    }

    /// Default speed in the internal unit (m/s).
    pub fn default_speed_mps(self) -> f64 {
        self.default_speed_kmh() / 3.6
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walking" => Ok(Self::Walking),
            "cycling" => Ok(Self::Cycling),
            other => Err(crate::Error::InvalidData(format!(
                "unknown travel mode `{other}`"
            ))),
        }
    }
}

/// Routing profile name, e.g. `standard`.
///
/// Profiles form an open set decided by the network provider, so this is a
/// validated string rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(String);

impl Profile {
    pub fn new(name: impl Into<String>) -> Result<Self, crate::Error> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(crate::Error::InvalidData(format!(
                "invalid profile name `{name}`"
            )));
        }
        Ok(Self(name))
    }

    pub fn standard() -> Self {
        Self("standard".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Profile {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        assert_eq!("walking".parse::<Mode>().unwrap(), Mode::Walking);
        assert_eq!(Mode::Cycling.as_str(), "cycling");
        assert!("driving".parse::<Mode>().is_err());
    }

    #[test]
    fn profile_rejects_path_fragments() {
        assert!(Profile::new("standard").is_ok());
        assert!(Profile::new("../escape").is_err());
        assert!(Profile::new("").is_err());
    }

    #[test]
    fn speeds_convert_to_mps_once() {
        assert!((Mode::Walking.default_speed_mps() - 5.0 / 3.6).abs() < 1e-9);
    }
}
