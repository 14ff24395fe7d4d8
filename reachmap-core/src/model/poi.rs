use serde::{Deserialize, Serialize};

/// Point of interest with its position on the global pixel grid.
///
/// `x` is the row (north axis) and `y` the column (west axis), matching the
/// traveltime raster coordinates exactly; see [`crate::projection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poi {
    pub uid: String,
    pub category: String,
    pub name: String,
    pub x: u32,
    pub y: u32,
}
