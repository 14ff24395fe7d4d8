//! Matrix archive payloads.

use serde::{Deserialize, Serialize};

use crate::{Error, UNREACHABLE_COST};

/// Per-bulk traveltime raster bundle.
///
/// Parallel arrays indexed by surviving start: `grid_ids[s]` is the raw H3
/// id of the calculation cell, `north/west/height/width[s]` its pixel
/// window and `travel_times[s]` the row-major window buffer of costs in
/// seconds, with [`UNREACHABLE_COST`] for pixels never reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraveltimeMatrix {
    pub grid_ids: Vec<u64>,
    pub north: Vec<u32>,
    pub west: Vec<u32>,
    pub height: Vec<u32>,
    pub width: Vec<u32>,
    pub travel_times: Vec<Vec<u32>>,
}

impl TraveltimeMatrix {
    pub fn len(&self) -> usize {
        self.grid_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid_ids.is_empty()
    }

    /// Checks the companion-array shape invariant:
    /// `len(travel_times[s]) == height[s] * width[s]` for every start.
    pub fn validate(&self) -> Result<(), Error> {
        let len = self.grid_ids.len();
        if [
            self.north.len(),
            self.west.len(),
            self.height.len(),
            self.width.len(),
            self.travel_times.len(),
        ]
        .iter()
        .any(|&field_len| field_len != len)
        {
            return Err(Error::ArchiveCorrupt(
                "traveltime matrix companion arrays differ in length".to_string(),
            ));
        }
        for (index, buffer) in self.travel_times.iter().enumerate() {
            let expected = self.height[index] as usize * self.width[index] as usize;
            if buffer.len() != expected {
                return Err(Error::ArchiveCorrupt(format!(
                    "window buffer {index} has {} pixels, expected {expected}",
                    buffer.len()
                )));
            }
        }
        Ok(())
    }

    /// Cost from start `s` to the global pixel `(x, y)`, if the pixel lies
    /// inside the start's window and was reached.
    pub fn cost_at(&self, s: usize, x: u32, y: u32) -> Option<u32> {
        let (north, west) = (self.north[s], self.west[s]);
        let south = north + self.height[s] - 1;
        let east = west + self.width[s] - 1;
        if x < north || x > south || y < west || y > east {
            return None;
        }
        let cost = self.travel_times[s][((x - north) * self.width[s] + (y - west)) as usize];
        (cost < UNREACHABLE_COST).then_some(cost)
    }
}

/// Flat ragged array: row `i` spans `values[offsets[i]..offsets[i + 1]]`.
///
/// Replaces the object-dtype nested arrays of the legacy archive format
/// with two flat, typed arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaggedArray<T> {
    offsets: Vec<u32>,
    values: Vec<T>,
}

impl<T> Default for RaggedArray<T> {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            values: Vec::new(),
        }
    }
}

impl<T> RaggedArray<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, row: impl IntoIterator<Item = T>) {
        self.values.extend(row);
        self.offsets.push(self.values.len() as u32);
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.values[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        (0..self.len()).map(|i| self.row(i))
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn well_formed(&self) -> bool {
        self.offsets.first() == Some(&0)
            && self
                .offsets
                .last()
                .is_some_and(|&last| last as usize == self.values.len())
            && self.offsets.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

/// Per-bulk, per-category opportunity bundle: for POI `i`,
/// `travel_times.row(i)` holds the costs from each reachable
/// calculation-cell origin and `grid_ids.row(i)` those origins' H3 ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityMatrix {
    pub travel_times: RaggedArray<u32>,
    pub grid_ids: RaggedArray<u64>,
    pub uids: Vec<String>,
    pub names: Vec<String>,
}

impl OpportunityMatrix {
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.travel_times.len() != self.uids.len()
            || self.grid_ids.len() != self.uids.len()
            || self.names.len() != self.uids.len()
            || !self.travel_times.well_formed()
            || !self.grid_ids.well_formed()
        {
            return Err(Error::ArchiveCorrupt(
                "opportunity matrix companion arrays differ in shape".to_string(),
            ));
        }
        for i in 0..self.len() {
            if self.travel_times.row(i).len() != self.grid_ids.row(i).len() {
                return Err(Error::ArchiveCorrupt(format!(
                    "opportunity row {i} has mismatched travel_times and grid_ids"
                )));
            }
        }
        if self.travel_times.values().iter().any(|&t| t >= UNREACHABLE_COST) {
            return Err(Error::ArchiveCorrupt(
                "opportunity matrix contains unreachable sentinel".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_array_round_trips_rows() {
        let mut ragged = RaggedArray::new();
        ragged.push([1u32, 2, 3]);
        ragged.push([]);
        ragged.push([7]);

        assert_eq!(ragged.len(), 3);
        assert_eq!(ragged.row(0), &[1, 2, 3]);
        assert_eq!(ragged.row(1), &[] as &[u32]);
        assert_eq!(ragged.row(2), &[7]);
        assert_eq!(ragged.iter().map(<[u32]>::len).sum::<usize>(), 4);
    }

    #[test]
    fn traveltime_shape_mismatch_is_corrupt() {
        let matrix = TraveltimeMatrix {
            grid_ids: vec![1],
            north: vec![0],
            west: vec![0],
            height: vec![2],
            width: vec![2],
            travel_times: vec![vec![0; 3]],
        };
        assert!(matches!(matrix.validate(), Err(Error::ArchiveCorrupt(_))));
    }

    #[test]
    fn cost_at_respects_window_borders() {
        let matrix = TraveltimeMatrix {
            grid_ids: vec![1],
            north: vec![10],
            west: vec![20],
            height: vec![2],
            width: vec![2],
            travel_times: vec![vec![5, UNREACHABLE_COST, 8, 9]],
        };
        matrix.validate().unwrap();
        assert_eq!(matrix.cost_at(0, 10, 20), Some(5));
        assert_eq!(matrix.cost_at(0, 10, 21), None); // unreachable sentinel
        assert_eq!(matrix.cost_at(0, 11, 21), Some(9)); // south-east corner
        assert_eq!(matrix.cost_at(0, 12, 20), None); // outside window
    }

    #[test]
    fn opportunity_sentinel_is_rejected() {
        let mut matrix = OpportunityMatrix::default();
        matrix.travel_times.push([UNREACHABLE_COST]);
        matrix.grid_ids.push([1]);
        matrix.uids.push("a".to_string());
        matrix.names.push("a".to_string());
        assert!(matches!(matrix.validate(), Err(Error::ArchiveCorrupt(_))));
    }
}
