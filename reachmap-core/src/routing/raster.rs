//! Rasterization of expanded edges onto a per-start pixel window.

use geo::Point;

use crate::model::{PixelExtent, network::GraphEdge};
use crate::{UNREACHABLE_COST, projection};

/// Local cost raster for one start, covering its pixel window.
///
/// Pixels start at [`UNREACHABLE_COST`] and only ever decrease. Costs are
/// stored as whole seconds, rounded up, so a pixel written from anywhere
/// along the final second of an edge carries that edge's full-second cost.
pub struct WindowBuffer {
    extent: PixelExtent,
    zoom: u8,
    /// Interpolation step along edges, in meters of ground distance.
    step_m: f64,
    cells: Vec<u32>,
}

impl WindowBuffer {
    pub fn new(extent: PixelExtent, zoom: u8) -> Self {
        // Half a pixel of ground distance at the window's latitude keeps
        // interpolation dense enough that no covered pixel is skipped.
        let center = projection::Pixel {
            x: extent.north + extent.height / 2,
            y: extent.west + extent.width / 2,
        };
        let (_, lat) = projection::pixel_to_lonlat(center, zoom);
        let step_m = (projection::meters_per_pixel(zoom) * lat.to_radians().cos() / 2.0).max(0.05);

        Self {
            extent,
            zoom,
            step_m,
            cells: vec![UNREACHABLE_COST; extent.area()],
        }
    }

    /// Writes `cost_s` to the pixel containing `(lon, lat)` if the pixel
    /// lies inside the window and the cost improves on what is there.
    pub fn mark(&mut self, lon: f64, lat: f64, cost_s: f64) {
        let pixel = projection::lonlat_to_pixel(lon, lat, self.zoom);
        if !self.extent.contains(pixel.x, pixel.y) {
            return;
        }
        let index = self.extent.local_index(pixel.x, pixel.y);
        let cost = cost_s.ceil() as u32;
        if cost < self.cells[index] {
            self.cells[index] = cost;
        }
    }

    /// Rasterizes one expanded edge entered at `entry_cost_s` seconds.
    ///
    /// Travel time is interpolated along the edge geometry in proportion to
    /// distance; points whose interpolated cost exceeds `budget_s` are
    /// clipped, as are points outside the window.
    pub fn rasterize_edge(&mut self, entry_cost_s: f64, edge: &GraphEdge, budget_s: f64) {
        let line = &edge.geometry;
        if line.0.is_empty() || entry_cost_s > budget_s {
            return;
        }

        let total_m = line_length_m(line).max(f64::EPSILON);
        let mut travelled_m = 0.0;

        let first = line.0[0];
        self.mark(first.x, first.y, entry_cost_s);

        for segment in line.0.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let segment_m = projection::haversine_m(Point::new(a.x, a.y), Point::new(b.x, b.y));
            if segment_m == 0.0 {
                continue;
            }

            let samples = (segment_m / self.step_m).ceil() as usize;
            for sample in 1..=samples {
                let t = sample as f64 / samples as f64;
                let distance_m = travelled_m + segment_m * t;
                let cost_s = entry_cost_s + edge.cost * (distance_m / total_m);
                if cost_s > budget_s {
                    return;
                }
                let lon = a.x + (b.x - a.x) * t;
                let lat = a.y + (b.y - a.y) * t;
                self.mark(lon, lat, cost_s);
            }
            travelled_m += segment_m;
        }
    }

    pub fn into_costs(self) -> Vec<u32> {
        self.cells
    }
}

fn line_length_m(line: &geo::LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|pair| {
            projection::haversine_m(
                Point::new(pair[0].x, pair[0].y),
                Point::new(pair[1].x, pair[1].y),
            )
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use geo::LineString;

    use super::*;
    use crate::projection::lonlat_to_pixel;

    const ZOOM: u8 = 17;

    fn window_around(lon: f64, lat: f64, pixels: u32) -> PixelExtent {
        let center = lonlat_to_pixel(lon, lat, ZOOM);
        PixelExtent {
            north: center.x - pixels,
            west: center.y - pixels,
            height: 2 * pixels + 1,
            width: 2 * pixels + 1,
        }
    }

    #[test]
    fn untouched_buffer_is_all_sentinel() {
        let buffer = WindowBuffer::new(window_around(11.57, 48.14, 4), ZOOM);
        let costs = buffer.into_costs();
        assert_eq!(costs.len(), 81);
        assert!(costs.iter().all(|&c| c == UNREACHABLE_COST));
    }

    #[test]
    fn marks_clip_to_the_window() {
        let extent = window_around(11.57, 48.14, 2);
        let mut buffer = WindowBuffer::new(extent, ZOOM);
        buffer.mark(11.57, 48.14, 10.0);
        buffer.mark(11.58, 48.14, 10.0); // roughly 740 m east, outside

        let costs = buffer.into_costs();
        assert_eq!(costs.iter().filter(|&&c| c != UNREACHABLE_COST).count(), 1);
    }

    #[test]
    fn edge_endpoint_carries_the_full_cost() {
        // 100 m eastward edge at 72 s (walking 5 km/h).
        let (lon, lat) = (11.570, 48.140);
        let end_lon = lon + projection::meters_to_degrees(100.0, lat);
        let extent = window_around(end_lon, lat, 8);
        let mut buffer = WindowBuffer::new(extent, ZOOM);

        let edge = GraphEdge {
            cost: 72.0,
            length_m: 100.0,
            geometry: LineString::from(vec![(lon, lat), (end_lon, lat)]),
        };
        buffer.rasterize_edge(0.0, &edge, 1200.0);

        let end = lonlat_to_pixel(end_lon, lat, ZOOM);
        let costs = buffer.into_costs();
        assert_eq!(costs[extent.local_index(end.x, end.y)], 72);
    }

    #[test]
    fn budget_clips_the_far_end() {
        let (lon, lat) = (11.570, 48.140);
        let end_lon = lon + projection::meters_to_degrees(100.0, lat);
        let extent = window_around(lon, lat, 160);
        let mut buffer = WindowBuffer::new(extent, ZOOM);

        let edge = GraphEdge {
            cost: 72.0,
            length_m: 100.0,
            geometry: LineString::from(vec![(lon, lat), (end_lon, lat)]),
        };
        // Budget runs out halfway down the edge.
        buffer.rasterize_edge(0.0, &edge, 36.0);

        let end = lonlat_to_pixel(end_lon, lat, ZOOM);
        let start = lonlat_to_pixel(lon, lat, ZOOM);
        let costs = buffer.into_costs();
        assert_eq!(costs[extent.local_index(start.x, start.y)], 0);
        assert_eq!(costs[extent.local_index(end.x, end.y)], UNREACHABLE_COST);
    }
}
