//! Web-Mercator pixel grid conversions.
//!
//! Every raster coordinate in the crate lives on the global Web-Mercator
//! pixel grid at a fixed zoom level: the world spans `256 * 2^zoom` pixels
//! per axis.
//!
//! # Axis convention
//!
//! `x` is the **row** on the north axis (grows southward from the top of the
//! mercator square), `y` is the **column** on the west axis (grows eastward).
//! This is the opposite of the usual map (x=east, y=north) convention but it
//! is baked into every persisted archive; flipping it would silently corrupt
//! all matrix lookups.

use geo::Point;

/// Spherical mercator earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the side of the mercator square in meters.
const ORIGIN_SHIFT_M: f64 = std::f64::consts::PI * EARTH_RADIUS_M;

/// Global pixel coordinate; `x` is the row, `y` the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

/// Meters covered by one pixel at the given zoom level (at the equator).
pub fn meters_per_pixel(zoom: u8) -> f64 {
    2.0 * ORIGIN_SHIFT_M / (256.0 * f64::from(1u32 << zoom))
}

/// Projects geographic coordinates to mercator meters relative to the
/// square's center.
pub fn lonlat_to_meters(lon: f64, lat: f64) -> (f64, f64) {
    let mx = lon * ORIGIN_SHIFT_M / 180.0;
    let my = ((90.0 + lat) * std::f64::consts::PI / 360.0).tan().ln() * EARTH_RADIUS_M;
    (mx, my)
}

/// Converts mercator meters to a global pixel coordinate at `zoom`.
///
/// Coordinates outside the mercator square clamp to the grid border.
pub fn meters_to_pixel(mx: f64, my: f64, zoom: u8) -> Pixel {
    let resolution = meters_per_pixel(zoom);
    let max_pixel = 256.0 * f64::from(1u32 << zoom) - 1.0;

    let row = ((ORIGIN_SHIFT_M - my) / resolution).floor().clamp(0.0, max_pixel);
    let col = ((mx + ORIGIN_SHIFT_M) / resolution).floor().clamp(0.0, max_pixel);
    Pixel {
        x: row as u32,
        y: col as u32,
    }
}

/// Converts geographic coordinates to a global pixel coordinate at `zoom`.
pub fn lonlat_to_pixel(lon: f64, lat: f64, zoom: u8) -> Pixel {
    let (mx, my) = lonlat_to_meters(lon, lat);
    meters_to_pixel(mx, my, zoom)
}

/// Inverse of [`lonlat_to_pixel`]: geographic coordinates of a pixel's
/// top-left corner.
pub fn pixel_to_lonlat(pixel: Pixel, zoom: u8) -> (f64, f64) {
    let resolution = meters_per_pixel(zoom);
    let mx = f64::from(pixel.y) * resolution - ORIGIN_SHIFT_M;
    let my = ORIGIN_SHIFT_M - f64::from(pixel.x) * resolution;

    let lon = mx / ORIGIN_SHIFT_M * 180.0;
    let lat = (2.0 * (my / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Great-circle distance in meters between two lon/lat points.
pub fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lon1, lat1) = (a.x().to_radians(), a.y().to_radians());
    let (lon2, lat2) = (b.x().to_radians(), b.y().to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Rough meters-to-degrees conversion at a given latitude, used only to
/// widen lookup bounding boxes. Never used for stored coordinates.
pub fn meters_to_degrees(meters: f64, lat: f64) -> f64 {
    let meters_per_degree = 111_320.0 * lat.to_radians().cos().max(0.01);
    meters / meters_per_degree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_grid_center() {
        let pixel = lonlat_to_pixel(0.0, 0.0, 12);
        let center = 256 * (1 << 12) / 2;
        assert_eq!(pixel.x, center);
        assert_eq!(pixel.y, center);
    }

    #[test]
    fn north_is_smaller_row() {
        let munich = lonlat_to_pixel(11.57, 48.14, 12);
        let rome = lonlat_to_pixel(12.49, 41.9, 12);
        // Munich is north of Rome: smaller row. Rome is east: larger column.
        assert!(munich.x < rome.x);
        assert!(munich.y < rome.y);
    }

    #[test]
    fn neighboring_pixels_are_one_apart() {
        let resolution = meters_per_pixel(12);
        let (mx, my) = lonlat_to_meters(11.5, 48.1);
        let base = meters_to_pixel(mx, my, 12);
        let east = meters_to_pixel(mx + resolution, my, 12);
        let north = meters_to_pixel(mx, my + resolution, 12);
        assert_eq!(east.y, base.y + 1);
        assert_eq!(north.x, base.x - 1);
        assert_eq!(east.x, base.x);
    }

    #[test]
    fn pixel_round_trips_through_lonlat() {
        let pixel = lonlat_to_pixel(11.57, 48.14, 12);
        let (lon, lat) = pixel_to_lonlat(pixel, 12);
        // Top-left corner of the pixel is within one pixel of the input.
        let back = lonlat_to_pixel(lon + 1e-9, lat - 1e-9, 12);
        assert_eq!(back, pixel);
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Munich Marienplatz to Odeonsplatz is roughly 750 m.
        let a = Point::new(11.5755, 48.1374);
        let b = Point::new(11.5777, 48.1425);
        let d = haversine_m(a, b);
        assert!((500.0..1000.0).contains(&d), "got {d}");
    }
}
