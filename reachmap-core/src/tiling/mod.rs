//! Bulk and calculation grid planning (hex tiler).
//!
//! Covers buffered study areas with H3 cells at the bulk resolution,
//! enumerates their calculation-resolution descendants and derives one
//! pixel window per calculation cell. Orderings are sorted by H3 id so
//! downstream archive names and array indices are reproducible.

use geo::{Geometry, LineString, Polygon};
use h3o::{
    CellIndex, LatLng, Resolution,
    geom::{ContainmentMode, TilerBuilder},
};
use itertools::Itertools;
use log::info;

use crate::model::{BulkCell, BulkPlan, PixelExtent, StudyArea};
use crate::{Error, projection};

/// Pixel windows are squares of side `2 * buffer * sqrt(2)` centered on the
/// start, so a start can reach its whole window even diagonally.
const WINDOW_DIAGONAL_FACTOR: f64 = std::f64::consts::SQRT_2;

/// Builds the bulk calculation plan for a set of study areas.
///
/// `buffer_m` is the reachable-distance buffer (speed times budget); each
/// study area is additionally widened by one bulk-cell edge length before
/// the coverage is computed.
///
/// # Errors
///
/// `InvalidResolution` when `calc_resolution` is not finer than
/// `bulk_resolution`; `UnsupportedGeometry` when a study area is not
/// polygonal.
pub fn plan(
    study_areas: &[StudyArea],
    bulk_resolution: u8,
    calc_resolution: u8,
    buffer_m: f64,
    pixel_zoom: u8,
) -> Result<BulkPlan, Error> {
    if calc_resolution <= bulk_resolution {
        return Err(Error::InvalidResolution {
            bulk: bulk_resolution,
            calc: calc_resolution,
        });
    }
    let calc_resolution = parse_resolution(calc_resolution)?;

    let bulk_ids = cover_study_areas(study_areas, bulk_resolution, buffer_m)?;

    let mut cells = Vec::with_capacity(bulk_ids.len());
    for bulk_id in bulk_ids {
        let calc_ids: Vec<CellIndex> = bulk_id.children(calc_resolution).sorted().collect();

        let mut lons = Vec::with_capacity(calc_ids.len());
        let mut lats = Vec::with_capacity(calc_ids.len());
        let mut extents = Vec::with_capacity(calc_ids.len());
        for calc_id in &calc_ids {
            let centroid = LatLng::from(*calc_id);
            lons.push(centroid.lng());
            lats.push(centroid.lat());
            extents.push(pixel_extent(
                centroid.lng(),
                centroid.lat(),
                buffer_m,
                pixel_zoom,
            ));
        }

        cells.push(BulkCell {
            bulk_id,
            calc_ids,
            lons,
            lats,
            extents,
        });
    }

    info!(
        "planned {} bulk cells with {} starting points",
        cells.len(),
        cells.iter().map(BulkCell::len).sum::<usize>()
    );
    Ok(BulkPlan { cells })
}

/// H3 cells at `resolution` covering the study areas buffered by
/// `buffer_m` meters, sorted and deduplicated.
///
/// The buffer is realized as grid disks around the raw coverage: `k` rings
/// of cells cover at least `k` edge lengths of distance.
pub fn cover_study_areas(
    study_areas: &[StudyArea],
    resolution: u8,
    buffer_m: f64,
) -> Result<Vec<CellIndex>, Error> {
    let resolution = parse_resolution(resolution)?;

    let mut tiler = TilerBuilder::new(resolution)
        .containment_mode(ContainmentMode::Covers)
        .build();
    for area in study_areas {
        for polygon in polygons_of(area)? {
            tiler.add(polygon)?;
        }
    }
    let coverage: Vec<CellIndex> = tiler.into_coverage().collect();

    let Some(&probe) = coverage.first() else {
        return Ok(Vec::new());
    };
    let edge_length = cell_edge_length_m(probe);
    let rings = ((buffer_m + edge_length) / edge_length).ceil() as u32;

    Ok(coverage
        .into_iter()
        .flat_map(|cell| cell.grid_disk::<Vec<_>>(rings))
        .sorted()
        .dedup()
        .collect())
}

/// Hexagon outline of a cell as a lon/lat polygon.
pub fn cell_polygon(cell: CellIndex) -> Polygon<f64> {
    let ring: Vec<(f64, f64)> = cell
        .boundary()
        .iter()
        .map(|vertex| (vertex.lng(), vertex.lat()))
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Debug dump of a cell coverage as a GeoJSON feature collection.
pub fn coverage_geojson(cells: &[CellIndex]) -> Result<geojson::FeatureCollection, Error> {
    let features = cells
        .iter()
        .map(|&cell| {
            let geometry = geojson::Geometry::new(geojson::Value::from(&cell_polygon(cell)));
            serde_json::from_value::<geojson::Feature>(serde_json::json!({
                "type": "Feature",
                "geometry": geometry,
                "properties": { "bulk_id": cell.to_string() },
            }))
            .map_err(|e| Error::GeoJsonError(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(geojson::FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    })
}

fn parse_resolution(resolution: u8) -> Result<Resolution, Error> {
    Resolution::try_from(resolution)
        .map_err(|e| Error::InvalidData(format!("got invalid H3 resolution {e}")))
}

fn polygons_of(area: &StudyArea) -> Result<Vec<Polygon<f64>>, Error> {
    match &area.geometry {
        Geometry::Polygon(polygon) => Ok(vec![polygon.clone()]),
        Geometry::MultiPolygon(multi) => Ok(multi.0.clone()),
        other => Err(Error::UnsupportedGeometry(format!(
            "study area {} is a {other:?}, expected (multi)polygon",
            area.id
        ))),
    }
}

fn cell_edge_length_m(cell: CellIndex) -> f64 {
    cell.edges().next().map_or(1.0, |edge| edge.length_m())
}

/// Square pixel window of side `2 * buffer_m * sqrt(2)` centered on the
/// given coordinates.
fn pixel_extent(lon: f64, lat: f64, buffer_m: f64, zoom: u8) -> PixelExtent {
    let (mx, my) = projection::lonlat_to_meters(lon, lat);
    let half_side = buffer_m * WINDOW_DIAGONAL_FACTOR;

    let top_left = projection::meters_to_pixel(mx - half_side, my + half_side, zoom);
    let bottom_right = projection::meters_to_pixel(mx + half_side, my - half_side, zoom);

    PixelExtent {
        north: top_left.x,
        west: top_left.y,
        height: bottom_right.x - top_left.x + 1,
        width: bottom_right.y - top_left.y + 1,
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn munich_block() -> StudyArea {
        StudyArea {
            id: 1,
            name: "munich-block".to_string(),
            geometry: Geometry::Polygon(polygon![
                (x: 11.56, y: 48.13),
                (x: 11.60, y: 48.13),
                (x: 11.60, y: 48.15),
                (x: 11.56, y: 48.15),
                (x: 11.56, y: 48.13),
            ]),
        }
    }

    #[test]
    fn resolutions_must_nest() {
        let err = plan(&[munich_block()], 8, 8, 100.0, 12).unwrap_err();
        assert!(matches!(err, Error::InvalidResolution { .. }));
    }

    #[test]
    fn point_geometry_is_unsupported() {
        let area = StudyArea {
            id: 2,
            name: "point".to_string(),
            geometry: Geometry::Point(geo::Point::new(11.5, 48.1)),
        };
        let err = cover_study_areas(&[area], 6, 0.0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(_)));
    }

    #[test]
    fn coverage_is_sorted_and_unique() {
        let cells = cover_study_areas(&[munich_block()], 6, 500.0).unwrap();
        assert!(!cells.is_empty());
        assert!(cells.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn plan_cells_close_under_parent() {
        let plan = plan(&[munich_block()], 6, 8, 100.0, 12).unwrap();
        assert!(!plan.is_empty());
        for cell in plan.iter() {
            assert!(!cell.is_empty());
            assert_eq!(cell.calc_ids.len(), cell.extents.len());
            assert_eq!(cell.calc_ids.len(), cell.lons.len());
            for calc_id in &cell.calc_ids {
                let parent = calc_id.parent(cell.bulk_id.resolution());
                assert_eq!(parent, Some(cell.bulk_id));
            }
            // Children are sorted for reproducible archive indices.
            assert!(cell.calc_ids.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn extents_are_square_and_centered() {
        let extent = pixel_extent(11.57, 48.14, 500.0, 12);
        // 500 m buffer at zoom 12 (~38 m/px): roughly 37 px across; pixel
        // alignment may cost one row or column.
        assert!(extent.height.abs_diff(extent.width) <= 1, "{extent:?}");
        assert!(extent.height >= 30 && extent.height <= 60, "{extent:?}");

        let center = projection::lonlat_to_pixel(11.57, 48.14, 12);
        assert!(extent.contains(center.x, center.y));
    }
}
