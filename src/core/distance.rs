use geo::{coord, Rect};

use crate::models::BoundingBox;

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Approximate planar distance between two points in kilometers
///
/// Longitude differences are scaled by the cosine of the mean latitude, which
/// keeps the result symmetric and is accurate to well under a percent at
/// regional (tens to low hundreds of km) separations.
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn planar_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let cos_lat = ((lat1 + lat2) / 2.0).to_radians().cos();
    let dx = cos_lat * (lon2 - lon1);
    let dy = lat2 - lat1;

    KM_PER_DEGREE * (dx * dx + dy * dy).sqrt()
}

/// Build a lat/lon box from ranges, expanded outward by `pad` degrees
///
/// `pad` is `[lon_pad, lat_pad]`, matching the `[x, y]` order of the grid.
pub fn padded_box(lat_range: [f64; 2], lon_range: [f64; 2], pad: [f64; 2]) -> BoundingBox {
    Rect::new(
        coord! { x: lon_range[0] - pad[0], y: lat_range[0] - pad[1] },
        coord! { x: lon_range[1] + pad[0], y: lat_range[1] + pad[1] },
    )
}

/// Grow an existing box by `[lon_pad, lat_pad]` on every side
pub fn pad_box(bbox: &BoundingBox, pad: [f64; 2]) -> BoundingBox {
    let (min, max) = (bbox.min(), bbox.max());
    Rect::new(
        coord! { x: min.x - pad[0], y: min.y - pad[1] },
        coord! { x: max.x + pad[0], y: max.y + pad[1] },
    )
}

/// Check if a point is within a bounding box (edges included)
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    let (min, max) = (bbox.min(), bbox.max());
    lat >= min.y && lat <= max.y && lon >= min.x && lon <= max.x
}

/// Split a box into `grids[0]` columns (lon) by `grids[1]` rows (lat)
///
/// Cells are returned column-major as `((col, row), cell)`. Neighbouring cells
/// share their edges.
pub fn grid_cells(bbox: &BoundingBox, grids: [usize; 2]) -> Vec<((usize, usize), BoundingBox)> {
    let (cols, rows) = (grids[0].max(1), grids[1].max(1));
    let (min, max) = (bbox.min(), bbox.max());
    let dx = bbox.width() / cols as f64;
    let dy = bbox.height() / rows as f64;

    let mut cells = Vec::with_capacity(cols * rows);
    for col in 0..cols {
        for row in 0..rows {
            let x0 = min.x + dx * col as f64;
            let y0 = min.y + dy * row as f64;
            // outer edges snap to the box so rounding never drops a border event
            let x1 = if col + 1 == cols { max.x } else { x0 + dx };
            let y1 = if row + 1 == rows { max.y } else { y0 + dy };
            cells.push((
                (col, row),
                Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }),
            ));
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_distance_one_degree_latitude() {
        let distance = planar_distance_km(36.0, -117.5, 37.0, -117.5);
        assert!((distance - 111.0).abs() < 1e-9, "got {}", distance);
    }

    #[test]
    fn test_planar_distance_symmetric() {
        let ab = planar_distance_km(35.7, -117.6, 36.02, -117.31);
        let ba = planar_distance_km(36.02, -117.31, 35.7, -117.6);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_planar_distance_close_to_haversine_at_regional_scale() {
        // Ridgecrest to Coso, ~46 km
        let d = planar_distance_km(35.62, -117.67, 36.02, -117.81);
        assert!((d - 46.2).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_padded_box() {
        let bbox = padded_box([35.45, 36.05], [-117.8, -117.25], [0.045, 0.036]);
        assert!((bbox.min().x - (-117.845)).abs() < 1e-9);
        assert!((bbox.max().x - (-117.205)).abs() < 1e-9);
        assert!((bbox.min().y - 35.414).abs() < 1e-9);
        assert!((bbox.max().y - 36.086).abs() < 1e-9);
    }

    #[test]
    fn test_point_within_bbox_inclusive() {
        let bbox = padded_box([35.0, 36.0], [-118.0, -117.0], [0.0, 0.0]);

        assert!(is_within_bounding_box(35.5, -117.5, &bbox));
        assert!(is_within_bounding_box(35.0, -118.0, &bbox));
        assert!(is_within_bounding_box(36.0, -117.0, &bbox));
        assert!(!is_within_bounding_box(36.01, -117.5, &bbox));
        assert!(!is_within_bounding_box(35.5, -116.99, &bbox));
    }

    #[test]
    fn test_grid_cells_cover_box() {
        let bbox = padded_box([35.0, 36.0], [-118.0, -117.0], [0.0, 0.0]);
        let cells = grid_cells(&bbox, [2, 3]);

        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].0, (0, 0));
        assert_eq!(cells[5].0, (1, 2));

        let (_, last) = cells[5];
        assert!((last.max().x - (-117.0)).abs() < 1e-9);
        assert!((last.max().y - 36.0).abs() < 1e-9);
        assert!((last.width() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pad_box() {
        let bbox = padded_box([35.0, 36.0], [-118.0, -117.0], [0.0, 0.0]);
        let padded = pad_box(&bbox, [0.1, 0.2]);
        assert!((padded.min().x - (-118.1)).abs() < 1e-9);
        assert!((padded.max().y - 36.2).abs() < 1e-9);
    }
}
