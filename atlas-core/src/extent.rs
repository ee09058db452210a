use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::AtlasError;

/// Closed ring of a rectangle: first and last coordinates are identical.
pub type Ring5 = [Coord<f64>; 5];

/// Axis-aligned bounding box of a viewport in degrees (lng/lat).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingExtent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl BoundingExtent {
    /// Build an extent, rejecting inverted or non-finite bounds.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, AtlasError> {
        let all_finite = [xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite());
        if !all_finite || xmin > xmax || ymin > ymax {
            return Err(AtlasError::InvalidExtent {
                xmin,
                xmax,
                ymin,
                ymax,
            });
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Normalise two arbitrary corners (renderers report west/east, south/north,
    /// but after a bearing change the corners may arrive swapped).
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Result<Self, AtlasError> {
        Self::new(a.0.min(b.0), a.0.max(b.0), a.1.min(b.1), a.1.max(b.1))
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Counter-clockwise closed ring starting at the south-west corner.
    pub fn ring(&self) -> Ring5 {
        rect_ring(self.xmin, self.xmax, self.ymin, self.ymax)
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.ring().to_vec()), vec![])
    }
}

/// Fixed-size locator rectangle drawn on the mini map. The half extents are
/// constant degree offsets, so the box does not change with zoom.
pub fn locator_ring(center: (f64, f64), half_lng: f64, half_lat: f64) -> Ring5 {
    let (cx, cy) = center;
    rect_ring(cx - half_lng, cx + half_lng, cy - half_lat, cy + half_lat)
}

fn rect_ring(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Ring5 {
    [
        Coord { x: xmin, y: ymin },
        Coord { x: xmax, y: ymin },
        Coord { x: xmax, y: ymax },
        Coord { x: xmin, y: ymax },
        Coord { x: xmin, y: ymin },
    ]
}

/// GeoJSON `Feature` holding a single polygon ring, as consumed by renderer sources.
pub fn ring_to_geojson(ring: &Ring5) -> serde_json::Value {
    let coords: Vec<[f64; 2]> = ring.iter().map(|c| [c.x, c.y]).collect();
    serde_json::json!({
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "Polygon",
            "coordinates": [coords],
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(BoundingExtent::new(1.0, 0.0, 0.0, 1.0).is_err());
        assert!(BoundingExtent::new(0.0, 1.0, 2.0, 1.0).is_err());
        assert!(BoundingExtent::new(0.0, f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn corners_are_normalised() {
        let e = BoundingExtent::from_corners((101.0, 14.0), (100.0, 13.0)).unwrap();
        assert_eq!((e.xmin, e.xmax, e.ymin, e.ymax), (100.0, 101.0, 13.0, 14.0));
    }

    #[test]
    fn ring_is_closed_and_counter_clockwise() {
        let e = BoundingExtent::new(0.0, 2.0, 0.0, 1.0).unwrap();
        let r = e.ring();
        assert_eq!(r[0], r[4]);
        // shoelace: positive for counter-clockwise
        let twice_area: f64 = r
            .windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum();
        assert!(twice_area > 0.0);
        assert_eq!(twice_area / 2.0, 2.0);
    }

    #[test]
    fn locator_is_independent_of_extent_size() {
        let r = locator_ring((100.5, 13.5), 0.25, 0.5);
        assert_eq!(r[0], Coord { x: 100.25, y: 13.0 });
        assert_eq!(r[2], Coord { x: 100.75, y: 14.0 });
    }

    #[test]
    fn geojson_ring_has_five_positions() {
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let v = ring_to_geojson(&e.ring());
        let coords = v["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(coords.len(), 5);
    }
}
