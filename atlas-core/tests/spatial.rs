use atlas_core::config::GraticuleConfig;
use atlas_core::features::{BurntAreaProps, Feature, FeatureGeometry};
use atlas_core::measure::{line_length_m, polygon_area_m2};
use atlas_core::{Axis, BoundingExtent, filter_by_extent, graticule};
use geo_types::Coord;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn square(x0: f64, y0: f64, size: f64, id: &str) -> Feature<BurntAreaProps> {
    let ring = vec![
        vec![x0, y0],
        vec![x0 + size, y0],
        vec![x0 + size, y0 + size],
        vec![x0, y0 + size],
        vec![x0, y0],
    ];
    Feature {
        id: Some(id.to_string()),
        geometry: Some(FeatureGeometry::Polygon(vec![ring])),
        properties: BurntAreaProps::default(),
    }
}

#[test]
fn graticule_over_a_small_extent() {
    let e = BoundingExtent::new(100.0, 100.4, 13.0, 13.3).unwrap();
    let lines = graticule(&e, GraticuleConfig::default());
    let xs: Vec<f64> = lines
        .iter()
        .filter(|l| l.axis == Axis::Vertical)
        .map(|l| l.value)
        .collect();
    let ys: Vec<f64> = lines
        .iter()
        .filter(|l| l.axis == Axis::Horizontal)
        .map(|l| l.value)
        .collect();
    assert_eq!(xs, vec![100.1, 100.2, 100.3]);
    assert_eq!(ys, vec![13.1, 13.2]);
    assert_eq!(lines[0].label(), "100.10000°E");
}

#[test]
fn inside_and_straddling_features_are_kept() {
    let e = BoundingExtent::new(100.0, 101.0, 13.0, 14.0).unwrap();
    let features = vec![
        square(100.2, 13.2, 0.2, "inside"),
        square(100.9, 13.5, 0.3, "straddling"),
        square(102.0, 13.5, 0.3, "outside"),
    ];
    let ids: Vec<&str> = filter_by_extent(&features, &e)
        .into_iter()
        .filter_map(|f| f.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["inside", "straddling"]);
}

#[test]
fn polygon_touching_the_edge_counts() {
    let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
    let features = vec![square(1.0, 0.2, 0.5, "touching"), square(2.0, 0.2, 0.5, "apart")];
    assert_eq!(filter_by_extent(&features, &e).len(), 1);
}

proptest! {
    #[test]
    fn graticule_matches_linear_interpolation(
        xmin in -180.0f64..179.0,
        w in 0.0001f64..1.0,
        ymin in -85.0f64..84.0,
        h in 0.0001f64..1.0,
    ) {
        let e = BoundingExtent::new(xmin, xmin + w, ymin, ymin + h).unwrap();
        let lines = graticule(&e, GraticuleConfig::default());
        let vertical: Vec<_> = lines.iter().filter(|l| l.axis == Axis::Vertical).collect();
        let horizontal: Vec<_> = lines.iter().filter(|l| l.axis == Axis::Horizontal).collect();
        prop_assert_eq!(vertical.len(), 3);
        prop_assert_eq!(horizontal.len(), 2);
        for (i, l) in vertical.iter().enumerate() {
            let expect = e.xmin + ((i + 1) as f64 / 4.0) * (e.xmax - e.xmin);
            prop_assert!((l.value - expect).abs() <= 5e-6);
            prop_assert!(l.position > 0.0 && l.position < 1.0);
        }
        for (i, l) in horizontal.iter().enumerate() {
            let expect = e.ymin + ((i + 1) as f64 / 3.0) * (e.ymax - e.ymin);
            prop_assert!((l.value - expect).abs() <= 5e-6);
        }
        prop_assert_eq!(lines.clone(), graticule(&e, GraticuleConfig::default()));
    }

    #[test]
    fn points_on_or_inside_are_kept_and_outside_dropped(
        x in 0.0f64..=1.0,
        y in 0.0f64..=1.0,
        edge in 0usize..4,
    ) {
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let on_edge = match edge {
            0 => (0.0, y),
            1 => (1.0, y),
            2 => (x, 0.0),
            _ => (x, 1.0),
        };
        let outside = match edge {
            0 => (-1.0, y),
            1 => (2.0, y),
            2 => (x, -1.0),
            _ => (x, 2.0),
        };
        let mk = |(px, py): (f64, f64)| Feature {
            id: None,
            geometry: Some(FeatureGeometry::Point(vec![px, py])),
            properties: BurntAreaProps::default(),
        };
        let features = vec![mk(on_edge), mk(outside)];
        prop_assert_eq!(filter_by_extent(&features, &e).len(), 1);
    }

    #[test]
    fn line_length_never_shrinks_while_appending(
        pts in prop::collection::vec((99.0f64..101.0, 12.0f64..14.0), 1..12),
    ) {
        let coords: Vec<Coord<f64>> = pts.iter().map(|&(x, y)| Coord { x, y }).collect();
        let mut previous = 0.0;
        for n in 1..=coords.len() {
            let len = line_length_m(&coords[..n]);
            prop_assert!(len >= previous);
            prop_assert_eq!(len, line_length_m(&coords[..n]));
            previous = len;
        }
    }

    #[test]
    fn polygon_area_is_repeatable(
        pts in prop::collection::vec((99.0f64..101.0, 12.0f64..14.0), 0..10),
    ) {
        let coords: Vec<Coord<f64>> = pts.iter().map(|&(x, y)| Coord { x, y }).collect();
        let area = polygon_area_m2(&coords);
        prop_assert!(area.is_finite() && area >= 0.0);
        prop_assert_eq!(area, polygon_area_m2(&coords));
        if coords.len() < 3 {
            prop_assert_eq!(area, 0.0);
        }
    }
}
