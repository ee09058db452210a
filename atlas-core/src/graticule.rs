use serde::{Deserialize, Serialize};

use crate::config::GraticuleConfig;
use crate::extent::BoundingExtent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Meridian: constant longitude, value is x.
    Vertical,
    /// Parallel: constant latitude, value is y.
    Horizontal,
}

/// One grid line over an extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraticuleLine {
    pub axis: Axis,
    /// Fraction of the extent span, strictly inside (0, 1).
    pub position: f64,
    /// Coordinate in degrees, rounded to 5 decimals.
    pub value: f64,
}

/// `100.10000°E`, `13.10000°N`; negative values take W/S.
pub fn format_degrees(axis: Axis, value: f64) -> String {
    let hemi = match (axis, value < 0.0) {
        (Axis::Vertical, false) => 'E',
        (Axis::Vertical, true) => 'W',
        (Axis::Horizontal, false) => 'N',
        (Axis::Horizontal, true) => 'S',
    };
    format!("{:.5}°{hemi}", value.abs())
}

impl GraticuleLine {
    pub fn label(&self) -> String {
        format_degrees(self.axis, self.value)
    }
}

fn round5(v: f64) -> f64 {
    (v * 1e5).round() / 1e5
}

/// `cols - 1` vertical lines followed by `rows - 1` horizontal lines at
/// fractions `i/cols` and `i/rows` of the extent span.
pub fn graticule(extent: &BoundingExtent, cfg: GraticuleConfig) -> Vec<GraticuleLine> {
    let vertical = (1..cfg.cols).map(|i| {
        let position = f64::from(i) / f64::from(cfg.cols);
        GraticuleLine {
            axis: Axis::Vertical,
            position,
            value: round5(extent.xmin + position * extent.width()),
        }
    });
    let horizontal = (1..cfg.rows).map(|i| {
        let position = f64::from(i) / f64::from(cfg.rows);
        GraticuleLine {
            axis: Axis::Horizontal,
            position,
            value: round5(extent.ymin + position * extent.height()),
        }
    });
    vertical.chain(horizontal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_carry_hemisphere() {
        let e = BoundingExtent::new(-1.0, 1.0, -1.0, 1.0).unwrap();
        let lines = graticule(&e, GraticuleConfig { cols: 4, rows: 2 });
        let labels: Vec<String> = lines.iter().map(GraticuleLine::label).collect();
        assert_eq!(
            labels,
            ["0.50000°W", "0.00000°E", "0.50000°E", "0.00000°N"]
        );
    }

    #[test]
    fn single_cell_has_no_lines() {
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(graticule(&e, GraticuleConfig { cols: 1, rows: 1 }).is_empty());
        assert!(graticule(&e, GraticuleConfig { cols: 0, rows: 0 }).is_empty());
    }
}
