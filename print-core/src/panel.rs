use atlas_core::{Axis, BoundingExtent, DatasetStats, GraticuleLine, format_degrees};
use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;

use crate::compose::{Fit, letterbox};
use crate::error::ExportError;
use crate::layout::Rect;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub label: String,
    /// CSS colour, e.g. `#d7301f`.
    pub color: String,
}

/// Text and metadata that surround the map images on the print panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelDetails {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub extent: Option<BoundingExtent>,
    #[serde(default)]
    pub graticule: Vec<GraticuleLine>,
    #[serde(default)]
    pub legend: Vec<LegendEntry>,
    #[serde(default)]
    pub stats: Vec<DatasetStats>,
}

/// Everything the panel needs: details plus the composed map images.
pub struct PanelContent {
    pub details: PanelDetails,
    pub primary: Pixmap,
    /// Where the base map sits inside `primary`; the rest is letterbox.
    pub primary_map: Fit,
    pub mini: Option<Pixmap>,
}

impl PanelContent {
    /// Panel box covered by the base map once `primary` is drawn, aspect
    /// kept, into `frame`. Graticule lines are placed against this box.
    pub fn map_area(&self, frame: Rect) -> Rect {
        let outer = letterbox(
            (self.primary.width(), self.primary.height()),
            (frame.w.max(0.0) as u32, frame.h.max(0.0) as u32),
        );
        let s = outer.scale(self.primary.width());
        let m = self.primary_map;
        Rect {
            x: frame.x + outer.x + m.x * s,
            y: frame.y + outer.y + m.y * s,
            w: m.width * s,
            h: m.height * s,
        }
    }
}

/// Lays out and rasterizes the print panel into one image.
///
/// `Ok(None)` means the renderer produced nothing for the whole panel, which
/// aborts the export.
#[allow(async_fn_in_trait)]
pub trait PanelRenderer {
    async fn render(&self, content: &PanelContent) -> Result<Option<Pixmap>, ExportError>;
}

/// Footer line with the four extent bounds.
pub fn extent_caption(extent: &BoundingExtent) -> String {
    format!(
        "Extent: {} – {}, {} – {}",
        format_degrees(Axis::Vertical, extent.xmin),
        format_degrees(Axis::Vertical, extent.xmax),
        format_degrees(Axis::Horizontal, extent.ymin),
        format_degrees(Axis::Horizontal, extent.ymax)
    )
}

/// One line per dataset: `Burnt area: 12 features, 1,234.50 rai`.
pub fn stats_lines(stats: &[DatasetStats]) -> Vec<String> {
    use atlas_core::measure::group_thousands;
    stats
        .iter()
        .map(|d| {
            let mut line = format!(
                "{}: {} features, {} rai",
                d.kind.label(),
                d.stats.features,
                group_thousands(d.stats.area_rai, 2)
            );
            if d.stats.volume_ton > 0.0 {
                line.push_str(&format!(", {} t", group_thousands(d.stats.volume_ton, 2)));
            }
            if d.skipped > 0 {
                line.push_str(&format!(" ({} skipped)", d.skipped));
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::features::DatasetKind;
    use atlas_core::ExtentStats;

    #[test]
    fn caption_names_hemispheres() {
        let e = BoundingExtent::new(-70.5, -70.1, -33.6, -33.3).unwrap();
        assert_eq!(
            extent_caption(&e),
            "Extent: 70.50000°W – 70.10000°W, 33.60000°S – 33.30000°S"
        );
        let e = BoundingExtent::new(100.0, 100.4, 13.0, 13.3).unwrap();
        assert_eq!(
            extent_caption(&e),
            "Extent: 100.00000°E – 100.40000°E, 13.00000°N – 13.30000°N"
        );
    }

    #[test]
    fn map_area_skips_the_letterbox() {
        // square base composed into a 1600x1000 print: 300px white bars left and right
        let content = PanelContent {
            details: PanelDetails::default(),
            primary: Pixmap::new(1600, 1000).unwrap(),
            primary_map: letterbox((1000, 1000), (1600, 1000)),
            mini: None,
        };
        let frame = Rect {
            x: 10.0,
            y: 20.0,
            w: 800.0,
            h: 500.0,
        };
        assert_eq!(
            content.map_area(frame),
            Rect {
                x: 160.0,
                y: 20.0,
                w: 500.0,
                h: 500.0
            }
        );
    }

    #[test]
    fn stats_lines_mention_volume_only_when_present() {
        let stats = vec![
            DatasetStats {
                kind: DatasetKind::BurntArea,
                stats: ExtentStats {
                    features: 3,
                    area_rai: 1234.5,
                    ..Default::default()
                },
                skipped: 1,
            },
            DatasetStats {
                kind: DatasetKind::Product,
                stats: ExtentStats {
                    features: 1,
                    area_rai: 10.0,
                    volume_ton: 2500.0,
                    ..Default::default()
                },
                skipped: 0,
            },
        ];
        assert_eq!(
            stats_lines(&stats),
            [
                "Burnt area: 3 features, 1,234.50 rai (1 skipped)",
                "Product: 1 features, 10.00 rai, 2,500.00 t",
            ]
        );
    }
}
