use geo::Intersects;
use geo_types::{Geometry, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::AtlasError;
use crate::extent::BoundingExtent;
use crate::features::{Dataset, DatasetKind, Feature, Measures};

/// Result of [`try_filter_by_extent`]: the intersecting features plus one
/// error per feature that could not be tested.
pub struct Filtered<'a, P> {
    pub hits: Vec<&'a Feature<P>>,
    pub errors: Vec<AtlasError>,
}

fn intersects(geometry: &Geometry<f64>, area: &Polygon<f64>) -> Result<bool, String> {
    match geometry {
        Geometry::Point(p) => Ok(p.intersects(area)),
        Geometry::Polygon(p) => Ok(p.intersects(area)),
        Geometry::MultiPolygon(mp) => Ok(mp.intersects(area)),
        other => Err(format!("unsupported geometry {other:?}")),
    }
}

/// Features whose geometry intersects `extent`, boundary inclusive. Malformed
/// features are reported individually and never abort the scan.
pub fn try_filter_by_extent<'a, P>(
    features: &'a [Feature<P>],
    extent: &BoundingExtent,
) -> Filtered<'a, P> {
    let area = extent.to_polygon();
    let mut out = Filtered {
        hits: Vec::new(),
        errors: Vec::new(),
    };
    for (index, feature) in features.iter().enumerate() {
        let tested = feature
            .geometry
            .as_ref()
            .ok_or_else(|| "missing geometry".to_string())
            .and_then(|g| g.to_geo())
            .and_then(|g| intersects(&g, &area));
        match tested {
            Ok(true) => out.hits.push(feature),
            Ok(false) => {}
            Err(reason) => out.errors.push(AtlasError::GeometryQuery { index, reason }),
        }
    }
    out
}

/// [`try_filter_by_extent`] with the per-feature errors logged and dropped.
pub fn filter_by_extent<'a, P>(
    features: &'a [Feature<P>],
    extent: &BoundingExtent,
) -> Vec<&'a Feature<P>> {
    let Filtered { hits, errors } = try_filter_by_extent(features, extent);
    for e in &errors {
        log::warn!("skipped: {e}");
    }
    hits
}

/// Sums over the features visible in one extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtentStats {
    pub features: usize,
    pub area_rai: f64,
    pub area_sqm: f64,
    pub volume_ton: f64,
}

impl ExtentStats {
    fn add(&mut self, m: &impl Measures) {
        self.features += 1;
        self.area_rai += m.area_rai();
        self.area_sqm += m.area_sqm();
        self.volume_ton += m.volume_ton();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub kind: DatasetKind,
    pub stats: ExtentStats,
    pub skipped: usize,
}

fn stats_of<P: Measures>(
    kind: DatasetKind,
    features: &[Feature<P>],
    extent: &BoundingExtent,
) -> DatasetStats {
    let Filtered { hits, errors } = try_filter_by_extent(features, extent);
    if !errors.is_empty() {
        log::warn!(
            "{}: {} malformed feature(s) left out of the statistics",
            kind.label(),
            errors.len()
        );
        for e in &errors {
            log::debug!("{}: {e}", kind.label());
        }
    }
    let mut stats = ExtentStats::default();
    for f in hits {
        stats.add(&f.properties);
    }
    DatasetStats {
        kind,
        stats,
        skipped: errors.len(),
    }
}

/// Per-dataset statistics for `extent`, computed against already-fetched data.
pub fn visible_stats(datasets: &[Dataset], extent: &BoundingExtent) -> Vec<DatasetStats> {
    datasets
        .iter()
        .map(|ds| match ds {
            Dataset::BurntArea(f) => stats_of(ds.kind(), f, extent),
            Dataset::Plant(f) => stats_of(ds.kind(), f, extent),
            Dataset::Product(f) => stats_of(ds.kind(), f, extent),
            Dataset::Replant(f) => stats_of(ds.kind(), f, extent),
        })
        .collect()
}

/// The part of `dataset` visible in `extent`, as a dataset of the same kind.
pub fn visible_dataset(dataset: &Dataset, extent: &BoundingExtent) -> Dataset {
    fn keep<P: Clone>(features: &[Feature<P>], extent: &BoundingExtent) -> Vec<Feature<P>> {
        filter_by_extent(features, extent).into_iter().cloned().collect()
    }
    match dataset {
        Dataset::BurntArea(f) => Dataset::BurntArea(keep(f, extent)),
        Dataset::Plant(f) => Dataset::Plant(keep(f, extent)),
        Dataset::Product(f) => Dataset::Product(keep(f, extent)),
        Dataset::Replant(f) => Dataset::Replant(keep(f, extent)),
    }
}
