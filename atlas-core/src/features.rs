use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

/// GeoJSON-shaped geometry as delivered by the data-access layer. Positions
/// are kept as plain vectors so one malformed record does not fail the
/// deserialisation of the whole array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum FeatureGeometry {
    Point(Vec<f64>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl FeatureGeometry {
    /// Convert into a `geo` geometry, rejecting short or non-finite positions
    /// and degenerate rings.
    pub fn to_geo(&self) -> Result<Geometry<f64>, String> {
        match self {
            FeatureGeometry::Point(pos) => Ok(Geometry::Point(Point::from(position(pos)?))),
            FeatureGeometry::Polygon(rings) => Ok(Geometry::Polygon(polygon(rings)?)),
            FeatureGeometry::MultiPolygon(polys) => {
                if polys.is_empty() {
                    return Err("empty multipolygon".to_string());
                }
                let parts = polys
                    .iter()
                    .map(|rings| polygon(rings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Geometry::MultiPolygon(MultiPolygon::new(parts)))
            }
        }
    }
}

fn position(pos: &[f64]) -> Result<Coord<f64>, String> {
    match pos {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        [_, _, ..] => Err("non-finite coordinate".to_string()),
        _ => Err(format!("position with {} values", pos.len())),
    }
}

fn ring(raw: &[Vec<f64>]) -> Result<LineString<f64>, String> {
    let coords = raw
        .iter()
        .map(|p| position(p))
        .collect::<Result<Vec<_>, _>>()?;
    if coords.len() < 3 {
        return Err(format!("ring with {} positions", coords.len()));
    }
    // LineString::new does not close; Polygon::new does
    Ok(LineString::new(coords))
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, String> {
    let (exterior, holes) = rings
        .split_first()
        .ok_or_else(|| "polygon without rings".to_string())?;
    let holes = holes
        .iter()
        .map(|h| ring(h))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, holes))
}

/// One attributed geometry with strongly typed properties `P`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(default)]
    pub id: Option<String>,
    pub geometry: Option<FeatureGeometry>,
    pub properties: P,
}

/// Quantities summed by the visible-extent statistics.
pub trait Measures {
    fn area_rai(&self) -> f64 {
        0.0
    }
    fn area_sqm(&self) -> f64 {
        0.0
    }
    fn volume_ton(&self) -> f64 {
        0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurntAreaProps {
    pub area_rai: f64,
    pub area_sqm: f64,
    pub detected_on: Option<String>,
    pub region: Option<String>,
}

impl Measures for BurntAreaProps {
    fn area_rai(&self) -> f64 {
        self.area_rai
    }
    fn area_sqm(&self) -> f64 {
        self.area_sqm
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantProps {
    pub area_rai: f64,
    pub cane_type: Option<String>,
    pub zone: Option<String>,
}

impl Measures for PlantProps {
    fn area_rai(&self) -> f64 {
        self.area_rai
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductProps {
    pub area_rai: f64,
    pub volume_ton: f64,
    pub yield_ton_per_rai: Option<f64>,
}

impl Measures for ProductProps {
    fn area_rai(&self) -> f64 {
        self.area_rai
    }
    fn volume_ton(&self) -> f64 {
        self.volume_ton
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplantProps {
    pub area_rai: f64,
    pub planted_on: Option<String>,
}

impl Measures for ReplantProps {
    fn area_rai(&self) -> f64 {
        self.area_rai
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    BurntArea,
    Plant,
    Product,
    Replant,
}

impl DatasetKind {
    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::BurntArea => "Burnt area",
            DatasetKind::Plant => "Plantation",
            DatasetKind::Product => "Product",
            DatasetKind::Replant => "Replant",
        }
    }
}

/// A fully fetched dataset, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "features", rename_all = "snake_case")]
pub enum Dataset {
    BurntArea(Vec<Feature<BurntAreaProps>>),
    Plant(Vec<Feature<PlantProps>>),
    Product(Vec<Feature<ProductProps>>),
    Replant(Vec<Feature<ReplantProps>>),
}

impl Dataset {
    pub fn kind(&self) -> DatasetKind {
        match self {
            Dataset::BurntArea(_) => DatasetKind::BurntArea,
            Dataset::Plant(_) => DatasetKind::Plant,
            Dataset::Product(_) => DatasetKind::Product,
            Dataset::Replant(_) => DatasetKind::Replant,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::BurntArea(f) => f.len(),
            Dataset::Plant(f) => f.len(),
            Dataset::Product(f) => f.len(),
            Dataset::Replant(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
