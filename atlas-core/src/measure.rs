use geo::{Distance, Geodesic, GeodesicArea};
use geo_types::{Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    Line,
    Polygon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureState {
    Idle,
    DrawingLine,
    DrawingPolygon,
    /// Shape finished; vertices can still be edited and the readout stays.
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Meters,
    Kilometers,
}

impl LengthUnit {
    pub fn convert(self, meters: f64) -> f64 {
        match self {
            LengthUnit::Meters => meters,
            LengthUnit::Kilometers => meters / 1_000.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Meters => "m",
            LengthUnit::Kilometers => "km",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    #[default]
    SquareMeters,
    SquareKilometers,
}

impl AreaUnit {
    pub fn convert(self, square_meters: f64) -> f64 {
        match self {
            AreaUnit::SquareMeters => square_meters,
            AreaUnit::SquareKilometers => square_meters / 1_000_000.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            AreaUnit::SquareMeters => "m²",
            AreaUnit::SquareKilometers => "km²",
        }
    }
}

/// Cumulative geodesic distance along `vertices` (lng/lat), in meters.
pub fn line_length_m(vertices: &[Coord<f64>]) -> f64 {
    vertices
        .windows(2)
        .map(|w| Geodesic.distance(Point::from(w[0]), Point::from(w[1])))
        .sum()
}

/// Geodesic area of the polygon outlined by `vertices`, in square meters.
/// Fewer than three vertices enclose nothing.
pub fn polygon_area_m2(vertices: &[Coord<f64>]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    Polygon::new(LineString::from(vertices.to_vec()), vec![]).geodesic_area_unsigned()
}

/// Vertex edits reported by the draw surface.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexEvent {
    Add(Coord<f64>),
    Move { index: usize, to: Coord<f64> },
    Delete { index: usize },
    /// The surface reports the whole shape at once (e.g. after a drag).
    Replace(Vec<Coord<f64>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementSession {
    pub mode: DrawMode,
    vertices: Vec<Coord<f64>>,
    /// Base unit: meters for lines, square meters for polygons.
    value: f64,
}

impl MeasurementSession {
    fn new(mode: DrawMode) -> Self {
        Self {
            mode,
            vertices: Vec::new(),
            value: 0.0,
        }
    }

    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn segments(&self) -> usize {
        match self.mode {
            DrawMode::Line => self.vertices.len().saturating_sub(1),
            DrawMode::Polygon if self.vertices.len() >= 3 => self.vertices.len(),
            DrawMode::Polygon => self.vertices.len().saturating_sub(1),
        }
    }

    fn apply(&mut self, event: VertexEvent) {
        match event {
            VertexEvent::Add(c) => self.vertices.push(c),
            VertexEvent::Move { index, to } => match self.vertices.get_mut(index) {
                Some(v) => *v = to,
                None => log::warn!("move of unknown vertex {index}"),
            },
            VertexEvent::Delete { index } => {
                if index < self.vertices.len() {
                    self.vertices.remove(index);
                } else {
                    log::warn!("delete of unknown vertex {index}");
                }
            }
            VertexEvent::Replace(all) => self.vertices = all,
        }
        self.value = match self.mode {
            DrawMode::Line => line_length_m(&self.vertices),
            DrawMode::Polygon => polygon_area_m2(&self.vertices),
        };
    }
}

/// What the readout shows; built from the stored base value on every render.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Readout {
    pub mode: DrawMode,
    pub value: f64,
    pub unit: &'static str,
    pub text: String,
    pub vertices: usize,
    pub segments: usize,
}

/// The map-side half of the measurement tool.
pub trait DrawSurface {
    fn attach(&mut self, mode: DrawMode);
    fn detach(&mut self);
    fn render(&mut self, readout: Option<&Readout>);
}

/// Interactive line/polygon measurement on one map instance.
pub struct MeasurementEngine<S: DrawSurface> {
    surface: S,
    state: MeasureState,
    session: Option<MeasurementSession>,
    length_unit: LengthUnit,
    area_unit: AreaUnit,
}

impl<S: DrawSurface> MeasurementEngine<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: MeasureState::Idle,
            session: None,
            length_unit: LengthUnit::default(),
            area_unit: AreaUnit::default(),
        }
    }

    pub fn state(&self) -> MeasureState {
        self.state
    }

    pub fn session(&self) -> Option<&MeasurementSession> {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Start a fresh session in `mode`, dropping any previous one.
    pub fn select_mode(&mut self, mode: DrawMode) {
        if self.session.is_some() {
            self.surface.detach();
        }
        self.arm(mode);
        log::debug!("measure: {:?}", self.state);
    }

    fn arm(&mut self, mode: DrawMode) {
        self.session = Some(MeasurementSession::new(mode));
        self.state = match mode {
            DrawMode::Line => MeasureState::DrawingLine,
            DrawMode::Polygon => MeasureState::DrawingPolygon,
        };
        self.surface.attach(mode);
        self.render();
    }

    /// Feed one vertex edit. Ignored while idle.
    pub fn on_vertex(&mut self, event: VertexEvent) {
        let Some(session) = self.session.as_mut() else {
            log::debug!("measure: vertex event while idle ignored");
            return;
        };
        session.apply(event);
        if session.vertices.is_empty() {
            // everything deleted: redraw in the same mode straight away
            let mode = session.mode;
            self.surface.detach();
            self.arm(mode);
            return;
        }
        self.render();
    }

    /// The user completed the shape.
    pub fn finish(&mut self) {
        if matches!(
            self.state,
            MeasureState::DrawingLine | MeasureState::DrawingPolygon
        ) {
            self.state = MeasureState::Closed;
            self.render();
        }
    }

    /// Explicit close control: detach everything and go idle.
    pub fn close(&mut self) {
        if self.state != MeasureState::Idle {
            self.surface.detach();
        }
        self.session = None;
        self.state = MeasureState::Idle;
        self.surface.render(None);
    }

    pub fn set_length_unit(&mut self, unit: LengthUnit) {
        self.length_unit = unit;
        self.render();
    }

    pub fn set_area_unit(&mut self, unit: AreaUnit) {
        self.area_unit = unit;
        self.render();
    }

    pub fn readout(&self) -> Option<Readout> {
        let s = self.session.as_ref()?;
        let (value, unit) = match s.mode {
            DrawMode::Line => (
                self.length_unit.convert(s.value),
                self.length_unit.suffix(),
            ),
            DrawMode::Polygon => (self.area_unit.convert(s.value), self.area_unit.suffix()),
        };
        Some(Readout {
            mode: s.mode,
            value,
            unit,
            text: format!("{} {unit}", group_thousands(value, 2)),
            vertices: s.vertices.len(),
            segments: s.segments(),
        })
    }

    fn render(&mut self) {
        let readout = self.readout();
        self.surface.render(readout.as_ref());
    }
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3 + 1);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        attached: Vec<DrawMode>,
        detached: usize,
        last: Option<Readout>,
    }

    impl DrawSurface for Recorder {
        fn attach(&mut self, mode: DrawMode) {
            self.attached.push(mode);
        }
        fn detach(&mut self) {
            self.detached += 1;
        }
        fn render(&mut self, readout: Option<&Readout>) {
            self.last = readout.cloned();
        }
    }

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(1000.0, 1), "1,000.0");
        assert_eq!(group_thousands(-0.001, 2), "0.00");
        assert_eq!(group_thousands(-12345.0, 0), "-12,345");
    }

    #[test]
    fn one_degree_of_longitude_on_the_equator() {
        let m = line_length_m(&[c(0.0, 0.0), c(1.0, 0.0)]);
        assert!((m - 111_319.49).abs() < 1.0, "{m}");
    }

    #[test]
    fn polygon_needs_three_vertices() {
        assert_eq!(polygon_area_m2(&[c(0.0, 0.0), c(1.0, 0.0)]), 0.0);
        assert!(polygon_area_m2(&[c(0.0, 0.0), c(0.01, 0.0), c(0.01, 0.01)]) > 0.0);
    }

    #[test]
    fn deleting_every_vertex_rearms_the_same_mode() {
        let mut eng = MeasurementEngine::new(Recorder::default());
        eng.select_mode(DrawMode::Polygon);
        eng.on_vertex(VertexEvent::Add(c(100.0, 13.0)));
        eng.on_vertex(VertexEvent::Delete { index: 0 });
        assert_eq!(eng.state(), MeasureState::DrawingPolygon);
        assert_eq!(eng.surface().attached, vec![DrawMode::Polygon, DrawMode::Polygon]);
        assert_eq!(eng.session().unwrap().vertices().len(), 0);
    }

    #[test]
    fn deleting_a_finished_shape_starts_a_new_one() {
        let mut eng = MeasurementEngine::new(Recorder::default());
        eng.select_mode(DrawMode::Line);
        eng.on_vertex(VertexEvent::Replace(vec![c(100.0, 13.0), c(100.1, 13.0)]));
        eng.finish();
        assert_eq!(eng.state(), MeasureState::Closed);
        eng.on_vertex(VertexEvent::Delete { index: 0 });
        assert_eq!(eng.state(), MeasureState::Closed);
        eng.on_vertex(VertexEvent::Delete { index: 0 });
        assert_eq!(eng.state(), MeasureState::DrawingLine);
        assert_eq!(eng.surface().attached, vec![DrawMode::Line, DrawMode::Line]);
        assert_eq!(eng.surface().detached, 1);
        let session = eng.session().unwrap();
        assert_eq!(session.vertices().len(), 0);
        assert_eq!(session.value(), 0.0);
    }

    #[test]
    fn close_detaches_and_goes_idle() {
        let mut eng = MeasurementEngine::new(Recorder::default());
        eng.select_mode(DrawMode::Line);
        eng.on_vertex(VertexEvent::Add(c(100.0, 13.0)));
        eng.on_vertex(VertexEvent::Add(c(100.1, 13.0)));
        eng.finish();
        assert_eq!(eng.state(), MeasureState::Closed);
        eng.close();
        assert_eq!(eng.state(), MeasureState::Idle);
        assert_eq!(eng.surface().detached, 1);
        assert!(eng.surface().last.is_none());
        eng.on_vertex(VertexEvent::Add(c(0.0, 0.0)));
        assert!(eng.session().is_none());
    }

    #[test]
    fn unit_switch_does_not_touch_the_stored_value() {
        let mut eng = MeasurementEngine::new(Recorder::default());
        eng.select_mode(DrawMode::Line);
        eng.on_vertex(VertexEvent::Replace(vec![c(0.0, 0.0), c(1.0, 0.0)]));
        let base = eng.session().unwrap().value();
        for _ in 0..10 {
            eng.set_length_unit(LengthUnit::Kilometers);
            eng.set_length_unit(LengthUnit::Meters);
        }
        assert_eq!(eng.session().unwrap().value(), base);
        eng.set_length_unit(LengthUnit::Kilometers);
        let r = eng.surface().last.clone().unwrap();
        assert_eq!(r.unit, "km");
        assert_eq!(r.text, "111.32 km");
        assert_eq!(r.segments, 1);
    }
}
