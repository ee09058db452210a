use std::cell::RefCell;
use std::collections::HashMap;

use atlas_core::config::ExportConfig;
use pollster::block_on;
use pretty_assertions::assert_eq;
use print_core::{
    CaptureFlag, CaptureHost, DocumentSink, ExportDialog, ExportError, ExportRequest, Exporter,
    JobCounter, OverlayPart, OverlaySource, PanelContent, PanelDetails, PanelRenderer,
};
use tiny_skia::{Color, Pixmap};

const GREEN: (u8, u8, u8) = (0, 160, 0);
const GREY: (u8, u8, u8) = (128, 128, 128);
const RED: (u8, u8, u8) = (220, 0, 0);

fn solid(w: u32, h: u32, (r, g, b): (u8, u8, u8)) -> Pixmap {
    let mut p = Pixmap::new(w, h).unwrap();
    p.fill(Color::from_rgba8(r, g, b, 255));
    p
}

fn rgb(p: &Pixmap, x: u32, y: u32) -> (u8, u8, u8) {
    let c = p.pixel(x, y).unwrap().demultiply();
    (c.red(), c.green(), c.blue())
}

fn part(name: &str, x: f64, y: f64, w: f64, h: f64) -> OverlayPart {
    OverlayPart {
        name: name.into(),
        x,
        y,
        width: w,
        height: h,
    }
}

#[derive(Default)]
struct FakeHost {
    canvases: HashMap<String, Pixmap>,
    overlays: HashMap<String, OverlaySource>,
    broken_parts: Vec<(String, String)>,
    close_on_capture: Option<ExportDialog>,
}

impl CaptureHost for FakeHost {
    fn read_canvas(&self, target: &str) -> Result<Pixmap, ExportError> {
        self.canvases
            .get(target)
            .cloned()
            .ok_or_else(|| ExportError::ResourceNotReady(target.to_string()))
    }

    fn overlay(&self, target: &str) -> Option<OverlaySource> {
        self.overlays.get(target).cloned()
    }

    async fn rasterize_part(&self, target: &str, part: &OverlayPart) -> Result<Pixmap, ExportError> {
        if let Some(d) = &self.close_on_capture {
            d.close();
        }
        if self
            .broken_parts
            .iter()
            .any(|(t, p)| t == target && *p == part.name)
        {
            return Err(ExportError::Rasterization(format!("{} threw", part.name)));
        }
        Ok(solid(
            (part.width * 2.0) as u32,
            (part.height * 2.0) as u32,
            RED,
        ))
    }
}

/// Hands back the composed primary image as the "panel" and keeps copies.
#[derive(Default)]
struct Recorder {
    seen: RefCell<Vec<(Pixmap, Option<Pixmap>)>>,
    produce_nothing: bool,
}

impl PanelRenderer for Recorder {
    async fn render(&self, content: &PanelContent) -> Result<Option<Pixmap>, ExportError> {
        self.seen
            .borrow_mut()
            .push((content.primary.clone(), content.mini.clone()));
        if self.produce_nothing {
            return Ok(None);
        }
        Ok(Some(content.primary.clone()))
    }
}

#[derive(Default)]
struct Downloads(RefCell<Vec<(String, Vec<u8>)>>);

impl DocumentSink for Downloads {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        self.0.borrow_mut().push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

fn config() -> ExportConfig {
    ExportConfig {
        primary_px: [640, 400],
        mini_px: [400, 400],
        ..ExportConfig::default()
    }
}

/// Primary: 160x100 CSS container at dpr 2 with a legend in the bottom-left.
/// Mini: 100x100 container with a compass in the top-right.
fn host() -> FakeHost {
    let mut h = FakeHost::default();
    h.canvases.insert("main".into(), solid(320, 200, GREEN));
    h.canvases.insert("mini".into(), solid(200, 200, GREY));
    h.overlays.insert(
        "main".into(),
        OverlaySource {
            width: 160.0,
            height: 100.0,
            parts: vec![part("legend", 0.0, 80.0, 40.0, 20.0)],
        },
    );
    h.overlays.insert(
        "mini".into(),
        OverlaySource {
            width: 100.0,
            height: 100.0,
            parts: vec![part("compass", 80.0, 0.0, 20.0, 20.0)],
        },
    );
    h
}

fn request() -> ExportRequest {
    ExportRequest::from_ids(&["main".into(), "mini".into()], "atlas.pdf").unwrap()
}

fn details() -> PanelDetails {
    PanelDetails {
        title: "Burnt areas".into(),
        ..Default::default()
    }
}

#[test]
fn failing_mini_compass_is_omitted_and_job_completes() {
    let mut h = host();
    h.broken_parts.push(("mini".into(), "compass".into()));
    let exporter = Exporter::new(
        h,
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let report = block_on(exporter.export(&request(), details(), None)).unwrap();
    assert_eq!(report.omitted, vec!["mini:compass".to_string()]);

    let seen = exporter.renderer().seen.borrow();
    let (primary, mini) = &seen[0];
    // primary legend drawn at its relative position (bottom-left)
    assert_eq!(rgb(primary, 80, 360), RED);
    assert_eq!(rgb(primary, 320, 200), GREEN);
    // mini compass missing: the base map shows through
    let mini = mini.as_ref().unwrap();
    assert_eq!(rgb(mini, 360, 40), GREY);

    let downloads = exporter.sink().0.borrow();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].0, "atlas.pdf");
    assert!(downloads[0].1.starts_with(b"%PDF-"));
    assert!(!exporter.flag().is_capturing());
}

#[test]
fn sequential_exports_have_identical_shapes() {
    let exporter = Exporter::new(
        host(),
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let a = block_on(exporter.export(&request(), details(), None)).unwrap();
    let b = block_on(exporter.export(&request(), details(), None)).unwrap();
    assert_eq!(a.primary_px, (640, 400));
    assert_eq!(a.mini_px, Some((400, 400)));
    assert_eq!(
        (a.primary_px, a.mini_px, a.panel_px),
        (b.primary_px, b.mini_px, b.panel_px)
    );
    assert_ne!(a.job, b.job);
}

#[test]
fn exporters_sharing_a_counter_keep_numbering() {
    let jobs = JobCounter::default();
    let mut ids = Vec::new();
    for _ in 0..2 {
        let exporter = Exporter::new(
            host(),
            Recorder::default(),
            Downloads::default(),
            CaptureFlag::new(),
            config(),
        )
        .with_jobs(jobs.clone());
        ids.push(block_on(exporter.export(&request(), details(), None)).unwrap().job);
    }
    assert_eq!(ids, [1, 2]);
    assert_eq!(jobs.next_id(), 3);
}

#[test]
fn missing_overlay_aborts_without_a_file() {
    let mut h = host();
    h.overlays.remove("mini");
    let exporter = Exporter::new(
        h,
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let err = block_on(exporter.export(&request(), details(), None)).unwrap_err();
    assert!(matches!(err, ExportError::NullTarget(ref t) if t == "mini"));
    assert!(exporter.sink().0.borrow().is_empty());
    assert!(exporter.renderer().seen.borrow().is_empty());
    assert!(!exporter.flag().is_capturing());
}

#[test]
fn unmounted_target_is_not_ready() {
    let mut h = host();
    h.canvases.remove("mini");
    let exporter = Exporter::new(
        h,
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let err = block_on(exporter.export(&request(), details(), None)).unwrap_err();
    assert!(matches!(err, ExportError::ResourceNotReady(_)));
    assert!(!exporter.flag().is_capturing());
}

#[test]
fn export_while_capturing_is_busy() {
    let flag = CaptureFlag::new();
    let exporter = Exporter::new(
        host(),
        Recorder::default(),
        Downloads::default(),
        flag.clone(),
        config(),
    );
    let guard = flag.try_begin().unwrap();
    let err = block_on(exporter.export(&request(), details(), None)).unwrap_err();
    assert!(matches!(err, ExportError::Busy));
    drop(guard);
    assert!(block_on(exporter.export(&request(), details(), None)).is_ok());
}

#[test]
fn empty_panel_fails_the_job() {
    let exporter = Exporter::new(
        host(),
        Recorder {
            produce_nothing: true,
            ..Default::default()
        },
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let err = block_on(exporter.export(&request(), details(), None)).unwrap_err();
    assert!(matches!(err, ExportError::Panel(_)));
    assert!(exporter.sink().0.borrow().is_empty());
}

#[test]
fn closing_the_dialog_mid_capture_drops_late_status() {
    let dialog = ExportDialog::new();
    dialog.open();
    let mut h = host();
    h.close_on_capture = Some(dialog.clone());
    let exporter = Exporter::new(
        h,
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let ticket = dialog.ticket();
    let report = block_on(exporter.export(&request(), details(), Some(&ticket)));
    assert!(report.is_ok());
    assert_eq!(dialog.view().status, None);
    assert!(!dialog.view().open);
    assert!(!exporter.flag().is_capturing());
}

#[test]
fn primary_only_export() {
    let exporter = Exporter::new(
        host(),
        Recorder::default(),
        Downloads::default(),
        CaptureFlag::new(),
        config(),
    );
    let req = ExportRequest::from_ids(&["main".into()], "main.pdf").unwrap();
    let report = block_on(exporter.export(&req, details(), None)).unwrap();
    assert_eq!(report.mini_px, None);
    assert!(exporter.renderer().seen.borrow()[0].1.is_none());
}
