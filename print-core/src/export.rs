use std::cell::Cell;
use std::rc::Rc;

use atlas_core::config::ExportConfig;
use serde::Serialize;
use tiny_skia::Pixmap;

use crate::capture::CaptureFlag;
use crate::compose::{OverlayPart, OverlaySource, RasterPart, compose};
use crate::dialog::DialogTicket;
use crate::document::build_pdf;
use crate::error::ExportError;
use crate::panel::{PanelContent, PanelDetails, PanelRenderer};

/// Source of the live rasters of map instances.
#[allow(async_fn_in_trait)]
pub trait CaptureHost {
    /// Read back the rendered canvas of `target`. Must not suspend: WebGL
    /// buffers are only valid until the next frame.
    fn read_canvas(&self, target: &str) -> Result<Pixmap, ExportError>;

    /// Layout of the DOM controls drawn over `target`. `None` means the whole
    /// overlay is missing and aborts the job.
    fn overlay(&self, target: &str) -> Option<OverlaySource>;

    /// Rasterize one control. An error here only drops that control.
    async fn rasterize_part(&self, target: &str, part: &OverlayPart) -> Result<Pixmap, ExportError>;
}

/// Final hand-off of the generated document (browser download, file write).
pub trait DocumentSink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Idle,
    Capturing,
    Composing,
    Done,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportRequest {
    pub primary: String,
    pub mini: Option<String>,
    pub file_name: String,
}

impl ExportRequest {
    /// First id is the primary map, the optional second one the mini map.
    pub fn from_ids(ids: &[String], file_name: &str) -> Result<Self, ExportError> {
        let mut it = ids.iter();
        let primary = it
            .next()
            .cloned()
            .ok_or_else(|| ExportError::ResourceNotReady("<no target>".to_string()))?;
        let mini = it.next().cloned();
        if it.next().is_some() {
            log::warn!("export: only a primary and a mini target are composed; extra ids ignored");
        }
        Ok(Self {
            primary,
            mini,
            file_name: file_name.to_string(),
        })
    }

    fn targets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.mini.as_deref())
    }
}

/// One run of the pipeline. Lives only for the duration of `export`.
#[derive(Debug)]
pub struct ExportJob {
    pub id: u64,
    pub status: ExportStatus,
    /// `target:part` of controls that failed to rasterize.
    pub omitted: Vec<String>,
}

impl ExportJob {
    fn new(id: u64) -> Self {
        Self {
            id,
            status: ExportStatus::Idle,
            omitted: Vec::new(),
        }
    }

    fn advance(&mut self, status: ExportStatus, ticket: Option<&DialogTicket>) {
        log::info!("export #{}: {:?} -> {:?}", self.id, self.status, status);
        self.status = status;
        if let Some(t) = ticket {
            let line = match status {
                ExportStatus::Idle => "idle",
                ExportStatus::Capturing => "capturing",
                ExportStatus::Composing => "composing",
                ExportStatus::Done => "done",
                ExportStatus::Failed => "failed",
            };
            t.write(line);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportReport {
    pub job: u64,
    pub file_name: String,
    pub bytes: usize,
    pub primary_px: (u32, u32),
    pub mini_px: Option<(u32, u32)>,
    pub panel_px: (u32, u32),
    pub omitted: Vec<String>,
}

/// Source of job ids. Clones share the sequence, so exporters built per
/// request keep numbering where the previous one stopped.
#[derive(Clone, Debug)]
pub struct JobCounter(Rc<Cell<u64>>);

impl Default for JobCounter {
    fn default() -> Self {
        Self(Rc::new(Cell::new(1)))
    }
}

impl JobCounter {
    pub fn next_id(&self) -> u64 {
        let id = self.0.get();
        self.0.set(id + 1);
        id
    }
}

/// Capture, compose, lay out, assemble and deliver.
pub struct Exporter<H, R, S> {
    host: H,
    renderer: R,
    sink: S,
    flag: CaptureFlag,
    config: ExportConfig,
    jobs: JobCounter,
}

impl<H: CaptureHost, R: PanelRenderer, S: DocumentSink> Exporter<H, R, S> {
    pub fn new(host: H, renderer: R, sink: S, flag: CaptureFlag, config: ExportConfig) -> Self {
        Self {
            host,
            renderer,
            sink,
            flag,
            config,
            jobs: JobCounter::default(),
        }
    }

    /// Draw job ids from `jobs` instead of a private sequence.
    pub fn with_jobs(mut self, jobs: JobCounter) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn flag(&self) -> &CaptureFlag {
        &self.flag
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Run one export. Fails with [`ExportError::Busy`] while another job
    /// holds the capturing flag. Status lines go to `ticket` while its
    /// dialog is still open.
    pub async fn export(
        &self,
        request: &ExportRequest,
        details: PanelDetails,
        ticket: Option<&DialogTicket>,
    ) -> Result<ExportReport, ExportError> {
        let _guard = self.flag.try_begin().inspect_err(|_| {
            log::warn!("export requested while another one is running");
        })?;
        let mut job = ExportJob::new(self.jobs.next_id());
        match self.run(&mut job, request, details, ticket).await {
            Ok(report) => {
                job.advance(ExportStatus::Done, ticket);
                Ok(report)
            }
            Err(e) => {
                log::error!("export #{} failed: {e}", job.id);
                job.advance(ExportStatus::Failed, ticket);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job: &mut ExportJob,
        request: &ExportRequest,
        details: PanelDetails,
        ticket: Option<&DialogTicket>,
    ) -> Result<ExportReport, ExportError> {
        job.advance(ExportStatus::Capturing, ticket);
        // every canvas is read before the first suspension point
        let bases = request
            .targets()
            .map(|t| self.host.read_canvas(t))
            .collect::<Result<Vec<_>, _>>()?;

        let mut overlays = Vec::with_capacity(bases.len());
        for target in request.targets() {
            let source = self
                .host
                .overlay(target)
                .ok_or_else(|| ExportError::NullTarget(target.to_string()))?;
            let mut parts = Vec::with_capacity(source.parts.len());
            for part in &source.parts {
                match self.host.rasterize_part(target, part).await {
                    Ok(pixmap) => parts.push(RasterPart {
                        part: part.clone(),
                        pixmap,
                    }),
                    Err(e) => {
                        log::warn!("export #{}: '{target}' control '{}' omitted: {e}", job.id, part.name);
                        job.omitted.push(format!("{target}:{}", part.name));
                    }
                }
            }
            overlays.push((source, parts));
        }

        job.advance(ExportStatus::Composing, ticket);
        let mut composed = bases
            .iter()
            .zip(&overlays)
            .zip([self.config.primary_px, self.config.mini_px])
            .map(|((base, (source, parts)), size)| compose(base, source, parts, size))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();
        let primary = composed
            .next()
            .ok_or_else(|| ExportError::NullTarget(request.primary.clone()))?;
        let mini = composed.next().map(|c| c.pixmap);
        let primary_px = (primary.pixmap.width(), primary.pixmap.height());
        let mini_px = mini.as_ref().map(|m| (m.width(), m.height()));

        let title = if details.title.is_empty() {
            self.config.title.clone()
        } else {
            details.title.clone()
        };
        let content = PanelContent {
            details,
            primary: primary.pixmap,
            primary_map: primary.map,
            mini,
        };
        let panel = self
            .renderer
            .render(&content)
            .await?
            .ok_or_else(|| ExportError::Panel("print panel rasterized to nothing".into()))?;
        let bytes = build_pdf(&panel, &self.config, &title)?;
        self.sink.deliver(&request.file_name, &bytes)?;
        log::info!(
            "export #{}: '{}' delivered ({} bytes)",
            job.id,
            request.file_name,
            bytes.len()
        );

        Ok(ExportReport {
            job: job.id,
            file_name: request.file_name.clone(),
            bytes: bytes.len(),
            primary_px,
            mini_px,
            panel_px: (panel.width(), panel.height()),
            omitted: job.omitted.clone(),
        })
    }
}
