use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atlas_core::AtlasConfig;
use clap::Parser;
use print_core::raster::encode_png;
use print_core::{CaptureFlag, ExportReport, ExportRequest, Exporter, SvgPanelRenderer};

mod host;
mod scene;

use host::{FileCapture, FileSink, KeepPanel};
use scene::Scene;

#[derive(Parser)]
#[command(name = "atlas-print")]
#[command(about = "Compose captured map images into a print-ready PDF")]
#[command(version)]
#[command(long_about = "
Reads a scene file listing the captured map canvases (primary first, then an
optional mini map), their control overlays, the extent and the datasets, and
writes the landscape print document.

Examples:
  atlas-print scene.json --out burnt.pdf
  atlas-print scene.json --config print.json --png panel.png
")]
struct Cli {
    /// Scene description (JSON)
    scene: PathBuf,

    /// Output PDF; defaults to the configured file name next to the scene
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Configuration file (JSON, same format as the browser configuration)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the rendered print panel as PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Panel width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool, configured: Option<&str>) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => configured.unwrap_or("info"),
        (false, 1) => "debug",
        _ => "trace",
    };
    // RUST_LOG still wins over the flags
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AtlasConfig> {
    let Some(path) = path else {
        return Ok(AtlasConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    AtlasConfig::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn run(cli: &Cli, config: &AtlasConfig) -> Result<ExportReport> {
    let scene = Scene::load(&cli.scene)?;
    let out = cli.out.clone().unwrap_or_else(|| {
        cli.scene
            .parent()
            .unwrap_or(Path::new("."))
            .join(&config.export.file_name)
    });
    let file_name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.export.file_name.clone());
    let request = ExportRequest::from_ids(&scene.target_ids(), &file_name)?;
    let width = cli.width.unwrap_or(config.export.panel_width_px);

    let exporter = Exporter::new(
        FileCapture::new(&scene),
        KeepPanel::new(SvgPanelRenderer::new(width)),
        FileSink::new(out.clone()),
        CaptureFlag::new(),
        config.export.clone(),
    );
    let report = pollster::block_on(exporter.export(&request, scene.details(config), None))
        .with_context(|| format!("exporting {}", cli.scene.display()))?;

    if let Some(png_path) = &cli.png {
        let panel = exporter
            .renderer()
            .take()
            .context("no panel was rendered")?;
        std::fs::write(png_path, encode_png(&panel)?)
            .with_context(|| format!("writing {}", png_path.display()))?;
        log::info!("panel written to {}", png_path.display());
    }
    Ok(report)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    setup_logging(cli.verbose, cli.quiet, config.log_level.as_deref());

    let report = run(&cli, &config)?;
    for omitted in &report.omitted {
        log::warn!("control left out: {omitted}");
    }
    println!(
        "{} ({} bytes, panel {}x{})",
        report.file_name, report.bytes, report.panel_px.0, report.panel_px.1
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Color, Pixmap};

    fn write_png(path: &Path, w: u32, h: u32, (r, g, b): (u8, u8, u8)) {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(Color::from_rgba8(r, g, b, 255));
        std::fs::write(path, encode_png(&p).unwrap()).unwrap();
    }

    #[test]
    fn scene_to_pdf_and_png() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("main.png"), 320, 200, (0, 160, 0));
        write_png(&dir.path().join("mini.png"), 100, 100, (128, 128, 128));
        write_png(&dir.path().join("legend.png"), 60, 30, (255, 255, 255));
        let scene = dir.path().join("scene.json");
        std::fs::write(
            &scene,
            r##"{
                "extent": {"xmin": 100.0, "xmax": 100.4, "ymin": 13.0, "ymax": 13.3},
                "legend": [{"label": "Burnt", "color": "#d7301f"}],
                "targets": [
                    {"id": "main", "image": "main.png", "css_width": 160, "css_height": 100,
                     "controls": [
                        {"name": "legend", "image": "legend.png", "x": 0, "y": 85, "width": 30, "height": 15},
                        {"name": "scale", "image": "missing.png", "x": 100, "y": 85, "width": 30, "height": 15}
                     ]},
                    {"id": "mini", "image": "mini.png", "css_width": 100, "css_height": 100}
                ]
            }"##,
        )
        .unwrap();
        let cli = Cli {
            scene,
            out: Some(dir.path().join("out.pdf")),
            config: None,
            png: Some(dir.path().join("panel.png")),
            width: Some(1200),
            verbose: 0,
            quiet: true,
        };
        let report = run(&cli, &AtlasConfig::default()).unwrap();
        assert_eq!(report.file_name, "out.pdf");
        assert_eq!(report.omitted, ["main:scale"]);
        assert_eq!(report.panel_px.0, 1200);

        let pdf = std::fs::read(dir.path().join("out.pdf")).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        let png = std::fs::read(dir.path().join("panel.png")).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/atlas.json"))).is_err());
        assert_eq!(load_config(None).unwrap(), AtlasConfig::default());
    }
}
