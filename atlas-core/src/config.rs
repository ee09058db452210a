use serde::{Deserialize, Serialize};

use crate::error::AtlasError;

/// Runtime configuration. Every field has a default so a partial JSON
/// document (or none at all) is accepted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub graticule: GraticuleConfig,
    pub locator: LocatorConfig,
    pub export: ExportConfig,
    pub instances: InstanceIds,
    /// One of "error", "warn", "info", "debug", "trace".
    pub log_level: Option<String>,
}

impl AtlasConfig {
    pub fn from_json(text: &str) -> Result<Self, AtlasError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraticuleConfig {
    pub cols: u32,
    pub rows: u32,
}

impl Default for GraticuleConfig {
    fn default() -> Self {
        Self { cols: 4, rows: 3 }
    }
}

/// Half extents of the mini-map locator box, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub half_lng: f64,
    pub half_lat: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            half_lng: 0.25,
            half_lat: 0.2,
        }
    }
}

/// Pixel and page geometry of the print export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Composite size of the primary map (px).
    pub primary_px: [u32; 2],
    /// Composite size of the mini map (px).
    pub mini_px: [u32; 2],
    /// Width of the rendered print panel (px); height follows the layout.
    pub panel_width_px: u32,
    /// Page size in PDF points; A4 landscape by default.
    pub page_pt: [f32; 2],
    /// Target width of the panel image on the page (pt).
    pub content_width_pt: f32,
    /// Smallest margin kept on every side (pt).
    pub min_margin_pt: f32,
    pub file_name: String,
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            primary_px: [1600, 1000],
            mini_px: [400, 400],
            panel_width_px: 2400,
            page_pt: [841.89, 595.28],
            content_width_pt: 780.0,
            min_margin_pt: 24.0,
            file_name: "atlas-map.pdf".to_string(),
            title: "Map export".to_string(),
        }
    }
}

/// Well-known instance ids used by the dashboard shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceIds {
    pub primary: String,
    pub print: String,
    pub mini: String,
}

impl Default for InstanceIds {
    fn default() -> Self {
        Self {
            primary: "main".to_string(),
            print: "print".to_string(),
            mini: "mini".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = AtlasConfig::from_json("{}").unwrap();
        assert_eq!(cfg, AtlasConfig::default());
        assert_eq!(cfg.graticule.cols, 4);
        assert_eq!(cfg.graticule.rows, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg =
            AtlasConfig::from_json(r#"{"export":{"file_name":"burnt.pdf"},"log_level":"debug"}"#)
                .unwrap();
        assert_eq!(cfg.export.file_name, "burnt.pdf");
        assert_eq!(cfg.export.primary_px, [1600, 1000]);
        assert_eq!(cfg.log_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            AtlasConfig::from_json("{"),
            Err(AtlasError::Config(_))
        ));
    }
}
