use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use atlas_core::features::Dataset;
use atlas_core::{AtlasConfig, BoundingExtent, graticule, visible_stats};
use print_core::{LegendEntry, PanelDetails};
use serde::Deserialize;

/// A captured control: PNG of the element and its box in CSS pixels,
/// relative to the map container.
#[derive(Clone, Debug, Deserialize)]
pub struct SceneControl {
    pub name: String,
    pub image: PathBuf,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One map instance: the read-back canvas plus its controls.
#[derive(Clone, Debug, Deserialize)]
pub struct SceneTarget {
    pub id: String,
    pub image: PathBuf,
    /// Container size in CSS pixels; the canvas may be larger (device pixel ratio).
    pub css_width: f64,
    pub css_height: f64,
    #[serde(default)]
    pub controls: Vec<SceneControl>,
}

/// Input of a native export run.
#[derive(Clone, Debug, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub extent: BoundingExtent,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub legend: Vec<LegendEntry>,
    /// Primary first, optional mini map second.
    pub targets: Vec<SceneTarget>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene {}", path.display()))?;
        let mut scene: Scene = serde_json::from_str(&text)
            .with_context(|| format!("parsing scene {}", path.display()))?;
        let e = scene.extent;
        scene.extent = BoundingExtent::new(e.xmin, e.xmax, e.ymin, e.ymax)
            .with_context(|| format!("scene {}", path.display()))?;
        if scene.targets.is_empty() {
            bail!("scene {} lists no targets", path.display());
        }
        let base = path.parent().unwrap_or(Path::new("."));
        scene.resolve_paths(base);
        Ok(scene)
    }

    /// Image paths in the scene are relative to the scene file.
    fn resolve_paths(&mut self, base: &Path) {
        for t in &mut self.targets {
            t.image = base.join(&t.image);
            for c in &mut t.controls {
                c.image = base.join(&c.image);
            }
        }
    }

    pub fn target(&self, id: &str) -> Option<&SceneTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn target_ids(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.id.clone()).collect()
    }

    pub fn details(&self, config: &AtlasConfig) -> PanelDetails {
        PanelDetails {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| config.export.title.clone()),
            subtitle: self.subtitle.clone(),
            extent: Some(self.extent),
            graticule: graticule(&self.extent, config.graticule),
            legend: self.legend.clone(),
            stats: visible_stats(&self.datasets, &self.extent),
        }
    }
}
