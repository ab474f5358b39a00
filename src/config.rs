//! Scene configuration.
//!
//! Sent verbatim to every renderer as the `props` of its snapshot.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::camera::Projection;

fn default_width() -> u32 {
    400
}

fn default_height() -> u32 {
    300
}

fn default_background_color() -> String {
    "#eee".to_string()
}

/// Default renderer frame rate.
fn default_fps() -> u32 {
    20
}

fn default_click_events() -> Vec<String> {
    vec!["click".to_string(), "dblclick".to_string()]
}

/// Ground grid: on/off, or `[size, divisions]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grid {
    Enabled(bool),
    Sized(u32, u32),
}

impl Default for Grid {
    fn default() -> Self {
        Grid::Enabled(true)
    }
}

/// Canvas and interaction settings of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Canvas width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub grid: Grid,

    /// Polar grid as `[radius, sectors, rings]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polar_grid: Option<(f64, u32, u32)>,

    #[serde(default = "default_background_color")]
    pub background_color: String,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default)]
    pub show_stats: bool,

    /// Comma-separated constraints applied by the renderer while dragging,
    /// e.g. `z = 0`.
    #[serde(default)]
    pub drag_constraints: String,

    /// Click sub-types forwarded to click handlers.
    #[serde(default = "default_click_events")]
    pub click_events: Vec<String>,

    #[serde(default)]
    pub camera: Projection,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            grid: Grid::default(),
            polar_grid: None,
            background_color: default_background_color(),
            fps: default_fps(),
            show_stats: false,
            drag_constraints: String::new(),
            click_events: default_click_events(),
            camera: Projection::default(),
        }
    }
}

impl SceneConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene config {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scene config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("Width and height must be positive");
        }
        if self.fps == 0 {
            bail!("FPS must be positive");
        }
        if let Some(unknown) = self
            .click_events
            .iter()
            .find(|e| !matches!(e.as_str(), "click" | "dblclick"))
        {
            bail!("Unknown click event type `{}`", unknown);
        }
        let (near, far) = (self.camera.near(), self.camera.far());
        if near <= 0.0 || far <= near {
            bail!("Camera clipping range must satisfy 0 < near < far (got {near}..{far})");
        }
        Ok(())
    }

    pub fn listens_for(&self, click_type: &str) -> bool {
        self.click_events.iter().any(|e| e == click_type)
    }
}
