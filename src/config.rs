use std::path::{Path, PathBuf};

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use crate::annotation::Units;
use crate::error::{Error, Result};

/// Outline colors as RGBA bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineStyle {
    pub outline: [u8; 4],
    pub stroke: [u8; 4],
    pub hi_stroke: [u8; 4],
    pub fill: [u8; 4],
    pub hi_fill: [u8; 4],
    pub outline_width: f32,
    pub stroke_width: f32,
    pub hi_stroke_width: f32,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            outline: [0, 0, 0, 255],
            stroke: [255, 255, 255, 255],
            hi_stroke: [255, 240, 0, 255],
            fill: [0, 0, 0, 0],
            hi_fill: [255, 255, 255, 24],
            outline_width: 1.0,
            stroke_width: 1.0,
            hi_stroke_width: 1.2,
        }
    }
}

impl OutlineStyle {
    pub fn color(rgba: [u8; 4]) -> Color32 {
        Color32::from_rgba_unmultiplied(rgba[0], rgba[1], rgba[2], rgba[3])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Units used for shapes created by the selectors.
    pub units: Units,
    /// Selector activated on new annotators.
    pub default_selector: String,
    /// Seconds the popup lingers after the pointer leaves an annotation.
    pub popup_hide_delay: f64,
    /// Seconds the "click and drag" hint stays up.
    pub hint_duration: f64,
    /// Image pixels within which a polygon click snaps to its first vertex.
    pub polygon_close_radius: f32,
    /// Rectangles thinner than this many image pixels are treated as clicks.
    pub min_selection_size: f32,
    /// Placeholder size for images that have not loaded yet.
    pub placeholder_size: [f32; 2],
    pub style: OutlineStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            units: Units::Pixel,
            default_selector: "rect".to_string(),
            popup_hide_delay: 0.3,
            hint_duration: 2.0,
            polygon_close_radius: 10.0,
            min_selection_size: 1.0,
            placeholder_size: [640.0, 360.0],
            style: OutlineStyle::default(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notecrab").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` or the per-user settings file; falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("no settings file, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::load(&path) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), "loaded settings");
                settings
            }
            Err(e) => {
                tracing::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }
}
