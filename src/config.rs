//! Editor configuration, stored as RON.
//!
//! Every field has a default, so a config file only needs to list what it
//! changes:
//!
//! ```ron
//! (
//!     window: (title: "scratch", width: 1600, height: 900),
//!     models: [(path: "assets/crate.obj", name: Some("Crate"), position: (0.0, 0.0, -5.0))],
//! )
//! ```

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, gizmo::GizmoSpeeds};

/// Environment variable naming the config file read by [`EditorConfig::from_env`].
pub const CONFIG_ENV: &str = "SCRATCH_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "scratch".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Degrees; -90 looks down the negative z axis.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 4.0, 12.0],
            yaw: -90.0,
            pitch: -15.0,
            fovy: 45.0,
            znear: 0.1,
            zfar: 500.0,
            speed: 10.0,
            sensitivity: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Direction the light travels in.
    pub direction: [f32; 3],
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [-0.3, -1.0, -0.4],
            ambient: [0.2, 0.2, 0.2],
            diffuse: [0.8, 0.8, 0.8],
            specular: [1.0, 1.0, 1.0],
        }
    }
}

/// A model to load at startup and the node that places it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPlacement {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub window: WindowConfig,
    /// RGBA, linear.
    pub clear_colour: [f64; 4],
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub gizmo: GizmoSpeeds,
    /// Only used for the window title.
    pub scene_path: Option<PathBuf>,
    /// Without models the editor starts with a few procedural cubes.
    pub models: Vec<ModelPlacement>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            clear_colour: [0.1, 0.2, 0.3, 1.0],
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            gizmo: GizmoSpeeds::default(),
            scene_path: None,
            models: Vec::new(),
        }
    }
}

impl EditorConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_ron(&std::fs::read_to_string(path)?)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Loads the file named by `SCRATCH_CONFIG`. Without the variable the
    /// defaults are used; a named file that cannot be loaded is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => {
                info!("{} not set, using the default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    /// Clear colour as wgpu expects it. Components outside [0, 1] are clamped.
    pub fn clear_colour(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_colour.map(|c| {
            if !(0.0..=1.0).contains(&c) {
                warn!("Clear colour component {} is clamped to [0, 1]", c);
            }
            c.clamp(0.0, 1.0)
        });
        wgpu::Color { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_the_defaults() {
        let config = EditorConfig::from_ron("(window: (width: 800))").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera, CameraConfig::default());
        assert!(config.models.is_empty());
    }

    #[test]
    fn model_placements_default_to_unit_scale() {
        let config = EditorConfig::from_ron(
            r#"(models: [(path: "assets/crate.obj", position: (1.0, 2.0, 3.0))])"#,
        )
        .unwrap();
        let model = &config.models[0];
        assert_eq!(model.path, PathBuf::from("assets/crate.obj"));
        assert_eq!(model.name, None);
        assert_eq!(model.position, [1.0, 2.0, 3.0]);
        assert_eq!(model.scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn serialized_config_reads_back() {
        let mut config = EditorConfig::default();
        config.scene_path = Some(PathBuf::from("levels/intro.scene"));
        config.gizmo.rotate = 2.0;
        let text = config.to_ron().unwrap();
        assert_eq!(EditorConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn broken_files_are_reported() {
        assert!(matches!(
            EditorConfig::from_ron("(window: (width: \"wide\"))"),
            Err(ConfigError::Deserialize(_))
        ));
        assert!(matches!(
            EditorConfig::load("definitely/not/here.ron"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn clear_colour_is_clamped() {
        let config = EditorConfig {
            clear_colour: [1.5, 0.5, -1.0, 1.0],
            ..EditorConfig::default()
        };
        let colour = config.clear_colour();
        assert_eq!((colour.r, colour.g, colour.b, colour.a), (1.0, 0.5, 0.0, 1.0));
    }
}
