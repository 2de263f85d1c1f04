//! Viewer configuration: which models to load and how the scene is set up.
//!
//! Every field has a default, so a configuration file only needs to name what
//! it changes. Without any file the [`ViewerConfig::gallery`] preset is used.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resources::{AssetFetcher, fetch_string};

/// File name looked up in the asset root when no explicit path is given.
pub const CONFIG_FILE: &str = "showcase.toml";

/// Environment variable that points the native viewer at a configuration file.
pub const CONFIG_ENV: &str = "ORBIT_SHOWCASE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    #[default]
    Gltf,
    Glb,
    Obj,
}

impl ModelFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Gltf => "gltf",
            ModelFormat::Glb => "glb",
            ModelFormat::Obj => "obj",
        }
    }
}

/// Where one model comes from and where it goes in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPlacement {
    /// Folder under `models/`; also identifies the placement in diagnostics.
    pub folder: String,
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub format: ModelFormat,
}

impl ModelPlacement {
    pub fn new(folder: &str, scale: [f32; 3], position: [f32; 3]) -> Self {
        Self {
            folder: folder.to_string(),
            scale,
            position,
            format: ModelFormat::default(),
        }
    }

    /// `models/<folder>/scene.<ext>`
    pub fn source_path(&self) -> String {
        format!("models/{}/scene.{}", self.folder, self.format.extension())
    }
}

impl fmt::Display for ModelPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder)
    }
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    /// Point the camera orbits around and looks at.
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 10.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    /// Fraction of the pending motion applied (and removed) per update when damping.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    /// The directional light shines from here towards the origin.
    pub directional_position: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 1.0,
            directional_color: [1.0, 1.0, 1.0],
            directional_intensity: 1.0,
            directional_position: [5.0, 5.0, 5.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnimationStep {
    /// Advance every clock by the same amount each frame, whatever the frame rate.
    Fixed { seconds: f32 },
    /// Advance by the wall-clock time since the previous frame.
    Measured,
}

impl Default for AnimationStep {
    fn default() -> Self {
        AnimationStep::Fixed {
            seconds: 1.0 / 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lighting: LightingConfig,
    pub animation: AnimationStep,
    pub models: Vec<ModelPlacement>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::gallery()
    }
}

impl ViewerConfig {
    /// Nine models spread around the origin, camera ten units back.
    pub fn gallery() -> Self {
        let models = vec![
            ModelPlacement::new("curiosity_rover", [1.0, 1.0, 1.0], [5.0, 0.4, -7.0]),
            ModelPlacement::new("can_you_find_the_human_skull", [5.0, 5.0, 5.0], [4.0, 2.0, -1.0]),
            ModelPlacement::new("astronaut", [1.2, 1.2, 1.2], [-3.0, -1.0, -15.0]),
            ModelPlacement::new("perseverance_mars_rover", [1.0, 1.0, 1.0], [-7.0, 0.0, -5.0]),
            ModelPlacement::new("mariner_4_spacecraft", [1.0, 1.0, 1.0], [8.0, 18.0, -40.0]),
            ModelPlacement::new("space_shuttle", [0.3, 0.3, 0.3], [-10.0, 2.0, -28.0]),
            ModelPlacement::new(
                "robot_from_the_series_love_death_and_robots",
                [0.1, 0.1, 0.1],
                [5.0, 0.5, 0.0],
            ),
            ModelPlacement::new("planet_earth", [3.0, 3.0, 3.0], [25.0, 18.0, -100.0]),
            ModelPlacement::new("planet", [0.002, 0.002, 0.002], [-10.0, 18.0, -50.0]),
        ];
        Self {
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lighting: LightingConfig::default(),
            animation: AnimationStep::default(),
            models,
        }
    }

    /// One model at the origin, camera five units back.
    pub fn single(folder: &str) -> Self {
        Self {
            camera: CameraConfig {
                position: [0.0, 0.0, 5.0],
                ..CameraConfig::default()
            },
            models: vec![ModelPlacement::new(folder, [1.0, 1.0, 1.0], [0.0, 0.0, 0.0])],
            ..Self::gallery()
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the configuration file from the asset root, falling back to the gallery preset.
    pub async fn load<F: AssetFetcher>(fetcher: &F) -> Self {
        match fetch_string(fetcher, CONFIG_FILE).await {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    log::info!("Loaded {} with {} models", CONFIG_FILE, config.models.len());
                    config
                }
                Err(e) => {
                    log::error!("{} is malformed, using the gallery preset: {:#}", CONFIG_FILE, e);
                    Self::gallery()
                }
            },
            Err(e) => {
                log::info!("No {} found ({:#}), using the gallery preset", CONFIG_FILE, e);
                Self::gallery()
            }
        }
    }

    /// Native lookup: the file named by [`CONFIG_ENV`], else `assets/showcase.toml`.
    ///
    /// A file named by the environment must exist; the default one may be absent.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_native() -> anyhow::Result<Self> {
        use anyhow::Context;

        let (path, required) = match std::env::var(CONFIG_ENV) {
            Ok(path) => (std::path::PathBuf::from(path), true),
            Err(_) => (std::path::Path::new("assets").join(CONFIG_FILE), false),
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No {} found, using the gallery preset", path.display());
                return Ok(Self::gallery());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading configuration {}", path.display()));
            }
        };
        let config = Self::from_toml(&content)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        log::info!("Loaded {} with {} models", path.display(), config.models.len());
        Ok(config)
    }
}
