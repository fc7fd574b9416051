//! JSON run configuration.
//!
//! ```json
//! {
//!   "model": "VPM",
//!   "parameters": [0.02, 1.0, 9.81, 0.0],
//!   "terrain": "scenario:basin",
//!   "resolution": 64,
//!   "width": 64.0,
//!   "drawing": { "saving_step": 200, "ending_step": 3000, "drawing_step": 300 },
//!   "rainfall_rate": 0.2,
//!   "export_dir": "out"
//! }
//! ```
//!
//! `terrain` is either a path to an ESRI ASCII grid or `scenario:<name>`. A
//! raster brings its own resolution, width and georeferencing; `resolution`
//! and `width` only apply to scenarios.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::simulation::{scenarios, DrawingParams, ModelParameters, RunRequest};
use crate::terrain::TerrainRaster;

const SCENARIO_PREFIX: &str = "scenario:";

fn default_model() -> String {
    "VPM".to_string()
}

fn default_parameters() -> Vec<f32> {
    ModelParameters::default().to_list().to_vec()
}

fn default_terrain() -> String {
    format!("{SCENARIO_PREFIX}basin")
}

fn default_resolution() -> usize {
    64
}

fn default_width() -> f32 {
    64.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Ordered `[Δt, pipeLength, gravity, Ke]`
    #[serde(default = "default_parameters")]
    pub parameters: Vec<f32>,
    #[serde(default = "default_terrain")]
    pub terrain: String,
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default)]
    pub drawing: DrawingParams,
    #[serde(default)]
    pub rainfall_rate: Option<f32>,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            parameters: default_parameters(),
            terrain: default_terrain(),
            resolution: default_resolution(),
            width: default_width(),
            drawing: DrawingParams::default(),
            rainfall_rate: None,
            export_dir: None,
        }
    }
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the parameters and resolve the terrain into a run request.
    pub fn into_request(self) -> Result<RunRequest, ConfigError> {
        let params = ModelParameters::from_list(&self.parameters)?;
        self.drawing.validate()?;

        let (terrain, width, geo) = match self.terrain.strip_prefix(SCENARIO_PREFIX) {
            Some(name) => (scenarios::by_name(name, self.resolution)?, self.width, None),
            None => {
                let raster = TerrainRaster::load(&self.terrain)?;
                let width = raster.width();
                (raster.field, width, Some(raster.geo))
            }
        };

        Ok(RunRequest {
            model: self.model,
            params,
            terrain,
            width,
            geo,
            drawing: self.drawing,
            rainfall_rate: self.rainfall_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{ "terrain": "scenario:flat" }"#).unwrap();
        assert_eq!(config.model, "VPM");
        assert_eq!(config.drawing, DrawingParams::default());
        let request = config.into_request().unwrap();
        assert_eq!(request.terrain.resolution(), 64);
        assert!(request.geo.is_none());
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let config = RunConfig {
            parameters: vec![0.1, 1.0],
            ..RunConfig::default()
        };
        assert!(matches!(
            config.into_request(),
            Err(ConfigError::ParameterCount { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RunConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
