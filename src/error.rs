//! Error types for configuration, model construction and export.

use std::path::PathBuf;

/// Problems detected while validating parameters or loading inputs.
///
/// These are always raised before any engine state is allocated.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("time step must be a positive finite number, got {0}")]
    InvalidTimeStep(f32),

    #[error("pipe length must be a positive finite number, got {0}")]
    InvalidPipeLength(f32),

    #[error("gravity must be a non-negative finite number, got {0}")]
    InvalidGravity(f32),

    #[error("flow resistance Ke must be a non-negative finite number, got {0}")]
    InvalidResistance(f32),

    #[error("expected {expected} model parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("invalid drawing parameters: {0}")]
    InvalidDrawing(String),

    #[error("invalid model option: {0}")]
    InvalidOption(String),

    #[error("inconsistent mesh parameters: {0}")]
    InvalidMesh(String),

    #[error("grid resolution must be at least 1")]
    InvalidResolution,

    #[error("grid width must be a positive finite number, got {0}")]
    InvalidWidth(f32),

    #[error("terrain has {actual} samples but the grid needs {expected}")]
    TerrainSizeMismatch { expected: usize, actual: usize },

    #[error("terrain raster must be square, got {cols}x{rows}")]
    NonSquareRaster { cols: usize, rows: usize },

    #[error("terrain raster parse error on line {line}: {message}")]
    RasterParse { line: usize, message: String },

    #[error("cell ({x}, {z}) is outside a grid with {side} vertices per side")]
    CellOutOfRange { x: usize, z: usize, side: usize },

    #[error("terrain sample {index} is not finite: {value}")]
    NonFiniteElevation { index: usize, value: f32 },

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised when starting or controlling a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("model {0} does not exist")]
    UnknownModel(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while writing exported rasters.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: no snapshots have been captured")]
    NothingToExport,

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
