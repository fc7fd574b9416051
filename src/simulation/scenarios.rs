//! Synthetic terrains for runs without a raster file.
//!
//! Selected by name, e.g. `"scenario:basin"` in a run configuration.

use rand::Rng;

use crate::error::ConfigError;
use crate::terrain::TerrainField;

/// Every scenario name accepted by [`by_name`].
pub const SCENARIOS: [&str; 4] = ["flat", "slope", "basin", "hills"];

// ==================== SCENARIO CONFIGS ====================

pub mod config {
    /// Rise of the tilted plane from the south edge to the north edge.
    pub const SLOPE_RISE: f32 = 4.0;
    /// Rim height of the radial bowl above its centre.
    pub const BASIN_DEPTH: f32 = 6.0;

    pub const HILL_COUNT: usize = 6;
    pub const HILL_HEIGHT_MIN: f32 = 1.0;
    pub const HILL_HEIGHT_MAX: f32 = 5.0;
    /// Hill radius as a fraction of the grid edge.
    pub const HILL_RADIUS_MIN: f32 = 0.05;
    pub const HILL_RADIUS_MAX: f32 = 0.2;
}

/// Resolve a scenario by name.
pub fn by_name(name: &str, resolution: usize) -> Result<TerrainField, ConfigError> {
    if resolution == 0 {
        return Err(ConfigError::InvalidResolution);
    }
    match name {
        "flat" => Ok(TerrainField::flat(resolution)),
        "slope" => Ok(scenario_slope(resolution)),
        "basin" => Ok(scenario_basin(resolution)),
        "hills" => Ok(scenario_hills(resolution, &mut rand::thread_rng())),
        other => Err(ConfigError::UnknownScenario(other.to_string())),
    }
}

// ==================== SCENARIOS ====================

/// Build an `(R+1)²` field from a function of normalized `(u, v)` in `[0, 1]`.
fn sample(resolution: usize, height: impl Fn(f32, f32) -> f32) -> TerrainField {
    let side = resolution + 1;
    let step = 1.0 / resolution as f32;
    let mut elevation = Vec::with_capacity(side * side);
    for z in 0..side {
        for x in 0..side {
            elevation.push(height(x as f32 * step, z as f32 * step));
        }
    }
    // Length is (R+1)² by construction.
    TerrainField::new(elevation, resolution).unwrap_or_else(|_| TerrainField::flat(resolution))
}

/// Scenario: Slope
/// Plane rising towards the north. Water should run off the southern edge.
pub fn scenario_slope(resolution: usize) -> TerrainField {
    sample(resolution, |_, v| v * config::SLOPE_RISE)
}

/// Scenario: Basin
/// Radial bowl. Rain collects in the centre.
pub fn scenario_basin(resolution: usize) -> TerrainField {
    sample(resolution, |u, v| {
        let du = u - 0.5;
        let dv = v - 0.5;
        // Distance to the centre is at most sqrt(0.5).
        (du * du + dv * dv) * 2.0 * config::BASIN_DEPTH
    })
}

/// Scenario: Hills
/// Random Gaussian bumps. Water pools in the valleys between them.
pub fn scenario_hills(resolution: usize, rng: &mut impl Rng) -> TerrainField {
    use config::*;
    let hills: Vec<(f32, f32, f32, f32)> = (0..HILL_COUNT)
        .map(|_| {
            (
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(HILL_HEIGHT_MIN..HILL_HEIGHT_MAX),
                rng.gen_range(HILL_RADIUS_MIN..HILL_RADIUS_MAX),
            )
        })
        .collect();

    sample(resolution, |u, v| {
        hills
            .iter()
            .map(|&(cu, cv, height, radius)| {
                let d2 = (u - cu).powi(2) + (v - cv).powi(2);
                height * (-d2 / (2.0 * radius * radius)).exp()
            })
            .sum()
    })
}
