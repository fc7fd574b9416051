//! Virtual-pipe shallow-water model.
//!
//! Every vertex holds a water column and exchanges water with its four
//! neighbours through virtual pipes. One step runs five stages, each a
//! per-cell pass over the grid that only writes its own cell:
//!
//! 1. Boundary condition on the outer ring
//! 2. Rainfall increment
//! 3. Outflow update from the hydrostatic pressure difference
//! 4. Flux limiting so no cell emits more water than it holds
//! 5. Height and velocity update from net pipe flow
//!
//! Stage 3 and 5 read neighbour cells, so pipe flows are double-buffered
//! (`flow` holds the previous step, `new_flow` is written in place).

use bevy::log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::field::Field;
use super::model::{FileDescriptor, ModelManifest, ParamDescriptor, SimulationModel};
use super::physics_config::ModelParameters;
use crate::error::ConfigError;
use crate::grid::{vertex_positions, Grid};
use crate::resources::{GridParams, SimParams};
use crate::terrain::TerrainField;

/// Baseline rainfall applied to every cell.
pub const DEFAULT_RAINFALL_RATE: f32 = 0.2;
/// Multiplier turning rainfall rates into height per unit time.
pub const DEFAULT_RATE_FACTOR: f32 = 60.0;
/// Water heights below this are treated as dry when computing velocity.
pub const DRY_EPSILON: f32 = 1e-5;
/// Negative heights beyond rounding noise that count as an instability.
const INSTABILITY_TOLERANCE: f32 = 1e-4;

/// Tunables of the virtual-pipe model that are not part of the ordered
/// parameter list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VpmOptions {
    pub rainfall_rate: f32,
    pub rate_factor: f32,
    pub boundary_level: f32,
    pub dry_epsilon: f32,
}

impl Default for VpmOptions {
    fn default() -> Self {
        Self {
            rainfall_rate: DEFAULT_RAINFALL_RATE,
            rate_factor: DEFAULT_RATE_FACTOR,
            boundary_level: 0.0,
            dry_epsilon: DRY_EPSILON,
        }
    }
}

/// Pipe directions, in the order of the four flow components.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// +Z (next row)
    North = 0,
    /// -Z
    South = 1,
    /// +X
    East = 2,
    /// -X
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Index of the neighbouring vertex, if it is inside the grid.
    #[inline]
    pub fn neighbor(self, x: usize, z: usize, side: usize) -> Option<usize> {
        match self {
            Direction::North => (z + 1 < side).then(|| (z + 1) * side + x),
            Direction::South => (z > 0).then(|| (z - 1) * side + x),
            Direction::East => (x + 1 < side).then(|| z * side + x + 1),
            Direction::West => (x > 0).then(|| z * side + x - 1),
        }
    }
}

/// Host-side virtual-pipe engine.
pub struct VirtualPipeModel {
    grid: Grid,
    dispatch: GridParams,
    sim: SimParams,
    terrain: Vec<f32>,
    water: Vec<f32>,
    rainfall: Vec<f32>,
    flow: Vec<[f32; 4]>,
    new_flow: Vec<[f32; 4]>,
    velocity: Vec<[f32; 2]>,
    positions: Vec<[f32; 3]>,
    ring: Vec<usize>,
    steps: u64,
}

impl VirtualPipeModel {
    pub const NAME: &'static str = "VPM";

    pub fn new(params: ModelParameters, terrain: TerrainField, width: f32) -> Result<Self, ConfigError> {
        Self::with_options(params, terrain, width, VpmOptions::default())
    }

    pub fn with_options(
        params: ModelParameters,
        terrain: TerrainField,
        width: f32,
        options: VpmOptions,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        validate_options(&options)?;
        let grid = Grid::new(terrain.resolution(), width)?;
        let count = grid.vertex_count();
        let terrain = terrain.into_elevation();
        if terrain.len() != count {
            return Err(ConfigError::TerrainSizeMismatch {
                expected: count,
                actual: terrain.len(),
            });
        }

        let side = grid.side();
        let ring = (0..count)
            .filter(|&i| grid.is_boundary(i % side, i / side))
            .collect();

        Ok(Self {
            dispatch: GridParams::new(&grid),
            sim: SimParams::new(&params, &options),
            positions: vertex_positions(&grid),
            grid,
            terrain,
            water: vec![0.0; count],
            rainfall: vec![options.rainfall_rate; count],
            flow: vec![[0.0; 4]; count],
            new_flow: vec![[0.0; 4]; count],
            velocity: vec![[0.0; 2]; count],
            ring,
            steps: 0,
        })
    }

    pub fn manifest() -> ModelManifest {
        let defaults = ModelParameters::default();
        let param = |name: &str, default_value: f32| ParamDescriptor {
            name: name.to_string(),
            default_value,
        };
        ModelManifest {
            model_name: Self::NAME.to_string(),
            params: vec![
                param("deltaT", defaults.delta_t),
                param("pipeLength", defaults.pipe_length),
                param("gravity", defaults.gravity),
                param("Ke", defaults.ke),
            ],
            files: vec![FileDescriptor {
                name: "DEM".to_string(),
                kind: "raster".to_string(),
            }],
        }
    }

    pub fn sim_params(&self) -> &SimParams {
        &self.sim
    }

    pub fn dispatch(&self) -> &GridParams {
        &self.dispatch
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn water_height(&self) -> &[f32] {
        &self.water
    }

    pub fn terrain(&self) -> &[f32] {
        &self.terrain
    }

    pub fn velocity(&self) -> &[[f32; 2]] {
        &self.velocity
    }

    /// Flux-limited pipe flows of the last step, `[north, south, east, west]`.
    pub fn outflow(&self) -> &[[f32; 4]] {
        &self.flow
    }

    pub fn rainfall(&self) -> &[f32] {
        &self.rainfall
    }

    pub fn set_water_height(&mut self, x: usize, z: usize, height: f32) -> Result<(), ConfigError> {
        let side = self.grid.side();
        if x >= side || z >= side {
            return Err(ConfigError::CellOutOfRange { x, z, side });
        }
        if !height.is_finite() {
            return Err(ConfigError::InvalidOption(format!(
                "water height must be finite, got {height}"
            )));
        }
        let i = self.grid.index(x, z);
        self.water[i] = height.max(0.0);
        Ok(())
    }

    pub fn set_uniform_rainfall(&mut self, rate: f32) {
        self.rainfall.fill(rate);
    }

    pub fn set_rainfall(&mut self, rates: Vec<f32>) -> Result<(), ConfigError> {
        if rates.len() != self.grid.vertex_count() {
            return Err(ConfigError::TerrainSizeMismatch {
                expected: self.grid.vertex_count(),
                actual: rates.len(),
            });
        }
        self.rainfall = rates;
        Ok(())
    }

    /// Total water volume on the grid.
    pub fn water_volume(&self) -> f32 {
        self.water.iter().sum::<f32>() * self.grid.cell_area()
    }

    fn band_len(&self) -> usize {
        self.dispatch.band_rows() * self.grid.side()
    }

    fn apply_boundary(&mut self) {
        let level = self.sim.boundary_level;
        for &i in &self.ring {
            self.water[i] = level;
        }
    }

    /// Rain lands on interior cells only; the ring stays at the boundary level.
    fn add_rainfall(&mut self) {
        let increment = self.sim.rate_factor * self.sim.delta_t;
        let grid = self.grid;
        let side = grid.side();
        self.water
            .par_iter_mut()
            .zip(self.rainfall.par_iter())
            .enumerate()
            .filter(|(i, _)| !grid.is_boundary(i % side, i / side))
            .for_each(|(_, (h, rate))| *h += rate * increment);
    }

    fn update_outflow(&mut self) {
        let side = self.grid.side();
        let band = self.band_len();
        let sim = self.sim;
        let scale = sim.delta_t * sim.pipe_area * sim.gravity / sim.pipe_length;
        let retain = sim.flow_retention();
        let (water, terrain, flow) = (&self.water, &self.terrain, &self.flow);

        self.new_flow
            .par_chunks_mut(band)
            .enumerate()
            .for_each(|(b, chunk)| {
                let first = b * band;
                for (offset, out) in chunk.iter_mut().enumerate() {
                    let i = first + offset;
                    let (x, z) = (i % side, i / side);
                    let surface = water[i] + terrain[i];
                    for dir in Direction::ALL {
                        let d = dir as usize;
                        out[d] = match dir.neighbor(x, z, side) {
                            Some(j) => {
                                let head = surface - water[j] - terrain[j];
                                (retain * flow[i][d] + scale * head).max(0.0)
                            }
                            None => 0.0,
                        };
                    }
                }
            });
    }

    fn limit_outflow(&mut self) {
        let cell_area = self.grid.cell_area();
        let dt = self.sim.delta_t;
        self.new_flow
            .par_iter_mut()
            .zip(self.water.par_iter())
            .for_each(|(out, &h)| {
                let total: f32 = out.iter().sum();
                if total > 0.0 {
                    let k = (h * cell_area / (dt * total)).min(1.0);
                    out.iter_mut().for_each(|f| *f *= k);
                }
            });
    }

    /// Returns the number of cells whose height had to be clamped.
    fn update_height_and_velocity(&mut self) -> usize {
        let side = self.grid.side();
        let band = self.band_len();
        let cell_area = self.grid.cell_area();
        let dt = self.sim.delta_t;
        let dry = self.sim.dry_epsilon;
        let flow = &self.new_flow;

        self.water
            .par_chunks_mut(band)
            .zip(self.velocity.par_chunks_mut(band))
            .enumerate()
            .map(|(b, (heights, velocities))| {
                let first = b * band;
                let mut clamped = 0;
                for (offset, (h, v)) in heights.iter_mut().zip(velocities.iter_mut()).enumerate() {
                    let i = first + offset;
                    let (x, z) = (i % side, i / side);
                    let out = flow[i];
                    let mut inflow = [0.0f32; 4];
                    for dir in Direction::ALL {
                        if let Some(j) = dir.neighbor(x, z, side) {
                            inflow[dir as usize] = flow[j][dir.opposite() as usize];
                        }
                    }
                    let net = inflow.iter().sum::<f32>() - out.iter().sum::<f32>();
                    let mut next = *h + dt * net / cell_area;
                    if !next.is_finite() || next < 0.0 {
                        if !next.is_finite() || next < -INSTABILITY_TOLERANCE {
                            clamped += 1;
                        }
                        next = 0.0;
                    }
                    *h = next;

                    use Direction::*;
                    let through_x = (inflow[West as usize] - out[West as usize]
                        + out[East as usize]
                        - inflow[East as usize])
                        / 2.0;
                    let through_z = (inflow[South as usize] - out[South as usize]
                        + out[North as usize]
                        - inflow[North as usize])
                        / 2.0;
                    *v = if next > dry {
                        let depth_area = cell_area * next;
                        [through_x / depth_area, through_z / depth_area]
                    } else {
                        [0.0, 0.0]
                    };
                }
                clamped
            })
            .sum()
    }
}

impl SimulationModel for VirtualPipeModel {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn step_once(&mut self) {
        self.apply_boundary();
        self.add_rainfall();
        self.update_outflow();
        self.limit_outflow();
        let clamped = self.update_height_and_velocity();
        std::mem::swap(&mut self.flow, &mut self.new_flow);
        // Re-impose the ring so snapshots observe the boundary condition.
        self.apply_boundary();
        self.steps += 1;

        if clamped > 0 {
            warn!(
                "step {}: clamped {} cell(s) with negative or non-finite water height",
                self.steps, clamped
            );
        }
    }

    fn project_height(&mut self) {
        let (water, terrain) = (&self.water, &self.terrain);
        self.positions
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| p[1] = water[i] + terrain[i]);
        debug!("projected water surface after {} steps", self.steps);
    }

    fn vertices(&self) -> &[[f32; 3]] {
        &self.positions
    }

    fn snapshot_height(&self) -> Field<f32> {
        Field::from_vec(self.grid.side(), self.water.clone())
    }

    fn snapshot_velocity(&self) -> Field<[f32; 2]> {
        Field::from_vec(self.grid.side(), self.velocity.clone())
    }
}

fn validate_options(options: &VpmOptions) -> Result<(), ConfigError> {
    let checks = [
        ("rainfall rate", options.rainfall_rate),
        ("rate factor", options.rate_factor),
        ("boundary level", options.boundary_level),
        ("dry epsilon", options.dry_epsilon),
    ];
    for (name, value) in checks {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::InvalidOption(format!(
                "{name} must be a non-negative finite number, got {value}"
            )));
        }
    }
    Ok(())
}
