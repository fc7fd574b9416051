//! GPU-compatible parameter blocks for the water simulation.
//!
//! All structs use `#[repr(C)]` and implement `Pod`/`Zeroable` so they can be
//! uploaded verbatim as uniform buffers for a compute dispatch.

use bytemuck::{Pod, Zeroable};

use crate::grid::Grid;
use crate::simulation::{ModelParameters, VpmOptions};

/// Threads per workgroup along X.
pub const GROUP_SIZE_X: u32 = 32;
/// Threads per workgroup along Y (rows per parallel band on the CPU path).
pub const GROUP_SIZE_Y: u32 = 16;

/// Grid dimensions and dispatch tiling.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct GridParams {
    /// Vertices along X (`R + 1`)
    pub size_x: u32,
    /// Vertices along Y/Z (`R + 1`)
    pub size_y: u32,
    /// Workgroups along X
    pub groups_x: u32,
    /// Workgroups along Y
    pub groups_y: u32,
    /// Distance between neighbouring vertices
    pub grid_size: f32,
    /// Area represented by one vertex (`grid_size²`)
    pub cell_area: f32,
    /// Padding for 16-byte alignment (32 bytes total)
    pub _padding: [f32; 2],
}

impl GridParams {
    pub fn new(grid: &Grid) -> Self {
        let side = grid.side() as u32;
        Self {
            size_x: side,
            size_y: side,
            groups_x: side.div_ceil(GROUP_SIZE_X),
            groups_y: side.div_ceil(GROUP_SIZE_Y),
            grid_size: grid.grid_size(),
            cell_area: grid.cell_area(),
            _padding: [0.0; 2],
        }
    }

    /// Rows handled by one parallel band.
    pub fn band_rows(&self) -> usize {
        GROUP_SIZE_Y as usize
    }
}

/// Model constants sent to the solver.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct SimParams {
    /// Time step for integration
    pub delta_t: f32,
    /// Virtual pipe length
    pub pipe_length: f32,
    /// Pipe cross-section area (`pipe_length²`)
    pub pipe_area: f32,
    /// Gravitational acceleration
    pub gravity: f32,
    /// Flow resistance coefficient
    pub ke: f32,
    /// Multiplier applied to rainfall rates
    pub rate_factor: f32,
    /// Water level forced on the outer ring
    pub boundary_level: f32,
    /// Heights below this count as dry for velocity
    pub dry_epsilon: f32,
}

impl SimParams {
    pub fn new(params: &ModelParameters, options: &VpmOptions) -> Self {
        Self {
            delta_t: params.delta_t,
            pipe_length: params.pipe_length,
            pipe_area: params.pipe_length * params.pipe_length,
            gravity: params.gravity,
            ke: params.ke,
            rate_factor: options.rate_factor,
            boundary_level: options.boundary_level,
            dry_epsilon: options.dry_epsilon,
        }
    }

    /// Fraction of last step's flow carried into the next one.
    #[inline]
    pub fn flow_retention(&self) -> f32 {
        (1.0 - self.ke * self.delta_t).max(0.0)
    }
}
