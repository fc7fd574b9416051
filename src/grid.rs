//! Regular-grid helpers shared by simulation setup, rendering and export.
//!
//! A grid of resolution `R` has `R` cells per edge and `(R+1)²` vertices laid
//! out row-major: vertex `(x, z)` lives at index `z * (R+1) + x`. Row 0 is the
//! southern edge and rows grow northwards along world +Z.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable grid layout.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    resolution: usize,
    width: f32,
}

impl Grid {
    pub fn new(resolution: usize, width: f32) -> Result<Self, ConfigError> {
        if resolution == 0 {
            return Err(ConfigError::InvalidResolution);
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(ConfigError::InvalidWidth(width));
        }
        Ok(Self { resolution, width })
    }

    /// Cells per edge.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// World-space edge length.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Vertices per edge (`R + 1`).
    #[inline]
    pub fn side(&self) -> usize {
        self.resolution + 1
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.side() * self.side()
    }

    pub fn triangle_index_count(&self) -> usize {
        self.resolution * self.resolution * 6
    }

    /// Spacing between adjacent vertices.
    #[inline]
    pub fn grid_size(&self) -> f32 {
        self.width / self.resolution as f32
    }

    #[inline]
    pub fn cell_area(&self) -> f32 {
        let size = self.grid_size();
        size * size
    }

    #[inline]
    pub fn index(&self, x: usize, z: usize) -> usize {
        z * self.side() + x
    }

    /// True for vertices on the outermost ring.
    #[inline]
    pub fn is_boundary(&self, x: usize, z: usize) -> bool {
        x == 0 || z == 0 || x == self.resolution || z == self.resolution
    }

    pub fn mesh_params(&self) -> MeshParams {
        MeshParams {
            vertex_count: self.vertex_count(),
            triangle_index_count: self.triangle_index_count(),
            resolution: self.resolution,
            width: self.width,
        }
    }
}

/// Mesh sizing handed to renderers: `[vertexCount, triangleIndexCount, resolution, width]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshParams {
    pub vertex_count: usize,
    pub triangle_index_count: usize,
    pub resolution: usize,
    pub width: f32,
}

impl MeshParams {
    /// Parse the ordered list form and check it describes a consistent grid.
    pub fn from_list(list: &[f32]) -> Result<Self, ConfigError> {
        if list.len() != 4 {
            return Err(ConfigError::ParameterCount {
                expected: 4,
                actual: list.len(),
            });
        }
        let grid = Grid::new(list[2] as usize, list[3])?;
        let params = grid.mesh_params();
        if list[0] as usize != params.vertex_count {
            return Err(ConfigError::InvalidMesh(format!(
                "vertex count {} does not match resolution {}",
                list[0], params.resolution
            )));
        }
        if list[1] as usize != params.triangle_index_count {
            return Err(ConfigError::InvalidMesh(format!(
                "triangle index count {} does not match resolution {}",
                list[1], params.resolution
            )));
        }
        Ok(params)
    }

    pub fn grid(&self) -> Result<Grid, ConfigError> {
        Grid::new(self.resolution, self.width)
    }
}

/// Affine mapping from grid columns/rows to geographic coordinates.
///
/// Follows the raster convention: `origin_*` is the north-west corner and
/// `pixel_height` is negative for north-up rasters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Local coordinates for a grid without georeferencing.
    pub fn local(grid: &Grid) -> Self {
        let size = grid.grid_size() as f64;
        Self {
            origin_x: 0.0,
            origin_y: grid.width() as f64,
            pixel_width: size,
            pixel_height: -size,
        }
    }
}

/// One exported sample: position, water depth and velocity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterRow {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Undo the raster's north-first row order so that row 0 is the southern edge.
pub fn flip_rows(raster: &[f32], resolution: usize) -> Vec<f32> {
    let side = resolution + 1;
    let mut flipped = vec![0.0; raster.len()];
    for z in 0..side {
        let src = (resolution - z) * side;
        flipped[z * side..(z + 1) * side].copy_from_slice(&raster[src..src + side]);
    }
    flipped
}

/// Flat vertex positions on the XZ plane.
pub fn vertex_positions(grid: &Grid) -> Vec<[f32; 3]> {
    let size = grid.grid_size();
    let side = grid.side();
    let mut positions = Vec::with_capacity(grid.vertex_count());
    for z in 0..side {
        for x in 0..side {
            positions.push([size * x as f32, 0.0, size * z as f32]);
        }
    }
    positions
}

/// Vertex positions with Y taken from `heights`.
pub fn displaced_positions(grid: &Grid, heights: &[f32]) -> Vec<[f32; 3]> {
    let mut positions = vertex_positions(grid);
    for (position, height) in positions.iter_mut().zip(heights) {
        position[1] = *height;
    }
    positions
}

pub fn tex_coords(grid: &Grid) -> Vec<[f32; 2]> {
    let step = 1.0 / grid.resolution() as f32;
    let side = grid.side();
    let mut uvs = Vec::with_capacity(grid.vertex_count());
    for y in 0..side {
        for x in 0..side {
            uvs.push([step * x as f32, step * y as f32]);
        }
    }
    uvs
}

/// Two triangles per cell, wound so that normals point up (+Y).
pub fn triangle_indices(grid: &Grid) -> Vec<u32> {
    let r = grid.resolution();
    let side = grid.side() as u32;
    let mut indices = Vec::with_capacity(grid.triangle_index_count());
    for y in 0..r as u32 {
        for x in 0..r as u32 {
            let here = y * side + x;
            let above = (y + 1) * side + x;
            indices.extend_from_slice(&[here, above, here + 1, here + 1, above, above + 1]);
        }
    }
    indices
}

pub fn lerp_vertices(before: &[[f32; 3]], after: &[[f32; 3]], t: f32) -> Vec<[f32; 3]> {
    before
        .iter()
        .zip(after)
        .map(|(b, a)| {
            [
                b[0] * (1.0 - t) + a[0] * t,
                b[1] * (1.0 - t) + a[1] * t,
                b[2] * (1.0 - t) + a[2] * t,
            ]
        })
        .collect()
}

pub fn lerp_values(before: &[f32], after: &[f32], t: f32) -> Vec<f32> {
    before
        .iter()
        .zip(after)
        .map(|(b, a)| b * (1.0 - t) + a * t)
        .collect()
}

/// Rasterize a height/velocity pair into geocoded rows, south row first.
pub fn raster_rows(
    height: &[f32],
    velocity: &[[f32; 2]],
    geo: &GeoTransform,
    resolution: usize,
) -> Vec<RasterRow> {
    let side = resolution + 1;
    let start_x = geo.origin_x;
    let delta_x = geo.pixel_width;
    let start_y = geo.origin_y + resolution as f64 * geo.pixel_height;
    let delta_y = geo.pixel_height.abs();

    let mut rows = Vec::with_capacity(side * side);
    for z in 0..side {
        for x in 0..side {
            let i = z * side + x;
            rows.push(RasterRow {
                x: (start_x + delta_x * x as f64) as f32,
                y: (start_y + delta_y * z as f64) as f32,
                depth: height[i],
                vx: velocity[i][0],
                vy: velocity[i][1],
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rejects_zero_resolution_and_bad_width() {
        assert!(matches!(Grid::new(0, 10.0), Err(ConfigError::InvalidResolution)));
        assert!(matches!(Grid::new(4, 0.0), Err(ConfigError::InvalidWidth(_))));
        assert!(matches!(Grid::new(4, f32::NAN), Err(ConfigError::InvalidWidth(_))));
    }

    #[test]
    fn grid_sizes() {
        let grid = Grid::new(4, 20.0).unwrap();
        assert_eq!(grid.side(), 5);
        assert_eq!(grid.vertex_count(), 25);
        assert_eq!(grid.triangle_index_count(), 96);
        assert!((grid.grid_size() - 5.0).abs() < f32::EPSILON);
        assert!((grid.cell_area() - 25.0).abs() < f32::EPSILON);
        assert_eq!(grid.index(2, 3), 17);
    }

    #[test]
    fn boundary_ring() {
        let grid = Grid::new(3, 3.0).unwrap();
        let ring = (0..4)
            .flat_map(|z| (0..4).map(move |x| (x, z)))
            .filter(|&(x, z)| grid.is_boundary(x, z))
            .count();
        assert_eq!(ring, 12);
        assert!(!grid.is_boundary(1, 2));
    }

    #[test]
    fn mesh_params_list_roundtrip_and_mismatch() {
        let params = MeshParams::from_list(&[25.0, 96.0, 4.0, 20.0]).unwrap();
        assert_eq!(params, Grid::new(4, 20.0).unwrap().mesh_params());
        assert!(MeshParams::from_list(&[24.0, 96.0, 4.0, 20.0]).is_err());
        assert!(MeshParams::from_list(&[25.0, 96.0, 4.0]).is_err());
    }

    #[test]
    fn flip_reverses_row_order() {
        // 2x2 cells -> 3x3 vertices; rows tagged by their raster row.
        let raster = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let flipped = flip_rows(&raster, 2);
        assert_eq!(flipped, vec![2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn positions_and_uvs_span_grid() {
        let grid = Grid::new(2, 10.0).unwrap();
        let positions = vertex_positions(&grid);
        assert_eq!(positions[0], [0.0, 0.0, 0.0]);
        assert_eq!(positions[8], [10.0, 0.0, 10.0]);
        assert_eq!(positions[3], [0.0, 0.0, 5.0]);

        let uvs = tex_coords(&grid);
        assert_eq!(uvs[0], [0.0, 0.0]);
        assert_eq!(uvs[8], [1.0, 1.0]);
    }

    #[test]
    fn triangle_indices_cover_every_cell() {
        let grid = Grid::new(2, 2.0).unwrap();
        let indices = triangle_indices(&grid);
        assert_eq!(indices.len(), grid.triangle_index_count());
        assert_eq!(&indices[..6], &[0, 3, 1, 1, 3, 4]);
        assert!(indices.iter().all(|&i| (i as usize) < grid.vertex_count()));
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let before = [[0.0, 1.0, 2.0], [3.0, -4.0, 5.5]];
        let after = [[1.0, 3.0, 2.0], [0.25, 4.0, -5.5]];
        assert_eq!(lerp_vertices(&before, &after, 0.0), before.to_vec());
        assert_eq!(lerp_vertices(&before, &after, 1.0), after.to_vec());
        assert_eq!(lerp_values(&[1.0, 2.0], &[3.0, 6.0], 0.5), vec![2.0, 4.0]);
    }

    #[test]
    fn raster_rows_start_at_southern_edge() {
        let geo = GeoTransform {
            origin_x: 100.0,
            origin_y: 220.0,
            pixel_width: 10.0,
            pixel_height: -10.0,
        };
        let height = vec![0.5; 9];
        let velocity = vec![[1.0, -1.0]; 9];
        let rows = raster_rows(&height, &velocity, &geo, 2);
        assert_eq!(rows.len(), 9);
        assert_eq!((rows[0].x, rows[0].y), (100.0, 200.0));
        assert_eq!((rows[8].x, rows[8].y), (120.0, 220.0));
        assert_eq!(rows[4].depth, 0.5);
        assert_eq!((rows[4].vx, rows[4].vy), (1.0, -1.0));
    }
}
