//! Square per-vertex fields with a host copy and a texture encoding.

use bevy::prelude::Image;
use bevy::render::{
    render_asset::RenderAssetUsages,
    render_resource::{Extent3d, TextureDimension, TextureFormat},
};
use bytemuck::Pod;

/// A texel type that maps onto a float texture format.
pub trait FieldTexel: Pod {
    const FORMAT: TextureFormat;
}

impl FieldTexel for f32 {
    const FORMAT: TextureFormat = TextureFormat::R32Float;
}

impl FieldTexel for [f32; 2] {
    const FORMAT: TextureFormat = TextureFormat::Rg32Float;
}

/// Logical 2D array of `side × side` values, row-major, row 0 south.
#[derive(Clone, Debug, PartialEq)]
pub struct Field<T> {
    side: usize,
    data: Vec<T>,
}

impl<T: FieldTexel> Field<T> {
    pub fn from_vec(side: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), side * side);
        Self { side, data }
    }

    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }

    #[inline]
    pub fn get(&self, x: usize, z: usize) -> T {
        self.data[z * self.side + x]
    }

    /// Encode as a GPU texture for shader-side blending.
    pub fn to_image(&self) -> Image {
        let side = self.side as u32;
        Image::new(
            Extent3d {
                width: side,
                height: side,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            bytemuck::cast_slice(&self.data).to_vec(),
            T::FORMAT,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        )
    }
}
