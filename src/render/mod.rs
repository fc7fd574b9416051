//! Water rendering module - terrain and water meshes driven by playback frames.
//!
//! The water surface is a displaced grid mesh updated from each
//! `PlaybackFrame`. Height and velocity of the bracketing snapshots are kept
//! as float textures together with the blend fraction, so a material can
//! blend them on the GPU.

use bevy::{
    prelude::*,
    render::{
        mesh::{Indices, PrimitiveTopology},
        render_asset::RenderAssetUsages,
    },
};

use crate::grid::{displaced_positions, tex_coords, triangle_indices, Grid};
use crate::simulation::{Field, PlaybackFrame, RunLayout};

/// Plugin for drawing the active run.
pub struct WaterRenderPlugin;

impl Plugin for WaterRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (sync_run_meshes, apply_playback_frame).chain());
    }
}

/// Marker for entities owned by the active run.
#[derive(Component)]
pub struct RunMesh;

/// Marker for the water surface.
#[derive(Component)]
pub struct WaterSurface;

/// Height/velocity textures of the two snapshots being blended.
#[derive(Resource, Clone, Debug)]
pub struct WaterTextures {
    pub before_height: Handle<Image>,
    pub after_height: Handle<Image>,
    pub before_velocity: Handle<Image>,
    pub after_velocity: Handle<Image>,
    /// Blend fraction in `[0, 1]`
    pub blend: f32,
    before_step: Option<u64>,
    after_step: Option<u64>,
}

// ==================== Mesh Construction ====================

/// Indexed triangle mesh over the grid with the given vertex positions.
pub fn grid_mesh(grid: &Grid, positions: Vec<[f32; 3]>) -> Mesh {
    Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, tex_coords(grid))
        .with_inserted_indices(Indices::U32(triangle_indices(grid)))
        .with_computed_normals()
}

fn terrain_material() -> StandardMaterial {
    StandardMaterial {
        base_color: Color::srgb(0.45, 0.38, 0.28),
        perceptual_roughness: 0.9,
        ..default()
    }
}

fn water_material() -> StandardMaterial {
    StandardMaterial {
        base_color: Color::srgba(0.1, 0.35, 0.8, 0.7),
        alpha_mode: AlphaMode::Blend,
        perceptual_roughness: 0.1,
        ..default()
    }
}

// ==================== Systems ====================

/// Spawn meshes when a run starts, despawn them when it ends.
fn sync_run_meshes(
    mut commands: Commands,
    layout: Option<Res<RunLayout>>,
    existing: Query<Entity, With<RunMesh>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    let Some(layout) = layout else {
        if !existing.is_empty() {
            for entity in &existing {
                commands.entity(entity).despawn();
            }
            commands.remove_resource::<WaterTextures>();
            info!("despawned run meshes");
        }
        return;
    };
    if !layout.is_changed() {
        return;
    }

    for entity in &existing {
        commands.entity(entity).despawn();
    }

    let grid = layout.grid;
    let terrain = displaced_positions(&grid, &layout.terrain);
    let center = Vec3::new(-grid.width() / 2.0, 0.0, -grid.width() / 2.0);

    commands.spawn((
        RunMesh,
        Mesh3d(meshes.add(grid_mesh(&grid, terrain.clone()))),
        MeshMaterial3d(materials.add(terrain_material())),
        Transform::from_translation(center),
    ));
    commands.spawn((
        RunMesh,
        WaterSurface,
        Mesh3d(meshes.add(grid_mesh(&grid, terrain))),
        MeshMaterial3d(materials.add(water_material())),
        Transform::from_translation(center),
        Visibility::Hidden,
    ));

    let side = grid.side();
    let height = Field::from_vec(side, vec![0.0f32; side * side]);
    let velocity = Field::from_vec(side, vec![[0.0f32; 2]; side * side]);
    commands.insert_resource(WaterTextures {
        before_height: images.add(height.to_image()),
        after_height: images.add(height.to_image()),
        before_velocity: images.add(velocity.to_image()),
        after_velocity: images.add(velocity.to_image()),
        blend: 0.0,
        before_step: None,
        after_step: None,
    });
    info!("spawned meshes for a {side}x{side} grid");
}

/// Show the latest playback frame; hide the water while there is none.
fn apply_playback_frame(
    frame: Option<Res<PlaybackFrame>>,
    mut water: Query<(&Mesh3d, &mut Visibility), With<WaterSurface>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    textures: Option<ResMut<WaterTextures>>,
) {
    let Some(frame) = frame else {
        for (_, mut visibility) in &mut water {
            *visibility = Visibility::Hidden;
        }
        return;
    };
    if !frame.is_changed() {
        return;
    }

    for (mesh3d, mut visibility) in &mut water {
        if let Some(mesh) = meshes.get_mut(&mesh3d.0) {
            mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, frame.vertices.clone());
            mesh.compute_normals();
        }
        *visibility = Visibility::Visible;
    }

    let Some(mut textures) = textures else {
        return;
    };
    textures.blend = frame.blend;
    if textures.before_step != Some(frame.before.step) {
        replace_image(&mut images, &textures.before_height, frame.before.height_image());
        replace_image(&mut images, &textures.before_velocity, frame.before.velocity_image());
        textures.before_step = Some(frame.before.step);
    }
    if textures.after_step != Some(frame.after.step) {
        replace_image(&mut images, &textures.after_height, frame.after.height_image());
        replace_image(&mut images, &textures.after_velocity, frame.after.velocity_image());
        textures.after_step = Some(frame.after.step);
    }
}

fn replace_image(images: &mut Assets<Image>, handle: &Handle<Image>, image: Image) {
    if let Some(slot) = images.get_mut(handle) {
        *slot = image;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::mesh::VertexAttributeValues;

    #[test]
    fn grid_mesh_has_one_vertex_per_grid_point() {
        let grid = Grid::new(3, 6.0).unwrap();
        let mesh = grid_mesh(&grid, displaced_positions(&grid, &[1.0; 16]));
        assert_eq!(mesh.count_vertices(), 16);
        assert_eq!(mesh.indices().map(|i| i.len()), Some(54));
        match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
            Some(VertexAttributeValues::Float32x3(positions)) => {
                assert!(positions.iter().all(|p| p[1] == 1.0));
                assert_eq!(positions[15], [6.0, 1.0, 6.0]);
            }
            other => panic!("unexpected position attribute {other:?}"),
        }
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }
}
