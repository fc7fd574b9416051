//! Rainflow - Main Entry
//!
//! Loads a JSON run configuration (first argument, optional) and plays the
//! simulated water surface over the terrain.

use bevy::prelude::*;
use rainflow::config::RunConfig;
use rainflow::render::WaterRenderPlugin;
use rainflow::simulation::input::{handle_run_input, ExportTarget};
use rainflow::simulation::{
    ExportRequested, PlaybackFinished, RunRequest, SimulationPlugin, StartSimulation,
};

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match RunConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    };
    let export_dir = config.export_dir.clone();
    let request = match config.into_request() {
        Ok(request) => request,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Rainflow".into(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(SimulationPlugin)
        .add_plugins(WaterRenderPlugin)
        .insert_resource(PendingRun(Some(request)))
        .insert_resource(ExportTarget(export_dir.clone().unwrap_or_else(|| "export".into())))
        .insert_resource(AutoExport(export_dir.is_some()))
        .add_systems(Startup, (setup_scene, start_pending_run))
        .add_systems(Update, (handle_run_input, export_when_finished, log_frame))
        .run();
}

/// Request loaded from the command line, sent once at startup.
#[derive(Resource)]
struct PendingRun(Option<RunRequest>);

/// Export automatically when playback finishes if the config named a directory.
#[derive(Resource)]
struct AutoExport(bool);

/// Set up the 3D camera and a light
fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 60.0, 90.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(30.0, 80.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(FrameCounter(0));
}

fn start_pending_run(mut pending: ResMut<PendingRun>, mut start: EventWriter<StartSimulation>) {
    if let Some(request) = pending.0.take() {
        start.send(StartSimulation(request));
    }
}

fn export_when_finished(
    auto: Res<AutoExport>,
    target: Res<ExportTarget>,
    mut finished: EventReader<PlaybackFinished>,
    mut export: EventWriter<ExportRequested>,
) {
    if finished.read().count() > 0 && auto.0 {
        export.send(ExportRequested(target.0.clone()));
    }
}

/// Frame counter for logging
#[derive(Resource)]
struct FrameCounter(u32);

/// Log every N frames
fn log_frame(mut counter: ResMut<FrameCounter>) {
    counter.0 += 1;
    if counter.0 % 60 == 0 {
        info!("Frame {}: Simulation running...", counter.0);
    }
}
