//! Fixed-timestep systems of the simulation pipeline.
//!
//! Pipeline stages (one pass per fixed tick):
//! 1. Start a requested run
//! 2. Step the model, capture on saving boundaries
//! 3. Advance interpolated playback
//! 4. Export on request
//! 5. Tear down on request

use bevy::prelude::*;

use super::driver::{RunLayout, SimulationDriver};
use super::model::ModelRegistry;
use super::playback::{PlaybackFrame, PlaybackInterpolator, PlaybackState, PlaybackTick};
use super::snapshot::SnapshotQueue;
use super::{ExportRequested, FinishSimulation, PlaybackFinished, StartSimulation};
use crate::export::{export_rasters, ExportCollector};

/// Start the most recent request; earlier ones in the same tick are superseded.
pub fn start_simulation(
    mut commands: Commands,
    mut requests: EventReader<StartSimulation>,
    registry: Res<ModelRegistry>,
    mut driver: ResMut<SimulationDriver>,
    mut queue: ResMut<SnapshotQueue>,
    mut collector: ResMut<ExportCollector>,
    mut playback: ResMut<PlaybackInterpolator>,
) {
    let Some(StartSimulation(request)) = requests.read().last() else {
        return;
    };

    queue.clear();
    collector.clear();
    playback.reset(request.drawing.drawing_step);
    commands.remove_resource::<PlaybackFrame>();
    commands.remove_resource::<RunLayout>();

    match driver.start(&registry, request.clone()) {
        Ok(layout) => commands.insert_resource(layout),
        Err(err) => error!("failed to start simulation: {err}"),
    }
}

pub fn drive_simulation(
    mut driver: ResMut<SimulationDriver>,
    mut queue: ResMut<SnapshotQueue>,
    mut collector: ResMut<ExportCollector>,
) {
    driver.tick(&mut queue, &mut collector);
}

pub fn advance_playback(
    mut commands: Commands,
    mut playback: ResMut<PlaybackInterpolator>,
    mut queue: ResMut<SnapshotQueue>,
    mut finished: EventWriter<PlaybackFinished>,
) {
    let was_finished = playback.state() == PlaybackState::Finished;
    if let PlaybackTick::Frame(frame) = playback.tick(&mut queue) {
        commands.insert_resource(frame);
    }
    if !was_finished && playback.state() == PlaybackState::Finished {
        finished.send(PlaybackFinished);
    }
}

pub fn export_snapshots(
    mut requests: EventReader<ExportRequested>,
    collector: Res<ExportCollector>,
    layout: Option<Res<RunLayout>>,
) {
    for ExportRequested(dir) in requests.read() {
        let Some(layout) = layout.as_deref() else {
            warn!("export to {} requested with no run loaded", dir.display());
            continue;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            error!("cannot create export directory {}: {err}", dir.display());
            continue;
        }
        match export_rasters(dir, &collector, &layout.geo, layout.grid.resolution()) {
            Ok(report) => info!(
                "exported {} snapshot(s) to {} with {} failure(s)",
                report.written.len(),
                dir.display(),
                report.failures.len()
            ),
            Err(err) => warn!("export to {} skipped: {err}", dir.display()),
        }
    }
}

/// Release the model, queued snapshots, playback references and history.
pub fn finish_simulation(
    mut commands: Commands,
    mut requests: EventReader<FinishSimulation>,
    mut driver: ResMut<SimulationDriver>,
    mut queue: ResMut<SnapshotQueue>,
    mut collector: ResMut<ExportCollector>,
    mut playback: ResMut<PlaybackInterpolator>,
) {
    if requests.is_empty() {
        return;
    }
    requests.clear();

    driver.finish();
    queue.clear();
    collector.clear();
    playback.reset(0);
    commands.remove_resource::<PlaybackFrame>();
    commands.remove_resource::<RunLayout>();
}
