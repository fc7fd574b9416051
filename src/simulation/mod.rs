//! Simulation module - virtual-pipe water model and the simulate-ahead playback
//! pipeline that feeds rendering and export.

mod driver;
mod field;
pub mod input;
mod model;
mod physics_config;
mod playback;
pub mod scenarios;
mod snapshot;
mod systems;
mod vpm;

use std::path::PathBuf;

use bevy::prelude::*;

pub use driver::{DriverState, DriverTick, RunLayout, RunRequest, SimulationDriver};
pub use field::{Field, FieldTexel};
pub use model::{
    FileDescriptor, ModelFactory, ModelInit, ModelManifest, ModelRegistry, ParamDescriptor,
    SimulationModel,
};
pub use physics_config::{
    DrawingParams, ModelParameters, DEFAULT_DRAWING_STEPS, MODEL_PARAMETER_COUNT,
};
pub use playback::{PlaybackCursor, PlaybackFrame, PlaybackInterpolator, PlaybackState, PlaybackTick};
pub use snapshot::{Snapshot, SnapshotQueue};
pub use vpm::{
    Direction, VirtualPipeModel, VpmOptions, DEFAULT_RAINFALL_RATE, DEFAULT_RATE_FACTOR,
    DRY_EPSILON,
};

use crate::export::ExportCollector;

// ==================== Events ====================

/// Tear down any current run and start a new one.
#[derive(Event, Clone, Debug)]
pub struct StartSimulation(pub RunRequest);

/// Stop the current run and release everything it holds. Safe to send at any time.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct FinishSimulation;

/// Dump every captured snapshot as a raster into the given directory.
#[derive(Event, Clone, Debug)]
pub struct ExportRequested(pub PathBuf);

/// Sent once when the last snapshot of a drained run has been shown.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct PlaybackFinished;

// ==================== Plugin ====================

/// Headless simulation plugin. Runs one model step and one playback tick per
/// fixed timestep.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StartSimulation>()
            .add_event::<FinishSimulation>()
            .add_event::<ExportRequested>()
            .add_event::<PlaybackFinished>()
            .insert_resource(ModelRegistry::with_builtin())
            .init_resource::<SimulationDriver>()
            .init_resource::<SnapshotQueue>()
            .init_resource::<PlaybackInterpolator>()
            .init_resource::<ExportCollector>()
            .add_systems(
                FixedUpdate,
                (
                    systems::start_simulation,
                    systems::drive_simulation,
                    systems::advance_playback,
                    systems::export_snapshots,
                    systems::finish_simulation,
                )
                    .chain(),
            );
    }
}
