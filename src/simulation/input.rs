//! Input handling for run controls.
//!
//! `E` exports every captured snapshot, `Escape` finishes the run.

use std::path::PathBuf;

use bevy::prelude::*;

use super::{ExportRequested, FinishSimulation};

/// Where `E` writes rasters.
#[derive(Resource, Clone, Debug)]
pub struct ExportTarget(pub PathBuf);

impl Default for ExportTarget {
    fn default() -> Self {
        Self(PathBuf::from("export"))
    }
}

/// System to turn key presses into run events.
pub fn handle_run_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    target: Res<ExportTarget>,
    mut exports: EventWriter<ExportRequested>,
    mut finishes: EventWriter<FinishSimulation>,
) {
    if keyboard.just_pressed(KeyCode::KeyE) {
        exports.send(ExportRequested(target.0.clone()));
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        finishes.send(FinishSimulation);
    }
}
