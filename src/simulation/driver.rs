//! Run/stop state machine that steps the model and feeds the snapshot queue.

use std::sync::Arc;

use bevy::log::{debug, info};
use bevy::prelude::Resource;

use super::model::{ModelInit, ModelRegistry, SimulationModel};
use super::physics_config::{DrawingParams, ModelParameters};
use super::snapshot::{Snapshot, SnapshotQueue};
use crate::error::SimError;
use crate::export::ExportCollector;
use crate::grid::{GeoTransform, Grid};
use crate::terrain::TerrainField;

/// Everything needed to start a run.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Registry name of the model
    pub model: String,
    pub params: ModelParameters,
    pub terrain: TerrainField,
    /// World width of the grid
    pub width: f32,
    /// Georeferencing for export; local coordinates when absent
    pub geo: Option<GeoTransform>,
    pub drawing: DrawingParams,
    /// Overrides the model's baseline rainfall
    pub rainfall_rate: Option<f32>,
}

/// Static description of the active run, shared with rendering and export.
#[derive(Resource, Clone, Debug)]
pub struct RunLayout {
    pub grid: Grid,
    pub terrain: Arc<[f32]>,
    pub geo: GeoTransform,
    pub drawing: DrawingParams,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverState {
    #[default]
    Idle,
    Running,
    Drained,
}

/// Outcome of one driver tick.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverTick {
    /// Nothing to do
    Idle,
    /// One step was taken; `captured` is set on saving boundaries
    Stepped {
        step: u32,
        captured: Option<Arc<Snapshot>>,
    },
    /// The ending step was reached on this tick
    Drained { step: u32 },
}

/// Owns the model for the duration of a run.
#[derive(Resource, Default)]
pub struct SimulationDriver {
    state: DriverState,
    model: Option<Box<dyn SimulationModel>>,
    drawing: DrawingParams,
    step: u32,
}

impl SimulationDriver {
    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn drawing(&self) -> DrawingParams {
        self.drawing
    }

    pub fn model(&self) -> Option<&dyn SimulationModel> {
        self.model.as_deref()
    }

    /// Build the requested model and start running. Any previous run is
    /// torn down first; on error the driver is left idle.
    pub fn start(
        &mut self,
        registry: &ModelRegistry,
        request: RunRequest,
    ) -> Result<RunLayout, SimError> {
        self.finish();
        request.drawing.validate()?;
        request.params.validate()?;
        let grid = Grid::new(request.terrain.resolution(), request.width)?;
        let layout = RunLayout {
            grid,
            terrain: Arc::from(request.terrain.elevation()),
            geo: request.geo.unwrap_or_else(|| GeoTransform::local(&grid)),
            drawing: request.drawing,
        };
        let model = registry.create(
            &request.model,
            ModelInit {
                params: request.params,
                terrain: request.terrain,
                width: request.width,
                rainfall_rate: request.rainfall_rate,
            },
        )?;
        self.start_with_model(model, request.drawing);
        info!(
            "started {} on a {}x{} grid, saving every {} steps until {}",
            request.model,
            grid.side(),
            grid.side(),
            request.drawing.saving_step,
            request.drawing.ending_step
        );
        Ok(layout)
    }

    /// Start running an already-built model.
    pub fn start_with_model(&mut self, model: Box<dyn SimulationModel>, drawing: DrawingParams) {
        self.model = Some(model);
        self.drawing = drawing;
        self.step = 0;
        self.state = DriverState::Running;
    }

    /// Advance one step; capture and enqueue on saving boundaries.
    pub fn tick(&mut self, queue: &mut SnapshotQueue, collector: &mut ExportCollector) -> DriverTick {
        if self.state != DriverState::Running {
            return DriverTick::Idle;
        }
        let Some(model) = self.model.as_deref_mut() else {
            self.state = DriverState::Idle;
            return DriverTick::Idle;
        };

        model.step_once();
        self.step += 1;

        let captured = (self.step % self.drawing.saving_step == 0).then(|| {
            let snapshot = Arc::new(Snapshot::capture(model, self.step as u64));
            queue.push(snapshot.clone());
            collector.record(snapshot.clone());
            debug!("captured snapshot at step {}", self.step);
            snapshot
        });

        if self.step >= self.drawing.ending_step {
            self.state = DriverState::Drained;
            queue.close();
            info!(
                "simulation drained at step {} with {} snapshot(s) captured",
                self.step,
                collector.len()
            );
            return DriverTick::Drained { step: self.step };
        }

        DriverTick::Stepped {
            step: self.step,
            captured,
        }
    }

    /// Drop the model and return to idle. Safe to call in any state.
    pub fn finish(&mut self) {
        if self.model.is_some() {
            info!("finishing run at step {}", self.step);
        }
        self.model = None;
        self.state = DriverState::Idle;
        self.step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(drawing: DrawingParams) -> RunRequest {
        RunRequest {
            model: "VPM".into(),
            params: ModelParameters::default(),
            terrain: TerrainField::flat(3),
            width: 3.0,
            geo: None,
            drawing,
            rainfall_rate: None,
        }
    }

    #[test]
    fn idle_driver_does_nothing() {
        let mut driver = SimulationDriver::default();
        let mut queue = SnapshotQueue::default();
        let mut collector = ExportCollector::default();
        assert_eq!(driver.tick(&mut queue, &mut collector), DriverTick::Idle);
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn unknown_model_leaves_driver_idle() {
        let mut driver = SimulationDriver::default();
        let mut req = request(DrawingParams::default());
        req.model = "Nope".into();
        let err = driver.start(&ModelRegistry::with_builtin(), req).err().unwrap();
        assert!(matches!(err, SimError::UnknownModel(_)));
        assert_eq!(driver.state(), DriverState::Idle);
        assert!(driver.model().is_none());
    }

    #[test]
    fn partial_final_interval_is_not_captured() {
        let mut driver = SimulationDriver::default();
        let drawing = DrawingParams::new(4, 10, 1).unwrap();
        driver.start(&ModelRegistry::with_builtin(), request(drawing)).unwrap();
        let mut queue = SnapshotQueue::default();
        let mut collector = ExportCollector::default();
        let mut last = DriverTick::Idle;
        while driver.state() == DriverState::Running {
            last = driver.tick(&mut queue, &mut collector);
        }
        assert_eq!(last, DriverTick::Drained { step: 10 });
        assert_eq!(queue.len(), 2);
        assert!(queue.is_closed());
        assert_eq!(queue.pop().map(|s| s.step), Some(4));
        assert_eq!(queue.pop().map(|s| s.step), Some(8));
    }

    #[test]
    fn finish_is_idempotent() {
        let mut driver = SimulationDriver::default();
        driver
            .start(&ModelRegistry::with_builtin(), request(DrawingParams::default()))
            .unwrap();
        driver.finish();
        driver.finish();
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.step(), 0);
        assert!(driver.model().is_none());
    }
}
