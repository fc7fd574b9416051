//! Immutable captures of the simulation state and the FIFO that carries them
//! from the driver to playback.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy::prelude::{Image, Resource};

use super::field::Field;
use super::model::SimulationModel;

/// Field state captured at a saving boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Step count at capture
    pub step: u64,
    /// Vertices displaced to `terrain + water`
    pub vertices: Vec<[f32; 3]>,
    pub height: Field<f32>,
    pub velocity: Field<[f32; 2]>,
}

impl Snapshot {
    /// Project the model's surface and copy everything out of it.
    pub fn capture(model: &mut dyn SimulationModel, step: u64) -> Self {
        model.project_height();
        Self {
            step,
            vertices: model.vertices().to_vec(),
            height: model.snapshot_height(),
            velocity: model.snapshot_velocity(),
        }
    }

    pub fn height_image(&self) -> Image {
        self.height.to_image()
    }

    pub fn velocity_image(&self) -> Image {
        self.velocity.to_image()
    }
}

/// Single-producer single-consumer queue of snapshots.
///
/// The producer closes the queue when it will not push again; the consumer
/// uses that to tell "waiting for more" from "done".
#[derive(Resource, Default, Debug)]
pub struct SnapshotQueue {
    items: VecDeque<Arc<Snapshot>>,
    closed: bool,
}

impl SnapshotQueue {
    pub fn push(&mut self, snapshot: Arc<Snapshot>) {
        debug_assert!(!self.closed, "push after close");
        self.items.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<Arc<Snapshot>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop every queued snapshot and reopen for a new run.
    pub fn clear(&mut self) {
        self.items.clear();
        self.closed = false;
    }
}
