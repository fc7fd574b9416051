//! Interpolated playback of queued snapshots.
//!
//! The interpolator keeps a `before`/`after` pair and blends between them over
//! `drawing_step` ticks, rotating to the next snapshot at every interval
//! boundary. The end of playback is recomputed every tick from the snapshots
//! consumed so far plus the current queue depth, so snapshots enqueued while
//! playback is already running are still shown.

use std::sync::Arc;

use bevy::log::info;
use bevy::prelude::Resource;

use super::snapshot::{Snapshot, SnapshotQueue};
use crate::grid::{lerp_values, lerp_vertices};

/// One displayable frame. Inserted as a resource while playback has output.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct PlaybackFrame {
    pub vertices: Vec<[f32; 3]>,
    pub height: Vec<f32>,
    pub before: Arc<Snapshot>,
    pub after: Arc<Snapshot>,
    /// Blend fraction in `[0, 1]` between `before` and `after`
    pub blend: f32,
}

impl PlaybackFrame {
    /// Linear blend of two snapshots' surfaces.
    pub fn interpolate(before: Arc<Snapshot>, after: Arc<Snapshot>, blend: f32) -> Self {
        Self {
            vertices: lerp_vertices(&before.vertices, &after.vertices, blend),
            height: lerp_values(before.height.as_slice(), after.height.as_slice(), blend),
            before,
            after,
            blend,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// No snapshot consumed yet
    #[default]
    Idle,
    Playing,
    /// Caught up with the producer, holding the last frame
    Waiting,
    /// Producer closed and every snapshot shown
    Finished,
}

/// Result of one playback tick.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackTick {
    Idle,
    Frame(PlaybackFrame),
    Waiting,
    Finished,
}

/// Position within the snapshot sequence.
#[derive(Clone, Debug)]
pub struct PlaybackCursor {
    before: Arc<Snapshot>,
    after: Arc<Snapshot>,
    current: u64,
    total: u64,
    consumed: u64,
    holding: bool,
}

impl PlaybackCursor {
    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[derive(Resource, Debug, Default)]
pub struct PlaybackInterpolator {
    drawing_step: u32,
    cursor: Option<PlaybackCursor>,
    state: PlaybackState,
}

impl PlaybackInterpolator {
    pub fn new(drawing_step: u32) -> Self {
        Self {
            drawing_step,
            ..Self::default()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> Option<&PlaybackCursor> {
        self.cursor.as_ref()
    }

    /// Forget the current pair and set the interval length for the next run.
    pub fn reset(&mut self, drawing_step: u32) {
        self.drawing_step = drawing_step;
        self.cursor = None;
        self.state = PlaybackState::Idle;
    }

    pub fn tick(&mut self, queue: &mut SnapshotQueue) -> PlaybackTick {
        let step = u64::from(self.drawing_step);
        if step == 0 {
            return PlaybackTick::Idle;
        }

        if self.cursor.is_none() {
            let Some(first) = queue.pop() else {
                return PlaybackTick::Idle;
            };
            self.cursor = Some(PlaybackCursor {
                before: first.clone(),
                after: first,
                current: 0,
                total: 0,
                consumed: 1,
                holding: false,
            });
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return PlaybackTick::Idle;
        };

        let intervals = cursor.consumed - 1 + queue.len() as u64;
        cursor.total = step.saturating_mul(intervals);

        if cursor.current < cursor.total {
            if cursor.current % step == 0 {
                if let Some(next) = queue.pop() {
                    cursor.before = std::mem::replace(&mut cursor.after, next);
                    cursor.consumed += 1;
                }
            }
            let blend = (cursor.current % step) as f32 / step as f32;
            let frame = PlaybackFrame::interpolate(cursor.before.clone(), cursor.after.clone(), blend);
            cursor.current += 1;
            cursor.holding = false;
            self.state = PlaybackState::Playing;
            return PlaybackTick::Frame(frame);
        }

        let closed = queue.is_closed();
        if !cursor.holding {
            cursor.holding = true;
            let frame = PlaybackFrame::interpolate(cursor.after.clone(), cursor.after.clone(), 1.0);
            self.state = if closed {
                info!("playback finished after {} frame(s)", cursor.current);
                PlaybackState::Finished
            } else {
                PlaybackState::Waiting
            };
            return PlaybackTick::Frame(frame);
        }

        if closed {
            if self.state != PlaybackState::Finished {
                info!("playback finished after {} frame(s)", cursor.current);
            }
            self.state = PlaybackState::Finished;
            PlaybackTick::Finished
        } else {
            self.state = PlaybackState::Waiting;
            PlaybackTick::Waiting
        }
    }
}
