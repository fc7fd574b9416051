//! Snapshot Pipeline Tests
//!
//! Driver cadence, interpolated playback and raster export working together
//! the way the fixed-timestep systems run them.
//!
//! # Running tests
//! ```bash
//! cargo test --test playback_pipeline
//! ```

use std::sync::Arc;

use rainflow::export::{export_rasters, ExportCollector, RASTER_HEADER};
use rainflow::grid::{GeoTransform, Grid};
use rainflow::simulation::{
    DrawingParams, DriverState, Field, ModelParameters, ModelRegistry, PlaybackFrame,
    PlaybackInterpolator, PlaybackState, PlaybackTick, RunRequest, SimulationDriver, Snapshot,
    SnapshotQueue,
};
use rainflow::terrain::TerrainField;

// ==================== HELPER FUNCTIONS ====================

fn request(resolution: usize, drawing: DrawingParams) -> RunRequest {
    RunRequest {
        model: "VPM".into(),
        params: ModelParameters {
            delta_t: 0.05,
            ..ModelParameters::default()
        },
        terrain: TerrainField::flat(resolution),
        width: resolution as f32,
        geo: None,
        drawing,
        rainfall_rate: Some(0.05),
    }
}

/// Run the driver to completion without playback.
fn run_to_drain(
    driver: &mut SimulationDriver,
    queue: &mut SnapshotQueue,
    collector: &mut ExportCollector,
) {
    while driver.state() == DriverState::Running {
        driver.tick(queue, collector);
    }
}

// ==================== TESTS ====================

#[test]
fn test_default_cadence_captures_fifteen_snapshots() {
    let registry = ModelRegistry::with_builtin();
    let mut driver = SimulationDriver::default();
    let mut queue = SnapshotQueue::default();
    let mut collector = ExportCollector::default();

    let drawing = DrawingParams::default();
    driver.start(&registry, request(3, drawing)).unwrap();
    run_to_drain(&mut driver, &mut queue, &mut collector);

    assert_eq!(driver.state(), DriverState::Drained);
    assert_eq!(driver.step(), 3000);
    assert_eq!(collector.len(), drawing.expected_snapshots() as usize);
    let steps: Vec<u64> = collector.snapshots().iter().map(|s| s.step).collect();
    let expected: Vec<u64> = (1..=15).map(|k| k * 200).collect();
    assert_eq!(steps, expected);
    assert_eq!(queue.len(), 15);
    assert!(queue.is_closed());
}

#[test]
fn test_queued_snapshots_are_not_aliased_by_live_state() {
    let registry = ModelRegistry::with_builtin();
    let mut driver = SimulationDriver::default();
    let mut queue = SnapshotQueue::default();
    let mut collector = ExportCollector::default();

    driver
        .start(&registry, request(4, DrawingParams::new(1, 3, 1).unwrap()))
        .unwrap();
    run_to_drain(&mut driver, &mut queue, &mut collector);

    let first = queue.pop().unwrap();
    let second = queue.pop().unwrap();
    assert_ne!(first.height, second.height);
    assert_eq!(first.step, 1);
}

#[test]
fn test_interpolation_endpoints_and_monotonicity() {
    let side = 3;
    let before = Arc::new(Snapshot {
        step: 1,
        vertices: (0..9).map(|i| [i as f32, 0.5, 0.0]).collect(),
        height: Field::from_vec(side, vec![0.5; 9]),
        velocity: Field::from_vec(side, vec![[0.0; 2]; 9]),
    });
    let after = Arc::new(Snapshot {
        step: 2,
        vertices: (0..9).map(|i| [i as f32, 2.0 + i as f32, 0.0]).collect(),
        height: Field::from_vec(side, (0..9).map(|i| 2.0 + i as f32).collect()),
        velocity: Field::from_vec(side, vec![[1.0, -1.0]; 9]),
    });

    let start = PlaybackFrame::interpolate(before.clone(), after.clone(), 0.0);
    assert_eq!(start.vertices, before.vertices);
    assert_eq!(start.height, before.height.to_vec());
    let end = PlaybackFrame::interpolate(before.clone(), after.clone(), 1.0);
    assert_eq!(end.vertices, after.vertices);
    assert_eq!(end.height, after.height.to_vec());

    let mut previous = start.height;
    for k in 1..=10 {
        let frame = PlaybackFrame::interpolate(before.clone(), after.clone(), k as f32 / 10.0);
        for (now, then) in frame.height.iter().zip(&previous) {
            assert!(now >= then, "height decreased at blend {}", frame.blend);
        }
        previous = frame.height;
    }
}

#[test]
fn test_playback_follows_a_running_producer() {
    let registry = ModelRegistry::with_builtin();
    let mut driver = SimulationDriver::default();
    let mut queue = SnapshotQueue::default();
    let mut collector = ExportCollector::default();
    let drawing = DrawingParams::new(2, 10, 3).unwrap();
    let mut playback = PlaybackInterpolator::new(drawing.drawing_step);

    driver.start(&registry, request(4, drawing)).unwrap();

    let mut shown = Vec::new();
    let mut blends = Vec::new();
    let mut ticks = 0;
    while playback.state() != PlaybackState::Finished {
        ticks += 1;
        assert!(ticks < 100, "playback never finished");
        driver.tick(&mut queue, &mut collector);
        if let PlaybackTick::Frame(frame) = playback.tick(&mut queue) {
            if shown.last() != Some(&frame.after.step) {
                shown.push(frame.after.step);
            }
            blends.push(frame.blend);
            assert!((0.0..=1.0).contains(&frame.blend));
        }
    }

    // Every snapshot is shown, including those produced after playback began.
    assert_eq!(shown, vec![2, 4, 6, 8, 10]);
    assert_eq!(blends.last(), Some(&1.0));
    assert_eq!(playback.tick(&mut queue), PlaybackTick::Finished);
}

#[test]
fn test_finish_twice_matches_finish_once() {
    let registry = ModelRegistry::with_builtin();
    let mut driver = SimulationDriver::default();
    let mut queue = SnapshotQueue::default();
    let mut collector = ExportCollector::default();
    let mut playback = PlaybackInterpolator::new(2);

    driver
        .start(&registry, request(3, DrawingParams::new(1, 5, 2).unwrap()))
        .unwrap();
    for _ in 0..3 {
        driver.tick(&mut queue, &mut collector);
        playback.tick(&mut queue);
    }

    let teardown = |driver: &mut SimulationDriver, queue: &mut SnapshotQueue, playback: &mut PlaybackInterpolator| {
        driver.finish();
        queue.clear();
        playback.reset(0);
    };
    teardown(&mut driver, &mut queue, &mut playback);
    let once = (driver.state(), driver.step(), queue.len(), playback.state());
    teardown(&mut driver, &mut queue, &mut playback);
    let twice = (driver.state(), driver.step(), queue.len(), playback.state());

    assert_eq!(once, twice);
    assert_eq!(once, (DriverState::Idle, 0, 0, PlaybackState::Idle));
    assert!(driver.model().is_none());
    assert!(playback.cursor().is_none());
}

#[test]
fn test_export_writes_one_raster_per_snapshot() {
    let registry = ModelRegistry::with_builtin();
    let mut driver = SimulationDriver::default();
    let mut queue = SnapshotQueue::default();
    let mut collector = ExportCollector::default();
    let layout = driver
        .start(&registry, request(3, DrawingParams::new(2, 6, 1).unwrap()))
        .unwrap();
    run_to_drain(&mut driver, &mut queue, &mut collector);

    let dir = tempfile::tempdir().unwrap();
    let report = export_rasters(dir.path(), &collector, &layout.geo, layout.grid.resolution()).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written.len(), 3);

    for i in 0..3 {
        let text = std::fs::read_to_string(dir.path().join(format!("{i}.txt"))).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(RASTER_HEADER));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 16);
        assert!(rows.iter().all(|row| row.split('\t').count() == 5));
    }
}

#[test]
fn test_export_failures_are_per_file() {
    let mut collector = ExportCollector::default();
    for step in [1u64, 2, 3] {
        collector.record(Arc::new(Snapshot {
            step,
            vertices: vec![[0.0; 3]; 4],
            height: Field::from_vec(2, vec![step as f32; 4]),
            velocity: Field::from_vec(2, vec![[0.0; 2]; 4]),
        }));
    }

    let dir = tempfile::tempdir().unwrap();
    // A directory where the second file should go makes only that write fail.
    std::fs::create_dir(dir.path().join("1.txt")).unwrap();

    let grid = Grid::new(1, 1.0).unwrap();
    let report = export_rasters(dir.path(), &collector, &GeoTransform::local(&grid), 1).unwrap();
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(dir.path().join("0.txt").is_file());
    assert!(dir.path().join("2.txt").is_file());
}
