//! Raw snapshot history and its rasterized text dump.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bevy::log::{error, info};
use bevy::prelude::Resource;

use crate::error::ExportError;
use crate::grid::{raster_rows, GeoTransform};
use crate::simulation::Snapshot;

pub const RASTER_HEADER: &str = "X\tY\tDepth\tVx\tVy";

/// Every snapshot captured during the current run, in capture order.
#[derive(Resource, Default, Debug)]
pub struct ExportCollector {
    snapshots: Vec<Arc<Snapshot>>,
}

impl ExportCollector {
    pub fn record(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn snapshots(&self) -> &[Arc<Snapshot>] {
        &self.snapshots
    }

    /// Raw (non-interpolated) water heights, one entry per captured step.
    pub fn water_height_list(&self) -> Vec<&[f32]> {
        self.snapshots.iter().map(|s| s.height.as_slice()).collect()
    }

    /// Raw velocities, one entry per captured step.
    pub fn water_velocity_list(&self) -> Vec<&[[f32; 2]]> {
        self.snapshots.iter().map(|s| s.velocity.as_slice()).collect()
    }
}

/// Outcome of an export: each file either made it or has its own error.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportError>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Render one snapshot as tab-separated rows, south row first.
pub fn raster_text(snapshot: &Snapshot, geo: &GeoTransform, resolution: usize) -> String {
    let rows = raster_rows(
        snapshot.height.as_slice(),
        snapshot.velocity.as_slice(),
        geo,
        resolution,
    );
    let mut text = String::with_capacity(rows.len() * 48);
    text.push_str(RASTER_HEADER);
    text.push('\n');
    for row in rows {
        // Writing into a String cannot fail.
        let _ = writeln!(text, "{}\t{}\t{}\t{}\t{}", row.x, row.y, row.depth, row.vx, row.vy);
    }
    text
}

/// Write `<i>.txt` for every collected snapshot into `dir`.
///
/// Files are attempted independently, so one failed write does not stop the
/// rest. Only an empty collector is an error for the whole export.
pub fn export_rasters(
    dir: &Path,
    collector: &ExportCollector,
    geo: &GeoTransform,
    resolution: usize,
) -> Result<ExportReport, ExportError> {
    if collector.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut report = ExportReport::default();
    for (i, snapshot) in collector.snapshots().iter().enumerate() {
        let path = dir.join(format!("{i}.txt"));
        match std::fs::write(&path, raster_text(snapshot, geo, resolution)) {
            Ok(()) => {
                info!("exported step {} to {}", snapshot.step, path.display());
                report.written.push(path);
            }
            Err(source) => {
                error!("failed to export step {} to {}: {source}", snapshot.step, path.display());
                report.failures.push(ExportError::Write { path, source });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Field;

    fn snapshot(step: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            step,
            vertices: vec![[0.0; 3]; 4],
            height: Field::from_vec(2, vec![0.0, 0.5, 1.0, 1.5]),
            velocity: Field::from_vec(2, vec![[0.0, 0.0], [1.0, 0.0], [0.0, -1.0], [2.0, 2.0]]),
        })
    }

    fn geo() -> GeoTransform {
        GeoTransform {
            origin_x: 10.0,
            origin_y: 4.0,
            pixel_width: 2.0,
            pixel_height: -2.0,
        }
    }

    #[test]
    fn raster_text_has_header_and_one_row_per_vertex() {
        let text = raster_text(&snapshot(1), &geo(), 1);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], RASTER_HEADER);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "10\t2\t0\t0\t0");
        assert_eq!(lines[4], "12\t4\t1.5\t2\t2");
    }

    #[test]
    fn history_lists_follow_capture_order() {
        let mut collector = ExportCollector::default();
        collector.record(snapshot(200));
        collector.record(snapshot(400));
        assert_eq!(collector.water_height_list().len(), 2);
        assert_eq!(collector.water_velocity_list()[1][3], [2.0, 2.0]);
        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn empty_collector_is_an_error() {
        let dir = Path::new(".");
        assert!(matches!(
            export_rasters(dir, &ExportCollector::default(), &geo(), 1),
            Err(ExportError::NothingToExport)
        ));
    }
}
