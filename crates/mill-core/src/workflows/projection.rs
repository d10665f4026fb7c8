use super::average::mean_structure;
use super::error::WorkflowError;
use super::frame_count;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::format::TrajectoryReader;
use crate::core::io::traits::ReadTrajectory;
use crate::core::math::geometry::Vector3;
use crate::core::models::snapshot::ParticleCountMismatch;
use std::path::Path;
use tracing::{info, instrument};

/// Per-particle displacement directions, normalized over all 3N components.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    vectors: Vec<Vector3>,
}

impl Mode {
    pub fn new(vectors: Vec<Vector3>) -> Result<Self, WorkflowError> {
        let norm = vectors.iter().map(Vector3::norm_squared).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(WorkflowError::InvalidArgument(
                "mode vector has zero length".to_string(),
            ));
        }
        Ok(Self {
            vectors: vectors.into_iter().map(|v| v / norm).collect(),
        })
    }

    /// Reads the first frame of `path`; each particle position is taken as
    /// that particle's mode component.
    pub fn from_file(path: &Path) -> Result<Self, WorkflowError> {
        let frame = TrajectoryReader::open(path)?
            .read_frame()?
            .ok_or_else(|| WorkflowError::EmptyTrajectory {
                path: path.to_path_buf(),
            })?;
        Self::new(frame.positions())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Scalar projection of `positions - origin` onto the mode.
    pub fn project(
        &self,
        positions: &[Vector3],
        origin: &[Vector3],
    ) -> Result<f64, ParticleCountMismatch> {
        for found in [positions.len(), origin.len()] {
            if found != self.vectors.len() {
                return Err(ParticleCountMismatch {
                    expected: self.vectors.len(),
                    found,
                });
            }
        }
        Ok(self
            .vectors
            .iter()
            .zip(positions.iter().zip(origin))
            .map(|(mode, (x, x0))| mode.dot(&(x - x0)))
            .sum())
    }
}

/// Projects every frame's displacement from the mean structure onto the mode
/// read from `mode_file`.
///
/// Returns one value per frame; with `table`, also writes them as CSV with
/// the columns `frame,projection`.
#[instrument(skip_all, name = "projection_workflow")]
pub fn run(
    input: &Path,
    mode_file: &Path,
    table: Option<&Path>,
    reporter: &ProgressReporter,
) -> Result<Vec<f64>, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Projection" });
    let mode = Mode::from_file(mode_file)?;
    let mean = mean_structure(input, false, reporter)?.positions();
    if mean.len() != mode.len() {
        return Err(WorkflowError::ParticleCountMismatch {
            path: mode_file.to_path_buf(),
            expected: mean.len(),
            found: mode.len(),
        });
    }

    let mut reader = TrajectoryReader::open(input)?;
    let header = reader.read_header()?;
    let task = reporter.frames(frame_count(&header));
    let mut values = Vec::with_capacity(frame_count(&header));
    while let Some(snapshot) = reader.read_frame()? {
        let value = mode
            .project(&snapshot.positions(), &mean)
            .map_err(|mismatch| WorkflowError::particle_count(input, mismatch))?;
        values.push(value);
        task.tick();
    }
    task.finish();

    if let Some(table) = table {
        let mut writer = csv::Writer::from_path(table)?;
        writer.write_record(["frame", "projection"])?;
        for (frame, value) in values.iter().enumerate() {
            writer.write_record([frame.to_string(), format!("{:.6}", value)])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        info!(table = %table.display(), "Wrote projection table.");
    }

    info!(
        input = %input.display(),
        mode = %mode_file.display(),
        frames = values.len(),
        "Projected trajectory onto mode."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::format::write_trajectory;
    use crate::core::models::attributes::AttributeMap;
    use crate::core::models::snapshot::Snapshot;
    use crate::core::models::trajectory::Trajectory;
    use crate::workflows::testing::write_ramp;
    use std::fs;
    use tempfile::tempdir;

    fn write_single(path: &Path, positions: &[Vector3]) {
        let snapshots = vec![Snapshot::from_positions(positions)];
        let trajectory = Trajectory::from_snapshots(AttributeMap::new(), snapshots);
        write_trajectory(path, &trajectory).unwrap();
    }

    #[test]
    fn mode_is_normalized_over_all_components() {
        let mode = Mode::new(vec![Vector3::new(3.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 0.0)])
            .unwrap();
        let positions = [Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()];
        let value = mode.project(&positions, &[Vector3::zeros(); 2]).unwrap();
        assert!((value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn zero_mode_is_rejected() {
        let err = Mode::new(vec![Vector3::zeros(); 3]).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidArgument(_)));
    }

    #[test]
    fn projection_tracks_motion_along_the_mode() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        let mode_file = dir.path().join("mode.xyz");
        let table = dir.path().join("projection.csv");
        // frames move every particle by +1 in x and -1 in z per step
        write_ramp(&input, 3, 2);
        write_single(&mode_file, &[Vector3::x(), Vector3::x()]);

        let reporter = ProgressReporter::new();
        let values = run(&input, &mode_file, Some(table.as_path()), &reporter).unwrap();
        let step = 2f64.sqrt();
        let expected = [-step, 0.0, step];
        assert_eq!(values.len(), 3);
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-5, "{value} vs {expected}");
        }

        let text = fs::read_to_string(&table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "frame,projection");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("2,1.414"));
    }

    #[test]
    fn projection_requires_matching_mode_size() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        let mode_file = dir.path().join("mode.xyz");
        write_ramp(&input, 2, 3);
        write_single(&mode_file, &[Vector3::x()]);

        let err = run(&input, &mode_file, None, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ParticleCountMismatch {
                expected: 3,
                found: 1,
                ..
            }
        ));
    }
}
