use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::{frame_count, particle_count};
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::math::bestfit::BestFit;
use crate::core::math::geometry::Vector3;
use crate::core::models::snapshot::{ParticleCountMismatch, Snapshot};
use crate::core::models::trajectory::keys;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info, instrument};

fn check_len(path: &Path, expected: usize, snapshot: &Snapshot) -> Result<(), WorkflowError> {
    if snapshot.len() != expected {
        return Err(WorkflowError::particle_count(
            path,
            ParticleCountMismatch {
                expected,
                found: snapshot.len(),
            },
        ));
    }
    Ok(())
}

/// Replaces every window of `window` consecutive frames with its average,
/// giving `nset - window + 1` output frames. Each output frame keeps the
/// metadata of the first frame of its window.
#[instrument(skip_all, name = "running_average_workflow")]
pub fn running_average(
    input: &Path,
    output: &Path,
    window: usize,
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    if window == 0 {
        return Err(WorkflowError::InvalidArgument(
            "running average window must be at least 1".to_string(),
        ));
    }
    reporter.report(Progress::PhaseStart {
        name: "Running average",
    });
    let mut reader = TrajectoryReader::open(input)?;
    let mut header = reader.read_header()?;
    let nset = frame_count(&header);
    if nset < window {
        return Err(WorkflowError::InvalidArgument(format!(
            "window of {} frames is longer than '{}' ({} frames)",
            window,
            input.display(),
            nset
        )));
    }
    header.insert(keys::NSET, nset - window + 1);

    let mut writer = TrajectoryWriter::create(output)?;
    writer.write_header(&header)?;
    let task = reporter.frames(nset);
    let mut frames: VecDeque<Snapshot> = VecDeque::with_capacity(window + 1);
    let mut sums: Vec<Vector3> = Vec::new();
    while let Some(snapshot) = reader.read_frame()? {
        if sums.is_empty() {
            sums = vec![Vector3::zeros(); snapshot.len()];
        }
        check_len(input, sums.len(), &snapshot)?;
        for (sum, particle) in sums.iter_mut().zip(snapshot.iter()) {
            *sum += particle.position;
        }
        frames.push_back(snapshot);
        if frames.len() > window {
            if let Some(leaving) = frames.pop_front() {
                for (sum, particle) in sums.iter_mut().zip(leaving.iter()) {
                    *sum -= particle.position;
                }
            }
        }
        if frames.len() == window {
            if let Some(first) = frames.front() {
                let mut averaged = first.clone();
                let positions: Vec<Vector3> =
                    sums.iter().map(|sum| sum / window as f64).collect();
                averaged
                    .set_positions(&positions)
                    .map_err(|mismatch| WorkflowError::particle_count(input, mismatch))?;
                writer.write_frame(&averaged)?;
            }
        }
        task.tick();
    }
    writer.finish()?;
    task.finish();

    let written = writer.frames_written();
    info!(
        input = %input.display(),
        output = %output.display(),
        window,
        frames = written,
        "Wrote running average."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(written)
}

/// Average structure over all frames of `input`.
///
/// With `superpose`, every frame is first fitted onto the first frame so that
/// rigid-body motion does not blur the average. The result keeps the
/// metadata of the first frame.
#[instrument(skip_all, name = "mean_structure")]
pub fn mean_structure(
    input: &Path,
    superpose: bool,
    reporter: &ProgressReporter,
) -> Result<Snapshot, WorkflowError> {
    let mut reader = TrajectoryReader::open(input)?;
    let header = reader.read_header()?;
    let first = reader
        .read_frame()?
        .ok_or_else(|| WorkflowError::EmptyTrajectory {
            path: input.to_path_buf(),
        })?;
    let nparticle = particle_count(&header).unwrap_or(first.len());
    check_len(input, nparticle, &first)?;

    let best_fit = if superpose {
        Some(BestFit::with_reference(&first.positions())?)
    } else {
        None
    };

    let task = reporter.frames(frame_count(&header));
    let mut sums = first.positions();
    let mut count = 1usize;
    task.tick();
    while let Some(snapshot) = reader.read_frame()? {
        check_len(input, nparticle, &snapshot)?;
        let positions = match &best_fit {
            Some(best_fit) => best_fit.fit(&snapshot.positions())?,
            None => snapshot.positions(),
        };
        for (sum, position) in sums.iter_mut().zip(&positions) {
            *sum += position;
        }
        count += 1;
        task.tick();
    }
    task.finish();
    debug!(frames = count, superpose, "Accumulated mean structure.");

    let mut mean = first;
    let positions: Vec<Vector3> = sums.iter().map(|sum| sum / count as f64).collect();
    mean.set_positions(&positions)
        .map_err(|mismatch| WorkflowError::particle_count(input, mismatch))?;
    Ok(mean)
}

/// Writes the mean structure of `input` as a single-frame file at `output`.
#[instrument(skip_all, name = "mean_workflow")]
pub fn mean(
    input: &Path,
    output: &Path,
    superpose: bool,
    reporter: &ProgressReporter,
) -> Result<Snapshot, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Mean" });
    let structure = mean_structure(input, superpose, reporter)?;

    let mut header = TrajectoryReader::open(input)?.read_header()?;
    header.insert(keys::NSET, 1usize);
    let mut writer = TrajectoryWriter::create(output)?;
    writer.write_header(&header)?;
    writer.write_frame(&structure)?;
    writer.finish()?;

    info!(
        input = %input.display(),
        output = %output.display(),
        superpose,
        "Wrote mean structure."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(structure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::format::{read_trajectory, write_trajectory};
    use crate::core::math::geometry::rotation_from_axis_angle;
    use crate::core::models::attributes::AttributeMap;
    use crate::core::models::trajectory::Trajectory;
    use crate::workflows::testing::write_ramp;
    use tempfile::tempdir;

    #[test]
    fn running_average_emits_one_frame_per_full_window() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        let output = dir.path().join("smooth.dcd");
        write_ramp(&input, 5, 3);

        let written = running_average(&input, &output, 3, &ProgressReporter::new()).unwrap();
        assert_eq!(written, 3);
        let smooth = read_trajectory(&output).unwrap();
        assert_eq!(smooth.nset(), Some(3));
        // window k..k+3 averages x shifts k, k+1, k+2
        for k in 0..3 {
            assert!((smooth[k][0].position.x - (k as f64 + 1.0)).abs() < 1e-5);
            assert!((smooth[k][2].position.y - 4.0).abs() < 1e-5);
        }
    }

    #[test]
    fn running_average_rejects_bad_windows() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        write_ramp(&input, 2, 1);
        let output = dir.path().join("out.dcd");

        for window in [0, 3] {
            let err = running_average(&input, &output, window, &ProgressReporter::new())
                .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidArgument(_)));
        }
    }

    #[test]
    fn mean_without_superposition_is_the_arithmetic_mean() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        let output = dir.path().join("mean.xyz");
        write_ramp(&input, 4, 2);

        let structure = mean(&input, &output, false, &ProgressReporter::new()).unwrap();
        assert!((structure[1].position - Vector3::new(2.5, 2.0, -1.5)).norm() < 1e-6);
        let written = read_trajectory(&output).unwrap();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn mean_with_superposition_removes_rigid_rotation() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("spin.trr");
        let cloud = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(-1.0, -1.0, 0.5),
        ];
        let snapshots = (0..3)
            .map(|k| {
                let axis = Vector3::new(1.0, 1.0, 0.0);
                let rotation = rotation_from_axis_angle(&axis, 40.0 * k as f64);
                let moved: Vec<Vector3> = cloud.iter().map(|p| rotation * p).collect();
                Snapshot::from_positions(&moved)
            })
            .collect();
        let trajectory = Trajectory::from_snapshots(AttributeMap::new(), snapshots);
        write_trajectory(&input, &trajectory).unwrap();

        let structure = mean_structure(&input, true, &ProgressReporter::new()).unwrap();
        for (averaged, original) in structure.iter().zip(&cloud) {
            assert!((averaged.position - original).norm() < 1e-4);
        }
    }

    #[test]
    fn mean_of_an_empty_file_is_an_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.xyz");
        std::fs::write(&input, "").unwrap();
        let err = mean_structure(&input, false, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::EmptyTrajectory { .. }));
    }
}
