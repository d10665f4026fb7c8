use super::config::ImposeConfig;
use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::stream_frames;
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::ReadTrajectory;
use crate::core::math::bestfit::BestFit;
use crate::core::math::error::MathError;
use crate::core::math::geometry::Vector3;
use crate::core::models::snapshot::ParticleCountMismatch;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImposeSummary {
    pub frames: usize,
    /// Largest RMSD over the fitted particles, measured before superposition.
    pub max_rmsd: f64,
}

fn select(positions: &[Vector3], indices: &[usize]) -> Vec<Vector3> {
    indices.iter().map(|&i| positions[i]).collect()
}

/// Superposes every frame of `config.input` onto the reference frame and
/// writes the moved frames to `config.output`.
///
/// The rotation and translation are computed from the particles outside the
/// excluded ranges and then applied to all particles of the frame.
#[instrument(skip_all, name = "impose_workflow")]
pub fn run(
    config: &ImposeConfig,
    reporter: &ProgressReporter,
) -> Result<ImposeSummary, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Impose" });
    let mut reader = TrajectoryReader::open(&config.input)?;
    let header = reader.read_header()?;

    let reference = reader
        .read_frame_at(config.reference_frame)?
        .ok_or_else(|| {
            WorkflowError::InvalidArgument(format!(
                "reference frame {} does not exist in '{}'",
                config.reference_frame,
                config.input.display()
            ))
        })?;
    let nparticle = reference.len();
    let fitted: Vec<usize> = (0..nparticle).filter(|&i| config.is_fitted(i)).collect();
    if fitted.is_empty() {
        return Err(MathError::EmptyPointCloud.into());
    }
    debug!(
        reference_frame = config.reference_frame,
        fitted = fitted.len(),
        excluded = nparticle - fitted.len(),
        "Prepared reference structure."
    );
    let best_fit = BestFit::with_reference(&select(&reference.positions(), &fitted))?;

    reader.rewind()?;
    let mut writer = TrajectoryWriter::create(&config.output)?;
    let mut max_rmsd: f64 = 0.0;
    let frames = stream_frames(&mut reader, &mut writer, &header, reporter, |snapshot| {
        if snapshot.len() != nparticle {
            return Err(WorkflowError::particle_count(
                &config.input,
                ParticleCountMismatch {
                    expected: nparticle,
                    found: snapshot.len(),
                },
            ));
        }
        let positions = snapshot.positions();
        let subset = select(&positions, &fitted);
        max_rmsd = max_rmsd.max(best_fit.rmsd(&subset)?);
        let superposition = best_fit.superposition(&subset)?;
        snapshot
            .set_positions(&superposition.apply_all(&positions))
            .map_err(|mismatch| WorkflowError::particle_count(&config.input, mismatch))
    })?;

    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        frames,
        max_rmsd,
        "Imposed trajectory onto frame {}.",
        config.reference_frame
    );
    reporter.report(Progress::PhaseFinish);
    Ok(ImposeSummary { frames, max_rmsd })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::format::{read_trajectory, write_trajectory};
    use crate::core::math::geometry::{calculate_rmsd, rotation_from_axis_angle};
    use crate::core::models::attributes::AttributeMap;
    use crate::core::models::snapshot::Snapshot;
    use crate::core::models::trajectory::Trajectory;
    use crate::workflows::config::{ExclusionRange, ImposeConfigBuilder};
    use std::path::Path;
    use tempfile::tempdir;

    fn reference_cloud() -> Vec<Vector3> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.5, 0.0, 0.0),
            Vector3::new(1.5, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 1.0),
            Vector3::new(0.5, 1.0, 3.0),
            Vector3::new(2.0, -1.0, 0.5),
        ]
    }

    /// Frame 0 is the reference; frame k is rotated by 20k degrees about z and
    /// shifted. The last particle is additionally displaced in frames k > 0.
    fn write_moving_trajectory(path: &Path, frames: usize, wobble_last: bool) {
        let reference = reference_cloud();
        let snapshots = (0..frames)
            .map(|k| {
                let rotation = rotation_from_axis_angle(&Vector3::z(), 20.0 * k as f64);
                let shift = Vector3::new(k as f64, -2.0 * k as f64, 0.5);
                let mut moved: Vec<Vector3> =
                    reference.iter().map(|p| rotation * p + shift).collect();
                if wobble_last && k > 0 {
                    moved[5] += Vector3::new(0.0, 0.0, 4.0);
                }
                Snapshot::from_positions(&moved)
            })
            .collect();
        let trajectory = Trajectory::from_snapshots(AttributeMap::new(), snapshots);
        write_trajectory(path, &trajectory).unwrap();
    }

    #[test]
    fn impose_brings_every_frame_back_onto_the_reference() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("moving.trr");
        let output = dir.path().join("imposed.trr");
        write_moving_trajectory(&input, 4, false);

        let config = ImposeConfigBuilder::new()
            .input(&input)
            .output(&output)
            .build()
            .unwrap();
        let summary = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(summary.frames, 4);
        assert!(summary.max_rmsd < 1e-3);

        let imposed = read_trajectory(&output).unwrap();
        let target = imposed[0].positions();
        for snapshot in &imposed {
            let rmsd = calculate_rmsd(&snapshot.positions(), &target).unwrap();
            assert!(rmsd < 1e-3, "rmsd {rmsd}");
        }
    }

    #[test]
    fn excluded_particles_do_not_steer_the_fit() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("wobble.trr");
        let output = dir.path().join("wobble_imposed.trr");
        write_moving_trajectory(&input, 3, true);

        let config = ImposeConfigBuilder::new()
            .input(&input)
            .output(&output)
            .exclude(ExclusionRange::new(5, 5).unwrap())
            .build()
            .unwrap();
        run(&config, &ProgressReporter::new()).unwrap();

        let imposed = read_trajectory(&output).unwrap();
        let target = imposed[0].positions();
        for snapshot in &imposed {
            let positions = snapshot.positions();
            let core_rmsd = calculate_rmsd(&positions[..5], &target[..5]).unwrap();
            assert!(core_rmsd < 1e-3, "core rmsd {core_rmsd}");
        }
        // the wobbling particle is carried along with the rigid core
        let last = imposed[2][5].position - imposed[0][5].position;
        assert!((last.norm() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn impose_with_every_particle_excluded_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("moving.trr");
        write_moving_trajectory(&input, 2, false);

        let config = ImposeConfigBuilder::new()
            .input(&input)
            .output(dir.path().join("never.trr"))
            .exclude(ExclusionRange::new(0, 10).unwrap())
            .build()
            .unwrap();
        let err = run(&config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::Math(MathError::EmptyPointCloud)));
    }

    #[test]
    fn impose_rejects_a_missing_reference_frame() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("moving.trr");
        write_moving_trajectory(&input, 2, false);

        let config = ImposeConfigBuilder::new()
            .input(&input)
            .output(dir.path().join("never.trr"))
            .reference_frame(7)
            .build()
            .unwrap();
        let err = run(&config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidArgument(_)));
    }
}
