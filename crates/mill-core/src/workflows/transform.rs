use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::stream_frames;
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::ReadTrajectory;
use crate::core::math::geometry::{Matrix3, Vector3, rotation_from_axis_angle};
use crate::core::models::particle::Particle;
use crate::core::models::snapshot::Snapshot;
use crate::core::utils::LookupError;
use crate::core::utils::elements::{element_from_atom_name, element_mass};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Translation {
    /// Adds a fixed vector to every particle.
    By(Vector3),
    /// Moves each frame so that its mass-weighted center lies at the origin.
    CenterOfMass,
}

pub fn translate_snapshot(snapshot: &mut Snapshot, offset: &Vector3) {
    for particle in snapshot.particles_mut() {
        particle.position += offset;
    }
}

/// Rotates every particle about the origin.
pub fn rotate_snapshot(snapshot: &mut Snapshot, rotation: &Matrix3) {
    for particle in snapshot.particles_mut() {
        particle.position = rotation * particle.position;
    }
}

fn mass_of(particle: &Particle) -> Result<f64, LookupError> {
    match particle.element() {
        Some(symbol) => element_mass(symbol),
        None => {
            let name = particle.name().unwrap_or("");
            let symbol = element_from_atom_name(name)
                .ok_or_else(|| LookupError::UnknownElement(name.to_string()))?;
            element_mass(&symbol)
        }
    }
}

/// Mass-weighted center of `snapshot`. Masses come from each particle's
/// element, or from its atom name when no element is recorded.
pub fn center_of_mass(snapshot: &Snapshot) -> Result<Vector3, WorkflowError> {
    if snapshot.is_empty() {
        return Err(WorkflowError::InvalidArgument(
            "cannot take the center of mass of an empty frame".to_string(),
        ));
    }
    let mut weighted = Vector3::zeros();
    let mut total = 0.0;
    for particle in snapshot {
        let mass = mass_of(particle)?;
        weighted += particle.position * mass;
        total += mass;
    }
    Ok(weighted / total)
}

#[instrument(skip_all, name = "translate_workflow")]
pub fn translate(
    input: &Path,
    output: &Path,
    translation: Translation,
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Translate" });
    let mut reader = TrajectoryReader::open(input)?;
    let header = reader.read_header()?;
    let mut writer = TrajectoryWriter::create(output)?;
    let frames = stream_frames(&mut reader, &mut writer, &header, reporter, |snapshot| {
        let offset = match translation {
            Translation::By(offset) => offset,
            Translation::CenterOfMass => -center_of_mass(snapshot)?,
        };
        translate_snapshot(snapshot, &offset);
        Ok(())
    })?;
    info!(
        input = %input.display(),
        output = %output.display(),
        frames,
        ?translation,
        "Translated trajectory."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(frames)
}

/// Rotates every frame by `degrees` about `axis` through the origin.
#[instrument(skip_all, name = "rotate_workflow")]
pub fn rotate(
    input: &Path,
    output: &Path,
    axis: &Vector3,
    degrees: f64,
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    if axis.norm() == 0.0 {
        return Err(WorkflowError::InvalidArgument(
            "rotation axis must not be the zero vector".to_string(),
        ));
    }
    reporter.report(Progress::PhaseStart { name: "Rotate" });
    let rotation = rotation_from_axis_angle(axis, degrees);
    let mut reader = TrajectoryReader::open(input)?;
    let header = reader.read_header()?;
    let mut writer = TrajectoryWriter::create(output)?;
    let frames = stream_frames(&mut reader, &mut writer, &header, reporter, |snapshot| {
        rotate_snapshot(snapshot, &rotation);
        Ok(())
    })?;
    info!(
        input = %input.display(),
        output = %output.display(),
        frames,
        degrees,
        "Rotated trajectory."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::format::read_trajectory;
    use crate::core::models::particle::keys;
    use crate::workflows::testing::write_ramp;
    use tempfile::tempdir;

    #[test]
    fn center_of_mass_weights_by_element() {
        let mut snapshot =
            Snapshot::from_positions(&[Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)]);
        snapshot.particles_mut()[0].attributes.insert(keys::ELEMENT, "O");
        snapshot.particles_mut()[1].attributes.insert(keys::NAME, "H1");

        let center = center_of_mass(&snapshot).unwrap();
        let expected = 1.008 / (15.999 + 1.008);
        assert!((center.x - expected).abs() < 1e-12);
    }

    #[test]
    fn center_of_mass_needs_a_known_element() {
        let snapshot = Snapshot::from_positions(&[Vector3::zeros()]);
        let err = center_of_mass(&snapshot).unwrap_err();
        assert!(matches!(err, WorkflowError::Lookup(LookupError::UnknownElement(_))));
    }

    #[test]
    fn rotate_snapshot_turns_x_into_y_about_z() {
        let mut snapshot = Snapshot::from_positions(&[Vector3::x()]);
        rotate_snapshot(&mut snapshot, &rotation_from_axis_angle(&Vector3::z(), 90.0));
        assert!((snapshot[0].position - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn translate_workflow_shifts_every_frame() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        let output = dir.path().join("shifted.dcd");
        write_ramp(&input, 3, 2);

        let frames = translate(
            &input,
            &output,
            Translation::By(Vector3::new(1.0, -1.0, 0.5)),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(frames, 3);
        let shifted = read_trajectory(&output).unwrap();
        assert!((shifted[2][1].position - Vector3::new(4.0, 1.0, -1.5)).norm() < 1e-5);
    }

    #[test]
    fn rotate_workflow_rejects_a_zero_axis() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.dcd");
        write_ramp(&input, 1, 1);
        let err = rotate(
            &input,
            &dir.path().join("out.dcd"),
            &Vector3::zeros(),
            30.0,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidArgument(_)));
    }

    #[test]
    fn rotate_workflow_applies_the_same_rotation_to_all_frames() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("traj.xyz");
        let output = dir.path().join("turned.xyz");
        write_ramp(&input, 2, 2);

        rotate(&input, &output, &Vector3::z(), 180.0, &ProgressReporter::new()).unwrap();
        let turned = read_trajectory(&output).unwrap();
        // frame 1, particle 1 sits at (2, 2, -1)
        assert!((turned[1][1].position - Vector3::new(-2.0, -2.0, -1.0)).norm() < 1e-6);
    }
}
