use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::{frame_count, particle_count};
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::models::attributes::AttributeMap;
use crate::core::models::trajectory::keys;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Concatenates `inputs` in order into `output`.
///
/// Every input is opened and its header checked before `output` is created,
/// so a particle-count mismatch never leaves a partial file behind. The
/// output header is the first input's header with `nset` summed.
#[instrument(skip_all, name = "join_workflow")]
pub fn run(
    output: &Path,
    inputs: &[PathBuf],
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    if inputs.is_empty() {
        return Err(WorkflowError::InvalidArgument(
            "join needs at least one input trajectory".to_string(),
        ));
    }
    reporter.report(Progress::PhaseStart { name: "Join" });

    let mut sources: Vec<(&PathBuf, TrajectoryReader)> = Vec::with_capacity(inputs.len());
    let mut header = AttributeMap::new();
    let mut expected_particles = None;
    let mut total = 0;
    for (index, path) in inputs.iter().enumerate() {
        let mut reader = TrajectoryReader::open(path)?;
        let input_header = reader.read_header()?;
        if let Some(found) = particle_count(&input_header) {
            match expected_particles {
                None => expected_particles = Some(found),
                Some(expected) if expected != found => {
                    return Err(WorkflowError::ParticleCountMismatch {
                        path: path.clone(),
                        expected,
                        found,
                    });
                }
                Some(_) => {}
            }
        }
        total += frame_count(&input_header);
        if index == 0 {
            header = input_header;
        }
        sources.push((path, reader));
    }
    header.insert(keys::NSET, total);

    let mut writer = TrajectoryWriter::create(output)?;
    writer.write_header(&header)?;
    let task = reporter.frames(total);
    for (path, reader) in &mut sources {
        debug!(path = %path.display(), "Appending frames.");
        while let Some(snapshot) = reader.read_frame()? {
            writer.write_frame(&snapshot)?;
            task.tick();
        }
    }
    writer.finish()?;
    task.finish();

    let written = writer.frames_written();
    info!(
        output = %output.display(),
        inputs = inputs.len(),
        frames = written,
        "Joined trajectories."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(written)
}
