use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::{appended_path, particle_count, stream_frames};
use crate::core::io::format::{TrajectoryFormat, TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::ReadTrajectory;
use crate::core::models::attributes::AttributeMap;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::trajectory::keys;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Header fields that describe the file itself and are never taken from a reference.
const STRUCTURAL_KEYS: [&str; 3] = [keys::NSET, keys::NPARTICLE, keys::HAS_UNIT_CELL];

/// `<input>_converted.<ext>` for the target format.
pub fn converted_path(input: &Path, format: TrajectoryFormat) -> PathBuf {
    appended_path(input, "_converted", format.extension())
}

struct Reference {
    header: AttributeMap,
    first_frame: Snapshot,
}

fn load_reference(path: &Path) -> Result<Reference, WorkflowError> {
    let mut reader = TrajectoryReader::open(path)?;
    let mut header = reader.read_header()?;
    for key in STRUCTURAL_KEYS {
        header.remove(key);
    }
    let first_frame = reader
        .read_frame()?
        .ok_or_else(|| WorkflowError::EmptyTrajectory {
            path: path.to_path_buf(),
        })?;
    Ok(Reference {
        header,
        first_frame,
    })
}

/// Converts `input` into `format` next to it and returns the output path.
pub fn run(
    input: &Path,
    format: TrajectoryFormat,
    reference: Option<&Path>,
    reporter: &ProgressReporter,
) -> Result<PathBuf, WorkflowError> {
    let output = converted_path(input, format);
    convert(input, &output, format, reference, reporter)?;
    Ok(output)
}

/// Rewrites every frame of `input` into `output` using `format`.
///
/// With a `reference`, per-particle metadata missing from the input (names,
/// residues, elements) is filled in from the reference's first frame, and
/// descriptive header fields are merged the same way. Positions always come
/// from the input.
#[instrument(skip_all, name = "convert_workflow")]
pub fn convert(
    input: &Path,
    output: &Path,
    format: TrajectoryFormat,
    reference: Option<&Path>,
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Convert" });
    let mut reader = TrajectoryReader::open(input)?;
    let mut header = reader.read_header()?;

    let reference = reference.map(load_reference).transpose()?;
    if let Some(reference) = &reference {
        if let Some(expected) = particle_count(&header) {
            if expected != reference.first_frame.len() {
                return Err(WorkflowError::ParticleCountMismatch {
                    path: input.to_path_buf(),
                    expected: reference.first_frame.len(),
                    found: expected,
                });
            }
        }
        header.merge_missing_from(&reference.header);
    }

    let mut writer = TrajectoryWriter::create_as(output, format)?;
    let frames = stream_frames(&mut reader, &mut writer, &header, reporter, |snapshot| {
        if let Some(reference) = &reference {
            snapshot
                .merge_particle_attributes_from(&reference.first_frame)
                .map_err(|mismatch| WorkflowError::particle_count(input, mismatch))?;
        }
        Ok(())
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        format = %format,
        frames,
        "Converted trajectory."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(frames)
}
