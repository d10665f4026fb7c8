use super::config::ExtractRange;
use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::{advance_istart, appended_path, frame_count};
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::models::trajectory::keys;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// `<input>_<begin>-<end>.<ext>`, in the input's format.
pub fn extracted_path(input: &Path, range: ExtractRange) -> PathBuf {
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    appended_path(input, &format!("_{}-{}", range.begin, range.end), &extension)
}

/// Copies frames `range.begin..range.end` of `input` into `output`.
///
/// A range reaching past the last frame is clamped with a warning; a range
/// starting past it is an error.
#[instrument(skip_all, name = "extract_workflow")]
pub fn run(
    input: &Path,
    range: ExtractRange,
    output: &Path,
    reporter: &ProgressReporter,
) -> Result<usize, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Extract" });
    let mut reader = TrajectoryReader::open(input)?;
    let mut header = reader.read_header()?;
    let nset = frame_count(&header);
    if range.begin >= nset {
        return Err(WorkflowError::InvalidArgument(format!(
            "frame {} is out of range for '{}' with {} frames",
            range.begin,
            input.display(),
            nset
        )));
    }
    let end = if range.end > nset {
        warn!(
            requested = range.end,
            available = nset,
            "Extraction range runs past the last frame; clamping."
        );
        nset
    } else {
        range.end
    };
    let count = end - range.begin;

    header.insert(keys::NSET, count);
    advance_istart(&mut header, range.begin);

    let mut writer = TrajectoryWriter::create(output)?;
    writer.write_header(&header)?;
    let task = reporter.frames(count);
    let mut next = reader.read_frame_at(range.begin)?;
    while let Some(snapshot) = next {
        writer.write_frame(&snapshot)?;
        task.tick();
        if writer.frames_written() == count {
            break;
        }
        next = reader.read_frame()?;
    }
    writer.finish()?;
    task.finish();

    let written = writer.frames_written();
    info!(
        input = %input.display(),
        output = %output.display(),
        begin = range.begin,
        end,
        "Extracted {} frames.",
        written
    );
    reporter.report(Progress::PhaseFinish);
    Ok(written)
}
