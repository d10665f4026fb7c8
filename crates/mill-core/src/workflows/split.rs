use super::config::SplitConfig;
use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use super::{advance_istart, frame_count, sibling_path};
use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::models::trajectory::keys;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// `<stem>_<index>.<ext>` next to `input`; indices start at 0.
pub fn split_path(input: &Path, index: usize) -> PathBuf {
    sibling_path(input, &format!("_{}", index))
}

/// Cuts `config.input` into consecutive files of `frames_per_file` frames;
/// the last file holds the remainder. Returns the written paths in order.
#[instrument(skip_all, name = "split_workflow")]
pub fn run(
    config: &SplitConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<PathBuf>, WorkflowError> {
    reporter.report(Progress::PhaseStart { name: "Split" });
    let mut reader = TrajectoryReader::open(&config.input)?;
    let header = reader.read_header()?;
    let nset = frame_count(&header);

    let mut pending = reader.read_frame()?;
    if pending.is_none() {
        return Err(WorkflowError::EmptyTrajectory {
            path: config.input.clone(),
        });
    }

    let task = reporter.frames(nset);
    let mut outputs = Vec::new();
    let mut consumed = 0;
    while let Some(first) = pending.take() {
        let path = split_path(&config.input, outputs.len());
        let mut part_header = header.clone();
        let planned = if nset > consumed {
            (nset - consumed).min(config.frames_per_file)
        } else {
            config.frames_per_file
        };
        part_header.insert(keys::NSET, planned);
        advance_istart(&mut part_header, consumed);

        let mut writer = TrajectoryWriter::create(&path)?;
        writer.write_header(&part_header)?;
        writer.write_frame(&first)?;
        task.tick();
        while writer.frames_written() < config.frames_per_file {
            match reader.read_frame()? {
                Some(snapshot) => {
                    writer.write_frame(&snapshot)?;
                    task.tick();
                }
                None => break,
            }
        }
        writer.finish()?;
        consumed += writer.frames_written();
        debug!(path = %path.display(), frames = writer.frames_written(), "Wrote part.");
        outputs.push(path);
        pending = reader.read_frame()?;
    }
    task.finish();

    info!(
        input = %config.input.display(),
        parts = outputs.len(),
        frames = consumed,
        "Split trajectory."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(outputs)
}
