//! # Workflows Module
//!
//! Trajectory-level operations built on the format-polymorphic readers and
//! writers of [`crate::core::io::format`] and on the best-fit engine.
//!
//! Every workflow streams frames one at a time from an input file into an
//! output file; none of them loads a whole trajectory into memory except
//! where the result depends on all frames at once.
//!
//! - [`convert`] - change format, optionally merging metadata from a reference
//! - [`extract`], [`join`], [`split`] - frame bookkeeping without geometry
//! - [`impose`] - superpose every frame onto a reference frame
//! - [`transform`] - fixed translations and rotations
//! - [`average`] - running and full-trajectory averages
//! - [`projection`] - displacement along a mode vector

pub mod average;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod impose;
pub mod join;
pub mod progress;
pub mod projection;
pub mod split;
pub mod transform;

use crate::core::io::format::{TrajectoryReader, TrajectoryWriter};
use crate::core::io::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::models::attributes::AttributeMap;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::trajectory::keys;
use error::WorkflowError;
use progress::ProgressReporter;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `<input><suffix>.<extension>`, keeping the whole input file name.
pub fn appended_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(suffix);
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// `<stem><suffix>.<ext>` next to `input`, reusing the input's extension.
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(name)
}

pub(crate) fn frame_count(header: &AttributeMap) -> usize {
    header
        .try_integer(keys::NSET)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

pub(crate) fn particle_count(header: &AttributeMap) -> Option<usize> {
    header
        .try_integer(keys::NPARTICLE)
        .and_then(|n| usize::try_from(n).ok())
}

/// Shifts `istart` by `skipped` frames when the header carries a step layout.
pub(crate) fn advance_istart(header: &mut AttributeMap, skipped: usize) {
    if let (Some(istart), Some(nstep_save)) = (
        header.try_integer(keys::ISTART),
        header.try_integer(keys::NSTEP_SAVE),
    ) {
        header.insert(keys::ISTART, istart + nstep_save * skipped as i64);
    }
}

/// Copies every remaining frame of `reader` into `writer`, passing each one
/// through `transform` first. Writes `header` before the first frame and
/// finishes the writer afterwards.
pub(crate) fn stream_frames(
    reader: &mut TrajectoryReader,
    writer: &mut TrajectoryWriter,
    header: &AttributeMap,
    reporter: &ProgressReporter,
    mut transform: impl FnMut(&mut Snapshot) -> Result<(), WorkflowError>,
) -> Result<usize, WorkflowError> {
    writer.write_header(header)?;
    let task = reporter.frames(frame_count(header));
    while let Some(mut snapshot) = reader.read_frame()? {
        transform(&mut snapshot)?;
        writer.write_frame(&snapshot)?;
        task.tick();
    }
    writer.finish()?;
    task.finish();
    Ok(writer.frames_written())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::core::io::format::write_trajectory;
    use crate::core::math::geometry::Vector3;
    use crate::core::models::attributes::AttributeMap;
    use crate::core::models::snapshot::Snapshot;
    use crate::core::models::trajectory::Trajectory;
    use std::path::Path;

    /// Frame `k` places particle `i` at `(i + k, 2i, -k)`.
    pub fn ramp_trajectory(frames: usize, particles: usize) -> Trajectory {
        let snapshots = (0..frames)
            .map(|k| {
                let positions: Vec<Vector3> = (0..particles)
                    .map(|i| Vector3::new((i + k) as f64, 2.0 * i as f64, -(k as f64)))
                    .collect();
                Snapshot::from_positions(&positions)
            })
            .collect();
        Trajectory::from_snapshots(AttributeMap::new(), snapshots)
    }

    pub fn write_ramp(path: &Path, frames: usize, particles: usize) {
        write_trajectory(path, &ramp_trajectory(frames, particles)).unwrap();
    }
}
