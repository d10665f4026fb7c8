use crate::core::models::attributes::AttributeMap;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::trajectory::Trajectory;
use std::error::Error;
use std::io;

/// Frame-at-a-time reading of a trajectory file.
///
/// Implementors own their stream exclusively and keep the index of the next
/// frame as their only mutable state.
pub trait ReadTrajectory {
    /// The error type for read operations.
    type Error: Error + From<io::Error>;

    /// Reads the trajectory-level attributes without consuming any frame.
    ///
    /// Calling it again returns the cached header.
    fn read_header(&mut self) -> Result<AttributeMap, Self::Error>;

    /// Reads the next frame, or `None` at the end of the stream.
    fn read_frame(&mut self) -> Result<Option<Snapshot>, Self::Error>;

    /// Positions the reader at frame `index` and reads it.
    ///
    /// Fixed-size-record formats seek directly; variable-size formats skip
    /// frames from the start. Returns `None` if `index` is past the end.
    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, Self::Error>;

    /// Moves back to the first frame.
    fn rewind(&mut self) -> Result<(), Self::Error>;

    /// Whether no further frame can be read.
    fn is_eof(&mut self) -> Result<bool, Self::Error>;

    /// Reads the header and every remaining frame into memory.
    fn read_trajectory(&mut self) -> Result<Trajectory, Self::Error> {
        let mut trajectory = Trajectory::new(self.read_header()?);
        while let Some(snapshot) = self.read_frame()? {
            trajectory.push(snapshot);
        }
        Ok(trajectory)
    }
}

/// Frame-at-a-time writing of a trajectory file.
pub trait WriteTrajectory {
    /// The error type for write operations.
    type Error: Error + From<io::Error>;

    /// Writes the trajectory-level header. Must precede the first frame.
    fn write_header(&mut self, header: &AttributeMap) -> Result<(), Self::Error>;

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Number of frames written so far.
    fn frames_written(&self) -> usize;

    /// Completes the file (trailer records, header fix-ups) and flushes it.
    fn finish(&mut self) -> Result<(), Self::Error>;

    /// Writes a whole in-memory trajectory and finishes the file.
    fn write_trajectory(&mut self, trajectory: &Trajectory) -> Result<(), Self::Error> {
        self.write_header(&trajectory.header)?;
        for snapshot in trajectory {
            self.write_frame(snapshot)?;
        }
        self.finish()
    }
}
