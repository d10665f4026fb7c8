//! CHARMM/NAMD DCD trajectories.
//!
//! The file is three Fortran-style records (a length prefix and an identical
//! length suffix around each payload) followed by `nset` fixed-size frames.
//! Values are stored in native byte order.

use super::binary::{BinaryScalar, read_binary_as, write_as_binary};
use super::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::math::geometry::Vector3;
use crate::core::models::attributes::AttributeMap;
use crate::core::models::particle::Particle;
use crate::core::models::snapshot::{self, BoundaryCondition, ParticleCountMismatch, Snapshot};
use crate::core::models::trajectory::keys;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const HEADER_PAYLOAD: i32 = 84;
const COMMENT_WIDTH: usize = 80;
const UNIT_CELL_PAYLOAD: i32 = 48;
const DEFAULT_VER_CHARMM: i32 = 24;
/// Byte offset of `nset` inside the file: record length + signature.
const NSET_OFFSET: u64 = 8;

#[derive(Debug, Error)]
pub enum DcdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid DCD signature '{0}' (expected CORD or VELD)")]
    InvalidSignature(String),
    #[error("Inconsistent {block} record: expected {expected} bytes, found {found}")]
    BlockSizeMismatch {
        block: &'static str,
        expected: i64,
        found: i64,
    },
    #[error("Negative {field} in DCD header: {value}")]
    NegativeField { field: &'static str, value: i32 },
    #[error("Value {value} of '{field}' does not fit in a 32-bit DCD field")]
    FieldOutOfRange { field: &'static str, value: String },
    #[error("Missing required header attribute '{0}'")]
    MissingHeaderField(&'static str),
    #[error("A frame was written before the DCD header")]
    HeaderNotWritten,
    #[error("Header declares a unit cell but frame {frame} has no periodic boundary")]
    MissingUnitCell { frame: usize },
    #[error(transparent)]
    ParticleCount(#[from] ParticleCountMismatch),
}

#[derive(Debug, Clone)]
struct Layout {
    header: AttributeMap,
    nset: usize,
    nparticle: usize,
    istart: i64,
    nstep_save: i64,
    has_unit_cell: bool,
    header_size: u64,
    snapshot_size: u64,
}

impl Layout {
    fn frame_offset(&self, index: usize) -> u64 {
        self.header_size + index as u64 * self.snapshot_size
    }
}

fn snapshot_size(nparticle: usize, has_unit_cell: bool) -> u64 {
    let cell = if has_unit_cell {
        8 + UNIT_CELL_PAYLOAD as u64
    } else {
        0
    };
    cell + 3 * (8 + 4 * nparticle as u64)
}

fn check_marker(block: &'static str, expected: i64, found: i32) -> Result<(), DcdError> {
    if found as i64 != expected {
        return Err(DcdError::BlockSizeMismatch {
            block,
            expected,
            found: found as i64,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: i32) -> Result<usize, DcdError> {
    usize::try_from(value).map_err(|_| DcdError::NegativeField { field, value })
}

fn to_field<T>(field: &'static str, value: T) -> Result<i32, DcdError>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value.try_into().map_err(|_| DcdError::FieldOutOfRange {
        field,
        value: value.to_string(),
    })
}

/// Streaming DCD reader.
pub struct DcdReader<R: Read + Seek> {
    reader: R,
    layout: Option<Layout>,
    current: usize,
}

impl DcdReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DcdError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read + Seek> DcdReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            layout: None,
            current: 0,
        }
    }

    fn layout(&mut self) -> Result<&Layout, DcdError> {
        let layout = match self.layout.take() {
            Some(layout) => layout,
            None => self.parse_header()?,
        };
        Ok(self.layout.insert(layout))
    }

    fn read_block_marker(&mut self) -> Result<i32, DcdError> {
        Ok(read_binary_as::<i32>(&mut self.reader)?)
    }

    fn parse_header(&mut self) -> Result<Layout, DcdError> {
        self.reader.seek(SeekFrom::Start(0))?;

        let marker = self.read_block_marker()?;
        check_marker("header", HEADER_PAYLOAD as i64, marker)?;
        let mut signature = [0u8; 4];
        self.reader.read_exact(&mut signature)?;
        let signature = String::from_utf8_lossy(&signature).into_owned();
        if signature != "CORD" && signature != "VELD" {
            return Err(DcdError::InvalidSignature(signature));
        }
        let mut control = [0u8; 80];
        self.reader.read_exact(&mut control)?;
        let slot = |i: usize| i32::from_ne_slice(&control[4 * i..]);
        let nset = non_negative(keys::NSET, slot(0))?;
        let istart = slot(1);
        let nstep_save = slot(2);
        let nstep = slot(3);
        let nunit = slot(4);
        let delta_t = f32::from_ne_slice(&control[4 * 9..]);
        let has_unit_cell = slot(10) != 0;
        let ver_charmm = slot(19);
        let marker = self.read_block_marker()?;
        check_marker("header", HEADER_PAYLOAD as i64, marker)?;

        let marker = self.read_block_marker()?;
        let line_count = non_negative("comment line count", self.read_block_marker()?)?;
        check_marker("comment", 4 + (COMMENT_WIDTH * line_count) as i64, marker)?;
        let mut comments = Vec::with_capacity(line_count);
        let mut line = [0u8; COMMENT_WIDTH];
        for _ in 0..line_count {
            self.reader.read_exact(&mut line)?;
            comments.push(
                String::from_utf8_lossy(&line)
                    .trim_end_matches(['\0', ' '])
                    .to_string(),
            );
        }
        let closing = self.read_block_marker()?;
        check_marker("comment", marker as i64, closing)?;

        let marker = self.read_block_marker()?;
        check_marker("particle count", 4, marker)?;
        let nparticle = non_negative(keys::NPARTICLE, self.read_block_marker()?)?;
        let marker = self.read_block_marker()?;
        check_marker("particle count", 4, marker)?;

        let header_size = self.reader.stream_position()?;
        let snapshot_size = snapshot_size(nparticle, has_unit_cell);
        let actual_size = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(header_size))?;

        let expected_size = header_size + nset as u64 * snapshot_size;
        let nset = if expected_size != actual_size {
            let recovered = (actual_size.saturating_sub(header_size) / snapshot_size) as usize;
            warn!(
                declared = nset,
                recovered,
                expected_size,
                actual_size,
                "DCD file size disagrees with the header; continuing with the recomputed frame count."
            );
            recovered
        } else {
            nset
        };

        let header = AttributeMap::new()
            .with(keys::SIGNATURE, signature)
            .with(keys::NSET, nset)
            .with(keys::ISTART, istart)
            .with(keys::NSTEP_SAVE, nstep_save)
            .with(keys::NSTEP, nstep)
            .with(keys::NUNIT, nunit)
            .with(keys::DELTA_T, delta_t)
            .with(keys::VER_CHARMM, ver_charmm)
            .with(keys::COMMENT, comments)
            .with(keys::NPARTICLE, nparticle)
            .with(keys::HAS_UNIT_CELL, has_unit_cell);
        debug!(nset, nparticle, has_unit_cell, "Parsed DCD header.");

        Ok(Layout {
            header,
            nset,
            nparticle,
            istart: istart as i64,
            nstep_save: nstep_save as i64,
            has_unit_cell,
            header_size,
            snapshot_size,
        })
    }

    fn read_axis(&mut self, nparticle: usize, buf: &mut Vec<u8>) -> Result<Vec<f32>, DcdError> {
        let expected = 4 * nparticle as i64;
        let marker = self.read_block_marker()?;
        check_marker("coordinate", expected, marker)?;
        buf.resize(4 * nparticle, 0);
        self.reader.read_exact(buf)?;
        let closing = self.read_block_marker()?;
        check_marker("coordinate", expected, closing)?;
        Ok(buf.chunks_exact(4).map(f32::from_ne_slice).collect())
    }

    fn read_unit_cell(&mut self) -> Result<Vector3, DcdError> {
        let marker = self.read_block_marker()?;
        check_marker("unit cell", UNIT_CELL_PAYLOAD as i64, marker)?;
        let mut cell = [0f64; 6];
        for value in &mut cell {
            *value = read_binary_as::<f64>(&mut self.reader)?;
        }
        let closing = self.read_block_marker()?;
        check_marker("unit cell", UNIT_CELL_PAYLOAD as i64, closing)?;
        // a, gamma, b, beta, alpha, c
        Ok(Vector3::new(cell[0], cell[2], cell[5]))
    }
}

impl<R: Read + Seek> ReadTrajectory for DcdReader<R> {
    type Error = DcdError;

    fn read_header(&mut self) -> Result<AttributeMap, DcdError> {
        Ok(self.layout()?.header.clone())
    }

    fn read_frame(&mut self) -> Result<Option<Snapshot>, DcdError> {
        let layout = self.layout()?;
        let (nset, nparticle, has_unit_cell, istart, nstep_save) = (
            layout.nset,
            layout.nparticle,
            layout.has_unit_cell,
            layout.istart,
            layout.nstep_save,
        );
        let step = istart + self.current as i64 * nstep_save;
        if self.current >= nset {
            return Ok(None);
        }

        let boundary = if has_unit_cell {
            BoundaryCondition::CuboidalPeriodic {
                width: self.read_unit_cell()?,
            }
        } else {
            BoundaryCondition::Unlimited
        };
        let mut buf = Vec::new();
        let xs = self.read_axis(nparticle, &mut buf)?;
        let ys = self.read_axis(nparticle, &mut buf)?;
        let zs = self.read_axis(nparticle, &mut buf)?;

        let particles = xs
            .iter()
            .zip(&ys)
            .zip(&zs)
            .map(|((&x, &y), &z)| Particle::new(Vector3::new(x as f64, y as f64, z as f64)))
            .collect();
        let mut snapshot = Snapshot::new(particles).with_boundary(boundary);
        snapshot.attributes.insert(snapshot::keys::STEP, step);
        self.current += 1;
        Ok(Some(snapshot))
    }

    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, DcdError> {
        let layout = self.layout()?;
        if index >= layout.nset {
            return Ok(None);
        }
        let offset = layout.frame_offset(index);
        self.reader.seek(SeekFrom::Start(offset))?;
        self.current = index;
        self.read_frame()
    }

    fn rewind(&mut self) -> Result<(), DcdError> {
        let offset = self.layout()?.header_size;
        self.reader.seek(SeekFrom::Start(offset))?;
        self.current = 0;
        Ok(())
    }

    fn is_eof(&mut self) -> Result<bool, DcdError> {
        let nset = self.layout()?.nset;
        Ok(self.current >= nset)
    }
}

#[derive(Debug, Clone, Copy)]
struct WriterState {
    start: u64,
    declared_nset: usize,
    nparticle: usize,
    has_unit_cell: bool,
}

/// Streaming DCD writer.
///
/// The header `nset` is patched on [`WriteTrajectory::finish`] when the number
/// of frames actually written differs from the declared one.
pub struct DcdWriter<W: Write + Seek> {
    writer: W,
    state: Option<WriterState>,
    frames_written: usize,
}

impl DcdWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DcdError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

/// Pads each comment to 80 characters with `=`, splitting longer ones.
fn comment_lines(comments: &[String]) -> Vec<[u8; COMMENT_WIDTH]> {
    let mut lines = Vec::new();
    for comment in comments {
        let bytes: Vec<u8> = comment
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect();
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[]]
        } else {
            bytes.chunks(COMMENT_WIDTH).collect()
        };
        for chunk in chunks {
            let mut line = [b'='; COMMENT_WIDTH];
            line[..chunk.len()].copy_from_slice(chunk);
            lines.push(line);
        }
    }
    lines
}

fn header_int(header: &AttributeMap, key: &'static str, default: i64) -> Result<i32, DcdError> {
    to_field(key, header.try_integer(key).unwrap_or(default))
}

impl<W: Write + Seek> DcdWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            state: None,
            frames_written: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_marker(&mut self, value: usize) -> Result<(), DcdError> {
        write_as_binary(&mut self.writer, to_field("block size", value)?)?;
        Ok(())
    }

    fn write_axis(
        &mut self,
        values: impl Iterator<Item = f64>,
        nparticle: usize,
    ) -> Result<(), DcdError> {
        let mut buf = Vec::with_capacity(4 * nparticle + 8);
        let block = to_field("coordinate block size", 4 * nparticle)?;
        write_as_binary(&mut buf, block)?;
        for value in values {
            write_as_binary(&mut buf, value as f32)?;
        }
        write_as_binary(&mut buf, block)?;
        self.writer.write_all(&buf)?;
        Ok(())
    }
}

impl<W: Write + Seek> WriteTrajectory for DcdWriter<W> {
    type Error = DcdError;

    fn write_header(&mut self, header: &AttributeMap) -> Result<(), DcdError> {
        let signature = header.try_string(keys::SIGNATURE).unwrap_or("CORD");
        if signature != "CORD" && signature != "VELD" {
            return Err(DcdError::InvalidSignature(signature.to_string()));
        }
        let nparticle = header
            .try_integer(keys::NPARTICLE)
            .ok_or(DcdError::MissingHeaderField(keys::NPARTICLE))?;
        let nparticle = non_negative(keys::NPARTICLE, to_field(keys::NPARTICLE, nparticle)?)?;
        let declared_nset = header.try_integer(keys::NSET).unwrap_or(0).max(0);
        let declared_nset = non_negative(keys::NSET, to_field(keys::NSET, declared_nset)?)?;
        let has_unit_cell = header.try_bool(keys::HAS_UNIT_CELL).unwrap_or(false);
        let comments = comment_lines(&header.try_strings(keys::COMMENT).unwrap_or_default());

        let start = self.writer.stream_position()?;
        let mut buf = Vec::with_capacity(92);
        write_as_binary(&mut buf, HEADER_PAYLOAD)?;
        buf.extend_from_slice(signature.as_bytes());
        let mut control = [0i32; 20];
        control[0] = to_field(keys::NSET, declared_nset)?;
        control[1] = header_int(header, keys::ISTART, 0)?;
        control[2] = header_int(header, keys::NSTEP_SAVE, 0)?;
        control[3] = header_int(header, keys::NSTEP, 0)?;
        control[4] = header_int(header, keys::NUNIT, 0)?;
        control[10] = i32::from(has_unit_cell);
        control[19] = header_int(header, keys::VER_CHARMM, i64::from(DEFAULT_VER_CHARMM))?;
        let delta_t = header.try_float(keys::DELTA_T).unwrap_or(0.0) as f32;
        for (i, value) in control.iter().enumerate() {
            if i == 9 {
                write_as_binary(&mut buf, delta_t)?;
            } else {
                write_as_binary(&mut buf, *value)?;
            }
        }
        write_as_binary(&mut buf, HEADER_PAYLOAD)?;
        self.writer.write_all(&buf)?;

        let comment_size = 4 + COMMENT_WIDTH * comments.len();
        self.write_marker(comment_size)?;
        self.write_marker(comments.len())?;
        for line in &comments {
            self.writer.write_all(line)?;
        }
        self.write_marker(comment_size)?;

        self.write_marker(4)?;
        self.write_marker(nparticle)?;
        self.write_marker(4)?;

        self.state = Some(WriterState {
            start,
            declared_nset,
            nparticle,
            has_unit_cell,
        });
        Ok(())
    }

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), DcdError> {
        let state = self.state.ok_or(DcdError::HeaderNotWritten)?;
        if snapshot.len() != state.nparticle {
            return Err(ParticleCountMismatch {
                expected: state.nparticle,
                found: snapshot.len(),
            }
            .into());
        }

        if state.has_unit_cell {
            let width = snapshot.boundary.width().ok_or(DcdError::MissingUnitCell {
                frame: self.frames_written,
            })?;
            let mut buf = Vec::with_capacity(56);
            write_as_binary(&mut buf, UNIT_CELL_PAYLOAD)?;
            for value in [width.x, 90.0, width.y, 90.0, 90.0, width.z] {
                write_as_binary(&mut buf, value)?;
            }
            write_as_binary(&mut buf, UNIT_CELL_PAYLOAD)?;
            self.writer.write_all(&buf)?;
        }

        self.write_axis(snapshot.iter().map(|p| p.position.x), state.nparticle)?;
        self.write_axis(snapshot.iter().map(|p| p.position.y), state.nparticle)?;
        self.write_axis(snapshot.iter().map(|p| p.position.z), state.nparticle)?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn finish(&mut self) -> Result<(), DcdError> {
        if let Some(state) = self.state {
            if state.declared_nset != self.frames_written {
                debug!(
                    declared = state.declared_nset,
                    written = self.frames_written,
                    "Patching DCD header frame count."
                );
                let end = self.writer.stream_position()?;
                self.writer.seek(SeekFrom::Start(state.start + NSET_OFFSET))?;
                let nset = to_field(keys::NSET, self.frames_written)?;
                write_as_binary(&mut self.writer, nset)?;
                self.writer.seek(SeekFrom::Start(end))?;
                self.state = Some(WriterState {
                    declared_nset: self.frames_written,
                    ..state
                });
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}
