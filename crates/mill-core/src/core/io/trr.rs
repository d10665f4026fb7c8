//! GROMACS TRR trajectories (XDR, big-endian).
//!
//! Every frame carries its own header: the magic number, a version string,
//! the byte sizes of the optional blocks, the particle count, the step and
//! the time/lambda pair. Real numbers are single or double precision; the
//! width is inferred from the block sizes.

use super::binary::{BinaryScalar, read_xdr, read_xdr_string, write_xdr, write_xdr_string};
use super::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::math::geometry::Vector3;
use crate::core::models::attributes::AttributeMap;
use crate::core::models::particle::{Particle, keys as particle_keys};
use crate::core::models::snapshot::{self, BoundaryCondition, Snapshot};
use crate::core::models::trajectory::keys;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

const MAGIC: i32 = 1993;
const VERSION: &str = "GMX_trn_file";
/// Off-diagonal box entries with a larger magnitude make the cell non-orthogonal.
const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum TrrError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid TRR magic number in frame {frame}: expected 1993, found {found}")]
    InvalidMagic { frame: usize, found: i32 },
    #[error("Negative {block} block size in frame {frame}: {size}")]
    InvalidBlockSize {
        frame: usize,
        block: &'static str,
        size: i32,
    },
    #[error("Cannot infer precision of frame {frame}: {bytes} bytes per real")]
    UnknownPrecision { frame: usize, bytes: usize },
    #[error("Frame {frame} is truncated")]
    TruncatedFrame { frame: usize },
    #[error("Frame {frame} has a non-orthogonal box")]
    NonOrthogonalBox { frame: usize },
    #[error("Value {value} of '{field}' does not fit in a 32-bit TRR field")]
    FieldOutOfRange { field: &'static str, value: String },
}

fn to_field<T>(field: &'static str, value: T) -> Result<i32, TrrError>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value.try_into().map_err(|_| TrrError::FieldOutOfRange {
        field,
        value: value.to_string(),
    })
}

/// Width of the real numbers in a TRR frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrrPrecision {
    #[default]
    Single,
    Double,
}

impl TrrPrecision {
    pub fn size(self) -> usize {
        match self {
            TrrPrecision::Single => 4,
            TrrPrecision::Double => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BlockSizes {
    ir: usize,
    e: usize,
    r#box: usize,
    vir: usize,
    pres: usize,
    top: usize,
    sym: usize,
    x: usize,
    v: usize,
    f: usize,
}

impl BlockSizes {
    fn body(&self) -> u64 {
        [
            self.ir, self.e, self.r#box, self.vir, self.pres, self.top, self.sym, self.x, self.v,
            self.f,
        ]
        .iter()
        .map(|&size| size as u64)
        .sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    sizes: BlockSizes,
    natoms: usize,
    step: i32,
    time: f64,
    lambda: f64,
    precision: TrrPrecision,
}

fn infer_precision(
    sizes: &BlockSizes,
    natoms: usize,
    frame: usize,
) -> Result<TrrPrecision, TrrError> {
    let candidates = [
        (sizes.x, natoms * 3),
        (sizes.v, natoms * 3),
        (sizes.f, natoms * 3),
        (sizes.r#box, 9),
        (sizes.vir, 9),
        (sizes.pres, 9),
    ];
    let Some((size, count)) = candidates
        .into_iter()
        .find(|&(size, count)| size > 0 && count > 0)
    else {
        return Ok(TrrPrecision::Single);
    };
    match (size / count, size % count) {
        (4, 0) => Ok(TrrPrecision::Single),
        (8, 0) => Ok(TrrPrecision::Double),
        (bytes, _) => Err(TrrError::UnknownPrecision { frame, bytes }),
    }
}

#[derive(Debug, Clone)]
struct TrrIndex {
    header: AttributeMap,
    offsets: Vec<u64>,
}

/// TRR reader. Frame offsets are indexed on first access by walking the
/// per-frame headers.
///
/// Non-orthogonal boxes are logged and reduced to their diagonal, and the
/// snapshot is marked with the `non_orthogonal_box` attribute; with
/// [`TrrReader::with_strict_box`] they are an error instead.
pub struct TrrReader<R: Read + Seek> {
    reader: R,
    strict_box: bool,
    index: Option<TrrIndex>,
    current: usize,
}

impl TrrReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrrError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read + Seek> TrrReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            strict_box: false,
            index: None,
            current: 0,
        }
    }

    pub fn with_strict_box(mut self, strict: bool) -> Self {
        self.strict_box = strict;
        self
    }

    fn index(&mut self) -> Result<&TrrIndex, TrrError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = self.build_index()?;
                self.reader.seek(SeekFrom::Start(0))?;
                self.current = 0;
                index
            }
        };
        Ok(self.index.insert(index))
    }

    fn build_index(&mut self) -> Result<TrrIndex, TrrError> {
        let end = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(0))?;
        let mut offsets = Vec::new();
        let mut first: Option<FrameHeader> = None;
        let mut offset = 0;
        while offset < end {
            let frame = offsets.len();
            let header = self.read_frame_header(frame)?;
            let body_start = self.reader.stream_position()?;
            let next = body_start + header.sizes.body();
            if next > end {
                return Err(TrrError::TruncatedFrame { frame });
            }
            offsets.push(offset);
            first.get_or_insert(header);
            offset = self.reader.seek(SeekFrom::Start(next))?;
        }

        let mut header = AttributeMap::new().with(keys::NSET, offsets.len());
        if let Some(first) = first {
            header.insert(keys::NPARTICLE, first.natoms);
            header.insert(keys::HAS_UNIT_CELL, first.sizes.r#box > 0);
            header.insert(keys::ISTART, first.step);
        }
        debug!(nset = offsets.len(), "Indexed TRR file.");
        Ok(TrrIndex { header, offsets })
    }

    fn read_size(&mut self, frame: usize, block: &'static str) -> Result<usize, TrrError> {
        let size: i32 = read_xdr(&mut self.reader)?;
        usize::try_from(size).map_err(|_| TrrError::InvalidBlockSize { frame, block, size })
    }

    fn read_frame_header(&mut self, frame: usize) -> Result<FrameHeader, TrrError> {
        let magic: i32 = read_xdr(&mut self.reader)?;
        if magic != MAGIC {
            return Err(TrrError::InvalidMagic {
                frame,
                found: magic,
            });
        }
        let _version_length: i32 = read_xdr(&mut self.reader)?;
        let _version = read_xdr_string(&mut self.reader)?;

        let sizes = BlockSizes {
            ir: self.read_size(frame, "ir")?,
            e: self.read_size(frame, "e")?,
            r#box: self.read_size(frame, "box")?,
            vir: self.read_size(frame, "vir")?,
            pres: self.read_size(frame, "pres")?,
            top: self.read_size(frame, "top")?,
            sym: self.read_size(frame, "sym")?,
            x: self.read_size(frame, "x")?,
            v: self.read_size(frame, "v")?,
            f: self.read_size(frame, "f")?,
        };
        let natoms = self.read_size(frame, "natoms")?;
        let step: i32 = read_xdr(&mut self.reader)?;
        let _nre: i32 = read_xdr(&mut self.reader)?;
        let precision = infer_precision(&sizes, natoms, frame)?;
        let (time, lambda) = match precision {
            TrrPrecision::Single => (
                read_xdr::<f32>(&mut self.reader)? as f64,
                read_xdr::<f32>(&mut self.reader)? as f64,
            ),
            TrrPrecision::Double => (
                read_xdr::<f64>(&mut self.reader)?,
                read_xdr::<f64>(&mut self.reader)?,
            ),
        };
        Ok(FrameHeader {
            sizes,
            natoms,
            step,
            time,
            lambda,
            precision,
        })
    }

    fn skip(&mut self, bytes: usize, frame: usize) -> Result<(), TrrError> {
        if bytes > 0 {
            let skipped = io::copy(&mut (&mut self.reader).take(bytes as u64), &mut io::sink())?;
            if skipped != bytes as u64 {
                return Err(TrrError::TruncatedFrame { frame });
            }
        }
        Ok(())
    }

    fn read_reals(&mut self, count: usize, precision: TrrPrecision) -> Result<Vec<f64>, TrrError> {
        let mut buf = vec![0u8; count * precision.size()];
        self.reader.read_exact(&mut buf)?;
        let values = match precision {
            TrrPrecision::Single => buf
                .chunks_exact(4)
                .map(|chunk| f32::from_be_slice(chunk) as f64)
                .collect(),
            TrrPrecision::Double => buf.chunks_exact(8).map(f64::from_be_slice).collect(),
        };
        Ok(values)
    }

    fn read_vectors(
        &mut self,
        size: usize,
        natoms: usize,
        precision: TrrPrecision,
    ) -> Result<Option<Vec<Vector3>>, TrrError> {
        if size == 0 {
            return Ok(None);
        }
        let values = self.read_reals(natoms * 3, precision)?;
        Ok(Some(
            values
                .chunks_exact(3)
                .map(|v| Vector3::new(v[0], v[1], v[2]))
                .collect(),
        ))
    }

    fn read_box(
        &mut self,
        header: &FrameHeader,
        frame: usize,
    ) -> Result<(BoundaryCondition, bool), TrrError> {
        if header.sizes.r#box == 0 {
            return Ok((BoundaryCondition::Unlimited, false));
        }
        let values = self.read_reals(9, header.precision)?;
        let non_orthogonal = values
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 4 != 0)
            .any(|(_, value)| value.abs() > ORTHOGONALITY_TOLERANCE);
        if non_orthogonal {
            if self.strict_box {
                return Err(TrrError::NonOrthogonalBox { frame });
            }
            error!(
                frame,
                "Non-orthogonal TRR box is not supported; only its diagonal is kept."
            );
        }
        let width = Vector3::new(values[0], values[4], values[8]);
        Ok((BoundaryCondition::CuboidalPeriodic { width }, non_orthogonal))
    }
}

impl<R: Read + Seek> ReadTrajectory for TrrReader<R> {
    type Error = TrrError;

    fn read_header(&mut self) -> Result<AttributeMap, TrrError> {
        Ok(self.index()?.header.clone())
    }

    fn read_frame(&mut self) -> Result<Option<Snapshot>, TrrError> {
        let total = self.index()?.offsets.len();
        let frame = self.current;
        if frame >= total {
            return Ok(None);
        }

        let header = self.read_frame_header(frame)?;
        let sizes = header.sizes;
        self.skip(sizes.ir + sizes.e, frame)?;
        let (boundary, non_orthogonal) = self.read_box(&header, frame)?;
        self.skip(sizes.vir + sizes.pres + sizes.top + sizes.sym, frame)?;
        let positions = self.read_vectors(sizes.x, header.natoms, header.precision)?;
        let velocities = self.read_vectors(sizes.v, header.natoms, header.precision)?;
        let forces = self.read_vectors(sizes.f, header.natoms, header.precision)?;

        let particles = (0..header.natoms)
            .map(|i| {
                let position = positions.as_ref().map_or_else(Vector3::zeros, |p| p[i]);
                let mut particle = Particle::new(position);
                if let Some(velocities) = &velocities {
                    particle.attributes.insert(particle_keys::VELOCITY, velocities[i]);
                }
                if let Some(forces) = &forces {
                    particle.attributes.insert(particle_keys::FORCE, forces[i]);
                }
                particle
            })
            .collect();

        let mut snapshot = Snapshot::new(particles).with_boundary(boundary);
        snapshot.attributes.insert(snapshot::keys::STEP, header.step);
        snapshot.attributes.insert(snapshot::keys::TIME, header.time);
        snapshot.attributes.insert(snapshot::keys::LAMBDA, header.lambda);
        if non_orthogonal {
            snapshot.attributes.insert(snapshot::keys::NON_ORTHOGONAL_BOX, true);
        }
        self.current += 1;
        Ok(Some(snapshot))
    }

    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, TrrError> {
        let Some(offset) = self.index()?.offsets.get(index).copied() else {
            return Ok(None);
        };
        self.reader.seek(SeekFrom::Start(offset))?;
        self.current = index;
        self.read_frame()
    }

    fn rewind(&mut self) -> Result<(), TrrError> {
        self.index()?;
        self.reader.seek(SeekFrom::Start(0))?;
        self.current = 0;
        Ok(())
    }

    fn is_eof(&mut self) -> Result<bool, TrrError> {
        let total = self.index()?.offsets.len();
        Ok(self.current >= total)
    }
}

/// TRR writer. Velocities and forces are written when every particle of the
/// frame carries them.
pub struct TrrWriter<W: Write> {
    writer: W,
    precision: TrrPrecision,
    frames_written: usize,
}

impl TrrWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, precision: TrrPrecision) -> Result<Self, TrrError> {
        Ok(Self::new(BufWriter::new(File::create(path)?), precision))
    }
}

impl<W: Write> TrrWriter<W> {
    pub fn new(writer: W, precision: TrrPrecision) -> Self {
        Self {
            writer,
            precision,
            frames_written: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_real(buf: &mut Vec<u8>, value: f64, precision: TrrPrecision) -> io::Result<()> {
        match precision {
            TrrPrecision::Single => write_xdr(buf, value as f32),
            TrrPrecision::Double => write_xdr(buf, value),
        }
    }
}

fn per_particle(
    snapshot: &Snapshot,
    get: impl Fn(&Particle) -> Option<Vector3>,
) -> Option<Vec<Vector3>> {
    if snapshot.is_empty() {
        return None;
    }
    snapshot.iter().map(get).collect()
}

impl<W: Write> WriteTrajectory for TrrWriter<W> {
    type Error = TrrError;

    /// Every TRR frame is self-describing, so there is nothing to write here.
    fn write_header(&mut self, _header: &AttributeMap) -> Result<(), TrrError> {
        Ok(())
    }

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), TrrError> {
        let precision = self.precision;
        let real = precision.size();
        let natoms = snapshot.len();
        let velocities = per_particle(snapshot, Particle::velocity);
        let forces = per_particle(snapshot, Particle::force);
        let vector_block = natoms * 3 * real;
        let width = snapshot.boundary.width();

        let attributes = &snapshot.attributes;
        let step = attributes
            .try_integer(snapshot::keys::STEP)
            .unwrap_or(self.frames_written as i64);
        let time = attributes.try_float(snapshot::keys::TIME).unwrap_or(0.0);
        let lambda = attributes.try_float(snapshot::keys::LAMBDA).unwrap_or(0.0);

        let mut buf = Vec::new();
        write_xdr(&mut buf, MAGIC)?;
        write_xdr(&mut buf, VERSION.len() as i32 + 1)?;
        write_xdr_string(&mut buf, VERSION)?;
        let sizes = [
            0,
            0,
            if width.is_some() { 9 * real } else { 0 },
            0,
            0,
            0,
            0,
            vector_block,
            if velocities.is_some() { vector_block } else { 0 },
            if forces.is_some() { vector_block } else { 0 },
            natoms,
        ];
        for size in sizes {
            write_xdr(&mut buf, to_field("block size", size)?)?;
        }
        write_xdr(&mut buf, to_field(snapshot::keys::STEP, step)?)?;
        write_xdr(&mut buf, 0i32)?;
        Self::write_real(&mut buf, time, precision)?;
        Self::write_real(&mut buf, lambda, precision)?;

        if let Some(width) = width {
            let cell = [width.x, 0.0, 0.0, 0.0, width.y, 0.0, 0.0, 0.0, width.z];
            for value in cell {
                Self::write_real(&mut buf, value, precision)?;
            }
        }
        let positions = snapshot.positions();
        for block in [Some(&positions), velocities.as_ref(), forces.as_ref()]
            .into_iter()
            .flatten()
        {
            for v in block {
                for value in [v.x, v.y, v.z] {
                    Self::write_real(&mut buf, value, precision)?;
                }
            }
        }
        self.writer.write_all(&buf)?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn finish(&mut self) -> Result<(), TrrError> {
        self.writer.flush()?;
        Ok(())
    }
}
