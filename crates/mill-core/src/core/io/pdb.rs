//! PDB and coarse-grained PDB trajectories.
//!
//! Frames are delimited by `MODEL`/`ENDMDL` (or a bare `END`); a file without
//! model records is a single frame. `TER` records separate chains and a
//! `CRYST1` record sets the periodic box of the frames that follow it.

use super::text::{Line, LineSource, slice_and_trim};
use super::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::math::geometry::Vector3;
use crate::core::models::attributes::AttributeMap;
use crate::core::models::particle::{Particle, keys as particle_keys};
use crate::core::models::snapshot::{BoundaryCondition, ParticleCountMismatch, Snapshot};
use crate::core::models::trajectory::keys;
use crate::core::utils::LookupError;
use crate::core::utils::elements::element_from_atom_name;
use crate::core::utils::residues::{
    dna_residue_name, is_dna_residue, protein_residue_name, residue_code,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const MIN_ATOM_LINE: usize = 54;
const RIGHT_ANGLE_TOLERANCE: f64 = 1e-3;

/// How residue names are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdbFlavor {
    #[default]
    Standard,
    /// Residues are single beads; every residue name must map to a one-letter
    /// protein or DNA code.
    CoarseGrained,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    ParticleCount(#[from] ParticleCountMismatch),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Line is too short for an ATOM/HETATM record (coordinates end at column 54)")]
    LineTooShort,
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

fn record_type(line: &str) -> &str {
    slice_and_trim(line, 0, 6)
}

fn parse_float(
    line: &Line<'_>,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<Option<f64>, PdbError> {
    let value = slice_and_trim(line.text, start, end);
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| PdbError::Parse {
        line: line.number,
        kind: PdbParseErrorKind::InvalidFloat {
            columns,
            value: value.to_string(),
        },
    })
}

fn required_float(
    line: &Line<'_>,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<f64, PdbError> {
    parse_float(line, start, end, columns)?.ok_or_else(|| PdbError::Parse {
        line: line.number,
        kind: PdbParseErrorKind::InvalidFloat {
            columns,
            value: String::new(),
        },
    })
}

fn parse_int(
    line: &Line<'_>,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<Option<i64>, PdbError> {
    let value = slice_and_trim(line.text, start, end);
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| PdbError::Parse {
        line: line.number,
        kind: PdbParseErrorKind::InvalidInt {
            columns,
            value: value.to_string(),
        },
    })
}

fn parse_atom(line: &Line<'_>, flavor: PdbFlavor) -> Result<Particle, PdbError> {
    if line.text.len() < MIN_ATOM_LINE {
        return Err(PdbError::Parse {
            line: line.number,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }
    let x = required_float(line, 30, 38, "31-38")?;
    let y = required_float(line, 38, 46, "39-46")?;
    let z = required_float(line, 46, 54, "47-54")?;

    let mut particle = Particle::new(Vector3::new(x, y, z));
    let attributes = &mut particle.attributes;
    attributes.insert(particle_keys::RECORD, record_type(line.text));
    // Serials past 99999 are often written in hybrid-36 or as stars.
    if let Ok(serial) = slice_and_trim(line.text, 6, 11).parse::<i64>() {
        attributes.insert(particle_keys::SERIAL, serial);
    }
    let name = slice_and_trim(line.text, 12, 16);
    let residue_name = slice_and_trim(line.text, 17, 20);
    for (key, value) in [
        (particle_keys::NAME, name),
        (particle_keys::ALT_LOC, slice_and_trim(line.text, 16, 17)),
        (particle_keys::RESIDUE_NAME, residue_name),
        (particle_keys::CHAIN_ID, slice_and_trim(line.text, 21, 22)),
        (particle_keys::INSERTION_CODE, slice_and_trim(line.text, 26, 27)),
        (particle_keys::CHARGE, slice_and_trim(line.text, 78, 80)),
    ] {
        if !value.is_empty() {
            attributes.insert(key, value);
        }
    }
    if let Some(sequence) = parse_int(line, 22, 26, "23-26")? {
        attributes.insert(particle_keys::RESIDUE_SEQUENCE, sequence);
    }
    if let Some(occupancy) = parse_float(line, 54, 60, "55-60")? {
        attributes.insert(particle_keys::OCCUPANCY, occupancy);
    }
    if let Some(factor) = parse_float(line, 60, 66, "61-66")? {
        attributes.insert(particle_keys::TEMPERATURE_FACTOR, factor);
    }

    let element = slice_and_trim(line.text, 76, 78);
    match flavor {
        PdbFlavor::Standard => {
            if !element.is_empty() {
                attributes.insert(particle_keys::ELEMENT, element);
            } else if let Some(inferred) = element_from_atom_name(name) {
                attributes.insert(particle_keys::ELEMENT, inferred);
            }
        }
        PdbFlavor::CoarseGrained => {
            if !element.is_empty() {
                attributes.insert(particle_keys::ELEMENT, element);
            }
            let code = residue_code(residue_name).map_err(|e| PdbError::Parse {
                line: line.number,
                kind: e.into(),
            })?;
            attributes.insert(particle_keys::RESIDUE_CODE, code.to_string());
            if is_dna_residue(residue_name) {
                attributes.insert(particle_keys::DNA, true);
            }
        }
    }
    Ok(particle)
}

fn parse_cryst1(line: &Line<'_>) -> Result<BoundaryCondition, PdbError> {
    let a = required_float(line, 6, 15, "7-15")?;
    let b = required_float(line, 15, 24, "16-24")?;
    let c = required_float(line, 24, 33, "25-33")?;
    let angles = [
        parse_float(line, 33, 40, "34-40")?,
        parse_float(line, 40, 47, "41-47")?,
        parse_float(line, 47, 54, "48-54")?,
    ];
    if angles
        .iter()
        .flatten()
        .any(|angle| (angle - 90.0).abs() > RIGHT_ANGLE_TOLERANCE)
    {
        warn!(
            line = line.number,
            "Non-orthogonal CRYST1 cell; only the edge lengths are kept."
        );
    }
    // A unit cube is the conventional placeholder for "no crystal".
    if a == 1.0 && b == 1.0 && c == 1.0 {
        return Ok(BoundaryCondition::Unlimited);
    }
    Ok(BoundaryCondition::CuboidalPeriodic {
        width: Vector3::new(a, b, c),
    })
}

#[derive(Debug, Clone, Copy)]
struct FrameMark {
    offset: u64,
    /// Lines preceding the frame.
    line: usize,
    /// Box in effect where the frame starts.
    boundary: BoundaryCondition,
}

#[derive(Debug, Clone)]
struct PdbIndex {
    header: AttributeMap,
    frames: Vec<FrameMark>,
}

/// PDB reader. The file is indexed once on first access, so `read_frame_at`
/// seeks directly to a frame's first record.
pub struct PdbReader<R: BufRead + Seek> {
    source: LineSource<R>,
    flavor: PdbFlavor,
    index: Option<PdbIndex>,
    boundary: BoundaryCondition,
    current: usize,
}

impl PdbReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, flavor: PdbFlavor) -> Result<Self, PdbError> {
        Ok(Self::new(BufReader::new(File::open(path)?), flavor))
    }
}

impl<R: BufRead + Seek> PdbReader<R> {
    pub fn new(reader: R, flavor: PdbFlavor) -> Self {
        Self {
            source: LineSource::new(reader),
            flavor,
            index: None,
            boundary: BoundaryCondition::Unlimited,
            current: 0,
        }
    }

    pub fn flavor(&self) -> PdbFlavor {
        self.flavor
    }

    fn index(&mut self) -> Result<&PdbIndex, PdbError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = self.build_index()?;
                self.source.seek(0, 0)?;
                self.boundary = BoundaryCondition::Unlimited;
                self.current = 0;
                index
            }
        };
        Ok(self.index.insert(index))
    }

    fn build_index(&mut self) -> Result<PdbIndex, PdbError> {
        self.source.seek(0, 0)?;
        let mut frames = Vec::new();
        let mut pending: Option<FrameMark> = None;
        let mut in_frame = false;
        let mut boundary = BoundaryCondition::Unlimited;
        let mut has_unit_cell = false;

        let mut comments = Vec::new();
        let mut nparticle = 0usize;
        let mut nunit = 0usize;
        let mut chain_open = false;
        let mut last_chain = String::new();

        while let Some(line) = self.source.next_line()? {
            let mark = FrameMark {
                offset: line.offset,
                line: line.number - 1,
                boundary,
            };
            let first_frame = frames.is_empty();
            match record_type(line.text) {
                "MODEL" => {
                    if in_frame {
                        frames.extend(pending.take());
                        in_frame = false;
                    }
                    pending = Some(mark);
                }
                "ATOM" | "HETATM" => {
                    pending.get_or_insert(mark);
                    in_frame = true;
                    if first_frame {
                        nparticle += 1;
                        let chain = slice_and_trim(line.text, 21, 22);
                        if !chain_open || chain != last_chain {
                            nunit += 1;
                            chain_open = true;
                            last_chain = chain.to_string();
                        }
                    }
                }
                "TER" => chain_open = false,
                "ENDMDL" | "END" => {
                    if in_frame {
                        frames.extend(pending.take());
                        in_frame = false;
                    } else {
                        pending = None;
                    }
                }
                "CRYST1" => {
                    boundary = parse_cryst1(&line)?;
                    has_unit_cell |= boundary.is_periodic();
                }
                "TITLE" | "REMARK" if first_frame && !in_frame => {
                    let text = slice_and_trim(line.text, 6, line.text.len());
                    if !text.is_empty() {
                        comments.push(text.to_string());
                    }
                }
                _ => {}
            }
        }
        if in_frame {
            frames.extend(pending.take());
        }

        let mut header = AttributeMap::new()
            .with(keys::NSET, frames.len())
            .with(keys::NPARTICLE, nparticle)
            .with(keys::NUNIT, nunit)
            .with(keys::HAS_UNIT_CELL, has_unit_cell);
        if !comments.is_empty() {
            header.insert(keys::COMMENT, comments);
        }
        debug!(nset = frames.len(), nparticle, nunit, "Indexed PDB file.");
        Ok(PdbIndex { header, frames })
    }
}

impl<R: BufRead + Seek> ReadTrajectory for PdbReader<R> {
    type Error = PdbError;

    fn read_header(&mut self) -> Result<AttributeMap, PdbError> {
        Ok(self.index()?.header.clone())
    }

    fn read_frame(&mut self) -> Result<Option<Snapshot>, PdbError> {
        let total = self.index()?.frames.len();
        if self.current >= total {
            return Ok(None);
        }

        let mut particles = Vec::new();
        while let Some(line) = self.source.next_line()? {
            match record_type(line.text) {
                "MODEL" | "ENDMDL" | "END" if !particles.is_empty() => break,
                "ATOM" | "HETATM" => particles.push(parse_atom(&line, self.flavor)?),
                "CRYST1" => self.boundary = parse_cryst1(&line)?,
                _ => {}
            }
        }
        if particles.is_empty() {
            return Ok(None);
        }
        self.current += 1;
        Ok(Some(Snapshot::new(particles).with_boundary(self.boundary)))
    }

    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, PdbError> {
        let Some(mark) = self.index()?.frames.get(index).copied() else {
            return Ok(None);
        };
        self.source.seek(mark.offset, mark.line)?;
        self.boundary = mark.boundary;
        self.current = index;
        self.read_frame()
    }

    fn rewind(&mut self) -> Result<(), PdbError> {
        self.index()?;
        self.source.seek(0, 0)?;
        self.boundary = BoundaryCondition::Unlimited;
        self.current = 0;
        Ok(())
    }

    fn is_eof(&mut self) -> Result<bool, PdbError> {
        let total = self.index()?.frames.len();
        Ok(self.current >= total)
    }
}

/// PDB writer. Every frame is wrapped in `MODEL`/`ENDMDL`, chains are closed
/// with `TER`, and [`WriteTrajectory::finish`] appends `END`.
pub struct PdbWriter<W: Write> {
    writer: W,
    flavor: PdbFlavor,
    nparticle: Option<usize>,
    frames_written: usize,
    finished: bool,
}

impl PdbWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, flavor: PdbFlavor) -> Result<Self, PdbError> {
        Ok(Self::new(BufWriter::new(File::create(path)?), flavor))
    }
}

fn format_atom_name(name: &str) -> String {
    if name.chars().count() >= 4 {
        truncated(name, 4).to_string()
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{:<4}", name)
    } else {
        format!(" {:<3}", name)
    }
}

/// The first `width` characters of `value`.
fn truncated(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

impl<W: Write> PdbWriter<W> {
    pub fn new(writer: W, flavor: PdbFlavor) -> Self {
        Self {
            writer,
            flavor,
            nparticle: None,
            frames_written: 0,
            finished: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn residue_name(&self, particle: &Particle) -> Result<String, PdbError> {
        if let Some(name) = particle.attributes.try_string(particle_keys::RESIDUE_NAME) {
            return Ok(name.to_string());
        }
        let code = particle
            .attributes
            .try_string(particle_keys::RESIDUE_CODE)
            .and_then(|code| code.chars().next());
        let is_dna = particle.attributes.try_bool(particle_keys::DNA) == Some(true);
        match (self.flavor, code) {
            (_, Some(code)) if is_dna => Ok(dna_residue_name(code)?.to_string()),
            (_, Some(code)) => Ok(protein_residue_name(code)?.to_string()),
            (PdbFlavor::Standard, None) => Ok("UNK".to_string()),
            (PdbFlavor::CoarseGrained, None) => {
                Err(LookupError::UnknownResidue("<missing>".to_string()).into())
            }
        }
    }

    fn write_atom(&mut self, serial: i64, particle: &Particle) -> Result<(), PdbError> {
        let attributes = &particle.attributes;
        let text = |key: &str| attributes.try_string(key).unwrap_or("");
        let record = match text(particle_keys::RECORD) {
            "HETATM" => "HETATM",
            _ => "ATOM",
        };
        let residue_name = self.residue_name(particle)?;
        let p = particle.position;
        writeln!(
            self.writer,
            "{:<6}{:>5} {:4}{:1}{:>3} {:1}{:>4}{:1}   {:8.3}{:8.3}{:8.3}{:6.2}{:6.2}          {:>2}{:<2}",
            record,
            serial % 100000,
            format_atom_name(text(particle_keys::NAME)),
            truncated(text(particle_keys::ALT_LOC), 1),
            truncated(&residue_name, 3),
            truncated(text(particle_keys::CHAIN_ID), 1),
            attributes.try_integer(particle_keys::RESIDUE_SEQUENCE).unwrap_or(1) % 10000,
            truncated(text(particle_keys::INSERTION_CODE), 1),
            p.x,
            p.y,
            p.z,
            attributes.try_float(particle_keys::OCCUPANCY).unwrap_or(1.0),
            attributes.try_float(particle_keys::TEMPERATURE_FACTOR).unwrap_or(0.0),
            truncated(text(particle_keys::ELEMENT), 2),
            truncated(text(particle_keys::CHARGE), 2),
        )?;
        Ok(())
    }

    fn write_ter(&mut self, serial: i64, last: &Particle) -> Result<(), PdbError> {
        let attributes = &last.attributes;
        let residue_name = self.residue_name(last)?;
        writeln!(
            self.writer,
            "TER   {:>5}      {:>3} {:1}{:>4}",
            serial % 100000,
            truncated(&residue_name, 3),
            truncated(attributes.try_string(particle_keys::CHAIN_ID).unwrap_or(""), 1),
            attributes.try_integer(particle_keys::RESIDUE_SEQUENCE).unwrap_or(1) % 10000,
        )?;
        Ok(())
    }
}

impl<W: Write> WriteTrajectory for PdbWriter<W> {
    type Error = PdbError;

    fn write_header(&mut self, header: &AttributeMap) -> Result<(), PdbError> {
        for comment in header.try_strings(keys::COMMENT).unwrap_or_default() {
            writeln!(self.writer, "REMARK {}", comment)?;
        }
        self.nparticle = header
            .try_integer(keys::NPARTICLE)
            .map(|n| n.max(0) as usize);
        Ok(())
    }

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), PdbError> {
        let expected = *self.nparticle.get_or_insert(snapshot.len());
        if snapshot.len() != expected {
            return Err(ParticleCountMismatch {
                expected,
                found: snapshot.len(),
            }
            .into());
        }

        if let Some(width) = snapshot.boundary.width() {
            writeln!(
                self.writer,
                "CRYST1{:9.3}{:9.3}{:9.3}{:7.2}{:7.2}{:7.2} P 1           1",
                width.x, width.y, width.z, 90.0, 90.0, 90.0
            )?;
        }
        writeln!(self.writer, "MODEL     {:4}", self.frames_written + 1)?;

        let mut serial = 0i64;
        let particles = snapshot.particles();
        for (i, particle) in particles.iter().enumerate() {
            serial = particle
                .attributes
                .try_integer(particle_keys::SERIAL)
                .unwrap_or(serial + 1);
            self.write_atom(serial, particle)?;

            let chain_ends = match particles.get(i + 1) {
                Some(next) => {
                    next.attributes.try_string(particle_keys::CHAIN_ID)
                        != particle.attributes.try_string(particle_keys::CHAIN_ID)
                }
                None => true,
            };
            if chain_ends {
                serial += 1;
                self.write_ter(serial, particle)?;
            }
        }
        writeln!(self.writer, "ENDMDL")?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn finish(&mut self) -> Result<(), PdbError> {
        if !self.finished {
            writeln!(self.writer, "END")?;
            self.finished = true;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::trajectory::Trajectory;
    use std::io::Cursor;

    const TWO_CHAINS: &str = "\
TITLE     TEST PEPTIDE
CRYST1   40.000   50.000   60.000  90.00  90.00  90.00 P 1           1
ATOM      1  CA  ALA A   1      11.104   6.134  -6.504  1.00 12.50           C
ATOM      2  CA  GLY A   2      11.639   6.071  -5.147  0.50  8.00
TER       3      GLY A   2
HETATM    4  CA  LYS B   1      12.001   7.000  -4.000  1.00  0.00           C
END
";

    fn read(content: &str, flavor: PdbFlavor) -> Result<Trajectory, PdbError> {
        PdbReader::new(Cursor::new(content.to_string()), flavor).read_trajectory()
    }

    #[test]
    fn single_model_file_is_one_frame_with_metadata() {
        let trajectory = read(TWO_CHAINS, PdbFlavor::Standard).unwrap();
        assert_eq!(trajectory.len(), 1);
        assert_eq!(trajectory.header.try_integer(keys::NPARTICLE), Some(3));
        assert_eq!(trajectory.header.try_integer(keys::NUNIT), Some(2));
        assert_eq!(
            trajectory.header.try_strings(keys::COMMENT),
            Some(vec!["TEST PEPTIDE".to_string()])
        );

        let frame = &trajectory.snapshots()[0];
        assert_eq!(
            frame.boundary,
            BoundaryCondition::CuboidalPeriodic {
                width: Vector3::new(40.0, 50.0, 60.0)
            }
        );
        let first = &frame[0];
        assert_eq!(first.position, Vector3::new(11.104, 6.134, -6.504));
        assert_eq!(first.name(), Some("CA"));
        assert_eq!(first.attributes.try_string(particle_keys::RESIDUE_NAME), Some("ALA"));
        assert_eq!(first.attributes.try_string(particle_keys::CHAIN_ID), Some("A"));
        assert_eq!(first.attributes.try_integer(particle_keys::SERIAL), Some(1));
        assert_eq!(first.attributes.try_float(particle_keys::TEMPERATURE_FACTOR), Some(12.5));
        assert_eq!(first.element(), Some("C"));
        // Element column blank: inferred from the atom name.
        assert_eq!(frame[1].element(), Some("C"));
        assert_eq!(frame[1].attributes.try_float(particle_keys::OCCUPANCY), Some(0.5));
        assert_eq!(frame[2].attributes.try_string(particle_keys::RECORD), Some("HETATM"));
    }

    #[test]
    fn coarse_grained_maps_residue_codes() {
        let trajectory = read(TWO_CHAINS, PdbFlavor::CoarseGrained).unwrap();
        let codes: Vec<_> = trajectory.snapshots()[0]
            .iter()
            .map(|p| p.attributes.try_string(particle_keys::RESIDUE_CODE).unwrap().to_string())
            .collect();
        assert_eq!(codes, ["A", "G", "K"]);
    }

    #[test]
    fn coarse_grained_rejects_unknown_residue() {
        let content = TWO_CHAINS.replace("LYS", "XYZ");
        let err = read(&content, PdbFlavor::CoarseGrained).unwrap_err();
        assert!(matches!(
            err,
            PdbError::Parse {
                line: 6,
                kind: PdbParseErrorKind::Lookup(LookupError::UnknownResidue(_))
            }
        ));
    }

    #[test]
    fn bad_coordinate_reports_line_and_columns() {
        let content = TWO_CHAINS.replace("11.639", "11.6x9");
        let err = read(&content, PdbFlavor::Standard).unwrap_err();
        assert!(matches!(
            err,
            PdbError::Parse {
                line: 4,
                kind: PdbParseErrorKind::InvalidFloat { columns: "31-38", .. }
            }
        ));
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let err =
            read("ATOM      1  CA  ALA A   1      11.104\n", PdbFlavor::Standard).unwrap_err();
        assert!(matches!(
            err,
            PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::LineTooShort
            }
        ));
    }

    fn models() -> String {
        let mut content = String::new();
        for model in 0..3 {
            content.push_str(&format!("MODEL     {:4}\n", model + 1));
            for atom in 0..2 {
                content.push_str(&format!(
                    "ATOM  {:>5}  CA  ALA A{:>4}    {:8.3}{:8.3}{:8.3}  1.00  0.00           C\n",
                    atom + 1,
                    atom + 1,
                    model as f64,
                    atom as f64,
                    0.5
                ));
            }
            content.push_str("ENDMDL\n");
        }
        content.push_str("END\n");
        content
    }

    #[test]
    fn models_are_indexed_and_seekable() {
        let mut reader = PdbReader::new(Cursor::new(models()), PdbFlavor::Standard);
        let header = reader.read_header().unwrap();
        assert_eq!(header.try_integer(keys::NSET), Some(3));
        assert_eq!(header.try_integer(keys::NPARTICLE), Some(2));

        let third = reader.read_frame_at(2).unwrap().unwrap();
        assert_eq!(third[0].position.x, 2.0);
        assert!(reader.is_eof().unwrap());
        assert!(reader.read_frame().unwrap().is_none());

        reader.rewind().unwrap();
        let first = reader.read_frame().unwrap().unwrap();
        assert_eq!(first[1].position, Vector3::new(0.0, 1.0, 0.5));
        let second = reader.read_frame().unwrap().unwrap();
        assert_eq!(second[0].position.x, 1.0);
    }

    #[test]
    fn written_file_reads_back_identically() {
        let original = read(TWO_CHAINS, PdbFlavor::Standard).unwrap();
        let mut doubled = original.clone();
        doubled.push(original.snapshots()[0].clone());

        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::Standard);
        writer.write_trajectory(&doubled).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text.matches("TER").count(), 4);
        assert!(text.ends_with("ENDMDL\nEND\n"));
        assert!(text.contains(
            "ATOM      1  CA  ALA A   1      11.104   6.134  -6.504  1.00 12.50           C"
        ));

        let read_back = read(&text, PdbFlavor::Standard).unwrap();
        assert_eq!(read_back.len(), 2);
        for frame in &read_back {
            assert_eq!(frame.boundary, original.snapshots()[0].boundary);
            for (a, b) in frame.iter().zip(original.snapshots()[0].iter()) {
                assert!((a.position - b.position).norm() < 1e-3);
                assert_eq!(a.name(), b.name());
                assert_eq!(
                    a.attributes.try_string(particle_keys::CHAIN_ID),
                    b.attributes.try_string(particle_keys::CHAIN_ID)
                );
            }
        }
    }

    #[test]
    fn coarse_grained_writer_derives_residue_name_from_code() {
        let particle = Particle::new(Vector3::new(1.0, 2.0, 3.0))
            .with_attribute(particle_keys::NAME, "CA")
            .with_attribute(particle_keys::RESIDUE_CODE, "W");
        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::CoarseGrained);
        writer.write_frame(&Snapshot::new(vec![particle])).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains(" CA  TRP "));

        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::CoarseGrained);
        let bare = Snapshot::from_positions(&[Vector3::zeros()]);
        assert!(matches!(writer.write_frame(&bare), Err(PdbError::Lookup(_))));
    }

    #[test]
    fn long_names_are_cut_on_character_boundaries() {
        let particle = Particle::new(Vector3::zeros())
            .with_attribute(particle_keys::NAME, "CCC\u{3a9}X")
            .with_attribute(particle_keys::RESIDUE_NAME, "\u{e9}\u{e9}\u{e9}\u{e9}")
            .with_attribute(particle_keys::CHAIN_ID, "\u{3a9}B");
        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::Standard);
        writer.write_frame(&Snapshot::new(vec![particle])).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains("CCC\u{3a9} \u{e9}\u{e9}\u{e9} \u{3a9}"));

        assert_eq!(format_atom_name("CCC\u{3a9}"), "CCC\u{3a9}");
        assert_eq!(truncated("\u{3a9}\u{3a9}", 1), "\u{3a9}");
        assert_eq!(truncated("CA", 4), "CA");
    }

    #[test]
    fn coarse_grained_dna_beads_keep_their_base_names() {
        let content = "\
ATOM      1  P    DG A   1       1.000   2.000   3.000  1.00  0.00
ATOM      2  CA  GLY A   2       4.000   5.000   6.000  1.00  0.00
END
";
        let trajectory = read(content, PdbFlavor::CoarseGrained).unwrap();
        let mut frame = trajectory.snapshots()[0].clone();
        assert_eq!(frame[0].attributes.try_bool(particle_keys::DNA), Some(true));
        assert_eq!(frame[1].attributes.try_bool(particle_keys::DNA), None);

        for particle in frame.particles_mut() {
            particle.attributes.remove(particle_keys::RESIDUE_NAME);
        }
        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::CoarseGrained);
        writer.write_frame(&frame).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains(" P    DG A   1"));
        assert!(text.contains(" CA  GLY A   2"));
    }

    #[test]
    fn writer_rejects_changing_particle_count() {
        let mut writer = PdbWriter::new(Vec::new(), PdbFlavor::Standard);
        writer
            .write_frame(&Snapshot::from_positions(&[Vector3::zeros(); 2]))
            .unwrap();
        assert!(matches!(
            writer.write_frame(&Snapshot::from_positions(&[Vector3::zeros()])),
            Err(PdbError::ParticleCount(_))
        ));
    }
}
