//! Multi-frame XYZ files: a particle-count line, a comment line, then one
//! `symbol x y z` line per particle. Columns past the fourth are ignored.

use super::text::{Line, LineSource};
use super::traits::{ReadTrajectory, WriteTrajectory};
use crate::core::math::geometry::Vector3;
use crate::core::models::attributes::AttributeMap;
use crate::core::models::particle::{Particle, keys as particle_keys};
use crate::core::models::snapshot::{self, ParticleCountMismatch, Snapshot};
use crate::core::models::trajectory::keys;
use crate::core::utils::elements::element_from_atom_name;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error(transparent)]
    ParticleCount(#[from] ParticleCountMismatch),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid particle count '{0}'")]
    InvalidCount(String),
    #[error("Expected a symbol and three coordinates, found '{0}'")]
    MalformedParticle(String),
    #[error("File ends inside a frame ({missing} lines missing)")]
    TruncatedFrame { missing: usize },
}

#[derive(Debug, Clone, Copy)]
struct FrameMark {
    offset: u64,
    line: usize,
}

#[derive(Debug, Clone)]
struct XyzIndex {
    header: AttributeMap,
    frames: Vec<FrameMark>,
}

fn parse_count(line: &Line<'_>) -> Result<usize, XyzError> {
    let text = line.text.trim();
    text.parse().map_err(|_| XyzError::Parse {
        line: line.number,
        kind: XyzParseErrorKind::InvalidCount(text.to_string()),
    })
}

fn parse_particle(line: &Line<'_>) -> Result<Particle, XyzError> {
    let malformed = || XyzError::Parse {
        line: line.number,
        kind: XyzParseErrorKind::MalformedParticle(line.text.trim().to_string()),
    };
    let mut fields = line.text.split_whitespace();
    let symbol = fields.next().ok_or_else(malformed)?;
    let mut coordinate = || -> Result<f64, XyzError> {
        fields
            .next()
            .and_then(|value| value.parse().ok())
            .ok_or_else(malformed)
    };
    let position = Vector3::new(coordinate()?, coordinate()?, coordinate()?);
    Ok(Particle::new(position).with_attribute(particle_keys::ELEMENT, symbol))
}

/// XYZ reader. Frame starts are indexed on first access.
pub struct XyzReader<R: BufRead + Seek> {
    source: LineSource<R>,
    index: Option<XyzIndex>,
    current: usize,
}

impl XyzReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XyzError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead + Seek> XyzReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            source: LineSource::new(reader),
            index: None,
            current: 0,
        }
    }

    fn index(&mut self) -> Result<&XyzIndex, XyzError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let index = self.build_index()?;
                self.source.seek(0, 0)?;
                self.current = 0;
                index
            }
        };
        Ok(self.index.insert(index))
    }

    /// Next non-blank line, as an owned frame start.
    fn next_count(&mut self) -> Result<Option<(FrameMark, usize)>, XyzError> {
        while let Some(line) = self.source.next_line()? {
            if line.text.trim().is_empty() {
                continue;
            }
            let mark = FrameMark {
                offset: line.offset,
                line: line.number - 1,
            };
            return Ok(Some((mark, parse_count(&line)?)));
        }
        Ok(None)
    }

    fn build_index(&mut self) -> Result<XyzIndex, XyzError> {
        self.source.seek(0, 0)?;
        let mut frames = Vec::new();
        let mut nparticle = None;
        while let Some((mark, count)) = self.next_count()? {
            for read in 0..=count {
                if self.source.next_line()?.is_none() {
                    return Err(XyzError::Parse {
                        line: mark.line + 1,
                        kind: XyzParseErrorKind::TruncatedFrame {
                            missing: count + 1 - read,
                        },
                    });
                }
            }
            nparticle.get_or_insert(count);
            frames.push(mark);
        }
        let nparticle = nparticle.unwrap_or(0);
        debug!(nset = frames.len(), nparticle, "Indexed XYZ file.");
        let header = AttributeMap::new()
            .with(keys::NSET, frames.len())
            .with(keys::NPARTICLE, nparticle);
        Ok(XyzIndex { header, frames })
    }
}

impl<R: BufRead + Seek> ReadTrajectory for XyzReader<R> {
    type Error = XyzError;

    fn read_header(&mut self) -> Result<AttributeMap, XyzError> {
        Ok(self.index()?.header.clone())
    }

    fn read_frame(&mut self) -> Result<Option<Snapshot>, XyzError> {
        let total = self.index()?.frames.len();
        if self.current >= total {
            return Ok(None);
        }
        let Some((mark, count)) = self.next_count()? else {
            return Ok(None);
        };
        let comment = match self.source.next_line()? {
            Some(line) => line.text.to_string(),
            None => {
                return Err(XyzError::Parse {
                    line: mark.line + 1,
                    kind: XyzParseErrorKind::TruncatedFrame { missing: count + 1 },
                });
            }
        };
        let mut particles = Vec::with_capacity(count);
        for read in 0..count {
            match self.source.next_line()? {
                Some(line) => particles.push(parse_particle(&line)?),
                None => {
                    return Err(XyzError::Parse {
                        line: mark.line + 1,
                        kind: XyzParseErrorKind::TruncatedFrame {
                            missing: count - read,
                        },
                    });
                }
            }
        }
        self.current += 1;
        let mut snapshot = Snapshot::new(particles);
        snapshot.attributes.insert(snapshot::keys::COMMENT, comment);
        Ok(Some(snapshot))
    }

    fn read_frame_at(&mut self, index: usize) -> Result<Option<Snapshot>, XyzError> {
        let Some(mark) = self.index()?.frames.get(index).copied() else {
            return Ok(None);
        };
        self.source.seek(mark.offset, mark.line)?;
        self.current = index;
        self.read_frame()
    }

    fn rewind(&mut self) -> Result<(), XyzError> {
        self.index()?;
        self.source.seek(0, 0)?;
        self.current = 0;
        Ok(())
    }

    fn is_eof(&mut self) -> Result<bool, XyzError> {
        let total = self.index()?.frames.len();
        Ok(self.current >= total)
    }
}

pub struct XyzWriter<W: Write> {
    writer: W,
    nparticle: Option<usize>,
    frames_written: usize,
}

impl XyzWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, XyzError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> XyzWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            nparticle: None,
            frames_written: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Element symbol of a particle, falling back to its name, then `X`.
fn symbol_of(particle: &Particle) -> String {
    particle
        .element()
        .map(str::to_string)
        .or_else(|| particle.name().and_then(element_from_atom_name))
        .unwrap_or_else(|| "X".to_string())
}

impl<W: Write> WriteTrajectory for XyzWriter<W> {
    type Error = XyzError;

    fn write_header(&mut self, header: &AttributeMap) -> Result<(), XyzError> {
        self.nparticle = header
            .try_integer(keys::NPARTICLE)
            .map(|n| n.max(0) as usize);
        Ok(())
    }

    fn write_frame(&mut self, snapshot: &Snapshot) -> Result<(), XyzError> {
        let expected = *self.nparticle.get_or_insert(snapshot.len());
        if snapshot.len() != expected {
            return Err(ParticleCountMismatch {
                expected,
                found: snapshot.len(),
            }
            .into());
        }
        let comment = snapshot
            .attributes
            .try_string(snapshot::keys::COMMENT)
            .unwrap_or("");
        writeln!(self.writer, "{}", snapshot.len())?;
        writeln!(self.writer, "{}", comment.replace(['\n', '\r'], " "))?;
        for particle in snapshot {
            let p = particle.position;
            writeln!(
                self.writer,
                "{:2}  {:14.8}  {:14.8}  {:14.8}",
                symbol_of(particle),
                p.x,
                p.y,
                p.z
            )?;
        }
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn finish(&mut self) -> Result<(), XyzError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::trajectory::Trajectory;
    use std::io::Cursor;

    const WATER: &str = "3
frame one
O   0.000  0.000  0.000
H   0.757  0.586  0.000
H  -0.757  0.586  0.000 extra columns ignored

3
frame two
O   1.000  0.000  0.000
H   1.757  0.586  0.000
H   0.243  0.586  0.000
";

    fn reader(content: &str) -> XyzReader<Cursor<String>> {
        XyzReader::new(Cursor::new(content.to_string()))
    }

    #[test]
    fn reads_frames_with_comments_and_symbols() {
        let trajectory = reader(WATER).read_trajectory().unwrap();
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.nparticle(), Some(3));
        let second = &trajectory.snapshots()[1];
        assert_eq!(
            second.attributes.try_string(snapshot::keys::COMMENT),
            Some("frame two")
        );
        assert_eq!(second[1].element(), Some("H"));
        assert_eq!(second[2].position, Vector3::new(0.243, 0.586, 0.0));
    }

    #[test]
    fn read_frame_at_seeks_to_indexed_frame() {
        let mut reader = reader(WATER);
        let second = reader.read_frame_at(1).unwrap().unwrap();
        assert_eq!(second[0].position.x, 1.0);
        assert!(reader.is_eof().unwrap());
        assert!(reader.read_frame_at(2).unwrap().is_none());
        reader.rewind().unwrap();
        let first = reader.read_frame().unwrap().unwrap();
        assert_eq!(first[1].position, Vector3::new(0.757, 0.586, 0.0));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let content = "2\ncomment\nC 0 0 0\n";
        let err = reader(content).read_header().unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 1,
                kind: XyzParseErrorKind::TruncatedFrame { missing: 1 }
            }
        ));
    }

    #[test]
    fn malformed_lines_report_their_number() {
        let err = reader("1\n\nC 0 zero 0\n").read_trajectory().unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::MalformedParticle(_)
            }
        ));
        let err = reader("two\n").read_header().unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                line: 1,
                kind: XyzParseErrorKind::InvalidCount(_)
            }
        ));
    }

    #[test]
    fn writes_symbol_lines_that_read_back() {
        let snapshot = Snapshot::new(vec![
            Particle::new(Vector3::new(1.25, -2.5, 3.125))
                .with_attribute(particle_keys::ELEMENT, "N"),
            Particle::new(Vector3::new(0.1, 0.2, 0.3)).with_attribute(particle_keys::NAME, "CA"),
            Particle::new(Vector3::new(4.0, 5.0, 6.0)),
        ]);
        let trajectory = Trajectory::from_snapshots(AttributeMap::new(), vec![snapshot.clone()]);
        let mut writer = XyzWriter::new(Vec::new());
        writer.write_trajectory(&trajectory).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "3");
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with("N "));
        assert!(lines[3].starts_with("C "));
        assert!(lines[4].starts_with("X "));

        let read = reader(&text).read_trajectory().unwrap();
        for (a, b) in read.snapshots()[0].iter().zip(snapshot.iter()) {
            assert!((a.position - b.position).norm() < 1e-5);
        }
    }
}
