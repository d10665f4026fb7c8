use std::io::{self, BufRead, Seek, SeekFrom};

/// One line of text, without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    /// Byte offset of the first character.
    pub offset: u64,
    /// 1-based line number.
    pub number: usize,
    pub text: &'a str,
}

/// Line-oriented reading with byte offsets and line numbers, so text codecs
/// can index frame starts and seek back to them.
pub(crate) struct LineSource<R> {
    reader: R,
    offset: u64,
    line_number: usize,
    buf: String,
}

impl<R: BufRead + Seek> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            line_number: 0,
            buf: String::new(),
        }
    }

    pub fn next_line(&mut self) -> io::Result<Option<Line<'_>>> {
        self.buf.clear();
        let start = self.offset;
        let read = self.reader.read_line(&mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.offset += read as u64;
        self.line_number += 1;
        Ok(Some(Line {
            offset: start,
            number: self.line_number,
            text: self.buf.trim_end_matches(['\n', '\r']),
        }))
    }

    /// Moves to `offset`, which must be the start of the line following line
    /// `line_number`.
    pub fn seek(&mut self, offset: u64, line_number: usize) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        self.line_number = line_number;
        Ok(())
    }
}

/// Columns `start..end` of a fixed-width record, trimmed. Short lines yield `""`.
pub(crate) fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("").trim()
}
