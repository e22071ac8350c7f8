mod sync;
mod xml;

use std::{
    borrow::Cow,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

pub use sync::{BoundedLine, BoundedLines};
pub(crate) use xml::{XmlElement, XmlRecordReader};

use tracing::debug;

use crate::{IngestLimits, ParserStreamError};

pub(crate) fn open(path: &Path) -> Result<File, ParserStreamError> {
    File::open(path).map_err(|source| ParserStreamError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub number: usize,
    pub bytes: Vec<u8>,
}

impl Line {
    /// Line text without the trailing `\r`.
    pub fn text(&self) -> Cow<'_, str> {
        let bytes = self.bytes.strip_suffix(b"\r").unwrap_or(&self.bytes);
        String::from_utf8_lossy(bytes)
    }

    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Bounded line stream over a file that turns read failures into
/// [`ParserStreamError`] and stops after the first one.
pub(crate) struct LogLines {
    lines: BoundedLines<BufReader<File>>,
    path: PathBuf,
    failed: bool,
}

impl LogLines {
    pub fn open(path: &Path, limits: &IngestLimits) -> Result<Self, ParserStreamError> {
        let file = open(path)?;
        debug!(path = %path.display(), max_line_bytes = limits.max_line_bytes, "streaming log lines");
        Ok(Self {
            lines: BoundedLines::new(BufReader::new(file), limits.max_line_bytes),
            path: path.to_path_buf(),
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for LogLines {
    type Item = Result<Line, ParserStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let outcome = match self.lines.next()? {
            BoundedLine::Line { line_number, bytes } => Ok(Line {
                number: line_number,
                bytes,
            }),
            BoundedLine::TooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            } => Err(ParserStreamError::LineTooLong {
                path: self.path.clone(),
                line_number,
                observed_bytes,
                max_line_bytes,
            }),
            BoundedLine::Failed {
                line_number,
                source,
            } => Err(ParserStreamError::Read {
                path: self.path.clone(),
                line_number,
                source,
            }),
        };
        self.failed = outcome.is_err();
        Some(outcome)
    }
}

/// Concatenates lines back into the bytes they were read from, dropping
/// trailing lines that are completely empty (log-format padding).
pub(crate) fn join_lines(lines: &[Line]) -> Vec<u8> {
    let keep = lines
        .iter()
        .rposition(|line| !line.bytes.is_empty())
        .map_or(0, |idx| idx + 1);
    let mut out = Vec::new();
    for line in &lines[..keep] {
        out.extend_from_slice(&line.bytes);
        out.push(b'\n');
    }
    out
}
