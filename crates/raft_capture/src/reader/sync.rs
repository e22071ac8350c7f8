use std::io::{self, BufRead};

/// One step of [`BoundedLines`].
#[derive(Debug)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    Failed {
        line_number: usize,
        source: io::Error,
    },
}

/// Splits a buffered reader into `\n`-terminated lines, holding at most
/// `max_line_bytes` of any single line in memory. The terminator is
/// stripped; a preceding `\r` is kept so HTTP payloads can be rebuilt byte
/// for byte. An oversized line is reported once and skipped; a read failure
/// ends the iteration.
pub struct BoundedLines<R> {
    reader: R,
    max_line_bytes: usize,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> BoundedLines<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            line_number: 0,
            done: false,
        }
    }

    /// Kept bytes and full length of the next line; `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<(Vec<u8>, usize)>> {
        let mut kept = Vec::new();
        let mut observed = 0usize;
        let mut started = false;
        loop {
            let chunk = match self.reader.fill_buf() {
                Ok(chunk) => chunk,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if chunk.is_empty() {
                return Ok(started.then_some((kept, observed)));
            }
            started = true;

            let newline = chunk.iter().position(|b| *b == b'\n');
            let segment = newline.map_or(chunk, |idx| &chunk[..idx]);
            observed = observed.saturating_add(segment.len());
            if observed <= self.max_line_bytes {
                kept.extend_from_slice(segment);
            } else if !kept.is_empty() {
                kept = Vec::new();
            }

            let consumed = newline.map_or(chunk.len(), |idx| idx + 1);
            self.reader.consume(consumed);
            if newline.is_some() {
                return Ok(Some((kept, observed)));
            }
        }
    }
}

impl<R: BufRead> Iterator for BoundedLines<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let line_number = self.line_number + 1;
        match self.read_line() {
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some((bytes, observed_bytes))) => {
                self.line_number = line_number;
                if observed_bytes > self.max_line_bytes {
                    Some(BoundedLine::TooLong {
                        line_number,
                        observed_bytes,
                        max_line_bytes: self.max_line_bytes,
                    })
                } else {
                    Some(BoundedLine::Line { line_number, bytes })
                }
            }
            Err(source) => {
                self.line_number = line_number;
                self.done = true;
                Some(BoundedLine::Failed {
                    line_number,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    #[test]
    fn oversized_line_is_reported_and_iteration_continues() {
        let mut bytes = b"ok\n".to_vec();
        bytes.extend_from_slice(&[b'a'; 50]);
        bytes.extend_from_slice(b"\nnext\n");

        // A tiny buffer makes the long line span several chunks.
        let reader = BufReader::with_capacity(4, Cursor::new(bytes));
        let lines: Vec<_> = BoundedLines::new(reader, 16).collect();

        assert_eq!(lines.len(), 3);
        assert!(matches!(lines[0], BoundedLine::Line { line_number: 1, .. }));
        assert!(matches!(
            lines[1],
            BoundedLine::TooLong {
                line_number: 2,
                observed_bytes: 50,
                max_line_bytes: 16
            }
        ));
        match &lines[2] {
            BoundedLine::Line { line_number, bytes } => {
                assert_eq!(*line_number, 3);
                assert_eq!(bytes, b"next");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn carriage_returns_survive_and_last_line_needs_no_terminator() {
        let lines: Vec<Vec<u8>> = BoundedLines::new(Cursor::new(b"a\r\nb".to_vec()), 64)
            .filter_map(|line| match line {
                BoundedLine::Line { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![b"a\r".to_vec(), b"b".to_vec()]);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk went away"))
        }
    }

    #[test]
    fn read_failure_ends_iteration_after_one_error() {
        let mut lines = BoundedLines::new(BufReader::new(FailingReader), 64);
        assert!(matches!(
            lines.next(),
            Some(BoundedLine::Failed { line_number: 1, .. })
        ));
        assert!(lines.next().is_none());
    }
}
