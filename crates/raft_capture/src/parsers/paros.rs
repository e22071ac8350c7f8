//! Paros session exports: messages introduced by `==== <n> ==========`, each
//! holding the request and, when one was received, the response.

use std::path::Path;

use super::{numbered, split_request_response, RawRecordStream};
use crate::reader::{join_lines, Line, LogLines};
use crate::{FormatId, IngestLimits, NativeRecord, ParosMessage, ParserStreamError};

pub fn parse(path: &Path, limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    let lines = LogLines::open(path, limits)?;
    Ok(numbered(ParosMessages {
        lines,
        current: None,
        done: false,
    }))
}

/// Message number of a delimiter line, e.g. `==== 12 ==========`.
fn delimiter_number(line: &Line) -> Option<Result<u64, String>> {
    let text = line.text();
    let rest = text.trim().strip_prefix("==== ")?;
    let (number, tail) = rest.split_once(' ')?;
    if tail.is_empty() || !tail.bytes().all(|b| b == b'=') {
        return None;
    }
    Some(
        number
            .parse()
            .map_err(|_| format!("invalid message number `{number}`")),
    )
}

struct ParosMessages {
    lines: LogLines,
    /// Number of the message whose body is being collected.
    current: Option<u64>,
    done: bool,
}

impl ParosMessages {
    fn malformed(&self, line_number: usize, message: String) -> ParserStreamError {
        ParserStreamError::Malformed {
            format: FormatId::ParosMessage,
            path: self.lines.path().to_path_buf(),
            location: format!("line {line_number}"),
            message,
        }
    }

    fn finish(number: u64, body: &[Line]) -> NativeRecord {
        let (request, response) = split_request_response(&join_lines(body));
        NativeRecord::ParosMessage(ParosMessage {
            number,
            request,
            response,
        })
    }

    fn next_message(&mut self) -> Result<Option<NativeRecord>, ParserStreamError> {
        let mut body = Vec::new();
        loop {
            let Some(line) = self.lines.next() else {
                self.done = true;
                return Ok(self.current.take().map(|number| Self::finish(number, &body)));
            };
            let line = line?;
            match delimiter_number(&line) {
                Some(Ok(number)) => {
                    if let Some(previous) = self.current.replace(number) {
                        return Ok(Some(Self::finish(previous, &body)));
                    }
                }
                Some(Err(message)) => return Err(self.malformed(line.number, message)),
                None if self.current.is_some() => body.push(line),
                None if line.is_blank() => {}
                None => {
                    return Err(self.malformed(
                        line.number,
                        "content before the first message delimiter".to_string(),
                    ))
                }
            }
        }
    }
}

impl Iterator for ParosMessages {
    type Item = Result<NativeRecord, ParserStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let outcome = self.next_message();
        if outcome.is_err() {
            self.done = true;
        }
        outcome.transpose()
    }
}
