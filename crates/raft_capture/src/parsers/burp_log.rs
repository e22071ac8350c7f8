//! Burp proxy text logs. Each entry looks like
//!
//! ```text
//! ======================================================
//! 1:23:45 PM  http://www.example.com:80  [192.0.2.10]
//! ======================================================
//! GET / HTTP/1.1
//! Host: www.example.com
//!
//! ======================================================
//! HTTP/1.1 200 OK
//! ...
//! ======================================================
//! ```
//!
//! Entries logged without a response have only blank lines where the
//! response block would be.

use std::path::Path;

use super::{numbered, RawRecordStream};
use crate::reader::{join_lines, Line, LogLines};
use crate::{BurpLogEntry, FormatId, IngestLimits, NativeRecord, ParserStreamError};

const MIN_SEPARATOR_LEN: usize = 20;

pub fn parse(path: &Path, limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    let lines = LogLines::open(path, limits)?;
    Ok(numbered(BurpLogEntries {
        lines,
        pushed_back: None,
    }))
}

fn is_separator(line: &Line) -> bool {
    let text = line.text();
    let text = text.trim();
    text.len() >= MIN_SEPARATOR_LEN && text.bytes().all(|b| b == b'=')
}

struct BurpLogEntries {
    lines: LogLines,
    pushed_back: Option<Line>,
}

enum Block {
    Separated(Vec<Line>),
    Eof(Vec<Line>),
}

impl BurpLogEntries {
    fn next_line(&mut self) -> Option<Result<Line, ParserStreamError>> {
        match self.pushed_back.take() {
            Some(line) => Some(Ok(line)),
            None => self.lines.next(),
        }
    }

    /// Lines up to (not including) the next separator.
    fn block(&mut self) -> Result<(Block, Option<Line>), ParserStreamError> {
        let mut collected = Vec::new();
        while let Some(line) = self.next_line() {
            let line = line?;
            if is_separator(&line) {
                return Ok((Block::Separated(collected), Some(line)));
            }
            collected.push(line);
        }
        Ok((Block::Eof(collected), None))
    }

    fn malformed(&self, line_number: usize, message: impl Into<String>) -> ParserStreamError {
        ParserStreamError::Malformed {
            format: FormatId::BurpLog,
            path: self.lines.path().to_path_buf(),
            location: format!("line {line_number}"),
            message: message.into(),
        }
    }

    fn next_entry(&mut self) -> Result<Option<BurpLogEntry>, ParserStreamError> {
        // Opening separator; anything between entries is padding.
        loop {
            let Some(line) = self.next_line() else {
                return Ok(None);
            };
            if is_separator(&line?) {
                break;
            }
        }

        // Header line, skipping runs of separators.
        let header = loop {
            let Some(line) = self.next_line() else {
                return Ok(None);
            };
            let line = line?;
            if !is_separator(&line) {
                break line;
            }
        };

        let (time, base_url, host_ip) = self.parse_header(&header)?;

        match self.next_line() {
            Some(line) => {
                let line = line?;
                if !is_separator(&line) {
                    return Err(self.malformed(line.number, "expected separator after entry header"));
                }
            }
            None => return Err(self.malformed(header.number, "entry ends after its header")),
        }

        let request = match self.block()? {
            (Block::Separated(lines), _) => join_lines(&lines),
            (Block::Eof(lines), _) => {
                return Ok(Some(BurpLogEntry {
                    time,
                    base_url,
                    host_ip,
                    request: join_lines(&lines),
                    response: None,
                }))
            }
        };

        let response = match self.block()? {
            (Block::Separated(lines), separator) => {
                if lines.iter().all(Line::is_blank) {
                    // No response: that separator opens the next entry.
                    self.pushed_back = separator;
                    None
                } else {
                    Some(join_lines(&lines))
                }
            }
            (Block::Eof(lines), _) => {
                Some(join_lines(&lines)).filter(|_| !lines.iter().all(Line::is_blank))
            }
        };

        Ok(Some(BurpLogEntry {
            time,
            base_url,
            host_ip,
            request,
            response,
        }))
    }

    fn parse_header(
        &self,
        header: &Line,
    ) -> Result<(String, String, Option<String>), ParserStreamError> {
        let text = header.text();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(url_index) = tokens.iter().position(|token| token.contains("://")) else {
            return Err(self.malformed(header.number, "entry header carries no base URL"));
        };
        let time = tokens[..url_index].join(" ");
        let base_url = tokens[url_index].to_string();
        let host_ip = tokens[url_index + 1..]
            .iter()
            .find_map(|token| token.strip_prefix('[').and_then(|t| t.strip_suffix(']')))
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);
        Ok((time, base_url, host_ip))
    }
}

impl Iterator for BurpLogEntries {
    type Item = Result<NativeRecord, ParserStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|entry| entry.map(NativeRecord::BurpLog)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEP: &str = "======================================================";

    fn parse_str(contents: &str) -> Vec<Result<crate::RawRecord, ParserStreamError>> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.log");
        std::fs::write(&path, contents).unwrap();
        parse(&path, &IngestLimits::default()).unwrap().collect()
    }

    fn entry(record: &Result<crate::RawRecord, ParserStreamError>) -> &BurpLogEntry {
        match &record.as_ref().unwrap().native {
            NativeRecord::BurpLog(entry) => entry,
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn reads_entries_with_and_without_responses() {
        let log = format!(
            "{SEP}\n1:23:45 PM  http://a.test:80  [192.0.2.10]\n{SEP}\nGET / HTTP/1.1\nHost: a.test\n\n{SEP}\nHTTP/1.1 200 OK\nContent-Type: text/html\n\nhello\n{SEP}\n\n\n\n\
             {SEP}\n1:23:46 PM  https://b.test:443\n{SEP}\nGET /x HTTP/1.1\n\n{SEP}\n\n\n\n\
             {SEP}\n1:23:47 PM  http://c.test:80  [192.0.2.11]\n{SEP}\nPOST /y HTTP/1.1\n\n{SEP}\nHTTP/1.1 204 No Content\n\n{SEP}\n"
        );
        let records = parse_str(&log);
        assert_eq!(records.len(), 3);

        let first = entry(&records[0]);
        assert_eq!(first.time, "1:23:45 PM");
        assert_eq!(first.base_url, "http://a.test:80");
        assert_eq!(first.host_ip.as_deref(), Some("192.0.2.10"));
        assert_eq!(first.request, b"GET / HTTP/1.1\nHost: a.test\n");
        assert_eq!(
            first.response.as_deref(),
            Some(&b"HTTP/1.1 200 OK\nContent-Type: text/html\n\nhello\n"[..])
        );

        let second = entry(&records[1]);
        assert_eq!(second.base_url, "https://b.test:443");
        assert!(second.host_ip.is_none());
        assert!(second.response.is_none());

        let third = entry(&records[2]);
        assert_eq!(third.base_url, "http://c.test:80");
        assert_eq!(records[2].as_ref().unwrap().ordinal, 3);
    }

    #[test]
    fn header_without_url_is_malformed() {
        let log = format!("{SEP}\nnot a header\n{SEP}\nGET / HTTP/1.1\n{SEP}\n");
        let records = parse_str(&log);
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(ParserStreamError::Malformed {
                format: FormatId::BurpLog,
                ..
            })
        ));
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(parse_str("").is_empty());
        assert!(parse_str("\n\n").is_empty());
    }
}
