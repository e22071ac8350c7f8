//! Streaming parsers, one per registered capture format.
//!
//! A parser opens its input eagerly (so a missing file fails before the first
//! pull) and then yields records lazily. After the first `Err` the stream is
//! exhausted.

pub mod appscan_xml;
pub mod burp_log;
pub mod burp_state;
pub mod burp_xml;
pub mod paros;
pub mod raft_xml;
pub mod webscarab;

use std::path::Path;

use crate::{IngestLimits, NativeRecord, ParserStreamError, RawRecord};

/// Lazy, one-shot sequence of raw records.
pub type RawRecordStream = Box<dyn Iterator<Item = Result<RawRecord, ParserStreamError>>>;

/// Turns a file path into a [`RawRecordStream`].
pub type ParserFn = fn(&Path, &IngestLimits) -> Result<RawRecordStream, ParserStreamError>;

/// Numbers native records from 1 and ends the stream after the first error.
pub(crate) fn numbered<I>(natives: I) -> RawRecordStream
where
    I: Iterator<Item = Result<NativeRecord, ParserStreamError>> + 'static,
{
    let mut ordinal = 0usize;
    let mut failed = false;
    Box::new(natives.map_while(move |outcome| {
        if failed {
            return None;
        }
        match outcome {
            Ok(native) => {
                ordinal += 1;
                Some(Ok(RawRecord::new(ordinal, native)))
            }
            Err(err) => {
                failed = true;
                Some(Err(err))
            }
        }
    }))
}

/// Splits a combined dump (request, blank line, optional request body,
/// response) at the first line starting with `HTTP/` after the request head.
pub(crate) fn split_request_response(bytes: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
    let mut offset = 0;
    let mut past_head = false;
    for line in bytes.split_inclusive(|b| *b == b'\n') {
        if past_head && line.starts_with(b"HTTP/") {
            let request = trim_trailing_newlines(&bytes[..offset]);
            let response = trim_trailing_newlines(&bytes[offset..]);
            return (request.to_vec(), Some(response.to_vec()));
        }
        if offset > 0 && line.iter().all(|b| *b == b'\r' || *b == b'\n') {
            past_head = true;
        }
        offset += line.len();
    }
    (trim_trailing_newlines(bytes).to_vec(), None)
}

pub(crate) fn trim_trailing_newlines(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |idx| idx + 1);
    &bytes[..end]
}

/// Drops leading lines that hold only whitespace (XML indentation).
pub(crate) fn trim_leading_blank_lines(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    for line in bytes.split_inclusive(|b| *b == b'\n') {
        if !line.iter().all(|b| b.is_ascii_whitespace()) {
            break;
        }
        start += line.len();
    }
    &bytes[start..]
}
