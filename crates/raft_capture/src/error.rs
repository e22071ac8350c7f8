use std::{io, path::PathBuf};

use thiserror::Error;

use crate::FormatId;

/// Failure while pulling the next raw record out of a capture file.
///
/// Streams end after yielding one of these; the pipeline treats it as fatal
/// for the current file and the run.
#[derive(Debug, Error)]
pub enum ParserStreamError {
    #[error("failed to open `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error while reading `{path}` (line {line_number}): {source}")]
    Read {
        path: PathBuf,
        line_number: usize,
        #[source]
        source: io::Error,
    },
    #[error(
        "line {line_number} of `{path}` is too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})"
    )]
    LineTooLong {
        path: PathBuf,
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("malformed XML in `{path}` at byte {position}: {message}")]
    Xml {
        path: PathBuf,
        position: u64,
        message: String,
    },
    #[error("malformed {format} record in `{path}` ({location}): {message}")]
    Malformed {
        format: FormatId,
        path: PathBuf,
        location: String,
        message: String,
    },
    #[error("invalid base64 in <{element}> of `{path}`: {source}")]
    Base64 {
        path: PathBuf,
        element: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("{format} files are not supported (`{path}`)")]
    Unsupported { format: FormatId, path: PathBuf },
}

/// A raw record that cannot be turned into a [`crate::Capture`].
#[derive(Debug, Error)]
pub enum AdaptationError {
    #[error("record {id} carries neither request bytes nor a URL")]
    Empty { id: String },
    #[error("record {id} has no resolvable absolute URL (request target `{target}`)")]
    UnresolvableUrl { id: String, target: String },
    #[error("record {id} has an invalid URL `{url}`: {source}")]
    InvalidUrl {
        id: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("record {id} has an invalid status `{value}`")]
    InvalidStatus { id: String, value: String },
    #[error("record {id} could not retain its raw payload: {source}")]
    RawPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("unknown capture format `{0}`")]
pub struct UnknownFormat(pub String);
