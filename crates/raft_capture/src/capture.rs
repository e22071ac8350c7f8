use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FormatId;

/// Canonical view of one intercepted HTTP transaction.
///
/// This is the shape plugins receive (as JSON) and may hand back from
/// `capture_filter` to rewrite the record for later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    /// Opaque identifier, unique within one input file.
    pub id: String,
    pub origin: FormatId,
    pub method: String,
    pub url: String,
    pub host: String,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    pub request: HttpMessage,
    #[serde(default)]
    pub response: Option<HttpMessage>,
    /// The source record as the parser produced it.
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Request or response split into start line, headers and body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMessage {
    pub start_line: String,
    #[serde(default)]
    pub headers: Vec<HttpHeader>,
    #[serde(default, with = "crate::serde_helpers::base64_bytes")]
    pub body: Vec<u8>,
}

impl HttpMessage {
    /// Splits a raw message at the first blank line.
    pub fn parse(bytes: &[u8]) -> Self {
        let (head, body) = split_head(bytes);
        Self::from_parts(head, body)
    }

    /// Builds a message from a separately stored header block and body.
    pub fn from_parts(head: &[u8], body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let mut lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line));

        let start_line = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .unwrap_or_default();

        let mut headers: Vec<HttpHeader> = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with(|c: char| c == ' ' || c == '\t') {
                if let Some(last) = headers.last_mut() {
                    last.value.push(' ');
                    last.value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push(HttpHeader {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                });
            }
        }

        Self {
            start_line,
            headers,
            body: body.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_line.is_empty() && self.headers.is_empty() && self.body.is_empty()
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    /// Whitespace-separated token `index` of the start line.
    pub fn start_token(&self, index: usize) -> Option<&str> {
        self.start_line.split_whitespace().nth(index)
    }
}

fn split_head(bytes: &[u8]) -> (&[u8], &[u8]) {
    let crlf = find(bytes, b"\r\n\r\n").map(|idx| (idx, 4));
    let lf = find(bytes, b"\n\n").map(|idx| (idx, 2));
    let boundary = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match boundary {
        Some((idx, len)) => (&bytes[..idx], &bytes[idx + len..]),
        None => (bytes, &bytes[bytes.len()..]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
