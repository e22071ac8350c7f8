//! Format-native records, exactly as each parser reads them.
//!
//! Nothing here is normalized: field presence and spelling follow the source
//! tool. [`crate::adapt`] turns any of them into a [`crate::Capture`].

use serde::Serialize;

use crate::FormatId;

/// One record pulled from a capture file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    /// 1-based position of the record within its file.
    pub ordinal: usize,
    pub native: NativeRecord,
}

impl RawRecord {
    pub fn new(ordinal: usize, native: NativeRecord) -> Self {
        Self { ordinal, native }
    }

    pub fn format(&self) -> FormatId {
        self.native.format()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeRecord {
    RaftCapture(RaftCaptureRecord),
    BurpLog(BurpLogEntry),
    BurpItem(BurpItem),
    BurpIssue(BurpIssue),
    AppScanTraffic(AppScanTraffic),
    WebScarabConversation(WebScarabConversation),
    ParosMessage(ParosMessage),
}

impl NativeRecord {
    pub fn format(&self) -> FormatId {
        match self {
            NativeRecord::RaftCapture(_) => FormatId::RaftCaptureXml,
            NativeRecord::BurpLog(_) => FormatId::BurpLog,
            NativeRecord::BurpItem(_) => FormatId::BurpXml,
            NativeRecord::BurpIssue(_) => FormatId::BurpVulnXml,
            NativeRecord::AppScanTraffic(_) => FormatId::AppscanXml,
            NativeRecord::WebScarabConversation(_) => FormatId::Webscarab,
            NativeRecord::ParosMessage(_) => FormatId::ParosMessage,
        }
    }
}

/// `<capture>` element of a RAFT capture export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RaftCaptureRecord {
    pub method: Option<String>,
    pub url: Option<String>,
    pub host: Option<String>,
    pub host_ip: Option<String>,
    pub datetime: Option<String>,
    /// Request line plus header block.
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request_headers: Vec<u8>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request_body: Vec<u8>,
    pub status: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub elapsed: Option<String>,
    /// Status line plus header block; `None` when no response was captured.
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response_headers: Option<Vec<u8>>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub response_body: Vec<u8>,
    pub notes: Option<String>,
    pub confirmed: Option<String>,
}

/// One entry of a Burp proxy log (`====` separated text).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurpLogEntry {
    pub time: String,
    /// `scheme://host:port` printed in the entry header.
    pub base_url: String,
    pub host_ip: Option<String>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
}

/// `<item>` of a Burp "save items" XML export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurpItem {
    pub time: Option<String>,
    pub url: Option<String>,
    pub host: Option<String>,
    pub host_ip: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    pub status: Option<String>,
    pub mime_type: Option<String>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
    pub comment: Option<String>,
}

/// One request/response pair of an `<issue>` in a Burp scanner report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurpIssue {
    pub serial_number: Option<String>,
    pub issue_type: Option<String>,
    pub name: Option<String>,
    /// Base URL, e.g. `http://www.example.com`.
    pub host: Option<String>,
    pub host_ip: Option<String>,
    pub path: Option<String>,
    pub location: Option<String>,
    pub severity: Option<String>,
    pub confidence: Option<String>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
}

/// `<test-http-traffic>` block of an AppScan XML report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppScanTraffic {
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
}

/// Conversation from a WebScarab saved session directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebScarabConversation {
    pub id: String,
    pub when: Option<String>,
    pub method: Option<String>,
    /// e.g. `200 OK`.
    pub status: Option<String>,
    pub url: Option<String>,
    pub origin: Option<String>,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
}

/// Message from a Paros session export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParosMessage {
    pub number: u64,
    #[serde(with = "crate::serde_helpers::base64_bytes")]
    pub request: Vec<u8>,
    #[serde(serialize_with = "crate::serde_helpers::base64_opt_bytes::serialize")]
    pub response: Option<Vec<u8>>,
}
