//! RAFT's own capture export:
//!
//! ```xml
//! <raft version="1.0">
//!   <capture>
//!     <request>
//!       <method>GET</method><url>http://example.com/</url><host>example.com</host>
//!       <hostip>192.0.2.1</hostip><datetime>..</datetime>
//!       <headers encoding="base64">..</headers><body encoding="base64">..</body>
//!     </request>
//!     <response>
//!       <status>200</status><content_type>..</content_type><content_length>..</content_length>
//!       <elapsed>..</elapsed><headers encoding="base64">..</headers><body encoding="base64">..</body>
//!     </response>
//!     <analysis><notes>..</notes><confirmed>false</confirmed></analysis>
//!   </capture>
//! </raft>
//! ```

use std::path::Path;

use super::{numbered, RawRecordStream};
use crate::reader::{XmlElement, XmlRecordReader};
use crate::{IngestLimits, NativeRecord, ParserStreamError, RaftCaptureRecord};

pub fn parse(path: &Path, _limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    let reader = XmlRecordReader::open(path, "capture")?;
    let path = path.to_path_buf();
    Ok(numbered(reader.map(move |element| {
        element.and_then(|capture| to_record(&path, &capture))
    })))
}

fn to_record(path: &Path, capture: &XmlElement) -> Result<NativeRecord, ParserStreamError> {
    let payload = |section: &str| -> Result<Option<Vec<u8>>, ParserStreamError> {
        capture
            .descend(section)
            .map(|element| element.payload(path))
            .transpose()
    };

    Ok(NativeRecord::RaftCapture(RaftCaptureRecord {
        method: capture.text_at("request/method"),
        url: capture.text_at("request/url"),
        host: capture.text_at("request/host"),
        host_ip: capture.text_at("request/hostip"),
        datetime: capture.text_at("request/datetime"),
        request_headers: payload("request/headers")?.unwrap_or_default(),
        request_body: payload("request/body")?.unwrap_or_default(),
        status: capture.text_at("response/status"),
        content_type: capture.text_at("response/content_type"),
        content_length: capture.text_at("response/content_length"),
        elapsed: capture.text_at("response/elapsed"),
        response_headers: payload("response/headers")?,
        response_body: payload("response/body")?.unwrap_or_default(),
        notes: capture.text_at("analysis/notes"),
        confirmed: capture.text_at("analysis/confirmed"),
    }))
}
