//! AppScan XML reports. Every `<test-http-traffic>` element holds the raw
//! request followed by the raw response.

use std::path::Path;

use super::{numbered, split_request_response, trim_leading_blank_lines, RawRecordStream};
use crate::reader::XmlRecordReader;
use crate::{AppScanTraffic, IngestLimits, NativeRecord, ParserStreamError};

pub fn parse(path: &Path, _limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    let reader = XmlRecordReader::open(path, "test-http-traffic")?;
    let path = path.to_path_buf();
    Ok(numbered(reader.map(move |element| -> Result<NativeRecord, ParserStreamError> {
        let element = element?;
        let payload = element.payload(&path)?;
        let (request, response) = split_request_response(trim_leading_blank_lines(&payload));
        Ok(NativeRecord::AppScanTraffic(AppScanTraffic { request, response }))
    })))
}
