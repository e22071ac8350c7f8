//! Burp Suite XML exports: "save items" (`<items><item>..`) and scanner
//! reports (`<issues><issue>..`).

use std::path::Path;

use super::{numbered, RawRecordStream};
use crate::reader::{XmlElement, XmlRecordReader};
use crate::{BurpIssue, BurpItem, IngestLimits, NativeRecord, ParserStreamError};

pub fn parse_items(
    path: &Path,
    _limits: &IngestLimits,
) -> Result<RawRecordStream, ParserStreamError> {
    let reader = XmlRecordReader::open(path, "item")?;
    let path = path.to_path_buf();
    Ok(numbered(
        reader.map(move |element| element.and_then(|item| item_record(&path, &item))),
    ))
}

/// One record per `<requestresponse>` of every issue; issues without any
/// traffic contribute nothing.
pub fn parse_issues(
    path: &Path,
    _limits: &IngestLimits,
) -> Result<RawRecordStream, ParserStreamError> {
    let reader = XmlRecordReader::open(path, "issue")?;
    let path = path.to_path_buf();
    let records = reader.flat_map(move |element| match element {
        Ok(issue) => issue_records(&path, &issue),
        Err(err) => vec![Err(err)],
    });
    Ok(numbered(records))
}

fn item_record(path: &Path, item: &XmlElement) -> Result<NativeRecord, ParserStreamError> {
    let request = match item.child("request") {
        Some(element) => element.payload(path)?,
        None => Vec::new(),
    };
    let response = item
        .child("response")
        .map(|element| element.payload(path))
        .transpose()?
        .filter(|bytes| !bytes.is_empty());

    Ok(NativeRecord::BurpItem(BurpItem {
        time: item.text_at("time"),
        url: item.text_at("url"),
        host: item.text_at("host"),
        host_ip: host_ip(item),
        port: item.text_at("port"),
        protocol: item.text_at("protocol"),
        method: item.text_at("method"),
        path: item.text_at("path"),
        request,
        status: item.text_at("status"),
        mime_type: item.text_at("mimetype"),
        response,
        comment: item.text_at("comment"),
    }))
}

fn issue_records(path: &Path, issue: &XmlElement) -> Vec<Result<NativeRecord, ParserStreamError>> {
    issue
        .children("requestresponse")
        .map(|pair| -> Result<NativeRecord, ParserStreamError> {
            let request = match pair.child("request") {
                Some(element) => element.payload(path)?,
                None => Vec::new(),
            };
            let response = pair
                .child("response")
                .map(|element| element.payload(path))
                .transpose()?
                .filter(|bytes| !bytes.is_empty());
            Ok(NativeRecord::BurpIssue(BurpIssue {
                serial_number: issue.text_at("serialNumber"),
                issue_type: issue.text_at("type"),
                name: issue.text_at("name"),
                host: issue.text_at("host"),
                host_ip: host_ip(issue),
                path: issue.text_at("path"),
                location: issue.text_at("location"),
                severity: issue.text_at("severity"),
                confidence: issue.text_at("confidence"),
                request,
                response,
            }))
        })
        .collect()
}

fn host_ip(element: &XmlElement) -> Option<String> {
    element
        .child("host")
        .and_then(|host| host.attribute("ip"))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
