use std::path::PathBuf;

use raft_capture::{
    adapt, Capture, FormatId, FormatRegistry, IngestLimits, NativeRecord, ParserStreamError,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn captures(format: FormatId, name: &str) -> Vec<Capture> {
    let parser = FormatRegistry::builtin()
        .resolve_format(format)
        .expect("builtin format is registered");
    parser(&fixture(name), &IngestLimits::default())
        .expect("fixture opens")
        .map(|record| adapt(&record.expect("fixture record parses")).expect("record adapts"))
        .collect()
}

#[test]
fn raft_capture_xml_fixture_has_three_captures() {
    let captures = captures(FormatId::RaftCaptureXml, "a.xml");
    assert_eq!(captures.len(), 3);
    assert_eq!(
        captures.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec![
            "raft_capture_xml:1",
            "raft_capture_xml:2",
            "raft_capture_xml:3"
        ]
    );

    let login = &captures[1];
    assert_eq!(login.method, "POST");
    assert_eq!(login.url, "http://www.example.com/login");
    assert_eq!(login.status, Some(302));
    assert_eq!(login.request.body, b"user=alice&pass=secret");
    assert_eq!(
        login.response.as_ref().and_then(|r| r.header("location")),
        Some("/home")
    );
    assert_eq!(login.notes.as_deref(), Some("credentials in body"));
    assert!(login.confirmed);

    let unanswered = &captures[2];
    assert_eq!(unanswered.host, "static.example.com");
    assert!(unanswered.response.is_none());
    assert_eq!(unanswered.status, None);
}

#[test]
fn burp_log_fixture_keeps_unanswered_requests() {
    let captures = captures(FormatId::BurpLog, "burp.log");
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[0].url, "http://www.example.com/search?q=raft");
    assert_eq!(
        captures[0].content_type.as_deref(),
        Some("text/html; charset=utf-8")
    );
    assert_eq!(captures[0].content_length, Some(13));
    assert_eq!(captures[1].url, "https://secure.example.com/account");
    assert_eq!(captures[1].host_ip.as_deref(), Some("192.0.2.81"));
    assert!(captures[1].response.is_none());
}

#[test]
fn burp_items_fixture_decodes_base64_payloads() {
    let captures = captures(FormatId::BurpXml, "burp_items.xml");
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[0].status, Some(500));
    assert_eq!(
        captures[0].response.as_ref().map(|r| r.body.as_slice()),
        Some(&b"SQL syntax error"[..])
    );
    assert_eq!(captures[0].notes.as_deref(), Some("possible injection"));
    assert_eq!(captures[1].request.start_line, "GET /favicon.ico HTTP/1.1");
    assert!(captures[1].response.is_none());
}

#[test]
fn burp_issue_fixture_yields_one_capture_per_request_response() {
    let captures = captures(FormatId::BurpVulnXml, "burp_issues.xml");
    assert_eq!(captures.len(), 2);
    assert!(captures
        .iter()
        .all(|c| c.notes.as_deref() == Some("Directory listing")));
    assert_eq!(captures[0].url, "http://shop.example.com/admin/");
    assert_eq!(captures[1].url, "http://shop.example.com/admin/backup/");
    assert!(captures[1].response.is_none());
    assert_eq!(captures[0].raw["severity"], "Information");
}

#[test]
fn appscan_fixture_splits_request_and_response() {
    let captures = captures(FormatId::AppscanXml, "appscan.xml");
    assert_eq!(captures.len(), 2);
    assert_eq!(
        captures[0].url,
        "http://portal.example.com/search.jsp?q=%3Cscript%3E"
    );
    assert_eq!(
        captures[0].response.as_ref().map(|r| r.body.as_slice()),
        Some(&b"<b><script></b>"[..])
    );
    assert_eq!(captures[1].method, "POST");
    assert_eq!(captures[1].request.body, b"uid=admin%27--&passw=x");
    assert!(captures[1].response.is_none());
}

#[test]
fn webscarab_fixture_reads_the_session_directory() {
    let captures = captures(FormatId::Webscarab, "webscarab");
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[0].status, Some(200));
    assert_eq!(captures[0].datetime.as_deref(), Some("1760868000000"));
    assert_eq!(captures[1].url, "http://legacy.example.com/slow.php");
    assert!(captures[1].response.is_none());
}

#[test]
fn paros_fixture_numbers_every_message() {
    let captures = captures(FormatId::ParosMessage, "paros.txt");
    assert_eq!(captures.len(), 3);
    assert_eq!(captures[0].status, Some(301));
    assert_eq!(captures[1].content_type.as_deref(), Some("text/html"));
    assert_eq!(captures[2].request.body, b"hello");
    assert!(captures[2].response.is_none());
}

#[test]
fn burp_state_is_registered_but_unsupported() {
    let parser = FormatRegistry::builtin()
        .resolve("burp_state")
        .expect("burp_state is registered");
    let outcome = parser(&fixture("a.xml"), &IngestLimits::default());
    assert!(matches!(
        outcome,
        Err(ParserStreamError::Unsupported {
            format: FormatId::BurpState,
            ..
        })
    ));
}

#[test]
fn raw_payload_survives_in_the_capture() {
    let parser = FormatRegistry::builtin()
        .resolve_format(FormatId::ParosMessage)
        .unwrap();
    let first = parser(&fixture("paros.txt"), &IngestLimits::default())
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let NativeRecord::ParosMessage(message) = &first.native else {
        panic!("expected a paros message");
    };
    let capture = adapt(&first).unwrap();
    assert_eq!(capture.raw["kind"], "paros_message");
    assert_eq!(capture.raw["number"], message.number);
}
