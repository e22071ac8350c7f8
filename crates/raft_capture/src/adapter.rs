//! Normalization of format-native records into [`Capture`].

use url::Url;

use crate::{
    AdaptationError, AppScanTraffic, BurpIssue, BurpItem, BurpLogEntry, Capture, HttpMessage,
    NativeRecord, ParosMessage, RaftCaptureRecord, RawRecord, WebScarabConversation,
};

/// Fields every native record is reduced to before the shared rules run.
#[derive(Default)]
struct Exchange {
    method: Option<String>,
    url: Option<String>,
    /// Origin the request target is resolved against when no URL is stored.
    base_url: Option<String>,
    host: Option<String>,
    host_ip: Option<String>,
    datetime: Option<String>,
    status: Option<String>,
    content_type: Option<String>,
    content_length: Option<String>,
    elapsed: Option<String>,
    notes: Option<String>,
    confirmed: bool,
    request: HttpMessage,
    response: Option<HttpMessage>,
}

/// Turns one raw record into the canonical [`Capture`].
///
/// The capture id is `<format>:<ordinal>`, unique within one input file.
pub fn adapt(record: &RawRecord) -> Result<Capture, AdaptationError> {
    let id = format!("{}:{}", record.format(), record.ordinal);
    let exchange = match &record.native {
        NativeRecord::RaftCapture(native) => from_raft(native),
        NativeRecord::BurpLog(native) => from_burp_log(native),
        NativeRecord::BurpItem(native) => from_burp_item(native),
        NativeRecord::BurpIssue(native) => from_burp_issue(native),
        NativeRecord::AppScanTraffic(native) => from_appscan(native),
        NativeRecord::WebScarabConversation(native) => from_webscarab(native),
        NativeRecord::ParosMessage(native) => from_paros(native),
    };

    if exchange.request.is_empty() && exchange.url.is_none() {
        return Err(AdaptationError::Empty { id });
    }

    let url = resolve_url(&id, &exchange)?;
    let method = exchange
        .method
        .clone()
        .or_else(|| exchange.request.start_token(0).map(str::to_string))
        .unwrap_or_default();
    let host = exchange
        .host
        .clone()
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default();
    let status = resolve_status(&id, &exchange)?;
    let content_type = exchange.content_type.clone().or_else(|| {
        exchange
            .response
            .as_ref()
            .and_then(|response| response.header("content-type"))
            .map(str::to_string)
    });
    let content_length = exchange
        .content_length
        .as_deref()
        .and_then(|value| value.trim().parse().ok())
        .or_else(|| {
            exchange
                .response
                .as_ref()
                .and_then(|response| response.header("content-length"))
                .and_then(|value| value.trim().parse().ok())
        });
    let elapsed_ms = exchange
        .elapsed
        .as_deref()
        .and_then(|value| value.trim().parse().ok());
    let raw = serde_json::to_value(&record.native).map_err(|source| {
        AdaptationError::RawPayload {
            id: id.clone(),
            source,
        }
    })?;

    Ok(Capture {
        id,
        origin: record.format(),
        method,
        url: url.to_string(),
        host,
        host_ip: exchange.host_ip,
        datetime: exchange.datetime,
        status,
        content_type,
        content_length,
        elapsed_ms,
        notes: exchange.notes,
        confirmed: exchange.confirmed,
        request: exchange.request,
        response: exchange.response,
        raw,
    })
}

fn resolve_url(id: &str, exchange: &Exchange) -> Result<Url, AdaptationError> {
    if let Some(url) = &exchange.url {
        return Url::parse(url).map_err(|source| AdaptationError::InvalidUrl {
            id: id.to_string(),
            url: url.clone(),
            source,
        });
    }

    let target = exchange.request.start_token(1).unwrap_or_default();
    if let Ok(absolute) = Url::parse(target) {
        if matches!(absolute.scheme(), "http" | "https") {
            return Ok(absolute);
        }
    }

    // Authority-form (`CONNECT host:port`) and `*` targets name no path;
    // they resolve to the origin itself.
    let origin_only = !target.is_empty() && !target.starts_with('/');
    let base = match (&exchange.base_url, exchange.request.header("host")) {
        (Some(base), _) => Some(base.clone()),
        (None, Some(host)) => Some(format!("http://{host}")),
        (None, None) if origin_only && target != "*" => Some(format!("http://{target}")),
        (None, None) => None,
    };
    let unresolvable = || AdaptationError::UnresolvableUrl {
        id: id.to_string(),
        target: target.to_string(),
    };
    let base = base.ok_or_else(unresolvable)?;
    let base = Url::parse(&base).map_err(|source| AdaptationError::InvalidUrl {
        id: id.to_string(),
        url: base.clone(),
        source,
    })?;
    if target.is_empty() || origin_only {
        return Ok(base);
    }
    base.join(target).map_err(|_| unresolvable())
}

fn resolve_status(id: &str, exchange: &Exchange) -> Result<Option<u16>, AdaptationError> {
    let value = match &exchange.status {
        Some(status) => status.split_whitespace().next(),
        None => exchange
            .response
            .as_ref()
            .and_then(|response| response.start_token(1)),
    };
    value
        .map(|value| {
            value.parse().map_err(|_| AdaptationError::InvalidStatus {
                id: id.to_string(),
                value: value.to_string(),
            })
        })
        .transpose()
}

fn message(bytes: &[u8]) -> HttpMessage {
    HttpMessage::parse(bytes)
}

fn optional_message(bytes: Option<&Vec<u8>>) -> Option<HttpMessage> {
    bytes
        .filter(|bytes| !bytes.is_empty())
        .map(|bytes| message(bytes))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn from_raft(native: &RaftCaptureRecord) -> Exchange {
    let confirmed = native.confirmed.as_deref().is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    });
    Exchange {
        method: non_empty(&native.method),
        url: non_empty(&native.url),
        host: non_empty(&native.host),
        host_ip: non_empty(&native.host_ip),
        datetime: non_empty(&native.datetime),
        status: non_empty(&native.status),
        content_type: non_empty(&native.content_type),
        content_length: non_empty(&native.content_length),
        elapsed: non_empty(&native.elapsed),
        notes: non_empty(&native.notes),
        confirmed,
        request: HttpMessage::from_parts(&native.request_headers, &native.request_body),
        response: native
            .response_headers
            .as_ref()
            .map(|head| HttpMessage::from_parts(head, &native.response_body)),
        ..Exchange::default()
    }
}

fn from_burp_log(native: &BurpLogEntry) -> Exchange {
    Exchange {
        base_url: Some(native.base_url.clone()).filter(|base| !base.is_empty()),
        host_ip: native.host_ip.clone(),
        datetime: Some(native.time.clone()).filter(|time| !time.is_empty()),
        request: message(&native.request),
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}

fn from_burp_item(native: &BurpItem) -> Exchange {
    let base_url = match (&native.protocol, &native.host) {
        (Some(protocol), Some(host)) => Some(match &native.port {
            Some(port) => format!("{protocol}://{host}:{port}"),
            None => format!("{protocol}://{host}"),
        }),
        _ => None,
    };
    Exchange {
        method: non_empty(&native.method),
        url: non_empty(&native.url),
        base_url,
        host: non_empty(&native.host),
        host_ip: native.host_ip.clone(),
        datetime: non_empty(&native.time),
        status: non_empty(&native.status),
        notes: non_empty(&native.comment),
        request: message(&native.request),
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}

fn from_burp_issue(native: &BurpIssue) -> Exchange {
    let request = message(&native.request);
    // Issues without request bytes still name the affected resource.
    let url = match (request.is_empty(), &native.host, &native.path) {
        (true, Some(host), Some(path)) => Some(format!("{}{}", host.trim_end_matches('/'), path)),
        (true, Some(host), None) => Some(host.clone()),
        _ => None,
    };
    Exchange {
        url,
        base_url: non_empty(&native.host),
        host_ip: native.host_ip.clone(),
        notes: non_empty(&native.name),
        request,
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}

fn from_appscan(native: &AppScanTraffic) -> Exchange {
    Exchange {
        request: message(&native.request),
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}

fn from_webscarab(native: &WebScarabConversation) -> Exchange {
    Exchange {
        method: non_empty(&native.method),
        url: non_empty(&native.url),
        datetime: non_empty(&native.when),
        status: non_empty(&native.status),
        request: message(&native.request),
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}

fn from_paros(native: &ParosMessage) -> Exchange {
    Exchange {
        request: message(&native.request),
        response: optional_message(native.response.as_ref()),
        ..Exchange::default()
    }
}
