//! Resource server: turns binder results into HTTP responses.
//!
//! Reads are streamed straight from the store. Conditional requests
//! (`If-None-Match`) and single byte ranges are honored; multi-range requests
//! get the whole payload.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dog_blob::ByteRange;
use dog_content::{BoundContent, ContentRead};
use serde_json::json;

use crate::{params::RequestUrl, DogAxumError};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// How a `Range` header applies to a payload of known size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Parse a `Range` header value. Anything that is not a single `bytes=`
/// range is served in full.
pub fn parse_range(value: &str, size: u64) -> RangeRequest {
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    if ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    // Suffix form: the last N bytes
    if start.is_empty() {
        return match end.parse::<u64>() {
            Ok(0) => RangeRequest::Unsatisfiable,
            Ok(_) if size == 0 => RangeRequest::Unsatisfiable,
            Ok(n) => RangeRequest::Partial(ByteRange::from_start(size.saturating_sub(n))),
            Err(_) => RangeRequest::Full,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeRequest::Full,
        }
    };
    if start >= size {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Partial(ByteRange::new(start, end))
}

/// Whether `If-None-Match` names `etag` (weak comparison).
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let wanted = opaque(etag);
    value
        .split(',')
        .any(|candidate| candidate.trim() == "*" || opaque(candidate) == wanted)
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn http_date(secs: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// 200, 206, 304 or 416 with the payload behind `read`.
pub async fn serve_content(read: ContentRead, request_headers: &HeaderMap) -> Result<Response, DogAxumError> {
    let ContentRead {
        mime_type, resource, ..
    } = read;
    let size = resource.size_bytes;
    let etag = resource.etag.clone();
    let last_modified = resource.last_modified.and_then(http_date);
    let accepts_ranges = resource.accepts_ranges;
    let content_type = mime_type
        .or_else(|| resource.content_type.clone())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    if let Some(etag) = etag.as_deref() {
        if etag_matches(request_headers, etag) {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            set_header(response.headers_mut(), header::ETAG, etag);
            return Ok(response);
        }
    }

    let range = match request_headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) if accepts_ranges => parse_range(value, size),
        _ => RangeRequest::Full,
    };
    let range = match range {
        RangeRequest::Full => None,
        RangeRequest::Partial(range) => Some(range),
        RangeRequest::Unsatisfiable => {
            let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            set_header(response.headers_mut(), header::CONTENT_RANGE, &format!("bytes */{size}"));
            return Ok(response);
        }
    };

    let opened = resource.open(range).await?;
    let partial = opened.is_partial();
    let content_length = opened.content_length();
    let content_range = opened
        .resolved_range
        .as_ref()
        .map(|r| format!("bytes {}-{}/{}", r.start, r.end, r.total_size));

    let mut response = Response::new(Body::from_stream(opened.stream));
    let headers = response.headers_mut();
    set_header(headers, header::CONTENT_TYPE, &content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    if accepts_ranges {
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    if let Some(etag) = &etag {
        set_header(headers, header::ETAG, etag);
    }
    if let Some(date) = &last_modified {
        set_header(headers, header::LAST_MODIFIED, date);
    }
    if partial {
        if let Some(content_range) = &content_range {
            set_header(headers, header::CONTENT_RANGE, content_range);
        }
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    }
    Ok(response)
}

/// 201 with the bound value as a HAL resource and its `Location`.
pub fn created(bound: &BoundContent, url: &RequestUrl) -> Response {
    let href = url.join(bound.content_id.as_str());
    let mut body = bound.value.clone();
    if let Some(fields) = body.as_object_mut() {
        fields.insert("_links".to_string(), json!({"self": {"href": href}}));
    }

    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    set_header(response.headers_mut(), header::LOCATION, &href);
    if let Some(etag) = &bound.etag {
        set_header(response.headers_mut(), header::ETAG, etag);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ranges() {
        assert_eq!(parse_range("bytes=0-4", 10), RangeRequest::Partial(ByteRange::new(0, Some(4))));
        assert_eq!(parse_range("bytes=5-", 10), RangeRequest::Partial(ByteRange::from_start(5)));
        assert_eq!(parse_range("bytes=-3", 10), RangeRequest::Partial(ByteRange::from_start(7)));
        assert_eq!(parse_range("bytes=-30", 10), RangeRequest::Partial(ByteRange::from_start(0)));
        // End past the payload is clamped later
        assert_eq!(parse_range("bytes=8-100", 10), RangeRequest::Partial(ByteRange::new(8, Some(100))));
    }

    #[test]
    fn unsatisfiable_ranges() {
        assert_eq!(parse_range("bytes=10-", 10), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 10), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-1", 0), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn everything_else_is_full() {
        for value in ["bytes=0-1,4-5", "items=0-1", "bytes=5-2", "bytes=a-b", "bytes=7"] {
            assert_eq!(parse_range(value, 10), RangeRequest::Full, "{value}");
        }
    }

    #[test]
    fn if_none_match_uses_weak_comparison() {
        let mut headers = HeaderMap::new();
        assert!(!etag_matches(&headers, "\"abc\""));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"x\", W/\"abc\""));
        assert!(etag_matches(&headers, "\"abc\""));
        assert!(!etag_matches(&headers, "\"abd\""));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(etag_matches(&headers, "\"anything\""));
    }

    #[test]
    fn http_dates_are_imf_fixdate() {
        assert_eq!(http_date(784111777).as_deref(), Some("Sun, 06 Nov 1994 08:49:37 GMT"));
    }
}
