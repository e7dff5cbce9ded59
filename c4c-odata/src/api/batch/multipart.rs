//! `multipart/mixed` framing for `$batch`
//!
//! Reads travel as top level `application/http` parts. Every write gets its
//! own changeset so each sub-request maps to exactly one response part, even
//! when the server collapses a failed changeset into a single error response.

use uuid::Uuid;

use crate::api::error::ODataError;
use crate::api::transport::{RequestBody, TransportRequest};

const CRLF: &str = "\r\n";

/// One `application/http` response found in a batch response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl PartResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Serialise sub-requests into a batch payload
pub fn build_payload(boundary: &str, requests: &[TransportRequest]) -> String {
    let mut out = String::new();
    let mut content_id = 0;

    for request in requests {
        out.push_str(&format!("--{}{}", boundary, CRLF));

        if request.method.is_write() {
            content_id += 1;
            let changeset = format!("changeset_{}", Uuid::new_v4());
            out.push_str(&format!(
                "Content-Type: multipart/mixed; boundary={}{}{}",
                changeset, CRLF, CRLF
            ));
            out.push_str(&format!("--{}{}", changeset, CRLF));
            write_http_part(&mut out, request, Some(content_id));
            out.push_str(&format!("--{}--{}", changeset, CRLF));
        } else {
            write_http_part(&mut out, request, None);
        }
    }

    out.push_str(&format!("--{}--{}", boundary, CRLF));
    out
}

fn write_http_part(out: &mut String, request: &TransportRequest, content_id: Option<u32>) {
    out.push_str(&format!("Content-Type: application/http{}", CRLF));
    out.push_str(&format!("Content-Transfer-Encoding: binary{}", CRLF));
    if let Some(id) = content_id {
        out.push_str(&format!("Content-ID: {}{}", id, CRLF));
    }
    out.push_str(CRLF);

    let target = match &request.query {
        Some(query) => format!("{}?{}", request.path, query),
        None => request.path.clone(),
    };
    out.push_str(&format!("{} {} HTTP/1.1{}", request.method, target, CRLF));
    out.push_str(&format!("Accept: application/json{}", CRLF));
    for (name, value) in &request.headers {
        out.push_str(&format!("{}: {}{}", name, value, CRLF));
    }

    match &request.body {
        Some(RequestBody::Json(body)) => {
            let body = body.to_string();
            out.push_str(&format!("Content-Type: application/json{}", CRLF));
            out.push_str(&format!("Content-Length: {}{}", body.len(), CRLF));
            out.push_str(CRLF);
            out.push_str(&body);
            out.push_str(CRLF);
        }
        // nested multipart bodies are not valid inside a batch
        Some(RequestBody::Multipart { .. }) | None => {
            out.push_str(CRLF);
        }
    }
    out.push_str(CRLF);
}

/// Extract the `boundary` parameter of a multipart content type
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// Flatten a batch response body into its response parts, in order
pub fn parse_response(body: &str, boundary: &str) -> Result<Vec<PartResponse>, ODataError> {
    let delimiter = format!("--{}", boundary);
    let mut segments = body.split(delimiter.as_str());

    // preamble before the first delimiter
    if segments.next().is_none() {
        return Err(ODataError::Batch("empty batch response".to_string()));
    }

    let mut parts = Vec::new();
    let mut closed = false;

    for segment in segments {
        if segment.starts_with("--") {
            closed = true;
            break;
        }

        let segment = segment.trim_start_matches(['\r', '\n']);
        let (head, content) = split_head(segment);
        let headers = parse_headers(head.lines());
        let content_type = find_header(&headers, "Content-Type").unwrap_or_default();

        if content_type.to_ascii_lowercase().starts_with("multipart/mixed") {
            let nested = boundary_from_content_type(content_type).ok_or_else(|| {
                ODataError::Batch("changeset response without boundary".to_string())
            })?;
            parts.extend(parse_response(content, &nested)?);
        } else {
            parts.push(parse_http_response(content)?);
        }
    }

    if !closed {
        return Err(ODataError::Batch(format!(
            "batch response is missing its closing delimiter `{}--`",
            delimiter
        )));
    }

    Ok(parts)
}

fn parse_http_response(text: &str) -> Result<PartResponse, ODataError> {
    let text = text.trim_start_matches(['\r', '\n']);
    let (head, body) = split_head(text);
    let mut lines = head.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| ODataError::Batch("response part without status line".to_string()))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ODataError::Batch(format!("invalid status line '{}'", status_line.trim())))?;

    Ok(PartResponse {
        status,
        headers: parse_headers(lines),
        body: body.trim_end_matches(['\r', '\n']).to_string(),
    })
}

/// Split at the first empty line
fn split_head(text: &str) -> (&str, &str) {
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let lf = text.find("\n\n").map(|i| (i, 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((index, len)) => (&text[..index], &text[index + len..]),
        None => (text, ""),
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
