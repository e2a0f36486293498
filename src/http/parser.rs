use std::collections::HashMap;

use bytes::Bytes;

use crate::http::request::{Method, Request};

/// Errors raised while parsing an HTTP request.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The request line is malformed
    InvalidRequestLine,
    /// The HTTP method is not recognized
    InvalidMethod,
    /// A header line is malformed
    InvalidHeader,
    /// Content-Length is not a valid number
    InvalidContentLength,
    /// More data is needed for a complete request
    Incomplete,
}

/// Attempts to parse one complete HTTP/1.1 request from the front of `buf`.
///
/// Returns the request and the number of bytes it consumed, so the caller
/// can drain the buffer and keep pipelined bytes for the next round.
/// `ParseError::Incomplete` means the caller should read more data and retry.
pub fn parse_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let head_len = match find_head_end(buf) {
        Some(n) => n,
        None => return Err(ParseError::Incomplete),
    };

    let head = std::str::from_utf8(&buf[..head_len])
        .map_err(|_| ParseError::InvalidRequestLine)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, path, version) = parse_request_line(request_line)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        headers.insert(
            name.trim().to_ascii_lowercase(),
            value.trim().to_string(),
        );
    }

    let content_length = match headers.get("content-length") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?,
        None => 0,
    };

    let body_start = head_len + 4;
    if buf.len() < body_start + content_length {
        return Err(ParseError::Incomplete);
    }
    let body = Bytes::copy_from_slice(&buf[body_start..body_start + content_length]);

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
        conn: None,
    };

    Ok((request, body_start + content_length))
}

fn parse_request_line(line: &str) -> Result<(Method, &str, &str), ParseError> {
    let mut parts = line.split_whitespace();
    let method_str = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let path = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let version = parts.next().ok_or(ParseError::InvalidRequestLine)?;

    let method = Method::parse(method_str).ok_or(ParseError::InvalidMethod)?;
    Ok((method, path, version))
}

/// Offset of the `\r\n\r\n` separator, i.e. the length of the head block.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
