use crate::http::response::{FormatType, Response};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Terminating zero-chunk of a chunked body.
pub const CHUNKED_END: &[u8] = b"0\r\n\r\n";

/// Serializes a full response: status line, headers, separator, body.
///
/// `Content-Length` (or `Transfer-Encoding: chunked`) and `Connection` are
/// injected when the handler did not set them itself.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = head_common(resp);

    match resp.format_type() {
        FormatType::Normal => {
            if !has_header(resp, "Content-Length") {
                push_header(&mut buf, "Content-Length", &resp.body.len().to_string());
            }
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(&resp.body);
        }
        FormatType::Chunked => {
            push_header(&mut buf, "Transfer-Encoding", "chunked");
            buf.extend_from_slice(b"\r\n");
            if !resp.body.is_empty() {
                buf.extend_from_slice(&encode_chunk(&resp.body));
            }
            buf.extend_from_slice(CHUNKED_END);
        }
    }

    buf
}

/// Serializes the head of a chunked response, body to follow as chunks.
pub fn serialize_chunked_head(resp: &Response) -> Vec<u8> {
    let mut buf = head_common(resp);
    push_header(&mut buf, "Transfer-Encoding", "chunked");
    buf.extend_from_slice(b"\r\n");
    buf
}

/// One chunk frame: hex length, CRLF, payload, CRLF.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 10);
    buf.extend_from_slice(format!("{:X}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

fn head_common(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    for (name, value) in &resp.headers {
        push_header(&mut buf, name, value);
    }

    if !has_header(resp, "Connection") {
        let conn = if resp.keep_alive() { "keep-alive" } else { "close" };
        push_header(&mut buf, "Connection", conn);
    }

    buf
}

fn has_header(resp: &Response, name: &str) -> bool {
    resp.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

fn push_header(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}
