use harbor::http::response::{FormatType, Response, StatusCode};
use harbor::http::writer;

#[test]
fn test_status_code_round_trip() {
    for code in [200u16, 201, 204, 206, 400, 404, 405, 416, 500, 502, 503, 504] {
        assert_eq!(StatusCode::from_u16(code).as_u16(), code);
    }
}

#[test]
fn test_status_code_preserves_unknown_codes() {
    let status = StatusCode::from_u16(418);
    assert_eq!(status, StatusCode::Other(418));
    assert_eq!(status.as_u16(), 418);
    assert_eq!(status.reason_phrase(), "Unknown");
}

#[test]
fn test_status_code_reason_phrases() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::PartialContent.reason_phrase(), "Partial Content");
    assert_eq!(
        StatusCode::RangeNotSatisfiable.reason_phrase(),
        "Range Not Satisfiable"
    );
    assert_eq!(StatusCode::BadGateway.reason_phrase(), "Bad Gateway");
}

#[test]
fn test_serialize_injects_content_length_and_connection() {
    let mut resp = Response::detached();
    resp.set_status_and_content(StatusCode::Ok, &b"hello"[..]);

    let wire = String::from_utf8(resp.to_wire_bytes()).unwrap();
    assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(wire.contains("Content-Length: 5\r\n"));
    assert!(wire.contains("Connection: keep-alive\r\n"));
    assert!(wire.ends_with("\r\n\r\nhello"));
}

#[test]
fn test_serialize_keeps_explicit_content_length() {
    let mut resp = Response::detached();
    resp.set_status_and_content(StatusCode::Ok, &b"hi"[..]);
    resp.add_header("Content-Length", "999");

    let wire = String::from_utf8(resp.to_wire_bytes()).unwrap();
    assert!(wire.contains("Content-Length: 999\r\n"));
    assert!(!wire.contains("Content-Length: 2\r\n"));
}

#[test]
fn test_serialize_custom_headers() {
    let mut resp = Response::detached();
    resp.set_status(StatusCode::Created);
    resp.add_header("X-Custom", "value");
    resp.add_header("Cache-Control", "no-cache");

    let wire = String::from_utf8(resp.to_wire_bytes()).unwrap();
    assert!(wire.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(wire.contains("X-Custom: value\r\n"));
    assert!(wire.contains("Cache-Control: no-cache\r\n"));
}

#[test]
fn test_serialize_chunked_body_ends_with_zero_chunk() {
    let mut resp = Response::detached();
    resp.set_status_and_content(StatusCode::Ok, &b"abcdef"[..]);
    resp.set_format_type(FormatType::Chunked);

    let wire = resp.to_wire_bytes();
    let text = String::from_utf8(wire).unwrap();
    assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    assert!(text.contains("6\r\nabcdef\r\n"));
    assert!(text.ends_with("0\r\n\r\n"));
    assert!(!text.contains("Content-Length"));
}

#[test]
fn test_encode_chunk_uses_hex_length() {
    let frame = writer::encode_chunk(&[b'x'; 26]);
    assert!(frame.starts_with(b"1A\r\n"));
    assert!(frame.ends_with(b"\r\n"));
    assert_eq!(frame.len(), 4 + 26 + 2);
}

#[test]
fn test_delayed_flag() {
    let mut resp = Response::detached();
    assert!(!resp.delayed());
    resp.set_delay(true);
    assert!(resp.delayed());
}

#[test]
fn test_detached_response_writes_fail() {
    let mut resp = Response::detached();
    resp.set_status_and_content(StatusCode::Ok, &b"ok"[..]);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    assert!(!rt.block_on(resp.send()));
}
