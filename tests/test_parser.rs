use harbor::http::parser::{parse_request, ParseError};
use harbor::http::request::Method;

#[test]
fn test_parse_simple_get() {
    let data = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let (req, consumed) = parse_request(data).expect("should parse");

    assert_eq!(req.method, Method::GET);
    assert_eq!(req.path, "/index.html");
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.header("Host"), Some("localhost"));
    assert_eq!(consumed, data.len());
}

#[test]
fn test_parse_request_with_body() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let (req, consumed) = parse_request(data).expect("should parse");

    assert_eq!(req.method, Method::POST);
    assert_eq!(&req.body[..], b"hello");
    assert_eq!(consumed, data.len());
}

#[test]
fn test_parse_incomplete_head() {
    let data = b"GET / HTTP/1.1\r\nHost: local";
    assert_eq!(parse_request(data).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_incomplete_body() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhel";
    assert_eq!(parse_request(data).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_invalid_method() {
    let data = b"BREW /pot HTTP/1.1\r\n\r\n";
    assert_eq!(parse_request(data).unwrap_err(), ParseError::InvalidMethod);
}

#[test]
fn test_parse_invalid_content_length() {
    let data = b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
    assert_eq!(
        parse_request(data).unwrap_err(),
        ParseError::InvalidContentLength
    );
}

#[test]
fn test_parse_headers_case_insensitive() {
    let data = b"GET / HTTP/1.1\r\nRaNgE: bytes=0-4\r\n\r\n";
    let (req, _) = parse_request(data).expect("should parse");

    assert_eq!(req.header("Range"), Some("bytes=0-4"));
    assert_eq!(req.header("range"), Some("bytes=0-4"));
}

#[test]
fn test_parse_pipelined_requests_consume_only_first() {
    let data = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let (req, consumed) = parse_request(data).expect("should parse");

    assert_eq!(req.path, "/a");
    let (second, _) = parse_request(&data[consumed..]).expect("should parse rest");
    assert_eq!(second.path, "/b");
}

#[test]
fn test_parse_all_methods() {
    for method in Method::ALL {
        let data = format!("{} / HTTP/1.1\r\n\r\n", method.as_str());
        let (req, _) = parse_request(data.as_bytes()).expect("should parse");
        assert_eq!(req.method, method);
    }
}
