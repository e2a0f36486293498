use harbor::http::request::{Method, RequestBuilder};

#[test]
fn test_request_header_retrieval() {
    let req = RequestBuilder::new(Method::GET, "/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new(Method::POST, "/api")
        .header("Content-Length", "42")
        .build();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing_or_invalid() {
    let req = RequestBuilder::new(Method::GET, "/").build();
    assert_eq!(req.content_length(), 0);

    let req = RequestBuilder::new(Method::POST, "/api")
        .header("Content-Length", "not-a-number")
        .build();
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_keep_alive_default() {
    let req = RequestBuilder::new(Method::GET, "/").build();
    assert!(req.keep_alive());
}

#[test]
fn test_keep_alive_explicit_close() {
    let req = RequestBuilder::new(Method::GET, "/")
        .header("Connection", "close")
        .build();
    assert!(!req.keep_alive());

    let req = RequestBuilder::new(Method::GET, "/")
        .header("Connection", "Close")
        .build();
    assert!(!req.keep_alive());
}

#[test]
fn test_request_without_connection_has_no_io() {
    let req = RequestBuilder::new(Method::GET, "/").build();
    assert!(req.connection().is_none());
}

#[test]
fn test_method_round_trip() {
    for method in Method::ALL {
        assert_eq!(Method::parse(method.as_str()), Some(method));
    }
    assert_eq!(Method::parse("get"), None);
}
