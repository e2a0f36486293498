use harbor::http::request::{Method, Request, RequestBuilder};
use harbor::http::response::{Response, StatusCode};
use harbor::router::{Handler, Router};

#[test]
fn test_register_and_dispatch() {
    let router = Router::new();
    router.register(
        &[Method::GET, Method::POST],
        "/api",
        Handler::sync(|_req: &Request, resp: &mut Response| {
            resp.set_status(StatusCode::Created);
        }),
    );

    assert!(router.dispatch(Method::GET, "/api").is_some());
    assert!(router.dispatch(Method::POST, "/api").is_some());
    assert!(router.dispatch(Method::DELETE, "/api").is_none());
    assert!(router.dispatch(Method::GET, "/other").is_none());
    assert_eq!(router.route_count(), 2);
}

#[test]
fn test_dispatch_is_exact_match() {
    let router = Router::new();
    router.register(
        &[Method::GET],
        "/files/a.txt",
        Handler::sync(|_req: &Request, _resp: &mut Response| {}),
    );

    assert!(router.dispatch(Method::GET, "/files/a.txt").is_some());
    assert!(router.dispatch(Method::GET, "/files").is_none());
    assert!(router.dispatch(Method::GET, "/files/a.txt/").is_none());
}

#[test]
fn test_sync_handler_invocation() {
    let router = Router::new();
    router.register(
        &[Method::GET],
        "/x",
        Handler::sync(|_req: &Request, resp: &mut Response| {
            resp.set_status_and_content(StatusCode::Ok, &b"ok"[..]);
        }),
    );

    let handler = router.dispatch(Method::GET, "/x").unwrap();
    let req = RequestBuilder::new(Method::GET, "/x").build();
    let mut resp = Response::detached();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(handler.invoke(&req, &mut resp));

    assert_eq!(resp.status, StatusCode::Ok);
    assert_eq!(&resp.body[..], b"ok");
}

#[test]
fn test_async_handler_invocation() {
    let router = Router::new();
    router.register(
        &[Method::GET],
        "/x",
        Handler::async_fn(|req: &Request, resp: &mut Response| {
            Box::pin(async move {
                let echo = req.header("X-Echo").unwrap_or("none").to_string();
                resp.set_status_and_content(StatusCode::Ok, echo);
            })
        }),
    );

    let handler = router.dispatch(Method::GET, "/x").unwrap();
    let req = RequestBuilder::new(Method::GET, "/x")
        .header("X-Echo", "ping")
        .build();
    let mut resp = Response::detached();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(handler.invoke(&req, &mut resp));

    assert_eq!(&resp.body[..], b"ping");
}

#[test]
fn test_later_registration_replaces_handler() {
    let router = Router::new();
    router.register(
        &[Method::GET],
        "/x",
        Handler::sync(|_req: &Request, resp: &mut Response| {
            resp.set_status(StatusCode::NotFound);
        }),
    );
    router.register(
        &[Method::GET],
        "/x",
        Handler::sync(|_req: &Request, resp: &mut Response| {
            resp.set_status(StatusCode::Ok);
        }),
    );
    assert_eq!(router.route_count(), 1);

    let handler = router.dispatch(Method::GET, "/x").unwrap();
    let req = RequestBuilder::new(Method::GET, "/x").build();
    let mut resp = Response::detached();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(handler.invoke(&req, &mut resp));
    assert_eq!(resp.status, StatusCode::Ok);
}
