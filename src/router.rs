//! Route registration and dispatch.
//!
//! Handlers come in two flavors behind one registration call: plain
//! functions that fill in the response, and task-returning functions for
//! handlers that need to await I/O. The driver awaits either through
//! [`Handler::invoke`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use crate::http::request::{Method, Request};
use crate::http::response::Response;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

type SyncFn = dyn Fn(&Request, &mut Response) + Send + Sync;
type AsyncFn =
    dyn for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync;

/// A registered request handler.
pub enum Handler {
    Sync(Box<SyncFn>),
    Async(Box<AsyncFn>),
}

impl Handler {
    pub fn sync(f: impl Fn(&Request, &mut Response) + Send + Sync + 'static) -> Self {
        Handler::Sync(Box::new(f))
    }

    pub fn async_fn(
        f: impl for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Handler::Async(Box::new(f))
    }

    pub async fn invoke(&self, req: &Request, resp: &mut Response) {
        match self {
            Handler::Sync(f) => f(req, resp),
            Handler::Async(f) => f(req, resp).await,
        }
    }
}

/// Exact-path route map shared between the configuration surface and the
/// connection drivers.
#[derive(Default)]
pub struct Router {
    routes: RwLock<HashMap<String, HashMap<Method, Arc<Handler>>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` at `path` for every method in `methods`.
    pub fn register(&self, methods: &[Method], path: &str, handler: Handler) {
        let handler = Arc::new(handler);
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let by_method = routes.entry(path.to_string()).or_default();
        for method in methods {
            by_method.insert(*method, handler.clone());
        }
    }

    pub fn dispatch(&self, method: Method, path: &str) -> Option<Arc<Handler>> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(path).and_then(|m| m.get(&method)).cloned()
    }

    pub fn route_count(&self) -> usize {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.values().map(|m| m.len()).sum()
    }
}
