use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Notify;

use crate::http::parser::{self, ParseError};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::router::Router;

/// The table-visible side of a connection.
///
/// The acceptor registers one per accepted socket; the reaper and `stop`
/// close connections through it. The driver task holds its own reference and
/// observes the close signal at its next suspension point.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: u64,
    last_active: Mutex<Instant>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl ConnectionHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            last_active: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Signals the driver to drain and exit. Does not force-close the
    /// socket; the driver drops it when it observes the signal.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the handle has been closed.
    pub async fn closed_wait(&self) {
        loop {
            let notified = self.close_notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Time since the last completed read or write.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = *self.last_active.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(last)
    }
}

/// The shared write half of a connection.
///
/// Handlers reach it through the request or response to write wire bytes
/// themselves; writes are serialized by an async mutex.
#[derive(Debug)]
pub struct ConnectionIo {
    handle: Arc<ConnectionHandle>,
    write: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
}

impl ConnectionIo {
    fn new(handle: Arc<ConnectionHandle>, write: OwnedWriteHalf) -> Self {
        Self {
            handle,
            write: tokio::sync::Mutex::new(Some(write)),
        }
    }

    /// An io with no socket behind it; every write reports failure.
    pub fn detached() -> Self {
        Self {
            handle: Arc::new(ConnectionHandle::new(0)),
            write: tokio::sync::Mutex::new(None),
        }
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Writes all of `data`; false means the peer is gone.
    pub async fn write_data(&self, data: &[u8]) -> bool {
        let mut guard = self.write.lock().await;
        let stream = match guard.as_mut() {
            Some(s) => s,
            None => return false,
        };
        match stream.write_all(data).await {
            Ok(()) => {
                self.handle.touch();
                true
            }
            Err(e) => {
                tracing::debug!(id = self.handle.id, error = %e, "peer write failed");
                self.handle.close();
                false
            }
        }
    }

    /// Gather-write: each buffer written in order under one lock hold.
    pub async fn async_write(&self, bufs: &[&[u8]]) -> io::Result<usize> {
        let mut guard = self.write.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "detached"))?;
        let mut written = 0;
        for buf in bufs {
            stream.write_all(buf).await?;
            written += buf.len();
        }
        self.handle.touch();
        Ok(written)
    }
}

/// Per-connection driver: reads requests, dispatches them through the
/// router, and writes responses until keep-alive ends or the connection is
/// closed from outside.
pub struct Connection {
    id: u64,
    read: OwnedReadHalf,
    io: Arc<ConnectionIo>,
    buffer: Vec<u8>,
    router: Arc<Router>,
    quit: Option<Box<dyn FnOnce(u64) + Send>>,
    shrink_buffer: bool,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        router: Arc<Router>,
        handle: Arc<ConnectionHandle>,
    ) -> Self {
        let id = handle.id();
        let (read, write) = stream.into_split();
        let io = Arc::new(ConnectionIo::new(handle, write));
        Self {
            id,
            read,
            io,
            buffer: Vec::with_capacity(4096),
            router,
            quit: None,
            shrink_buffer: false,
        }
    }

    /// Invoked with the connection id when the driver leaves keep-alive.
    pub fn set_quit_callback(&mut self, quit: impl FnOnce(u64) + Send + 'static) {
        self.quit = Some(Box::new(quit));
    }

    /// Release read-buffer capacity between requests.
    pub fn set_shrink_to_fit(&mut self, shrink: bool) {
        self.shrink_buffer = shrink;
    }

    /// Runs the request/response loop until the connection closes.
    pub async fn run(&mut self) {
        loop {
            let mut req = match self.read_request().await {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(id = self.id, error = %e, "protocol error");
                    let mut resp = Response::new(self.io.clone(), false);
                    resp.set_status_and_content(
                        StatusCode::BadRequest,
                        &b"400 Bad Request"[..],
                    );
                    let _ = resp.send().await;
                    break;
                }
            };

            let keep_alive = req.keep_alive();
            let start = Instant::now();
            req.conn = Some(self.io.clone());

            let mut resp = Response::new(self.io.clone(), keep_alive);
            match self.router.dispatch(req.method, &req.path) {
                Some(handler) => handler.invoke(&req, &mut resp).await,
                None => {
                    resp.set_status_and_content(StatusCode::NotFound, &b"404 Not Found"[..])
                }
            }

            let status = resp.status.as_u16();
            if !resp.delayed() && !resp.send().await {
                break;
            }

            tracing::info!(
                id = self.id,
                method = req.method.as_str(),
                path = %req.path,
                status,
                duration_ms = start.elapsed().as_millis() as u64,
                "request completed"
            );

            if self.shrink_buffer {
                self.buffer.shrink_to_fit();
            }

            if !keep_alive || self.io.handle().is_closed() {
                break;
            }
        }

        if let Some(quit) = self.quit.take() {
            quit(self.id);
        }
    }

    /// Reads until one complete request is buffered, or the peer leaves.
    ///
    /// `Ok(None)` covers both the client closing the socket and the
    /// connection being closed from outside (reaper or shutdown).
    async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            if !self.buffer.is_empty() {
                match parser::parse_request(&self.buffer) {
                    Ok((req, consumed)) => {
                        self.buffer.drain(..consumed);
                        return Ok(Some(req));
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(e) => anyhow::bail!("malformed request: {:?}", e),
                }
            }

            let mut tmp = [0u8; 4096];
            let n = tokio::select! {
                res = self.read.read(&mut tmp) => res?,
                _ = self.io.handle().closed_wait() => return Ok(None),
            };

            if n == 0 {
                return Ok(None);
            }
            self.io.handle().touch();
            self.buffer.extend_from_slice(&tmp[..n]);
        }
    }
}
