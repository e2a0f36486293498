//! Server lifecycle: configuration surface, start/stop, the reaper, and
//! wiring between the acceptor, the connection table and the router.

mod acceptor;
mod conn_table;
mod listener;
mod workers;

pub use conn_table::ConnectionTable;
pub use workers::{ExecutorBinding, ExecutorSelect, WorkerPool};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::TlsMaterial;
use crate::http::request::Method;
use crate::proxy::{self, LoadBalancePolicy, UpstreamChannel, UpstreamClient};
use crate::router::{Handler, Router};
use crate::static_files::{self, FileRespFormat, StaticContext};

use acceptor::ConnOptions;

/// Errors surfaced by the server's configuration and lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("port {0} is already in use")]
    AddressInUse(u16),
    #[error("server already started")]
    AlreadyStarted,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An asynchronous HTTP/1.1 server.
///
/// One-shot lifecycle: configure, `start` once, `stop` once; after `stop`
/// the object is inert.
pub struct Server {
    port: u16,
    binding: ExecutorBinding,
    router: Arc<Router>,
    table: Arc<ConnectionTable>,

    no_delay: bool,
    shrink_buffers: bool,
    idle_timeout: Duration,
    check_duration: Duration,
    tls: Option<TlsMaterial>,

    static_ctx: Arc<StaticContext>,
    static_dir: Option<PathBuf>,

    started: bool,
    stopped: bool,
    shutdown_tx: Option<watch::Sender<bool>>,
    acceptor_closed: Option<oneshot::Receiver<()>>,
    acceptor_task: Option<JoinHandle<()>>,
    reaper_task: Option<JoinHandle<()>>,
    reaper_stop: Arc<AtomicBool>,
}

impl Server {
    /// A server that owns a pool of `worker_threads` single-threaded
    /// runtimes.
    pub fn new(worker_threads: usize, port: u16) -> io::Result<Self> {
        let pool = WorkerPool::new(worker_threads)?;
        Ok(Self::with_binding(ExecutorBinding::Owned(pool), port))
    }

    /// A server that runs everything on a caller-provided runtime.
    pub fn with_runtime(handle: Handle, port: u16) -> Self {
        Self::with_binding(ExecutorBinding::Borrowed(handle), port)
    }

    fn with_binding(binding: ExecutorBinding, port: u16) -> Self {
        Self {
            port,
            binding,
            router: Arc::new(Router::new()),
            table: Arc::new(ConnectionTable::new()),
            no_delay: true,
            shrink_buffers: false,
            idle_timeout: Duration::ZERO,
            check_duration: Duration::from_secs(15),
            tls: None,
            static_ctx: Arc::new(StaticContext::new()),
            static_dir: None,
            started: false,
            stopped: false,
            shutdown_tx: None,
            acceptor_closed: None,
            acceptor_task: None,
            reaper_task: None,
            reaper_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_no_delay(&mut self, no_delay: bool) {
        self.no_delay = no_delay;
    }

    /// Stores TLS material for the termination layer. No handshake happens
    /// in the engine itself.
    pub fn init_tls(
        &mut self,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) {
        self.tls = Some(TlsMaterial {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            passphrase: passphrase.into(),
        });
    }

    /// How often the reaper wakes up.
    pub fn set_check_duration(&mut self, duration: Duration) {
        self.check_duration = duration;
    }

    /// Connections idle longer than this are reaped. Zero disables the
    /// reaper.
    pub fn set_timeout_duration(&mut self, duration: Duration) {
        self.idle_timeout = duration;
    }

    pub fn set_shrink_to_fit(&mut self, shrink: bool) {
        self.shrink_buffers = shrink;
    }

    /// Per-read buffer size when streaming files; also bounds chunked
    /// writes.
    pub fn set_transfer_chunked_size(&mut self, size: usize) {
        self.static_ctx.set_chunk_size(size);
    }

    pub fn set_file_resp_format_type(&mut self, format: FileRespFormat) {
        self.static_ctx.set_format(format);
    }

    /// Loads every static file of size at most `max_bytes` into the
    /// in-memory cache. Call after `configure_static`.
    pub fn set_max_size_of_cache_files(&mut self, max_bytes: u64) {
        let dir = match &self.static_dir {
            Some(dir) => dir.clone(),
            None => {
                warn!("no static directory configured, nothing to cache");
                return;
            }
        };
        let cached = self.static_ctx.populate_cache(&dir, max_bytes);
        info!(cached, max_bytes, "static file cache populated");
    }

    /// Registers a GET route for every regular file under `root_dir` at
    /// `/<uri_prefix>/<relative-path>`.
    ///
    /// Absolute paths and paths containing `..` indicate traversal or
    /// mis-configuration and terminate the process.
    pub fn configure_static(&mut self, uri_prefix: &str, root_dir: &str) {
        if !static_files::paths_permitted(uri_prefix, root_dir) {
            error!(uri_prefix, root_dir, "invalid static path configuration");
            std::process::exit(1);
        }

        let root = Path::new(root_dir).to_path_buf();
        let routes = static_files::register_routes(
            &self.router,
            self.static_ctx.clone(),
            uri_prefix,
            &root,
        );
        info!(routes, root = %root.display(), "static routes registered");
        self.static_dir = Some(root);
    }

    /// Registers a reverse-proxy route at `url_path`, balancing across
    /// `hosts` with the given policy.
    ///
    /// Empty `methods` registers all nine; empty `weights` means weight 1
    /// per host under the weighted policy.
    pub fn configure_proxy(
        &mut self,
        url_path: &str,
        hosts: Vec<String>,
        policy: LoadBalancePolicy,
        weights: Vec<u32>,
        methods: &[Method],
    ) -> Result<(), ServerError> {
        let channel = UpstreamChannel::new(hosts, policy, weights)
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))?;
        let handler = proxy::make_handler(Arc::new(channel), UpstreamClient::new());
        let methods = if methods.is_empty() {
            &Method::ALL[..]
        } else {
            methods
        };
        self.router.register(methods, url_path, handler);
        Ok(())
    }

    /// Registers a user handler for the given methods and path.
    pub fn register_handler(&mut self, methods: &[Method], path: &str, handler: Handler) {
        self.router.register(methods, path, handler);
    }

    /// Binds the listener, runs the owned pool, arms the reaper, and spawns
    /// the acceptor. Returns without blocking; use [`Server::wait`] to block
    /// on the acceptor.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.started {
            return Err(ServerError::AlreadyStarted);
        }

        let acceptor_executor = self.binding.acceptor_executor();
        let listener = {
            let _guard = acceptor_executor.enter();
            listener::bind(self.port).map_err(|e| {
                if e.kind() == io::ErrorKind::AddrInUse {
                    ServerError::AddressInUse(self.port)
                } else {
                    ServerError::Io(e)
                }
            })?
        };
        self.port = listener.local_addr()?.port();

        self.binding.run()?;

        if let Some(tls) = &self.tls {
            info!(cert = %tls.cert_file.display(), "TLS material loaded");
        }

        if self.idle_timeout > Duration::ZERO {
            self.start_check_timer(&acceptor_executor);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        self.acceptor_closed = Some(closed_rx);

        let opts = ConnOptions {
            no_delay: self.no_delay,
            shrink_buffers: self.shrink_buffers,
        };
        let loop_fut = acceptor::accept_loop(
            listener,
            self.binding.selector(),
            self.table.clone(),
            self.router.clone(),
            opts,
            shutdown_rx,
            closed_tx,
        );
        self.acceptor_task = Some(acceptor_executor.spawn(loop_fut));
        self.started = true;

        info!(port = self.port, "listening");
        Ok(())
    }

    fn start_check_timer(&mut self, executor: &Handle) {
        let table = self.table.clone();
        let stop = self.reaper_stop.clone();
        let tick = self.check_duration;
        let max_idle = self.idle_timeout;
        self.reaper_task = Some(executor.spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                if stop.load(Ordering::Acquire) {
                    return;
                }
                let reaped = table.sweep(Instant::now(), max_idle);
                if reaped > 0 {
                    info!(reaped, "idle connections closed");
                }
            }
        }));
    }

    /// Stops the server: cancels the reaper, shuts the acceptor down and
    /// waits for it, closes every connection, and stops the owned pool.
    /// Idempotent; later calls are no-ops.
    pub async fn stop(&mut self) {
        if !self.started || self.stopped {
            return;
        }
        self.stopped = true;

        self.reaper_stop.store(true, Ordering::Release);
        if let Some(task) = self.reaper_task.take() {
            task.abort();
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(closed) = self.acceptor_closed.take() {
            let _ = closed.await;
        }

        self.table.close_all();
        self.binding.stop();
        info!("server stopped");
    }

    /// Resolves when the acceptor loop terminates.
    pub async fn wait(&mut self) {
        if let Some(task) = self.acceptor_task.take() {
            let _ = task.await;
        }
    }

    /// The bound port. Reflects the OS-assigned port after a port-0 start.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connection_count(&self) -> usize {
        self.table.len()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.started && !self.stopped {
            self.reaper_stop.store(true, Ordering::Release);
            if let Some(task) = self.reaper_task.take() {
                task.abort();
            }
            if let Some(tx) = self.shutdown_tx.take() {
                let _ = tx.send(true);
            }
            self.table.close_all();
            self.binding.stop();
        }
    }
}
