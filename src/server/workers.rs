//! Executor binding: the server either owns a pool of worker runtimes or
//! borrows a runtime handle from the caller.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;

/// A pool of single-threaded runtimes, one OS thread each.
///
/// Each worker thread parks in `block_on` on a shutdown receiver, which
/// drives that runtime's I/O and any task spawned on its handle. Connections
/// are distributed over the workers round-robin.
pub struct WorkerPool {
    workers: Vec<Worker>,
}

struct Worker {
    runtime: Option<Runtime>,
    handle: Handle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: Option<oneshot::Receiver<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let mut workers = Vec::with_capacity(threads);
        for _ in 0..threads {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            let handle = runtime.handle().clone();
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            workers.push(Worker {
                runtime: Some(runtime),
                handle,
                shutdown_tx: Some(shutdown_tx),
                shutdown_rx: Some(shutdown_rx),
                thread: None,
            });
        }
        Ok(Self { workers })
    }

    /// Spawns one thread per worker runtime.
    pub fn run(&mut self) -> io::Result<()> {
        for (i, worker) in self.workers.iter_mut().enumerate() {
            let runtime = match worker.runtime.take() {
                Some(rt) => rt,
                None => continue,
            };
            let shutdown_rx = match worker.shutdown_rx.take() {
                Some(rx) => rx,
                None => continue,
            };
            let thread = std::thread::Builder::new()
                .name(format!("harbor-worker-{i}"))
                .spawn(move || {
                    runtime.block_on(async {
                        let _ = shutdown_rx.await;
                    });
                })?;
            worker.thread = Some(thread);
        }
        Ok(())
    }

    /// Signals every worker and joins its thread.
    pub fn stop(&mut self) {
        for worker in &mut self.workers {
            if let Some(tx) = worker.shutdown_tx.take() {
                let _ = tx.send(());
            }
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }

    fn handles(&self) -> Vec<Handle> {
        self.workers.iter().map(|w| w.handle.clone()).collect()
    }
}

/// Uniform "task spawner" view over the two construction modes.
pub enum ExecutorBinding {
    /// Server-owned worker pool.
    Owned(WorkerPool),
    /// Caller-provided runtime; shutdown releases it without stopping it.
    Borrowed(Handle),
}

impl ExecutorBinding {
    /// The executor the acceptor loop and reaper run on.
    pub fn acceptor_executor(&self) -> Handle {
        match self {
            ExecutorBinding::Owned(pool) => pool.workers[0].handle.clone(),
            ExecutorBinding::Borrowed(handle) => handle.clone(),
        }
    }

    /// The per-connection executor selector handed to the acceptor.
    pub fn selector(&self) -> ExecutorSelect {
        let handles = match self {
            ExecutorBinding::Owned(pool) => pool.handles(),
            ExecutorBinding::Borrowed(handle) => vec![handle.clone()],
        };
        ExecutorSelect {
            handles,
            next: AtomicUsize::new(0),
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        match self {
            ExecutorBinding::Owned(pool) => pool.run(),
            ExecutorBinding::Borrowed(_) => Ok(()),
        }
    }

    pub fn stop(&mut self) {
        if let ExecutorBinding::Owned(pool) = self {
            pool.stop();
        }
    }
}

/// Round-robin executor selection, consulted once per accepted connection.
pub struct ExecutorSelect {
    handles: Vec<Handle>,
    next: AtomicUsize,
}

impl ExecutorSelect {
    pub fn next_executor(&self) -> Handle {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        self.handles[i].clone()
    }
}
