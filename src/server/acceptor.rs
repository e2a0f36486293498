use std::io;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::http::connection::{Connection, ConnectionHandle};
use crate::router::Router;
use crate::server::conn_table::ConnectionTable;
use crate::server::workers::ExecutorSelect;

/// Options the acceptor applies to every new connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnOptions {
    pub no_delay: bool,
    pub shrink_buffers: bool,
}

// Accept errors that mean the listening socket itself is gone.
const EBADF: i32 = 9;
const ECANCELED: i32 = 125;

fn acceptor_closed(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(EBADF) | Some(ECANCELED))
}

/// The acceptor loop: one task for the lifetime of the server.
///
/// Every accepted socket gets the next connection id, a table entry, and a
/// detached driver task on the executor the selector yields. The socket is
/// re-registered inside that task so its I/O is driven by the connection's
/// own executor. Transient accept errors keep the loop alive; a dead
/// listening socket or the shutdown signal ends it, firing `closed_tx`.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    executors: ExecutorSelect,
    table: Arc<ConnectionTable>,
    router: Arc<Router>,
    opts: ConnOptions,
    mut shutdown: watch::Receiver<bool>,
    closed_tx: oneshot::Sender<()>,
) {
    let mut next_id: u64 = 0;

    loop {
        let (stream, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(e) if acceptor_closed(&e) => {
                    info!(error = %e, "acceptor closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
            _ = shutdown.changed() => {
                debug!("acceptor shutdown requested");
                break;
            }
        };

        next_id += 1;
        let id = next_id;
        debug!(id, peer = %peer, "connection accepted");

        let executor = executors.next_executor();
        let handle = Arc::new(ConnectionHandle::new(id));
        table.insert(handle.clone());

        // Deregister from the acceptor's reactor before handing the socket
        // to the connection's executor.
        let std_stream = match stream.into_std() {
            Ok(s) => s,
            Err(e) => {
                warn!(id, error = %e, "failed to detach accepted socket");
                table.remove(id);
                continue;
            }
        };

        let table_ref = Arc::downgrade(&table);
        let router = router.clone();
        executor.spawn(async move {
            let stream = match TcpStream::from_std(std_stream) {
                Ok(s) => s,
                Err(e) => {
                    warn!(id, error = %e, "failed to register accepted socket");
                    if let Some(table) = table_ref.upgrade() {
                        table.remove(id);
                    }
                    return;
                }
            };
            if opts.no_delay {
                let _ = stream.set_nodelay(true);
            }

            let mut conn = Connection::new(stream, router, handle);
            conn.set_shrink_to_fit(opts.shrink_buffers);
            conn.set_quit_callback(move |id| {
                if let Some(table) = table_ref.upgrade() {
                    table.remove(id);
                }
            });
            conn.run().await;
        });
    }

    let _ = closed_tx.send(());
}
