use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

const BACKLOG: u32 = 1024;

/// Binds an IPv4 listener on `port` with `SO_REUSEADDR`.
///
/// Must be called inside the runtime context the acceptor will run on.
/// Port 0 asks the OS for an ephemeral port; read it back through
/// `local_addr` after binding.
pub fn bind(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}
