//! Harbor - Asynchronous HTTP/1.1 Server Engine
//!
//! Core library for the acceptor, per-connection request lifecycle,
//! static file serving and reverse proxy functionality.

pub mod config;
pub mod http;
pub mod proxy;
pub mod router;
pub mod server;
pub mod static_files;
