use std::path::PathBuf;
use std::time::Duration;

/// TLS key material handed to the server via `init_tls`.
///
/// Termination itself is delegated to an external TLS layer; the server only
/// carries the material so the acceptor can hand it over.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub passphrase: String,
}

/// Environment-driven settings for the demo binary.
#[derive(Clone)]
pub struct Config {
    pub listen_port: u16,
    pub worker_threads: usize,
    pub static_dir: String,
    pub static_prefix: String,
    pub idle_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        let listen_port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let worker_threads = std::env::var("WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);
        let static_dir =
            std::env::var("STATIC_DIR").unwrap_or_else(|_| "www".to_string());
        let static_prefix =
            std::env::var("STATIC_PREFIX").unwrap_or_else(|_| "".to_string());
        let idle_timeout = std::env::var("IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self {
            listen_port,
            worker_threads,
            static_dir,
            static_prefix,
            idle_timeout,
        }
    }
}
