//! Upstream connection and request forwarding
//!
//! A per-request HTTP/1.1 client: connects to the selected host, writes
//! the forwarded request, and reads the response back.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::http::request::Request;

const BUFFER_SIZE: usize = 8192;
const MAX_HEAD_SIZE: usize = 64 * 1024;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Not forwarded: they describe the client hop, not the upstream hop.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// What an upstream answered: status, headers in wire order, body bytes.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Forwards single requests to upstream hosts.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeouts(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Sends `req` to the host named by `host_url` and reads the response.
    ///
    /// The forwarded target path is the path component of the host URL,
    /// the way the proxy route was configured.
    pub async fn request(&self, host_url: &str, req: &Request) -> Result<UpstreamResponse> {
        let url = Url::parse(host_url).context("invalid upstream url")?;
        let host = url.host_str().context("upstream url missing host")?;
        let port = url.port().unwrap_or(match url.scheme() {
            "https" => 443,
            _ => 80,
        });
        let addr = format!("{host}:{port}");

        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .context("connect timeout")?
            .context("failed to connect to upstream")?;
        tracing::trace!(addr = %addr, "connected to upstream");

        timeout(self.request_timeout, exchange(stream, &url, req))
            .await
            .context("upstream request timeout")?
    }
}

async fn exchange(mut stream: TcpStream, url: &Url, req: &Request) -> Result<UpstreamResponse> {
    let out = serialize_request(req, url);
    stream.write_all(&out).await?;
    stream.flush().await?;

    read_response(&mut stream).await
}

/// Builds the wire bytes of the forwarded request.
///
/// Every incoming header is passed along except the hop-by-hop set; `Host`
/// is rewritten to the upstream authority and the upstream connection is
/// single-use.
pub fn serialize_request(req: &Request, url: &Url) -> Vec<u8> {
    let path = url.path();
    let mut out = Vec::with_capacity(256 + req.body.len());
    out.extend_from_slice(
        format!("{} {} {}\r\n", req.method.as_str(), path, req.version).as_bytes(),
    );

    for (name, value) in &req.headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }

    let host_value = match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    };
    out.extend_from_slice(format!("Host: {host_value}\r\n").as_bytes());
    out.extend_from_slice(b"Connection: close\r\n");
    if !req.body.is_empty() && req.header("Content-Length").is_none() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", req.body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&req.body);
    out
}

async fn read_response(stream: &mut TcpStream) -> Result<UpstreamResponse> {
    let mut buf = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        if let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = buf.split_to(head_end + 4);
            let (status, headers) = parse_response_head(&head)?;
            let content_length = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.parse::<usize>().ok());
            let body = read_body(stream, &mut buf, content_length).await?;
            return Ok(UpstreamResponse {
                status,
                headers,
                body,
            });
        }

        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("upstream closed before sending a response head");
        }
        if buf.len() > MAX_HEAD_SIZE {
            anyhow::bail!("upstream response head too large");
        }
    }
}

fn parse_response_head(head: &[u8]) -> Result<(u16, Vec<(String, String)>)> {
    let head = std::str::from_utf8(head).context("upstream head is not UTF-8")?;
    let mut lines = head.lines();

    let status_line = lines.next().context("empty upstream response")?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .context("malformed upstream status line")?
        .parse::<u16>()
        .context("malformed upstream status code")?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok((status, headers))
}

async fn read_body(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    content_length: Option<usize>,
) -> Result<Bytes> {
    match content_length {
        Some(len) => {
            let mut body = BytesMut::with_capacity(len);
            let take = buf.len().min(len);
            body.extend_from_slice(&buf[..take]);
            buf.advance(take);
            while body.len() < len {
                let n = stream.read_buf(&mut body).await?;
                if n == 0 {
                    anyhow::bail!("upstream closed before sending the full body");
                }
            }
            body.truncate(len);
            Ok(body.freeze())
        }
        None => {
            // No framing information: the upstream signals the end by
            // closing (we always send Connection: close).
            let mut body = BytesMut::from(&buf[..]);
            buf.clear();
            loop {
                let n = stream.read_buf(&mut body).await?;
                if n == 0 {
                    break;
                }
            }
            Ok(body.freeze())
        }
    }
}
