//! Static file serving: URI catalog, in-memory cache, chunked transfer,
//! and HTTP byte-range responses including multipart/byteranges.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::http::connection::ConnectionIo;
use crate::http::mime;
use crate::http::ranges;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::router::{Handler, Router};

/// Delimiter token for multipart/byteranges parts.
pub const BOUNDARY: &str = "HarborPartBoundary3d6b6a416f9b5";
pub const CRLF: &str = "\r\n";
pub const TWO_CRLF: &str = "\r\n\r\n";
/// Closing token written after the final part.
pub const MULTIPART_END: &str = "\r\n--HarborPartBoundary3d6b6a416f9b5--";

/// How file responses are framed when the client sends no `Range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRespFormat {
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Single response with `Content-Length`
    Range,
}

const DEFAULT_CHUNK_SIZE: usize = 10 * 1024;

/// Shared state of the static responder: the file cache plus the streaming
/// knobs. Captured by every registered file handler; the cache is read-only
/// once the server is running.
pub struct StaticContext {
    cache: RwLock<HashMap<PathBuf, Bytes>>,
    chunk_size: AtomicUsize,
    format: AtomicU8,
}

impl Default for StaticContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContext {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            chunk_size: AtomicUsize::new(DEFAULT_CHUNK_SIZE),
            format: AtomicU8::new(0),
        }
    }

    pub fn set_chunk_size(&self, size: usize) {
        self.chunk_size.store(size.max(1), Ordering::Relaxed);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.load(Ordering::Relaxed)
    }

    pub fn set_format(&self, format: FileRespFormat) {
        let raw = match format {
            FileRespFormat::Chunked => 0,
            FileRespFormat::Range => 1,
        };
        self.format.store(raw, Ordering::Relaxed);
    }

    pub fn format(&self) -> FileRespFormat {
        match self.format.load(Ordering::Relaxed) {
            0 => FileRespFormat::Chunked,
            _ => FileRespFormat::Range,
        }
    }

    pub fn cached(&self, path: &Path) -> Option<Bytes> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(path).cloned()
    }

    pub fn cache_len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.len()
    }

    /// Rescans `root` and loads every regular file of size at most
    /// `max_bytes` into the cache. Returns how many files were cached.
    pub fn populate_cache(&self, root: &Path, max_bytes: u64) -> usize {
        let mut files = Vec::new();
        collect_files(root, &mut files);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let mut cached = 0;
        for file in files {
            let size = match std::fs::metadata(&file) {
                Ok(meta) => meta.len(),
                Err(_) => continue,
            };
            if size > max_bytes {
                continue;
            }
            match std::fs::read(&file) {
                Ok(content) => {
                    cache.insert(file, Bytes::from(content));
                    cached += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "failed to cache file");
                }
            }
        }
        cached
    }
}

/// Rejects URI prefixes and file roots that look like traversal or
/// mis-configuration.
pub fn paths_permitted(uri_prefix: &str, root_dir: &str) -> bool {
    if uri_prefix.contains("..") || root_dir.contains("..") {
        return false;
    }
    if Path::new(uri_prefix).is_absolute() || Path::new(root_dir).is_absolute() {
        return false;
    }
    true
}

/// Walks `root` and registers a GET handler per regular file at
/// `/<prefix>/<relative-path>`. Returns the number of routes registered.
pub(crate) fn register_routes(
    router: &Router,
    ctx: Arc<StaticContext>,
    uri_prefix: &str,
    root: &Path,
) -> usize {
    let mut files = Vec::new();
    collect_files(root, &mut files);

    let prefix = uri_prefix.trim_matches('/');
    let mut routes = 0;
    for file in files {
        let rel = match file.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel_uri = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let uri = if prefix.is_empty() {
            format!("/{rel_uri}")
        } else {
            format!("/{prefix}/{rel_uri}")
        };

        let ctx = ctx.clone();
        let handler = Handler::async_fn(move |req: &Request, resp: &mut Response| {
            let ctx = ctx.clone();
            let path = file.clone();
            Box::pin(async move { serve_file(&ctx, &path, req, resp).await })
        });
        router.register(&[Method::GET], &uri, handler);
        routes += 1;
    }
    routes
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_dir() => collect_files(&path, out),
            Ok(t) if t.is_file() => out.push(path),
            _ => {}
        }
    }
}

/// Serves one registered file: cache hit, chunked stream, whole-file
/// stream, single range, or multipart ranges, depending on configuration
/// and the request's `Range` header.
async fn serve_file(ctx: &StaticContext, path: &Path, req: &Request, resp: &mut Response) {
    let path_str = path.to_string_lossy();
    let mime = mime::content_type(&path_str);
    let range_hdr = req.header("Range").unwrap_or("");

    // Cached files are answered whole; the Range header is not consulted
    // on this path.
    if let Some(body) = ctx.cached(path) {
        let head = build_range_header(mime, &path_str, body.len() as u64, 200, None);
        resp.set_delay(true);
        let _ = resp
            .connection()
            .async_write(&[head.as_bytes(), &body[..]])
            .await;
        return;
    }

    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(_) => {
            resp.set_status_and_content(
                StatusCode::NotFound,
                format!("{path_str} not found"),
            );
            return;
        }
    };
    let file_size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => {
            resp.set_status(StatusCode::NoContent);
            return;
        }
    };
    let chunk_size = ctx.chunk_size();

    if ctx.format() == FileRespFormat::Chunked && range_hdr.is_empty() {
        if !resp.begin_chunked().await {
            return;
        }
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = match file.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    // The chunked head is already on the wire; nothing
                    // coherent can be sent, so abort the connection.
                    tracing::debug!(file = %path_str, error = %e, "read failed mid-chunk");
                    resp.connection().handle().close();
                    return;
                }
            };
            if n == 0 {
                let _ = resp.end_chunked().await;
                return;
            }
            if !resp.write_chunked(&buf[..n]).await {
                return;
            }
        }
    }

    if let Some(eq) = range_hdr.find('=') {
        let spec = &range_hdr[eq + 1..];
        let parsed = match ranges::parse_ranges(spec, file_size) {
            Some(parsed) => parsed,
            None => {
                resp.set_status(StatusCode::RangeNotSatisfiable);
                return;
            }
        };

        if parsed.len() == 1 {
            let (start, end) = parsed[0];
            if file.seek(SeekFrom::Start(start)).await.is_err() {
                resp.set_status(StatusCode::NoContent);
                return;
            }
            let part_size = end + 1 - start;
            let status = if part_size == file_size { 200 } else { 206 };
            let content_range =
                format!("Content-Range: bytes {start}-{end}/{file_size}{CRLF}");
            let head =
                build_range_header(mime, &path_str, part_size, status, Some(&content_range));
            resp.set_delay(true);
            if !resp.connection().write_data(head.as_bytes()).await {
                return;
            }
            send_file_part(&mut file, resp.connection(), part_size, chunk_size).await;
        } else {
            resp.set_delay(true);
            let (part_heads, content_len) = build_part_heads(&parsed, mime, file_size);
            let head = build_multiple_range_header(content_len);
            if !resp.connection().write_data(head.as_bytes()).await {
                return;
            }

            let last = parsed.len() - 1;
            for (i, (start, end)) in parsed.iter().enumerate() {
                if !resp.connection().write_data(part_heads[i].as_bytes()).await {
                    return;
                }
                if file.seek(SeekFrom::Start(*start)).await.is_err() {
                    resp.connection().handle().close();
                    return;
                }
                let part_size = end + 1 - start;
                if !send_file_part(&mut file, resp.connection(), part_size, chunk_size).await
                {
                    return;
                }
                let separator = if i == last { MULTIPART_END } else { CRLF };
                if !resp.connection().write_data(separator.as_bytes()).await {
                    return;
                }
            }
        }
        return;
    }

    // Whole file as one Content-Length response, streamed in chunks.
    let head = build_range_header(mime, &path_str, file_size, 200, None);
    resp.set_delay(true);
    if !resp.connection().write_data(head.as_bytes()).await {
        return;
    }
    send_file_part(&mut file, resp.connection(), file_size, chunk_size).await;
}

/// Streams `part_size` bytes from the file's current position.
///
/// False means the transfer cannot continue; a read failure here leaves the
/// advertised length unmet, so the connection is aborted.
async fn send_file_part(
    file: &mut File,
    conn: &Arc<ConnectionIo>,
    part_size: u64,
    chunk_size: usize,
) -> bool {
    let mut buf = vec![0u8; chunk_size];
    let mut remaining = part_size;
    while remaining > 0 {
        let want = remaining.min(chunk_size as u64) as usize;
        match file.read(&mut buf[..want]).await {
            Ok(0) => {
                conn.handle().close();
                return false;
            }
            Ok(n) => {
                if !conn.write_data(&buf[..n]).await {
                    return false;
                }
                remaining -= n as u64;
            }
            Err(e) => {
                tracing::debug!(error = %e, "file read failed mid-part");
                conn.handle().close();
                return false;
            }
        }
    }
    true
}

/// Response head for single-part and whole-file responses.
///
/// `content_range`, when present, must carry its own trailing CRLF.
pub fn build_range_header(
    mime: &str,
    filename: &str,
    len: u64,
    status: u16,
    content_range: Option<&str>,
) -> String {
    let mut head = format!(
        "HTTP/1.1 {status} OK\r\nAccess-Control-Allow-origin: *\r\nAccept-Ranges: bytes\r\n"
    );
    if let Some(content_range) = content_range {
        head.push_str(content_range);
    }
    head.push_str(&format!(
        "Content-Disposition: attachment;filename={filename}\r\nConnection: keep-alive\r\nContent-Type: {mime}\r\nContent-Length: {len}\r\n\r\n"
    ));
    head
}

/// Response head for a multipart/byteranges response.
pub fn build_multiple_range_header(content_len: u64) -> String {
    format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Length: {content_len}\r\nContent-Type: multipart/byteranges; boundary={BOUNDARY}\r\n\r\n"
    )
}

/// Per-part header strings plus the total `Content-Length`: the sum of the
/// part headers, the part bytes, one CRLF per part, and the closing
/// boundary token.
pub fn build_part_heads(
    ranges: &[(u64, u64)],
    mime: &str,
    file_size: u64,
) -> (Vec<String>, u64) {
    let mut heads = Vec::with_capacity(ranges.len());
    let mut content_len: u64 = 0;
    for (start, end) in ranges {
        let head = format!(
            "--{BOUNDARY}{CRLF}Content-Type: {mime}{CRLF}Content-Range: bytes {start}-{end}/{file_size}{TWO_CRLF}"
        );
        content_len += head.len() as u64 + (end + 1 - start) + CRLF.len() as u64;
        heads.push(head);
    }
    content_len += BOUNDARY.len() as u64 + 4;
    (heads, content_len)
}
