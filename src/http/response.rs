use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::http::connection::ConnectionIo;
use crate::http::writer;

/// HTTP status codes the server emits or forwards.
///
/// `Other` carries any status received from an upstream verbatim, so
/// proxied responses are never remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Created,
    NoContent,
    PartialContent,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    RangeNotSatisfiable,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    Other(u16),
}

impl StatusCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            206 => StatusCode::PartialContent,
            400 => StatusCode::BadRequest,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            416 => StatusCode::RangeNotSatisfiable,
            500 => StatusCode::InternalServerError,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            504 => StatusCode::GatewayTimeout,
            other => StatusCode::Other(other),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::PartialContent => 206,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RangeNotSatisfiable => 416,
            StatusCode::InternalServerError => 500,
            StatusCode::BadGateway => 502,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::GatewayTimeout => 504,
            StatusCode::Other(code) => *code,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RangeNotSatisfiable => "Range Not Satisfiable",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::GatewayTimeout => "Gateway Timeout",
            StatusCode::Other(_) => "Unknown",
        }
    }
}

/// How the body is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    /// `Content-Length` framing
    Normal,
    /// `Transfer-Encoding: chunked` framing
    Chunked,
}

/// The response a handler fills in for the driver to reply with.
///
/// A handler that writes the wire bytes itself marks the response *delayed*
/// so the driver does not auto-reply on top of it. [`Response::send`] and the
/// chunked helpers do this implicitly.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    format: FormatType,
    delayed: bool,
    keep_alive: bool,
    conn: Arc<ConnectionIo>,
}

impl Response {
    pub(crate) fn new(conn: Arc<ConnectionIo>, keep_alive: bool) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: HashMap::new(),
            body: Bytes::new(),
            format: FormatType::Normal,
            delayed: false,
            keep_alive,
            conn,
        }
    }

    /// A response with no live socket behind it; writes report failure.
    pub fn detached() -> Self {
        Self::new(Arc::new(ConnectionIo::detached()), true)
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_status_and_content(
        &mut self,
        status: StatusCode,
        body: impl Into<Bytes>,
    ) {
        self.status = status;
        self.body = body.into();
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.as_str())
    }

    pub fn set_format_type(&mut self, format: FormatType) {
        self.format = format;
    }

    pub fn format_type(&self) -> FormatType {
        self.format
    }

    /// Suppresses the driver's automatic reply for this response.
    pub fn set_delay(&mut self, delayed: bool) {
        self.delayed = delayed;
    }

    pub fn delayed(&self) -> bool {
        self.delayed
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// The shared connection write half, for raw gather-writes.
    pub fn connection(&self) -> &Arc<ConnectionIo> {
        &self.conn
    }

    /// Serializes this response to wire bytes.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        writer::serialize_response(self)
    }

    /// Writes the response out immediately and marks it delayed.
    ///
    /// Returns false when the peer is gone.
    pub async fn send(&mut self) -> bool {
        let bytes = self.to_wire_bytes();
        self.delayed = true;
        self.conn.write_data(&bytes).await
    }

    /// Writes the chunked-transfer response head and marks the response
    /// delayed; the body follows via [`Response::write_chunked`].
    pub async fn begin_chunked(&mut self) -> bool {
        self.format = FormatType::Chunked;
        self.delayed = true;
        let head = writer::serialize_chunked_head(self);
        self.conn.write_data(&head).await
    }

    pub async fn write_chunked(&self, data: &[u8]) -> bool {
        self.conn.write_data(&writer::encode_chunk(data)).await
    }

    pub async fn end_chunked(&self) -> bool {
        self.conn.write_data(writer::CHUNKED_END).await
    }
}
