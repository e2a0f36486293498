//! HTTP protocol implementation.
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: the per-connection driver task and the shared write
//!   half handlers use for raw and chunked writes
//! - **`parser`**: parses incoming HTTP/1.1 requests from byte buffers
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with delayed-reply support
//! - **`writer`**: serializes responses and chunked frames to wire bytes
//! - **`mime`**: content-type detection based on file extensions
//! - **`ranges`**: `Range` header parsing for byte-range responses
//!
//! Each client connection cycles through reading a request, dispatching it
//! through the router, and writing the response, returning to the read state
//! while keep-alive holds.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod ranges;
pub mod request;
pub mod response;
pub mod writer;
