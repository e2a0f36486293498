//! Reverse proxy functionality
//!
//! This module implements the proxy dispatcher: the load-balanced channel
//! of upstream hosts and the per-request forwarding handler.

pub mod channel;
pub mod upstream;

pub use channel::{LoadBalancePolicy, UpstreamChannel};
pub use upstream::{UpstreamClient, UpstreamResponse};

use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::router::Handler;

/// Builds the forwarding handler for one proxy route.
///
/// Each request picks an upstream through the channel's policy, forwards
/// the incoming method, body, and headers, copies the upstream's response
/// headers and status back verbatim, and replies itself (the response ends
/// up delayed so the driver does not reply again).
pub fn make_handler(channel: Arc<UpstreamChannel>, client: UpstreamClient) -> Handler {
    Handler::async_fn(move |req: &Request, resp: &mut Response| {
        let channel = channel.clone();
        let client = client.clone();
        Box::pin(async move {
            let host = channel.pick().to_string();
            match client.request(&host, req).await {
                Ok(upstream) => {
                    for (name, value) in &upstream.headers {
                        // Framing is re-derived from the body we actually
                        // hold; hop-by-hop metadata must not leak through.
                        let lower = name.to_ascii_lowercase();
                        if lower == "connection" || lower == "transfer-encoding" {
                            continue;
                        }
                        resp.add_header(name.clone(), value.clone());
                    }
                    resp.set_status_and_content(
                        StatusCode::from_u16(upstream.status),
                        upstream.body,
                    );
                    let _ = resp.send().await;
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "upstream request failed");
                    let timed_out = e.to_string().contains("timeout");
                    if timed_out {
                        resp.set_status_and_content(
                            StatusCode::GatewayTimeout,
                            &b"504 Gateway Timeout"[..],
                        );
                    } else {
                        resp.set_status_and_content(
                            StatusCode::BadGateway,
                            &b"502 Bad Gateway"[..],
                        );
                    }
                }
            }
        })
    })
}
