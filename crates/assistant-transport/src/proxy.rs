//! Reverse proxy to the agent runtime's own HTTP surface.

use axum::{
    Json,
    body::{Body, HttpBody},
    extract::Request,
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, channel::mpsc};
use reqwest::{Client, Url};

use crate::protocol::ErrorBody;

/// Request body chunks buffered between the client and the runtime.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Headers scoped to a single connection; never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Proxy error.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid runtime URL: {0}")]
    InvalidUrl(String),
    #[error("Agent runtime unreachable: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Forwards requests to the agent runtime, streaming responses back.
#[derive(Debug, Clone)]
pub struct RuntimeProxy {
    http: Client,
    base_url: Url,
}

impl RuntimeProxy {
    /// Create a proxy for the runtime at `base_url`.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed or the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ProxyError> {
        Self::with_client(Client::builder().build()?, base_url)
    }

    /// Create a proxy reusing an existing HTTP client.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed.
    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ProxyError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ProxyError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProxyError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Target URL for an incoming path and query.
    #[must_use]
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(query);
        url
    }

    /// Forward `request` and stream the runtime's response back.
    ///
    /// The request body is streamed to the runtime as it arrives.
    ///
    /// # Errors
    /// Returns error if the runtime is unreachable.
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let url = self.target_url(parts.uri.path(), parts.uri.query());
        let body = upstream_body(body);

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);

        tracing::debug!(method = %parts.method, %url, "Forwarding to agent runtime");

        let upstream = self
            .http
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

/// Convert an incoming body into a streaming upstream body.
///
/// Incoming bodies are not `Sync`, so chunks go through a channel.
fn upstream_body(body: Body) -> reqwest::Body {
    if body.size_hint().exact() == Some(0) {
        return reqwest::Body::from(Vec::new());
    }

    let (mut tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });
    reqwest::Body::wrap_stream(rx)
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
