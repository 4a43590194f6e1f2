//! HTTP transport for the peer chain-fetch protocol.

use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_LENGTH;
use hyper::{Body, Client, StatusCode, Uri};
use std::future::Future;
use votechain_chain::{PeerChain, PeerClient, PeerError};

/// Largest `/chain` body accepted from a peer unless configured otherwise.
pub const DEFAULT_MAX_CHAIN_BYTES: usize = 16 * 1024 * 1024;

/// Fetches `GET http://{peer}/chain` over plain HTTP/1.
#[derive(Clone)]
pub struct HttpPeerClient {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        Self::with_max_body_bytes(DEFAULT_MAX_CHAIN_BYTES)
    }

    /// Client refusing chain bodies larger than `max_body_bytes`.
    pub fn with_max_body_bytes(max_body_bytes: usize) -> Self {
        Self {
            client: Client::new(),
            max_body_bytes,
        }
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// URL of a peer's chain endpoint.
pub fn chain_url(peer: &str) -> String {
    format!("http://{peer}/chain")
}

fn too_large(limit: usize) -> PeerError {
    PeerError::InvalidResponse(format!("chain body exceeds {limit} bytes"))
}

/// Collect `body`, failing as soon as it grows past `limit` bytes.
async fn read_capped(mut body: Body, limit: usize) -> Result<Vec<u8>, PeerError> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| PeerError::Unreachable(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

impl PeerClient for HttpPeerClient {
    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<PeerChain, PeerError>> + Send {
        let client = self.client.clone();
        let limit = self.max_body_bytes;
        let url = chain_url(peer);

        async move {
            let uri = url
                .parse::<Uri>()
                .map_err(|e| PeerError::InvalidResponse(format!("bad peer url {url}: {e}")))?;

            let response = client
                .get(uri)
                .await
                .map_err(|e| PeerError::Unreachable(e.to_string()))?;

            if response.status() != StatusCode::OK {
                return Err(PeerError::Status(response.status().as_u16()));
            }

            let declared = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<usize>().ok());
            if declared.is_some_and(|len| len > limit) {
                return Err(too_large(limit));
            }

            let body = read_capped(response.into_body(), limit).await?;

            serde_json::from_slice(&body).map_err(|e| PeerError::InvalidResponse(e.to_string()))
        }
    }
}
